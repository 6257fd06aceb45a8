//! Reserved-word lookup.
//!
//! The lexer only needs one question answered about a word: is it a
//! keyword, and if so which state does it force and which grammar
//! token does it become. [`KeywordTable`] is that question; the
//! [`RubyKeywords`] table answers it for standard Ruby.

use std::fmt;

use crate::state::LexState;

/// Grammar-level identity of a keyword token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordId {
    Encoding,
    Line,
    File,
    BeginUpper,
    EndUpper,
    Alias,
    And,
    Begin,
    Break,
    Case,
    Class,
    Def,
    Defined,
    Do,
    /// `do` closing a `while`/`until`/`for` condition.
    DoCond,
    /// `do` attaching a block to a command call.
    DoBlock,
    /// `do` opening a `->` lambda body.
    DoLambda,
    Else,
    Elsif,
    End,
    Ensure,
    False,
    For,
    If,
    IfMod,
    In,
    Module,
    Next,
    Nil,
    Not,
    Or,
    Redo,
    Rescue,
    RescueMod,
    Retry,
    Return,
    SelfKw,
    Super,
    Then,
    True,
    Undef,
    Unless,
    UnlessMod,
    Until,
    UntilMod,
    When,
    While,
    WhileMod,
    Yield,
}

impl fmt::Display for KeywordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Keyword descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keyword {
    pub name: &'static str,
    /// `[expression-start form, modifier form]`. Both are equal for
    /// keywords without a modifier variant.
    pub ids: [KeywordId; 2],
    /// State forced after the keyword.
    pub state: LexState,
}

impl Keyword {
    const fn new(name: &'static str, ids: [KeywordId; 2], state: LexState) -> Self {
        Self { name, ids, state }
    }

    /// Whether the keyword has a distinct modifier form.
    #[must_use]
    pub fn has_modifier(&self) -> bool {
        self.ids[0] != self.ids[1]
    }
}

/// Spelling-to-keyword lookup consulted by the identifier classifier.
pub trait KeywordTable {
    fn lookup(&self, spelling: &str) -> Option<&Keyword>;
}

impl<T: KeywordTable + ?Sized> KeywordTable for &T {
    fn lookup(&self, spelling: &str) -> Option<&Keyword> {
        (**self).lookup(spelling)
    }
}

/// The standard Ruby keyword set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubyKeywords;

use KeywordId as K;
use LexState as S;

// Sorted by name for binary search.
static RUBY_KEYWORDS: [Keyword; 41] = [
    Keyword::new("BEGIN", [K::BeginUpper, K::BeginUpper], S::End),
    Keyword::new("END", [K::EndUpper, K::EndUpper], S::End),
    Keyword::new("__ENCODING__", [K::Encoding, K::Encoding], S::End),
    Keyword::new("__FILE__", [K::File, K::File], S::End),
    Keyword::new("__LINE__", [K::Line, K::Line], S::End),
    Keyword::new("alias", [K::Alias, K::Alias], S::Fname),
    Keyword::new("and", [K::And, K::And], S::Begin),
    Keyword::new("begin", [K::Begin, K::Begin], S::Begin),
    Keyword::new("break", [K::Break, K::Break], S::Mid),
    Keyword::new("case", [K::Case, K::Case], S::Begin),
    Keyword::new("class", [K::Class, K::Class], S::Class),
    Keyword::new("def", [K::Def, K::Def], S::Fname),
    Keyword::new("defined?", [K::Defined, K::Defined], S::Arg),
    Keyword::new("do", [K::Do, K::Do], S::Begin),
    Keyword::new("else", [K::Else, K::Else], S::Begin),
    Keyword::new("elsif", [K::Elsif, K::Elsif], S::Begin),
    Keyword::new("end", [K::End, K::End], S::End),
    Keyword::new("ensure", [K::Ensure, K::Ensure], S::Begin),
    Keyword::new("false", [K::False, K::False], S::End),
    Keyword::new("for", [K::For, K::For], S::Begin),
    Keyword::new("if", [K::If, K::IfMod], S::Begin),
    Keyword::new("in", [K::In, K::In], S::Begin),
    Keyword::new("module", [K::Module, K::Module], S::Begin),
    Keyword::new("next", [K::Next, K::Next], S::Mid),
    Keyword::new("nil", [K::Nil, K::Nil], S::End),
    Keyword::new("not", [K::Not, K::Not], S::Begin),
    Keyword::new("or", [K::Or, K::Or], S::Begin),
    Keyword::new("redo", [K::Redo, K::Redo], S::End),
    Keyword::new("rescue", [K::Rescue, K::RescueMod], S::Mid),
    Keyword::new("retry", [K::Retry, K::Retry], S::End),
    Keyword::new("return", [K::Return, K::Return], S::Mid),
    Keyword::new("self", [K::SelfKw, K::SelfKw], S::End),
    Keyword::new("super", [K::Super, K::Super], S::Arg),
    Keyword::new("then", [K::Then, K::Then], S::Begin),
    Keyword::new("true", [K::True, K::True], S::End),
    Keyword::new("undef", [K::Undef, K::Undef], S::Fname),
    Keyword::new("unless", [K::Unless, K::UnlessMod], S::Begin),
    Keyword::new("until", [K::Until, K::UntilMod], S::Begin),
    Keyword::new("when", [K::When, K::When], S::Begin),
    Keyword::new("while", [K::While, K::WhileMod], S::Begin),
    Keyword::new("yield", [K::Yield, K::Yield], S::Arg),
];

impl KeywordTable for RubyKeywords {
    fn lookup(&self, spelling: &str) -> Option<&Keyword> {
        RUBY_KEYWORDS
            .binary_search_by(|kw| kw.name.cmp(spelling))
            .ok()
            .map(|i| &RUBY_KEYWORDS[i])
    }
}
