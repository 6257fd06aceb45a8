//! Identifier and keyword classification.
//!
//! [`classify`] is a pure function of the word and the lexer context it
//! was read in; the lexer applies the resulting state and side effects.

use crate::keywords::{KeywordId, KeywordTable};
use crate::state::LexState;
use crate::token::TokenKind;

/// Lexer context a word is classified in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WordContext {
    pub state: LexState,
    pub command_start: bool,
    /// The word is directly followed by `:` that does not start `::`.
    pub label_follows: bool,
    /// Top of the cond stack is open.
    pub cond: bool,
    /// Top of the cmdarg stack is open.
    pub cmdarg: bool,
    /// A `->` is waiting for its body.
    pub lambda_pending: bool,
}

/// Result of classifying a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub kind: TokenKind,
    /// State after the token.
    pub state: LexState,
    /// The next token starts a command.
    pub command_start: bool,
}

impl Classified {
    const fn new(kind: TokenKind, state: LexState) -> Self {
        Self {
            kind,
            state,
            command_start: false,
        }
    }

    const fn with_command_start(mut self, command_start: bool) -> Self {
        if matches!(self.kind, TokenKind::Keyword(_)) {
            self.command_start = command_start;
        }
        self
    }
}

fn is_constant(word: &str) -> bool {
    word.as_bytes().first().is_some_and(u8::is_ascii_uppercase)
}

/// Classify a word-shaped lexeme.
pub fn classify<K: KeywordTable + ?Sized>(word: &str, ctx: &WordContext, keywords: &K) -> Classified {
    if ctx.label_follows {
        return Classified::new(TokenKind::Label, LexState::Begin);
    }

    if word == "defined?" {
        if ctx.state.is_after_operator() {
            return Classified::new(TokenKind::Identifier, LexState::End);
        }
        return Classified::new(TokenKind::Keyword(KeywordId::Defined), LexState::Arg);
    }

    let predicate = word.ends_with('?') || word.ends_with('!');
    let keyword = if predicate || ctx.state == LexState::Dot {
        None
    } else {
        keywords.lookup(word)
    };

    if let Some(kw) = keyword {
        let old = ctx.state;
        let mut result = Classified::new(TokenKind::Keyword(kw.ids[0]), kw.state);
        result.command_start = kw.state == LexState::Begin;

        if old == LexState::Fname {
            return result;
        }
        if word == "do" {
            return classify_do(ctx, kw.state).with_command_start(result.command_start);
        }
        if matches!(old, LexState::Begin | LexState::Value) {
            return result;
        }
        result.kind = TokenKind::Keyword(kw.ids[1]);
        if kw.has_modifier() {
            result.state = LexState::Begin;
        }
        return result;
    }

    let kind = if is_constant(word) {
        TokenKind::Constant
    } else {
        TokenKind::Identifier
    };
    let state = match ctx.state {
        LexState::Begin | LexState::Dot | LexState::Mid | LexState::Arg | LexState::CmdArg => {
            if ctx.command_start {
                LexState::CmdArg
            } else {
                LexState::Arg
            }
        }
        _ => LexState::End,
    };
    Classified::new(kind, state)
}

/// `do` picks its grammar variant from the enclosing construct.
fn classify_do(ctx: &WordContext, forced: LexState) -> Classified {
    use KeywordId::{Do, DoBlock, DoCond, DoLambda};

    if forced.is_after_operator() {
        return Classified::new(TokenKind::Identifier, LexState::End);
    }
    let id = if ctx.lambda_pending {
        DoLambda
    } else if ctx.cond {
        DoCond
    } else if (ctx.cmdarg && ctx.state != LexState::CmdArg) || ctx.state == LexState::EndArg {
        DoBlock
    } else {
        Do
    };
    Classified::new(TokenKind::Keyword(id), LexState::Begin)
}
