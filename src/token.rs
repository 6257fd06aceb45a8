use crate::keywords::KeywordId;

/// Source location of a token.
///
/// `start` and `end` are byte offsets into the original source, so
/// `&source[span.start..span.end]` is the raw text the token was made
/// from even when its value was decoded (escapes) or converted
/// (numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    /// Raw source text covered by this span.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Whether the span covers no source text.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of the token stream.
    EndOfInput,
    /// Statement-separating newline.
    Newline,
    /// `;`
    Semicolon,
    /// `,`
    Comma,

    /// Reserved word, already resolved to its grammar variant.
    Keyword(KeywordId),
    /// Lowercase-initial word (`foo`, `bar?`, `baz!`, `name=`).
    Identifier,
    /// Uppercase-initial word.
    Constant,
    /// `name:` keyword-argument label; the text excludes the colon.
    Label,
    /// `@name`
    InstanceVar,
    /// `@@name`
    ClassVar,
    /// `$name`, `$_name` and punctuation globals like `$!`.
    GlobalVar,
    /// `$1`, `$2`, ...; the text is the group number.
    NthRef,

    /// Integer literal; value is [`TokenValue::Integer`].
    Integer,
    /// Float literal; value is [`TokenValue::Float`].
    Float,
    /// `?c` character literal; the text is the character.
    Character,

    /// Opening `"`, `'`, `%Q(`, `%q(`, `%(` or heredoc `<<ID`.
    StringBeg,
    /// Opening `` ` `` or `%x(`.
    XStringBeg,
    /// Opening `/` or `%r(`.
    RegexpBeg,
    /// Opening `%W(`.
    WordsBeg,
    /// Opening `%w(`.
    QWordsBeg,
    /// Opening `%I(`.
    SymbolsBeg,
    /// Opening `%i(`.
    QSymbolsBeg,
    /// `:` introducing a symbol (`:foo`, `:"foo"`).
    SymBeg,
    /// Literal body text, escapes decoded.
    StringContent,
    /// `#{` opening an interpolated expression.
    StringDbeg,
    /// `#` in front of an interpolated `@ivar`/`$gvar`.
    StringDvar,
    /// Word separator inside a word list.
    Space,
    /// Closing delimiter or heredoc terminator.
    StringEnd,
    /// Closing regexp delimiter; the text is the flag letters.
    RegexpEnd,

    /// `*` as splat / argument prefix.
    Star,
    /// `*` as multiplication.
    Star2,
    /// `**`
    Pow,
    /// Compound assignment; the text is the operator without `=`.
    OpAsgn,
    /// `!`
    Bang,
    /// `!=`
    Neq,
    /// `!~`
    Nmatch,
    /// `=`
    Assign,
    /// `==`
    Eq,
    /// `===`
    Eqq,
    /// `=~`
    Match,
    /// `=>`
    Assoc,
    /// `&&`
    AndOp,
    /// `||`
    OrOp,
    /// `&` as block-pass / argument prefix.
    Amper,
    /// `&` as bitwise and.
    Amper2,
    /// `|`
    Pipe,
    /// `%` as modulo.
    Percent,
    /// `/` as division.
    Divide,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `<<` as left shift.
    LShift,
    /// `>>`
    RShift,
    /// `<=>`
    Cmp,
    /// `<=`
    Leq,
    /// `<`
    Lt,
    /// `>=`
    Geq,
    /// `>`
    Gt,
    /// `->`
    Lambda,
    /// Unary `+`.
    UPlus,
    /// Unary `-`.
    UMinus,
    /// Binary `+`.
    Plus,
    /// Binary `-`.
    Minus,
    /// `?` of a ternary.
    Eh,
    /// `:` of a ternary.
    Colon,
    /// `.`
    Dot,
    /// `..`
    Dot2,
    /// `...`
    Dot3,
    /// `::` as scope resolution.
    Colon2,
    /// `::` leading a constant path.
    Colon3,

    /// `(` starting a parenthesized expression.
    LParen,
    /// `(` after a space in argument position.
    LParenArg,
    /// `(` directly after a method name.
    LParenCall,
    /// `)`
    RParen,
    /// `[` starting an array literal.
    LBrack,
    /// `[` indexing a receiver.
    LBrackIndex,
    /// `]`
    RBrack,
    /// `[]` method name.
    Aref,
    /// `[]=` method name.
    Aset,
    /// `{` starting a hash literal.
    LBrace,
    /// `{` starting a block.
    LCurly,
    /// `{` starting a block after a parenthesized argument.
    LBraceArg,
    /// `{` starting a lambda body.
    LamBeg,
    /// `}`
    RBrace,
}

impl TokenKind {
    /// Whether this kind opens a literal.
    #[must_use]
    pub const fn is_literal_begin(self) -> bool {
        matches!(
            self,
            Self::StringBeg
                | Self::XStringBeg
                | Self::RegexpBeg
                | Self::WordsBeg
                | Self::QWordsBeg
                | Self::SymbolsBeg
                | Self::QSymbolsBeg
        )
    }
}

/// Payload of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// A single token with its kind, value, and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub span: Span,
}

impl Token {
    pub(crate) fn text(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            value: TokenValue::Text(text.into()),
            span,
        }
    }

    /// Text payload, or `""` for numeric tokens.
    #[must_use]
    pub fn lexeme(&self) -> &str {
        match &self.value {
            TokenValue::Text(s) => s,
            TokenValue::Integer(_) | TokenValue::Float(_) => "",
        }
    }

    /// Integer payload, if any.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self.value {
            TokenValue::Integer(n) => Some(n),
            _ => None,
        }
    }

    /// Float payload, if any.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self.value {
            TokenValue::Float(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::EndOfInput)
    }
}
