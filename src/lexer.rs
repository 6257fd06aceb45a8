use std::fmt;
use std::iter::FusedIterator;

use tracing::{debug, trace};

use crate::classifier::{self, WordContext};
use crate::cursor::{Cursor, Mark, ScannerStack};
use crate::keywords::{KeywordId, KeywordTable, RubyKeywords};
use crate::literal::{
    LiteralKind, StringTerm, Suspended, closing_delimiter, is_delimiter, is_gvar_punct, is_word,
};
use crate::number::{self, Number};
use crate::state::{LexState, NestingStack};
use crate::token::{Token, TokenKind, TokenValue};

const PREVIEW_LEN: usize = 5;
const DEFAULT_FILE: &str = "(string)";

/// Token shape that failed to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// Numeric literal followed by word characters, or a radix prefix
    /// without digits, or a value out of range.
    Number,
    /// `$` not followed by a valid global name.
    GlobalVariable,
    /// `[` in method-name position not forming `[]` or `[]=`.
    IndexOperator,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => write!(f, "numeric literal"),
            Self::GlobalVariable => write!(f, "global variable name"),
            Self::IndexOperator => write!(f, "index operator"),
        }
    }
}

/// Classifies a lexer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    /// End of input inside a literal or embedded document.
    UnterminatedLiteral {
        literal: LiteralKind,
        terminator: String,
    },
    /// A token started but its shape is invalid.
    MalformedToken {
        token: MalformedKind,
        preview: String,
    },
    /// No rule matches at this position.
    UnexpectedInput { preview: String },
    /// `\` outside a literal not directly followed by a newline.
    DanglingBackslash,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedLiteral {
                literal,
                terminator,
            } => {
                write!(
                    f,
                    "unterminated {literal}, \
                     expected `{terminator}` before end of input"
                )
            }
            Self::MalformedToken { token, preview } => {
                write!(f, "malformed {token}: `{preview}`")
            }
            Self::UnexpectedInput { preview } => {
                write!(f, "unexpected input: `{preview}`")
            }
            Self::DanglingBackslash => {
                write!(f, "backslash must appear before newline")
            }
        }
    }
}

/// Error produced during lexing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {file}:{line}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub file: String,
    pub line: usize,
}

/// Tokenize Ruby source into a sequence of tokens.
///
/// The end-of-input token is not included.
///
/// # Errors
///
/// Returns `LexError` on unterminated literals, malformed tokens,
/// unexpected input, or a dangling backslash.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

/// Context-sensitive Ruby lexer.
///
/// The lexer is a pull scanner: each [`Lexer::next_token`] call yields
/// one token, and a parser may adjust the lex state and nesting stacks
/// between calls through the hook methods.
///
/// ```
/// use rubylex::{Lexer, TokenKind};
///
/// let mut lexer = Lexer::new("puts 1");
/// assert_eq!(lexer.next_token()?.kind, TokenKind::Identifier);
/// assert_eq!(lexer.next_token()?.kind, TokenKind::Integer);
/// assert!(lexer.next_token()?.is_eof());
/// # Ok::<(), rubylex::LexError>(())
/// ```
#[derive(Debug)]
pub struct Lexer<'src, K = RubyKeywords> {
    file: String,
    keywords: K,
    pub(crate) scanners: ScannerStack<'src>,
    pub(crate) state: LexState,
    pub(crate) cond: NestingStack,
    pub(crate) cmdarg: NestingStack,
    /// Literal being scanned.
    pub(crate) term: Option<StringTerm<'src>>,
    /// Literals suspended by `#{`, innermost last.
    pub(crate) interpolations: Vec<Suspended<'src>>,
    /// Literal suspended by `#@`/`#$` for one variable token.
    pub(crate) dvar_term: Option<StringTerm<'src>>,
    pub(crate) brace_depth: usize,
    space_seen: bool,
    pub(crate) command_start: bool,
    lambda_pending: bool,
    failure: Option<LexError>,
    finished: bool,
}

impl<'src> Lexer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        let primary = match source.strip_prefix('\u{feff}') {
            Some(_) => Cursor::sub(source, '\u{feff}'.len_utf8(), source.len(), 1, 1),
            None => Cursor::new(source),
        };
        Self {
            file: DEFAULT_FILE.to_string(),
            keywords: RubyKeywords,
            scanners: ScannerStack::new(primary),
            state: LexState::Begin,
            cond: NestingStack::new(),
            cmdarg: NestingStack::new(),
            term: None,
            interpolations: Vec::new(),
            dvar_term: None,
            brace_depth: 0,
            space_seen: false,
            command_start: true,
            lambda_pending: false,
            failure: None,
            finished: false,
        }
    }
}

impl<'src, K: KeywordTable> Lexer<'src, K> {
    /// File name used in error messages.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Replace the keyword table.
    #[must_use]
    pub fn with_keywords<T: KeywordTable>(self, keywords: T) -> Lexer<'src, T> {
        Lexer {
            file: self.file,
            keywords,
            scanners: self.scanners,
            state: self.state,
            cond: self.cond,
            cmdarg: self.cmdarg,
            term: self.term,
            interpolations: self.interpolations,
            dvar_term: self.dvar_term,
            brace_depth: self.brace_depth,
            space_seen: self.space_seen,
            command_start: self.command_start,
            lambda_pending: self.lambda_pending,
            failure: self.failure,
            finished: self.finished,
        }
    }

    /// Collect every token up to end of input.
    ///
    /// # Errors
    ///
    /// Returns the first `LexError` encountered.
    pub fn tokenize(self) -> Result<Vec<Token>, LexError> {
        self.collect()
    }

    /// Produce the next token. End of input is reported as a token of
    /// kind [`TokenKind::EndOfInput`], repeatedly if called again.
    ///
    /// # Errors
    ///
    /// Returns a `LexError` on malformed input. Once an error has been
    /// returned, every later call returns the same error.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let result = if let Some(term) = self.term.take() {
            self.lex_literal(term)
        } else {
            let result = self.lex_code();
            if let Some(term) = self.dvar_term.take() {
                self.term = Some(term);
            }
            result
        };
        match result {
            Ok(token) => {
                trace!(
                    kind = ?token.kind,
                    line = token.span.line,
                    state = %self.state,
                    "token"
                );
                Ok(token)
            }
            Err(err) => {
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Diagnostic file name.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Current 1-based line of the active cursor.
    #[must_use]
    pub fn line(&self) -> usize {
        self.scanners.current().line()
    }

    #[must_use]
    pub const fn state(&self) -> LexState {
        self.state
    }

    /// Override the lex state; the grammar does this after some
    /// productions.
    pub const fn set_state(&mut self, state: LexState) {
        self.state = state;
    }

    #[must_use]
    pub const fn cond(&self) -> &NestingStack {
        &self.cond
    }

    #[must_use]
    pub const fn cmdarg(&self) -> &NestingStack {
        &self.cmdarg
    }

    pub fn cond_push(&mut self, active: bool) {
        self.cond.push(active);
    }

    pub fn cond_pop(&mut self) {
        self.cond.pop();
    }

    pub fn cond_lexpop(&mut self) {
        self.cond.lexpop();
    }

    pub fn cmdarg_push(&mut self, active: bool) {
        self.cmdarg.push(active);
    }

    pub fn cmdarg_pop(&mut self) {
        self.cmdarg.pop();
    }

    pub fn cmdarg_lexpop(&mut self) {
        self.cmdarg.lexpop();
    }

    /// Kind of the literal being scanned, if any. A literal suspended
    /// by `#{` is not active until the matching `}`.
    #[must_use]
    pub fn active_literal(&self) -> Option<LiteralKind> {
        self.term
            .as_ref()
            .or(self.dvar_term.as_ref())
            .map(|term| term.kind)
    }

    pub(crate) fn error(&self, kind: LexErrorKind) -> LexError {
        LexError {
            kind,
            file: self.file.clone(),
            line: self.line(),
        }
    }

    fn error_at(&mut self, mark: Mark, kind: impl FnOnce(String) -> LexErrorKind) -> LexError {
        let cursor = self.scanners.current_mut();
        cursor.reset(mark);
        let preview = cursor.preview(PREVIEW_LEN);
        self.error(kind(preview))
    }

    /// Token of `kind` whose text is the raw source from `mark`.
    pub(crate) fn emit(&self, kind: TokenKind, mark: Mark) -> Token {
        let cursor = self.scanners.current();
        let span = cursor.span_from(mark);
        Token::text(kind, span.text(cursor.source()), span)
    }

    pub(crate) fn emit_text(&self, kind: TokenKind, text: impl Into<String>, mark: Mark) -> Token {
        Token::text(kind, text, self.scanners.current().span_from(mark))
    }

    /// Arg state after an operator that can also be a method name,
    /// Begin otherwise.
    const fn operator_state(&self) -> LexState {
        if self.state.is_after_operator() {
            LexState::Arg
        } else {
            LexState::Begin
        }
    }

    /// Argument position after a space, with the operator glued to the
    /// next operand (`foo -1`, `foo *args`).
    fn space_before_operand(&self) -> bool {
        self.state.is_arg()
            && self.space_seen
            && !self.scanners.current().check(|b| b.is_ascii_whitespace())
    }

    fn push_nesting(&mut self) {
        self.cond.push(false);
        self.cmdarg.push(false);
    }

    fn lex_code(&mut self) -> Result<Token, LexError> {
        self.space_seen = false;
        let command_start = std::mem::take(&mut self.command_start);

        loop {
            let cursor = self.scanners.current();
            let mark = cursor.mark();
            let Some(c) = cursor.peek() else {
                if self.scanners.pop() {
                    debug!(line = self.line(), "heredoc trailing code exhausted");
                    continue;
                }
                if let Some(suspended) = self.interpolations.last() {
                    return Err(self.error(LexErrorKind::UnterminatedLiteral {
                        literal: suspended.term.kind,
                        terminator: suspended.term.terminator(),
                    }));
                }
                return Ok(self.emit_text(TokenKind::EndOfInput, "", mark));
            };

            let token = match c {
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => {
                    self.scanners.current_mut().advance(1);
                    self.space_seen = true;
                    continue;
                }
                b'\n' | b'#' => match self.lex_newline(mark) {
                    Some(token) => token,
                    None => continue,
                },
                b'\\' => {
                    self.line_continuation()?;
                    continue;
                }
                b'=' if self.at_embedded_document() => {
                    self.skip_embedded_document()?;
                    continue;
                }
                b'=' => self.lex_equals(mark),
                b';' => {
                    self.scanners.current_mut().advance(1);
                    self.state = LexState::Begin;
                    self.command_start = true;
                    self.emit(TokenKind::Semicolon, mark)
                }
                b',' => {
                    self.scanners.current_mut().advance(1);
                    self.state = LexState::Begin;
                    self.emit(TokenKind::Comma, mark)
                }
                b'"' | b'\'' | b'`' => self.lex_quote(c, mark),
                b'*' => self.lex_star(mark),
                b'!' => self.lex_bang(mark),
                b'&' => self.lex_amper(mark),
                b'|' => self.lex_pipe(mark),
                b'%' => self.lex_percent(mark),
                b'/' => self.lex_slash(mark),
                b'^' => self.lex_caret(mark),
                b'~' => {
                    self.scanners.current_mut().advance(1);
                    self.state = if self.state == LexState::Fname {
                        LexState::End
                    } else {
                        LexState::Begin
                    };
                    self.emit(TokenKind::Tilde, mark)
                }
                b'(' => self.lex_lparen(mark),
                b'[' => self.lex_lbrack(mark)?,
                b'{' => self.lex_lbrace(mark),
                b')' | b']' => self.lex_close(c, mark),
                b'}' => self.lex_rbrace(mark),
                b'.' => self.lex_dot(mark),
                b':' => self.lex_colon(mark),
                b'<' => self.lex_lt(mark),
                b'>' => self.lex_gt(mark),
                b'-' if self.scanners.current().peek_at(1) == Some(b'>') => {
                    self.scanners.current_mut().advance(2);
                    self.state = LexState::End;
                    self.lambda_pending = true;
                    self.emit(TokenKind::Lambda, mark)
                }
                b'+' | b'-' => self.lex_sign(c, mark),
                b'?' => self.lex_question(mark),
                b'$' => self.lex_gvar(mark)?,
                b'@' => self.lex_ivar(mark)?,
                b'0'..=b'9' => self.lex_number(mark)?,
                c if is_word(c) => self.lex_word(mark, command_start),
                _ => {
                    return Err(self.error_at(mark, |preview| LexErrorKind::UnexpectedInput {
                        preview,
                    }));
                }
            };
            return Ok(token);
        }
    }

    /// Comment or newline run. Emits a newline token unless the state
    /// already expects an expression or the next line continues a call
    /// chain with a leading `.`.
    fn lex_newline(&mut self, mark: Mark) -> Option<Token> {
        let cursor = self.scanners.current_mut();
        if cursor.eat(b'#') {
            cursor.eat_while(|b| b != b'\n');
        }
        let newlines = cursor.eat_while(|b| b == b'\n');
        let span = cursor.span_from(mark);

        if matches!(self.state, LexState::Begin | LexState::Dot) {
            return None;
        }

        let indent = cursor.run_len(0, |b| matches!(b, b' ' | b'\t' | b'\r' | 0x0b | 0x0c));
        if cursor.peek_at(indent) == Some(b'.') {
            if indent > 0 {
                self.space_seen = true;
            }
            cursor.advance(indent);
            if cursor.peek_at(1) != Some(b'.') {
                return None;
            }
        }

        self.state = LexState::Begin;
        self.command_start = true;
        let text = if newlines.is_empty() { "" } else { "\n" };
        Some(Token::text(TokenKind::Newline, text, span))
    }

    fn line_continuation(&mut self) -> Result<(), LexError> {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if cursor.eat_str("\r\n") || cursor.eat(b'\n') {
            self.space_seen = true;
            Ok(())
        } else {
            Err(self.error(LexErrorKind::DanglingBackslash))
        }
    }

    fn at_embedded_document(&self) -> bool {
        let cursor = self.scanners.current();
        self.state == LexState::Begin
            && !self.space_seen
            && cursor.at_line_start()
            && cursor.starts_with("=begin")
            && cursor
                .peek_at("=begin".len())
                .is_none_or(|b| b.is_ascii_whitespace())
    }

    /// Skip `=begin` through the rest of the line holding `=end`.
    fn skip_embedded_document(&mut self) -> Result<(), LexError> {
        let cursor = self.scanners.current_mut();
        loop {
            cursor.eat_while(|b| b != b'\n');
            if !cursor.eat(b'\n') {
                return Err(self.error(LexErrorKind::UnterminatedLiteral {
                    literal: LiteralKind::EmbeddedDocument,
                    terminator: "=end".to_string(),
                }));
            }
            if cursor.starts_with("=end")
                && cursor
                    .peek_at("=end".len())
                    .is_none_or(|b| b.is_ascii_whitespace())
            {
                cursor.eat_while(|b| b != b'\n');
                return Ok(());
            }
        }
    }

    fn lex_quote(&mut self, quote: u8, mark: Mark) -> Token {
        self.scanners.current_mut().advance(1);
        let (literal, kind) = match quote {
            b'"' => (LiteralKind::DoubleQuote, TokenKind::StringBeg),
            b'\'' => (LiteralKind::SingleQuote, TokenKind::StringBeg),
            _ => (LiteralKind::XString, TokenKind::XStringBeg),
        };
        self.open_literal(StringTerm::new(literal, quote, quote), kind, mark)
    }

    fn lex_equals(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        let kind = if cursor.eat_str("==") {
            TokenKind::Eqq
        } else if cursor.eat(b'=') {
            TokenKind::Eq
        } else if cursor.eat(b'~') {
            TokenKind::Match
        } else if cursor.eat(b'>') {
            TokenKind::Assoc
        } else {
            TokenKind::Assign
        };
        self.state = self.operator_state();
        self.emit(kind, mark)
    }

    fn op_asgn(&mut self, operator: &str, mark: Mark) -> Token {
        self.state = LexState::Begin;
        self.emit_text(TokenKind::OpAsgn, operator, mark)
    }

    fn lex_star(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if cursor.eat_str("*=") {
            return self.op_asgn("**", mark);
        }
        if cursor.eat(b'*') {
            self.state = self.operator_state();
            return self.emit(TokenKind::Pow, mark);
        }
        if cursor.eat(b'=') {
            return self.op_asgn("*", mark);
        }

        let glued = cursor.check(|b| !b.is_ascii_whitespace());
        let kind = if self.state.is_after_operator() {
            TokenKind::Star2
        } else if (self.space_seen && glued) || matches!(self.state, LexState::Begin | LexState::Mid) {
            TokenKind::Star
        } else {
            TokenKind::Star2
        };
        self.state = self.operator_state();
        self.emit(kind, mark)
    }

    fn lex_bang(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if self.state.is_after_operator() {
            self.state = LexState::Arg;
            if cursor.eat(b'@') {
                return self.emit_text(TokenKind::Bang, "!", mark);
            }
        } else {
            self.state = LexState::Begin;
        }
        let kind = if cursor.eat(b'=') {
            TokenKind::Neq
        } else if cursor.eat(b'~') {
            TokenKind::Nmatch
        } else {
            TokenKind::Bang
        };
        self.emit(kind, mark)
    }

    fn lex_amper(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if cursor.eat(b'&') {
            if cursor.eat(b'=') {
                return self.op_asgn("&&", mark);
            }
            self.state = LexState::Begin;
            return self.emit(TokenKind::AndOp, mark);
        }
        if cursor.eat(b'=') {
            return self.op_asgn("&", mark);
        }
        let kind = if self.space_before_operand() || self.state.is_beg() {
            TokenKind::Amper
        } else {
            TokenKind::Amper2
        };
        self.state = self.operator_state();
        self.emit(kind, mark)
    }

    fn lex_pipe(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if cursor.eat(b'|') {
            if cursor.eat(b'=') {
                return self.op_asgn("||", mark);
            }
            self.state = LexState::Begin;
            return self.emit(TokenKind::OrOp, mark);
        }
        if cursor.eat(b'=') {
            return self.emit_text(TokenKind::OpAsgn, "|", mark);
        }
        self.state = self.operator_state();
        self.emit(TokenKind::Pipe, mark)
    }

    fn lex_caret(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if cursor.eat(b'=') {
            return self.op_asgn("^", mark);
        }
        self.state = self.operator_state();
        self.emit(TokenKind::Caret, mark)
    }

    fn lex_percent(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);

        let form = cursor.peek().filter(|_| cursor.peek_at(1).is_some_and(is_delimiter));
        let percent_literal = match form {
            Some(b'Q') => Some((LiteralKind::DoubleQuote, TokenKind::StringBeg)),
            Some(b'q') => Some((LiteralKind::SingleQuote, TokenKind::StringBeg)),
            Some(b'W') => Some((LiteralKind::Words, TokenKind::WordsBeg)),
            Some(b'w') => Some((LiteralKind::QWords, TokenKind::QWordsBeg)),
            Some(b'I') => Some((LiteralKind::Symbols, TokenKind::SymbolsBeg)),
            Some(b'i') => Some((LiteralKind::QSymbols, TokenKind::QSymbolsBeg)),
            Some(b'x') => Some((LiteralKind::XString, TokenKind::XStringBeg)),
            Some(b'r') => Some((LiteralKind::Regexp, TokenKind::RegexpBeg)),
            _ => None,
        };
        if let Some((literal, kind)) = percent_literal {
            cursor.advance(1);
            return self.open_percent(literal, kind, mark);
        }

        if cursor.eat(b'=') {
            return self.op_asgn("%", mark);
        }

        let generic = cursor.check(is_delimiter)
            && (self.state == LexState::Begin || (self.state.is_arg() && self.space_seen));
        if generic {
            return self.open_percent(LiteralKind::DoubleQuote, TokenKind::StringBeg, mark);
        }

        self.state = self.operator_state();
        self.emit(TokenKind::Percent, mark)
    }

    /// Open a percent literal whose delimiter is the next byte.
    fn open_percent(&mut self, literal: LiteralKind, kind: TokenKind, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        let open = cursor.peek().unwrap_or(b'(');
        cursor.advance(1);
        self.open_literal(StringTerm::new(literal, open, closing_delimiter(open)), kind, mark)
    }

    fn open_regexp(&mut self, mark: Mark) -> Token {
        self.open_literal(
            StringTerm::new(LiteralKind::Regexp, b'/', b'/'),
            TokenKind::RegexpBeg,
            mark,
        )
    }

    fn lex_slash(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if matches!(self.state, LexState::Begin | LexState::Mid) {
            return self.open_regexp(mark);
        }
        if cursor.eat(b'=') {
            return self.op_asgn("/", mark);
        }
        if self.state.is_after_operator() {
            self.state = LexState::Arg;
        } else if self.state.is_arg() {
            if self.space_seen && !cursor.check(|b| b.is_ascii_whitespace()) {
                return self.open_regexp(mark);
            }
        } else {
            self.state = LexState::Begin;
        }
        self.emit(TokenKind::Divide, mark)
    }

    fn lex_lparen(&mut self, mark: Mark) -> Token {
        self.scanners.current_mut().advance(1);
        let kind = if matches!(self.state, LexState::Begin | LexState::Mid) {
            TokenKind::LParen
        } else if self.space_seen && self.state.is_arg() {
            TokenKind::LParenArg
        } else {
            TokenKind::LParenCall
        };
        self.state = LexState::Begin;
        self.push_nesting();
        self.emit(kind, mark)
    }

    fn lex_lbrack(&mut self, mark: Mark) -> Result<Token, LexError> {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if self.state.is_after_operator() {
            self.state = LexState::Arg;
            let kind = if cursor.eat_str("]=") {
                TokenKind::Aset
            } else if cursor.eat(b']') {
                TokenKind::Aref
            } else {
                return Err(self.error_at(mark, |preview| LexErrorKind::MalformedToken {
                    token: MalformedKind::IndexOperator,
                    preview,
                }));
            };
            return Ok(self.emit(kind, mark));
        }

        let kind = if matches!(self.state, LexState::Begin | LexState::Mid) || self.space_seen {
            TokenKind::LBrack
        } else {
            TokenKind::LBrackIndex
        };
        self.state = LexState::Begin;
        self.push_nesting();
        Ok(self.emit(kind, mark))
    }

    fn lex_lbrace(&mut self, mark: Mark) -> Token {
        self.scanners.current_mut().advance(1);
        let kind = if std::mem::take(&mut self.lambda_pending) {
            TokenKind::LamBeg
        } else {
            match self.state {
                LexState::End | LexState::Arg | LexState::CmdArg => TokenKind::LCurly,
                LexState::EndArg => TokenKind::LBraceArg,
                _ => TokenKind::LBrace,
            }
        };
        self.state = LexState::Begin;
        self.brace_depth += 1;
        self.push_nesting();
        self.emit(kind, mark)
    }

    fn lex_close(&mut self, close: u8, mark: Mark) -> Token {
        self.scanners.current_mut().advance(1);
        self.cond.lexpop();
        self.cmdarg.lexpop();
        self.state = LexState::End;
        let kind = if close == b')' {
            TokenKind::RParen
        } else {
            TokenKind::RBrack
        };
        self.emit(kind, mark)
    }

    /// `}` closes a brace pair, or an interpolation when it matches the
    /// depth recorded by `#{`.
    fn lex_rbrace(&mut self, mark: Mark) -> Token {
        self.scanners.current_mut().advance(1);
        self.cond.lexpop();
        self.cmdarg.lexpop();
        self.state = LexState::End;

        let closes_interpolation = self
            .interpolations
            .last()
            .is_some_and(|suspended| suspended.brace_depth == self.brace_depth);
        if closes_interpolation {
            if let Some(suspended) = self.interpolations.pop() {
                debug!(
                    literal = %suspended.term.kind,
                    depth = self.brace_depth,
                    "interpolation resumes literal"
                );
                self.term = Some(suspended.term);
            }
        }
        self.brace_depth = self.brace_depth.saturating_sub(1);
        self.emit(TokenKind::RBrace, mark)
    }

    fn lex_dot(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        if cursor.eat_str("...") {
            self.state = LexState::Begin;
            return self.emit(TokenKind::Dot3, mark);
        }
        if cursor.eat_str("..") {
            self.state = LexState::Begin;
            return self.emit(TokenKind::Dot2, mark);
        }
        cursor.advance(1);
        if self.state != LexState::Fname {
            self.state = LexState::Dot;
        }
        self.emit(TokenKind::Dot, mark)
    }

    fn lex_colon(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        if cursor.eat_str("::") {
            let leading = matches!(self.state, LexState::Begin | LexState::Mid | LexState::Class)
                || (self.space_seen && self.state.is_arg());
            if leading {
                self.state = LexState::Begin;
                return self.emit(TokenKind::Colon3, mark);
            }
            self.state = LexState::Dot;
            return self.emit(TokenKind::Colon2, mark);
        }

        cursor.advance(1);
        if self.state.is_end() || cursor.check(|b| b.is_ascii_whitespace()) {
            if !cursor.check(is_word) {
                self.state = LexState::Begin;
                return self.emit(TokenKind::Colon, mark);
            }
            self.state = LexState::Fname;
            return self.emit(TokenKind::SymBeg, mark);
        }

        let quoted = match cursor.peek() {
            Some(b'"') => Some(LiteralKind::DoubleSymbol),
            Some(b'\'') => Some(LiteralKind::Symbol),
            _ => None,
        };
        self.state = LexState::Fname;
        match quoted {
            Some(literal) => {
                let quote = cursor.peek().unwrap_or(b'"');
                cursor.advance(1);
                self.open_literal(StringTerm::new(literal, quote, quote), TokenKind::SymBeg, mark)
            }
            None => self.emit(TokenKind::SymBeg, mark),
        }
    }

    fn lex_lt(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        if cursor.eat_str("<<=") {
            return self.op_asgn("<<", mark);
        }
        if cursor.eat_str("<<") {
            if self.state.is_after_operator() {
                self.state = LexState::Arg;
                return self.emit(TokenKind::LShift, mark);
            }
            let heredoc_allowed = self.state != LexState::Class
                && !self.state.is_end()
                && (!self.state.is_arg() || self.space_seen);
            if heredoc_allowed {
                if let Some(token) = self.lex_heredoc_open(mark) {
                    return token;
                }
            }
            self.state = LexState::Begin;
            return self.emit(TokenKind::LShift, mark);
        }
        let kind = if cursor.eat_str("<=>") {
            TokenKind::Cmp
        } else if cursor.eat_str("<=") {
            TokenKind::Leq
        } else {
            cursor.advance(1);
            TokenKind::Lt
        };
        self.state = self.operator_state();
        self.emit(kind, mark)
    }

    fn lex_gt(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        if cursor.eat_str(">>=") {
            return self.emit_text(TokenKind::OpAsgn, ">>", mark);
        }
        if cursor.eat_str(">>") {
            self.state = self.operator_state();
            return self.emit(TokenKind::RShift, mark);
        }
        if cursor.eat_str(">=") {
            self.state = if self.state.is_after_operator() {
                LexState::End
            } else {
                LexState::Begin
            };
            return self.emit(TokenKind::Geq, mark);
        }
        cursor.advance(1);
        self.state = self.operator_state();
        self.emit(TokenKind::Gt, mark)
    }

    fn lex_sign(&mut self, sign: u8, mark: Mark) -> Token {
        let (unary, binary, method) = if sign == b'+' {
            (TokenKind::UPlus, TokenKind::Plus, "+@")
        } else {
            (TokenKind::UMinus, TokenKind::Minus, "-@")
        };
        let operator = if sign == b'+' { "+" } else { "-" };

        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if matches!(self.state, LexState::Begin | LexState::Mid) {
            self.state = LexState::Mid;
            return self.emit_text(unary, method, mark);
        }
        if self.state.is_after_operator() {
            self.state = LexState::Arg;
            if cursor.eat(b'@') {
                return self.emit(TokenKind::Identifier, mark);
            }
            return self.emit(binary, mark);
        }
        if cursor.eat(b'=') {
            return self.op_asgn(operator, mark);
        }
        if self.space_before_operand() {
            self.state = LexState::Mid;
            return self.emit_text(unary, method, mark);
        }
        self.state = LexState::Begin;
        self.emit(binary, mark)
    }

    fn lex_question(&mut self, mark: Mark) -> Token {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        if !self.state.is_end() {
            if let Some(ch) = cursor.peek_char().filter(|ch| !ch.is_whitespace()) {
                cursor.bump();
                self.state = LexState::End;
                return self.emit_text(TokenKind::Character, ch.to_string(), mark);
            }
        }
        self.state = LexState::Begin;
        self.emit(TokenKind::Eh, mark)
    }

    fn lex_gvar(&mut self, mark: Mark) -> Result<Token, LexError> {
        let cursor = self.scanners.current_mut();
        cursor.advance(1);
        self.state = LexState::End;

        if cursor.check(|b| matches!(b, b'1'..=b'9')) {
            let digits = cursor.eat_while(|b| b.is_ascii_digit());
            return Ok(self.emit_text(TokenKind::NthRef, digits, mark));
        }
        let name_len = if cursor.peek() == Some(b'_') && cursor.peek_at(1).is_some_and(is_word) {
            cursor.run_len(0, is_word)
        } else if cursor.check(is_gvar_punct) {
            1
        } else {
            cursor.run_len(0, is_word)
        };
        if name_len == 0 {
            return Err(self.error_at(mark, |preview| LexErrorKind::MalformedToken {
                token: MalformedKind::GlobalVariable,
                preview,
            }));
        }
        cursor.advance(name_len);
        Ok(self.emit(TokenKind::GlobalVar, mark))
    }

    fn lex_ivar(&mut self, mark: Mark) -> Result<Token, LexError> {
        let cursor = self.scanners.current_mut();
        let kind = if cursor.eat_str("@@") {
            TokenKind::ClassVar
        } else {
            cursor.advance(1);
            TokenKind::InstanceVar
        };
        if cursor.check(|b| b.is_ascii_digit()) || cursor.eat_while(is_word).is_empty() {
            return Err(self.error_at(mark, |preview| LexErrorKind::UnexpectedInput { preview }));
        }
        self.state = LexState::End;
        Ok(self.emit(kind, mark))
    }

    fn lex_number(&mut self, mark: Mark) -> Result<Token, LexError> {
        let value = match number::scan_number(self.scanners.current_mut()) {
            Ok(Number::Integer(n)) => TokenValue::Integer(n),
            Ok(Number::Float(n)) => TokenValue::Float(n),
            Err(_) => {
                return Err(self.error_at(mark, |preview| LexErrorKind::MalformedToken {
                    token: MalformedKind::Number,
                    preview,
                }));
            }
        };
        self.state = LexState::End;
        let kind = match value {
            TokenValue::Float(_) => TokenKind::Float,
            _ => TokenKind::Integer,
        };
        Ok(Token {
            kind,
            value,
            span: self.scanners.current().span_from(mark),
        })
    }

    fn lex_word(&mut self, mark: Mark, command_start: bool) -> Token {
        let cursor = self.scanners.current_mut();
        let mut len = cursor.run_len(0, is_word);
        if matches!(cursor.peek_at(len), Some(b'?' | b'!')) {
            let glued_eq = cursor.peek_at(len + 1) == Some(b'=')
                && !matches!(cursor.peek_at(len + 2), Some(b'=' | b'~' | b'>'));
            if !glued_eq {
                len += 1;
            }
        }
        let start = cursor.pos();
        cursor.advance(len);

        let label_follows = cursor.peek() == Some(b':') && cursor.peek_at(1) != Some(b':');
        let setter = !label_follows
            && self.state == LexState::Fname
            && cursor.peek() == Some(b'=')
            && !matches!(cursor.peek_at(1), Some(b'=' | b'~' | b'>'))
            && !matches!(cursor.source().as_bytes()[start + len - 1], b'?' | b'!');
        if setter {
            cursor.advance(1);
        }
        let word = &cursor.source()[start..cursor.pos()];

        let ctx = WordContext {
            state: self.state,
            command_start,
            label_follows,
            cond: self.cond.is_active(),
            cmdarg: self.cmdarg.is_active(),
            lambda_pending: self.lambda_pending,
        };
        let classified = classifier::classify(word, &ctx, &self.keywords);

        if classified.kind == TokenKind::Label {
            cursor.advance(1);
        }
        if classified.kind == TokenKind::Keyword(KeywordId::DoLambda) {
            self.lambda_pending = false;
        }
        if classified.command_start {
            self.command_start = true;
        }
        self.state = classified.state;
        self.emit_text(classified.kind, word, mark)
    }
}

impl<K: KeywordTable> Iterator for Lexer<'_, K> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(token) if token.is_eof() => {
                self.finished = true;
                None
            }
            Ok(token) => Some(Ok(token)),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<K: KeywordTable> FusedIterator for Lexer<'_, K> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lexemes(input: &str) -> Vec<String> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.lexeme().to_string())
            .collect()
    }

    #[test]
    fn empty_input() {
        assert!(tokenize("").unwrap().is_empty());
        let mut lexer = Lexer::new("");
        assert!(lexer.next_token().unwrap().is_eof());
        assert!(lexer.next_token().unwrap().is_eof());
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let tokens = tokenize("\u{feff}foo").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].lexeme(), "foo");
        assert_eq!(tokens[0].span.start, 3);
    }

    #[test]
    fn command_call() {
        assert_eq!(
            kinds("puts 1"),
            vec![TokenKind::Identifier, TokenKind::Integer]
        );
    }

    #[test]
    fn newline_after_expression_only() {
        assert_eq!(
            kinds("a\n\n\nb"),
            vec![
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Identifier
            ]
        );
        assert_eq!(kinds("\n\na"), vec![TokenKind::Identifier]);
        assert_eq!(
            kinds("a +\nb"),
            vec![TokenKind::Identifier, TokenKind::Plus, TokenKind::Identifier]
        );
    }

    #[test]
    fn comment_ends_statement() {
        assert_eq!(
            kinds("a # note\nb"),
            vec![
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Identifier
            ]
        );
    }

    #[test]
    fn comment_at_end_of_input() {
        let tokens = tokenize("a # note").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[1].lexeme(), "");
        assert_eq!(tokens[1].span.end, 8);
        assert_eq!(lexemes("a # note\n")[1], "\n");
    }

    #[test]
    fn leading_dot_continues_chain() {
        assert_eq!(
            kinds("foo\n  .bar"),
            vec![TokenKind::Identifier, TokenKind::Dot, TokenKind::Identifier]
        );
        assert_eq!(
            kinds("foo\n..bar"),
            vec![
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Dot2,
                TokenKind::Identifier
            ]
        );
    }

    #[test]
    fn line_continuation() {
        assert_eq!(
            kinds("a \\\n+ b"),
            vec![TokenKind::Identifier, TokenKind::Plus, TokenKind::Identifier]
        );
        let tokens = tokenize("a \\\nb").unwrap();
        assert_eq!(tokens[1].span.line, 2);
    }

    #[test]
    fn dangling_backslash() {
        let err = tokenize("a \\ b").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::DanglingBackslash);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn embedded_document_is_skipped() {
        assert_eq!(
            kinds("=begin\nanything\n=end\nfoo"),
            vec![TokenKind::Identifier]
        );
    }

    #[test]
    fn unterminated_embedded_document() {
        let err = tokenize("=begin\nnever closed\n").unwrap_err();
        assert!(matches!(
            err.kind,
            LexErrorKind::UnterminatedLiteral {
                literal: LiteralKind::EmbeddedDocument,
                ..
            }
        ));
    }

    #[test]
    fn op_assign_text_excludes_equals() {
        assert_eq!(lexemes("a += 1"), vec!["a", "+", ""]);
        assert_eq!(lexemes("a **= 2")[1], "**");
        assert_eq!(lexemes("a ||= 2")[1], "||");
        assert_eq!(lexemes("a <<= 2")[1], "<<");
    }

    #[test]
    fn setter_method_name() {
        assert_eq!(lexemes("def name=(v)")[1], "name=");
        assert_eq!(lexemes("def ==(o)")[1], "==");
    }

    #[test]
    fn predicate_before_equals() {
        assert_eq!(
            kinds("a!=b"),
            vec![TokenKind::Identifier, TokenKind::Neq, TokenKind::Identifier]
        );
        assert_eq!(lexemes("a.nil?"), vec!["a", ".", "nil?"]);
    }

    #[test]
    fn label() {
        let tokens = tokenize("foo(a: 1)").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Label);
        assert_eq!(tokens[2].lexeme(), "a");
        assert_eq!(tokens[2].span.end - tokens[2].span.start, 2);
    }

    #[test]
    fn variables() {
        assert_eq!(
            kinds("@a @@b $c $1 $! $_x"),
            vec![
                TokenKind::InstanceVar,
                TokenKind::ClassVar,
                TokenKind::GlobalVar,
                TokenKind::NthRef,
                TokenKind::GlobalVar,
                TokenKind::GlobalVar
            ]
        );
        assert_eq!(lexemes("$12")[0], "12");
    }

    #[test]
    fn bad_global_name() {
        let err = tokenize("$ ").unwrap_err();
        assert!(matches!(
            err.kind,
            LexErrorKind::MalformedToken {
                token: MalformedKind::GlobalVariable,
                ..
            }
        ));
    }

    #[test]
    fn error_after_error_is_sticky() {
        let mut lexer = Lexer::new("\"abc");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::StringBeg);
        let first = lexer.next_token().unwrap_err();
        let second = lexer.next_token().unwrap_err();
        assert_eq!(first, second);
    }

    #[test]
    fn iterator_is_fused_after_error() {
        let mut lexer = Lexer::new("a `unterminated");
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_err());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn error_display() {
        let err = Lexer::new("x = 1abc")
            .with_file("demo.rb")
            .tokenize()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed numeric literal: `1abc` at demo.rb:1"
        );
    }

    #[test]
    fn unexpected_input() {
        let err = tokenize("a\n\u{0}").unwrap_err();
        assert!(matches!(err.kind, LexErrorKind::UnexpectedInput { .. }));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn lambda_brace() {
        assert_eq!(
            kinds("->(x) { x }"),
            vec![
                TokenKind::Lambda,
                TokenKind::LParenCall,
                TokenKind::Identifier,
                TokenKind::RParen,
                TokenKind::LamBeg,
                TokenKind::Identifier,
                TokenKind::RBrace
            ]
        );
    }

    #[test]
    fn stacks_balance_after_brackets() {
        let mut lexer = Lexer::new("foo([1, {a => (2)}])");
        while !lexer.next_token().unwrap().is_eof() {}
        assert_eq!(lexer.cond().depth(), 0);
        assert_eq!(lexer.cmdarg().depth(), 0);
    }
}
