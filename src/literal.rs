//! Quoted literals: strings, symbols, word lists, xstrings, regexps and
//! heredocs.
//!
//! While a [`StringTerm`] is active the lexer hands every call to
//! [`Lexer::lex_literal`], which yields content, interpolation markers
//! and finally the closing token.

use std::fmt;

use tracing::debug;

use crate::cursor::{Cursor, Mark};
use crate::keywords::KeywordTable;
use crate::lexer::{LexErrorKind, Lexer};
use crate::state::LexState;
use crate::token::{Token, TokenKind};

/// Kind of quoted literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    /// `"..."`, `%Q(...)`, `%(...)`
    DoubleQuote,
    /// `'...'`, `%q(...)`
    SingleQuote,
    /// `:'...'`
    Symbol,
    /// `:"..."`
    DoubleSymbol,
    /// `%W(...)`
    Words,
    /// `%w(...)`
    QWords,
    /// `%I(...)`
    Symbols,
    /// `%i(...)`
    QSymbols,
    /// `` `...` ``, `%x(...)`
    XString,
    /// `/.../`, `%r(...)`
    Regexp,
    /// `<<ID ... ID`
    Heredoc,
    /// `=begin ... =end`. Never active; only reported in errors.
    EmbeddedDocument,
}

impl LiteralKind {
    /// Whether `#{}` and `#@var` are recognized inside the literal.
    #[must_use]
    pub const fn expands(self) -> bool {
        matches!(
            self,
            Self::DoubleQuote
                | Self::DoubleSymbol
                | Self::Words
                | Self::Symbols
                | Self::XString
                | Self::Regexp
                | Self::Heredoc
        )
    }

    /// Whether whitespace separates elements.
    #[must_use]
    pub const fn is_word_list(self) -> bool {
        matches!(
            self,
            Self::Words | Self::QWords | Self::Symbols | Self::QSymbols
        )
    }
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DoubleQuote | Self::SingleQuote => "string",
            Self::Symbol | Self::DoubleSymbol => "symbol",
            Self::Words | Self::QWords => "word list",
            Self::Symbols | Self::QSymbols => "symbol list",
            Self::XString => "xstring",
            Self::Regexp => "regexp",
            Self::Heredoc => "heredoc",
            Self::EmbeddedDocument => "embedded document",
        };
        f.write_str(name)
    }
}

/// Closing delimiter for a percent-literal opener.
pub(crate) const fn closing_delimiter(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        b'<' => b'>',
        other => other,
    }
}

/// Characters that may delimit a percent literal.
pub(crate) const fn is_delimiter(b: u8) -> bool {
    b.is_ascii_punctuation()
}

pub(crate) const fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Punctuation that forms a complete global variable after `$`.
pub(crate) const fn is_gvar_punct(b: u8) -> bool {
    matches!(
        b,
        b'+' | b'\''
            | b'`'
            | b'&'
            | b'!'
            | b'@'
            | b'"'
            | b'~'
            | b'*'
            | b'$'
            | b'?'
            | b'/'
            | b'\\'
            | b':'
            | b';'
            | b'='
            | b'.'
            | b','
            | b'<'
            | b'>'
            | b'_'
    )
}

/// Heredoc-specific part of a [`StringTerm`].
#[derive(Debug, Clone)]
pub(crate) struct Heredoc<'src> {
    pub terminator: &'src str,
    /// Quoted with `'`: no interpolation, escapes kept verbatim.
    pub raw: bool,
    /// Code that followed the opener on its line.
    pub tail: Option<Cursor<'src>>,
}

/// The literal currently being scanned.
#[derive(Debug, Clone)]
pub(crate) struct StringTerm<'src> {
    pub kind: LiteralKind,
    pub open: u8,
    pub close: u8,
    /// Embedded opening delimiters not yet closed.
    pub nesting: usize,
    /// A word list has emitted the separator before its final delimiter.
    pub space_emitted: bool,
    pub heredoc: Option<Heredoc<'src>>,
}

impl<'src> StringTerm<'src> {
    pub const fn new(kind: LiteralKind, open: u8, close: u8) -> Self {
        Self {
            kind,
            open,
            close,
            nesting: 0,
            space_emitted: false,
            heredoc: None,
        }
    }

    pub const fn heredoc(terminator: &'src str, raw: bool, tail: Option<Cursor<'src>>) -> Self {
        Self {
            kind: LiteralKind::Heredoc,
            open: b'\n',
            close: b'\n',
            nesting: 0,
            space_emitted: false,
            heredoc: Some(Heredoc {
                terminator,
                raw,
                tail,
            }),
        }
    }

    pub const fn expands(&self) -> bool {
        match &self.heredoc {
            Some(heredoc) => !heredoc.raw,
            None => self.kind.expands(),
        }
    }

    /// Delimiters are a bracket pair, so embedded pairs nest.
    pub const fn balances(&self) -> bool {
        self.open != self.close
    }

    pub fn terminator(&self) -> String {
        self.heredoc.as_ref().map_or_else(
            || char::from(self.close).to_string(),
            |heredoc| heredoc.terminator.to_string(),
        )
    }
}

/// A literal suspended by `#{`, resumed by the matching `}`.
#[derive(Debug, Clone)]
pub(crate) struct Suspended<'src> {
    pub term: StringTerm<'src>,
    pub brace_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    /// `#{`
    Block,
    /// `#@ivar`, `#@@cvar`, `#$gvar`
    Variable,
}

fn interpolation_at(cursor: &Cursor<'_>, close: u8) -> Option<Interpolation> {
    if cursor.peek() != Some(b'#') {
        return None;
    }
    match cursor.peek_at(1)? {
        b'{' => Some(Interpolation::Block),
        b'@' => {
            let name = if cursor.peek_at(2) == Some(b'@') { 3 } else { 2 };
            cursor
                .peek_at(name)
                .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
                .then_some(Interpolation::Variable)
        }
        b'$' => cursor
            .peek_at(2)
            .is_some_and(|b| b != close && (is_word(b) || is_gvar_punct(b)))
            .then_some(Interpolation::Variable),
        _ => None,
    }
}

/// Length of `[ \t]*TERMINATOR` when the cursor sits at the start of a
/// heredoc terminator line.
fn terminator_len(cursor: &Cursor<'_>, terminator: &str) -> Option<usize> {
    if !cursor.at_line_start() {
        return None;
    }
    let indent = cursor.run_len(0, |b| b == b' ' || b == b'\t');
    if !cursor.rest()[indent..].starts_with(terminator) {
        return None;
    }
    let len = indent + terminator.len();
    let cr = cursor.run_len(len, |b| b == b'\r');
    match cursor.peek_at(len + cr) {
        None | Some(b'\n') => Some(len),
        Some(_) => None,
    }
}

/// Decode the escape after a consumed backslash.
fn read_escape(cursor: &mut Cursor<'_>, verbatim: bool, buf: &mut String) {
    let Some(c) = cursor.bump() else {
        return;
    };
    if verbatim {
        buf.push('\\');
        buf.push(c);
        return;
    }
    buf.push(match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        other => other,
    });
}

impl<'src, K: KeywordTable> Lexer<'src, K> {
    /// Activate `term` and emit its opening token, covering `mark..`.
    pub(crate) fn open_literal(&mut self, term: StringTerm<'src>, kind: TokenKind, mark: Mark) -> Token {
        if term.kind.is_word_list() {
            self.scanners
                .current_mut()
                .eat_while(|b| b.is_ascii_whitespace());
        }
        let token = self.emit(kind, mark);
        self.term = Some(term);
        token
    }

    /// Heredoc opener after `<<`. Returns `None`, consuming nothing,
    /// when no identifier follows.
    pub(crate) fn lex_heredoc_open(&mut self, mark: Mark) -> Option<Token> {
        let cursor = self.scanners.current_mut();
        let after_op = cursor.mark();
        if !cursor.eat(b'-') {
            cursor.eat(b'~');
        }
        let quote = match cursor.peek() {
            Some(q @ (b'\'' | b'"')) => {
                cursor.advance(1);
                Some(q)
            }
            _ => None,
        };
        let ident = cursor.eat_while(is_word);
        if ident.is_empty() || !quote.is_none_or(|q| cursor.eat(q)) {
            cursor.reset(after_op);
            return None;
        }
        let span = cursor.span_from(mark);

        let source = cursor.source();
        let start = cursor.pos();
        let line_end = cursor.line_end();
        let rest = &source[start..line_end];
        let tail = (!rest.is_empty() && rest != "\n").then(|| {
            debug!(line = cursor.line(), tail = rest.trim_end(), "heredoc parks trailing code");
            Cursor::sub(source, start, line_end, cursor.line(), cursor.column())
        });
        cursor.advance(line_end - start);

        self.term = Some(StringTerm::heredoc(ident, quote == Some(b'\''), tail));
        Some(Token::text(TokenKind::StringBeg, ident, span))
    }

    /// Produce the next token of the active literal.
    pub(crate) fn lex_literal(&mut self, mut term: StringTerm<'src>) -> Result<Token, crate::LexError> {
        let mark = self.scanners.current().mark();

        let heredoc_end = term
            .heredoc
            .as_ref()
            .and_then(|heredoc| terminator_len(self.scanners.current(), heredoc.terminator));
        if let Some(len) = heredoc_end {
            self.scanners.current_mut().advance(len);
            let token = self.emit(TokenKind::StringEnd, mark);
            if let Some(tail) = term.heredoc.and_then(|heredoc| heredoc.tail) {
                debug!(line = tail.line(), "resuming heredoc trailing code");
                self.scanners.push(tail);
            }
            self.state = LexState::End;
            return Ok(token);
        }

        let mut space = false;
        if term.kind.is_word_list() {
            let ws = self
                .scanners
                .current_mut()
                .eat_while(|b| b.is_ascii_whitespace());
            space = !ws.is_empty();
        }

        let cursor = self.scanners.current_mut();
        if term.heredoc.is_none() && term.nesting == 0 && cursor.peek() == Some(term.close) {
            if term.kind.is_word_list() && !term.space_emitted {
                term.space_emitted = true;
                self.term = Some(term);
                return Ok(self.emit_text(TokenKind::Space, " ", mark));
            }
            cursor.advance(1);
            self.state = LexState::End;
            if term.kind == LiteralKind::Regexp {
                let flags = cursor.eat_while(|b| b.is_ascii_alphabetic());
                let span = cursor.span_from(mark);
                return Ok(Token::text(TokenKind::RegexpEnd, flags, span));
            }
            return Ok(self.emit(TokenKind::StringEnd, mark));
        }

        if space {
            self.term = Some(term);
            return Ok(self.emit_text(TokenKind::Space, " ", mark));
        }

        if term.expands() {
            match interpolation_at(cursor, term.close) {
                Some(Interpolation::Block) => {
                    cursor.advance(2);
                    return Ok(self.begin_interpolation(term, mark));
                }
                Some(Interpolation::Variable) => {
                    cursor.advance(1);
                    self.dvar_term = Some(term);
                    self.state = LexState::Begin;
                    return Ok(self.emit(TokenKind::StringDvar, mark));
                }
                None => {}
            }
        }

        let mut buf = String::new();
        if term.heredoc.is_some() {
            Self::heredoc_content(cursor, &term, &mut buf);
        } else {
            Self::string_content(cursor, &mut term, &mut buf);
        }

        if self.scanners.current().is_eof() {
            return Err(self.error(LexErrorKind::UnterminatedLiteral {
                literal: term.kind,
                terminator: term.terminator(),
            }));
        }

        let token = self.emit_text(TokenKind::StringContent, buf, mark);
        self.term = Some(term);
        Ok(token)
    }

    fn begin_interpolation(&mut self, term: StringTerm<'src>, mark: Mark) -> Token {
        self.brace_depth += 1;
        self.cond.push(false);
        self.cmdarg.push(false);
        debug!(
            literal = %term.kind,
            depth = self.brace_depth,
            "interpolation suspends literal"
        );
        self.interpolations.push(Suspended {
            term,
            brace_depth: self.brace_depth,
        });
        self.state = LexState::Begin;
        self.command_start = true;
        self.emit(TokenKind::StringDbeg, mark)
    }

    /// Accumulate content of a delimited literal up to the next
    /// delimiter, interpolation, or word separator.
    fn string_content(cursor: &mut Cursor<'src>, term: &mut StringTerm<'src>, buf: &mut String) {
        let expands = term.expands();
        let words = term.kind.is_word_list();
        let balances = term.balances();
        let verbatim = term.kind == LiteralKind::Regexp;
        let (open, close) = (term.open, term.close);
        let special = |b: u8| {
            b == close
                || (balances && b == open)
                || matches!(b, b'\\' | b'#' | b'\n')
                || (words && b.is_ascii_whitespace())
        };

        while let Some(b) = cursor.peek() {
            if b == close {
                if term.nesting == 0 {
                    break;
                }
                term.nesting -= 1;
                buf.push(char::from(b));
                cursor.advance(1);
            } else if balances && b == open {
                term.nesting += 1;
                buf.push(char::from(b));
                cursor.advance(1);
            } else if words && b.is_ascii_whitespace() {
                break;
            } else if expands && interpolation_at(cursor, close).is_some() {
                break;
            } else if b == b'\\' {
                cursor.advance(1);
                read_escape(cursor, verbatim, buf);
            } else {
                let run = cursor.eat_while(|b| !special(b));
                if run.is_empty() {
                    buf.push(char::from(b));
                    cursor.advance(1);
                } else {
                    buf.push_str(run);
                }
            }
        }
    }

    /// Accumulate heredoc body up to the terminator line or an
    /// interpolation.
    fn heredoc_content(cursor: &mut Cursor<'src>, term: &StringTerm<'src>, buf: &mut String) {
        let Some(heredoc) = &term.heredoc else {
            return;
        };
        let expands = !heredoc.raw;

        while let Some(b) = cursor.peek() {
            if b == b'\n' {
                buf.push('\n');
                cursor.advance(1);
            } else if terminator_len(cursor, heredoc.terminator).is_some() {
                break;
            } else if expands && interpolation_at(cursor, b'\n').is_some() {
                break;
            } else if b == b'\\' {
                cursor.advance(1);
                read_escape(cursor, heredoc.raw, buf);
            } else {
                let run = cursor.eat_while(|b| !matches!(b, b'\n' | b'#' | b'\\'));
                if run.is_empty() {
                    buf.push(char::from(b));
                    cursor.advance(1);
                } else {
                    buf.push_str(run);
                }
            }
        }
    }
}
