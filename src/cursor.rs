//! Positional views over the source text.

use crate::token::Span;

/// Cursor over a byte range of the source.
///
/// Every cursor sees the whole source, so offsets and spans are always
/// absolute, but it only scans `pos..end`. Line and column tracking is
/// per cursor: a parked heredoc tail keeps the position of the line it
/// was cut from.
#[derive(Debug, Clone)]
pub struct Cursor<'src> {
    source: &'src str,
    pos: usize,
    end: usize,
    line: usize,
    column: usize,
}

impl<'src> Cursor<'src> {
    #[must_use]
    pub const fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            end: source.len(),
            line: 1,
            column: 1,
        }
    }

    /// Cursor over `start..end`, starting at the given line/column.
    #[must_use]
    pub const fn sub(source: &'src str, start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            source,
            pos: start,
            end,
            line,
            column,
        }
    }

    #[must_use]
    pub const fn pos(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }

    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.end
    }

    /// Unconsumed text.
    #[must_use]
    pub fn rest(&self) -> &'src str {
        &self.source[self.pos..self.end]
    }

    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        let i = self.pos + offset;
        if i < self.end {
            Some(self.source.as_bytes()[i])
        } else {
            None
        }
    }

    #[must_use]
    pub fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    #[must_use]
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    /// Whether the next byte satisfies `pred`. False at end of input.
    #[must_use]
    pub fn check(&self, pred: impl Fn(u8) -> bool) -> bool {
        self.peek().is_some_and(pred)
    }

    /// Whether the cursor sits at the start of a physical line.
    #[must_use]
    pub fn at_line_start(&self) -> bool {
        self.pos == 0 || self.source.as_bytes()[self.pos - 1] == b'\n'
    }

    /// Advance over `n` bytes, tracking lines.
    pub fn advance(&mut self, n: usize) {
        let stop = (self.pos + n).min(self.end);
        for &b in &self.source.as_bytes()[self.pos..stop] {
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos = stop;
    }

    /// Consume one character.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.advance(c.len_utf8());
        Some(c)
    }

    /// Consume `byte` if it is next.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.advance(1);
            true
        } else {
            false
        }
    }

    /// Consume `prefix` if it is next.
    pub fn eat_str(&mut self, prefix: &str) -> bool {
        if self.starts_with(prefix) {
            self.advance(prefix.len());
            true
        } else {
            false
        }
    }

    /// Consume the longest run of bytes satisfying `pred`.
    pub fn eat_while(&mut self, pred: impl Fn(u8) -> bool) -> &'src str {
        let start = self.pos;
        let len = self.rest().bytes().take_while(|&b| pred(b)).count();
        self.advance(len);
        &self.source[start..self.pos]
    }

    /// Length of the run of bytes satisfying `pred`, starting `offset`
    /// bytes ahead, without consuming anything.
    #[must_use]
    pub fn run_len(&self, offset: usize, pred: impl Fn(u8) -> bool) -> usize {
        self.rest()
            .bytes()
            .skip(offset)
            .take_while(|&b| pred(b))
            .count()
    }

    /// Byte offset of the next `\n` (inclusive end) or the range end.
    #[must_use]
    pub fn line_end(&self) -> usize {
        self.rest()
            .find('\n')
            .map_or(self.end, |i| self.pos + i + 1)
    }

    /// Span from a previously captured mark to the current position.
    #[must_use]
    pub const fn span_from(&self, mark: Mark) -> Span {
        Span {
            start: mark.pos,
            end: self.pos,
            line: mark.line,
            column: mark.column,
        }
    }

    #[must_use]
    pub const fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    /// Rewind to a mark taken on this cursor.
    pub const fn reset(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.line = mark.line;
        self.column = mark.column;
    }

    /// Up to `n` characters of unconsumed input, for diagnostics.
    #[must_use]
    pub fn preview(&self, n: usize) -> String {
        self.rest().chars().take(n).collect()
    }

    #[must_use]
    pub const fn source(&self) -> &'src str {
        self.source
    }
}

/// Saved cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pos: usize,
    line: usize,
    column: usize,
}

/// Stack of cursors.
///
/// The bottom entry scans the primary source and is never removed.
/// Entries above it are heredoc tails: code that followed a heredoc
/// opener on the same line, replayed once the body is consumed.
#[derive(Debug, Clone)]
pub struct ScannerStack<'src> {
    primary: Cursor<'src>,
    parked: Vec<Cursor<'src>>,
}

impl<'src> ScannerStack<'src> {
    #[must_use]
    pub const fn new(primary: Cursor<'src>) -> Self {
        Self {
            primary,
            parked: Vec::new(),
        }
    }

    #[must_use]
    pub fn current(&self) -> &Cursor<'src> {
        self.parked.last().unwrap_or(&self.primary)
    }

    pub fn current_mut(&mut self) -> &mut Cursor<'src> {
        self.parked.last_mut().unwrap_or(&mut self.primary)
    }

    pub fn push(&mut self, cursor: Cursor<'src>) {
        self.parked.push(cursor);
    }

    /// Drop the top cursor. Returns false, leaving the stack unchanged,
    /// when only the primary cursor remains.
    pub fn pop(&mut self) -> bool {
        self.parked.pop().is_some()
    }
}
