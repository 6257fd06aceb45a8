//! Lexer state: the grammatical expectation at the current position and
//! the two nesting stacks consulted by `do` and argument-prefix
//! disambiguation.

use std::fmt;

/// What the grammar expects next. Identical characters tokenize
/// differently depending on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LexState {
    /// Start of an expression.
    #[default]
    Begin,
    /// After `return`/`break`/`next`, or a unary sign.
    Mid,
    /// After a complete value.
    End,
    /// After a parenthesized argument list.
    EndArg,
    /// After a method definition name.
    EndFn,
    /// After a method name that may take arguments.
    Arg,
    /// After a method name at command start.
    CmdArg,
    /// Expecting a method name (`def`, `alias`, `:`).
    Fname,
    /// After `.` or `::`.
    Dot,
    /// After `class`.
    Class,
    /// After a keyword that starts a value (`if`, `while`, ...).
    Value,
}

impl LexState {
    /// Argument position: a following space may start an argument.
    #[must_use]
    pub const fn is_arg(self) -> bool {
        matches!(self, Self::Arg | Self::CmdArg)
    }

    /// A value has just been completed.
    #[must_use]
    pub const fn is_end(self) -> bool {
        matches!(self, Self::End | Self::EndArg | Self::EndFn)
    }

    /// An expression may start here.
    #[must_use]
    pub const fn is_beg(self) -> bool {
        matches!(self, Self::Begin | Self::Value | Self::Mid | Self::Class)
    }

    /// An operator would be read as a method name.
    #[must_use]
    pub const fn is_after_operator(self) -> bool {
        matches!(self, Self::Fname | Self::Dot)
    }
}

impl fmt::Display for LexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "expr_beg",
            Self::Mid => "expr_mid",
            Self::End => "expr_end",
            Self::EndArg => "expr_endarg",
            Self::EndFn => "expr_endfn",
            Self::Arg => "expr_arg",
            Self::CmdArg => "expr_cmdarg",
            Self::Fname => "expr_fname",
            Self::Dot => "expr_dot",
            Self::Class => "expr_class",
            Self::Value => "expr_value",
        };
        f.write_str(name)
    }
}

/// Stack of boolean frames, one per open bracket.
///
/// An empty stack behaves like an infinite run of `false` frames, so
/// popping past the bottom is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestingStack {
    frames: Vec<bool>,
}

impl NestingStack {
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, open: bool) {
        self.frames.push(open);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Pop the top frame and fold it into the new top, so an open
    /// inner frame keeps the enclosing context open.
    pub fn lexpop(&mut self) {
        if let Some(top) = self.frames.pop() {
            if let Some(below) = self.frames.last_mut() {
                *below |= top;
            }
        }
    }

    /// Whether the innermost frame is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.frames.last().copied().unwrap_or(false)
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
