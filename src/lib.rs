//! Context-sensitive lexer for Ruby source.
//!
//! Ruby cannot be tokenized without context: `foo -1` and `foo - 1`,
//! `x /y/` and `x / y`, `puts [1]` and `a[1]` differ only in spacing and
//! in what came before. The [`Lexer`] tracks a lex state, cond/cmdarg
//! nesting stacks and the literal being scanned, and exposes them so a
//! parser can drive it token by token.
//!
//! # Quick start
//!
//! ## Tokenize a source string
//!
//! ```
//! use rubylex::{tokenize, TokenKind};
//!
//! let tokens = tokenize("puts \"a#{1 + 1}b\"\n").unwrap();
//! let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(kinds[..3], [
//!     TokenKind::Identifier,
//!     TokenKind::StringBeg,
//!     TokenKind::StringContent,
//! ]);
//! assert!(kinds.contains(&TokenKind::StringDbeg));
//! ```
//!
//! ## Pull tokens for a parser
//!
//! ```
//! use rubylex::{Lexer, LexState, TokenKind};
//!
//! let mut lexer = Lexer::new("x = -1").with_file("demo.rb");
//! assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Identifier);
//! assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Assign);
//! assert_eq!(lexer.state(), LexState::Begin);
//! assert_eq!(lexer.next_token().unwrap().kind, TokenKind::UMinus);
//! ```

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools
)]

pub mod classifier;
pub mod cursor;
pub mod keywords;
pub mod lexer;
pub mod literal;
pub mod number;
pub mod state;
pub mod token;

pub use classifier::{Classified, WordContext, classify};
pub use keywords::{Keyword, KeywordId, KeywordTable, RubyKeywords};
pub use lexer::{LexError, LexErrorKind, Lexer, MalformedKind, tokenize};
pub use literal::LiteralKind;
pub use state::{LexState, NestingStack};
pub use token::{Span, Token, TokenKind, TokenValue};
