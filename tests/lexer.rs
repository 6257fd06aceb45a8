//! Lexer entry points, positions, errors and parser hooks.

mod common;

use common::{assert_lossless, kinds, lex, pull};
use rubylex::{
    Keyword, KeywordId, KeywordTable, LexErrorKind, LexState, Lexer, LiteralKind, MalformedKind,
    RubyKeywords, TokenKind, tokenize,
};

// -----------------------------------------------------------
// Entry points.
// -----------------------------------------------------------

#[test]
fn lex_empty_input() {
    assert!(tokenize("").expect("tokenize").is_empty());
}

#[test]
fn lex_only_whitespace_and_comments() {
    assert!(lex("  \t\n\n# comment\n  # another\n").is_empty());
}

#[test]
fn tokenize_matches_pull_loop() {
    let source = "def greet(name)\n  puts \"hi #{name}\"\nend\n";
    let collected = lex(source);

    let mut lexer = Lexer::new(source);
    let mut pulled = Vec::new();
    loop {
        let token = lexer.next_token().expect("next_token");
        if token.is_eof() {
            break;
        }
        pulled.push(token);
    }
    assert_eq!(collected, pulled);
}

#[test]
fn end_of_input_repeats() {
    let mut lexer = Lexer::new("a");
    pull(&mut lexer);
    assert!(lexer.next_token().expect("eof").is_eof());
    assert!(lexer.next_token().expect("eof").is_eof());
}

#[test]
fn iterator_stops_at_end() {
    let lexer = Lexer::new("a + b");
    assert_eq!(lexer.count(), 3);
}

// -----------------------------------------------------------
// Positions.
// -----------------------------------------------------------

#[test]
fn spans_cover_raw_text() {
    let source = "x = \"a\\tb\"";
    let tokens = lex(source);
    let content = &tokens[3];
    assert_eq!(content.kind, TokenKind::StringContent);
    assert_eq!(content.lexeme(), "a\tb");
    assert_eq!(content.span.text(source), "a\\tb");
}

#[test]
fn lines_and_columns() {
    let tokens = lex("foo\n  bar baz");
    assert_eq!((tokens[0].span.line, tokens[0].span.column), (1, 1));
    assert_eq!(tokens[1].kind, TokenKind::Newline);
    assert_eq!((tokens[2].span.line, tokens[2].span.column), (2, 3));
    assert_eq!((tokens[3].span.line, tokens[3].span.column), (2, 7));
}

#[test]
fn line_counts_newlines_inside_literals() {
    let tokens = lex("x = \"a\nb\"\ny");
    let last = tokens.last().expect("tokens");
    assert_eq!(last.lexeme(), "y");
    assert_eq!(last.span.line, 3);
}

#[test]
fn line_counts_skipped_newlines() {
    let tokens = lex("a =\n\n\nb");
    assert_eq!(tokens[2].span.line, 4);
}

#[test]
fn lossless_over_mixed_source() {
    let source = "class Foo < Bar\n  # doc\n  def initialize(a, *rest, &blk)\n    \
                  @a = a ? 1 : 2 # trailing\n    @list = %w(x y)\n  end\nend\n";
    assert_lossless(source, &lex(source));
}

// -----------------------------------------------------------
// Numbers.
// -----------------------------------------------------------

#[test]
fn numeric_values() {
    let tokens = lex("0b101 017 0o17 0x1F 1_000 1.5e2 3.25");
    let ints: Vec<_> = tokens.iter().filter_map(rubylex::Token::as_integer).collect();
    assert_eq!(ints, vec![5, 15, 15, 31, 1000]);
    let floats: Vec<_> = tokens.iter().filter_map(rubylex::Token::as_float).collect();
    assert_eq!(floats, vec![150.0, 3.25]);
}

#[test]
fn integer_then_method_call() {
    assert_eq!(
        kinds("3.times"),
        vec![TokenKind::Integer, TokenKind::Dot, TokenKind::Identifier]
    );
}

#[test]
fn range_of_integers() {
    assert_eq!(
        kinds("1..2"),
        vec![TokenKind::Integer, TokenKind::Dot2, TokenKind::Integer]
    );
}

// -----------------------------------------------------------
// Errors.
// -----------------------------------------------------------

#[test]
fn unterminated_string_reports_kind_and_line() {
    let err = tokenize("x = 1\ny = \"abc\ndef").unwrap_err();
    assert_eq!(
        err.kind,
        LexErrorKind::UnterminatedLiteral {
            literal: LiteralKind::DoubleQuote,
            terminator: "\"".to_string(),
        }
    );
    assert_eq!(err.line, 3);
    assert_eq!(err.file, "(string)");
}

#[test]
fn unterminated_regexp() {
    let err = tokenize("x = /abc").unwrap_err();
    assert!(matches!(
        err.kind,
        LexErrorKind::UnterminatedLiteral {
            literal: LiteralKind::Regexp,
            ..
        }
    ));
}

#[test]
fn unterminated_word_list() {
    let err = tokenize("%w(a b").unwrap_err();
    assert!(matches!(
        err.kind,
        LexErrorKind::UnterminatedLiteral {
            literal: LiteralKind::QWords,
            ..
        }
    ));
}

#[test]
fn unterminated_heredoc_names_terminator() {
    let err = tokenize("x = <<EOS\nbody\n").unwrap_err();
    assert_eq!(
        err.kind,
        LexErrorKind::UnterminatedLiteral {
            literal: LiteralKind::Heredoc,
            terminator: "EOS".to_string(),
        }
    );
    assert_eq!(
        err.to_string(),
        "unterminated heredoc, expected `EOS` before end of input at (string):3"
    );
}

#[test]
fn unterminated_interpolation() {
    let err = tokenize("\"a#{b").unwrap_err();
    assert_eq!(
        err.kind,
        LexErrorKind::UnterminatedLiteral {
            literal: LiteralKind::DoubleQuote,
            terminator: "\"".to_string(),
        }
    );
    assert_eq!(err.line, 1);
}

#[test]
fn unterminated_heredoc_interpolation() {
    let err = tokenize("x = <<EOS\nhi #{a\n").unwrap_err();
    assert_eq!(
        err.kind,
        LexErrorKind::UnterminatedLiteral {
            literal: LiteralKind::Heredoc,
            terminator: "EOS".to_string(),
        }
    );
}

#[test]
fn closed_interpolation_reaches_end_of_input() {
    let mut lexer = Lexer::new("\"a#{b}\"");
    while !lexer.next_token().expect("next_token").is_eof() {}
    assert_eq!(lexer.active_literal(), None);
}

#[test]
fn malformed_numbers() {
    for source in ["1abc", "0x", "0b2", "12_a"] {
        let err = tokenize(source).unwrap_err();
        assert!(
            matches!(
                err.kind,
                LexErrorKind::MalformedToken {
                    token: MalformedKind::Number,
                    ..
                }
            ),
            "{source}: {err}"
        );
    }
}

#[test]
fn malformed_number_preview_is_five_chars() {
    let err = tokenize("x = 9abcdefgh").unwrap_err();
    assert_eq!(
        err.kind,
        LexErrorKind::MalformedToken {
            token: MalformedKind::Number,
            preview: "9abcd".to_string(),
        }
    );
}

#[test]
fn malformed_index_operator() {
    let err = tokenize("def [x").unwrap_err();
    assert!(matches!(
        err.kind,
        LexErrorKind::MalformedToken {
            token: MalformedKind::IndexOperator,
            ..
        }
    ));
}

#[test]
fn malformed_global() {
    let err = tokenize("puts $").unwrap_err();
    assert!(matches!(
        err.kind,
        LexErrorKind::MalformedToken {
            token: MalformedKind::GlobalVariable,
            ..
        }
    ));
}

#[test]
fn unexpected_input() {
    let err = tokenize("a\n\u{1}b").unwrap_err();
    assert_eq!(
        err.kind,
        LexErrorKind::UnexpectedInput {
            preview: "\u{1}b".to_string(),
        }
    );
    assert_eq!(err.line, 2);
}

#[test]
fn non_ascii_outside_literals_is_unexpected() {
    let err = tokenize("caf\u{e9} = 1").unwrap_err();
    assert_eq!(
        err.kind,
        LexErrorKind::UnexpectedInput {
            preview: "\u{e9} = 1".to_string(),
        }
    );
    assert!(tokenize("\u{3bb} = 1").is_err());
}

#[test]
fn non_ascii_inside_literals() {
    let tokens = lex("x = \"caf\u{e9}\" # na\u{ef}ve\n");
    assert_eq!(tokens[3].lexeme(), "caf\u{e9}");
    assert_eq!(tokens[5].kind, TokenKind::Newline);
}

#[test]
fn dangling_backslash() {
    let err = tokenize("a \\b").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::DanglingBackslash);
}

#[test]
fn crlf_line_continuation() {
    assert_eq!(
        kinds("a \\\r\n+ b"),
        vec![TokenKind::Identifier, TokenKind::Plus, TokenKind::Identifier]
    );
}

#[test]
fn error_display_uses_file_name() {
    let err = Lexer::new("x = 1\n\"open")
        .with_file("app.rb")
        .tokenize()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "unterminated string, expected `\"` before end of input at app.rb:2"
    );
}

#[test]
fn iterator_fuses_after_error() {
    let mut lexer = Lexer::new("x = 0b");
    assert!(lexer.next().expect("x").is_ok());
    assert!(lexer.next().expect("=").is_ok());
    assert!(lexer.next().expect("error").is_err());
    assert!(lexer.next().is_none());
    assert!(lexer.next().is_none());
}

// -----------------------------------------------------------
// Embedded documents.
// -----------------------------------------------------------

#[test]
fn embedded_document_skipped() {
    let tokens = lex("=begin\ncomment\n=end trailing\nfoo");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].lexeme(), "foo");
    assert_eq!(tokens[0].span.line, 4);
}

#[test]
fn embedded_document_at_end_of_input() {
    assert!(lex("a\n=begin\nx\n=end").iter().all(|t| t.span.line == 1));
}

#[test]
fn equals_begin_mid_line_is_not_a_document() {
    assert_eq!(
        kinds("a =begin"),
        vec![
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::Keyword(KeywordId::Begin)
        ]
    );
}

// -----------------------------------------------------------
// Parser hooks.
// -----------------------------------------------------------

#[test]
fn set_state_changes_disambiguation() {
    let mut lexer = Lexer::new("x -1");
    pull(&mut lexer);
    lexer.set_state(LexState::End);
    assert_eq!(pull(&mut lexer).kind, TokenKind::Minus);
}

#[test]
fn stacks_are_visible_to_the_parser() {
    let mut lexer = Lexer::new("foo(bar");
    pull(&mut lexer);
    assert_eq!(lexer.cond().depth(), 0);
    pull(&mut lexer);
    assert_eq!(lexer.cond().depth(), 1);
    assert_eq!(lexer.cmdarg().depth(), 1);
    assert!(!lexer.cond().is_active());

    lexer.cond_push(true);
    assert!(lexer.cond().is_active());
    lexer.cond_lexpop();
    assert!(lexer.cond().is_active());
    lexer.cond_pop();
    assert_eq!(lexer.cond().depth(), 0);

    lexer.cmdarg_push(true);
    lexer.cmdarg_pop();
    lexer.cmdarg_lexpop();
    assert_eq!(lexer.cmdarg().depth(), 0);
}

#[test]
fn active_literal_tracks_interpolation() {
    let mut lexer = Lexer::new("\"a#{b}c\"");
    assert_eq!(lexer.active_literal(), None);
    pull(&mut lexer);
    assert_eq!(lexer.active_literal(), Some(LiteralKind::DoubleQuote));
    pull(&mut lexer);
    assert_eq!(pull(&mut lexer).kind, TokenKind::StringDbeg);
    assert_eq!(lexer.active_literal(), None);
    pull(&mut lexer);
    assert_eq!(pull(&mut lexer).kind, TokenKind::RBrace);
    assert_eq!(lexer.active_literal(), Some(LiteralKind::DoubleQuote));
}

#[test]
fn line_hook_follows_the_cursor() {
    let mut lexer = Lexer::new("a\nb\nc");
    assert_eq!(lexer.line(), 1);
    pull(&mut lexer);
    pull(&mut lexer);
    pull(&mut lexer);
    assert_eq!(lexer.line(), 2);
}

// -----------------------------------------------------------
// Keyword table collaborator.
// -----------------------------------------------------------

struct NoKeywords;

impl KeywordTable for NoKeywords {
    fn lookup(&self, _spelling: &str) -> Option<&Keyword> {
        None
    }
}

/// Ruby keywords plus `unless_nil`.
struct Extended {
    base: RubyKeywords,
    extra: Keyword,
}

impl KeywordTable for Extended {
    fn lookup(&self, spelling: &str) -> Option<&Keyword> {
        if spelling == self.extra.name {
            return Some(&self.extra);
        }
        self.base.lookup(spelling)
    }
}

#[test]
fn custom_table_without_keywords() {
    let tokens = Lexer::new("if x")
        .with_keywords(NoKeywords)
        .tokenize()
        .expect("tokenize");
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
}

#[test]
fn custom_table_with_extra_keyword() {
    let table = Extended {
        base: RubyKeywords,
        extra: Keyword {
            name: "unless_nil",
            ids: [KeywordId::Unless, KeywordId::UnlessMod],
            state: LexState::Begin,
        },
    };
    let tokens = Lexer::new("x unless_nil y")
        .with_keywords(&table)
        .tokenize()
        .expect("tokenize");
    assert_eq!(tokens[1].kind, TokenKind::Keyword(KeywordId::UnlessMod));
    assert_eq!(tokens[1].lexeme(), "unless_nil");
}
