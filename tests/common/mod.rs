#![allow(dead_code)]

use rubylex::{Lexer, Token, TokenKind, tokenize};

pub fn lex(input: &str) -> Vec<Token> {
    tokenize(input).unwrap_or_else(|e| panic!("tokenize failed: {e}\n--- input ---\n{input}"))
}

pub fn kinds(input: &str) -> Vec<TokenKind> {
    lex(input).into_iter().map(|t| t.kind).collect()
}

pub fn lexemes(input: &str) -> Vec<String> {
    lex(input)
        .into_iter()
        .map(|t| t.lexeme().to_string())
        .collect()
}

/// Kind of the first token whose text is `lexeme`.
pub fn kind_of(input: &str, lexeme: &str) -> TokenKind {
    lex(input)
        .into_iter()
        .find(|t| t.lexeme() == lexeme)
        .map(|t| t.kind)
        .unwrap_or_else(|| panic!("no `{lexeme}` token in {input:?}"))
}

/// Pull the next token, panicking on error or end of input.
pub fn pull(lexer: &mut Lexer<'_>) -> Token {
    let token = lexer.next_token().expect("next_token");
    assert!(!token.is_eof(), "unexpected end of input");
    token
}

/// Assert every byte of `source` not covered by a token span is
/// whitespace, a line continuation, or part of a comment.
pub fn assert_lossless(source: &str, tokens: &[Token]) {
    let mut spans: Vec<_> = tokens.iter().map(|t| t.span).collect();
    spans.sort_by_key(|s| (s.start, s.end));

    let mut pos = 0;
    for span in &spans {
        assert!(
            span.start >= pos,
            "overlapping spans at {}..{} in {source:?}",
            span.start,
            span.end
        );
        assert_gap(source, &source[pos..span.start]);
        pos = span.end;
    }
    assert_gap(source, &source[pos..]);
}

fn assert_gap(source: &str, gap: &str) {
    for line in gap.split('\n') {
        let line = line.trim().trim_end_matches('\\').trim();
        assert!(
            line.is_empty() || line.starts_with('#'),
            "uncovered text {gap:?} in {source:?}"
        );
    }
}
