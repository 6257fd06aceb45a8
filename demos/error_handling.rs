//! Demonstrate error handling for invalid Ruby input.

use rubylex::{LexErrorKind, Lexer};

fn main() {
    let inputs = [
        ("unterminated.rb", "x = 1\nputs \"unclosed\n"),
        ("heredoc.rb", "text = <<EOS\nno terminator\n"),
        ("number.rb", "limit = 10abc\n"),
        ("global.rb", "puts $\n"),
        ("backslash.rb", "a = 1 \\ 2\n"),
    ];

    for (file, source) in inputs {
        match Lexer::new(source).with_file(file).tokenize() {
            Ok(tokens) => println!("{file}: {} tokens (unexpected)", tokens.len()),
            Err(e) => {
                println!("Lex error: {e}");
                match &e.kind {
                    LexErrorKind::UnterminatedLiteral {
                        literal,
                        terminator,
                    } => println!("  {literal} never closed, wanted `{terminator}`"),
                    LexErrorKind::MalformedToken { token, preview } => {
                        println!("  bad {token} near `{preview}`");
                    }
                    LexErrorKind::UnexpectedInput { preview } => {
                        println!("  no rule for `{preview}`");
                    }
                    LexErrorKind::DanglingBackslash => println!("  stray backslash"),
                }
                println!("  Location: {}:{}", e.file, e.line);
            }
        }
        println!();
    }
}
