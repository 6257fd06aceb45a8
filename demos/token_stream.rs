//! Print the token stream of a small Ruby program.
//!
//! Run with `RUST_LOG=rubylex=trace` to see per-token lexer events.

use rubylex::{Lexer, TokenValue};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const SOURCE: &str = r#"class Greeter
  def initialize(name)
    @name = name
  end

  def greet(*others, &blk)
    puts "Hello, #{@name}!" unless others.empty?
    names = %w(alice bob)
    body = <<~TEXT.strip
      Dear #@name,
      welcome.
    TEXT
    names.each { |n| blk.call(n) if n =~ /^a/i }
  end
end
"#;

fn main() -> Result<(), rubylex::LexError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    for token in Lexer::new(SOURCE).with_file("greeter.rb") {
        let token = token?;
        let value = match &token.value {
            TokenValue::Text(text) => format!("{text:?}"),
            TokenValue::Integer(n) => n.to_string(),
            TokenValue::Float(n) => n.to_string(),
        };
        println!(
            "{:>3}:{:<3} {:<16} {value}",
            token.span.line,
            token.span.column,
            format!("{:?}", token.kind)
        );
    }
    Ok(())
}
