//! Drive the lexer the way a grammar does, pushing the cond and cmdarg
//! stacks so `do` resolves to the right keyword variant.

use rubylex::{KeywordId, LexState, Lexer, TokenKind};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const SOURCE: &str = "while busy? do\n  work\nend\nrun job do |j|\n  j.finish\nend\n";

fn main() -> Result<(), rubylex::LexError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let mut lexer = Lexer::new(SOURCE).with_file("hooks.rb");
    let mut command_args = false;

    loop {
        let token = lexer.next_token()?;
        match token.kind {
            TokenKind::EndOfInput => break,
            TokenKind::Keyword(KeywordId::While | KeywordId::Until) => lexer.cond_push(true),
            TokenKind::Keyword(KeywordId::DoCond) => lexer.cond_pop(),
            TokenKind::Identifier
                if !command_args
                    && !lexer.cond().is_active()
                    && lexer.state() == LexState::CmdArg =>
            {
                lexer.cmdarg_push(true);
                command_args = true;
            }
            TokenKind::Newline | TokenKind::Keyword(KeywordId::DoBlock) if command_args => {
                lexer.cmdarg_pop();
                command_args = false;
            }
            _ => {}
        }
        println!(
            "line {:<2} {:<24} state={:<10} cond={} cmdarg={}",
            token.span.line,
            format!("{:?}", token.kind),
            lexer.state().to_string(),
            lexer.cond().is_active(),
            lexer.cmdarg().is_active()
        );
    }
    Ok(())
}
