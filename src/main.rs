use std::{
    env,
    fs::File,
    io::{self, BufRead, BufReader},
};

use anyhow::{anyhow, Context};
use kaleidoscope::{
    config::{Config, Input},
    lexer::ReaderChars,
    Lexer, Parser,
};

fn check_source<R: BufRead>(source: &ReaderChars<R>) -> anyhow::Result<()> {
    match source.error() {
        Some(err) => Err(anyhow!("failed to read input: {}", err)),
        None => Ok(()),
    }
}

fn run<R: BufRead>(mut lexer: Lexer<ReaderChars<R>>, config: Config) -> anyhow::Result<()> {
    if config.dump_tokens {
        for token in lexer.by_ref() {
            println!("{}", token?);
        }
        return check_source(lexer.source());
    }

    let mut parser = Parser::new(lexer, config.precedence)?;
    let ast = parser.parse_program();
    check_source(parser.lexer().source())?;
    for node in ast? {
        println!("{}", node);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config = match Config::from_args(env::args_os()) {
        Ok(config) => config,
        Err(err) => match err.downcast::<clap::Error>() {
            Ok(err) => err.exit(),
            Err(err) => return Err(err),
        },
    };

    match config.input.clone() {
        Input::Inline(source) => run(Lexer::from_reader(source.as_bytes()), config),
        Input::File(path) => {
            let file = File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            run(Lexer::from_reader(BufReader::new(file)), config)
        }
        Input::Stdin => {
            let stdin = io::stdin();
            run(Lexer::from_reader(stdin.lock()), config)
        }
    }
}
