use std::path::PathBuf;

use clap::{App, Arg, ArgMatches};
use lazy_static::lazy_static;
use regex::Regex;

use crate::parser::PrecedenceTable;

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid precedence override {0:?}, expected OP=N")]
    InvalidPrecedence(String),
}

lazy_static! {
    static ref PREC_RE: Regex = Regex::new(r"^(\S)=(-?\d+)$").unwrap();
}

/// Where the source text comes from.
#[derive(Debug, PartialEq, Clone)]
pub enum Input {
    Inline(String),
    File(PathBuf),
    Stdin,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Config {
    pub input: Input,
    pub dump_tokens: bool,
    pub precedence: PrecedenceTable,
}

/// parse a single `OP=N` override
pub fn parse_precedence(spec: &str) -> Result<(char, i32), ConfigError> {
    let invalid = || ConfigError::InvalidPrecedence(spec.to_string());
    let caps = PREC_RE.captures(spec).ok_or_else(invalid)?;
    let op = caps[1].chars().next().ok_or_else(invalid)?;
    if PrecedenceTable::is_reserved(op) {
        return Err(invalid());
    }
    let precedence = caps[2].parse().map_err(|_| invalid())?;
    Ok((op, precedence))
}

/// apply overrides on top of the default table
pub fn precedence_table<'a, S>(overrides: S) -> Result<PrecedenceTable, ConfigError>
where
    S: IntoIterator<Item = &'a str>,
{
    let mut table = PrecedenceTable::default();
    for spec in overrides {
        let (op, precedence) = parse_precedence(spec)?;
        table.insert(op, precedence);
    }
    Ok(table)
}

pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("file")
                .short("f")
                .long("file")
                .value_name("PATH")
                .takes_value(true)
                .conflicts_with("source")
                .help("read the program from a file"),
        )
        .arg(
            Arg::with_name("tokens")
                .short("t")
                .long("tokens")
                .help("print the token stream instead of the syntax tree"),
        )
        .arg(
            Arg::with_name("prec")
                .short("p")
                .long("prec")
                .value_name("OP=N")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("set the precedence of a binary operator"),
        )
        .arg(
            Arg::with_name("source")
                .multiple(true)
                .help("program text; stdin is read when neither this nor --file is given"),
        )
}

impl Config {
    pub fn from_matches(matches: &ArgMatches<'_>) -> Result<Self, ConfigError> {
        let input = if let Some(path) = matches.value_of("file") {
            Input::File(PathBuf::from(path))
        } else if let Some(words) = matches.values_of("source") {
            Input::Inline(words.collect::<Vec<_>>().join(" "))
        } else {
            Input::Stdin
        };

        let precedence = precedence_table(matches.values_of("prec").into_iter().flatten())?;

        Ok(Self {
            input,
            dump_tokens: matches.is_present("tokens"),
            precedence,
        })
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, anyhow::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = app().get_matches_from_safe(args)?;
        Ok(Self::from_matches(&matches)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_precedence_works() {
        assert_eq!(parse_precedence("%=40"), Ok(('%', 40)));
        assert_eq!(parse_precedence("<=-1"), Ok(('<', -1)));
        assert_eq!(
            parse_precedence("+"),
            Err(ConfigError::InvalidPrecedence("+".to_string()))
        );
        assert_eq!(
            parse_precedence("ab=3"),
            Err(ConfigError::InvalidPrecedence("ab=3".to_string()))
        );
    }

    #[test]
    fn structural_punctuation_is_rejected() {
        for spec in &[",=5", "(=5", ")=5", ";=5"] {
            assert_eq!(
                parse_precedence(spec),
                Err(ConfigError::InvalidPrecedence(spec.to_string()))
            );
        }
        assert!(precedence_table(vec!["%=10", ",=5"]).is_err());
        assert!(Config::from_args(vec!["kaleidoscope", "-p", ",=5", "x"]).is_err());
    }

    #[test]
    fn overrides_extend_defaults() {
        let table = precedence_table(vec!["%=40", "+=50"]).unwrap();
        assert_eq!(table.get('%'), 40);
        assert_eq!(table.get('+'), 50);
        assert_eq!(table.get('*'), 40);
    }

    #[test]
    fn inline_source_from_args() {
        let config = Config::from_args(vec!["kaleidoscope", "-p", "%=30", "1", "+", "2"]).unwrap();
        assert_eq!(config.input, Input::Inline("1 + 2".to_string()));
        assert!(!config.dump_tokens);
        assert_eq!(config.precedence.get('%'), 30);
    }

    #[test]
    fn file_and_stdin_inputs() {
        let config = Config::from_args(vec!["kaleidoscope", "--tokens", "-f", "prog.ks"]).unwrap();
        assert_eq!(config.input, Input::File(PathBuf::from("prog.ks")));
        assert!(config.dump_tokens);

        let config = Config::from_args(vec!["kaleidoscope"]).unwrap();
        assert_eq!(config.input, Input::Stdin);
        assert_eq!(config.precedence, PrecedenceTable::default());
    }
}
