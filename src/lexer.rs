use std::{
    fmt,
    io::{self, BufRead},
};

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Def,
    Extern,
    Ident(String),
    Number(f64),
    /// any other single character, operators and punctuation alike
    Char(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),
            Token::Def => write!(f, "'def'"),
            Token::Extern => write!(f, "'extern'"),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Number(num) => write!(f, "number {}", num),
            Token::Char(c) => write!(f, "'{}'", c),
        }
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum LexError {
    #[error("malformed number literal {0:?}")]
    MalformedNumber(String),
}

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"^(\d+\.?\d*|\.\d+)$").unwrap();
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric()
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

fn classify_ident(ident: String) -> Token {
    match ident.as_str() {
        "def" => Token::Def,
        "extern" => Token::Extern,
        _ => Token::Ident(ident),
    }
}

fn parse_number(text: String) -> Result<Token, LexError> {
    if !NUMBER_RE.is_match(&text) {
        return Err(LexError::MalformedNumber(text));
    }
    text.parse()
        .map(Token::Number)
        .map_err(|_| LexError::MalformedNumber(text))
}

/// Characters decoded from a buffered reader one line at a time.
///
/// A read failure or invalid UTF-8 ends the stream; the cause is kept for
/// the caller to inspect through [`ReaderChars::error`].
pub struct ReaderChars<R> {
    reader: R,
    line: std::vec::IntoIter<char>,
    error: Option<io::Error>,
    done: bool,
}

impl<R: BufRead> ReaderChars<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new().into_iter(),
            error: None,
            done: false,
        }
    }

    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    fn fill_line(&mut self) {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => self.done = true,
            Ok(_) => match String::from_utf8(buf) {
                Ok(line) => self.line = line.chars().collect::<Vec<_>>().into_iter(),
                Err(err) => {
                    self.error = Some(io::Error::new(io::ErrorKind::InvalidData, err));
                    self.done = true;
                }
            },
            Err(err) => {
                self.error = Some(err);
                self.done = true;
            }
        }
    }
}

impl<R: BufRead> Iterator for ReaderChars<R> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        loop {
            if let Some(c) = self.line.next() {
                return Some(c);
            }
            if self.done {
                return None;
            }
            self.fill_line();
        }
    }
}

/// Pull-based tokenizer over a character stream.
///
/// At most one character is read ahead; the character that ended the
/// previous token stays pending for the next call.
pub struct Lexer<I: Iterator<Item = char>> {
    chars: I,
    pending: Option<char>,
    finished: bool,
}

impl<'a> Lexer<std::str::Chars<'a>> {
    pub fn from_source(input: &'a str) -> Self {
        Lexer::new(input.chars())
    }
}

impl<R: BufRead> Lexer<ReaderChars<R>> {
    pub fn from_reader(reader: R) -> Self {
        Lexer::new(ReaderChars::new(reader))
    }
}

impl<I: Iterator<Item = char>> Lexer<I> {
    pub fn new(chars: I) -> Self {
        Self {
            chars,
            pending: None,
            finished: false,
        }
    }

    /// the underlying character stream
    pub fn source(&self) -> &I {
        &self.chars
    }

    fn bump(&mut self) -> Option<char> {
        self.pending.take().or_else(|| self.chars.next())
    }

    fn peek(&mut self) -> Option<char> {
        if self.pending.is_none() {
            self.pending = self.chars.next();
        }
        self.pending
    }

    fn take_while(&mut self, first: char, pred: fn(char) -> bool) -> String {
        let mut text = first.to_string();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.pending = None;
        }
        text
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' || c == '\r' {
                break;
            }
        }
    }

    /// produce the next token, returning `Token::Eof` forever once the input
    /// runs out
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            let c = loop {
                match self.bump() {
                    Some(c) if c.is_whitespace() => continue,
                    Some(c) => break c,
                    None => return Ok(Token::Eof),
                }
            };

            return match c {
                c if is_ident_start(c) => Ok(classify_ident(self.take_while(c, is_ident_continue))),
                c if is_number_char(c) => parse_number(self.take_while(c, is_number_char)),
                '#' => {
                    self.skip_line();
                    continue;
                }
                c => Ok(Token::Char(c)),
            };
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for Lexer<I> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let tok = self.next_token();
        if let Ok(Token::Eof) = tok {
            self.finished = true;
        }
        Some(tok)
    }
}

/// lex the given input string, including the trailing `Token::Eof`
pub fn lex(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::from_source(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn comments_and_whitespace_are_invisible() {
        for input in &["", "   \t\n", "# somebody \n", "# a\n  # b", "\n#only"] {
            assert_eq!(lex(input).unwrap(), vec![Token::Eof]);
        }
    }

    #[test]
    fn comment_then_token() {
        assert_eq!(
            lex("# somebody \na").unwrap(),
            vec![Token::Ident("a".to_string()), Token::Eof]
        );
    }

    #[test]
    fn lex_works() {
        let input = "def add(x y) x+1.0;";
        let tokenized = vec![
            Token::Def,
            Token::Ident("add".to_string()),
            Token::Char('('),
            Token::Ident("x".to_string()),
            Token::Ident("y".to_string()),
            Token::Char(')'),
            Token::Ident("x".to_string()),
            Token::Char('+'),
            Token::Number(1.0),
            Token::Char(';'),
            Token::Eof,
        ];
        assert_eq!(lex(input).unwrap(), tokenized);
    }

    #[test]
    fn keywords_are_whole_words() {
        assert_eq!(
            lex("extern defer externally def2 def").unwrap(),
            vec![
                Token::Extern,
                Token::Ident("defer".to_string()),
                Token::Ident("externally".to_string()),
                Token::Ident("def2".to_string()),
                Token::Def,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn identifiers_keep_source_text() {
        for ident in &["x", "foo", "a1b2", "déf", "Extern"] {
            assert_eq!(
                lex(ident).unwrap(),
                vec![Token::Ident(ident.to_string()), Token::Eof]
            );
        }
    }

    #[test]
    fn numbers_round_trip() {
        for &value in &[0.0, 1.0, 42.0, 3.25, 0.5, 1234.5678, 1e-3] {
            let printed = format!("{}", value);
            assert_eq!(lex(&printed).unwrap(), vec![Token::Number(value), Token::Eof]);
        }
        assert_eq!(lex(".5").unwrap(), vec![Token::Number(0.5), Token::Eof]);
        assert_eq!(lex("7.").unwrap(), vec![Token::Number(7.0), Token::Eof]);
    }

    #[test]
    fn malformed_numbers_fail() {
        assert_eq!(
            lex("1.2.3"),
            Err(LexError::MalformedNumber("1.2.3".to_string()))
        );
        assert_eq!(lex("."), Err(LexError::MalformedNumber(".".to_string())));
    }

    #[test]
    fn number_stops_at_letter() {
        assert_eq!(
            lex("2x").unwrap(),
            vec![Token::Number(2.0), Token::Ident("x".to_string()), Token::Eof]
        );
    }

    #[test]
    fn eof_is_sticky() {
        let mut lexer = Lexer::from_source("a");
        assert_eq!(lexer.next_token(), Ok(Token::Ident("a".to_string())));
        assert_eq!(lexer.next_token(), Ok(Token::Eof));
        assert_eq!(lexer.next_token(), Ok(Token::Eof));
    }

    #[test]
    fn reads_from_reader() {
        let lexer = Lexer::from_reader("extern sin(a)\n# note\ndef".as_bytes());
        let tokens: Result<Vec<_>, _> = lexer.collect();
        assert_eq!(
            tokens.unwrap(),
            vec![
                Token::Extern,
                Token::Ident("sin".to_string()),
                Token::Char('('),
                Token::Ident("a".to_string()),
                Token::Char(')'),
                Token::Def,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn reader_is_consumed_line_by_line() {
        let mut lexer = Lexer::from_reader("first\nsecond\nthird\n".as_bytes());
        assert_eq!(lexer.next_token(), Ok(Token::Ident("first".to_string())));
        assert_eq!(lexer.source().reader, &b"second\nthird\n"[..]);
        assert_eq!(lexer.next_token(), Ok(Token::Ident("second".to_string())));
        assert_eq!(lexer.next_token(), Ok(Token::Ident("third".to_string())));
        assert_eq!(lexer.next_token(), Ok(Token::Eof));
        assert!(lexer.source().error().is_none());
    }

    #[test]
    fn invalid_utf8_ends_stream_with_error() {
        let bytes: &[u8] = b"ok\n\xff\xfe\n";
        let mut lexer = Lexer::from_reader(bytes);
        assert_eq!(lexer.next_token(), Ok(Token::Ident("ok".to_string())));
        assert_eq!(lexer.next_token(), Ok(Token::Eof));
        let err = lexer.source().error().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
