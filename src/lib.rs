pub mod ast;
pub mod config;
pub mod lexer;
pub mod parser;

pub use ast::{ASTNode, Expression, Function, Prototype};
pub use lexer::{lex, LexError, Lexer, ReaderChars, Token};
pub use parser::{parse_str, Parser, ParserError, PrecedenceTable};
