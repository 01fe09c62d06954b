use std::{collections::HashMap, mem};

use crate::ast::{ASTNode, Expression, Function, Prototype};
use crate::lexer::{LexError, Lexer, Token};

/// name given to the function wrapping a top-level expression
pub const ANON_FN_NAME: &str = "__anon_expr";

/// Maximum nesting of parentheses, call arguments and operator chains
/// before parsing gives up instead of exhausting the stack.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Punctuation the grammar relies on; never treated as a binary operator.
pub const RESERVED_OPERATORS: [char; 4] = ['(', ')', ',', ';'];

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParserError {
    #[error("unknown token when expecting an expression, found {0}")]
    ExpectedExpression(Token),
    #[error("expected ')' or ',' in argument list, found {0}")]
    ExpectedArgDelimiter(Token),
    #[error("expected function name in prototype, found {0}")]
    ExpectedFunctionName(Token),
    #[error("expected {expected}, found {found}")]
    Expected { expected: Token, found: Token },
    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
    #[error(transparent)]
    Lex(#[from] LexError),
}

pub type PartialParseResult = Result<Expression, ParserError>;

/// Binding strength of each binary operator; higher binds tighter.
#[derive(Debug, PartialEq, Clone)]
pub struct PrecedenceTable {
    operators: HashMap<char, i32>,
}

impl std::default::Default for PrecedenceTable {
    fn default() -> Self {
        Self::empty()
            .with('<', 10)
            .with('+', 20)
            .with('-', 20)
            .with('*', 40)
            .with('/', 40)
    }
}

impl PrecedenceTable {
    pub fn empty() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    pub fn with(mut self, op: char, precedence: i32) -> Self {
        self.insert(op, precedence);
        self
    }

    pub fn insert(&mut self, op: char, precedence: i32) {
        self.operators.insert(op, precedence);
    }

    pub fn is_reserved(op: char) -> bool {
        RESERVED_OPERATORS.contains(&op)
    }

    /// -1 for anything that isn't a binary operator
    pub fn get(&self, op: char) -> i32 {
        match self.operators.get(&op) {
            Some(&precedence) if precedence > 0 && !Self::is_reserved(op) => precedence,
            _ => -1,
        }
    }
}

/// Recursive descent parser holding one token of lookahead.
pub struct Parser<I: Iterator<Item = char>> {
    lexer: Lexer<I>,
    current: Token,
    precedence: PrecedenceTable,
    depth: usize,
}

impl<'a> Parser<std::str::Chars<'a>> {
    pub fn from_source(input: &'a str, precedence: PrecedenceTable) -> Result<Self, ParserError> {
        Parser::new(Lexer::from_source(input), precedence)
    }
}

impl<I: Iterator<Item = char>> Parser<I> {
    /// primes the lookahead with the first token of the input
    pub fn new(mut lexer: Lexer<I>, precedence: PrecedenceTable) -> Result<Self, ParserError> {
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            precedence,
            depth: 0,
        })
    }

    pub fn current_token(&self) -> &Token {
        &self.current
    }

    pub fn lexer(&self) -> &Lexer<I> {
        &self.lexer
    }

    /// run `parse` one nesting level deeper, failing past `MAX_NESTING_DEPTH`
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParserError>,
    ) -> Result<T, ParserError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParserError::TooDeep(MAX_NESTING_DEPTH));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// move to the next token, handing back the one just consumed
    fn advance(&mut self) -> Result<Token, ParserError> {
        let next = self.lexer.next_token()?;
        Ok(mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParserError> {
        if self.current != expected {
            return Err(ParserError::Expected {
                expected,
                found: self.current.clone(),
            });
        }
        self.advance()?;
        Ok(())
    }

    fn current_operator(&self) -> Option<(char, i32)> {
        match self.current {
            Token::Char(op) => Some((op, self.precedence.get(op))),
            _ => None,
        }
    }

    fn current_precedence(&self) -> i32 {
        self.current_operator().map_or(-1, |(_, precedence)| precedence)
    }

    fn parse_paren_expr(&mut self) -> PartialParseResult {
        self.expect(Token::Char('('))?;
        let expr = self.nested(Self::parse_expression)?;
        self.expect(Token::Char(')'))?;
        Ok(expr)
    }

    fn parse_identifier_expr(&mut self) -> PartialParseResult {
        let name = match self.advance()? {
            Token::Ident(name) => name,
            other => return Err(ParserError::ExpectedExpression(other)),
        };

        if self.current != Token::Char('(') {
            return Ok(Expression::Variable(name));
        }
        self.advance()?;

        let mut args = Vec::new();
        if self.current != Token::Char(')') {
            loop {
                args.push(self.nested(Self::parse_expression)?);
                match self.current {
                    Token::Char(')') => break,
                    Token::Char(',') => {
                        self.advance()?;
                    }
                    ref other => return Err(ParserError::ExpectedArgDelimiter(other.clone())),
                }
            }
        }
        self.advance()?;

        Ok(Expression::Call { callee: name, args })
    }

    fn parse_primary(&mut self) -> PartialParseResult {
        match self.current {
            Token::Ident(_) => self.parse_identifier_expr(),
            Token::Number(value) => {
                self.advance()?;
                Ok(Expression::Number(value))
            }
            Token::Char('(') => self.parse_paren_expr(),
            ref other => Err(ParserError::ExpectedExpression(other.clone())),
        }
    }

    fn parse_binop_rhs(&mut self, min_precedence: i32, lhs: Expression) -> PartialParseResult {
        let mut result = lhs;

        loop {
            let (op, precedence) = match self.current_operator() {
                Some((op, precedence)) if precedence >= min_precedence => (op, precedence),
                _ => return Ok(result),
            };
            self.advance()?;

            let mut rhs = self.parse_primary()?;

            if precedence < self.current_precedence() {
                rhs = self.nested(|parser| parser.parse_binop_rhs(precedence + 1, rhs))?;
            }

            result = Expression::binary(op, result, rhs);
        }
    }

    pub fn parse_expression(&mut self) -> PartialParseResult {
        let lhs = self.parse_primary()?;
        self.parse_binop_rhs(0, lhs)
    }

    /// `name ( arg* )`
    pub fn parse_prototype(&mut self) -> Result<Prototype, ParserError> {
        let name = match self.current {
            Token::Ident(ref name) => name.clone(),
            ref other => return Err(ParserError::ExpectedFunctionName(other.clone())),
        };
        self.advance()?;

        self.expect(Token::Char('('))?;
        let mut args = Vec::new();
        while let Token::Ident(ref arg) = self.current {
            args.push(arg.clone());
            self.advance()?;
        }
        self.expect(Token::Char(')'))?;

        Ok(Prototype { name, args })
    }

    /// `extern prototype`
    pub fn parse_extern(&mut self) -> Result<Prototype, ParserError> {
        self.expect(Token::Extern)?;
        self.parse_prototype()
    }

    /// `def prototype expression`
    pub fn parse_definition(&mut self) -> Result<Function, ParserError> {
        self.expect(Token::Def)?;
        let prototype = self.parse_prototype()?;
        let body = self.parse_expression()?;
        Ok(Function { prototype, body })
    }

    /// wrap a bare expression in a nullary anonymous function
    pub fn parse_top_level_expr(&mut self) -> Result<Function, ParserError> {
        let body = self.parse_expression()?;
        Ok(Function {
            prototype: Prototype {
                name: ANON_FN_NAME.to_string(),
                args: Vec::new(),
            },
            body,
        })
    }

    /// parse every top level item until the end of input, skipping `;`
    pub fn parse_program(&mut self) -> Result<Vec<ASTNode>, ParserError> {
        let mut ast = Vec::new();

        loop {
            let node = match self.current {
                Token::Eof => break,
                Token::Char(';') => {
                    self.advance()?;
                    continue;
                }
                Token::Def => ASTNode::Function(self.parse_definition()?),
                Token::Extern => ASTNode::Extern(self.parse_extern()?),
                _ => ASTNode::Function(self.parse_top_level_expr()?),
            };
            ast.push(node);
        }

        Ok(ast)
    }
}

/// parse a whole program from a string
pub fn parse_str(input: &str, precedence: PrecedenceTable) -> Result<Vec<ASTNode>, ParserError> {
    Parser::from_source(input, precedence)?.parse_program()
}
