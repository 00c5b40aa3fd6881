//! Lexer and recursive-descent parser for the dialect.

use std::iter::Peekable;
use std::str::CharIndices;

use portico_model::Value;

use crate::error::{EngineError, EngineResult};

use super::{CmpOp, Expr, Operand, OrderBy, Query};

/// Parses dialect text into a [`Query`].
///
/// # Errors
///
/// Malformed input fails with `EngineError::Query`; messages carry the
/// byte offset of the offending token.
pub(crate) fn parse(text: &str) -> EngineResult<Query> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.query()?;
    parser.expect_end()?;
    Ok(query)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Text(String),
    Param(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(word) => format!("'{word}'"),
            Token::Int(n) => format!("'{n}'"),
            Token::Float(x) => format!("'{x}'"),
            Token::Text(_) => "text literal".to_string(),
            Token::Param(name) => format!("':{name}'"),
            Token::Eq => "'='".to_string(),
            Token::Ne => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> EngineResult<Vec<(usize, Token)>> {
        let mut tokens = Vec::new();
        while let Some(&(offset, ch)) = self.chars.peek() {
            match ch {
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.run(offset, |c| c.is_alphanumeric() || c == '_');
                    tokens.push((offset, Token::Ident(word.to_string())));
                }
                c if c.is_ascii_digit() => {
                    tokens.push((offset, self.number(offset)?));
                }
                '-' => {
                    self.chars.next();
                    match self.chars.peek() {
                        Some(&(_, c)) if c.is_ascii_digit() => {
                            tokens.push((offset, self.number(offset)?));
                        }
                        _ => return Err(Self::bad_char('-', offset)),
                    }
                }
                '\'' => tokens.push((offset, self.text(offset)?)),
                ':' => tokens.push((offset, self.param(offset)?)),
                '=' => tokens.push((offset, self.single(Token::Eq))),
                '!' => {
                    self.chars.next();
                    if self.eat('=') {
                        tokens.push((offset, Token::Ne));
                    } else {
                        return Err(Self::bad_char('!', offset));
                    }
                }
                '<' => {
                    self.chars.next();
                    let token = if self.eat('=') { Token::Le } else { Token::Lt };
                    tokens.push((offset, token));
                }
                '>' => {
                    self.chars.next();
                    let token = if self.eat('=') { Token::Ge } else { Token::Gt };
                    tokens.push((offset, token));
                }
                '(' => tokens.push((offset, self.single(Token::LParen))),
                ')' => tokens.push((offset, self.single(Token::RParen))),
                other => return Err(Self::bad_char(other, offset)),
            }
        }
        Ok(tokens)
    }

    /// Consumes a run of characters satisfying `keep`, starting at the
    /// current position, and returns the covered slice.
    fn run(&mut self, start: usize, keep: impl Fn(char) -> bool) -> &'a str {
        let src = self.src;
        while let Some(&(_, ch)) = self.chars.peek() {
            if keep(ch) {
                self.chars.next();
            } else {
                break;
            }
        }
        &src[start..self.offset()]
    }

    fn number(&mut self, start: usize) -> EngineResult<Token> {
        self.digits();
        let mut is_float = false;
        if let Some(&(dot, '.')) = self.chars.peek() {
            let has_fraction = self.src[dot + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit());
            if has_fraction {
                self.chars.next();
                self.digits();
                is_float = true;
            }
        }
        let text = &self.src[start..self.offset()];
        if is_float {
            text.parse::<f64>().map(Token::Float).map_err(|_| ())
        } else {
            text.parse::<i64>().map(Token::Int).map_err(|_| ())
        }
        .map_err(|()| EngineError::query(format!("malformed number '{text}' at offset {start}")))
    }

    fn text(&mut self, start: usize) -> EngineResult<Token> {
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => {
                    return Err(EngineError::query(format!(
                        "unterminated text literal at offset {start}"
                    )));
                }
                Some((_, '\'')) => {
                    // '' escapes a quote inside the literal
                    if let Some(&(_, '\'')) = self.chars.peek() {
                        self.chars.next();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some((_, ch)) => value.push(ch),
            }
        }
        Ok(Token::Text(value))
    }

    fn param(&mut self, start: usize) -> EngineResult<Token> {
        self.chars.next();
        let name_start = self.offset();
        let name = self.run(name_start, |c| c.is_alphanumeric() || c == '_');
        if name.is_empty() {
            return Err(EngineError::query(format!(
                "expected parameter name after ':' at offset {start}"
            )));
        }
        Ok(Token::Param(name.to_string()))
    }

    fn digits(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_ascii_digit() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn eat(&mut self, expected: char) -> bool {
        if let Some(&(_, ch)) = self.chars.peek() {
            if ch == expected {
                self.chars.next();
                return true;
            }
        }
        false
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(pos, _)| pos)
    }

    fn bad_char(ch: char, offset: usize) -> EngineError {
        EngineError::query(format!("unexpected character '{ch}' at offset {offset}"))
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn query(&mut self) -> EngineResult<Query> {
        let projection = if self.keyword("select") {
            Some(self.expect_ident("an attribute name after 'select'")?)
        } else {
            None
        };
        self.expect_keyword("from")?;
        let entity = self.expect_ident("an entity name after 'from'")?;
        let filter = if self.keyword("where") {
            Some(self.or_expr()?)
        } else {
            None
        };
        let order = if self.keyword("order") {
            self.expect_keyword("by")?;
            let attribute = self.expect_ident("an attribute name after 'order by'")?;
            let descending = if self.keyword("desc") {
                true
            } else {
                self.keyword("asc");
                false
            };
            Some(OrderBy {
                attribute,
                descending,
            })
        } else {
            None
        };
        Ok(Query {
            projection,
            entity,
            filter,
            order,
        })
    }

    fn or_expr(&mut self) -> EngineResult<Expr> {
        let mut left = self.and_expr()?;
        while self.keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> EngineResult<Expr> {
        let mut left = self.primary()?;
        while self.keyword("and") {
            let right = self.primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> EngineResult<Expr> {
        if self.eat(&Token::LParen) {
            let inner = self.or_expr()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(inner);
        }
        let attribute = self.expect_ident("an attribute name")?;
        let op = self.cmp_op()?;
        let operand = self.operand()?;
        Ok(Expr::Cmp {
            attribute,
            op,
            operand,
        })
    }

    fn cmp_op(&mut self) -> EngineResult<CmpOp> {
        if self.keyword("like") {
            return Ok(CmpOp::Like);
        }
        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            _ => return Err(self.unexpected("a comparison operator")),
        };
        self.pos += 1;
        Ok(op)
    }

    fn operand(&mut self) -> EngineResult<Operand> {
        let operand = match self.peek() {
            Some(Token::Int(n)) => Operand::Literal(Value::Int(*n)),
            Some(Token::Float(x)) => Operand::Literal(Value::Float(*x)),
            Some(Token::Text(s)) => Operand::Literal(Value::Text(s.clone())),
            Some(Token::Param(name)) => Operand::Param(name.clone()),
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("true") => {
                Operand::Literal(Value::Bool(true))
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("false") => {
                Operand::Literal(Value::Bool(false))
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("null") => {
                Operand::Literal(Value::Null)
            }
            _ => return Err(self.unexpected("a literal or ':parameter'")),
        };
        self.pos += 1;
        Ok(operand)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn keyword(&mut self, kw: &str) -> bool {
        if let Some(Token::Ident(word)) = self.peek() {
            if word.eq_ignore_ascii_case(kw) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect_keyword(&mut self, kw: &str) -> EngineResult<()> {
        if self.keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{kw}'")))
        }
    }

    fn expect_ident(&mut self, wanted: &str) -> EngineResult<String> {
        match self.peek() {
            Some(Token::Ident(word)) => {
                let word = word.clone();
                self.pos += 1;
                Ok(word)
            }
            _ => Err(self.unexpected(wanted)),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, wanted: &str) -> EngineResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(wanted))
        }
    }

    fn expect_end(&self) -> EngineResult<()> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some((offset, token)) => Err(EngineError::query(format!(
                "unexpected {} at offset {offset} after end of query",
                token.describe()
            ))),
        }
    }

    fn unexpected(&self, wanted: &str) -> EngineError {
        match self.tokens.get(self.pos) {
            Some((offset, token)) => EngineError::query(format!(
                "expected {wanted}, found {} at offset {offset}",
                token.describe()
            )),
            None => EngineError::query(format!("expected {wanted}, found end of query")),
        }
    }
}
