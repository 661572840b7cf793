use super::ast::{BinaryOp, Expr, UnaryOp};
use super::token::{tokenize, Spanned, Token};
use crate::error::Error;
use crate::value::Value;

/// Parses the inside of a `{{ ... }}` parameter.
pub(crate) fn parse_expr(src: &str) -> Result<Expr, Error> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Ok(Expr::Literal(Value::String(String::new())));
    }
    let mut p = Parser { tokens, pos: 0 };
    let mut expr = p.ternary()?;
    if p.eat(&Token::LeftArrow) {
        expr = Expr::LeftArrow {
            callee: Box::new(expr),
        };
    }
    if let Some(t) = p.peek_spanned() {
        return Err(Error::new(format!(
            "unexpected token {:?} at column {}",
            t.token,
            t.pos + 1
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|s| s.token.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, t: &Token) -> bool {
        if self.peek() == Some(t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, t: &Token) -> Result<(), Error> {
        if self.eat(t) {
            return Ok(());
        }
        Err(match self.peek_spanned() {
            Some(s) => Error::new(format!(
                "expected {t:?} but found {:?} at column {}",
                s.token,
                s.pos + 1
            )),
            None => Error::new(format!("expected {t:?} but reached end of expression")),
        })
    }

    fn ternary(&mut self) -> Result<Expr, Error> {
        let cond = self.binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.ternary()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.ternary()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn binary_op(&self, level: usize) -> Option<BinaryOp> {
        let op = match self.peek()? {
            Token::Or => BinaryOp::Or,
            Token::And => BinaryOp::And,
            Token::Eq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
            Token::Lt => BinaryOp::Lt,
            Token::Le => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::Ge => BinaryOp::Ge,
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::Percent => BinaryOp::Rem,
            _ => return None,
        };
        (precedence(op) == level).then_some(op)
    }

    /// Precedence climbing over the levels in [`precedence`].
    fn binary(&mut self, level: usize) -> Result<Expr, Error> {
        if level > MAX_LEVEL {
            return self.unary();
        }
        let mut left = self.binary(level + 1)?;
        while let Some(op) = self.binary_op(level) {
            self.pos += 1;
            let right = self.binary(level + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Not) => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.pos += 1;
        let expr = self.unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::Selector {
                                base: Box::new(expr),
                                name,
                            }
                        }
                        other => {
                            return Err(Error::new(format!(
                                "expected field name after '.' but found {other:?}"
                            )))
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.ternary()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.ternary()?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            self.expect(&Token::Comma)?;
                        }
                    }
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        match self.next() {
            Some(Token::Int(digits)) => {
                let n: u64 = digits
                    .parse()
                    .map_err(|_| Error::new(format!("integer literal {digits} overflows uint")))?;
                Ok(Expr::Literal(match i64::try_from(n) {
                    Ok(i) => Value::Int(i),
                    Err(_) => Value::Uint(n),
                }))
            }
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "nil" | "null" => Expr::Literal(Value::Nil),
                _ => Expr::Ident(name),
            }),
            Some(Token::Dollar) => Ok(Expr::Dollar),
            Some(Token::LParen) => {
                let inner = self.ternary()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(other) => Err(Error::new(format!("unexpected token {other:?}"))),
            None => Err(Error::new("unexpected end of expression")),
        }
    }
}

const MAX_LEVEL: usize = 5;

fn precedence(op: BinaryOp) -> usize {
    match op {
        BinaryOp::Or => 0,
        BinaryOp::And => 1,
        BinaryOp::Eq | BinaryOp::NotEq => 2,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 3,
        BinaryOp::Add | BinaryOp::Sub => 4,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 5,
    }
}
