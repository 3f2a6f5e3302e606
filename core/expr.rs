//! Parser for condition expressions.
//!
//! ```text
//! cond in_range 0-14 and setbit_count(register_list) > 1
//! ```

use crate::{
    condition::{CompareOp, Condition, Operand},
    error::{ConditionError, ConditionErrorKind},
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Number(u64),
    Op(CompareOp),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Minus,
}

type Result<T, E = ConditionError> = std::result::Result<T, E>;

fn syntax(name: &str, pos: usize, msg: impl Into<String>) -> ConditionError {
    let kind = ConditionErrorKind::Syntax {
        pos,
        msg: msg.into(),
    };
    ConditionError::new(name, kind)
}

fn parse_number(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else {
        s.parse().ok()
    }
}

fn tokenize<'a>(name: &str, src: &'a str) -> Result<Vec<(usize, Token<'a>)>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;
        let single = match c {
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b',' => Some(Token::Comma),
            b'-' => Some(Token::Minus),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push((start, token));
            pos += 1;
            continue;
        }
        let next = bytes.get(pos + 1).copied();
        let token = match (c, next) {
            _ if c.is_ascii_whitespace() => {
                pos += 1;
                continue;
            }
            (b'=', Some(b'=')) => Token::Op(CompareOp::Eq),
            (b'!', Some(b'=')) => Token::Op(CompareOp::Ne),
            (b'<', Some(b'=')) => Token::Op(CompareOp::Le),
            (b'>', Some(b'=')) => Token::Op(CompareOp::Ge),
            (b'<', _) => Token::Op(CompareOp::Lt),
            (b'>', _) => Token::Op(CompareOp::Gt),
            _ if c.is_ascii_alphanumeric() || c == b'_' => {
                while bytes
                    .get(pos)
                    .map_or(false, |&c| c.is_ascii_alphanumeric() || c == b'_')
                {
                    pos += 1;
                }
                let word = &src[start..pos];
                let token = if c.is_ascii_digit() {
                    match parse_number(word) {
                        Some(value) => Token::Number(value),
                        None => return Err(syntax(name, start, format!("invalid number {word}"))),
                    }
                } else {
                    Token::Ident(word)
                };
                tokens.push((start, token));
                continue;
            }
            _ => {
                let msg = format!("unexpected character '{}'", c as char);
                return Err(syntax(name, start, msg));
            }
        };
        pos += match token {
            Token::Op(CompareOp::Lt | CompareOp::Gt) => 1,
            _ => 2,
        };
        tokens.push((start, token));
    }
    Ok(tokens)
}

struct Parser<'a> {
    name: &'a str,
    tokens: Vec<(usize, Token<'a>)>,
    cur: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn pos(&self) -> usize {
        self.tokens.get(self.cur).map_or(self.end, |(pos, _)| *pos)
    }

    fn error(&self, msg: &str) -> ConditionError {
        syntax(self.name, self.pos(), msg)
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.cur).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek().cloned();
        if token.is_some() {
            self.cur += 1;
        }
        token
    }

    fn eat(&mut self, token: Token<'a>) -> bool {
        if self.peek() == Some(&token) {
            self.cur += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token<'a>, msg: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(msg))
        }
    }

    fn eat_keyword(&mut self, keyword: &'static str) -> bool {
        self.eat(Token::Ident(keyword))
    }

    fn number(&mut self) -> Result<u64> {
        match self.peek() {
            Some(Token::Number(value)) => {
                let value = *value;
                self.cur += 1;
                Ok(value)
            }
            _ => Err(self.error("expected number")),
        }
    }

    fn operand(&mut self) -> Result<Operand> {
        let pos = self.pos();
        match self.next() {
            Some(Token::Number(value)) => Ok(Operand::Immediate(value)),
            Some(Token::Ident(name)) if !is_keyword(name) => {
                if self.eat(Token::LParen) {
                    let argument = Box::new(self.operand()?);
                    self.expect(Token::RParen, "expected ')'")?;
                    Ok(Operand::Function {
                        name: name.to_owned(),
                        argument,
                    })
                } else if self.eat(Token::LBracket) {
                    let index = self.number()?;
                    let index = u32::try_from(index).map_err(|_| self.error("index is too big"))?;
                    self.expect(Token::RBracket, "expected ']'")?;
                    Ok(Operand::Field {
                        name: name.to_owned(),
                        element_index: Some(index),
                    })
                } else {
                    Ok(Operand::Field {
                        name: name.to_owned(),
                        element_index: None,
                    })
                }
            }
            _ => Err(syntax(self.name, pos, "expected field, number or function call")),
        }
    }

    fn atom(&mut self) -> Result<Condition> {
        if self.eat(Token::LParen) {
            let cond = self.condition()?;
            self.expect(Token::RParen, "expected ')'")?;
            return Ok(cond);
        }
        let subject = self.operand()?;
        if self.eat_keyword("in") {
            self.expect(Token::LBracket, "expected '['")?;
            let mut values = vec![self.number()?];
            while self.eat(Token::Comma) {
                values.push(self.number()?);
            }
            self.expect(Token::RBracket, "expected ']'")?;
            return Ok(Condition::InSet { subject, values });
        }
        if self.eat_keyword("in_range") {
            let start = self.number()?;
            self.expect(Token::Minus, "expected '-'")?;
            let end = self.number()?;
            return Ok(Condition::InRange {
                subject,
                start,
                end,
            });
        }
        match self.peek() {
            Some(Token::Op(op)) => {
                let op = *op;
                self.cur += 1;
                let object = self.operand()?;
                Ok(Condition::Equality {
                    subject,
                    op,
                    object,
                })
            }
            _ => Err(self.error("expected comparison operator, 'in' or 'in_range'")),
        }
    }

    fn and(&mut self) -> Result<Condition> {
        let mut list = vec![self.atom()?];
        while self.eat_keyword("and") {
            list.push(self.atom()?);
        }
        Ok(collapse(list, Condition::And))
    }

    fn condition(&mut self) -> Result<Condition> {
        let mut list = vec![self.and()?];
        while self.eat_keyword("or") {
            list.push(self.and()?);
        }
        Ok(collapse(list, Condition::Or))
    }
}

fn is_keyword(s: &str) -> bool {
    matches!(s, "and" | "or" | "in" | "in_range")
}

fn collapse(mut list: Vec<Condition>, f: fn(Vec<Condition>) -> Condition) -> Condition {
    if list.len() == 1 {
        list.remove(0)
    } else {
        f(list)
    }
}

/// Parses a condition of the instruction `name`.
pub fn parse(name: &str, src: &str) -> Result<Condition> {
    let tokens = tokenize(name, src)?;
    let mut parser = Parser {
        name,
        tokens,
        cur: 0,
        end: src.len(),
    };
    let cond = parser.condition()?;
    if parser.peek().is_some() {
        return Err(parser.error("unexpected token"));
    }
    Ok(cond)
}
