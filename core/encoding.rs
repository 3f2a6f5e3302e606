//! Parser for the textual encoding format.
//!
//! ```text
//! 000:funct3|x:imm[5]|xxxxx:rs1_rd|xxxxx:imm[4:0]|01:op
//! ```
//!
//! Elements are separated by `,`, tokens inside an element by `|`. A token is
//! a bit pattern of `0`, `1` and `x` optionally followed by a field name and
//! a list of bit ranges of the field.

use crate::error::{LayoutError, LayoutErrorKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitRange {
    pub msb: u32,
    pub lsb: u32,
}

impl BitRange {
    pub fn new(msb: u32, lsb: u32) -> Self {
        Self { msb, lsb }
    }

    pub fn width(&self) -> u32 {
        self.msb - self.lsb + 1
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// Bit pattern, most significant bit first.
    pub bits: String,
    pub name: Option<String>,
    /// Explicit field ranges, empty if not given.
    pub ranges: Vec<BitRange>,
}

impl Token {
    pub fn bit_len(&self) -> u32 {
        self.bits.len() as u32
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub tokens: Vec<Token>,
}

impl Element {
    pub fn bit_len(&self) -> u32 {
        self.tokens.iter().map(Token::bit_len).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoding {
    pub elements: Vec<Element>,
}

impl Encoding {
    pub fn bit_len(&self) -> u32 {
        self.elements.iter().map(Element::bit_len).sum()
    }

    /// Iterates over tokens of all elements in declaration order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.elements.iter().flat_map(|e| e.tokens.iter())
    }
}

struct Parser<'a> {
    name: &'a str,
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, msg: impl Into<String>) -> LayoutError {
        let kind = LayoutErrorKind::Syntax {
            pos: self.pos,
            msg: msg.into(),
        };
        LayoutError::new(self.name, kind)
    }

    fn skip_whitespace(&mut self) {
        while self.src.get(self.pos).map_or(false, u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), LayoutError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c as char)))
        }
    }

    fn take_while(&mut self, f: impl Fn(u8) -> bool) -> &'a str {
        self.skip_whitespace();
        let start = self.pos;
        while self.src.get(self.pos).map_or(false, |&c| f(c)) {
            self.pos += 1;
        }
        // only ASCII bytes are accepted by the callers
        std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default()
    }

    fn number(&mut self) -> Result<u32, LayoutError> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(self.error("expected bit number"));
        }
        digits
            .parse()
            .map_err(|_| self.error(format!("bit number {digits} is too big")))
    }

    fn range(&mut self) -> Result<BitRange, LayoutError> {
        let msb = self.number()?;
        let lsb = if self.eat(b':') { self.number()? } else { msb };
        Ok(BitRange::new(msb, lsb))
    }

    fn token(&mut self) -> Result<Token, LayoutError> {
        let bits = self.take_while(|c| matches!(c, b'0' | b'1' | b'x'));
        if bits.is_empty() {
            return Err(self.error("expected bit pattern"));
        }
        let mut token = Token {
            bits: bits.to_owned(),
            name: None,
            ranges: Vec::new(),
        };
        if self.eat(b':') {
            let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
            if name.is_empty() || name.as_bytes()[0].is_ascii_digit() {
                return Err(self.error("expected field name"));
            }
            token.name = Some(name.to_owned());
            if self.eat(b'[') {
                loop {
                    token.ranges.push(self.range()?);
                    if !self.eat(b',') {
                        break;
                    }
                }
                self.expect(b']')?;
            }
        }
        Ok(token)
    }

    fn element(&mut self) -> Result<Element, LayoutError> {
        let mut tokens = vec![self.token()?];
        while self.eat(b'|') {
            tokens.push(self.token()?);
        }
        Ok(Element { tokens })
    }

    fn encoding(&mut self) -> Result<Encoding, LayoutError> {
        if self.peek().is_none() {
            return Err(LayoutError::new(self.name, LayoutErrorKind::Empty));
        }
        let mut elements = vec![self.element()?];
        while self.eat(b',') {
            elements.push(self.element()?);
        }
        if let Some(c) = self.peek() {
            return Err(self.error(format!("unexpected character '{}'", c as char)));
        }
        Ok(Encoding { elements })
    }
}

/// Parses the encoding format of the instruction `name`.
pub fn parse(name: &str, format: &str) -> Result<Encoding, LayoutError> {
    let mut parser = Parser {
        name,
        src: format.as_bytes(),
        pos: 0,
    };
    parser.encoding()
}
