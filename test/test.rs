//! Runner for `.test` files.
//!
//! ```text
//! # comment, may contain flags: +little
//! 1000: e9 2d 48 00     push_1 cond=0xe register_list=0x4800
//!       ea000010        b_1 cond=0xe imm24=0x10
//!       f2 82 10 05     unknown
//! ```
//!
//! Bytes are written in memory order, a group of hex digits is split into
//! bytes from left to right. At least two spaces separate bytes from the
//! expected output, which is a `|` separated list of matched instructions
//! with their field values or `unknown`.

use std::{fmt, str::Lines};

use mcdecoder_core::model::{Decoded, McDecoder};

use super::utils::Diff;

#[derive(Clone, Debug, PartialEq, Eq)]
struct ParserError {
    file: String,
    line: usize,
    msg: String,
}

impl ParserError {
    fn new(file: &str, line: usize, msg: String) -> Self {
        Self {
            file: file.to_owned(),
            line,
            msg,
        }
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "error: {}, {}:{}", self.msg, self.file, self.line)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Test<'a> {
    pub line: usize,
    pub comment: &'a str,
    pub address: u64,
    pub bytes: Vec<u8>,
    pub expect: &'a str,
}

pub struct Parser<'a> {
    file: String,
    lines: Lines<'a>,
    line: usize,
    address: u64,
}

impl<'a> Parser<'a> {
    pub fn new(file: &str, input: &'a str) -> Self {
        Self {
            file: file.to_owned(),
            lines: input.lines(),
            line: 0,
            address: 0,
        }
    }

    fn error<T>(&self, msg: String) -> Result<T, String> {
        Err(ParserError::new(&self.file, self.line, msg).to_string())
    }

    fn parse_bytes(&self, mut cur: &'a str, out: &mut Vec<u8>) -> Result<&'a str, String> {
        while !cur.is_empty() {
            let stop = cur.chars().take_while(|c| c.is_whitespace()).count() > 1;
            cur = cur.trim_start();
            if stop {
                break;
            }
            let pos = cur
                .find(|c: char| !c.is_ascii_hexdigit())
                .unwrap_or(cur.len());
            if pos < 2 {
                break;
            }
            let (head, tail) = cur.split_at(pos);
            if head.len() % 2 != 0 {
                return self.error(format!("odd number of hex digits \"{head}\""));
            }
            for i in (0..head.len()).step_by(2) {
                match u8::from_str_radix(&head[i..i + 2], 16) {
                    Ok(b) => out.push(b),
                    Err(_) => return self.error(format!("invalid byte \"{head}\"")),
                }
            }
            cur = tail;
        }
        Ok(cur)
    }

    /// Parses the next test, returns `false` at the end of input.
    ///
    /// A test without an address continues right after the previous one.
    pub fn parse(&mut self, output: &mut Test<'a>) -> Result<bool, String> {
        output.bytes.clear();

        while let Some(line) = self.lines.next() {
            self.line += 1;

            let (line, comment) = line.split_once('#').unwrap_or((line, ""));
            let mut cur = line.trim();
            if cur.is_empty() {
                continue;
            }

            output.line = self.line;
            output.comment = comment.trim();

            if let Some((head, tail)) = cur.split_once(':') {
                let head = head.trim();
                if !head.is_empty() && head.len() < 17 && !head.contains(char::is_whitespace) {
                    match u64::from_str_radix(head, 16) {
                        Ok(address) => self.address = address,
                        Err(_) => return self.error(format!("invalid address \"{head}\"")),
                    }
                    cur = tail.trim_start();
                }
            }

            let rest = self.parse_bytes(cur, &mut output.bytes)?;
            if output.bytes.is_empty() {
                return self.error("no instruction bytes".to_owned());
            }

            output.address = self.address;
            output.expect = rest.trim();
            self.address += output.bytes.len() as u64;
            return Ok(true);
        }

        Ok(false)
    }

    /// Parses all tests and concatenates their bytes.
    pub fn parse_all(src: &str) -> Result<Vec<u8>, String> {
        let mut parser = Parser::new("input", src);
        let mut test = Test::default();
        let mut data = vec![];
        while parser.parse(&mut test)? {
            data.extend_from_slice(&test.bytes);
        }
        Ok(data)
    }
}

pub fn parse_flags(s: &str) -> impl Iterator<Item = (&str, bool)> {
    s.split_whitespace().filter_map(|i| {
        let state = match i.chars().next() {
            Some('+') => true,
            Some('-') => false,
            _ => return None,
        };
        let name = &i[1..];
        Some((name, state))
    })
}

/// Collapses whitespace in a `|` separated list.
pub fn normalize(s: &str) -> String {
    s.split('|')
        .map(|i| i.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Renders decoded instructions the way `.test` files expect them.
pub fn render(list: &[Decoded]) -> String {
    if list.is_empty() {
        return "unknown".to_owned();
    }
    let mut out = Vec::with_capacity(list.len());
    for decoded in list {
        let name = &decoded.instruction.name;
        if decoded.fields.is_empty() {
            out.push(name.clone());
        } else {
            out.push(format!("{name} {}", decoded.fields));
        }
    }
    out.join(" | ")
}

pub trait Runner {
    fn create(&mut self, test: &Test) -> McDecoder;

    fn run(&mut self, file: &str, tests: &str) -> Result<(), String> {
        let mut test = Test::default();
        let mut parser = Parser::new(file, tests);
        let mut failed = 0;
        while parser.parse(&mut test)? {
            let decoder = self.create(&test);
            let (len, result) = match decoder.decode_bytes(&test.bytes) {
                Ok(list) => {
                    let len = list.first().map_or(0, |d| d.instruction.byte_len());
                    (len, render(&list))
                }
                Err(err) => (0, format!("error: {err}")),
            };

            let expect = normalize(test.expect);
            let expect_len = if expect == "unknown" { 0 } else { test.bytes.len() };
            if len != expect_len || result != expect {
                failed += 1;

                if len != expect_len {
                    eprintln!("error: invalid length, {}:{}", file, test.line);
                    eprintln!("  expect: {expect_len}");
                    eprintln!("  result: {len}");
                }
                if result != expect {
                    eprintln!("error: invalid output, {}:{}", file, test.line);
                }

                let diff = Diff::new(file, test.line, &test.bytes, &expect, &result);
                eprintln!("{diff}");
            }
        }
        if failed == 0 {
            Ok(())
        } else {
            Err(format!("failed {failed} tests"))
        }
    }
}
