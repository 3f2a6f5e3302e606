use std::fmt::{self, Write as _};

struct Bytes<'a>(&'a [u8]);

impl fmt::Display for Bytes<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i != 0 {
                fmt.write_char(' ')?;
            }
            write!(fmt, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Makes trailing whitespace visible.
struct Escape<'a>(&'a str);

impl fmt::Display for Escape<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let body = self.0.trim_end();
        fmt.write_str(body)?;
        for c in self.0[body.len()..].chars() {
            match c {
                '\t' => fmt.write_char('→')?,
                ' ' => fmt.write_char('•')?,
                _ => fmt.write_char(c)?,
            }
        }
        Ok(())
    }
}

pub struct Diff<'a> {
    file: &'a str,
    line: usize,
    bytes: &'a [u8],
    expect: &'a str,
    result: &'a str,
}

impl<'a> Diff<'a> {
    pub fn new(
        file: &'a str,
        line: usize,
        bytes: &'a [u8],
        expect: &'a str,
        result: &'a str,
    ) -> Self {
        Self {
            file,
            line,
            bytes,
            expect,
            result,
        }
    }
}

impl fmt::Display for Diff<'_> {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        use diff::Result as E;
        let w = 5;
        if !self.file.is_empty() {
            writeln!(out, "{:w$}--> {}:{}", ' ', self.file, self.line)?;
        }
        if !self.bytes.is_empty() {
            writeln!(out, "{:>8}{}", "raw | ", Bytes(self.bytes))?;
            writeln!(out, "{:7}{:-<24}", ' ', ' ')?;
        }
        let mut ln = std::cmp::max(self.line, 1);
        let mut ln2 = ln;
        for diff in diff::lines(self.expect, self.result) {
            match diff {
                E::Left(l) => {
                    writeln!(out, "{ln:w$} - {}↴", Escape(l))?;
                    ln += 1;
                }
                E::Both(l, _) => {
                    writeln!(out, "{ln:w$} | {}↴", Escape(l))?;
                    ln += 1;
                    ln2 = ln;
                }
                E::Right(r) => {
                    writeln!(out, "{ln2:w$} + {}↴", Escape(r))?;
                    ln2 += 1;
                }
            }
        }
        Ok(())
    }
}

/// Compares a rendered result, e.g. a decision tree dump, with the expected
/// text and prints a line diff on mismatch.
pub fn check(file: &str, line: usize, expect: &str, result: &str) -> Result<(), String> {
    if expect != result {
        let err = "invalid result";
        eprintln!("error: {err}");
        eprintln!("{}", Diff::new(file, line, &[], expect, result));
        return Err(err.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_trailing_whitespace() {
        assert_eq!(Escape("a b \t").to_string(), "a b•→");
        assert_eq!(Escape("ab").to_string(), "ab");
    }

    #[test]
    fn diff_marks_lines() {
        let diff = Diff::new("", 1, &[0xe9, 0x2d], "a\nb\n", "a\nc\n").to_string();
        assert!(diff.contains("raw | e9 2d"));
        assert!(diff.contains("    2 - b↴"));
        assert!(diff.contains("    2 + c↴"));
    }
}
