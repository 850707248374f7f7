//! Line scanner: anchored, backtracking pattern attempts over one source line.

use lox01::codec::{FLAG_NAMES, REG_NAMES};

/// A matched piece of source with its 1-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spanned<'a, T> {
    pub value: T,
    pub text: &'a str,
    pub column: usize,
}

fn column_of(src: &str, pos: usize) -> usize {
    src[..pos].chars().count() + 1
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Cursor handed to a pattern. Every primitive skips leading blanks, and on
/// failure leaves the cursor where it was.
pub struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn blanks(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start_matches([' ', '\t']).len();
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn spanned<T>(&self, start: usize, value: T) -> Spanned<'a, T> {
        Spanned {
            value,
            text: &self.src[start..self.pos],
            column: column_of(self.src, start),
        }
    }

    /// Exact punctuation such as `,` `:` `[`.
    pub fn lit(&mut self, s: &str) -> Option<()> {
        self.blanks();
        if self.rest().starts_with(s) {
            self.pos += s.len();
            Some(())
        } else {
            None
        }
    }

    /// `[A-Za-z_][A-Za-z0-9_]*`
    pub fn identifier(&mut self) -> Option<Spanned<'a, &'a str>> {
        self.blanks();
        let start = self.pos;
        let rest = self.rest();
        if !rest.chars().next().is_some_and(is_ident_start) {
            return None;
        }
        let len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        self.pos += len;
        Some(self.spanned(start, &self.src[start..self.pos]))
    }

    /// `.name`
    pub fn directive(&mut self) -> Option<Spanned<'a, &'a str>> {
        self.opt_group(|c| {
            c.blanks();
            let start = c.pos;
            c.lit(".")?;
            let name = c.identifier()?;
            if name.column != column_of(c.src, start + 1) {
                return None;
            }
            Some(c.spanned(start, name.value))
        })
    }

    /// A register name, case-insensitive, as a whole word.
    pub fn register(&mut self) -> Option<Spanned<'a, u8>> {
        self.opt_group(|c| {
            let id = c.identifier()?;
            let reg = REG_NAMES
                .iter()
                .position(|n| n.eq_ignore_ascii_case(id.value))?;
            Some(Spanned {
                value: reg as u8,
                text: id.text,
                column: id.column,
            })
        })
    }

    /// One of `z c o n i`, case-insensitive.
    pub fn flag(&mut self) -> Option<Spanned<'a, u8>> {
        self.opt_group(|c| {
            let id = c.identifier()?;
            let flag = FLAG_NAMES
                .iter()
                .position(|n| n.eq_ignore_ascii_case(id.value))?;
            Some(Spanned {
                value: flag as u8,
                text: id.text,
                column: id.column,
            })
        })
    }

    /// An identifier that is not a register name.
    pub fn label(&mut self) -> Option<Spanned<'a, &'a str>> {
        self.opt_group(|c| {
            let id = c.identifier()?;
            if REG_NAMES.iter().any(|n| n.eq_ignore_ascii_case(id.value)) {
                return None;
            }
            Some(id)
        })
    }

    /// Numeric lexeme `-?[0-9][0-9A-Za-z_]*`; its value is checked by the caller.
    pub fn number(&mut self) -> Option<Spanned<'a, &'a str>> {
        self.blanks();
        let start = self.pos;
        let rest = self.rest();
        let digits = rest.strip_prefix('-').unwrap_or(rest);
        if !digits.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return None;
        }
        let sign = rest.len() - digits.len();
        let len = digits.find(|c: char| !is_ident_char(c)).unwrap_or(digits.len());
        self.pos += sign + len;
        Some(self.spanned(start, &self.src[start..self.pos]))
    }

    /// Run `f`, rewinding if it fails.
    pub fn opt_group<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let save = self.pos;
        let out = f(self);
        if out.is_none() {
            self.pos = save;
        }
        out
    }

    /// Like `opt_group`, but an absent match is not a failure.
    pub fn optional<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<Option<T>> {
        Some(self.opt_group(f))
    }
}

pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { src: line, pos: 0 }
    }

    /// Skip whitespace and a trailing `//` comment.
    pub fn skip(&mut self) {
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        if trimmed.starts_with("//") {
            self.pos = self.src.len();
        }
    }

    pub fn is_finished(&mut self) -> bool {
        self.skip();
        self.pos == self.src.len()
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn column(&self) -> usize {
        column_of(self.src, self.pos)
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Try `pattern` anchored at the current position. On success the scanner
    /// moves past the match; on failure, or if nothing was consumed, it stays put.
    pub fn attempt<T>(
        &mut self,
        pattern: impl FnOnce(&mut Cursor<'a>) -> Option<T>,
    ) -> Option<Spanned<'a, T>> {
        self.skip();
        let start = self.pos;
        let mut cur = Cursor {
            src: self.src,
            pos: start,
        };
        let value = pattern(&mut cur)?;
        if cur.pos == start {
            return None;
        }
        self.pos = cur.pos;
        Some(Spanned {
            value,
            text: &self.src[start..cur.pos],
            column: column_of(self.src, start),
        })
    }
}
