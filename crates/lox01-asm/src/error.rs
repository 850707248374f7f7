use std::fmt::Write as _;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmErrorKind {
    #[error("unknown instruction '{0}'")]
    UnknownInstruction(String),
    #[error("no form of '{0}' accepts these operands")]
    NoMatchingOperandForm(String),
    #[error("label '{0}' is already defined")]
    DuplicateLabel(String),
    #[error("label '{0}' is never defined")]
    UndefinedLabel(String),
    #[error("displacement {disp} does not fit in {bits} bits")]
    DisplacementOutOfRange { disp: i64, bits: u32 },
    #[error("'{0}' cannot be used as an index register (only r1, r2, r3)")]
    InvalidIndexRegister(String),
    #[error("unexpected '{0}' after instruction")]
    TrailingTokensOnLine(String),
    #[error("invalid numeric literal '{0}'")]
    InvalidNumericLiteral(String),
    #[error("interrupt number {0} is outside 0..=255")]
    InterruptNumberOutOfRange(i64),
}

/// An assembly failure at a 1-based line and column.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}, column {column}: {kind}")]
pub struct AsmError {
    pub line: usize,
    pub column: usize,
    pub kind: AsmErrorKind,
}

impl AsmError {
    pub fn new(line: usize, column: usize, kind: AsmErrorKind) -> Self {
        Self { line, column, kind }
    }

    /// Compiler-style report pointing at the offending column of `source`.
    pub fn render(&self, file: &str, source: &str) -> String {
        let mut diag = String::new();
        let _ = writeln!(diag, "error: {}", self.kind);
        let _ = writeln!(diag, " --> {file}:{}:{}", self.line, self.column);

        if let Some(raw_line) = source.lines().nth(self.line.saturating_sub(1)) {
            let line_text = raw_line.trim_end_matches('\r');
            let underline = " ".repeat(self.column.saturating_sub(1));
            let _ = writeln!(diag, "  |");
            let _ = writeln!(diag, "{:>4} | {}", self.line, line_text);
            let _ = writeln!(diag, "  | {}^", underline);
        }
        diag
    }
}

pub type AsmResult<T> = Result<T, AsmError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_points_at_column() {
        let err = AsmError::new(2, 5, AsmErrorKind::UnknownInstruction("frob".into()));
        let out = err.render("prog.s", "nop\nnop frob\n");
        assert_eq!(
            out,
            "error: unknown instruction 'frob'\n --> prog.s:2:5\n  |\n   2 | nop frob\n  |     ^\n"
        );
    }
}
