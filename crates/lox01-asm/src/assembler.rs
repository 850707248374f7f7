//! Line-oriented assembler: one pass to encode, then a relocation sweep.

use std::collections::BTreeMap;

use lox01::codec::OperandShape;
use lox01::instructions::{candidates, InstrDesc};
use num_traits::ToPrimitive;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{AsmError, AsmErrorKind, AsmResult};
use crate::labels::{FieldWidth, Relocation, SymbolTable};
use crate::operands::{self, Parsed, Target};
use crate::scanner::{Scanner, Spanned};

/// Assembled code and the address of every label, relative to the first byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assembly {
    pub code: Vec<u8>,
    pub labels: BTreeMap<String, u32>,
}

/// Assemble a whole source unit. Stops at the first error.
pub fn assemble(source: &str) -> AsmResult<Assembly> {
    let mut session = Session::default();
    for (i, text) in source.lines().enumerate() {
        session.line(text, i + 1)?;
    }
    session.finish()
}

#[derive(Default)]
struct Session {
    code: Vec<u8>,
    symbols: SymbolTable,
}

impl Session {
    fn address(&self) -> u32 {
        self.code.len() as u32
    }

    fn line(&mut self, text: &str, line: usize) -> AsmResult<()> {
        let mut sc = Scanner::new(text);

        if let Some(def) = sc.attempt(|c| {
            let name = c.label()?;
            c.lit(":")?;
            Some(name)
        }) {
            self.symbols
                .define(def.value.value, self.address(), line, def.column)?;
        }
        if sc.is_finished() {
            return Ok(());
        }

        // Bytes for this line only reach `code` once the whole line is good.
        let mut buf = Vec::new();
        if let Some(dir) = sc.attempt(|c| c.directive()) {
            self.directive(&mut sc, dir.value, line, &mut buf)?;
        } else {
            self.instruction(&mut sc, line, &mut buf)?;
        }
        trace!(line, bytes = ?buf, "encoded");
        self.code.extend_from_slice(&buf);
        Ok(())
    }

    fn directive(
        &mut self,
        sc: &mut Scanner<'_>,
        name: Spanned<'_, &str>,
        line: usize,
        buf: &mut Vec<u8>,
    ) -> AsmResult<()> {
        let arg = sc.attempt(|c| c.number());
        let known = ["byte", "word"]
            .iter()
            .any(|d| d.eq_ignore_ascii_case(name.value));
        if !known {
            return Err(AsmError::new(
                line,
                name.column,
                AsmErrorKind::UnknownInstruction(name.text.to_string()),
            ));
        }
        let Some(arg) = arg else {
            return Err(AsmError::new(
                line,
                sc.column(),
                AsmErrorKind::NoMatchingOperandForm(name.text.to_string()),
            ));
        };
        expect_end(sc, line)?;
        if name.value.eq_ignore_ascii_case("byte") {
            let v = operands::number_value(&arg.value, line)?;
            let byte = v.to_u8().or_else(|| v.to_i8().map(|b| b as u8)).ok_or_else(|| {
                AsmError::new(
                    line,
                    arg.column,
                    AsmErrorKind::InvalidNumericLiteral(arg.text.to_string()),
                )
            })?;
            buf.push(byte);
        } else {
            let word = operands::word_value(&arg.value, line)?;
            buf.extend_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    fn instruction(&mut self, sc: &mut Scanner<'_>, line: usize, buf: &mut Vec<u8>) -> AsmResult<()> {
        let Some(mn) = sc.attempt(|c| c.identifier()) else {
            let token = sc.rest().split_whitespace().next().unwrap_or_default();
            return Err(AsmError::new(
                line,
                sc.column(),
                AsmErrorKind::UnknownInstruction(token.to_string()),
            ));
        };
        let mnemonic = mn.value.value;
        let forms: Vec<&InstrDesc> = candidates(mnemonic).collect();
        if forms.is_empty() {
            return Err(AsmError::new(
                line,
                mn.column,
                AsmErrorKind::UnknownInstruction(mnemonic.to_string()),
            ));
        }

        let operand_column = {
            sc.skip();
            sc.column()
        };
        let matched = forms.iter().find_map(|desc| {
            let parsed = if desc.shape == OperandShape::None {
                Parsed::None
            } else {
                sc.attempt(|c| operands::pattern(desc, c))?.value
            };
            Some((*desc, parsed))
        });
        let Some((desc, parsed)) = matched else {
            return Err(AsmError::new(
                line,
                operand_column,
                AsmErrorKind::NoMatchingOperandForm(mnemonic.to_string()),
            ));
        };
        expect_end(sc, line)?;

        buf.push(desc.opcode);
        let field_address = self.address() + 1;
        let symbols = &mut self.symbols;
        let ops = operands::lower(&parsed, desc.shape, line, |target| {
            let width = FieldWidth::for_shape(desc.shape).unwrap_or(FieldWidth::W32);
            branch_target(symbols, target, field_address, width, line)
        })?;
        ops.encode(buf);
        Ok(())
    }

    fn finish(mut self) -> AsmResult<Assembly> {
        self.symbols.resolve(&mut self.code)?;
        debug!(bytes = self.code.len(), "assembled");
        Ok(Assembly {
            code: self.code,
            labels: self.symbols.into_labels(),
        })
    }
}

fn expect_end(sc: &mut Scanner<'_>, line: usize) -> AsmResult<()> {
    if sc.is_finished() {
        return Ok(());
    }
    Err(AsmError::new(
        line,
        sc.column(),
        AsmErrorKind::TrailingTokensOnLine(sc.rest().trim_end().to_string()),
    ))
}

/// Numeric operands are taken as the displacement itself; labels are measured
/// from the end of the field.
fn branch_target(
    symbols: &mut SymbolTable,
    target: &Target<'_>,
    field_address: u32,
    width: FieldWidth,
    line: usize,
) -> AsmResult<i32> {
    match target {
        Target::Disp(n) => {
            let v = operands::number_value(n, line)?;
            let disp = match width {
                FieldWidth::W16 => v.to_i16().map(i32::from),
                FieldWidth::W32 => Some(v as u32 as i32),
            };
            disp.ok_or_else(|| {
                AsmError::new(
                    line,
                    n.column,
                    AsmErrorKind::DisplacementOutOfRange {
                        disp: v,
                        bits: width.bits(),
                    },
                )
            })
        }
        Target::Label(l) => symbols.reference(Relocation {
            label: l.value.to_string(),
            field_address,
            offset: field_address as usize,
            width,
            line,
            column: l.column,
        }),
    }
}
