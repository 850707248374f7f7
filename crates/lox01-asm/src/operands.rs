//! Operand syntax for each instruction form, and the checks that turn a
//! syntactic match into encodable operands.

use lox01::codec::{ModRr, OperandShape, Operands, MAX_INDEX_REG, ZERO};
use lox01::decoder::Op;
use lox01::instructions::InstrDesc;
use num_traits::ToPrimitive;

use crate::error::{AsmError, AsmErrorKind, AsmResult};
use crate::scanner::{Cursor, Spanned};

/// Numbers must fit 32 bits under either the signed or the unsigned reading.
const MIN_LITERAL: i64 = i32::MIN as i64;
const MAX_LITERAL: i64 = u32::MAX as i64;

/// Parse a decimal, `0x` hex or `0b` binary literal, with optional leading
/// `-` and `_` separators.
pub fn parse_number(text: &str) -> Option<i64> {
    let (neg, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (radix, digits) = if let Some(h) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (16, h)
    } else if let Some(b) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        (2, b)
    } else {
        (10, body)
    };
    let digits: String = digits.chars().filter(|&c| c != '_').collect();
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = u64::from_str_radix(&digits, radix).ok()?.to_i64()?;
    let value = if neg { -magnitude } else { magnitude };
    (MIN_LITERAL..=MAX_LITERAL).contains(&value).then_some(value)
}

/// Literal value, or `InvalidNumericLiteral` at its column.
pub fn number_value(n: &Spanned<&str>, line: usize) -> AsmResult<i64> {
    parse_number(n.value).ok_or_else(|| {
        AsmError::new(
            line,
            n.column,
            AsmErrorKind::InvalidNumericLiteral(n.text.to_string()),
        )
    })
}

/// The low 32 bits of a literal.
pub fn word_value(n: &Spanned<&str>, line: usize) -> AsmResult<u32> {
    Ok(number_value(n, line)? as u32)
}

#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Label(Spanned<'a, &'a str>),
    Disp(Spanned<'a, &'a str>),
}

/// `(base ':')? '[' index? ('*' scale)? ('+'? disp)? ']'`
#[derive(Debug, Clone, Copy)]
pub struct Address<'a> {
    pub base: Option<Spanned<'a, u8>>,
    pub index: Option<Spanned<'a, u8>>,
    pub scale: u8,
    pub disp: Option<Spanned<'a, &'a str>>,
}

impl<'a> Address<'a> {
    fn modrr(&self, reg: u8, line: usize) -> AsmResult<ModRr> {
        let index = match self.index {
            Some(ix) if ix.value > MAX_INDEX_REG => {
                return Err(AsmError::new(
                    line,
                    ix.column,
                    AsmErrorKind::InvalidIndexRegister(ix.text.to_string()),
                ))
            }
            Some(ix) => ix.value,
            None => ZERO,
        };
        let base = self.base.map_or(ZERO, |b| b.value);
        Ok(ModRr::new(reg, base, index))
    }

    fn operands(&self, reg: u8, line: usize) -> AsmResult<Operands> {
        let m = self.modrr(reg, line)?;
        Ok(match &self.disp {
            Some(d) => Operands::ModRrDisp(m, word_value(d, line)? as i32),
            None => Operands::ModRr(m),
        })
    }
}

/// Operand text matched for one instruction form, before range checks.
#[derive(Debug, Clone, Copy)]
pub enum Parsed<'a> {
    None,
    Reg(Spanned<'a, u8>),
    TwoRegs(Spanned<'a, u8>, Spanned<'a, u8>),
    Flag(Spanned<'a, u8>),
    Number(Spanned<'a, &'a str>),
    RegNumber(Spanned<'a, u8>, Spanned<'a, &'a str>),
    Target(Target<'a>),
    Address(Address<'a>),
    Load(Spanned<'a, u8>, Address<'a>),
    Store(Address<'a>, Spanned<'a, u8>),
}

fn scale_lexeme(c: &mut Cursor<'_>) -> Option<u8> {
    c.lit("*")?;
    match c.number()?.text {
        "1" => Some(1),
        "2" => Some(2),
        "4" => Some(4),
        _ => None,
    }
}

fn address<'a>(c: &mut Cursor<'a>) -> Option<Address<'a>> {
    let base = c.optional(|c| {
        let r = c.register()?;
        c.lit(":")?;
        Some(r)
    })?;
    c.lit("[")?;
    let index = c.optional(|c| c.register())?;
    let scale = match index {
        Some(_) => c.optional(scale_lexeme)?.unwrap_or(1),
        None => 1,
    };
    let disp = match index {
        Some(_) => c.optional(|c| {
            c.optional(|c| c.lit("+"))?;
            c.number()
        })?,
        None => Some(c.number()?),
    };
    c.lit("]")?;
    Some(Address {
        base,
        index,
        scale,
        disp,
    })
}

/// Address whose multiplier and displacement match the form exactly.
fn address_for<'a>(c: &mut Cursor<'a>, scale: u8, with_disp: bool) -> Option<Address<'a>> {
    let a = address(c)?;
    (a.scale == scale && a.disp.is_some() == with_disp).then_some(a)
}

/// Match the operand text expected by `desc`.
pub fn pattern<'a>(desc: &InstrDesc, c: &mut Cursor<'a>) -> Option<Parsed<'a>> {
    let with_disp = desc.shape == OperandShape::ModRrDisp32;
    let parsed = match (desc.shape, desc.op) {
        (OperandShape::None, _) => Parsed::None,
        (OperandShape::Reg, _) => Parsed::Reg(c.register()?),
        (OperandShape::TwoRegs, _) => {
            let dest = c.register()?;
            c.lit(",")?;
            Parsed::TwoRegs(dest, c.register()?)
        }
        (OperandShape::Flag, _) => Parsed::Flag(c.flag()?),
        (OperandShape::IntIndex, _) => Parsed::Number(c.number()?),
        (OperandShape::Imm32ToReg, _) => {
            let dest = c.register()?;
            c.lit(",")?;
            Parsed::RegNumber(dest, c.number()?)
        }
        (OperandShape::JmpDest16 | OperandShape::JmpDest32, _) => {
            let target = match c.label() {
                Some(l) => Target::Label(l),
                None => Target::Disp(c.number()?),
            };
            Parsed::Target(target)
        }
        (OperandShape::ModRr | OperandShape::ModRrDisp32, Op::Load { scale, .. }) => {
            let dest = c.register()?;
            c.lit(",")?;
            Parsed::Load(dest, address_for(c, scale, with_disp)?)
        }
        (OperandShape::ModRr | OperandShape::ModRrDisp32, Op::Store { scale, .. }) => {
            let addr = address_for(c, scale, with_disp)?;
            c.lit(",")?;
            Parsed::Store(addr, c.register()?)
        }
        (OperandShape::ModRr | OperandShape::ModRrDisp32, _) => {
            Parsed::Address(address_for(c, 1, with_disp)?)
        }
    };
    Some(parsed)
}

/// Turn matched operand text into encodable operands. Branch targets are
/// handed to `target`, which returns a displacement already range-checked
/// for `shape`.
pub fn lower<'a>(
    parsed: &Parsed<'a>,
    shape: OperandShape,
    line: usize,
    target: impl FnOnce(&Target<'a>) -> AsmResult<i32>,
) -> AsmResult<Operands> {
    let ops = match parsed {
        Parsed::None => Operands::None,
        Parsed::Reg(r) => Operands::Reg(r.value),
        Parsed::TwoRegs(dest, src) => Operands::ModRr(ModRr::pair(dest.value, src.value)),
        Parsed::Flag(f) => Operands::Flag(f.value),
        Parsed::Number(n) => {
            let v = number_value(n, line)?;
            let index = v.to_u8().ok_or_else(|| {
                AsmError::new(line, n.column, AsmErrorKind::InterruptNumberOutOfRange(v))
            })?;
            Operands::IntIndex(index)
        }
        Parsed::RegNumber(dest, n) => Operands::Imm32 {
            reg: dest.value,
            value: word_value(n, line)?,
        },
        Parsed::Target(t) => {
            let disp = target(t)?;
            match shape {
                OperandShape::JmpDest16 => Operands::Disp16(disp as i16),
                _ => Operands::Disp32(disp),
            }
        }
        Parsed::Address(a) => a.operands(ZERO, line)?,
        Parsed::Load(dest, a) => a.operands(dest.value, line)?,
        Parsed::Store(a, src) => a.operands(src.value, line)?,
    };
    Ok(ops)
}
