//! Operand layouts shared by the decoder and the assembler.
//!
//! Every byte an instruction carries after its opcode is produced by
//! [`Operands::encode`] and read back by [`Operands::decode`]; nothing else in
//! the workspace packs operand bytes by hand.

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

pub const REG_COUNT: usize = 8;

pub const ZERO: u8 = 0;
pub const R1: u8 = 1;
pub const R2: u8 = 2;
pub const R3: u8 = 3;
pub const R4: u8 = 4;
pub const RG: u8 = 5;
pub const SP: u8 = 6;
pub const PC: u8 = 7;

pub const REG_NAMES: [&str; REG_COUNT] = ["zero", "r1", "r2", "r3", "r4", "rg", "sp", "pc"];

/// Highest register slot the 2-bit index field can select.
pub const MAX_INDEX_REG: u8 = R3;

pub const FLAG_NAMES: [&str; 5] = ["z", "c", "o", "n", "i"];

pub fn reg_name(reg: u8) -> &'static str {
    REG_NAMES[(reg & 0x7) as usize]
}

/// Register/addressing byte: `reg` in bits 0-2, `base` in bits 3-5,
/// `index` in bits 6-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModRr {
    pub reg: u8,
    pub base: u8,
    pub index: u8,
}

impl ModRr {
    pub fn new(reg: u8, base: u8, index: u8) -> Self {
        Self { reg, base, index }
    }

    /// Destination/source pair of a two-register instruction.
    pub fn pair(dest: u8, src: u8) -> Self {
        Self::new(dest, src, ZERO)
    }

    pub fn pack(self) -> u8 {
        let mut byte = 0u8;
        let bits = byte.view_bits_mut::<Lsb0>();
        bits[0..3].store_le(self.reg & 0x7);
        bits[3..6].store_le(self.base & 0x7);
        bits[6..8].store_le(self.index & 0x3);
        byte
    }

    pub fn unpack(byte: u8) -> Self {
        let bits = byte.view_bits::<Lsb0>();
        Self {
            reg: bits[0..3].load_le(),
            base: bits[3..6].load_le(),
            index: bits[6..8].load_le(),
        }
    }
}

pub fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn get_i16(bytes: &[u8]) -> Option<i16> {
    Some(i16::from_le_bytes(bytes.get(..2)?.try_into().ok()?))
}

pub fn get_i32(bytes: &[u8]) -> Option<i32> {
    Some(i32::from_le_bytes(bytes.get(..4)?.try_into().ok()?))
}

pub fn get_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?))
}

/// Overwrite a 16-bit field in place. Returns `false` if the field does not fit.
pub fn patch_i16(buf: &mut [u8], offset: usize, v: i16) -> bool {
    match buf.get_mut(offset..offset + 2) {
        Some(field) => {
            field.copy_from_slice(&v.to_le_bytes());
            true
        }
        None => false,
    }
}

/// Overwrite a 32-bit field in place. Returns `false` if the field does not fit.
pub fn patch_i32(buf: &mut [u8], offset: usize, v: i32) -> bool {
    match buf.get_mut(offset..offset + 4) {
        Some(field) => {
            field.copy_from_slice(&v.to_le_bytes());
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperandShape {
    None,
    Reg,
    TwoRegs,
    ModRr,
    ModRrDisp32,
    Flag,
    Imm32ToReg,
    JmpDest16,
    JmpDest32,
    IntIndex,
}

impl OperandShape {
    /// Operand bytes following the opcode.
    pub const fn len(self) -> usize {
        match self {
            OperandShape::None => 0,
            OperandShape::Reg
            | OperandShape::TwoRegs
            | OperandShape::ModRr
            | OperandShape::Flag
            | OperandShape::IntIndex => 1,
            OperandShape::JmpDest16 => 2,
            OperandShape::JmpDest32 => 4,
            OperandShape::ModRrDisp32 | OperandShape::Imm32ToReg => 5,
        }
    }

    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operands {
    None,
    Reg(u8),
    ModRr(ModRr),
    ModRrDisp(ModRr, i32),
    Flag(u8),
    Imm32 { reg: u8, value: u32 },
    Disp16(i16),
    Disp32(i32),
    IntIndex(u8),
}

impl Operands {
    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Operands::None => {}
            Operands::Reg(r) => out.push(r & 0x7),
            Operands::ModRr(m) => out.push(m.pack()),
            Operands::ModRrDisp(m, disp) => {
                out.push(m.pack());
                put_i32(out, disp);
            }
            Operands::Flag(f) => out.push(f),
            Operands::Imm32 { reg, value } => {
                out.push(ModRr::new(reg, ZERO, ZERO).pack());
                put_u32(out, value);
            }
            Operands::Disp16(d) => put_i16(out, d),
            Operands::Disp32(d) => put_i32(out, d),
            Operands::IntIndex(n) => out.push(n),
        }
    }

    /// Decode the operand bytes of `shape`. `None` on short input or an
    /// out-of-range flag index.
    pub fn decode(shape: OperandShape, bytes: &[u8]) -> Option<Self> {
        let ops = match shape {
            OperandShape::None => Operands::None,
            OperandShape::Reg => Operands::Reg(*bytes.first()? & 0x7),
            OperandShape::TwoRegs => {
                let m = ModRr::unpack(*bytes.first()?);
                Operands::ModRr(ModRr::pair(m.reg, m.base))
            }
            OperandShape::ModRr => Operands::ModRr(ModRr::unpack(*bytes.first()?)),
            OperandShape::ModRrDisp32 => {
                Operands::ModRrDisp(ModRr::unpack(*bytes.first()?), get_i32(bytes.get(1..)?)?)
            }
            OperandShape::Flag => {
                let f = *bytes.first()?;
                if f as usize >= FLAG_NAMES.len() {
                    return None;
                }
                Operands::Flag(f)
            }
            OperandShape::Imm32ToReg => Operands::Imm32 {
                reg: ModRr::unpack(*bytes.first()?).reg,
                value: get_u32(bytes.get(1..)?)?,
            },
            OperandShape::JmpDest16 => Operands::Disp16(get_i16(bytes)?),
            OperandShape::JmpDest32 => Operands::Disp32(get_i32(bytes)?),
            OperandShape::IntIndex => Operands::IntIndex(*bytes.first()?),
        };
        Some(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn modrr_matches_reference_bytes() {
        assert_eq!(ModRr::pair(R1, R1).pack(), 0x09);
        assert_eq!(ModRr::pair(R1, R2).pack(), 0x11);
        assert_eq!(ModRr::pair(R1, PC).pack(), 0x39);
        assert_eq!(ModRr::new(R1, R4, R2).pack(), 0xA1);
        assert_eq!(ModRr::new(ZERO, ZERO, R1).pack(), 0x40);
    }

    #[test]
    fn modrr_unpack_inverts_pack() {
        for byte in 0..=u8::MAX {
            let m = ModRr::unpack(byte);
            assert!(m.reg < 8 && m.base < 8 && m.index < 4);
            assert_eq!(m.pack(), byte);
        }
    }

    #[test]
    fn operands_decode_inverts_encode() {
        let cases = [
            (OperandShape::None, Operands::None),
            (OperandShape::Reg, Operands::Reg(SP)),
            (OperandShape::TwoRegs, Operands::ModRr(ModRr::pair(R3, RG))),
            (OperandShape::ModRr, Operands::ModRr(ModRr::new(R1, R4, R2))),
            (
                OperandShape::ModRrDisp32,
                Operands::ModRrDisp(ModRr::new(R2, ZERO, R3), -0x1234),
            ),
            (OperandShape::Flag, Operands::Flag(4)),
            (OperandShape::Imm32ToReg, Operands::Imm32 { reg: R1, value: 0xAABB_CCDD }),
            (OperandShape::JmpDest16, Operands::Disp16(i16::MIN)),
            (OperandShape::JmpDest32, Operands::Disp32(-5)),
            (OperandShape::IntIndex, Operands::IntIndex(0xFF)),
        ];
        for (shape, ops) in cases {
            let mut out = Vec::new();
            ops.encode(&mut out);
            assert_eq!(out.len(), shape.len(), "{shape:?}");
            assert_eq!(Operands::decode(shape, &out), Some(ops));
        }
    }

    #[test]
    fn imm32_layout_is_modrr_then_le_value() {
        let mut out = Vec::new();
        Operands::Imm32 { reg: R1, value: 0xAABB_CCDD }.encode(&mut out);
        assert_eq!(out, vec![0x01, 0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn unused_bits_are_dropped_on_decode() {
        assert_eq!(
            Operands::decode(OperandShape::TwoRegs, &[0xC9]),
            Some(Operands::ModRr(ModRr::pair(R1, R1)))
        );
        assert_eq!(Operands::decode(OperandShape::Reg, &[0xF9]), Some(Operands::Reg(R1)));
    }

    #[test]
    fn flag_index_out_of_range_is_rejected() {
        assert_eq!(Operands::decode(OperandShape::Flag, &[5]), None);
        assert_eq!(Operands::decode(OperandShape::JmpDest32, &[1, 2, 3]), None);
    }

    #[test]
    fn patch_overwrites_in_place() {
        let mut buf = vec![0x37, 0, 0, 0, 0, 0x37];
        assert!(patch_i32(&mut buf, 1, -6));
        assert_eq!(buf, vec![0x37, 0xFA, 0xFF, 0xFF, 0xFF, 0x37]);
        assert!(patch_i16(&mut buf, 4, 1));
        assert_eq!(get_i16(&buf[4..]), Some(1));
        assert!(!patch_i16(&mut buf, 5, 1));
    }
}
