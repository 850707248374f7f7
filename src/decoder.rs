use serde::{Deserialize, Serialize};

use crate::codec::Operands;

/// Branch predicates over the flag register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cond {
    Z,
    Nz,
    G,
    Ge,
    L,
    Le,
    Gu,
    Geu,
    Lu,
    Leu,
    O,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Subc,
    Cmp,
    Mul,
    Mulu,
    Div,
    Divu,
    Rem,
    And,
    Or,
    Xor,
    Shr,
    Sar,
    Shl,
    Rol,
    Ror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FpuOp {
    Add,
    Sub,
    Cmp,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemWidth {
    W8 = 1,
    W16 = 2,
    W32 = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Brk,
    Nop,
    /// Register or pc-relative target, depending on the operands.
    Jmp,
    Jcc(Cond),
    /// Relative, indirect or indexed-indirect, depending on the operands.
    Call,
    Ret,
    Alu(AluOp),
    Fpu(FpuOp),
    Not,
    ClearFlag,
    SetFlag,
    Push,
    Pop,
    PushF,
    PopF,
    Int,
    /// Immediate or register source, depending on the operands.
    Mov,
    Load { width: MemWidth, scale: u8 },
    Store { width: MemWidth, scale: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decoded {
    pub opcode: u8,
    pub op: Op,
    pub mnemonic: &'static str,
    /// Total length including the opcode byte.
    pub len: u8,
    pub operands: Operands,
}

pub trait Decoder {
    /// Length of the instruction starting with `opcode`, or `None` if unassigned.
    fn insn_len(&self, opcode: u8) -> Option<usize>;
    fn decode(&self, bytes: &[u8]) -> Option<Decoded>;
}
