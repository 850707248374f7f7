//! Table-driven decoder for the Lox01 encoding.

use crate::codec::Operands;
use crate::decoder::{Decoded, Decoder};
use crate::instructions::by_opcode;

#[derive(Debug, Default, Clone, Copy)]
pub struct Lox01Decoder;

impl Lox01Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for Lox01Decoder {
    fn insn_len(&self, opcode: u8) -> Option<usize> {
        by_opcode(opcode).map(|d| d.len())
    }

    fn decode(&self, bytes: &[u8]) -> Option<Decoded> {
        let (&opcode, rest) = bytes.split_first()?;
        let desc = by_opcode(opcode)?;
        let operands = Operands::decode(desc.shape, rest)?;
        Some(Decoded {
            opcode,
            op: desc.op,
            mnemonic: desc.mnemonic,
            len: desc.len() as u8,
            operands,
        })
    }
}
