//! Linear disassembly of a raw image.

use lox01::decoder::{Decoded, Decoder};
use lox01::disasm::fmt_decoded;
use lox01::isa::lox01::Lox01Decoder;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingLine {
    pub addr: u32,
    pub bytes: Vec<u8>,
    pub text: String,
}

/// True when re-encoding `d` gives back the bytes it came from. Set bits in
/// unused operand fields would otherwise be lost by the listing.
fn is_canonical(d: &Decoded, bytes: &[u8]) -> bool {
    let mut out = vec![d.opcode];
    d.operands.encode(&mut out);
    bytes.starts_with(&out)
}

/// Decode `image` front to back as if loaded at `base`. Bytes that do not
/// start a valid, canonically encoded instruction are listed as `.byte`.
pub fn disassemble(image: &[u8], base: u32) -> Vec<ListingLine> {
    let dec = Lox01Decoder::new();
    let mut out = Vec::new();
    let mut off = 0usize;
    while off < image.len() {
        let addr = base.wrapping_add(off as u32);
        let rest = &image[off..];
        let decoded = dec
            .insn_len(rest[0])
            .filter(|&len| len <= rest.len())
            .and_then(|len| dec.decode(&rest[..len]))
            .filter(|d| is_canonical(d, rest));
        let (len, text) = match decoded {
            Some(d) => (d.len as usize, fmt_decoded(&d)),
            None => (1, format!(".byte {:#04x}", rest[0])),
        };
        out.push(ListingLine {
            addr,
            bytes: rest[..len].to_vec(),
            text,
        });
        off += len;
    }
    out
}
