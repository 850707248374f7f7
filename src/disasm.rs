use crate::codec::{reg_name, ModRr, Operands, FLAG_NAMES, ZERO};
use crate::decoder::{Decoded, Op};

/// Render in assembler syntax. Branch targets are printed as raw
/// displacements, which the assembler accepts back unchanged.
pub fn fmt_decoded(d: &Decoded) -> String {
    let mn = d.mnemonic;
    match (d.op, d.operands) {
        (_, Operands::None) => mn.to_string(),
        (_, Operands::Reg(r)) => format!("{mn} {}", reg_name(r)),
        (Op::Load { scale, .. }, Operands::ModRr(m)) => {
            format!("{mn} {}, {}", reg_name(m.reg), addr(m, scale, None))
        }
        (Op::Load { scale, .. }, Operands::ModRrDisp(m, disp)) => {
            format!("{mn} {}, {}", reg_name(m.reg), addr(m, scale, Some(disp)))
        }
        (Op::Store { scale, .. }, Operands::ModRr(m)) => {
            format!("{mn} {}, {}", addr(m, scale, None), reg_name(m.reg))
        }
        (Op::Store { scale, .. }, Operands::ModRrDisp(m, disp)) => {
            format!("{mn} {}, {}", addr(m, scale, Some(disp)), reg_name(m.reg))
        }
        (Op::Call, Operands::ModRr(m)) => format!("{mn} {}", addr(m, 1, None)),
        (_, Operands::ModRrDisp(m, disp)) => format!("{mn} {}", addr(m, 1, Some(disp))),
        (_, Operands::ModRr(m)) => format!("{mn} {}, {}", reg_name(m.reg), reg_name(m.base)),
        (_, Operands::Flag(f)) => {
            let name = FLAG_NAMES.get(f as usize).copied().unwrap_or("?");
            format!("{mn} {name}")
        }
        (_, Operands::Imm32 { reg, value }) => format!("{mn} {}, {value:#x}", reg_name(reg)),
        (_, Operands::Disp16(disp)) => format!("{mn} {disp}"),
        (_, Operands::Disp32(disp)) => format!("{mn} {disp}"),
        (_, Operands::IntIndex(n)) => format!("{mn} {n:#x}"),
    }
}

fn addr(m: ModRr, scale: u8, disp: Option<i32>) -> String {
    let mut s = String::new();
    if m.base != ZERO {
        s.push_str(reg_name(m.base));
        s.push(':');
    }
    s.push('[');
    let has_index = m.index != ZERO || scale != 1 || disp.is_none();
    if has_index {
        s.push_str(reg_name(m.index));
        if scale != 1 {
            s.push_str(&format!("*{scale}"));
        }
    }
    match disp {
        Some(v) if v < 0 => s.push_str(&format!("-{:#x}", v.unsigned_abs())),
        Some(v) if has_index => s.push_str(&format!("+{v:#x}")),
        Some(v) => s.push_str(&format!("{v:#x}")),
        None => {}
    }
    s.push(']');
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::isa::lox01::Lox01Decoder;
    use pretty_assertions::assert_eq;

    fn dis(bytes: &[u8]) -> String {
        fmt_decoded(&Lox01Decoder::new().decode(bytes).unwrap())
    }

    #[test]
    fn renders_each_operand_shape() {
        assert_eq!(dis(&[0x00]), "brk");
        assert_eq!(dis(&[0x01, 0x07]), "jmp pc");
        assert_eq!(dis(&[0x14, 0x11]), "add r1, r2");
        assert_eq!(dis(&[0x2B, 0x02]), "clearf o");
        assert_eq!(dis(&[0x3C, 0x01, 0xDD, 0xCC, 0xBB, 0xAA]), "mov r1, 0xaabbccdd");
        assert_eq!(dis(&[0x3E, 0xA1]), "mov8 r1, r4:[r2]");
        assert_eq!(dis(&[0x46, 0xA1]), "mov8 r4:[r2*4], r1");
        assert_eq!(dis(&[0x41, 0x01, 0x78, 0x98, 0, 0]), "mov8 r1, [0x9878]");
        assert_eq!(dis(&[0x42, 0xA1, 0xF0, 0xFF, 0xFF, 0xFF]), "mov8 r1, r4:[r2*2-0x10]");
        assert_eq!(dis(&[0x42, 0x01, 0x08, 0, 0, 0]), "mov8 r1, [zero*2+0x8]");
        assert_eq!(dis(&[0x31, 0x40]), "call [r1]");
        assert_eq!(dis(&[0x30, 0x40, 0x04, 0, 0, 0]), "call [r1+0x4]");
        assert_eq!(dis(&[0x2E, 0x50, 0, 0, 0]), "call 80");
        assert_eq!(dis(&[0x0B, 0xFE, 0xFF]), "jlu -2");
        assert_eq!(dis(&[0x38, 0x10]), "int 0x10");
    }
}
