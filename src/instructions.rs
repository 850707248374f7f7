use std::sync::OnceLock;

use crate::codec::OperandShape;
use crate::decoder::{AluOp, Cond, FpuOp, MemWidth, Op};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrDesc {
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub shape: OperandShape,
    pub op: Op,
}

impl InstrDesc {
    const fn new(opcode: u8, mnemonic: &'static str, shape: OperandShape, op: Op) -> Self {
        Self {
            opcode,
            mnemonic,
            shape,
            op,
        }
    }

    /// Encoded length including the opcode byte.
    pub const fn len(&self) -> usize {
        1 + self.shape.len()
    }
}

const ALU: [(u8, &str, AluOp); 18] = [
    (20, "add", AluOp::Add),
    (21, "adc", AluOp::Adc),
    (22, "sub", AluOp::Sub),
    (23, "subc", AluOp::Subc),
    (24, "cmp", AluOp::Cmp),
    (25, "mul", AluOp::Mul),
    (26, "mulu", AluOp::Mulu),
    (27, "div", AluOp::Div),
    (28, "divu", AluOp::Divu),
    (29, "rem", AluOp::Rem),
    (30, "and", AluOp::And),
    (31, "or", AluOp::Or),
    (32, "xor", AluOp::Xor),
    (33, "shr", AluOp::Shr),
    (34, "sar", AluOp::Sar),
    (35, "shl", AluOp::Shl),
    (36, "rol", AluOp::Rol),
    (37, "ror", AluOp::Ror),
];

const FPU: [(u8, &str, FpuOp); 5] = [
    (38, "addf", FpuOp::Add),
    (39, "subf", FpuOp::Sub),
    (40, "cmpf", FpuOp::Cmp),
    (41, "mulf", FpuOp::Mul),
    (42, "divf", FpuOp::Div),
];

// Aliases share the opcode of the entry before them.
const BRANCHES: [(u8, &str, Cond); 16] = [
    (3, "jz", Cond::Z),
    (4, "jnz", Cond::Nz),
    (5, "jg", Cond::G),
    (6, "jge", Cond::Ge),
    (6, "jnn", Cond::Ge),
    (7, "jl", Cond::L),
    (7, "jn", Cond::L),
    (8, "jle", Cond::Le),
    (9, "jgu", Cond::Gu),
    (10, "jgeu", Cond::Geu),
    (10, "jnc", Cond::Geu),
    (11, "jlu", Cond::Lu),
    (11, "jc", Cond::Lu),
    (12, "jleu", Cond::Leu),
    (13, "jo", Cond::O),
    (14, "jno", Cond::No),
];

const MOVES: [(u8, &str, MemWidth); 3] = [
    (62, "mov8", MemWidth::W8),
    (74, "mov16", MemWidth::W16),
    (86, "mov32", MemWidth::W32),
];

fn build() -> Vec<InstrDesc> {
    use OperandShape as S;

    let mut t = vec![
        InstrDesc::new(0, "brk", S::None, Op::Brk),
        InstrDesc::new(1, "jmp", S::Reg, Op::Jmp),
        InstrDesc::new(2, "jmp", S::JmpDest32, Op::Jmp),
    ];
    t.extend(
        BRANCHES
            .iter()
            .map(|&(opc, mn, c)| InstrDesc::new(opc, mn, S::JmpDest16, Op::Jcc(c))),
    );
    t.extend(
        ALU.iter()
            .map(|&(opc, mn, a)| InstrDesc::new(opc, mn, S::TwoRegs, Op::Alu(a))),
    );
    t.extend(
        FPU.iter()
            .map(|&(opc, mn, f)| InstrDesc::new(opc, mn, S::TwoRegs, Op::Fpu(f))),
    );
    t.extend([
        InstrDesc::new(43, "clearf", S::Flag, Op::ClearFlag),
        InstrDesc::new(44, "setf", S::Flag, Op::SetFlag),
        InstrDesc::new(45, "not", S::Reg, Op::Not),
        InstrDesc::new(46, "call", S::JmpDest32, Op::Call),
        InstrDesc::new(48, "call", S::ModRrDisp32, Op::Call),
        InstrDesc::new(49, "call", S::ModRr, Op::Call),
        InstrDesc::new(50, "ret", S::None, Op::Ret),
        InstrDesc::new(51, "push", S::Reg, Op::Push),
        InstrDesc::new(52, "pop", S::Reg, Op::Pop),
        InstrDesc::new(53, "pushf", S::None, Op::PushF),
        InstrDesc::new(54, "popf", S::None, Op::PopF),
        InstrDesc::new(55, "nop", S::None, Op::Nop),
        InstrDesc::new(56, "int", S::IntIndex, Op::Int),
        InstrDesc::new(60, "mov", S::Imm32ToReg, Op::Mov),
        InstrDesc::new(61, "mov", S::TwoRegs, Op::Mov),
    ]);
    // Each block: load x1/x2/x4, load+disp, store, store+disp.
    for &(first, mn, width) in &MOVES {
        let mut opc = first;
        for store in [false, true] {
            for shape in [S::ModRr, S::ModRrDisp32] {
                for scale in [1u8, 2, 4] {
                    let op = if store {
                        Op::Store { width, scale }
                    } else {
                        Op::Load { width, scale }
                    };
                    t.push(InstrDesc::new(opc, mn, shape, op));
                    opc += 1;
                }
            }
        }
    }
    t
}

/// All instruction forms in registration order.
pub fn table() -> &'static [InstrDesc] {
    static TABLE: OnceLock<Vec<InstrDesc>> = OnceLock::new();
    TABLE.get_or_init(build)
}

/// Canonical form for an opcode byte. Aliases resolve to the first registration.
pub fn by_opcode(opcode: u8) -> Option<&'static InstrDesc> {
    static BY_OPCODE: OnceLock<[Option<usize>; 256]> = OnceLock::new();
    let slots = BY_OPCODE.get_or_init(|| {
        let mut slots = [None; 256];
        for (i, d) in table().iter().enumerate() {
            slots[d.opcode as usize].get_or_insert(i);
        }
        slots
    });
    slots[opcode as usize].map(|i| &table()[i])
}

/// Forms registered under `mnemonic` (case-insensitive), in the order they
/// should be tried.
pub fn candidates(mnemonic: &str) -> impl Iterator<Item = &'static InstrDesc> + '_ {
    table()
        .iter()
        .filter(move |d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
}

pub fn is_mnemonic(word: &str) -> bool {
    candidates(word).next().is_some()
}
