use lox01::exec::CoreExecutor;
use lox01::isa::lox01::Lox01Decoder;
use lox01::{Cpu, CpuConfig, Flags, LinearMemory};

const BASE: u32 = 0x1000;

fn enc_jcc(opcode: u8, disp: i16) -> Vec<u8> {
    let mut v = vec![opcode];
    v.extend_from_slice(&disp.to_le_bytes());
    v
}

/// Execute one conditional branch at BASE and return the resulting PC.
fn branch(opcode: u8, disp: i16, flags: Flags) -> u32 {
    let mut mem = LinearMemory::new(0x2000);
    mem.load(BASE, &enc_jcc(opcode, disp)).unwrap();
    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.reset();
    cpu.flags = flags;
    cpu.step(&mut mem, &Lox01Decoder::new(), &CoreExecutor).unwrap();
    cpu.pc()
}

fn taken(opcode: u8, flags: Flags) -> bool {
    branch(opcode, 0x10, flags) == BASE + 3 + 0x10
}

#[test]
fn displacement_is_relative_to_end_of_instruction() {
    assert_eq!(branch(3, 0x10, Flags::Z), BASE + 0x13);
    assert_eq!(branch(3, -3, Flags::Z), BASE);
    assert_eq!(branch(3, 0x10, Flags::empty()), BASE + 3);
}

#[test]
fn zero_and_overflow() {
    assert!(taken(3, Flags::Z));
    assert!(!taken(3, Flags::empty()));
    assert!(taken(4, Flags::empty()));
    assert!(!taken(4, Flags::Z));
    assert!(taken(13, Flags::O));
    assert!(!taken(13, Flags::empty()));
    assert!(taken(14, Flags::empty()));
    assert!(!taken(14, Flags::O));
}

#[test]
fn signed_conditions() {
    // jg: Z=0 and N=0
    assert!(taken(5, Flags::empty()));
    assert!(!taken(5, Flags::Z));
    assert!(!taken(5, Flags::N));
    // jge / jnn: N=0
    assert!(taken(6, Flags::Z));
    assert!(!taken(6, Flags::N));
    // jl / jn: N=1
    assert!(taken(7, Flags::N));
    assert!(!taken(7, Flags::Z));
    // jle: Z=1 or N=1
    assert!(taken(8, Flags::Z));
    assert!(taken(8, Flags::N));
    assert!(!taken(8, Flags::empty()));
}

#[test]
fn unsigned_conditions() {
    // jgu: C=0 and Z=0
    assert!(taken(9, Flags::empty()));
    assert!(!taken(9, Flags::C));
    assert!(!taken(9, Flags::Z));
    assert!(!taken(9, Flags::C | Flags::Z));
    // jgeu / jnc: C=0
    assert!(taken(10, Flags::Z));
    assert!(!taken(10, Flags::C));
    // jlu / jc: C=1
    assert!(taken(11, Flags::C));
    assert!(!taken(11, Flags::empty()));
    // jleu: C=1 or Z=1
    assert!(taken(12, Flags::C));
    assert!(taken(12, Flags::Z));
    assert!(!taken(12, Flags::N));
}

#[test]
fn jmp_register_and_relative() {
    let mut mem = LinearMemory::new(0x2000);
    // jmp r3
    mem.load(BASE, &[0x01, 0x03]).unwrap();
    // at 0x1800: jmp -0x805 (back to BASE - 0x805 + 0x1805 = BASE)
    mem.load(0x1800, &[0x02, 0xFB, 0xF7, 0xFF, 0xFF]).unwrap();
    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.reset();
    cpu.regs[3] = 0x1800;
    let dec = Lox01Decoder::new();
    cpu.step(&mut mem, &dec, &CoreExecutor).unwrap();
    assert_eq!(cpu.pc(), 0x1800);
    cpu.step(&mut mem, &dec, &CoreExecutor).unwrap();
    assert_eq!(cpu.pc(), BASE);
}
