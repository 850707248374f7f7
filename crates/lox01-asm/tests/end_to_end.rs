use lox01::interrupt::InterruptLog;
use lox01::{Bus, Machine, MachineConfig, Trap};
use lox01_asm::{assemble, disassemble};
use pretty_assertions::assert_eq;

fn boot(src: &str) -> Machine {
    let asm = assemble(src).unwrap();
    let mut m = Machine::new(MachineConfig::default()).unwrap();
    m.load(&asm.code).unwrap();
    m.reset();
    m
}

#[test]
fn counting_loop() {
    let mut m = boot(
        "
        mov sp, 0x8000
        mov r1, 0
        mov r2, 10
        mov r3, 1
    loop:
        add r1, r2
        sub r2, r3
        jnz loop
        brk",
    );
    let steps = m.run_for(1_000).unwrap();
    assert!(m.cpu.is_halted());
    assert_eq!(steps, 4 + 3 * 10 + 1);
    assert_eq!(m.cpu.reg(1), 55);
    assert_eq!(m.cpu.reg(2), 0);
}

#[test]
fn call_and_return() {
    let mut m = boot(
        "
        mov sp, 0x8000
        mov r1, 21
        call double
        brk
    double:
        add r1, r1
        ret",
    );
    m.run().unwrap();
    assert_eq!(m.cpu.reg(1), 42);
    assert_eq!(m.cpu.sp(), 0x8000);
}

#[test]
fn indexed_memory_moves() {
    let mut m = boot(
        "
        mov r4, 0x2000
        mov r1, 0x11223344
        mov32 r4:[0], r1
        mov r2, 1
        mov8 r3, r4:[r2]
        mov16 rg, r4:[r2*2]
        mov32 [r2*4+0x2000], r3
        brk",
    );
    m.run().unwrap();
    assert_eq!(m.cpu.reg(3), 0x33);
    assert_eq!(m.cpu.reg(5), 0x1122);
    assert_eq!(m.memory.read_u32(0x2000).unwrap(), 0x1122_3344);
    assert_eq!(m.memory.read_u32(0x2004).unwrap(), 0x33);
}

#[test]
fn signed_and_unsigned_branches_disagree() {
    // -1 vs 1: less signed, greater unsigned
    let mut m = boot(
        "
        mov r1, -1
        mov r2, 1
        mov r3, 0
        cmp r1, r2
        jl signed_less
        brk
    signed_less:
        mov r3, 1
        jgu done
        mov r3, 2
    done:
        brk",
    );
    m.run().unwrap();
    assert_eq!(m.cpu.reg(3), 1);
    assert_eq!(m.cpu.reg(1), 0xFFFF_FFFF);
}

#[test]
fn software_interrupts_reach_the_hook() {
    let asm = assemble("int 0x21\nint 3\nbrk").unwrap();
    let mut m = Machine::with_hook(MachineConfig::default(), InterruptLog::default()).unwrap();
    m.load(&asm.code).unwrap();
    m.reset();
    m.run().unwrap();
    assert_eq!(m.hook.seen, vec![0x21, 3]);
}

#[test]
fn divide_by_zero_stops_the_program() {
    let mut m = boot("mov r1, 5\ndiv r1, r2\nbrk");
    let err = m.run().unwrap_err();
    assert!(matches!(err, Trap::DivideByZero { pc: 0x1006 }));
    assert!(m.cpu.is_halted());
    assert_eq!(m.cpu.reg(1), 5);
}

#[test]
fn listing_reassembles_to_the_same_image() {
    let src = "
        mov sp, 0x8000
        mov r1, -16
        mov r2, r1
        mov r3, zero
    top:
        setf i
        clearf c
        push r1
        pop r4
        pushf
        popf
        addf r1, r2
        rol r1, r3
        not rg
        mov8 r1, r4:[r2*2-16]
        mov16 [r3*4], r2
        mov32 sp:[r1+0x40], pc
        call r4:[r2+8]
        call [r1]
        call top
        jmp r1
        jleu top
        jmp end
        int 0x10
    end:
        ret
        brk";
    let code = assemble(src).unwrap().code;
    let listing: Vec<String> = disassemble(&code, 0)
        .into_iter()
        .map(|l| l.text)
        .collect();
    assert!(listing.iter().all(|t| !t.starts_with(".byte")), "{listing:?}");
    let again = assemble(&listing.join("\n")).unwrap().code;
    assert_eq!(again, code);
}

#[test]
fn non_canonical_bytes_survive_the_round_trip() {
    let code = vec![0x14, 0xC9, 0x33, 0xF9, 0x3C, 0xC1, 1, 0, 0, 0, 0x00];
    let listing: Vec<String> = disassemble(&code, 0)
        .into_iter()
        .map(|l| l.text)
        .collect();
    assert_eq!(listing.last().map(String::as_str), Some("brk"));
    let again = assemble(&listing.join("\n")).unwrap().code;
    assert_eq!(again, code);
}
