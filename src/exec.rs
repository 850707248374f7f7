use tracing::debug;

use crate::codec::{ModRr, Operands};
use crate::cpu::{Cpu, Flags, Trap};
use crate::decoder::{AluOp, Cond, Decoded, FpuOp, MemWidth, Op};
use crate::interrupt::InterruptHook;
use crate::memory::Bus;

const SIGN: u32 = 0x8000_0000;

pub trait Executor {
    /// Run one decoded instruction. PC already points past it.
    fn exec<B: Bus, H: InterruptHook>(
        &self,
        cpu: &mut Cpu,
        bus: &mut B,
        hook: &mut H,
        d: &Decoded,
    ) -> Result<(), Trap>;
}

impl Cond {
    pub fn holds(self, f: Flags) -> bool {
        let z = f.contains(Flags::Z);
        let c = f.contains(Flags::C);
        let o = f.contains(Flags::O);
        let n = f.contains(Flags::N);
        match self {
            Cond::Z => z,
            Cond::Nz => !z,
            Cond::G => !z && !n,
            Cond::Ge => !n,
            Cond::L => n,
            Cond::Le => z || n,
            Cond::Gu => !c && !z,
            Cond::Geu => !c,
            Cond::Lu => c,
            Cond::Leu => c || z,
            Cond::O => o,
            Cond::No => !o,
        }
    }
}

/// Result of an integer ALU operation before it is committed.
struct AluOut {
    value: u32,
    carry: bool,
    overflow: bool,
    store: bool,
}

impl AluOut {
    fn plain(value: u32) -> Self {
        Self {
            value,
            carry: false,
            overflow: false,
            store: true,
        }
    }
}

fn add_overflow(x: u32, y: u32, r: u32) -> bool {
    !(x ^ y) & (x ^ r) & SIGN != 0
}

fn sub_overflow(x: u32, y: u32, r: u32) -> bool {
    (x ^ y) & (x ^ r) & SIGN != 0
}

/// `None` means the divisor was zero.
fn alu(op: AluOp, x: u32, y: u32, carry_in: bool) -> Option<AluOut> {
    let cin = carry_in as u64;
    let out = match op {
        AluOp::Add | AluOp::Adc => {
            let cin = if op == AluOp::Adc { cin } else { 0 };
            let wide = x as u64 + y as u64 + cin;
            let r = wide as u32;
            AluOut {
                value: r,
                carry: wide > u32::MAX as u64,
                overflow: add_overflow(x, y, r),
                store: true,
            }
        }
        AluOp::Sub | AluOp::Subc | AluOp::Cmp => {
            let bin = if op == AluOp::Subc { cin } else { 0 };
            let r = (x as u64).wrapping_sub(y as u64).wrapping_sub(bin) as u32;
            AluOut {
                value: r,
                carry: y as u64 + bin > x as u64,
                overflow: sub_overflow(x, y, r),
                store: op != AluOp::Cmp,
            }
        }
        AluOp::Mul => {
            let wide = x as i32 as i64 * y as i32 as i64;
            let r = wide as u32;
            let lost = wide != r as i32 as i64;
            AluOut {
                value: r,
                carry: lost,
                overflow: lost,
                store: true,
            }
        }
        AluOp::Mulu => {
            let wide = x as u64 * y as u64;
            let lost = wide > u32::MAX as u64;
            AluOut {
                value: wide as u32,
                carry: lost,
                overflow: lost,
                store: true,
            }
        }
        AluOp::Div => {
            if y == 0 {
                return None;
            }
            AluOut::plain((x as i32).wrapping_div(y as i32) as u32)
        }
        AluOp::Divu => {
            if y == 0 {
                return None;
            }
            AluOut::plain(x / y)
        }
        AluOp::Rem => {
            if y == 0 {
                return None;
            }
            AluOut::plain((x as i32).wrapping_rem(y as i32) as u32)
        }
        AluOp::And => AluOut::plain(x & y),
        AluOp::Or => AluOut::plain(x | y),
        AluOp::Xor => AluOut::plain(x ^ y),
        AluOp::Shr | AluOp::Sar | AluOp::Shl => {
            let n = y & 31;
            let value = match op {
                AluOp::Shr => x >> n,
                AluOp::Sar => ((x as i32) >> n) as u32,
                _ => x << n,
            };
            let carry = match (op, n) {
                (_, 0) => false,
                (AluOp::Shl, n) => (x >> (32 - n)) & 1 != 0,
                (_, n) => (x >> (n - 1)) & 1 != 0,
            };
            AluOut {
                value,
                carry,
                overflow: false,
                store: true,
            }
        }
        AluOp::Rol => AluOut::plain(x.rotate_left(y & 31)),
        AluOp::Ror => AluOut::plain(x.rotate_right(y & 31)),
    };
    Some(out)
}

fn set_zn(cpu: &mut Cpu, res: u32) {
    cpu.flags.set(Flags::Z, res == 0);
    cpu.flags.set(Flags::N, res & SIGN != 0);
}

fn effective_address(cpu: &Cpu, m: ModRr, scale: u8, disp: i32) -> u32 {
    cpu.reg(m.base)
        .wrapping_add(cpu.reg(m.index).wrapping_mul(scale as u32))
        .wrapping_add(disp as u32)
}

/// ModRR byte plus optional displacement of an addressing operand.
fn address_operand(d: &Decoded, pc: u32) -> Result<(ModRr, i32), Trap> {
    match d.operands {
        Operands::ModRr(m) => Ok((m, 0)),
        Operands::ModRrDisp(m, disp) => Ok((m, disp)),
        _ => Err(Trap::InvalidInstruction { pc }),
    }
}

fn load<B: Bus>(bus: &mut B, addr: u32, width: MemWidth) -> Result<u32, Trap> {
    let v = match width {
        MemWidth::W8 => bus.read_u8(addr).map(u32::from),
        MemWidth::W16 => bus.read_u16(addr).map(u32::from),
        MemWidth::W32 => bus.read_u32(addr),
    };
    v.map_err(|source| Trap::Bus { addr, source })
}

fn store<B: Bus>(bus: &mut B, addr: u32, width: MemWidth, val: u32) -> Result<(), Trap> {
    let r = match width {
        MemWidth::W8 => bus.write_u8(addr, val as u8),
        MemWidth::W16 => bus.write_u16(addr, val as u16),
        MemWidth::W32 => bus.write_u32(addr, val),
    };
    r.map_err(|source| Trap::Bus { addr, source })
}

/// Integer, float and control-flow semantics of the base instruction set.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreExecutor;

impl Executor for CoreExecutor {
    fn exec<B: Bus, H: InterruptHook>(
        &self,
        cpu: &mut Cpu,
        bus: &mut B,
        hook: &mut H,
        d: &Decoded,
    ) -> Result<(), Trap> {
        let next = cpu.pc();
        let pc = next.wrapping_sub(d.len as u32);
        let bad = || Trap::InvalidInstruction { pc };

        match (d.op, d.operands) {
            (Op::Brk, _) => {
                debug!(pc, "brk");
                cpu.halt();
            }
            (Op::Nop, _) => {}
            (Op::Jmp, Operands::Reg(r)) => cpu.set_pc(cpu.reg(r)),
            (Op::Jmp, Operands::Disp32(disp)) => cpu.set_pc(next.wrapping_add(disp as u32)),
            (Op::Jcc(cond), Operands::Disp16(disp)) => {
                if cond.holds(cpu.flags) {
                    cpu.set_pc(next.wrapping_add(disp as i32 as u32));
                }
            }
            (Op::Call, ops) => {
                let target = match ops {
                    Operands::Disp32(disp) => next.wrapping_add(disp as u32),
                    Operands::ModRr(m) => effective_address(cpu, m, 1, 0),
                    Operands::ModRrDisp(m, disp) => effective_address(cpu, m, 1, disp),
                    _ => return Err(bad()),
                };
                cpu.push_u32(bus, next)?;
                cpu.set_pc(target);
            }
            (Op::Ret, _) => {
                let target = cpu.pop_u32(bus)?;
                cpu.set_pc(target);
            }
            (Op::Alu(op), Operands::ModRr(m)) => {
                let x = cpu.reg(m.reg);
                let y = cpu.reg(m.base);
                let out = alu(op, x, y, cpu.flags.contains(Flags::C))
                    .ok_or(Trap::DivideByZero { pc })?;
                set_zn(cpu, out.value);
                cpu.flags.set(Flags::C, out.carry);
                cpu.flags.set(Flags::O, out.overflow);
                if out.store {
                    cpu.set_reg(m.reg, out.value);
                }
            }
            (Op::Fpu(op), Operands::ModRr(m)) => {
                let x = f32::from_bits(cpu.reg(m.reg));
                let y = f32::from_bits(cpu.reg(m.base));
                cpu.flags.remove(Flags::ARITH);
                let res = match op {
                    FpuOp::Add => x + y,
                    FpuOp::Sub => x - y,
                    FpuOp::Mul => x * y,
                    FpuOp::Div => x / y,
                    FpuOp::Cmp => {
                        cpu.flags.set(Flags::N, x < y);
                        cpu.flags.set(Flags::Z, x == y);
                        return Ok(());
                    }
                };
                cpu.flags.set(Flags::N, res < 0.0);
                cpu.set_reg(m.reg, res.to_bits());
            }
            (Op::Not, Operands::Reg(r)) => {
                let res = !cpu.reg(r);
                set_zn(cpu, res);
                cpu.flags.remove(Flags::C | Flags::O);
                cpu.set_reg(r, res);
            }
            (Op::ClearFlag, Operands::Flag(i)) => {
                cpu.flags.remove(Flags::from_index(i).ok_or_else(bad)?);
            }
            (Op::SetFlag, Operands::Flag(i)) => {
                cpu.flags.insert(Flags::from_index(i).ok_or_else(bad)?);
            }
            (Op::Push, Operands::Reg(r)) => {
                cpu.push_u32(bus, cpu.reg(r))?;
                cpu.flags.remove(Flags::ARITH);
            }
            (Op::Pop, Operands::Reg(r)) => {
                let v = cpu.pop_u32(bus)?;
                cpu.set_reg(r, v);
                cpu.flags.remove(Flags::ARITH);
            }
            (Op::PushF, _) => cpu.push_u8(bus, cpu.flag_byte())?,
            (Op::PopF, _) => {
                let byte = cpu.pop_u8(bus)?;
                cpu.set_flag_byte(byte);
            }
            (Op::Int, Operands::IntIndex(n)) => {
                debug!(pc, number = n, "int");
                hook.execute_interrupt(cpu, bus, n)?;
            }
            (Op::Mov, Operands::Imm32 { reg, value }) => cpu.set_reg(reg, value),
            (Op::Mov, Operands::ModRr(m)) => cpu.set_reg(m.reg, cpu.reg(m.base)),
            (Op::Load { width, scale }, _) => {
                let (m, disp) = address_operand(d, pc)?;
                let addr = effective_address(cpu, m, scale, disp);
                let v = load(bus, addr, width)?;
                cpu.set_reg(m.reg, v);
            }
            (Op::Store { width, scale }, _) => {
                let (m, disp) = address_operand(d, pc)?;
                let addr = effective_address(cpu, m, scale, disp);
                store(bus, addr, width, cpu.reg(m.reg))?;
            }
            _ => return Err(bad()),
        }
        Ok(())
    }
}
