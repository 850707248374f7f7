use anyhow::Error;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::codec::{PC, REG_COUNT, SP, ZERO};
use crate::decoder::Decoder;
use crate::exec::Executor;
use crate::interrupt::{InterruptHook, NoInterrupts};
use crate::memory::Bus;

/// Longest encoding: opcode + ModRR + 32-bit displacement.
const MAX_INSN_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// PC after reset.
    pub reset_pc: u32,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self { reset_pc: 0x1000 }
    }
}

bitflags! {
    /// Flag register; the bit layout is also the `pushf`/`popf` byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Flags: u8 {
        const Z = 1 << 0;
        const C = 1 << 1;
        const O = 1 << 2;
        const N = 1 << 3;
        const I = 1 << 4;
    }
}

impl Flags {
    /// Flags touched by arithmetic; everything except interrupt-enable.
    pub const ARITH: Flags = Flags::Z.union(Flags::C).union(Flags::O).union(Flags::N);

    /// Flag selected by a `setf`/`clearf` operand.
    pub fn from_index(index: u8) -> Option<Flags> {
        if index < 5 {
            Flags::from_bits(1 << index)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Halted,
}

#[derive(thiserror::Error, Debug)]
pub enum Trap {
    #[error("Unknown opcode {opcode:#04x} at {pc:#010x}")]
    UnknownOpcode { pc: u32, opcode: u8 },
    #[error("Invalid instruction at {pc:#010x}")]
    InvalidInstruction { pc: u32 },
    #[error("Divide by zero at {pc:#010x}")]
    DivideByZero { pc: u32 },
    #[error("Bus error at {addr:#010x}: {source}")]
    Bus {
        addr: u32,
        #[source]
        source: Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Indexed by register number; slot 0 always reads zero, slot 7 is PC.
    pub regs: [u32; REG_COUNT],
    pub flags: Flags,
    pub state: RunState,
    /// Latched interrupt request, serviced once `I` is set.
    pub pending_irq: Option<u8>,
    pub cfg: CpuConfig,
}

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        Self {
            regs: [0; REG_COUNT],
            flags: Flags::empty(),
            state: RunState::Halted,
            pending_irq: None,
            cfg,
        }
    }

    pub fn reset(&mut self) {
        self.regs[PC as usize] = self.cfg.reset_pc;
        self.flags = Flags::empty();
        self.pending_irq = None;
        self.state = RunState::Running;
    }

    pub fn pc(&self) -> u32 {
        self.regs[PC as usize]
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.regs[PC as usize] = pc;
    }

    pub fn sp(&self) -> u32 {
        self.regs[SP as usize]
    }

    pub fn reg(&self, r: u8) -> u32 {
        self.regs[(r & 0x7) as usize]
    }

    /// Writes to the zero register are dropped.
    pub fn set_reg(&mut self, r: u8, val: u32) {
        let r = r & 0x7;
        if r != ZERO {
            self.regs[r as usize] = val;
        }
    }

    pub fn is_halted(&self) -> bool {
        self.state == RunState::Halted
    }

    pub fn halt(&mut self) {
        self.state = RunState::Halted;
    }

    pub fn flag_byte(&self) -> u8 {
        self.flags.bits()
    }

    pub fn set_flag_byte(&mut self, byte: u8) {
        self.flags = Flags::from_bits_truncate(byte);
    }

    /// Latch an interrupt request; a newer request replaces an unserviced one.
    pub fn request_interrupt(&mut self, number: u8) {
        self.pending_irq = Some(number);
    }

    pub fn push_u32<B: Bus>(&mut self, bus: &mut B, val: u32) -> Result<(), Trap> {
        let sp = self.sp().wrapping_add(4);
        self.regs[SP as usize] = sp;
        bus.write_u32(sp, val)
            .map_err(|source| Trap::Bus { addr: sp, source })
    }

    pub fn pop_u32<B: Bus>(&mut self, bus: &mut B) -> Result<u32, Trap> {
        let sp = self.sp();
        let val = bus
            .read_u32(sp)
            .map_err(|source| Trap::Bus { addr: sp, source })?;
        self.regs[SP as usize] = sp.wrapping_sub(4);
        Ok(val)
    }

    pub fn push_u8<B: Bus>(&mut self, bus: &mut B, val: u8) -> Result<(), Trap> {
        let sp = self.sp().wrapping_add(1);
        self.regs[SP as usize] = sp;
        bus.write_u8(sp, val)
            .map_err(|source| Trap::Bus { addr: sp, source })
    }

    pub fn pop_u8<B: Bus>(&mut self, bus: &mut B) -> Result<u8, Trap> {
        let sp = self.sp();
        let val = bus
            .read_u8(sp)
            .map_err(|source| Trap::Bus { addr: sp, source })?;
        self.regs[SP as usize] = sp.wrapping_sub(1);
        Ok(val)
    }

    /// Execute one instruction with no interrupt source attached.
    pub fn step<B: Bus, D: Decoder, X: Executor>(
        &mut self,
        bus: &mut B,
        dec: &D,
        exec: &X,
    ) -> Result<(), Trap> {
        self.step_with(bus, dec, exec, &mut NoInterrupts)
    }

    /// Execute one instruction, then service a pending interrupt if enabled.
    /// Any trap halts the core.
    pub fn step_with<B: Bus, D: Decoder, X: Executor, H: InterruptHook>(
        &mut self,
        bus: &mut B,
        dec: &D,
        exec: &X,
        hook: &mut H,
    ) -> Result<(), Trap> {
        if self.is_halted() {
            return Ok(());
        }
        let res = self.step_inner(bus, dec, exec, hook);
        if let Err(trap) = &res {
            debug!(pc = self.pc(), %trap, "trap, halting");
            self.halt();
        }
        res
    }

    fn step_inner<B: Bus, D: Decoder, X: Executor, H: InterruptHook>(
        &mut self,
        bus: &mut B,
        dec: &D,
        exec: &X,
        hook: &mut H,
    ) -> Result<(), Trap> {
        let pc = self.pc();
        let opcode = bus
            .read_u8(pc)
            .map_err(|source| Trap::Bus { addr: pc, source })?;
        let len = dec
            .insn_len(opcode)
            .ok_or(Trap::UnknownOpcode { pc, opcode })?;

        let mut raw = [0u8; MAX_INSN_LEN];
        raw[0] = opcode;
        for (i, slot) in raw.iter_mut().enumerate().take(len).skip(1) {
            let addr = pc.wrapping_add(i as u32);
            *slot = bus
                .read_u8(addr)
                .map_err(|source| Trap::Bus { addr, source })?;
        }
        let d = dec
            .decode(&raw[..len])
            .ok_or(Trap::InvalidInstruction { pc })?;
        trace!(pc, opcode, op = ?d.op, "step");

        // PC names the next instruction before the body runs.
        self.set_pc(pc.wrapping_add(len as u32));
        exec.exec(self, bus, hook, &d)?;

        if self.flags.contains(Flags::I) && !self.is_halted() {
            if let Some(number) = self.pending_irq.take() {
                debug!(number, pc = self.pc(), "servicing interrupt");
                hook.execute_interrupt(self, bus, number)?;
            }
        }
        Ok(())
    }

    /// Step until the core halts.
    pub fn run<B: Bus, D: Decoder, X: Executor, H: InterruptHook>(
        &mut self,
        bus: &mut B,
        dec: &D,
        exec: &X,
        hook: &mut H,
    ) -> Result<(), Trap> {
        while !self.is_halted() {
            self.step_with(bus, dec, exec, hook)?;
        }
        Ok(())
    }

    /// Step at most `max_steps` times; returns the number of steps taken.
    pub fn run_for<B: Bus, D: Decoder, X: Executor, H: InterruptHook>(
        &mut self,
        bus: &mut B,
        dec: &D,
        exec: &X,
        hook: &mut H,
        max_steps: u64,
    ) -> Result<u64, Trap> {
        let mut steps = 0;
        while steps < max_steps && !self.is_halted() {
            self.step_with(bus, dec, exec, hook)?;
            steps += 1;
        }
        Ok(steps)
    }
}
