//! Extension point for interrupt handlers.

use crate::cpu::{Cpu, Trap};
use crate::memory::Bus;

/// Handles `int n` and accepted interrupt requests. The core itself gives
/// interrupts no meaning beyond calling this hook.
pub trait InterruptHook {
    fn execute_interrupt<B: Bus>(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut B,
        number: u8,
    ) -> Result<(), Trap>;
}

/// Ignores every interrupt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInterrupts;

impl InterruptHook for NoInterrupts {
    fn execute_interrupt<B: Bus>(&mut self, _: &mut Cpu, _: &mut B, _: u8) -> Result<(), Trap> {
        Ok(())
    }
}

/// Records every interrupt number it sees.
#[derive(Debug, Default, Clone)]
pub struct InterruptLog {
    pub seen: Vec<u8>,
}

impl InterruptHook for InterruptLog {
    fn execute_interrupt<B: Bus>(&mut self, _: &mut Cpu, _: &mut B, number: u8) -> Result<(), Trap> {
        self.seen.push(number);
        Ok(())
    }
}
