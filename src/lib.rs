pub mod codec;
pub mod cpu;
pub mod decoder;
pub mod disasm;
pub mod exec;
pub mod instructions;
pub mod interrupt;
pub mod machine;
pub mod memory;

pub mod isa {
    pub mod lox01;
}

pub use cpu::{Cpu, CpuConfig, Flags, RunState, Trap};
pub use interrupt::{InterruptHook, NoInterrupts};
pub use machine::{Machine, MachineConfig, RegionConfig};
pub use memory::{Bus, LinearMemory, MemoryError, MemoryMap};
