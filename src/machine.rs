//! A core wired to a memory map, an interrupt hook and a load address.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cpu::{Cpu, CpuConfig, Trap};
use crate::exec::CoreExecutor;
use crate::interrupt::{InterruptHook, NoInterrupts};
use crate::isa::lox01::Lox01Decoder;
use crate::memory::{MemoryError, MemoryMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub start: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub cpu: CpuConfig,
    /// Where `load` places an image. Programs are assembled from address 0,
    /// so this must match `cpu.reset_pc` for execution to start at the
    /// image's first byte.
    pub load_base: u32,
    pub regions: Vec<RegionConfig>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        let cpu = CpuConfig::default();
        Self {
            load_base: cpu.reset_pc,
            cpu,
            regions: vec![RegionConfig {
                name: "ram".into(),
                start: 0,
                size: 0x1_0000,
            }],
        }
    }
}

pub struct Machine<H: InterruptHook = NoInterrupts> {
    pub cpu: Cpu,
    pub memory: MemoryMap,
    pub hook: H,
    load_base: u32,
    dec: Lox01Decoder,
    exec: CoreExecutor,
}

impl Machine<NoInterrupts> {
    pub fn new(cfg: MachineConfig) -> Result<Self, MemoryError> {
        Self::with_hook(cfg, NoInterrupts)
    }
}

impl<H: InterruptHook> Machine<H> {
    pub fn with_hook(cfg: MachineConfig, hook: H) -> Result<Self, MemoryError> {
        let mut memory = MemoryMap::new();
        for r in &cfg.regions {
            memory.map_ram(&r.name, r.start, r.size)?;
        }
        Ok(Self {
            cpu: Cpu::new(cfg.cpu),
            memory,
            hook,
            load_base: cfg.load_base,
            dec: Lox01Decoder::new(),
            exec: CoreExecutor,
        })
    }

    pub fn load_base(&self) -> u32 {
        self.load_base
    }

    /// Copy an assembled image to the load base.
    pub fn load(&mut self, image: &[u8]) -> Result<(), MemoryError> {
        debug!(base = self.load_base, len = image.len(), "load image");
        self.memory.load(self.load_base, image)
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    pub fn step(&mut self) -> Result<(), Trap> {
        self.cpu
            .step_with(&mut self.memory, &self.dec, &self.exec, &mut self.hook)
    }

    pub fn run(&mut self) -> Result<(), Trap> {
        self.cpu
            .run(&mut self.memory, &self.dec, &self.exec, &mut self.hook)
    }

    pub fn run_for(&mut self, max_steps: u64) -> Result<u64, Trap> {
        self.cpu.run_for(
            &mut self.memory,
            &self.dec,
            &self.exec,
            &mut self.hook,
            max_steps,
        )
    }
}
