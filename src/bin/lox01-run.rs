use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lox01::codec::REG_NAMES;
use lox01::interrupt::InterruptLog;
use lox01::{Machine, MachineConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DumpFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a Lox01 binary image")]
struct Opts {
    /// Machine description (JSON); defaults to 64 KiB of RAM at 0
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,
    /// Override the address the image is loaded at
    #[arg(long, value_parser = parse_u32)]
    load_base: Option<u32>,
    /// Override the reset PC
    #[arg(short, long, value_parser = parse_u32)]
    entry: Option<u32>,
    /// Stop after this many instructions
    #[arg(long, default_value_t = 10_000_000u64)]
    max_steps: u64,
    /// Final state format
    #[arg(long, value_enum, default_value_t = DumpFormat::Text)]
    dump_state: DumpFormat,
    #[arg(value_name = "BINFILE")]
    input: String,
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let mut cfg = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str::<MachineConfig>(&text).with_context(|| format!("parsing {path}"))?
        }
        None => MachineConfig::default(),
    };
    if let Some(entry) = opts.entry {
        cfg.cpu.reset_pc = entry;
        if opts.load_base.is_none() {
            cfg.load_base = entry;
        }
    }
    if let Some(base) = opts.load_base {
        cfg.load_base = base;
    }

    let image = std::fs::read(&opts.input).with_context(|| format!("reading {}", opts.input))?;
    let mut machine = Machine::with_hook(cfg, InterruptLog::default())?;
    machine.load(&image)?;
    machine.reset();

    match machine.run_for(opts.max_steps) {
        Ok(steps) if machine.cpu.is_halted() => info!(steps, "halted"),
        Ok(steps) => warn!(steps, "step limit reached"),
        Err(trap) => eprintln!("TRAP: {trap}"),
    }
    if !machine.hook.seen.is_empty() {
        info!(interrupts = ?machine.hook.seen, "interrupts raised");
    }

    match opts.dump_state {
        DumpFormat::Json => println!("{}", serde_json::to_string_pretty(&machine.cpu)?),
        DumpFormat::Text => {
            for (name, val) in REG_NAMES.iter().zip(machine.cpu.regs.iter()).skip(1) {
                println!("{name:<4} {val:#010x}");
            }
            println!("flags {:#07b}", machine.cpu.flag_byte());
        }
    }
    Ok(())
}
