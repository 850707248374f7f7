use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lox01_asm::{assemble, disassemble};

#[derive(Parser, Debug)]
#[command(author, version, about = "Lox01 assembler and disassembler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a source file into a raw binary image
    Asm {
        /// Input assembly file (one instruction or directive per line)
        #[arg(short, long)]
        input: PathBuf,
        /// Output binary file
        #[arg(short, long)]
        output: PathBuf,
        /// Export label addresses to JSON
        #[arg(long, value_name = "FILE")]
        symbols: Option<PathBuf>,
    },
    /// Disassemble a raw binary image
    Dis {
        #[arg(value_name = "BINFILE")]
        input: PathBuf,
        /// Address of the first byte (hex or dec)
        #[arg(long, default_value = "0")]
        base: String,
        /// Show instruction bytes
        #[arg(long)]
        show_bytes: bool,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
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

    let cli = Cli::parse();
    match cli.cmd {
        Command::Asm {
            input,
            output,
            symbols,
        } => {
            let src = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let asm = match assemble(&src) {
                Ok(asm) => asm,
                Err(err) => {
                    eprint!("{}", err.render(&input.display().to_string(), &src));
                    bail!("assembly of {} failed", input.display());
                }
            };
            fs::write(&output, &asm.code)
                .with_context(|| format!("writing {}", output.display()))?;
            if let Some(path) = symbols {
                fs::write(&path, serde_json::to_string_pretty(&asm.labels)?)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            println!("{} bytes, {} labels", asm.code.len(), asm.labels.len());
        }
        Command::Dis {
            input,
            base,
            show_bytes,
            format,
        } => {
            let image =
                fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let lines = disassemble(&image, parse_u32(&base)?);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&lines)?),
                OutputFormat::Text => {
                    for l in &lines {
                        if show_bytes {
                            let hex: Vec<String> =
                                l.bytes.iter().map(|b| format!("{b:02x}")).collect();
                            println!("{:#010x}: {:<18} {}", l.addr, hex.join(" "), l.text);
                        } else {
                            println!("{:#010x}: {}", l.addr, l.text);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
