use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use disasm8086::{decoder::Decoder8086, format::OutputFormat, sweep};

#[derive(Parser, Debug)]
#[command(
    name = "disasm8086",
    version,
    about = "Disassemble raw 16-bit 8086 machine code into NASM-compatible source."
)]
struct Args {
    /// Raw machine code file (no header, decoded from the first byte)
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Asm)]
    format: OutputFormat,

    /// Write the output to this path instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let image = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    log::info!("Read {} bytes from {}", image.len(), args.input.display());

    let disassembly = sweep::run(&image, &Decoder8086::new())
        .with_context(|| format!("failed to disassemble {}", args.input.display()))?;
    let text = args.format.get_formatter().format(&disassembly)?;

    match &args.output {
        Some(path) => fs::write(path, &text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }

    log::info!(
        "Decoded {} instructions ({} bytes) as {}",
        disassembly.instruction_count(),
        disassembly.size(),
        args.format
    );

    Ok(())
}
