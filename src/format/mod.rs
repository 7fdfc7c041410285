//! Output format module implementation

mod json;
mod csv;

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;
use clap::ValueEnum;

use crate::{Disassembly, DisassemblyError, BITS_HEADER};

/// Column the listing comment starts at.
const LISTING_COLUMN: usize = 32;

/// Supported output formats for disassembly results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Assembler source (default)
    #[default]
    Asm,
    /// Assembler source with offsets and raw bytes in trailing comments
    Listing,
    /// JSON format (one document)
    Json,
    /// JSON Lines format (one JSON object per line)
    #[value(name = "jsonl")]
    JsonLines,
    /// CSV format (comma-separated values)
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Asm => write!(f, "asm"),
            OutputFormat::Listing => write!(f, "listing"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asm" => Ok(OutputFormat::Asm),
            "listing" => Ok(OutputFormat::Listing),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Asm,
            OutputFormat::Listing,
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Csv,
        ]
    }

    /// Get a formatter for this output format
    pub fn get_formatter(&self) -> Box<dyn DisassemblyFormatter> {
        match self {
            OutputFormat::Asm => Box::new(AsmFormatter),
            OutputFormat::Listing => Box::new(ListingFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter),
            OutputFormat::Csv => Box::new(CsvFormatter),
        }
    }
}

/// Formatter trait for disassembly output
pub trait DisassemblyFormatter {
    /// Format a disassembly result
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError>;
}

/// Format disassembly as assembler source
pub struct AsmFormatter;

/// Format disassembly as assembler source with offset/byte comments
pub struct ListingFormatter;

/// Format disassembly in JSON
pub struct JsonFormatter;

/// Format disassembly in JSON Lines
pub struct JsonLinesFormatter;

/// Format disassembly in CSV
pub struct CsvFormatter;

impl DisassemblyFormatter for AsmFormatter {
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError> {
        let mut output = String::new();
        output.push_str(BITS_HEADER);
        output.push('\n');

        for insn in disassembly {
            output.push_str(&insn.to_string());
            output.push('\n');
        }

        Ok(output)
    }
}

impl DisassemblyFormatter for ListingFormatter {
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError> {
        let mut output = String::new();
        output.push_str(BITS_HEADER);
        output.push('\n');

        for insn in disassembly {
            writeln!(
                output,
                "{:<width$} ; {:04x}: {}",
                insn.to_string(),
                insn.addr,
                insn.hex_bytes(),
                width = LISTING_COLUMN
            )
            .map_err(|e| DisassemblyError::Format(e.to_string()))?;
        }

        Ok(output)
    }
}
