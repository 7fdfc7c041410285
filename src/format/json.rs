//! JSON and JSON Lines output formatters

use serde::{Serialize, Deserialize};

use crate::{Disassembly, DisassemblyError, Insn};
use super::DisassemblyFormatter;

/// Serializable instruction for JSON output
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct InstructionJson {
    /// Offset of the instruction within the input
    offset: usize,
    /// Size of the instruction in bytes
    size: u8,
    /// Bytes of the instruction as hex string
    bytes: String,
    /// Mnemonic (e.g., "mov", "je")
    mnemonic: String,
    /// Operands
    operands: String,
    /// Full assembler line
    text: String,
}

/// Serializable disassembly result for JSON output
#[derive(Debug, Serialize, Deserialize)]
struct DisassemblyJson {
    /// Operand width mode, always 16
    bits: u8,
    /// Total bytes decoded
    size: usize,
    instructions: Vec<InstructionJson>,
}

fn json_error(e: serde_json::Error) -> DisassemblyError {
    DisassemblyError::Format(format!("JSON serialization error: {}", e))
}

impl DisassemblyFormatter for super::JsonFormatter {
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError> {
        let result = DisassemblyJson {
            bits: 16,
            size: disassembly.size(),
            instructions: disassembly.iter().map(instruction_to_json).collect(),
        };

        serde_json::to_string_pretty(&result).map_err(json_error)
    }
}

impl DisassemblyFormatter for super::JsonLinesFormatter {
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError> {
        let mut output = String::new();

        for insn in disassembly {
            let line = serde_json::to_string(&instruction_to_json(insn)).map_err(json_error)?;
            output.push_str(&line);
            output.push('\n');
        }

        Ok(output)
    }
}

/// Convert an instruction to JSON format
fn instruction_to_json(insn: &Insn) -> InstructionJson {
    InstructionJson {
        offset: insn.addr,
        size: insn.size,
        bytes: insn.hex_bytes(),
        mnemonic: insn.mnemonic().to_string(),
        operands: insn.operands(),
        text: insn.to_string(),
    }
}
