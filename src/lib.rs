//! Core IR, traits, and dispatch for the disasm8086 disassembler.
//!
//! This library turns raw 16-bit 8086 machine code into NASM-compatible
//! assembly source. It covers the MOV/ADD/SUB/CMP forms and the short
//! conditional jump and loop family; anything else stops the run with a
//! [`DecodeError`](decoder::DecodeError).
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::fs;
//! use disasm8086::{decoder::Decoder8086, format::OutputFormat, sweep};
//!
//! let image = fs::read("path/to/listing").unwrap();
//!
//! // Linear sweep over the whole buffer
//! let disassembly = sweep::run(&image, &Decoder8086::new()).unwrap();
//!
//! // Render as assembler source
//! let text = OutputFormat::Asm.get_formatter().format(&disassembly).unwrap();
//! print!("{}", text);
//! ```

pub mod isa;
pub mod decoder;
pub mod sweep;
pub mod format;

use std::fmt;

use crate::decoder::{DecodeError, Decoder8086};
use crate::format::OutputFormat;
use crate::isa::Instruction;

/// Offset of an instruction within the input buffer.
pub type Address = usize;

/// Maximum instruction size in bytes for the supported subset
/// (opcode, mod/rm, two displacement bytes, two data bytes).
pub const MAX_INSTRUCTION_SIZE: usize = 6;

/// Header line that opens every assembler listing.
pub const BITS_HEADER: &str = "bits 16";

/// One decoded instruction located in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    /// Offset of the first byte
    pub addr: Address,
    /// Size of the instruction in bytes
    pub size: u8,
    /// Raw bytes of the instruction (up to MAX_INSTRUCTION_SIZE)
    pub bytes: [u8; MAX_INSTRUCTION_SIZE],
    /// The decoded instruction
    pub instruction: Instruction,
}

impl Insn {
    /// Returns the instruction bytes, up to the actual instruction size.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.size as usize]
    }

    /// Instruction mnemonic (e.g. "mov", "je")
    pub fn mnemonic(&self) -> &'static str {
        self.instruction.mnemonic.name()
    }

    /// Operands as they appear after the mnemonic
    pub fn operands(&self) -> String {
        self.instruction.operand_text()
    }

    /// Space separated lower-case hex of the raw bytes.
    pub fn hex_bytes(&self) -> String {
        self.bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instruction)
    }
}

/// Decoder trait: turns the bytes at one offset into an instruction.
///
/// Implementors must be `Send + Sync` so independent buffers can be decoded
/// in parallel.
pub trait Decoder: Send + Sync {
    /// Decode a single instruction at `at` offset.
    ///
    /// # Arguments
    /// * `image` - The buffer to decode
    /// * `at` - Offset of the instruction's first byte
    ///
    /// # Returns
    /// The decoded instruction, or the reason the bytes could not be decoded
    fn decode(&self, image: &[u8], at: Address) -> Result<Insn, DecodeError>;
}

/// Result of one pass over a buffer: every instruction, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disassembly {
    pub insns: Vec<Insn>,
}

impl Disassembly {
    pub fn new(insns: Vec<Insn>) -> Self {
        Self { insns }
    }

    /// Get the total number of instructions
    pub fn instruction_count(&self) -> usize {
        self.insns.len()
    }

    /// Total bytes consumed by all instructions
    pub fn size(&self) -> usize {
        self.insns.iter().map(|i| i.size as usize).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Insn> {
        self.insns.iter()
    }
}

impl<'a> IntoIterator for &'a Disassembly {
    type Item = &'a Insn;
    type IntoIter = std::slice::Iter<'a, Insn>;

    fn into_iter(self) -> Self::IntoIter {
        self.insns.iter()
    }
}

/// Error type for disassembly operations
#[derive(Debug, thiserror::Error)]
pub enum DisassemblyError {
    /// Decoder error
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Output formatting error
    #[error("Format error: {0}")]
    Format(String),
}

/// Disassemble `image` into assembler source, `bits 16` header included.
pub fn disassemble(image: &[u8]) -> Result<String, DisassemblyError> {
    let disassembly = sweep::run(image, &Decoder8086::new())?;
    OutputFormat::Asm.get_formatter().format(&disassembly)
}
