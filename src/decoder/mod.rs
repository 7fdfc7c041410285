//! 8086 instruction decoder for the supported MOV/ADD/SUB/CMP/jump subset.

pub mod classify;
pub mod operands;

use std::fmt;

use crate::isa::{Instruction, Mnemonic, Shape};
use crate::{Address, Decoder, Insn, MAX_INSTRUCTION_SIZE};

use self::classify::classify;
use self::operands::{decode_operands, ByteReader};

/// Errors that can occur while decoding a single instruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// No classifier rule matches the leading byte(s)
    #[error("unrecognized opcode at offset {offset}: {}", binary_pair(.first, .second))]
    UnrecognizedOpcode {
        offset: usize,
        first: u8,
        second: Option<u8>,
    },

    /// A `mod` value outside 0..=3
    #[error("invalid addressing mode {mode:#b} at offset {offset}")]
    InvalidAddressingMode { offset: usize, mode: u8 },

    /// Mnemonic and shape have no operand field mapping
    #[error("no operand encoding for {mnemonic} as {shape} at offset {offset}")]
    InvalidOperandEncoding {
        offset: usize,
        mnemonic: Mnemonic,
        shape: Shape,
    },

    /// The buffer ends inside the instruction
    #[error("truncated input at offset {offset}: instruction needs {needed} bytes but only {available} remain")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

impl DecodeError {
    /// Stream offset of the instruction that failed to decode.
    pub fn offset(&self) -> usize {
        match *self {
            DecodeError::UnrecognizedOpcode { offset, .. }
            | DecodeError::InvalidAddressingMode { offset, .. }
            | DecodeError::InvalidOperandEncoding { offset, .. }
            | DecodeError::TruncatedInput { offset, .. } => offset,
        }
    }
}

fn binary_pair(first: &u8, second: &Option<u8>) -> String {
    match second {
        Some(second) => format!("{:08b} {:08b}", first, second),
        None => format!("{:08b} (end of input)", first),
    }
}

/// An instruction together with the number of bytes it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub instruction: Instruction,
    pub size: usize,
}

/// Decode the single instruction starting at `image[at]`.
///
/// Reads only the bytes the encoding calls for; the caller is responsible
/// for advancing past `size` bytes.
pub fn decode_at(image: &[u8], at: usize) -> Result<Decoded, DecodeError> {
    let opcode = classify(image, at)?;
    let mut reader = ByteReader::new(image, at);
    let instruction = decode_operands(opcode, &mut reader)?;
    Ok(Decoded { instruction, size: reader.consumed() })
}

/// Decoder for 16-bit 8086 code.
#[derive(Debug, Default, Clone, Copy)]
pub struct Decoder8086;

impl Decoder8086 {
    pub fn new() -> Self {
        Decoder8086
    }
}

impl fmt::Display for Decoder8086 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decoder8086")
    }
}

impl Decoder for Decoder8086 {
    fn decode(&self, image: &[u8], at: Address) -> Result<Insn, DecodeError> {
        let Decoded { instruction, size } = decode_at(image, at)?;

        // Every supported encoding fits in MAX_INSTRUCTION_SIZE bytes
        let mut bytes = [0u8; MAX_INSTRUCTION_SIZE];
        bytes[..size].copy_from_slice(&image[at..at + size]);

        Ok(Insn {
            addr: at,
            size: size as u8,
            bytes,
            instruction,
        })
    }
}
