//! Opcode classification: first byte (and, for the immediate group, the
//! second byte) to mnemonic and encoding shape.

use crate::isa::{Mnemonic, Shape};
use super::DecodeError;

/// Mnemonic and operand layout identified from the opcode byte(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub mnemonic: Mnemonic,
    pub shape: Shape,
}

/// Where a rule gets its mnemonic from.
#[derive(Debug, Clone, Copy)]
enum Select {
    Fixed(Mnemonic),
    /// Bits 3..5 of the opcode byte.
    ArithInOpcode,
    /// Bits 3..5 of the mod/op/rm byte.
    ArithInModRm,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    mask: u8,
    value: u8,
    select: Select,
    shape: Shape,
}

const fn exact(value: u8, mnemonic: Mnemonic) -> Rule {
    prefix(0xff, value, Select::Fixed(mnemonic), Shape::RelativeJump)
}

const fn prefix(mask: u8, value: u8, select: Select, shape: Shape) -> Rule {
    Rule {
        mask,
        value,
        select,
        shape,
    }
}

const MOV: Select = Select::Fixed(Mnemonic::Mov);
const IN_OPCODE: Select = Select::ArithInOpcode;
const IN_MODRM: Select = Select::ArithInModRm;

/// First match wins. The exact jump bytes go first; the prefix rules below do
/// not overlap each other on any byte value.
static RULES: &[Rule] = &[
    exact(0b0111_0000, Mnemonic::Jo),
    exact(0b0111_0001, Mnemonic::Jno),
    exact(0b0111_0010, Mnemonic::Jb),
    exact(0b0111_0011, Mnemonic::Jnb),
    exact(0b0111_0100, Mnemonic::Je),
    exact(0b0111_0101, Mnemonic::Jne),
    exact(0b0111_0110, Mnemonic::Jbe),
    exact(0b0111_0111, Mnemonic::Ja),
    exact(0b0111_1000, Mnemonic::Js),
    exact(0b0111_1001, Mnemonic::Jns),
    exact(0b0111_1010, Mnemonic::Jp),
    exact(0b0111_1011, Mnemonic::Jnp),
    exact(0b0111_1100, Mnemonic::Jl),
    exact(0b0111_1101, Mnemonic::Jnl),
    exact(0b0111_1110, Mnemonic::Jle),
    exact(0b0111_1111, Mnemonic::Jg),
    exact(0b1110_0000, Mnemonic::Loopnz),
    exact(0b1110_0001, Mnemonic::Loopz),
    exact(0b1110_0010, Mnemonic::Loop),
    exact(0b1110_0011, Mnemonic::Jcxz),
    prefix(0b1111_1100, 0b1000_1000, MOV, Shape::RegOrMemToReg),
    prefix(0b1111_1110, 0b1100_0110, MOV, Shape::ImmToRegOrMem),
    prefix(0b1111_0000, 0b1011_0000, MOV, Shape::ImmToReg),
    prefix(0b1111_1110, 0b1010_0000, MOV, Shape::MemToAcc),
    prefix(0b1111_1110, 0b1010_0010, MOV, Shape::AccToMem),
    prefix(0b1111_1100, 0b0000_0000, IN_OPCODE, Shape::RegOrMemToReg),
    prefix(0b1111_1100, 0b0010_1000, IN_OPCODE, Shape::RegOrMemToReg),
    prefix(0b1111_1100, 0b0011_1000, IN_OPCODE, Shape::RegOrMemToReg),
    prefix(0b1111_1100, 0b1000_0000, IN_MODRM, Shape::ImmToRegOrMem),
    prefix(0b1111_1110, 0b0000_0100, IN_OPCODE, Shape::ImmToAcc),
    prefix(0b1111_1110, 0b0010_1100, IN_OPCODE, Shape::ImmToAcc),
    prefix(0b1111_1110, 0b0011_1100, IN_OPCODE, Shape::ImmToAcc),
];

/// ADD/SUB/CMP from the 3-bit operation field shared by all three encodings.
fn arithmetic(field: u8) -> Option<Mnemonic> {
    match field & 0b111 {
        0b000 => Some(Mnemonic::Add),
        0b101 => Some(Mnemonic::Sub),
        0b111 => Some(Mnemonic::Cmp),
        _ => None,
    }
}

/// Classify the instruction starting at `image[at]`.
///
/// Only the immediate group (`100000sw`) looks at the byte after the opcode;
/// if that byte is missing the input is truncated.
pub fn classify(image: &[u8], at: usize) -> Result<Opcode, DecodeError> {
    let first = *image.get(at).ok_or(DecodeError::TruncatedInput {
        offset: at,
        needed: 1,
        available: 0,
    })?;
    let second = image.get(at + 1).copied();
    let unrecognized = || DecodeError::UnrecognizedOpcode { offset: at, first, second };

    let rule = RULES
        .iter()
        .find(|r| first & r.mask == r.value)
        .ok_or_else(unrecognized)?;

    let mnemonic = match rule.select {
        Select::Fixed(m) => m,
        Select::ArithInOpcode => arithmetic(first >> 3).ok_or_else(unrecognized)?,
        Select::ArithInModRm => {
            let modrm = second.ok_or(DecodeError::TruncatedInput {
                offset: at,
                needed: 2,
                available: 1,
            })?;
            arithmetic(modrm >> 3).ok_or_else(unrecognized)?
        }
    };

    log::trace!("0x{:04x}: {:08b} -> {} ({})", at, first, mnemonic, rule.shape);

    Ok(Opcode { mnemonic, shape: rule.shape })
}
