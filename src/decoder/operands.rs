//! Operand decoding for each encoding shape.
//!
//! Every path reads through a [`ByteReader`] anchored at the first byte of
//! the instruction, so the number of bytes consumed falls out of the reader
//! instead of being tracked by hand.

use crate::isa::{EffectiveAddress, Instruction, Mnemonic, Operand, Register, Shape, Width};
use super::classify::Opcode;
use super::DecodeError;

/// `rm` value that means "direct address" under mod 00.
const DIRECT_ADDRESS_RM: u8 = 0b110;

/// Bounds-checked little-endian reader over one instruction.
#[derive(Debug)]
pub struct ByteReader<'a> {
    image: &'a [u8],
    start: usize,
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(image: &'a [u8], start: usize) -> Self {
        Self { image, start, pos: start }
    }

    /// Offset of the instruction being read.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Bytes read so far.
    pub fn consumed(&self) -> usize {
        self.pos - self.start
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.image.get(self.pos).ok_or_else(|| self.truncated(1))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        if self.pos + 2 > self.image.len() {
            return Err(self.truncated(2));
        }
        let value = u16::from_le_bytes([self.image[self.pos], self.image[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    fn truncated(&self, wanted: usize) -> DecodeError {
        DecodeError::TruncatedInput {
            offset: self.start,
            needed: self.consumed() + wanted,
            available: self.image.len().saturating_sub(self.start),
        }
    }
}

/// The `mod` field of a mod/reg/rm byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// mod 00: no displacement (or a direct address when rm = 110)
    Memory,
    /// mod 01
    Memory8,
    /// mod 10
    Memory16,
    /// mod 11
    Register,
}

impl AddressingMode {
    pub fn from_bits(bits: u8, offset: usize) -> Result<Self, DecodeError> {
        match bits {
            0b00 => Ok(AddressingMode::Memory),
            0b01 => Ok(AddressingMode::Memory8),
            0b10 => Ok(AddressingMode::Memory16),
            0b11 => Ok(AddressingMode::Register),
            mode => Err(DecodeError::InvalidAddressingMode { offset, mode }),
        }
    }
}

/// A split mod/reg/rm byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    pub mode: AddressingMode,
    pub reg: u8,
    pub rm: u8,
}

impl ModRm {
    pub fn parse(byte: u8, offset: usize) -> Result<Self, DecodeError> {
        Ok(Self {
            mode: AddressingMode::from_bits(byte >> 6, offset)?,
            reg: (byte >> 3) & 0b111,
            rm: byte & 0b111,
        })
    }
}

/// Resolve the register-or-memory operand named by `modrm`, reading any
/// displacement or direct address that follows.
pub fn decode_rm(
    reader: &mut ByteReader<'_>,
    modrm: ModRm,
    width: Width,
) -> Result<Operand, DecodeError> {
    let base = EffectiveAddress::from_rm(modrm.rm);
    let operand = match modrm.mode {
        AddressingMode::Memory if modrm.rm == DIRECT_ADDRESS_RM => Operand::Direct(reader.u16()?),
        AddressingMode::Memory => Operand::Memory { base, displacement: 0 },
        AddressingMode::Memory8 => Operand::Memory {
            base,
            displacement: i16::from(reader.u8()? as i8),
        },
        AddressingMode::Memory16 => Operand::Memory {
            base,
            displacement: reader.u16()? as i16,
        },
        AddressingMode::Register => Operand::Register(Register::from_code(modrm.rm, width)),
    };
    Ok(operand)
}

fn immediate(reader: &mut ByteReader<'_>, wide: bool) -> Result<u16, DecodeError> {
    if wide {
        reader.u16()
    } else {
        reader.u8().map(u16::from)
    }
}

/// Decode the instruction whose opcode was classified as `opcode`. The reader
/// must sit on the opcode byte; on return it sits just past the instruction.
pub fn decode_operands(
    opcode: Opcode,
    reader: &mut ByteReader<'_>,
) -> Result<Instruction, DecodeError> {
    let Opcode { mnemonic, shape } = opcode;
    let offset = reader.start();
    let invalid = || DecodeError::InvalidOperandEncoding { offset, mnemonic, shape };

    let first = reader.u8()?;
    let is_mov = mnemonic == Mnemonic::Mov;

    let insn = match shape {
        Shape::RegOrMemToReg => {
            if !(is_mov || mnemonic.is_arithmetic()) {
                return Err(invalid());
            }
            let reg_is_dst = (first >> 1) & 1 == 1;
            let width = Width::from_w(first);
            let modrm = ModRm::parse(reader.u8()?, offset)?;
            let reg = Operand::Register(Register::from_code(modrm.reg, width));
            let rm = decode_rm(reader, modrm, width)?;
            if reg_is_dst {
                Instruction::binary(mnemonic, reg, rm)
            } else {
                Instruction::binary(mnemonic, rm, reg)
            }
        }
        Shape::ImmToRegOrMem => {
            if !(is_mov || mnemonic.is_arithmetic()) {
                return Err(invalid());
            }
            let sign_extend = (first >> 1) & 1 == 1;
            let width = Width::from_w(first);
            let modrm = ModRm::parse(reader.u8()?, offset)?;
            let dst = decode_rm(reader, modrm, width)?;
            // s=1 on the arithmetic group carries a single data byte even for word operands
            let wide = width == Width::Word && (is_mov || !sign_extend);
            let value = immediate(reader, wide)?;
            Instruction::binary(mnemonic, dst, Operand::Immediate { value, width, explicit: true })
        }
        Shape::ImmToReg => {
            if !is_mov {
                return Err(invalid());
            }
            let width = Width::from_w(first >> 3);
            let reg = Register::from_code(first, width);
            let value = immediate(reader, width == Width::Word)?;
            Instruction::binary(
                mnemonic,
                Operand::Register(reg),
                Operand::Immediate { value, width, explicit: false },
            )
        }
        Shape::MemToAcc | Shape::AccToMem => {
            if !is_mov {
                return Err(invalid());
            }
            let acc = Operand::Register(Register::accumulator(Width::from_w(first)));
            let addr = Operand::Direct(reader.u16()?);
            if shape == Shape::MemToAcc {
                Instruction::binary(mnemonic, acc, addr)
            } else {
                Instruction::binary(mnemonic, addr, acc)
            }
        }
        Shape::ImmToAcc => {
            if !mnemonic.is_arithmetic() {
                return Err(invalid());
            }
            let width = Width::from_w(first);
            let value = immediate(reader, width == Width::Word)?;
            Instruction::binary(
                mnemonic,
                Operand::Register(Register::accumulator(width)),
                Operand::Immediate { value, width, explicit: false },
            )
        }
        Shape::RelativeJump => {
            if !mnemonic.is_branch() {
                return Err(invalid());
            }
            Instruction::unary(mnemonic, Operand::Relative(reader.u8()? as i8))
        }
    };

    Ok(insn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use crate::decoder::classify::classify;

    fn decode(bytes: &[u8]) -> Result<(String, usize), DecodeError> {
        let opcode = classify(bytes, 0)?;
        let mut reader = ByteReader::new(bytes, 0);
        let insn = decode_operands(opcode, &mut reader)?;
        Ok((insn.to_string(), reader.consumed()))
    }

    #[rstest]
    #[case(&[0x8b, 0xc8], "mov cx, ax", 2)]
    #[case(&[0x89, 0xd9], "mov cx, bx", 2)]
    #[case(&[0x88, 0xe5], "mov ch, ah", 2)]
    #[case(&[0x8a, 0x00], "mov al, [bx + si]", 2)]
    #[case(&[0x8b, 0x1b], "mov bx, [bp + di]", 2)]
    #[case(&[0x8b, 0x56, 0x00], "mov dx, [bp]", 3)]
    #[case(&[0x8a, 0x60, 0x04], "mov ah, [bx + si + 4]", 3)]
    #[case(&[0x8a, 0x80, 0x87, 0x13], "mov al, [bx + si + 4999]", 4)]
    #[case(&[0x89, 0x09], "mov [bx + di], cx", 2)]
    #[case(&[0x88, 0x6e, 0x00], "mov [bp], ch", 3)]
    #[case(&[0x8b, 0x41, 0xdb], "mov ax, [bx + di - 37]", 3)]
    #[case(&[0x89, 0x8c, 0xd4, 0xfe], "mov [si - 300], cx", 4)]
    #[case(&[0x8b, 0x2e, 0x05, 0x00], "mov bp, [5]", 4)]
    #[case(&[0x8b, 0x1e, 0x82, 0x0d], "mov bx, [3458]", 4)]
    fn test_reg_or_mem_to_reg(#[case] bytes: &[u8], #[case] text: &str, #[case] size: usize) {
        assert_eq!(decode(bytes).unwrap(), (text.to_string(), size));
    }

    #[rstest]
    #[case(&[0xb1, 0x0c], "mov cl, 12", 2)]
    #[case(&[0xb5, 0xf4], "mov ch, 244", 2)]
    #[case(&[0xb8, 0x05, 0x00], "mov ax, 5", 3)]
    #[case(&[0xb9, 0x0c, 0x00], "mov cx, 12", 3)]
    #[case(&[0xba, 0x6c, 0x0f], "mov dx, 3948", 3)]
    #[case(&[0xc6, 0x03, 0x07], "mov byte [bp + di], 7", 3)]
    #[case(&[0xc7, 0x85, 0x85, 0x03, 0x5b, 0x01], "mov word [di + 901], 347", 6)]
    #[case(&[0xa1, 0xfb, 0x09], "mov ax, [2555]", 3)]
    #[case(&[0xa0, 0x10, 0x00], "mov al, [16]", 3)]
    #[case(&[0xa3, 0xfa, 0x09], "mov [2554], ax", 3)]
    #[case(&[0xa2, 0x0f, 0x00], "mov [15], al", 3)]
    fn test_mov_immediate_and_accumulator(
        #[case] bytes: &[u8],
        #[case] text: &str,
        #[case] size: usize,
    ) {
        assert_eq!(decode(bytes).unwrap(), (text.to_string(), size));
    }

    #[rstest]
    #[case(&[0x80, 0x00, 0x05], "add byte [bx + si], 5", 3)]
    #[case(&[0x83, 0xc6, 0x02], "add word si, 2", 3)]
    #[case(&[0x83, 0xc5, 0x02], "add word bp, 2", 3)]
    #[case(&[0x83, 0xc1, 0x08], "add word cx, 8", 3)]
    #[case(&[0x81, 0xc6, 0xe8, 0x03], "add word si, 1000", 4)]
    #[case(&[0x80, 0x2f, 0x22], "sub byte [bx], 34", 3)]
    #[case(&[0x83, 0x29, 0x1d], "sub word [bx + di], 29", 3)]
    #[case(&[0x83, 0x3e, 0xe2, 0x12, 0x1d], "cmp word [4834], 29", 5)]
    #[case(&[0x81, 0x3e, 0xe2, 0x12, 0x1d, 0x00], "cmp word [4834], 29", 6)]
    #[case(&[0x05, 0xe8, 0x03], "add ax, 1000", 3)]
    #[case(&[0x04, 0xe2], "add al, 226", 2)]
    #[case(&[0x2c, 0x09], "sub al, 9", 2)]
    #[case(&[0x3d, 0xe8, 0x03], "cmp ax, 1000", 3)]
    #[case(&[0x03, 0x18], "add bx, [bx + si]", 2)]
    #[case(&[0x01, 0x18], "add [bx + si], bx", 2)]
    #[case(&[0x2b, 0x5e, 0x00], "sub bx, [bp]", 3)]
    #[case(&[0x29, 0xd8], "sub ax, bx", 2)]
    #[case(&[0x38, 0xc4], "cmp ah, al", 2)]
    #[case(&[0x39, 0xd8], "cmp ax, bx", 2)]
    fn test_arithmetic(#[case] bytes: &[u8], #[case] text: &str, #[case] size: usize) {
        assert_eq!(decode(bytes).unwrap(), (text.to_string(), size));
    }

    #[rstest]
    #[case(&[0x74, 0x02], "je 2")]
    #[case(&[0x74, 0xfe], "je -2")]
    #[case(&[0x75, 0x02], "jne 2")]
    #[case(&[0x7c, 0xfc], "jl -4")]
    #[case(&[0x7f, 0x80], "jg -128")]
    #[case(&[0x73, 0x7f], "jnb 127")]
    #[case(&[0xe2, 0xf6], "loop -10")]
    #[case(&[0xe1, 0x00], "loopz 0")]
    #[case(&[0xe3, 0xfa], "jcxz -6")]
    fn test_relative_jump(#[case] bytes: &[u8], #[case] text: &str) {
        assert_eq!(decode(bytes).unwrap(), (text.to_string(), 2));
    }

    // s=1 w=1 reads a single data byte under a word label; mov ignores s
    #[rstest]
    #[case(&[0x83, 0x07, 0xff, 0x99], "add word [bx], 255", 3)]
    #[case(&[0x83, 0xc6, 0x02, 0x99], "add word si, 2", 3)]
    #[case(&[0x83, 0xee, 0x02, 0x99], "sub word si, 2", 3)]
    #[case(&[0x80, 0xc0, 0x05, 0x99], "add byte al, 5", 3)]
    #[case(&[0x80, 0xfc, 0x05, 0x99], "cmp byte ah, 5", 3)]
    #[case(&[0xc7, 0x07, 0xff, 0x00], "mov word [bx], 255", 4)]
    #[case(&[0xc7, 0xc1, 0x05, 0x00], "mov word cx, 5", 4)]
    #[case(&[0xc6, 0xc3, 0x05, 0x99], "mov byte bl, 5", 3)]
    fn test_immediate_to_register_or_memory_is_labeled(
        #[case] bytes: &[u8],
        #[case] text: &str,
        #[case] size: usize,
    ) {
        assert_eq!(decode(bytes).unwrap(), (text.to_string(), size));
    }

    #[test]
    fn test_displacement_round_trip_8bit() {
        for raw in 0..=u8::MAX {
            let (text, _) = decode(&[0x8b, 0x47, raw]).unwrap();
            let expr = text
                .strip_prefix("mov ax, [bx")
                .and_then(|s| s.strip_suffix(']'))
                .unwrap();
            let value: i32 = if expr.is_empty() {
                0
            } else if let Some(n) = expr.strip_prefix(" + ") {
                n.parse().unwrap()
            } else {
                -expr.strip_prefix(" - ").unwrap().parse::<i32>().unwrap()
            };
            assert_eq!(value, i32::from(raw as i8), "raw {raw:#04x} rendered as {text}");
        }
    }

    #[test]
    fn test_displacement_round_trip_16bit() {
        for raw in (0..=u16::MAX).step_by(257).chain([0x7fff, 0x8000, 0xffff]) {
            let [lo, hi] = raw.to_le_bytes();
            let (text, size) = decode(&[0x8b, 0x87, lo, hi]).unwrap();
            assert_eq!(size, 4);
            let expr = text
                .strip_prefix("mov ax, [bx")
                .and_then(|s| s.strip_suffix(']'))
                .unwrap();
            let value: i32 = if expr.is_empty() {
                0
            } else if let Some(n) = expr.strip_prefix(" + ") {
                n.parse().unwrap()
            } else {
                -expr.strip_prefix(" - ").unwrap().parse::<i32>().unwrap()
            };
            assert_eq!(value, i32::from(raw as i16), "raw {raw:#06x} rendered as {text}");
        }
    }

    #[rstest]
    #[case(&[0x8b], 2)]
    #[case(&[0x8b, 0x47], 3)]
    #[case(&[0x8b, 0x87, 0x01], 4)]
    #[case(&[0x8b, 0x06, 0x01], 4)]
    #[case(&[0xb8, 0x05], 3)]
    #[case(&[0xb0], 2)]
    #[case(&[0xc7, 0x07, 0x01], 4)]
    #[case(&[0x83, 0x07], 3)]
    #[case(&[0xa1, 0x00], 3)]
    #[case(&[0x05, 0x01], 3)]
    #[case(&[0x74], 2)]
    fn test_truncated_fields(#[case] bytes: &[u8], #[case] needed: usize) {
        let err = decode(bytes).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedInput { offset: 0, needed, available: bytes.len() }
        );
    }

    #[test]
    fn test_invalid_operand_encoding() {
        let mut reader = ByteReader::new(&[0xa1, 0x00, 0x00], 0);
        let opcode = Opcode { mnemonic: Mnemonic::Add, shape: Shape::MemToAcc };
        let err = decode_operands(opcode, &mut reader).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidOperandEncoding { offset: 0, .. }));

        let mut reader = ByteReader::new(&[0x74, 0x02], 0);
        let opcode = Opcode { mnemonic: Mnemonic::Mov, shape: Shape::RelativeJump };
        assert!(decode_operands(opcode, &mut reader).is_err());
    }

    #[test]
    fn test_invalid_addressing_mode() {
        assert_eq!(
            AddressingMode::from_bits(0b100, 7),
            Err(DecodeError::InvalidAddressingMode { offset: 7, mode: 0b100 })
        );
        assert_eq!(AddressingMode::from_bits(0b11, 0), Ok(AddressingMode::Register));
    }
}
