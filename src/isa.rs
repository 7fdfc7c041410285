//! Instruction model for the supported 8086 subset: mnemonics, registers,
//! effective addresses, operands and the rendered instruction.

use std::fmt;

/// Operand width selected by the `w` bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    /// Width for a raw `w` bit (0 = byte, anything else = word).
    pub fn from_w(w: u8) -> Self {
        if w & 1 == 0 {
            Width::Byte
        } else {
            Width::Word
        }
    }

    /// NASM size keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Width::Byte => "byte",
            Width::Word => "word",
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// General purpose registers, both halves of the 8-bit set and the 16-bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Al,
    Cl,
    Dl,
    Bl,
    Ah,
    Ch,
    Dh,
    Bh,
    Ax,
    Cx,
    Dx,
    Bx,
    Sp,
    Bp,
    Si,
    Di,
}

const BYTE_REGISTERS: [Register; 8] = [
    Register::Al,
    Register::Cl,
    Register::Dl,
    Register::Bl,
    Register::Ah,
    Register::Ch,
    Register::Dh,
    Register::Bh,
];

const WORD_REGISTERS: [Register; 8] = [
    Register::Ax,
    Register::Cx,
    Register::Dx,
    Register::Bx,
    Register::Sp,
    Register::Bp,
    Register::Si,
    Register::Di,
];

impl Register {
    /// Look up the register named by a 3-bit `reg`/`rm` code at the given width.
    pub fn from_code(code: u8, width: Width) -> Self {
        let idx = (code & 0b111) as usize;
        match width {
            Width::Byte => BYTE_REGISTERS[idx],
            Width::Word => WORD_REGISTERS[idx],
        }
    }

    /// The accumulator (`al` or `ax`).
    pub fn accumulator(width: Width) -> Self {
        Self::from_code(0, width)
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::Al => "al",
            Register::Cl => "cl",
            Register::Dl => "dl",
            Register::Bl => "bl",
            Register::Ah => "ah",
            Register::Ch => "ch",
            Register::Dh => "dh",
            Register::Bh => "bh",
            Register::Ax => "ax",
            Register::Cx => "cx",
            Register::Dx => "dx",
            Register::Bx => "bx",
            Register::Sp => "sp",
            Register::Bp => "bp",
            Register::Si => "si",
            Register::Di => "di",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base expression selected by the `rm` field of a memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveAddress {
    BxSi,
    BxDi,
    BpSi,
    BpDi,
    Si,
    Di,
    Bp,
    Bx,
}

const EFFECTIVE_ADDRESSES: [EffectiveAddress; 8] = [
    EffectiveAddress::BxSi,
    EffectiveAddress::BxDi,
    EffectiveAddress::BpSi,
    EffectiveAddress::BpDi,
    EffectiveAddress::Si,
    EffectiveAddress::Di,
    EffectiveAddress::Bp,
    EffectiveAddress::Bx,
];

impl EffectiveAddress {
    pub fn from_rm(rm: u8) -> Self {
        EFFECTIVE_ADDRESSES[(rm & 0b111) as usize]
    }

    pub fn expression(self) -> &'static str {
        match self {
            EffectiveAddress::BxSi => "bx + si",
            EffectiveAddress::BxDi => "bx + di",
            EffectiveAddress::BpSi => "bp + si",
            EffectiveAddress::BpDi => "bp + di",
            EffectiveAddress::Si => "si",
            EffectiveAddress::Di => "di",
            EffectiveAddress::Bp => "bp",
            EffectiveAddress::Bx => "bx",
        }
    }
}

impl fmt::Display for EffectiveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expression())
    }
}

/// Every mnemonic the decoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Mov,
    Add,
    Sub,
    Cmp,
    Jo,
    Jno,
    Jb,
    Jnb,
    Je,
    Jne,
    Jbe,
    Ja,
    Js,
    Jns,
    Jp,
    Jnp,
    Jl,
    Jnl,
    Jle,
    Jg,
    Loopnz,
    Loopz,
    Loop,
    Jcxz,
}

impl Mnemonic {
    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Mov => "mov",
            Mnemonic::Add => "add",
            Mnemonic::Sub => "sub",
            Mnemonic::Cmp => "cmp",
            Mnemonic::Jo => "jo",
            Mnemonic::Jno => "jno",
            Mnemonic::Jb => "jb",
            Mnemonic::Jnb => "jnb",
            Mnemonic::Je => "je",
            Mnemonic::Jne => "jne",
            Mnemonic::Jbe => "jbe",
            Mnemonic::Ja => "ja",
            Mnemonic::Js => "js",
            Mnemonic::Jns => "jns",
            Mnemonic::Jp => "jp",
            Mnemonic::Jnp => "jnp",
            Mnemonic::Jl => "jl",
            Mnemonic::Jnl => "jnl",
            Mnemonic::Jle => "jle",
            Mnemonic::Jg => "jg",
            Mnemonic::Loopnz => "loopnz",
            Mnemonic::Loopz => "loopz",
            Mnemonic::Loop => "loop",
            Mnemonic::Jcxz => "jcxz",
        }
    }

    /// ADD, SUB or CMP.
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Mnemonic::Add | Mnemonic::Sub | Mnemonic::Cmp)
    }

    /// Short conditional jumps and the loop family.
    pub fn is_branch(self) -> bool {
        !matches!(self, Mnemonic::Mov | Mnemonic::Add | Mnemonic::Sub | Mnemonic::Cmp)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand layout of an instruction encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// `opcode d w | mod reg rm | disp...`
    RegOrMemToReg,
    /// `opcode s w | mod op rm | disp... | data | data if wide`
    ImmToRegOrMem,
    /// `1011 w reg | data | data if w`
    ImmToReg,
    /// `1010000 w | addr-lo | addr-hi`
    MemToAcc,
    /// `1010001 w | addr-lo | addr-hi`
    AccToMem,
    /// `opcode w | data | data if w`
    ImmToAcc,
    /// `opcode | ip-inc8`
    RelativeJump,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::RegOrMemToReg => "register/memory to/from register",
            Shape::ImmToRegOrMem => "immediate to register/memory",
            Shape::ImmToReg => "immediate to register",
            Shape::MemToAcc => "memory to accumulator",
            Shape::AccToMem => "accumulator to memory",
            Shape::ImmToAcc => "immediate to accumulator",
            Shape::RelativeJump => "relative jump",
        };
        f.write_str(name)
    }
}

/// One decoded operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    /// `[base]`, `[base + d]` or `[base - d]`.
    Memory {
        base: EffectiveAddress,
        displacement: i16,
    },
    /// `[addr]`
    Direct(u16),
    /// `explicit` asks the renderer to label the destination with `width`.
    Immediate {
        value: u16,
        width: Width,
        explicit: bool,
    },
    /// Signed `ip-inc8`, rendered as is.
    Relative(i8),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operand::Register(reg) => write!(f, "{}", reg),
            Operand::Memory { base, displacement } => {
                let disp = i32::from(displacement);
                if disp < 0 {
                    write!(f, "[{} - {}]", base, -disp)
                } else if disp > 0 {
                    write!(f, "[{} + {}]", base, disp)
                } else {
                    write!(f, "[{}]", base)
                }
            }
            Operand::Direct(addr) => write!(f, "[{}]", addr),
            Operand::Immediate { value, .. } => write!(f, "{}", value),
            Operand::Relative(disp) => write!(f, "{}", disp),
        }
    }
}

/// A decoded instruction: mnemonic plus destination-first operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operands: [Option<Operand>; 2],
}

impl Instruction {
    pub fn unary(mnemonic: Mnemonic, operand: Operand) -> Self {
        Self { mnemonic, operands: [Some(operand), None] }
    }

    pub fn binary(mnemonic: Mnemonic, dst: Operand, src: Operand) -> Self {
        Self { mnemonic, operands: [Some(dst), Some(src)] }
    }

    /// Operands in rendering order.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.operands.iter().flatten()
    }

    /// Size keyword placed before the destination, if any.
    ///
    /// Set by an explicitly sized immediate (the immediate-to-register/memory
    /// form), whatever the destination.
    pub fn size_label(&self) -> Option<Width> {
        self.operands().find_map(|op| match *op {
            Operand::Immediate { width, explicit: true, .. } => Some(width),
            _ => None,
        })
    }

    /// Operand text without the mnemonic, e.g. `byte [bx + si], 5`.
    pub fn operand_text(&self) -> String {
        let mut out = String::new();
        if let Some(width) = self.size_label() {
            out.push_str(width.keyword());
            out.push(' ');
        }
        let rendered: Vec<String> = self.operands().map(|op| op.to_string()).collect();
        out.push_str(&rendered.join(", "));
        out
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands[0].is_none() {
            return f.write_str(self.mnemonic.name());
        }
        write!(f, "{} {}", self.mnemonic, self.operand_text())
    }
}
