// This module is the single source of truth for the bytecode instruction set. OPCODE_TABLE maps
// each opcode byte to its mnemonic, its instruction kind (which drives dispatch in the
// translator), its encoded length in bytes, and the benchmark counter it increments. Both the
// control-flow prepass and the main translation pass walk the buffer with `step`, which reads
// the length from this table, so the two passes cannot disagree about instruction boundaries.
// The compare instructions reuse jump opcodes as their trailing predicate selector, which is why
// JumpKind doubles as the comparison predicate.

//! Opcode table and PC stepper.

use super::error::{DecodeError, DecodeResult};
use std::fmt;

/// Number of machine registers.
pub const REG_COUNT: usize = 4;

/// Opcode byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Add = 0x01,
    AddR = 0x02,
    Sub = 0x03,
    SubR = 0x04,
    Imul = 0x05,
    ImulR = 0x06,
    Idiv = 0x07,
    IdivR = 0x08,
    Inc = 0x09,
    Dec = 0x0A,
    Mov = 0x10,
    MovR = 0x11,
    Load = 0x12,
    Store = 0x13,
    Cmp = 0x20,
    CmpR = 0x21,
    Jmp = 0x30,
    Jg = 0x31,
    Jge = 0x32,
    Jl = 0x33,
    Jle = 0x34,
    Je = 0x35,
    Jne = 0x36,
    Write = 0x40,
    Read = 0x41,
    Push = 0x50,
    PushR = 0x51,
    PopR = 0x52,
    Call = 0x60,
    Ret = 0x61,
    Exit = 0x62,
}

/// Arithmetic operation performed by the arithmetic family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Where the second operand of a two-operand instruction comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Register index operand byte.
    Register,
    /// Signed 8-bit immediate operand byte.
    Immediate,
    /// No operand byte; the value is the constant 1.
    One,
}

/// Jump flavour, also used as the predicate selector of a compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpKind {
    Always,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Equal,
    NotEqual,
}

impl JumpKind {
    /// Whether the jump consumes a pending comparison.
    pub fn is_conditional(self) -> bool {
        self != JumpKind::Always
    }

    /// Decode the trailing selector byte of a compare instruction.
    pub fn from_selector(byte: u8) -> Option<JumpKind> {
        match lookup(byte)?.kind {
            InstrKind::Jump(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Instruction category used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrKind {
    Arith { op: ArithOp, source: Source },
    Move { source: Source },
    Load,
    Store,
    Compare { source: Source },
    Jump(JumpKind),
    Write,
    Read,
    Push { source: Source },
    Pop,
    Call,
    Ret,
    Exit,
}

/// Benchmark counter slots, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tact {
    Add,
    Sub,
    Imul,
    Idiv,
    Inc,
    Dec,
    Mov,
    Load,
    Store,
    Cmp,
    Jmp,
    Jg,
    Jge,
    Jl,
    Jle,
    Je,
    Jne,
    Write,
    Read,
    Push,
    Pop,
    Call,
    Ret,
    Exit,
}

impl Tact {
    pub const ALL: [Tact; 24] = [
        Tact::Add,
        Tact::Sub,
        Tact::Imul,
        Tact::Idiv,
        Tact::Inc,
        Tact::Dec,
        Tact::Mov,
        Tact::Load,
        Tact::Store,
        Tact::Cmp,
        Tact::Jmp,
        Tact::Jg,
        Tact::Jge,
        Tact::Jl,
        Tact::Jle,
        Tact::Je,
        Tact::Jne,
        Tact::Write,
        Tact::Read,
        Tact::Push,
        Tact::Pop,
        Tact::Call,
        Tact::Ret,
        Tact::Exit,
    ];

    /// Slot holding the total number of executed jumps.
    pub const TOTAL_JUMPS_SLOT: usize = Self::ALL.len();

    /// Number of counter slots including the total-jumps slot.
    pub const SLOT_COUNT: usize = Self::ALL.len() + 1;

    /// Index into the counter array.
    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Tact::Add => "add",
            Tact::Sub => "sub",
            Tact::Imul => "imul",
            Tact::Idiv => "idiv",
            Tact::Inc => "inc",
            Tact::Dec => "dec",
            Tact::Mov => "mov",
            Tact::Load => "load",
            Tact::Store => "store",
            Tact::Cmp => "cmp",
            Tact::Jmp => "jmp",
            Tact::Jg => "jg",
            Tact::Jge => "jge",
            Tact::Jl => "jl",
            Tact::Jle => "jle",
            Tact::Je => "je",
            Tact::Jne => "jne",
            Tact::Write => "write",
            Tact::Read => "read",
            Tact::Push => "push",
            Tact::Pop => "pop",
            Tact::Call => "call",
            Tact::Ret => "ret",
            Tact::Exit => "exit",
        }
    }
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub opcode: Opcode,
    pub mnemonic: &'static str,
    pub kind: InstrKind,
    /// Encoded length including the opcode byte.
    pub length: usize,
    pub tact: Tact,
}

const fn entry(opcode: Opcode, mnemonic: &'static str, kind: InstrKind, length: usize, tact: Tact) -> OpcodeInfo {
    OpcodeInfo { opcode, mnemonic, kind, length, tact }
}

use InstrKind as K;
use Source as S;

pub const OPCODE_TABLE: [OpcodeInfo; 31] = [
    entry(Opcode::Add, "ADD", K::Arith { op: ArithOp::Add, source: S::Immediate }, 3, Tact::Add),
    entry(Opcode::AddR, "ADD_R", K::Arith { op: ArithOp::Add, source: S::Register }, 3, Tact::Add),
    entry(Opcode::Sub, "SUB", K::Arith { op: ArithOp::Sub, source: S::Immediate }, 3, Tact::Sub),
    entry(Opcode::SubR, "SUB_R", K::Arith { op: ArithOp::Sub, source: S::Register }, 3, Tact::Sub),
    entry(Opcode::Imul, "IMUL", K::Arith { op: ArithOp::Mul, source: S::Immediate }, 3, Tact::Imul),
    entry(Opcode::ImulR, "IMUL_R", K::Arith { op: ArithOp::Mul, source: S::Register }, 3, Tact::Imul),
    entry(Opcode::Idiv, "IDIV", K::Arith { op: ArithOp::Div, source: S::Immediate }, 3, Tact::Idiv),
    entry(Opcode::IdivR, "IDIV_R", K::Arith { op: ArithOp::Div, source: S::Register }, 3, Tact::Idiv),
    entry(Opcode::Inc, "INC", K::Arith { op: ArithOp::Add, source: S::One }, 2, Tact::Inc),
    entry(Opcode::Dec, "DEC", K::Arith { op: ArithOp::Sub, source: S::One }, 2, Tact::Dec),
    entry(Opcode::Mov, "MOV", K::Move { source: S::Immediate }, 3, Tact::Mov),
    entry(Opcode::MovR, "MOV_R", K::Move { source: S::Register }, 3, Tact::Mov),
    entry(Opcode::Load, "LOAD", K::Load, 3, Tact::Load),
    entry(Opcode::Store, "STORE", K::Store, 3, Tact::Store),
    entry(Opcode::Cmp, "CMP", K::Compare { source: S::Immediate }, 4, Tact::Cmp),
    entry(Opcode::CmpR, "CMP_R", K::Compare { source: S::Register }, 4, Tact::Cmp),
    entry(Opcode::Jmp, "JMP", K::Jump(JumpKind::Always), 2, Tact::Jmp),
    entry(Opcode::Jg, "JG", K::Jump(JumpKind::Greater), 2, Tact::Jg),
    entry(Opcode::Jge, "JGE", K::Jump(JumpKind::GreaterEqual), 2, Tact::Jge),
    entry(Opcode::Jl, "JL", K::Jump(JumpKind::Less), 2, Tact::Jl),
    entry(Opcode::Jle, "JLE", K::Jump(JumpKind::LessEqual), 2, Tact::Jle),
    entry(Opcode::Je, "JE", K::Jump(JumpKind::Equal), 2, Tact::Je),
    entry(Opcode::Jne, "JNE", K::Jump(JumpKind::NotEqual), 2, Tact::Jne),
    entry(Opcode::Write, "WRITE", K::Write, 2, Tact::Write),
    entry(Opcode::Read, "READ", K::Read, 2, Tact::Read),
    entry(Opcode::Push, "PUSH", K::Push { source: S::Immediate }, 2, Tact::Push),
    entry(Opcode::PushR, "PUSH_R", K::Push { source: S::Register }, 2, Tact::Push),
    entry(Opcode::PopR, "POP_R", K::Pop, 2, Tact::Pop),
    entry(Opcode::Call, "CALL", K::Call, 2, Tact::Call),
    entry(Opcode::Ret, "RET", K::Ret, 1, Tact::Ret),
    entry(Opcode::Exit, "EXIT", K::Exit, 1, Tact::Exit),
];

/// Look up an opcode byte in the table.
pub fn lookup(byte: u8) -> Option<&'static OpcodeInfo> {
    OPCODE_TABLE.iter().find(|info| info.opcode as u8 == byte)
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        lookup(byte).map(|info| info.opcode)
    }

    pub fn info(self) -> &'static OpcodeInfo {
        // Every variant has exactly one table row.
        OPCODE_TABLE
            .iter()
            .find(|info| info.opcode == self)
            .unwrap_or(&OPCODE_TABLE[0])
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().mnemonic)
    }
}

/// Decode the opcode at `pc`, checking that the whole instruction fits in the buffer.
pub fn decode(code: &[u8], pc: usize) -> DecodeResult<&'static OpcodeInfo> {
    let value = code[pc];
    let info = lookup(value).ok_or(DecodeError::UnknownOpcode { offset: pc, value })?;

    let available = code.len() - pc;
    if info.length > available {
        return Err(DecodeError::Truncated {
            offset: pc,
            mnemonic: info.mnemonic,
            length: info.length,
            available,
        });
    }

    Ok(info)
}

/// Number of bytes to advance past the instruction at `pc`.
pub fn step(code: &[u8], pc: usize) -> DecodeResult<usize> {
    decode(code, pc).map(|info| info.length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_unique_bytes() {
        for (i, a) in OPCODE_TABLE.iter().enumerate() {
            for b in &OPCODE_TABLE[i + 1..] {
                assert_ne!(a.opcode as u8, b.opcode as u8, "{} vs {}", a.mnemonic, b.mnemonic);
            }
        }
    }

    #[test]
    fn test_info_roundtrips_every_opcode() {
        for row in &OPCODE_TABLE {
            assert_eq!(row.opcode.info(), row);
            assert_eq!(Opcode::from_byte(row.opcode as u8), Some(row.opcode));
        }
    }

    #[test]
    fn test_lengths() {
        assert_eq!(Opcode::Add.info().length, 3);
        assert_eq!(Opcode::Inc.info().length, 2);
        assert_eq!(Opcode::Cmp.info().length, 4);
        assert_eq!(Opcode::Je.info().length, 2);
        assert_eq!(Opcode::Ret.info().length, 1);
        assert_eq!(Opcode::Exit.info().length, 1);
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(lookup(0x00), None);
        assert_eq!(
            step(&[0x00], 0),
            Err(DecodeError::UnknownOpcode { offset: 0, value: 0 })
        );
    }

    #[test]
    fn test_truncated_instruction() {
        let code = [Opcode::Mov as u8, 0];
        assert_eq!(
            step(&code, 0),
            Err(DecodeError::Truncated {
                offset: 0,
                mnemonic: "MOV",
                length: 3,
                available: 2,
            })
        );
    }

    #[test]
    fn test_predicate_selectors() {
        assert_eq!(JumpKind::from_selector(Opcode::Jge as u8), Some(JumpKind::GreaterEqual));
        assert_eq!(JumpKind::from_selector(Opcode::Jmp as u8), Some(JumpKind::Always));
        assert_eq!(JumpKind::from_selector(Opcode::Add as u8), None);
        assert_eq!(JumpKind::from_selector(0xFF), None);
    }

    #[test]
    fn test_tact_slots() {
        assert_eq!(Tact::Add.slot(), 0);
        assert_eq!(Tact::Exit.slot(), Tact::ALL.len() - 1);
        assert_eq!(Tact::SLOT_COUNT, Tact::TOTAL_JUMPS_SLOT + 1);
        for (i, tact) in Tact::ALL.iter().enumerate() {
            assert_eq!(tact.slot(), i);
        }
    }
}
