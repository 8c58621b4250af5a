//! Transient view of one decoded instruction.
//!
//! Instructions are never materialized as a stream; an [`Instruction`] borrows
//! the operand bytes at the current PC and validates them on access.

use super::error::{DecodeError, DecodeResult};
use super::opcode::{self, JumpKind, OpcodeInfo, REG_COUNT};
use std::fmt;

/// Register index validated against the register file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(u8);

impl Reg {
    pub fn new(index: u8) -> Option<Reg> {
        ((index as usize) < REG_COUNT).then_some(Reg(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// An instruction decoded at a given PC.
#[derive(Debug, Clone, Copy)]
pub struct Instruction<'a> {
    pub pc: usize,
    pub info: &'static OpcodeInfo,
    bytes: &'a [u8],
}

impl<'a> Instruction<'a> {
    /// Decode the instruction starting at `pc`.
    pub fn decode(code: &'a [u8], pc: usize) -> DecodeResult<Self> {
        let info = opcode::decode(code, pc)?;
        Ok(Self {
            pc,
            info,
            bytes: &code[pc..pc + info.length],
        })
    }

    /// PC of the next instruction in the linear stream.
    pub fn next_pc(&self) -> usize {
        self.pc + self.info.length
    }

    fn operand(&self, n: usize) -> u8 {
        self.bytes[1 + n]
    }

    /// Operand `n` interpreted as a register index.
    pub fn reg(&self, n: usize) -> DecodeResult<Reg> {
        let value = self.operand(n);
        Reg::new(value).ok_or(DecodeError::InvalidRegister {
            offset: self.pc,
            value,
        })
    }

    /// Operand `n` interpreted as a signed 8-bit immediate.
    pub fn imm(&self, n: usize) -> i8 {
        self.operand(n) as i8
    }

    /// Signed relative offset of a jump or call.
    pub fn offset(&self) -> i8 {
        self.imm(0)
    }

    /// Absolute target of a jump or call, relative to this instruction's PC.
    ///
    /// `code_len` is accepted as a target so that a jump may land on the end
    /// of the program.
    pub fn target(&self, code_len: usize) -> DecodeResult<usize> {
        let target = self.pc as i64 + self.offset() as i64;
        if target < 0 || target > code_len as i64 {
            return Err(DecodeError::JumpOutOfRange {
                offset: self.pc,
                target,
            });
        }
        Ok(target as usize)
    }

    /// Trailing predicate selector of a compare instruction.
    pub fn predicate(&self) -> DecodeResult<JumpKind> {
        let value = self.operand(2);
        JumpKind::from_selector(value).ok_or(DecodeError::InvalidPredicate {
            offset: self.pc,
            value,
        })
    }

    /// Raw bytes of the instruction, opcode included.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::opcode::Opcode;

    #[test]
    fn test_register_operand_validation() {
        let code = [Opcode::MovR as u8, 1, 4];
        let inst = Instruction::decode(&code, 0).unwrap();
        assert_eq!(inst.reg(0).unwrap(), Reg::new(1).unwrap());
        assert_eq!(
            inst.reg(1),
            Err(DecodeError::InvalidRegister { offset: 0, value: 4 })
        );
    }

    #[test]
    fn test_negative_immediate() {
        let code = [Opcode::Add as u8, 0, 0xFE];
        let inst = Instruction::decode(&code, 0).unwrap();
        assert_eq!(inst.imm(1), -2);
    }

    #[test]
    fn test_target_is_relative_to_opcode() {
        let code = [Opcode::Ret as u8, Opcode::Ret as u8, Opcode::Jmp as u8, 0xFE];
        let inst = Instruction::decode(&code, 2).unwrap();
        assert_eq!(inst.target(code.len()), Ok(0));
        assert_eq!(inst.next_pc(), 4);
    }

    #[test]
    fn test_target_out_of_range() {
        let code = [Opcode::Jmp as u8, 0x80];
        let inst = Instruction::decode(&code, 0).unwrap();
        assert_eq!(
            inst.target(code.len()),
            Err(DecodeError::JumpOutOfRange { offset: 0, target: -128 })
        );
    }

    #[test]
    fn test_invalid_predicate() {
        let code = [Opcode::Cmp as u8, 0, 0, Opcode::Add as u8];
        let inst = Instruction::decode(&code, 0).unwrap();
        assert_eq!(
            inst.predicate(),
            Err(DecodeError::InvalidPredicate { offset: 0, value: 0x01 })
        );
    }
}
