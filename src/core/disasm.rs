//! Textual rendering of bytecode instructions.
//!
//! Used for trace logging in the translator and for the `--disasm` listing.

use super::cfg::ControlFlowScan;
use super::error::DecodeResult;
use super::instruction::Instruction;
use super::opcode::{self, InstrKind, Source};
use std::fmt::Write;

/// Render one instruction, e.g. `0007: JE +7 -> 0014`.
pub fn format_instruction(inst: &Instruction<'_>, code_len: usize) -> String {
    let mut out = format!("{:04}: {}", inst.pc, inst.info.mnemonic);
    let reg = |n: usize| match inst.reg(n) {
        Ok(r) => r.to_string(),
        Err(_) => format!("r{}?", inst.bytes()[1 + n]),
    };

    let operands = match inst.info.kind {
        InstrKind::Arith { source: Source::One, .. } => reg(0),
        InstrKind::Arith { source, .. } | InstrKind::Move { source } => match source {
            Source::Register => format!("{}, {}", reg(0), reg(1)),
            _ => format!("{}, #{}", reg(0), inst.imm(1)),
        },
        InstrKind::Load => format!("{}, [{}]", reg(0), reg(1)),
        InstrKind::Store => format!("[{}], {}", reg(1), reg(0)),
        InstrKind::Compare { source } => {
            let rhs = match source {
                Source::Register => reg(1),
                _ => format!("#{}", inst.imm(1)),
            };
            let selector = inst.bytes()[3];
            let predicate = opcode::lookup(selector)
                .map(|info| info.mnemonic.to_string())
                .unwrap_or_else(|| format!("0x{:02x}?", selector));
            format!("{}, {}, {}", reg(0), rhs, predicate)
        }
        InstrKind::Jump(_) | InstrKind::Call => match inst.target(code_len) {
            Ok(target) => format!("{:+} -> {:04}", inst.offset(), target),
            Err(_) => format!("{:+} -> ?", inst.offset()),
        },
        InstrKind::Write | InstrKind::Read | InstrKind::Pop => reg(0),
        InstrKind::Push { source: Source::Register } => reg(0),
        InstrKind::Push { .. } => format!("#{}", inst.imm(0)),
        InstrKind::Ret | InstrKind::Exit => String::new(),
    };

    if !operands.is_empty() {
        let _ = write!(out, " {}", operands);
    }
    out
}

/// Produce a full listing with function and block markers from the prepass.
pub fn disassemble(code: &[u8]) -> DecodeResult<String> {
    let scan = ControlFlowScan::scan(code)?;
    let mut out = String::new();

    let mut pc = 0;
    while pc < code.len() {
        if scan.is_function_entry(pc) {
            let _ = writeln!(out, "\nfn_{}:", pc);
        } else if scan.is_block_target(pc) {
            let _ = writeln!(out, "pc_{}:", pc);
        }

        let inst = Instruction::decode(code, pc)?;
        let _ = writeln!(out, "  {}", format_instruction(&inst, code.len()));
        pc = inst.next_pc();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::opcode::Opcode;

    #[test]
    fn test_format_operands() {
        let code = [
            Opcode::Mov as u8, 0, 0xFB,
            Opcode::Cmp as u8, 0, 3, Opcode::Jge as u8,
            Opcode::Jge as u8, 0xFE,
            Opcode::Store as u8, 1, 2,
        ];
        let render = |pc| format_instruction(&Instruction::decode(&code, pc).unwrap(), code.len());

        assert_eq!(render(0), "0000: MOV r0, #-5");
        assert_eq!(render(3), "0003: CMP r0, #3, JGE");
        assert_eq!(render(7), "0007: JGE -2 -> 0005");
        assert_eq!(render(9), "0009: STORE [r2], r1");
    }

    #[test]
    fn test_listing_marks_blocks_and_functions() {
        let code = [Opcode::Call as u8, 3, Opcode::Exit as u8, Opcode::Ret as u8];
        let listing = disassemble(&code).unwrap();
        assert!(listing.contains("0000: CALL +3 -> 0003"));
        assert!(listing.contains("fn_3:"));
        assert!(listing.contains("0003: RET"));
    }
}
