// This module gathers the backend-independent half of bcir: the opcode table and PC stepper
// that both passes share, transient instruction decoding with validated register operands, the
// bytecode loader, the arena-based translation session that owns the loaded buffer and records
// statistics, the control-flow prepass that discovers block and function boundaries, a small
// disassembler used for tracing, and the error types. Nothing here touches LLVM except the error
// enum, which wraps inkwell builder failures so the whole crate shares one Result type.

//! Core bytecode infrastructure.
//!
//! # Key Components
//!
//! ## Opcode Table (`opcode`)
//! - One `const` table of opcode records (kind, length, counter slot)
//! - `step`, the PC stepper shared by both passes
//!
//! ## Control-Flow Prepass (`cfg`)
//! - Branch targets keyed by jump PC, block targets and call targets keyed by PC
//! - Boundary checks for every target
//!
//! ## Session (`session`)
//! - Arena-owned bytecode buffer
//! - Translation statistics

pub mod cfg;
pub mod disasm;
pub mod error;
pub mod instruction;
pub mod loader;
pub mod opcode;
pub mod session;

pub use cfg::{BranchTargets, ControlFlowScan};

pub use error::{DecodeError, DecodeResult, TranslateError, TranslateResult};

pub use instruction::{Instruction, Reg};

pub use opcode::{ArithOp, InstrKind, JumpKind, Opcode, OpcodeInfo, Source, Tact, OPCODE_TABLE, REG_COUNT};

pub use session::{SessionStats, TranslationSession};
