// This module defines the error types for bcir using the thiserror crate. DecodeError covers
// everything the opcode table and the control-flow scan can reject: unknown opcode bytes,
// register operands outside the register file, compare instructions whose trailing byte is not
// a jump opcode, instructions cut off by the end of the buffer, and branch or call targets that
// land outside the program or in the middle of an instruction. Every variant carries the byte
// offset so a malformed program can be located with a hex dump. TranslateError is the error
// returned by a translation session: it wraps DecodeError, file I/O failures, inkwell builder
// failures and verifier output, and adds the few inconsistencies the main pass can observe
// (an operand stack underflow, a conditional jump with no preceding compare, and a jump or call
// that the prepass did not register).

//! Error types for bytecode translation.

use thiserror::Error;

/// Errors raised while decoding the bytecode buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown opcode 0x{value:02x} at offset {offset}")]
    UnknownOpcode { offset: usize, value: u8 },

    #[error("Invalid register r{value} at offset {offset}")]
    InvalidRegister { offset: usize, value: u8 },

    #[error("Invalid compare predicate 0x{value:02x} at offset {offset}")]
    InvalidPredicate { offset: usize, value: u8 },

    #[error("Truncated {mnemonic} at offset {offset}: needs {length} bytes, {available} left")]
    Truncated {
        offset: usize,
        mnemonic: &'static str,
        length: usize,
        available: usize,
    },

    #[error("Target {target} of instruction at offset {offset} is outside the program")]
    JumpOutOfRange { offset: usize, target: i64 },

    #[error("Target {target} of instruction at offset {offset} is not an instruction boundary")]
    MisalignedTarget { offset: usize, target: usize },
}

/// Main error type for a translation session.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Failed to read bytecode: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("LLVM builder error: {0}")]
    Builder(#[from] inkwell::builder::BuilderError),

    #[error("Operand stack underflow at offset {offset}")]
    StackUnderflow { offset: usize },

    #[error("Conditional jump at offset {offset} has no preceding compare")]
    MissingComparison { offset: usize },

    #[error("Jump at offset {offset} was not registered by the prepass")]
    MissingBranchTargets { offset: usize },

    #[error("Call target {target} at offset {offset} was not registered by the prepass")]
    MissingFunction { offset: usize, target: usize },

    #[error("Module verification failed: {reason}")]
    Verification { reason: String },
}

impl TranslateError {
    /// Byte offset the error refers to, when it has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            TranslateError::Decode(err) => Some(err.offset()),
            TranslateError::StackUnderflow { offset }
            | TranslateError::MissingComparison { offset }
            | TranslateError::MissingBranchTargets { offset }
            | TranslateError::MissingFunction { offset, .. } => Some(*offset),
            TranslateError::Io(_) | TranslateError::Builder(_) | TranslateError::Verification { .. } => None,
        }
    }
}

impl DecodeError {
    /// Offset of the instruction that failed to decode.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::UnknownOpcode { offset, .. }
            | DecodeError::InvalidRegister { offset, .. }
            | DecodeError::InvalidPredicate { offset, .. }
            | DecodeError::Truncated { offset, .. }
            | DecodeError::JumpOutOfRange { offset, .. }
            | DecodeError::MisalignedTarget { offset, .. } => *offset,
        }
    }
}

/// Result type alias for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type alias for translation.
pub type TranslateResult<T> = Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_reports_offset_and_value() {
        let err = DecodeError::UnknownOpcode { offset: 0, value: 0 };
        assert_eq!(err.to_string(), "Unknown opcode 0x00 at offset 0");
        assert_eq!(err.offset(), 0);
    }

    #[test]
    fn test_translate_error_wraps_decode_error() {
        let err: TranslateError = DecodeError::InvalidRegister { offset: 7, value: 9 }.into();
        assert_eq!(err.offset(), Some(7));
        assert_eq!(err.to_string(), "Invalid register r9 at offset 7");
    }
}
