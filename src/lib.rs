//! bcir - Bytecode to LLVM IR translation.
//!
//! bcir compiles programs for a small register/stack machine with an
//! x86-flavored opcode space into an LLVM module. Translation runs in two
//! passes over the same buffer: a prepass discovers every jump and call
//! target, then the main pass emits IR into the blocks and functions the
//! prepass created.
//!
//! # Primary Usage
//!
//! ```ignore
//! use bcir::core::TranslationSession;
//! use bcir::llvm::{Translator, TranslateOptions};
//! use bumpalo::Bump;
//! use inkwell::context::Context;
//!
//! let arena = Bump::new();
//! let session = TranslationSession::load(&arena, "program.bc")?;
//!
//! let context = Context::create();
//! let module = Translator::new(&context, &session, TranslateOptions::default()).translate()?;
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Opcode table, decoding, prepass, session and errors
//! - [`llvm`] - Global layout, instrumentation and the translator

pub mod core;
pub mod llvm;

pub use core::{
    ControlFlowScan, DecodeError, Opcode, SessionStats, TranslateError, TranslateResult,
    TranslationSession,
};
pub use llvm::{translate, TranslateOptions, Translator};

/// Banner printed before the textual module; a comment in `.ll` syntax.
pub const IR_BANNER: &str = ";#[LLVM_IR]:";

/// Textual module preceded by [`IR_BANNER`].
pub fn render_ir(module: &inkwell::module::Module<'_>) -> String {
    format!("{}\n{}", IR_BANNER, module.print_to_string().to_string())
}
