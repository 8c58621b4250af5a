//! LLVM code emission.
//!
//! This module owns everything that builds IR through inkwell: the global
//! state layout, the C runtime declarations, the benchmark instrumentation,
//! the materialized control-flow map, and the translator driving them.
//!
//! # Example
//! ```ignore
//! use bcir::llvm::{translate, TranslateOptions};
//! use inkwell::context::Context;
//!
//! let context = Context::create();
//! let module = translate(&context, &bytecode, TranslateOptions::default())?;
//! println!("{}", module.print_to_string().to_string());
//! ```

pub mod cfg;
pub mod instrument;
pub mod layout;
pub mod runtime;
pub mod translator;

pub use cfg::ControlFlowMap;
pub use instrument::{report_template, Instrumentation};
pub use layout::{GlobalArray, GlobalLayout, MEMORY_SLOTS};
pub use runtime::Runtime;
pub use translator::{int_predicate, translate, TranslateOptions, Translator};
