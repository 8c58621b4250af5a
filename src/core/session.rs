// This module provides arena-based translation session management using the bumpalo crate.
// TranslationSession owns the loaded bytecode buffer for the whole translation: the bytes are
// copied into the arena once and handed out as an immutable slice, so both passes read the same
// buffer and nothing can mutate it after load. The session also records statistics
// (instructions translated with a per-mnemonic breakdown, blocks and functions created, calls,
// jumps and comparisons emitted). SessionStats has a Display implementation used for the
// summary logged at the end of a translation.

//! Arena-based translation session management.

use super::error::TranslateResult;
use super::loader;
use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;
use std::path::Path;

/// Arena-based translation session.
///
/// All session data shares the arena lifetime; dropping the arena after the
/// session releases the bytecode buffer on every exit path.
pub struct TranslationSession<'arena> {
    /// The program being translated.
    bytecode: &'arena [u8],

    /// Session statistics.
    stats: RefCell<SessionStats>,
}

impl<'arena> TranslationSession<'arena> {
    /// Create a session over an in-memory program.
    pub fn new(arena: &'arena Bump, bytecode: &[u8]) -> Self {
        Self {
            bytecode: arena.alloc_slice_copy(bytecode),
            stats: RefCell::new(SessionStats::default()),
        }
    }

    /// Create a session by loading a bytecode file.
    pub fn load<P: AsRef<Path>>(arena: &'arena Bump, path: P) -> TranslateResult<Self> {
        let code = loader::read_bytecode(path)?;
        Ok(Self::new(arena, &code))
    }

    /// The immutable bytecode buffer.
    pub fn bytecode(&self) -> &'arena [u8] {
        self.bytecode
    }

    /// Record one translated instruction.
    pub fn record_instruction(&self, mnemonic: &'static str) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_translated += 1;
        *stats.instruction_counts.entry(mnemonic).or_insert(0) += 1;
    }

    pub fn record_block_created(&self) {
        self.stats.borrow_mut().blocks_created += 1;
    }

    pub fn record_function_created(&self) {
        self.stats.borrow_mut().functions_created += 1;
    }

    pub fn record_call(&self) {
        self.stats.borrow_mut().calls_emitted += 1;
    }

    pub fn record_jump(&self) {
        self.stats.borrow_mut().jumps_emitted += 1;
    }

    pub fn record_comparison(&self) {
        self.stats.borrow_mut().comparisons_emitted += 1;
    }

    /// Get translation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Translation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of instructions translated.
    pub instructions_translated: usize,

    /// Count of each mnemonic translated.
    pub instruction_counts: HashMap<&'static str, usize>,

    /// Basic blocks created from discovered targets.
    pub blocks_created: usize,

    /// Functions created from discovered call targets.
    pub functions_created: usize,

    pub calls_emitted: usize,

    pub jumps_emitted: usize,

    pub comparisons_emitted: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Translation Session Statistics:")?;
        writeln!(f, "  Instructions translated: {}", self.instructions_translated)?;
        writeln!(f, "  Blocks created: {}", self.blocks_created)?;
        writeln!(f, "  Functions created: {}", self.functions_created)?;
        writeln!(f, "  Calls emitted: {}", self.calls_emitted)?;
        writeln!(f, "  Jumps emitted: {}", self.jumps_emitted)?;
        writeln!(f, "  Comparisons emitted: {}", self.comparisons_emitted)?;

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

            for (mnemonic, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", mnemonic, count)?;
            }
        }

        Ok(())
    }
}
