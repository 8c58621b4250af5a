//! Materialization of the prepass into LLVM functions and blocks.
//!
//! Every function and block the main pass can reach is created here, before
//! a single instruction is emitted. The main pass only looks handles up by
//! PC, so a target shared by several jump sites or call sites resolves to the
//! same object. A jump past the last instruction resolves to the end block
//! of the function containing the jump.

use crate::core::{BranchTargets, ControlFlowScan, TranslationSession};
use inkwell::basic_block::BasicBlock;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::values::FunctionValue;
use std::collections::BTreeMap;

/// PC-keyed block and function handles.
pub struct ControlFlowMap<'ctx> {
    scan: ControlFlowScan,
    main: FunctionValue<'ctx>,
    functions: BTreeMap<usize, FunctionValue<'ctx>>,
    blocks: BTreeMap<usize, BasicBlock<'ctx>>,
    end_blocks: BTreeMap<Option<usize>, BasicBlock<'ctx>>,
}

impl<'ctx> ControlFlowMap<'ctx> {
    /// Create a `void()` function for every call target and a block for every
    /// block target, each block appended to the function that owns its PC.
    pub fn materialize(
        context: &'ctx Context,
        module: &Module<'ctx>,
        session: &TranslationSession<'_>,
        scan: ControlFlowScan,
        main: FunctionValue<'ctx>,
    ) -> Self {
        let fn_type = context.void_type().fn_type(&[], false);

        let mut functions = BTreeMap::new();
        for entry in scan.functions() {
            let name = format!("fn_{}", entry);
            let function = module.add_function(&name, fn_type, Some(Linkage::Internal));
            session.record_function_created();
            functions.insert(entry, function);
        }

        let function_of = |entry: Option<usize>| {
            entry
                .and_then(|entry| functions.get(&entry).copied())
                .unwrap_or(main)
        };

        let mut blocks = BTreeMap::new();
        for pc in scan.block_targets() {
            let owner = function_of(scan.owner_of(pc));
            let name = if scan.is_function_entry(pc) {
                "entry".to_string()
            } else {
                format!("pc_{}", pc)
            };
            let block = context.append_basic_block(owner, &name);
            session.record_block_created();
            log::debug!(
                "Block {} at PC {} in {}",
                name,
                pc,
                owner.get_name().to_string_lossy()
            );
            blocks.insert(pc, block);
        }

        let end_name = format!("pc_{}", scan.code_len());
        let mut end_blocks = BTreeMap::new();
        for entry in scan.end_owners() {
            let owner = function_of(entry);
            let block = context.append_basic_block(owner, &end_name);
            session.record_block_created();
            log::debug!("End block in {}", owner.get_name().to_string_lossy());
            end_blocks.insert(entry, block);
        }

        Self {
            scan,
            main,
            functions,
            blocks,
            end_blocks,
        }
    }

    pub fn scan(&self) -> &ControlFlowScan {
        &self.scan
    }

    pub fn main(&self) -> FunctionValue<'ctx> {
        self.main
    }

    /// Function whose entry is `pc`.
    pub fn function(&self, pc: usize) -> Option<FunctionValue<'ctx>> {
        self.functions.get(&pc).copied()
    }

    /// Block starting at `pc`.
    pub fn block(&self, pc: usize) -> Option<BasicBlock<'ctx>> {
        self.blocks.get(&pc).copied()
    }

    /// End block of the function whose entry is `entry` (`None` for main).
    pub fn end_block(&self, entry: Option<usize>) -> Option<BasicBlock<'ctx>> {
        self.end_blocks.get(&entry).copied()
    }

    /// End blocks keyed by the entry of the function holding them.
    pub fn end_blocks(&self) -> impl Iterator<Item = (Option<usize>, BasicBlock<'ctx>)> + '_ {
        self.end_blocks.iter().map(|(&entry, &block)| (entry, block))
    }

    /// Block a jump at `from` reaches when it targets `pc`.
    pub fn jump_target(&self, from: usize, pc: usize) -> Option<BasicBlock<'ctx>> {
        if pc == self.scan.code_len() {
            self.end_block(self.scan.owner_of(from))
        } else {
            self.block(pc)
        }
    }

    /// Branch targets registered for the jump at `pc`.
    pub fn branch(&self, pc: usize) -> Option<&BranchTargets> {
        self.scan.branch(pc)
    }

    /// Function called by the call instruction at `pc`.
    pub fn callee(&self, pc: usize) -> Option<(usize, Option<FunctionValue<'ctx>>)> {
        self.scan
            .call_target(pc)
            .map(|target| (target, self.function(target)))
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len() + self.end_blocks.len()
    }
}
