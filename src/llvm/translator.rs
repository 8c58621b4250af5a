// This module provides the Translator, which turns a bytecode program into an LLVM module in two
// passes. The prepass (ControlFlowScan) finds every jump and call target, and ControlFlowMap
// turns those targets into functions and blocks before any instruction is emitted. The main pass
// then walks the buffer again with the same PC stepper. At every PC it first switches the active
// function when the PC is a call target, then switches the insertion point when the PC is a
// block target (emitting a fallthrough branch if the previous block is still open), opens a
// fresh block when the previous instruction terminated the current one, emits the benchmark
// counter increment, and finally dispatches on the instruction kind from the opcode table.
// Registers live in a global array addressed by constant index, LOAD and STORE go through the
// memory array with a runtime index, PUSH/POP operate on a translation-time stack of IR values,
// and compare/branch fusion is an explicit two-state handoff: a compare leaves a pending i1
// value that the next conditional jump consumes.

//! Bytecode to LLVM IR translation.

use super::cfg::ControlFlowMap;
use super::instrument::Instrumentation;
use super::layout::{GlobalLayout, MEMORY_SLOTS};
use super::runtime::Runtime;
use crate::core::disasm::format_instruction;
use crate::core::opcode;
use crate::core::{
    ArithOp, ControlFlowScan, InstrKind, Instruction, JumpKind, Reg, Source, Tact, TranslateError,
    TranslateResult, TranslationSession,
};
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{FunctionValue, IntValue};
use inkwell::IntPredicate;

/// Options controlling a translation.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Name of the produced LLVM module.
    pub module_name: String,
    /// Emit benchmark counters and the exit report.
    pub instrument: bool,
    /// Capacity of the generic memory array.
    pub memory_slots: u32,
    /// Run the LLVM verifier on the finished module.
    pub verify: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            module_name: "top".to_string(),
            instrument: true,
            memory_slots: MEMORY_SLOTS,
            verify: true,
        }
    }
}

/// Pending result of the most recent compare.
#[derive(Debug, Clone, Copy, Default)]
enum Comparison<'ctx> {
    #[default]
    None,
    Pending(IntValue<'ctx>),
}

impl<'ctx> Comparison<'ctx> {
    fn take(&mut self) -> Option<IntValue<'ctx>> {
        match std::mem::take(self) {
            Comparison::Pending(value) => Some(value),
            Comparison::None => None,
        }
    }
}

/// Function currently receiving instructions.
#[derive(Debug, Clone, Copy)]
struct ActiveFunction<'ctx> {
    value: FunctionValue<'ctx>,
    /// Entry PC, `None` for main.
    entry: Option<usize>,
}

impl<'ctx> ActiveFunction<'ctx> {
    fn is_main(&self) -> bool {
        self.entry.is_none()
    }
}

/// Map a compare predicate selector to the LLVM predicate; `Always` has none.
pub fn int_predicate(kind: JumpKind) -> Option<IntPredicate> {
    match kind {
        JumpKind::Always => None,
        JumpKind::Greater => Some(IntPredicate::SGT),
        JumpKind::GreaterEqual => Some(IntPredicate::SGE),
        JumpKind::Less => Some(IntPredicate::SLT),
        JumpKind::LessEqual => Some(IntPredicate::SLE),
        JumpKind::Equal => Some(IntPredicate::EQ),
        JumpKind::NotEqual => Some(IntPredicate::NE),
    }
}

/// Two-pass bytecode translator.
pub struct Translator<'ctx, 'arena> {
    context: &'ctx Context,

    /// LLVM module being produced.
    module: Module<'ctx>,

    builder: Builder<'ctx>,

    /// Session owning the bytecode and statistics.
    session: &'arena TranslationSession<'arena>,

    options: TranslateOptions,

    layout: GlobalLayout<'ctx>,

    runtime: Runtime<'ctx>,

    instrumentation: Instrumentation,

    /// Top-level `i32 main()`.
    main: FunctionValue<'ctx>,

    current: ActiveFunction<'ctx>,

    /// Translation-time operand stack.
    stack: Vec<IntValue<'ctx>>,

    comparison: Comparison<'ctx>,

    pc: usize,
}

impl<'ctx, 'arena> Translator<'ctx, 'arena> {
    /// Create a translator with an empty module holding the global layout,
    /// the runtime declarations and the `main` entry block.
    pub fn new(
        context: &'ctx Context,
        session: &'arena TranslationSession<'arena>,
        options: TranslateOptions,
    ) -> Self {
        let module = context.create_module(&options.module_name);
        let builder = context.create_builder();

        let layout = GlobalLayout::new(context, &module, options.memory_slots, Tact::SLOT_COUNT as u32);
        let runtime = Runtime::declare(context, &module);
        let instrumentation = Instrumentation::new(options.instrument);

        let main_type = context.i32_type().fn_type(&[], false);
        let main = module.add_function("main", main_type, None);
        let entry = context.append_basic_block(main, "entry");
        builder.position_at_end(entry);

        Self {
            context,
            module,
            builder,
            session,
            options,
            layout,
            runtime,
            instrumentation,
            main,
            current: ActiveFunction {
                value: main,
                entry: None,
            },
            stack: Vec::new(),
            comparison: Comparison::None,
            pc: 0,
        }
    }

    pub fn layout(&self) -> &GlobalLayout<'ctx> {
        &self.layout
    }

    /// Run both passes and return the finished module.
    pub fn translate(mut self) -> TranslateResult<Module<'ctx>> {
        let code = self.session.bytecode();
        log::info!("Translating {} bytes of bytecode", code.len());

        let scan = ControlFlowScan::scan(code)?;
        let cfg = ControlFlowMap::materialize(self.context, &self.module, self.session, scan, self.main);
        log::debug!(
            "Prepass materialized {} functions and {} blocks",
            cfg.function_count(),
            cfg.block_count()
        );

        self.pc = 0;
        while self.pc < code.len() {
            self.enter_boundary(&cfg)?;

            let inst = Instruction::decode(code, self.pc)?;
            log::trace!("{}", format_instruction(&inst, code.len()));

            self.ensure_open_block()?;
            let is_jump = matches!(inst.info.kind, InstrKind::Jump(_));
            self.instrumentation
                .emit_tact(&self.builder, &self.layout, inst.info.tact, is_jump)?;

            self.translate_instruction(&inst, &cfg)?;
            self.session.record_instruction(inst.info.mnemonic);

            self.pc += opcode::step(code, self.pc)?;
        }

        // A jump or call may target the end of the program.
        self.enter_boundary(&cfg)?;
        self.close_block()?;
        self.close_end_blocks(&cfg)?;

        if self.options.verify {
            self.module
                .verify()
                .map_err(|e| TranslateError::Verification {
                    reason: e.to_string(),
                })?;
        }

        log::info!("{}", self.session.stats());
        Ok(self.module)
    }

    /// Switch function and block when `self.pc` is a discovered boundary.
    fn enter_boundary(&mut self, cfg: &ControlFlowMap<'ctx>) -> TranslateResult<()> {
        if let Some(function) = cfg.function(self.pc) {
            self.close_block()?;
            if !self.stack.is_empty() {
                log::warn!(
                    "Dropping {} operand stack values at function boundary {}",
                    self.stack.len(),
                    self.pc
                );
                self.stack.clear();
            }
            self.comparison = Comparison::None;
            self.current = ActiveFunction {
                value: function,
                entry: Some(self.pc),
            };
            log::info!("Translating function {}", function.get_name().to_string_lossy());
        }

        let block = match cfg.block(self.pc) {
            Some(block) => Some(block),
            None if self.pc == cfg.scan().code_len() => cfg.end_block(self.current.entry),
            None => None,
        };
        if let Some(block) = block {
            if !self.is_terminated() {
                self.builder.build_unconditional_branch(block)?;
            }
            self.builder.position_at_end(block);
        }

        Ok(())
    }

    /// Return from end blocks the main pass never fell into.
    fn close_end_blocks(&mut self, cfg: &ControlFlowMap<'ctx>) -> TranslateResult<()> {
        for (entry, block) in cfg.end_blocks() {
            if block.get_terminator().is_some() {
                continue;
            }
            self.current = ActiveFunction {
                value: entry.and_then(|pc| cfg.function(pc)).unwrap_or(self.main),
                entry,
            };
            self.builder.position_at_end(block);
            self.build_default_return()?;
        }
        Ok(())
    }

    fn is_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_terminator())
            .is_some()
    }

    /// Give instructions following a terminator a block of their own.
    fn ensure_open_block(&mut self) -> TranslateResult<()> {
        if self.is_terminated() {
            let block = self
                .context
                .append_basic_block(self.current.value, &format!("dead_{}", self.pc));
            log::debug!("Unreachable code at PC {}", self.pc);
            self.builder.position_at_end(block);
        }
        Ok(())
    }

    /// Terminate the current block with the active function's default return.
    fn close_block(&mut self) -> TranslateResult<()> {
        if !self.is_terminated() {
            self.build_default_return()?;
        }
        Ok(())
    }

    fn build_default_return(&mut self) -> TranslateResult<()> {
        if self.current.is_main() {
            let zero = self.context.i32_type().const_zero();
            self.builder.build_return(Some(&zero))?;
        } else {
            self.builder.build_return(None)?;
        }
        Ok(())
    }

    fn translate_instruction(&mut self, inst: &Instruction<'_>, cfg: &ControlFlowMap<'ctx>) -> TranslateResult<()> {
        match inst.info.kind {
            InstrKind::Arith { op, source } => self.translate_arith(inst, op, source),
            InstrKind::Move { source } => {
                let dst = inst.reg(0)?;
                let value = self.operand(inst, source)?;
                self.store_register(dst, value)
            }
            InstrKind::Load => self.translate_load(inst),
            InstrKind::Store => self.translate_store(inst),
            InstrKind::Compare { source } => self.translate_compare(inst, source),
            InstrKind::Jump(kind) => self.translate_jump(inst, kind, cfg),
            InstrKind::Write => self.translate_write(inst),
            InstrKind::Read => self.translate_read(inst),
            InstrKind::Push { source } => {
                let value = match source {
                    Source::Register => self.load_register(inst.reg(0)?)?,
                    _ => self.immediate(inst.imm(0)),
                };
                self.stack.push(value);
                Ok(())
            }
            InstrKind::Pop => {
                let dst = inst.reg(0)?;
                let value = self
                    .stack
                    .pop()
                    .ok_or(TranslateError::StackUnderflow { offset: inst.pc })?;
                self.store_register(dst, value)
            }
            InstrKind::Call => self.translate_call(inst, cfg),
            InstrKind::Ret => self.build_default_return(),
            InstrKind::Exit => self.translate_exit(),
        }
    }

    fn translate_arith(&mut self, inst: &Instruction<'_>, op: ArithOp, source: Source) -> TranslateResult<()> {
        let dst = inst.reg(0)?;
        let lhs = self.load_register(dst)?;
        let rhs = self.operand(inst, source)?;

        let result = match op {
            ArithOp::Add => self.builder.build_int_add(lhs, rhs, "add")?,
            ArithOp::Sub => self.builder.build_int_sub(lhs, rhs, "sub")?,
            ArithOp::Mul => self.builder.build_int_mul(lhs, rhs, "mul")?,
            ArithOp::Div => self.builder.build_int_signed_div(lhs, rhs, "div")?,
        };
        self.store_register(dst, result)
    }

    /// `dst = memory[index]`
    fn translate_load(&mut self, inst: &Instruction<'_>) -> TranslateResult<()> {
        let dst = inst.reg(0)?;
        let index = self.load_register(inst.reg(1)?)?;
        let ptr = self.layout.memory_slot(&self.builder, index)?;
        let value = self
            .builder
            .build_load(self.layout.word_type(), ptr, "mem")?
            .into_int_value();
        self.store_register(dst, value)
    }

    /// `memory[index] = src`
    fn translate_store(&mut self, inst: &Instruction<'_>) -> TranslateResult<()> {
        let value = self.load_register(inst.reg(0)?)?;
        let index = self.load_register(inst.reg(1)?)?;
        let ptr = self.layout.memory_slot(&self.builder, index)?;
        self.builder.build_store(ptr, value)?;
        Ok(())
    }

    fn translate_compare(&mut self, inst: &Instruction<'_>, source: Source) -> TranslateResult<()> {
        let kind = inst.predicate()?;
        let lhs_reg = inst.reg(0)?;
        if source == Source::Register {
            inst.reg(1)?;
        }

        let Some(predicate) = int_predicate(kind) else {
            log::trace!("Compare at {} selects JMP; no comparison emitted", inst.pc);
            self.comparison = Comparison::None;
            return Ok(());
        };

        let lhs = self.load_register(lhs_reg)?;
        let rhs = self.operand(inst, source)?;
        let value = self.builder.build_int_compare(predicate, lhs, rhs, "cmp")?;
        self.session.record_comparison();
        self.comparison = Comparison::Pending(value);
        Ok(())
    }

    fn translate_jump(&mut self, inst: &Instruction<'_>, kind: JumpKind, cfg: &ControlFlowMap<'ctx>) -> TranslateResult<()> {
        let missing = || TranslateError::MissingBranchTargets { offset: inst.pc };
        let targets = *cfg.branch(inst.pc).ok_or_else(missing)?;
        let true_block = cfg.jump_target(inst.pc, targets.true_pc).ok_or_else(missing)?;

        if kind.is_conditional() {
            let condition = self
                .comparison
                .take()
                .ok_or(TranslateError::MissingComparison { offset: inst.pc })?;
            let false_block = cfg.jump_target(inst.pc, targets.false_pc).ok_or_else(missing)?;
            self.builder
                .build_conditional_branch(condition, true_block, false_block)?;
        } else {
            self.builder.build_unconditional_branch(true_block)?;
        }

        self.session.record_jump();
        Ok(())
    }

    fn translate_write(&mut self, inst: &Instruction<'_>) -> TranslateResult<()> {
        let reg = inst.reg(0)?;
        self.runtime
            .printf(&self.builder, &self.module, &format!("{} = ", reg), &[])?;
        let value = self.load_register(reg)?;
        self.runtime
            .printf(&self.builder, &self.module, "%d\n", &[value.into()])
    }

    fn translate_read(&mut self, inst: &Instruction<'_>) -> TranslateResult<()> {
        let reg = inst.reg(0)?;
        self.runtime
            .printf(&self.builder, &self.module, &format!("{} <- ", reg), &[])?;
        let ptr = self.layout.register_slot(&self.builder, reg)?;
        self.runtime.scanf(&self.builder, &self.module, "%d", ptr)
    }

    fn translate_call(&mut self, inst: &Instruction<'_>, cfg: &ControlFlowMap<'ctx>) -> TranslateResult<()> {
        let (target, function) = cfg
            .callee(inst.pc)
            .ok_or(TranslateError::MissingFunction {
                offset: inst.pc,
                target: inst.pc,
            })?;
        let function = function.ok_or(TranslateError::MissingFunction {
            offset: inst.pc,
            target,
        })?;

        self.builder.build_call(function, &[], "")?;
        self.session.record_call();
        Ok(())
    }

    fn translate_exit(&mut self) -> TranslateResult<()> {
        self.instrumentation
            .emit_report(&self.builder, &self.module, &self.layout, &mut self.runtime)?;

        if self.current.is_main() {
            let zero = self.context.i32_type().const_zero();
            self.builder.build_return(Some(&zero))?;
        } else {
            self.runtime.exit(&self.builder, 0)?;
        }
        Ok(())
    }

    /// Second operand of a two-operand instruction.
    fn operand(&mut self, inst: &Instruction<'_>, source: Source) -> TranslateResult<IntValue<'ctx>> {
        match source {
            Source::Register => self.load_register(inst.reg(1)?),
            Source::Immediate => Ok(self.immediate(inst.imm(1))),
            Source::One => Ok(self.immediate(1)),
        }
    }

    fn immediate(&self, value: i8) -> IntValue<'ctx> {
        self.layout.word_type().const_int(value as i64 as u64, true)
    }

    fn load_register(&mut self, reg: Reg) -> TranslateResult<IntValue<'ctx>> {
        let ptr = self.layout.register_slot(&self.builder, reg)?;
        let value = self
            .builder
            .build_load(self.layout.word_type(), ptr, &reg.to_string())?
            .into_int_value();
        Ok(value)
    }

    fn store_register(&mut self, reg: Reg, value: IntValue<'ctx>) -> TranslateResult<()> {
        let ptr = self.layout.register_slot(&self.builder, reg)?;
        self.builder.build_store(ptr, value)?;
        Ok(())
    }
}

/// Translate an in-memory program with a fresh session.
pub fn translate<'ctx>(
    context: &'ctx Context,
    code: &[u8],
    options: TranslateOptions,
) -> TranslateResult<Module<'ctx>> {
    let arena = bumpalo::Bump::new();
    let session = TranslationSession::new(&arena, code);
    Translator::new(context, &session, options).translate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_mapping() {
        assert_eq!(int_predicate(JumpKind::GreaterEqual), Some(IntPredicate::SGE));
        assert_eq!(int_predicate(JumpKind::NotEqual), Some(IntPredicate::NE));
        assert_eq!(int_predicate(JumpKind::Always), None);
    }

    #[test]
    fn test_comparison_is_consumed_once() {
        let context = Context::create();
        let value = context.bool_type().const_int(1, false);

        let mut comparison = Comparison::Pending(value);
        assert!(comparison.take().is_some());
        assert!(comparison.take().is_none());
    }
}
