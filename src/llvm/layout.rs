// This module allocates the mutable state of the produced program as zero-initialized global
// i32 arrays: the register file, the generic memory array used by LOAD and STORE, and the
// benchmark counters. The two addressing disciplines are kept apart by type: register slots are
// only reachable through a validated Reg and a constant GEP index, while memory slots take a
// runtime IntValue computed by the program. Out-of-bounds memory indices are not checked; they
// are behavior of the produced program.

//! Global state layout of the produced program.

use crate::core::{Reg, TranslateResult, REG_COUNT};
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{ArrayType, IntType};
use inkwell::values::{GlobalValue, IntValue, PointerValue};

/// Default capacity of the generic memory array.
pub const MEMORY_SLOTS: u32 = 10;

/// A fixed-size global i32 array.
#[derive(Debug, Clone, Copy)]
pub struct GlobalArray<'ctx> {
    global: GlobalValue<'ctx>,
    ty: ArrayType<'ctx>,
}

impl<'ctx> GlobalArray<'ctx> {
    fn new(context: &'ctx Context, module: &Module<'ctx>, name: &str, len: u32) -> Self {
        let ty = context.i32_type().array_type(len);
        let global = module.add_global(ty, None, name);
        global.set_initializer(&ty.const_zero());
        global.set_linkage(Linkage::Internal);
        Self { global, ty }
    }

    pub fn global(&self) -> GlobalValue<'ctx> {
        self.global
    }

    pub fn len(&self) -> u32 {
        self.ty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, builder: &Builder<'ctx>, index: IntValue<'ctx>, name: &str) -> TranslateResult<PointerValue<'ctx>> {
        let zero = index.get_type().const_zero();
        let ptr = unsafe {
            builder.build_gep(self.ty, self.global.as_pointer_value(), &[zero, index], name)?
        };
        Ok(ptr)
    }
}

/// The three global arrays of the produced program.
#[derive(Debug, Clone, Copy)]
pub struct GlobalLayout<'ctx> {
    registers: GlobalArray<'ctx>,
    memory: GlobalArray<'ctx>,
    tacts: GlobalArray<'ctx>,
}

impl<'ctx> GlobalLayout<'ctx> {
    pub fn new(context: &'ctx Context, module: &Module<'ctx>, memory_slots: u32, tact_slots: u32) -> Self {
        let layout = Self {
            registers: GlobalArray::new(context, module, "registers", REG_COUNT as u32),
            memory: GlobalArray::new(context, module, "memory", memory_slots),
            tacts: GlobalArray::new(context, module, "tacts", tact_slots),
        };
        log::debug!(
            "Global layout: {} registers, {} memory slots, {} counters",
            REG_COUNT,
            memory_slots,
            tact_slots
        );
        layout
    }

    pub fn registers(&self) -> GlobalArray<'ctx> {
        self.registers
    }

    pub fn memory(&self) -> GlobalArray<'ctx> {
        self.memory
    }

    pub fn tacts(&self) -> GlobalArray<'ctx> {
        self.tacts
    }

    /// Address of a register slot; the index is a compile-time constant.
    pub fn register_slot(&self, builder: &Builder<'ctx>, reg: Reg) -> TranslateResult<PointerValue<'ctx>> {
        let index = self.word_type().const_int(reg.index() as u64, false);
        self.registers.slot(builder, index, &format!("{}.ptr", reg))
    }

    /// Address of a memory slot selected at runtime.
    pub fn memory_slot(&self, builder: &Builder<'ctx>, index: IntValue<'ctx>) -> TranslateResult<PointerValue<'ctx>> {
        self.memory.slot(builder, index, "mem.ptr")
    }

    /// Address of a benchmark counter slot.
    pub fn tact_slot(&self, builder: &Builder<'ctx>, slot: usize) -> TranslateResult<PointerValue<'ctx>> {
        let index = self.word_type().const_int(slot as u64, false);
        self.tacts.slot(builder, index, "tact.ptr")
    }

    /// Machine word type of every slot.
    pub fn word_type(&self) -> IntType<'ctx> {
        self.registers.ty.get_element_type().into_int_type()
    }
}
