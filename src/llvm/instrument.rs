// This module emits the benchmark instrumentation of the produced program. Before every
// translated instruction the translator asks for a counter increment: the slot of the
// instruction's category is loaded from the global counter array, incremented and stored back,
// so the counting happens when the program runs, not while it is translated. Jump-family
// instructions additionally bump the total-jumps slot. At EXIT a single printf call prints every
// counter in table order using a report template derived from the same table.

//! Benchmark instrumentation.

use super::layout::GlobalLayout;
use super::runtime::Runtime;
use crate::core::{Tact, TranslateResult};
use inkwell::builder::Builder;
use inkwell::module::Module;
use inkwell::values::BasicMetadataValueEnum;
use std::fmt::Write;

/// Counters printed per report line.
const COUNTERS_PER_LINE: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct Instrumentation {
    enabled: bool,
}

impl Instrumentation {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Emit the counter increment for one instruction.
    pub fn emit_tact<'ctx>(
        &self,
        builder: &Builder<'ctx>,
        layout: &GlobalLayout<'ctx>,
        tact: Tact,
        is_jump: bool,
    ) -> TranslateResult<()> {
        if !self.enabled {
            return Ok(());
        }

        increment(builder, layout, tact.slot())?;
        if is_jump {
            increment(builder, layout, Tact::TOTAL_JUMPS_SLOT)?;
        }
        Ok(())
    }

    /// Emit the report call printing every counter.
    pub fn emit_report<'ctx>(
        &self,
        builder: &Builder<'ctx>,
        module: &Module<'ctx>,
        layout: &GlobalLayout<'ctx>,
        runtime: &mut Runtime<'ctx>,
    ) -> TranslateResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let i32_type = layout.word_type();
        let mut args: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(Tact::SLOT_COUNT);
        for slot in 0..Tact::SLOT_COUNT {
            let ptr = layout.tact_slot(builder, slot)?;
            let value = builder.build_load(i32_type, ptr, "tact")?;
            args.push(value.into());
        }

        runtime.printf(builder, module, &report_template(), &args)
    }
}

fn increment<'ctx>(builder: &Builder<'ctx>, layout: &GlobalLayout<'ctx>, slot: usize) -> TranslateResult<()> {
    let ptr = layout.tact_slot(builder, slot)?;
    let i32_type = layout.word_type();

    let count = builder.build_load(i32_type, ptr, "tact")?.into_int_value();
    let one = i32_type.const_int(1, false);
    let count = builder.build_int_add(count, one, "tact.inc")?;
    builder.build_store(ptr, count)?;
    Ok(())
}

/// printf template with one `%d` per counter slot, in slot order.
pub fn report_template() -> String {
    let mut template = String::from("\n#[BENCHMARK]:\n");
    for line in Tact::ALL.chunks(COUNTERS_PER_LINE) {
        template.push(' ');
        for tact in line {
            let _ = write!(template, " {}: %d", tact.label());
        }
        template.push('\n');
    }
    template.push_str("  total jumps: %d\n");
    template
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_template_has_one_conversion_per_slot() {
        let template = report_template();
        assert_eq!(template.matches("%d").count(), Tact::SLOT_COUNT);
        assert!(template.starts_with("\n#[BENCHMARK]:\n"));
        assert!(template.contains("  add: %d sub: %d"));
        assert!(template.ends_with("  total jumps: %d\n"));
    }
}
