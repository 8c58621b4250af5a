//! External C runtime routines used by the produced program.
//!
//! `printf` and `scanf` are declared as variadic externals; `exit` is used
//! when `EXIT` appears inside a subroutine. Format strings are private
//! constant globals, created once per distinct text.

use crate::core::TranslateResult;
use hashbrown::HashMap;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::values::{BasicMetadataValueEnum, FunctionValue, PointerValue};
use inkwell::AddressSpace;

pub struct Runtime<'ctx> {
    context: &'ctx Context,
    printf: FunctionValue<'ctx>,
    scanf: FunctionValue<'ctx>,
    exit: FunctionValue<'ctx>,
    strings: HashMap<String, PointerValue<'ctx>>,
}

impl<'ctx> Runtime<'ctx> {
    pub fn declare(context: &'ctx Context, module: &Module<'ctx>) -> Self {
        let i32_type = context.i32_type();
        let ptr_type = context.ptr_type(AddressSpace::default());

        let io_type = i32_type.fn_type(&[ptr_type.into()], true);
        let exit_type = context.void_type().fn_type(&[i32_type.into()], false);

        Self {
            context,
            printf: module.add_function("printf", io_type, Some(Linkage::External)),
            scanf: module.add_function("scanf", io_type, Some(Linkage::External)),
            exit: module.add_function("exit", exit_type, Some(Linkage::External)),
            strings: HashMap::new(),
        }
    }

    /// Pointer to a NUL-terminated constant string with the given text.
    pub fn string(&mut self, module: &Module<'ctx>, text: &str) -> PointerValue<'ctx> {
        if let Some(&ptr) = self.strings.get(text) {
            return ptr;
        }

        let value = self.context.const_string(text.as_bytes(), true);
        let global = module.add_global(value.get_type(), None, &format!(".str.{}", self.strings.len()));
        global.set_initializer(&value);
        global.set_constant(true);
        global.set_linkage(Linkage::Private);
        global.set_unnamed_addr(true);

        let ptr = global.as_pointer_value();
        self.strings.insert(text.to_string(), ptr);
        ptr
    }

    /// Emit `printf(format, args...)`.
    pub fn printf(
        &mut self,
        builder: &Builder<'ctx>,
        module: &Module<'ctx>,
        format: &str,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> TranslateResult<()> {
        let mut call_args = vec![self.string(module, format).into()];
        call_args.extend_from_slice(args);
        builder.build_call(self.printf, &call_args, "")?;
        Ok(())
    }

    /// Emit `scanf(format, target)`.
    pub fn scanf(
        &mut self,
        builder: &Builder<'ctx>,
        module: &Module<'ctx>,
        format: &str,
        target: PointerValue<'ctx>,
    ) -> TranslateResult<()> {
        let format = self.string(module, format);
        builder.build_call(self.scanf, &[format.into(), target.into()], "")?;
        Ok(())
    }

    /// Emit `exit(code)` followed by `unreachable`.
    pub fn exit(&self, builder: &Builder<'ctx>, code: i32) -> TranslateResult<()> {
        let code = self.context.i32_type().const_int(code as u64, true);
        builder.build_call(self.exit, &[code.into()], "")?;
        builder.build_unreachable()?;
        Ok(())
    }
}
