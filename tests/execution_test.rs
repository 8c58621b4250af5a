// This test suite runs translated programs with the LLVM MCJIT execution engine and inspects the
// global state they leave behind. Each module gets two small helper functions, peek_register and
// peek_tact, that read one slot of the register file or the benchmark counters, so the tests can
// check final register values and executed-instruction counts after main returns. The scenarios
// cover a plain write, a compare-equal branch choosing between two register values, a counting
// loop with a backward conditional jump, memory array round trips through LOAD and STORE, the
// operand stack, signed arithmetic, a subroutine called from several sites, and jumps to the
// end of the program from both main and a subroutine.

//! End-to-end execution tests.

use bcir::core::{Opcode, Tact, REG_COUNT};
use bcir::llvm::TranslateOptions;
use bcir::translate;
use inkwell::context::Context;
use inkwell::execution_engine::JitFunction;
use inkwell::module::Module;
use inkwell::targets::{InitializationConfig, Target};
use inkwell::OptimizationLevel;

type MainFn = unsafe extern "C" fn() -> i32;
type PeekFn = unsafe extern "C" fn(i32) -> i32;

fn op(o: Opcode) -> u8 {
    o as u8
}

/// State of the produced program after `main` returns.
struct Run {
    exit_code: i32,
    registers: [i32; REG_COUNT],
    tacts: Vec<i32>,
}

impl Run {
    fn tact(&self, tact: Tact) -> i32 {
        self.tacts[tact.slot()]
    }

    fn total_jumps(&self) -> i32 {
        self.tacts[Tact::TOTAL_JUMPS_SLOT]
    }
}

/// Add `i32 name(i32 index)` returning `global[index]`.
fn add_peek<'ctx>(context: &'ctx Context, module: &Module<'ctx>, name: &str, global: &str) {
    let i32_type = context.i32_type();
    let function = module.add_function(name, i32_type.fn_type(&[i32_type.into()], false), None);
    let builder = context.create_builder();
    builder.position_at_end(context.append_basic_block(function, "entry"));

    let array = module.get_global(global).unwrap();
    let index = function.get_nth_param(0).unwrap().into_int_value();
    let slot = unsafe {
        builder
            .build_gep(i32_type, array.as_pointer_value(), &[index], "slot")
            .unwrap()
    };
    let value = builder.build_load(i32_type, slot, "value").unwrap();
    builder.build_return(Some(&value)).unwrap();
}

fn execute(code: &[u8]) -> Run {
    let _ = env_logger::builder().is_test(true).try_init();
    Target::initialize_native(&InitializationConfig::default()).unwrap();

    let context = Context::create();
    let module = translate(&context, code, TranslateOptions::default()).unwrap();
    add_peek(&context, &module, "peek_register", "registers");
    add_peek(&context, &module, "peek_tact", "tacts");

    let engine = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .unwrap();

    unsafe {
        let main: JitFunction<MainFn> = engine.get_function("main").unwrap();
        let peek_register: JitFunction<PeekFn> = engine.get_function("peek_register").unwrap();
        let peek_tact: JitFunction<PeekFn> = engine.get_function("peek_tact").unwrap();

        let exit_code = main.call();

        let mut registers = [0; REG_COUNT];
        for (i, slot) in registers.iter_mut().enumerate() {
            *slot = peek_register.call(i as i32);
        }

        let mut tacts = Vec::with_capacity(Tact::SLOT_COUNT);
        for i in 0..Tact::SLOT_COUNT {
            tacts.push(peek_tact.call(i as i32));
        }

        Run {
            exit_code,
            registers,
            tacts,
        }
    }
}

#[test]
fn test_write_register() {
    // MOV r0, #5; WRITE r0; EXIT
    let code = [op(Opcode::Mov), 0, 5, op(Opcode::Write), 0, op(Opcode::Exit)];
    let run = execute(&code);

    assert_eq!(run.exit_code, 0);
    assert_eq!(run.registers[0], 5);
    assert_eq!(run.tact(Tact::Mov), 1);
    assert_eq!(run.tact(Tact::Write), 1);
    assert_eq!(run.tact(Tact::Exit), 1);
    assert_eq!(run.total_jumps(), 0);
}

#[test]
fn test_equal_branch_taken() {
    // 0: MOV r0, #0
    // 3: CMP r0, #0, JE
    // 7: JE +7 -> 14
    // 9: MOV r0, #2
    // 12: JMP +5 -> 17
    // 14: MOV r0, #1
    // 17: EXIT
    let code = [
        op(Opcode::Mov), 0, 0,
        op(Opcode::Cmp), 0, 0, op(Opcode::Je),
        op(Opcode::Je), 7,
        op(Opcode::Mov), 0, 2,
        op(Opcode::Jmp), 5,
        op(Opcode::Mov), 0, 1,
        op(Opcode::Exit),
    ];
    let run = execute(&code);

    assert_eq!(run.exit_code, 0);
    assert_eq!(run.registers[0], 1);
    assert_eq!(run.tact(Tact::Mov), 2);
    assert_eq!(run.tact(Tact::Cmp), 1);
    assert_eq!(run.tact(Tact::Je), 1);
    assert_eq!(run.tact(Tact::Jmp), 0);
    assert_eq!(run.total_jumps(), 1);
}

#[test]
fn test_counting_loop() {
    // r1 = 5 + 4 + 3 + 2 + 1
    // 0: MOV r0, #5
    // 3: MOV r1, #0
    // 6: ADD_R r1, r0
    // 9: DEC r0
    // 11: CMP r0, #0, JG
    // 15: JG -9 -> 6
    // 17: EXIT
    let code = [
        op(Opcode::Mov), 0, 5,
        op(Opcode::Mov), 1, 0,
        op(Opcode::AddR), 1, 0,
        op(Opcode::Dec), 0,
        op(Opcode::Cmp), 0, 0, op(Opcode::Jg),
        op(Opcode::Jg), 0xF7,
        op(Opcode::Exit),
    ];
    let run = execute(&code);

    assert_eq!(run.registers[0], 0);
    assert_eq!(run.registers[1], 15);
    assert_eq!(run.tact(Tact::Add), 5);
    assert_eq!(run.tact(Tact::Dec), 5);
    assert_eq!(run.tact(Tact::Jg), 5);
    assert_eq!(run.total_jumps(), 5);
}

#[test]
fn test_memory_round_trip() {
    // 0: MOV r0, #42
    // 3: MOV r1, #3
    // 6: STORE [r1], r0
    // 9: LOAD r2, [r1]
    // 12: EXIT
    let code = [
        op(Opcode::Mov), 0, 42,
        op(Opcode::Mov), 1, 3,
        op(Opcode::Store), 0, 1,
        op(Opcode::Load), 2, 1,
        op(Opcode::Exit),
    ];
    let run = execute(&code);

    assert_eq!(run.registers[2], 42);
    assert_eq!(run.tact(Tact::Store), 1);
    assert_eq!(run.tact(Tact::Load), 1);
}

#[test]
fn test_operand_stack() {
    // PUSH #7; MOV r0, #3; PUSH_R r0; POP_R r1; POP_R r2; EXIT
    let code = [
        op(Opcode::Push), 7,
        op(Opcode::Mov), 0, 3,
        op(Opcode::PushR), 0,
        op(Opcode::PopR), 1,
        op(Opcode::PopR), 2,
        op(Opcode::Exit),
    ];
    let run = execute(&code);

    assert_eq!(run.registers[1], 3);
    assert_eq!(run.registers[2], 7);
    assert_eq!(run.tact(Tact::Push), 2);
    assert_eq!(run.tact(Tact::Pop), 2);
}

#[test]
fn test_signed_arithmetic() {
    // r0 = 20 / 3 * -2 - 3; r1 = 30 / r0; r2 = 1; r3 = r1 * r1
    let code = [
        op(Opcode::Mov), 0, 20,
        op(Opcode::Idiv), 0, 3,
        op(Opcode::Imul), 0, 0xFE,
        op(Opcode::Sub), 0, 3,
        op(Opcode::Mov), 1, 30,
        op(Opcode::IdivR), 1, 0,
        op(Opcode::Inc), 2,
        op(Opcode::MovR), 3, 1,
        op(Opcode::ImulR), 3, 3,
        op(Opcode::Exit),
    ];
    let run = execute(&code);

    assert_eq!(run.registers[0], -15);
    assert_eq!(run.registers[1], -2);
    assert_eq!(run.registers[2], 1);
    assert_eq!(run.registers[3], 4);
    assert_eq!(run.tact(Tact::Idiv), 2);
    assert_eq!(run.tact(Tact::Imul), 2);
}

#[test]
fn test_subroutine_called_twice() {
    // 0: CALL +5 -> 5
    // 2: CALL +3 -> 5
    // 4: EXIT
    // 5: INC r0
    // 7: RET
    let code = [
        op(Opcode::Call), 5,
        op(Opcode::Call), 3,
        op(Opcode::Exit),
        op(Opcode::Inc), 0,
        op(Opcode::Ret),
    ];
    let run = execute(&code);

    assert_eq!(run.exit_code, 0);
    assert_eq!(run.registers[0], 2);
    assert_eq!(run.tact(Tact::Call), 2);
    assert_eq!(run.tact(Tact::Inc), 2);
    assert_eq!(run.tact(Tact::Ret), 2);
}

#[test]
fn test_jump_to_end_past_subroutine() {
    // 0: CALL +4   2: JMP +6 -> 8   4: INC r0   6: JMP +2 -> 8
    let code = [
        op(Opcode::Call), 4,
        op(Opcode::Jmp), 6,
        op(Opcode::Inc), 0,
        op(Opcode::Jmp), 2,
    ];
    let run = execute(&code);

    assert_eq!(run.exit_code, 0);
    assert_eq!(run.registers[0], 1);
    assert_eq!(run.tact(Tact::Call), 1);
    assert_eq!(run.tact(Tact::Jmp), 2);
    assert_eq!(run.total_jumps(), 2);
}
