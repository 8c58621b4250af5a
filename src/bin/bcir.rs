//! Command-line driver: translate a bytecode file and print the LLVM module.

use bcir::core::disasm;
use bcir::{render_ir, TranslateOptions, TranslationSession, Translator};
use bumpalo::Bump;
use clap::Parser;
use inkwell::context::Context;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bcir", version, about = "Translate bytecode into LLVM IR")]
struct Args {
    /// Bytecode file to translate
    input: PathBuf,

    /// Write the IR to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the produced module
    #[arg(long, default_value = "top")]
    module_name: String,

    /// Do not emit benchmark counters
    #[arg(long)]
    no_bench: bool,

    /// Capacity of the memory array used by LOAD and STORE
    #[arg(long, default_value_t = bcir::llvm::MEMORY_SLOTS)]
    memory_slots: u32,

    /// Skip the LLVM verifier
    #[arg(long)]
    no_verify: bool,

    /// Print a disassembly listing instead of IR
    #[arg(long)]
    disasm: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let arena = Bump::new();
    let session = TranslationSession::load(&arena, &args.input)?;

    if args.disasm {
        print!("{}", disasm::disassemble(session.bytecode())?);
        return Ok(());
    }

    let options = TranslateOptions {
        module_name: args.module_name.clone(),
        instrument: !args.no_bench,
        memory_slots: args.memory_slots,
        verify: !args.no_verify,
    };

    let context = Context::create();
    let module = Translator::new(&context, &session, options).translate()?;
    let text = render_ir(&module);

    match &args.output {
        Some(path) => fs::write(path, text)?,
        None => print!("{}", text),
    }
    Ok(())
}
