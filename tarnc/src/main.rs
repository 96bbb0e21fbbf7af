//! tarnc: command-line driver for the tarn compiler front/middle-end.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::debug;
use tarn_ir::block::Block;
use tarn_ir::display::{PrintCtx, block_to_string};
use tarn_ir::instruction::Opcode;
use tarn_ir::module::Module;
use tarn_ir::types::TypeKind;
use tarn_ir::value::ValueRef;
use tarn_lex::{Scanner, TokenKind};

#[derive(Parser)]
#[command(name = "tarnc")]
#[command(about = "Driver for the tarn compiler front/middle-end", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the register-allocation demo block and print it before and
    /// after allocation.
    Demo {
        /// How many physical registers the allocator may use.
        #[arg(long, default_value_t = 2)]
        reg_limit: u32,
    },
    /// Tokenize a source file and dump its tokens.
    Lex {
        /// Input source file.
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Demo { reg_limit } => demo(reg_limit),
        Command::Lex { file } => lex(&file),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn demo(reg_limit: u32) -> Result<(), Box<dyn Error>> {
    let mut module = Module::new();
    let mut block = Block::new();
    build_demo_block(&mut module, &mut block);

    let mut ctx = PrintCtx { print_regs: false };
    print!("// Before RA/spilling:\n{}", wrap_main(&ctx, &module, &block));

    debug!("allocating demo block with reg_limit={reg_limit}");
    tarn_regalloc::allocate(&mut module, &mut block, reg_limit)?;

    ctx.print_regs = true;
    print!("// After RA/spilling:\n{}", wrap_main(&ctx, &module, &block));
    Ok(())
}

fn wrap_main(ctx: &PrintCtx, module: &Module, block: &Block) -> String {
    format!(
        "void main()\n{{\n{}}}\n",
        block_to_string(ctx, module, block, 4)
    )
}

fn read_input(module: &mut Module, block: &mut Block, offset: u32, name: &str) -> ValueRef {
    let lit = ValueRef::literal(module.intern_u32(offset));
    ValueRef::inst(block.append1(Opcode::ReadTestInput, TypeKind::A32, lit, Some(name)))
}

fn iadd(block: &mut Block, a: ValueRef, b: ValueRef, name: &str) -> ValueRef {
    ValueRef::inst(block.append2(Opcode::Iadd, TypeKind::A32, a, b, Some(name)))
}

fn write_output(module: &mut Module, block: &mut Block, offset: u32, value: ValueRef) {
    let lit = ValueRef::literal(module.intern_u32(offset));
    block.append2(Opcode::WriteTestOutput, TypeKind::Void, lit, value, None);
}

/// The demo program: enough interleaved additions to force a spill at two
/// registers.
fn build_demo_block(module: &mut Module, block: &mut Block) {
    let x = read_input(module, block, 0, "x");
    let y = read_input(module, block, 4, "y");
    let xy = iadd(block, x, y, "xy");
    let z = read_input(module, block, 8, "z");
    let zy = iadd(block, z, y, "zy");
    write_output(module, block, 0, xy);
    write_output(module, block, 4, zy);
    let w = read_input(module, block, 12, "w");
    let ww = iadd(block, w, w, "ww");
    write_output(module, block, 8, ww);
    block.append(Opcode::Return, TypeKind::Void, 0);
}

fn lex(file: &Path) -> Result<(), Box<dyn Error>> {
    let source = fs::read_to_string(file)?;
    let mut scanner = Scanner::new(&source);
    loop {
        let token = scanner.next_token()?;
        match token.kind {
            TokenKind::Eof => return Ok(()),
            TokenKind::Number { zext, ctype } => {
                println!(
                    "{:>4}: number {} = {} ({:?})",
                    token.line,
                    token.lexeme(&source),
                    zext,
                    ctype
                );
            }
            kind => {
                println!("{:>4}: {:?} {:?}", token.line, kind, token.lexeme(&source));
            }
        }
    }
}
