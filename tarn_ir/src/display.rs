//! Textual printing for tarn IR.
//!
//! Output format (with register printing enabled):
//! ```text
//!     dword xy\r0 = iadd(x\r0, y\r1);
//!     spill(0, xy\r0);
//!     dword xy\r1 = load_spilled(0);
//! ```
//! `\rN` names the assigned register; `\r?` marks an unassigned one.

use std::fmt::{self, Write};

use crate::block::Block;
use crate::instruction::{Instruction, Opcode, Reg};
use crate::module::Module;
use crate::types::TypeKind;
use crate::value::ValueRef;

/// Printing options.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintCtx {
    pub print_regs: bool,
}

fn write_reg(out: &mut impl Write, reg: Option<Reg>) -> fmt::Result {
    match reg {
        Some(r) => write!(out, "\\r{}", r.0),
        None => out.write_str("\\r?"),
    }
}

fn write_value(out: &mut impl Write, module: &Module, block: &Block, v: ValueRef) -> fmt::Result {
    if let Some(lit) = v.as_literal() {
        let lit = module.literal(lit);
        match lit.ty {
            TypeKind::Void => unreachable!("void literal"),
            TypeKind::Bool => {
                debug_assert!(lit.zext < 2);
                out.write_str(if lit.zext != 0 { "true" } else { "false" })
            }
            // i32 is the common case, so it prints bare: `0`, not `0_i32`.
            TypeKind::A32 => write!(out, "{}", lit.zext as u32 as i32),
        }
    } else {
        let inst = block.inst(v.as_inst().expect("value is literal or instruction"));
        out.write_str(inst.name())
    }
}

/// Write one instruction line, indented, terminated by `;\n`.
fn write_inst(
    out: &mut impl Write,
    ctx: &PrintCtx,
    module: &Module,
    block: &Block,
    inst: &Instruction,
    indent: usize,
) -> fmt::Result {
    for _ in 0..indent {
        out.write_char(' ')?;
    }
    if inst.ty != TypeKind::Void {
        write!(out, "{} {}", inst.ty.keyword(), inst.name())?;
        if ctx.print_regs {
            write_reg(out, inst.ra.dst_reg)?;
        }
        out.write_str(" = ")?;
    }
    out.write_str(inst.opcode.mnemonic())?;
    if !(inst.opcode == Opcode::Return && inst.operand_count == 0) {
        out.write_char('(')?;
        for i in 0..inst.operand_count as usize {
            if i != 0 {
                out.write_str(", ")?;
            }
            let operand = inst.operand(i);
            write_value(out, module, block, operand)?;
            if ctx.print_regs && !operand.is_literal() {
                debug_assert!(
                    block.inst(operand.as_inst().expect("runtime operand")).ty != TypeKind::Void
                );
                write_reg(out, inst.ra.src_regs[i])?;
            }
        }
        out.write_char(')')?;
    }
    out.write_str(";\n")
}

/// Write every instruction of the block in program order.
pub fn write_block(
    out: &mut impl Write,
    ctx: &PrintCtx,
    module: &Module,
    block: &Block,
    indent: usize,
) -> fmt::Result {
    for &iref in block.seq() {
        write_inst(out, ctx, module, block, block.inst(iref), indent)?;
    }
    Ok(())
}

/// The printed block as a String.
pub fn block_to_string(ctx: &PrintCtx, module: &Module, block: &Block, indent: usize) -> String {
    let mut s = String::new();
    write_block(&mut s, ctx, module, block, indent).expect("writing to a String cannot fail");
    s
}
