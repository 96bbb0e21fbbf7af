//! Local (single-block) register allocator with farthest-next-use eviction.
//!
//! The pass makes one forward walk over the block. For each instruction it
//! places the runtime sources in registers (reloading previously spilled
//! values), retires the uses so dead values release their registers, then
//! allocates the destination. When no register is free it evicts the
//! resident value whose next use lies farthest ahead (Belady's heuristic)
//! and, the first time a value is evicted, stores it to a spill slot.
//!
//! Values defined in a block that does not end with `return` may stay live
//! past the end; the pass is only sound for single-block programs or blocks
//! with empty post-block liveness.

use log::trace;

use tarn_ir::block::Block;
use tarn_ir::instruction::{Instruction, MAX_OPERANDS, Opcode, Reg, SpillSlot};
use tarn_ir::module::Module;
use tarn_ir::types::TypeKind;
use tarn_ir::value::{InstRef, ValueRef};

use crate::RegAllocError;

/// Hard ceiling on the register limit: the free-register and occupied-slot
/// sets are u32 bitsets.
pub const MAX_REG_LIMIT: u32 = 32;

/// Working state for one allocation run.
struct AllocCtx {
    reg_limit: u32,
    /// Bit r set = register r is free. Masked to `reg_limit` bits.
    free_regs: u32,
    /// Reverse map of `current_reg`: which value each register holds.
    values_in_reg: [Option<InstRef>; MAX_REG_LIMIT as usize],
    /// Bit s set = spill slot s holds a live spilled value.
    occupied_spills: u32,
    /// Debug label per slot, so reloads inherit the spilled value's name.
    spill_names: Vec<Option<String>>,
    /// The rewritten sequence under construction.
    out: Vec<InstRef>,
}

/// Rewrite `block` so that every operand and result has a register in
/// `[0, register_limit)`, inserting spill/reload pseudo-instructions as
/// needed. Original instructions keep their relative order.
///
/// Fails with [`RegAllocError::PressureExceeded`] before mutating anything
/// when some instruction alone needs more registers than the limit.
pub fn allocate(
    module: &mut Module,
    block: &mut Block,
    register_limit: u32,
) -> Result<(), RegAllocError> {
    assert!(
        register_limit <= MAX_REG_LIMIT,
        "register limit capped at {MAX_REG_LIMIT}"
    );

    check_pressure(block, register_limit)?;
    if block.is_empty() {
        return Ok(());
    }

    let orig_seq: Vec<InstRef> = block.seq().to_vec();
    let mut ctx = AllocCtx {
        reg_limit: register_limit,
        free_regs: u32::MAX >> (32 - register_limit),
        values_in_reg: [None; MAX_REG_LIMIT as usize],
        occupied_spills: 0,
        spill_names: vec![None; 32],
        out: Vec::with_capacity(orig_seq.len() + orig_seq.len() / 2),
    };

    for (idx, &iref) in orig_seq.iter().enumerate() {
        let idx = idx as u32;
        // Builder-created instructions sit at their program position in the
        // arena, which is what use lists measure distance against.
        debug_assert_eq!(iref.index(), idx);
        debug_assert!(block.inst(iref).ra.dst_reg.is_none(), "block already allocated");

        let operand_count = block.inst(iref).operand_count as usize;
        let operands = block.inst(iref).operands;

        // Place every runtime source in a register.
        let mut unique_srcs: u32 = 0;
        for i in 0..operand_count {
            let v = operands[i].expect("operand slot filled before allocation");
            let Some(src) = v.as_inst() else {
                continue; // literals need no register
            };
            if let Some(j) = (0..i).find(|&j| operands[j] == Some(v)) {
                // Repeat of an earlier operand: reuse its register and
                // consume the extra use entry that names this instruction.
                let reg = block.inst(iref).ra.src_regs[j];
                debug_assert_eq!(reg, block.inst(src).current_reg);
                block.inst_mut(iref).ra.src_regs[i] = reg;
                block.inst_mut(src).use_cursor += 1;
                continue;
            }
            unique_srcs |= 1 << i;
            let reg = match block.inst(src).current_reg {
                Some(r) => r,
                None => {
                    trace!("allocating {} src {}", block.inst(iref).name(), i);
                    alloc_reg(&mut ctx, module, block, idx, iref, src)
                }
            };
            block.inst_mut(iref).ra.src_regs[i] = Some(reg);
        }

        // Retire the uses; a source whose last use this was frees its
        // register and its spill slot.
        let mut bits = unique_srcs;
        while bits != 0 {
            let i = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            let src = operands[i]
                .and_then(ValueRef::as_inst)
                .expect("unique sources are runtime values");
            retire_use(&mut ctx, block, iref, i, src);
        }

        // Allocate the destination. Evicting a register that held a source
        // of this instruction is fine here: the spill store is emitted
        // before the instruction, so it reads the value first.
        if block.inst(iref).ty != TypeKind::Void {
            trace!("allocating {} dst", block.inst(iref).name());
            let reg = alloc_reg(&mut ctx, module, block, idx, iref, iref);
            block.inst_mut(iref).ra.dst_reg = Some(reg);
        }

        ctx.out.push(iref);
    }

    if cfg!(debug_assertions)
        && let Some(&last) = orig_seq.last()
        && block.inst(last).opcode == Opcode::Return
    {
        // Nothing may stay live past a return.
        for &iref in &orig_seq {
            let inst = block.inst(iref);
            debug_assert_eq!(
                inst.use_cursor as usize,
                inst.uses.len(),
                "value {} live past return",
                inst.name()
            );
        }
    }

    block.replace_seq(ctx.out);
    Ok(())
}

/// Reject limits that some single instruction can never fit into. Runs
/// before any mutation so a failed allocation leaves the block untouched.
fn check_pressure(block: &Block, limit: u32) -> Result<(), RegAllocError> {
    let mut needed_max = 0u32;
    for &iref in block.seq() {
        let inst = block.inst(iref);
        let mut uniques: [Option<ValueRef>; MAX_OPERANDS] = [None; MAX_OPERANDS];
        let mut count = 0u32;
        for i in 0..inst.operand_count as usize {
            let v = inst.operand(i);
            if v.is_literal() || uniques.contains(&Some(v)) {
                continue;
            }
            uniques[count as usize] = Some(v);
            count += 1;
        }
        let needs_dst = inst.ty != TypeKind::Void;
        needed_max = needed_max.max(count.max(needs_dst as u32));
    }
    if limit == 0 && !block.is_empty() {
        needed_max = needed_max.max(1);
    }
    if needed_max > limit {
        return Err(RegAllocError::PressureExceeded {
            needed: needed_max,
            limit,
        });
    }
    Ok(())
}

/// A source register was consumed by `inst`; advance the value's cursor
/// and release the register (and spill slot) on the last use.
fn retire_use(ctx: &mut AllocCtx, block: &mut Block, inst: InstRef, operand_index: usize, src: InstRef) {
    let reg = block.inst(inst).ra.src_regs[operand_index].expect("source register assigned");
    let s = block.inst_mut(src);
    debug_assert_eq!(s.current_reg, Some(reg));
    debug_assert!(ctx.free_regs & (1 << reg.0) == 0, "in-use register marked free");
    debug_assert!((s.use_cursor as usize) < s.uses.len());

    s.use_cursor += 1;
    if s.use_cursor as usize == s.uses.len() {
        s.current_reg = None;
        if let Some(slot) = s.spill_slot.take() {
            // Last use: the slot's contents are dead, so it can be reused
            // by a later eviction within this block.
            ctx.occupied_spills &= !(1u32 << slot.0);
            ctx.spill_names[slot.0 as usize] = None;
        }
        trace!("{} dead, freeing {}", block.inst(src).name(), reg);
        ctx.values_in_reg[reg.0 as usize] = None;
        ctx.free_regs |= 1 << reg.0;
    }
}

/// Give `value` a register, spilling the farthest-used resident value if
/// none is free, and reloading `value` first if it was spilled earlier.
/// `value` is either a source of `owner` or `owner` itself (the
/// destination case).
fn alloc_reg(
    ctx: &mut AllocCtx,
    module: &mut Module,
    block: &mut Block,
    idx: u32,
    owner: InstRef,
    value: InstRef,
) -> Reg {
    debug_assert!(block.inst(value).current_reg.is_none());

    let reg = if ctx.free_regs == 0 {
        evict_farthest(ctx, module, block, idx, owner, value)
    } else {
        let r = Reg(ctx.free_regs.trailing_zeros() as u8);
        debug_assert!(ctx.values_in_reg[r.0 as usize].is_none());
        ctx.free_regs &= !(1u32 << r.0);
        r
    };

    if let Some(slot) = block.inst(value).spill_slot {
        // Previously spilled source: reload it in front of the consumer.
        debug_assert!(owner != value, "a value being defined cannot also reload");
        emit_reload(ctx, module, block, slot, reg);
    }

    block.inst_mut(value).current_reg = Some(reg);
    ctx.values_in_reg[reg.0 as usize] = Some(value);
    reg
}

/// No register is free: pick the resident value whose next use is farthest
/// from `idx`, spill it (once per value per block), and hand over its
/// register.
fn evict_farthest(
    ctx: &mut AllocCtx,
    module: &mut Module,
    block: &mut Block,
    idx: u32,
    owner: InstRef,
    value: InstRef,
) -> Reg {
    let mut farthest_dist = 0u32;
    let mut farthest_reg: Option<Reg> = None;

    let occupied = ctx.free_regs ^ (u32::MAX >> (32 - ctx.reg_limit));
    let mut bits = occupied;
    while bits != 0 {
        let r = bits.trailing_zeros();
        bits &= bits - 1;
        let resident = ctx.values_in_reg[r as usize].expect("occupied register holds a value");
        let inst = block.inst(resident);
        debug_assert!(inst.use_cursor as usize <= inst.uses.len());

        // While sources of the current instruction are being placed, their
        // cursor still names the current instruction, giving distance zero.
        // That keeps already-placed sources from ever being the farthest.
        let next_use = if inst.use_cursor as usize == inst.uses.len() {
            u32::MAX
        } else {
            inst.uses[inst.use_cursor as usize].consumer.index()
        };
        debug_assert!(next_use >= idx);
        let dist = next_use - idx;
        if dist > farthest_dist {
            farthest_dist = dist;
            farthest_reg = Some(Reg(r as u8));
        }
    }

    let reg = farthest_reg
        .expect("pressure pre-check guarantees a victim whose next use is past this instruction");
    if owner != value {
        debug_assert!(
            block.inst(owner).ra.src_regs.iter().all(|&s| s != Some(reg)),
            "evicted a register holding a source of the current instruction"
        );
    }

    let victim = ctx.values_in_reg[reg.0 as usize].expect("occupied register holds a value");
    block.inst_mut(victim).current_reg = None;
    // Within a basic block a value only needs to be stored once; later
    // evictions of the same value find the slot still recorded.
    if block.inst(victim).spill_slot.is_none() {
        let free_slots = !ctx.occupied_spills;
        assert!(free_slots != 0, "out of spill slots");
        let slot = SpillSlot(free_slots.trailing_zeros() as u8);
        ctx.occupied_spills |= 1u32 << slot.0;
        block.inst_mut(victim).spill_slot = Some(slot);
        ctx.spill_names[slot.0 as usize] = block.inst(victim).debug_name.clone();
        trace!("spilling {} from {} to slot {}", block.inst(victim).name(), reg, slot.0);
        emit_spill(ctx, module, block, victim, slot, reg);
    }
    reg
}

/// Emit `spill(slot, victim)` into the rewritten stream. Pseudo-
/// instructions skip use-list bookkeeping; downstream passes must not rely
/// on their use lists.
fn emit_spill(
    ctx: &mut AllocCtx,
    module: &mut Module,
    block: &mut Block,
    victim: InstRef,
    slot: SpillSlot,
    reg: Reg,
) {
    let slot_lit = module.intern_u32(slot.0 as u32);
    let mut inst = Instruction::new(Opcode::Spill, TypeKind::Void, 2);
    inst.operands[0] = Some(ValueRef::literal(slot_lit));
    inst.operands[1] = Some(ValueRef::inst(victim));
    inst.ra.src_regs[1] = Some(reg);
    let r = block.alloc_inst(inst);
    ctx.out.push(r);
}

/// Emit `name = load_spilled(slot)` into the rewritten stream, carrying
/// the slot so later reloads of the same value still resolve.
fn emit_reload(ctx: &mut AllocCtx, module: &mut Module, block: &mut Block, slot: SpillSlot, reg: Reg) {
    let slot_lit = module.intern_u32(slot.0 as u32);
    let mut inst = Instruction::new(Opcode::LoadSpilled, TypeKind::A32, 1);
    inst.operands[0] = Some(ValueRef::literal(slot_lit));
    inst.debug_name = ctx.spill_names[slot.0 as usize].clone();
    inst.spill_slot = Some(slot);
    inst.ra.dst_reg = Some(reg);
    let r = block.alloc_inst(inst);
    ctx.out.push(r);
}
