//! Basic-block storage: an instruction arena plus a program-order sequence.

use crate::instruction::{Instruction, Opcode};
use crate::types::TypeKind;
use crate::value::{InstRef, Use, ValueRef};

/// A straight-line instruction sequence.
///
/// Instructions live in an arena indexed by [`InstRef`]; `seq` holds program
/// order. The two agree until a pass (register allocation) splices
/// pseudo-instructions into a rewritten sequence. Instructions are never
/// removed from the arena, so references stay valid across rewrites.
#[derive(Debug, Default)]
pub struct Block {
    insts: Vec<Instruction>,
    seq: Vec<InstRef>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new instruction with unset operands. The caller must fill
    /// every operand slot before the block is allocated.
    pub fn append(&mut self, opcode: Opcode, ty: TypeKind, operand_count: u32) -> InstRef {
        debug_assert_eq!(self.insts.len(), self.seq.len(), "append after rewrite");
        let r = self.alloc_inst(Instruction::new(opcode, ty, operand_count));
        self.seq.push(r);
        r
    }

    /// [`Block::append`] plus one operand and a debug name.
    pub fn append1(
        &mut self,
        opcode: Opcode,
        ty: TypeKind,
        src: ValueRef,
        name: Option<&str>,
    ) -> InstRef {
        let r = self.append(opcode, ty, 1);
        self.insts[r.index() as usize].debug_name = name.map(String::from);
        self.set_operand(r, 0, src);
        r
    }

    /// [`Block::append`] plus two operands and a debug name.
    pub fn append2(
        &mut self,
        opcode: Opcode,
        ty: TypeKind,
        a: ValueRef,
        b: ValueRef,
        name: Option<&str>,
    ) -> InstRef {
        let r = self.append(opcode, ty, 2);
        self.insts[r.index() as usize].debug_name = name.map(String::from);
        self.set_operand(r, 0, a);
        self.set_operand(r, 1, b);
        r
    }

    /// Write operand slot `i`. Slots are write-once; setting one also
    /// records a use on the producing instruction. Misuse is a programmer
    /// bug and aborts.
    pub fn set_operand(&mut self, inst: InstRef, i: u32, value: ValueRef) {
        let instr = &self.insts[inst.index() as usize];
        assert!(i < instr.operand_count, "operand index out of range");
        assert!(instr.operands[i as usize].is_none(), "operand set twice");
        if let Some(def) = value.as_inst() {
            debug_assert!(def != inst, "instruction cannot use its own result");
            self.insts[def.index() as usize].uses.push(Use {
                consumer: inst,
                operand_index: i,
            });
        }
        self.insts[inst.index() as usize].operands[i as usize] = Some(value);
    }

    /// Allocate an instruction in the arena without adding it to the
    /// program sequence. Use-list bookkeeping is the caller's concern; the
    /// register allocator uses this for spill/reload pseudo-instructions.
    pub fn alloc_inst(&mut self, inst: Instruction) -> InstRef {
        let r = InstRef(self.insts.len() as u32);
        self.insts.push(inst);
        r
    }

    /// Replace the program-order sequence with a rewritten one.
    pub fn replace_seq(&mut self, seq: Vec<InstRef>) {
        self.seq = seq;
    }

    pub fn inst(&self, r: InstRef) -> &Instruction {
        &self.insts[r.index() as usize]
    }

    pub fn inst_mut(&mut self, r: InstRef) -> &mut Instruction {
        &mut self.insts[r.index() as usize]
    }

    /// Program-order instruction sequence.
    pub fn seq(&self) -> &[InstRef] {
        &self.seq
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}
