//! Instruction definitions and per-instruction register-allocation state.

use std::fmt;

use crate::types::TypeKind;
use crate::value::{Use, ValueRef};

/// Operand slots per instruction.
pub const MAX_OPERANDS: usize = 3;

/// A physical register index. Bounded by 32: the allocator's free set is a
/// u32 bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(pub u8);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A spill-slot index. Bounded by 32 for the same reason as [`Reg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpillSlot(pub u8);

impl fmt::Display for SpillSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Registers chosen by allocation: one for the result, one per operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegAllocState {
    pub dst_reg: Option<Reg>,
    pub src_regs: [Option<Reg>; MAX_OPERANDS],
}

/// Instruction opcodes.
///
/// `Spill` and `LoadSpilled` are pseudo-instructions emitted by the
/// register allocator; they have no source-language counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    ReadTestInput,
    WriteTestOutput,
    Spill,
    LoadSpilled,
    Return,
    Iadd,
}

impl Opcode {
    /// Mnemonic used by the textual printer.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::ReadTestInput => "read_test_input",
            Opcode::WriteTestOutput => "write_test_output",
            Opcode::Spill => "spill",
            Opcode::LoadSpilled => "load_spilled",
            Opcode::Return => "return",
            Opcode::Iadd => "iadd",
        }
    }
}

/// An instruction: a runtime value defined in a block.
///
/// `uses` threads every consumer back to this definition. `use_cursor`,
/// `current_reg`, and `spill_slot` are working state owned by the register
/// allocator; they are all-unset before a block is allocated.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub ty: TypeKind,
    pub operand_count: u32,
    /// Operands in slot order. Filled operand-by-operand during
    /// construction; never rewritten afterwards.
    pub operands: [Option<ValueRef>; MAX_OPERANDS],
    /// Every (consumer, slot) that reads this result, in program order.
    pub uses: Vec<Use>,
    /// Index of the next unconsumed entry in `uses`.
    pub use_cursor: u32,
    pub current_reg: Option<Reg>,
    pub spill_slot: Option<SpillSlot>,
    pub ra: RegAllocState,
    pub debug_name: Option<String>,
}

impl Instruction {
    pub fn new(opcode: Opcode, ty: TypeKind, operand_count: u32) -> Self {
        debug_assert!(operand_count as usize <= MAX_OPERANDS);
        Self {
            opcode,
            ty,
            operand_count,
            operands: [None; MAX_OPERANDS],
            uses: Vec::new(),
            use_cursor: 0,
            current_reg: None,
            spill_slot: None,
            ra: RegAllocState::default(),
            debug_name: None,
        }
    }

    /// Operand at slot `i`. The slot must have been set.
    pub fn operand(&self, i: usize) -> ValueRef {
        debug_assert!(i < self.operand_count as usize);
        self.operands[i].expect("operand slot is unset")
    }

    /// Debug name for printing and logging.
    pub fn name(&self) -> &str {
        self.debug_name.as_deref().unwrap_or("?")
    }
}
