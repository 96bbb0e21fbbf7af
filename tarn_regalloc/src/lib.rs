//! tarn_regalloc: Local register allocation for tarn IR.
//!
//! Allocation is strictly per-block: one pass walks a block's instruction
//! sequence, places every operand and result in one of K physical
//! registers, and splices spill/reload pseudo-instructions into the stream
//! whenever more than K values would be live at once.

pub mod allocator;

pub use allocator::{MAX_REG_LIMIT, allocate};

use thiserror::Error;

/// Errors reported by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegAllocError {
    /// A single instruction needs more registers than the configured
    /// limit can provide. The block is left untouched.
    #[error("register pressure exceeds limit: an instruction needs {needed} registers, limit is {limit}")]
    PressureExceeded { needed: u32, limit: u32 },
}
