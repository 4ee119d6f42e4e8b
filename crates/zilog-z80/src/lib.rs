//! Tact-accurate Z80 CPU engine.
//!
//! Each call to [`Z80::execute_cpu_cycle`] runs one whole instruction (or
//! services one pending signal) and advances the tact counter by exactly the
//! documented T-state count plus any wait states the bus reports.

mod alu;
mod cpu;
mod flags;
mod registers;
mod state;

pub use alu::{AluOp, AluResult, ShiftOp};
pub use cpu::{Z80, Z80State};
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity, sz53, sz53p};
pub use registers::Registers;
pub use state::{IndexMode, PrefixMode, StateFlags};

/// Pure flag computations, exposed for table-driven verification.
pub mod flag_unit {
    pub use crate::alu::{
        adc16, add16, add8, and8, bit, block_io_flags, cp8, daa, dec8, inc8, logic_flags, or8,
        rotate_accumulator, sbc16, sub8, xor8,
    };
}
