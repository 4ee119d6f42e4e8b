//! Cycle-accurate ZX Spectrum machine.
//!
//! Wires the Z80 engine to Spectrum memory and ports, the ULA contention
//! table and the frame interrupt. Supports the 48K and the 128K models.
//!
//! The engine is driven by [`Spectrum::execute_cycle`], which runs whole
//! instructions until an [`ExecutionOptions`] stop condition holds. Time is
//! only ever taken from the CPU's tact counter.

mod bus;
mod config;
mod error;
mod keyboard;
mod memory;
mod psg;
mod pulse;
mod spectrum;

pub use bus::SpectrumBus;
pub use config::{MachineConfig, SpectrumModel};
pub use error::{Result, SpectrumError};
pub use keyboard::{KeyboardState, SpectrumKey};
pub use memory::{Memory128K, Memory48K, SpectrumMemory};
pub use psg::PsgRegisters;
pub use pulse::{Pulse, PulseDevice, PulseFrame};
pub use spectrum::{
    EmulationMode, ExecutionCompletionReason, ExecutionOptions, MachineSnapshot, Spectrum,
};
