//! Core device contracts and types for tact-accurate emulation.
//!
//! The CPU engine owns the tact counter. Every other component learns "when"
//! from the tact value it is handed, never from a clock of its own.

mod clock;
mod cpu;
mod device;
mod observable;
mod simple_bus;
mod tacts;

pub use clock::MasterClock;
pub use cpu::Cpu;
pub use device::{Bus, MemoryDevice, PortDevice, ReadResult};
pub use observable::{Observable, Value};
pub use simple_bus::SimpleBus;
pub use tacts::Tacts;
