//! Memory and port device contracts.
//!
//! The CPU engine never touches raw memory. Every access goes through one of
//! these traits together with the tact at which the access starts, so the
//! device can consult its contention model before the data is used.

use crate::Tacts;

/// Result of a device read: the data byte and any wait states incurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    /// The byte read.
    pub data: u8,
    /// Extra tacts the access cost on top of its base timing.
    pub wait: u8,
}

impl ReadResult {
    /// A read with no wait states.
    #[must_use]
    pub const fn new(data: u8) -> Self {
        Self { data, wait: 0 }
    }

    /// A read delayed by `wait` contention tacts.
    #[must_use]
    pub const fn with_wait(data: u8, wait: u8) -> Self {
        Self { data, wait }
    }
}

/// Byte-addressable memory as seen by the CPU.
pub trait MemoryDevice {
    /// Read a byte. `tact` is the access-start time used for contention.
    fn read_memory(&mut self, address: u16, tact: Tacts) -> ReadResult;

    /// Write a byte, returning the contention wait states incurred.
    ///
    /// Writes to read-only regions are accepted and silently dropped.
    fn write_memory(&mut self, address: u16, value: u8, tact: Tacts) -> u8;

    /// Read a byte without side effects or contention (debuggers, snapshots).
    fn peek(&self, address: u16) -> u8;
}

/// Byte-addressable I/O space as seen by the CPU.
///
/// Wait states returned here are in addition to the 4 tacts of the I/O cycle.
pub trait PortDevice {
    /// Read a port. Unhandled ports return `0xFF`.
    fn read_port(&mut self, port: u16, tact: Tacts) -> ReadResult;

    /// Write a port, returning the contention wait states incurred.
    fn write_port(&mut self, port: u16, value: u8, tact: Tacts) -> u8;
}

/// Everything the CPU engine needs: memory plus I/O.
pub trait Bus: MemoryDevice + PortDevice {}

impl<T: MemoryDevice + PortDevice> Bus for T {}
