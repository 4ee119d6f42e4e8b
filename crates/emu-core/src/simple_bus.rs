//! A flat 64 KiB RAM bus for tests and tools.

use crate::{MemoryDevice, PortDevice, ReadResult, Tacts};

/// Flat 64 KiB RAM with an optional fixed contention window.
///
/// Port reads return a programmable value (default `0xFF`). Port writes are
/// recorded with the tact at which they started.
pub struct SimpleBus {
    memory: Box<[u8; 0x1_0000]>,
    contended: Option<(core::ops::RangeInclusive<u16>, u8)>,
    port_input: u8,
    port_writes: Vec<(u16, u8, Tacts)>,
    memory_accesses: Vec<(u16, Tacts)>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: Box::new([0; 0x1_0000]),
            contended: None,
            port_input: 0xFF,
            port_writes: Vec::new(),
            memory_accesses: Vec::new(),
        }
    }

    /// Copy `data` into memory starting at `address` (wrapping at 64K).
    pub fn load(&mut self, address: u16, data: &[u8]) {
        let mut addr = address;
        for &byte in data {
            self.memory[usize::from(addr)] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    /// Charge `wait` extra tacts for every memory access inside `range`.
    pub fn set_contention(&mut self, range: core::ops::RangeInclusive<u16>, wait: u8) {
        self.contended = Some((range, wait));
    }

    /// Value returned by every port read.
    pub fn set_port_input(&mut self, value: u8) {
        self.port_input = value;
    }

    /// Port writes so far: `(port, value, start tact)`.
    #[must_use]
    pub fn port_writes(&self) -> &[(u16, u8, Tacts)] {
        &self.port_writes
    }

    /// Memory accesses so far: `(address, start tact)`.
    #[must_use]
    pub fn memory_accesses(&self) -> &[(u16, Tacts)] {
        &self.memory_accesses
    }

    fn wait_for(&self, address: u16) -> u8 {
        match &self.contended {
            Some((range, wait)) if range.contains(&address) => *wait,
            _ => 0,
        }
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDevice for SimpleBus {
    fn read_memory(&mut self, address: u16, tact: Tacts) -> ReadResult {
        self.memory_accesses.push((address, tact));
        ReadResult::with_wait(self.memory[usize::from(address)], self.wait_for(address))
    }

    fn write_memory(&mut self, address: u16, value: u8, tact: Tacts) -> u8 {
        self.memory_accesses.push((address, tact));
        self.memory[usize::from(address)] = value;
        self.wait_for(address)
    }

    fn peek(&self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }
}

impl PortDevice for SimpleBus {
    fn read_port(&mut self, _port: u16, _tact: Tacts) -> ReadResult {
        ReadResult::new(self.port_input)
    }

    fn write_port(&mut self, port: u16, value: u8, tact: Tacts) -> u8 {
        self.port_writes.push((port, value, tact));
        0
    }
}
