//! Sound-chip register file (128K models).
//!
//! Only the register side of the chip lives here: select, write, read, and
//! the tact of the last write to each register. Tone generation is left to
//! whoever consumes the register history.

use serde::{Deserialize, Serialize};

/// Writable bits of each register. Unused bits read back as 0.
const REGISTER_MASKS: [u8; 16] = [
    0xFF, 0x0F, 0xFF, 0x0F, 0xFF, 0x0F, 0x3F, 0x7F, 0x1F, 0x1F, 0x1F, 0xFF, 0xFF, 0x0F, 0xFF,
    0xFF,
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsgRegisters {
    selected: u8,
    registers: [u8; 16],
    /// Absolute tact of the last write to each register.
    modified: [u64; 16],
}

impl PsgRegisters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Port $FFFD write. Only the low four bits select.
    pub fn select(&mut self, register: u8) {
        self.selected = register & 0x0F;
    }

    /// Port $BFFD write.
    pub fn write(&mut self, value: u8, tact: u64) {
        let index = usize::from(self.selected);
        self.registers[index] = value & REGISTER_MASKS[index];
        self.modified[index] = tact;
    }

    /// Port $FFFD read.
    #[must_use]
    pub fn read(&self) -> u8 {
        self.registers[usize::from(self.selected)]
    }

    #[must_use]
    pub fn selected(&self) -> u8 {
        self.selected
    }

    #[must_use]
    pub fn register(&self, index: u8) -> u8 {
        self.registers[usize::from(index & 0x0F)]
    }

    #[must_use]
    pub fn modified_tact(&self, index: u8) -> u64 {
        self.modified[usize::from(index & 0x0F)]
    }

    /// 12-bit tone period of channel 0-2.
    #[must_use]
    pub fn tone_period(&self, channel: u8) -> u16 {
        let base = usize::from(channel.min(2)) * 2;
        u16::from(self.registers[base]) | (u16::from(self.registers[base + 1]) << 8)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_masks_unused_bits() {
        let mut psg = PsgRegisters::new();
        psg.select(1);
        psg.write(0xFF, 100);
        assert_eq!(psg.read(), 0x0F);
        assert_eq!(psg.modified_tact(1), 100);

        psg.select(7);
        psg.write(0xFF, 120);
        assert_eq!(psg.read(), 0x7F);
    }

    #[test]
    fn select_uses_low_nibble() {
        let mut psg = PsgRegisters::new();
        psg.select(0x12);
        assert_eq!(psg.selected(), 2);
    }

    #[test]
    fn tone_period_combines_pair() {
        let mut psg = PsgRegisters::new();
        psg.select(2);
        psg.write(0x34, 0);
        psg.select(3);
        psg.write(0x12, 0);
        assert_eq!(psg.tone_period(1), 0x0234);
    }
}
