//! Spectrum memory devices.
//!
//! The trait hides banking and contention differences so the bus only asks
//! "what is here" and "is this page contended".

use crate::error::{Result, SpectrumError};

/// Memory interface for the supported models.
pub trait SpectrumMemory {
    /// Read a byte through the current paging.
    fn read(&self, addr: u16) -> u8;

    /// Write a byte. ROM writes are silently ignored.
    fn write(&mut self, addr: u16, val: u8);

    /// Copy bytes in through the current paging, ROM included.
    fn load(&mut self, addr: u16, data: &[u8]);

    /// Is this address in a contended page under the current paging?
    fn contended_page(&self, addr: u16) -> bool;

    /// Write the paging register ($7FFD). No-op on 48K.
    fn write_bank_register(&mut self, _value: u8) {}

    /// Current paging register value. Always 0 on 48K.
    fn bank_register(&self) -> u8 {
        0
    }

    /// RAM bank holding the displayed screen. Always 5 on 48K.
    fn screen_bank(&self) -> u8 {
        5
    }

    /// Undo paging and locking (RAM contents survive).
    fn reset(&mut self) {}

    /// All RAM, in bank order, for snapshots.
    fn ram_image(&self) -> Vec<u8>;

    /// Restore RAM and the paging register from a snapshot.
    fn restore_ram_image(&mut self, image: &[u8], bank_register: u8) -> Result<()>;
}

/// 48K Spectrum memory: one flat 64K buffer.
///
/// Layout:
/// - $0000-$3FFF: ROM (writes ignored)
/// - $4000-$7FFF: Contended RAM (shared with the ULA)
/// - $8000-$FFFF: Uncontended RAM
pub struct Memory48K {
    memory: Box<[u8; 0x1_0000]>,
}

impl Memory48K {
    pub const ROM_SIZE: usize = 0x4000;

    pub fn new(rom: &[u8]) -> Result<Self> {
        if rom.len() != Self::ROM_SIZE {
            return Err(SpectrumError::RomSize { expected: Self::ROM_SIZE, actual: rom.len() });
        }
        let mut memory = Box::new([0u8; 0x1_0000]);
        memory[..Self::ROM_SIZE].copy_from_slice(rom);
        Ok(Self { memory })
    }

    /// The whole address space.
    #[must_use]
    pub fn raw(&self) -> &[u8; 0x1_0000] {
        &self.memory
    }

    /// The whole address space, ROM writable.
    pub fn raw_mut(&mut self) -> &mut [u8; 0x1_0000] {
        &mut self.memory
    }
}

impl SpectrumMemory for Memory48K {
    fn read(&self, addr: u16) -> u8 {
        self.memory[usize::from(addr)]
    }

    fn write(&mut self, addr: u16, val: u8) {
        if addr >= 0x4000 {
            self.memory[usize::from(addr)] = val;
        }
    }

    fn load(&mut self, addr: u16, data: &[u8]) {
        let mut a = addr;
        for &byte in data {
            self.memory[usize::from(a)] = byte;
            a = a.wrapping_add(1);
        }
    }

    fn contended_page(&self, addr: u16) -> bool {
        sinclair_ula::is_contended_page(addr)
    }

    fn ram_image(&self) -> Vec<u8> {
        self.memory[Self::ROM_SIZE..].to_vec()
    }

    fn restore_ram_image(&mut self, image: &[u8], _bank_register: u8) -> Result<()> {
        let ram = &mut self.memory[Self::ROM_SIZE..];
        if image.len() != ram.len() {
            return Err(SpectrumError::RamSize { expected: ram.len(), actual: image.len() });
        }
        ram.copy_from_slice(image);
        Ok(())
    }
}

const BANK_SIZE: usize = 0x4000;

/// 128K Spectrum memory: 2x16K ROM + 8x16K RAM with bank switching.
///
/// Layout:
/// - $0000-$3FFF: ROM 0 or 1 (bit 4 of $7FFD)
/// - $4000-$7FFF: Always RAM bank 5 (contended)
/// - $8000-$BFFF: Always RAM bank 2
/// - $C000-$FFFF: RAM bank 0-7 (bits 0-2 of $7FFD)
///
/// Bit 3 of $7FFD selects the shadow screen (bank 7). Bit 5 locks the
/// register until reset. Odd banks are contended.
pub struct Memory128K {
    rom: [Box<[u8; BANK_SIZE]>; 2],
    ram: [Box<[u8; BANK_SIZE]>; 8],
    bank_reg: u8,
    locked: bool,
}

impl Memory128K {
    pub const ROM_SIZE: usize = 0x8000;

    /// ROM 0 (128K editor) is the first half of `rom`, ROM 1 (48K BASIC)
    /// the second.
    pub fn new(rom: &[u8]) -> Result<Self> {
        if rom.len() != Self::ROM_SIZE {
            return Err(SpectrumError::RomSize { expected: Self::ROM_SIZE, actual: rom.len() });
        }
        let mut memory = Self {
            rom: std::array::from_fn(|_| Box::new([0u8; BANK_SIZE])),
            ram: std::array::from_fn(|_| Box::new([0u8; BANK_SIZE])),
            bank_reg: 0,
            locked: false,
        };
        memory.rom[0].copy_from_slice(&rom[..BANK_SIZE]);
        memory.rom[1].copy_from_slice(&rom[BANK_SIZE..]);
        Ok(memory)
    }

    fn rom_bank(&self) -> usize {
        usize::from((self.bank_reg >> 4) & 1)
    }

    fn paged_bank(&self) -> usize {
        usize::from(self.bank_reg & 0x07)
    }

    /// One RAM bank, for inspection.
    #[must_use]
    pub fn bank(&self, bank: usize) -> &[u8] {
        &self.ram[bank & 7][..]
    }

    /// Split an address into (page slot, offset).
    fn slot(addr: u16) -> (u16, usize) {
        (addr >> 14, usize::from(addr) & (BANK_SIZE - 1))
    }
}

impl SpectrumMemory for Memory128K {
    fn read(&self, addr: u16) -> u8 {
        let (slot, offset) = Self::slot(addr);
        match slot {
            0 => self.rom[self.rom_bank()][offset],
            1 => self.ram[5][offset],
            2 => self.ram[2][offset],
            _ => self.ram[self.paged_bank()][offset],
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        let (slot, offset) = Self::slot(addr);
        match slot {
            0 => {}
            1 => self.ram[5][offset] = val,
            2 => self.ram[2][offset] = val,
            _ => {
                let bank = self.paged_bank();
                self.ram[bank][offset] = val;
            }
        }
    }

    fn load(&mut self, addr: u16, data: &[u8]) {
        let mut a = addr;
        for &byte in data {
            if a < 0x4000 {
                let bank = self.rom_bank();
                self.rom[bank][usize::from(a)] = byte;
            } else {
                self.write(a, byte);
            }
            a = a.wrapping_add(1);
        }
    }

    fn contended_page(&self, addr: u16) -> bool {
        match addr >> 14 {
            1 => true,
            3 => self.paged_bank() & 1 != 0,
            _ => false,
        }
    }

    fn write_bank_register(&mut self, value: u8) {
        if !self.locked {
            self.bank_reg = value;
            self.locked = value & 0x20 != 0;
        }
    }

    fn bank_register(&self) -> u8 {
        self.bank_reg
    }

    fn screen_bank(&self) -> u8 {
        if self.bank_reg & 0x08 != 0 { 7 } else { 5 }
    }

    fn reset(&mut self) {
        self.bank_reg = 0;
        self.locked = false;
    }

    fn ram_image(&self) -> Vec<u8> {
        self.ram.iter().flat_map(|bank| bank.iter().copied()).collect()
    }

    fn restore_ram_image(&mut self, image: &[u8], bank_register: u8) -> Result<()> {
        if image.len() != 8 * BANK_SIZE {
            return Err(SpectrumError::RamSize { expected: 8 * BANK_SIZE, actual: image.len() });
        }
        for (bank, chunk) in self.ram.iter_mut().zip(image.chunks_exact(BANK_SIZE)) {
            bank.copy_from_slice(chunk);
        }
        self.bank_reg = bank_register;
        self.locked = bank_register & 0x20 != 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x4000];
        rom[0] = 0xF3; // DI
        rom[1] = 0xAF; // XOR A
        rom[0x3FFF] = 0x42;
        rom
    }

    fn make_128k_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0] = 0x01;
        rom[0x4000] = 0x02;
        rom
    }

    #[test]
    fn read_rom() {
        let mem = Memory48K::new(&make_rom()).unwrap();
        assert_eq!(mem.read(0x0000), 0xF3);
        assert_eq!(mem.read(0x3FFF), 0x42);
    }

    #[test]
    fn rom_writes_ignored_but_load_bypasses() {
        let mut mem = Memory48K::new(&make_rom()).unwrap();
        mem.write(0x0000, 0x00);
        assert_eq!(mem.read(0x0000), 0xF3);
        mem.load(0x0000, &[0x76]);
        assert_eq!(mem.read(0x0000), 0x76);
        assert_eq!(mem.raw()[0], 0x76);
    }

    #[test]
    fn contended_page_48k() {
        let mem = Memory48K::new(&make_rom()).unwrap();
        assert!(!mem.contended_page(0x3FFF));
        assert!(mem.contended_page(0x4000));
        assert!(mem.contended_page(0x7FFF));
        assert!(!mem.contended_page(0x8000));
    }

    #[test]
    fn wrong_rom_size_is_an_error() {
        let err = Memory48K::new(&[0; 1024]).err();
        assert!(matches!(err, Some(SpectrumError::RomSize { expected: 0x4000, actual: 1024 })));
        assert!(Memory128K::new(&make_rom()).is_err());
    }

    #[test]
    fn ram_image_round_trip_48k() {
        let mut mem = Memory48K::new(&make_rom()).unwrap();
        mem.write(0x8000, 0x99);
        let image = mem.ram_image();
        assert_eq!(image.len(), 0xC000);

        let mut other = Memory48K::new(&make_rom()).unwrap();
        other.restore_ram_image(&image, 0).unwrap();
        assert_eq!(other.read(0x8000), 0x99);
        assert!(other.restore_ram_image(&image[1..], 0).is_err());
    }

    #[test]
    fn rom_select_128k() {
        let mut mem = Memory128K::new(&make_128k_rom()).unwrap();
        assert_eq!(mem.read(0x0000), 0x01);
        mem.write_bank_register(0x10);
        assert_eq!(mem.read(0x0000), 0x02);
    }

    #[test]
    fn bank_switching_128k() {
        let mut mem = Memory128K::new(&make_128k_rom()).unwrap();
        mem.write(0xC000, 0xAA); // bank 0
        mem.write_bank_register(0x03);
        assert_eq!(mem.read(0xC000), 0x00);
        mem.write(0xC000, 0xBB); // bank 3
        mem.write_bank_register(0x00);
        assert_eq!(mem.read(0xC000), 0xAA);
        assert_eq!(mem.bank(3)[0], 0xBB);
    }

    #[test]
    fn fixed_banks_128k() {
        let mut mem = Memory128K::new(&make_128k_rom()).unwrap();
        mem.write(0x4000, 0x55);
        mem.write(0x8000, 0x66);
        assert_eq!(mem.bank(5)[0], 0x55);
        assert_eq!(mem.bank(2)[0], 0x66);
        mem.write_bank_register(0x05);
        assert_eq!(mem.read(0xC000), 0x55, "bank 5 also visible at $C000");
    }

    #[test]
    fn lock_bit_holds_until_reset() {
        let mut mem = Memory128K::new(&make_128k_rom()).unwrap();
        mem.write_bank_register(0x21);
        mem.write_bank_register(0x04);
        assert_eq!(mem.bank_register(), 0x21);
        mem.reset();
        mem.write_bank_register(0x04);
        assert_eq!(mem.bank_register(), 0x04);
    }

    #[test]
    fn odd_banks_are_contended() {
        let mut mem = Memory128K::new(&make_128k_rom()).unwrap();
        assert!(mem.contended_page(0x4000));
        assert!(!mem.contended_page(0x8000));
        assert!(!mem.contended_page(0xC000));
        mem.write_bank_register(0x07);
        assert!(mem.contended_page(0xC000));
    }

    #[test]
    fn shadow_screen_bit() {
        let mut mem = Memory128K::new(&make_128k_rom()).unwrap();
        assert_eq!(mem.screen_bank(), 5);
        mem.write_bank_register(0x08);
        assert_eq!(mem.screen_bank(), 7);
    }
}
