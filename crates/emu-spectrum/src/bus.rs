//! Spectrum bus: memory and I/O routing.
//!
//! The bus connects the Z80 to memory, keyboard, border, beeper and MIC,
//! and (on 128K) the paging register and sound-chip registers.
//!
//! # Contention
//!
//! Every access is charged against the precomputed ULA table at the tact it
//! starts. The bus converts the CPU's absolute tact into a frame tact with
//! the frame start the machine engine hands it, so the table never needs to
//! know about absolute time.

use emu_core::{MemoryDevice, PortDevice, ReadResult, Tacts};
use sinclair_ula::ContentionTable;

use crate::keyboard::KeyboardState;
use crate::memory::SpectrumMemory;
use crate::psg::PsgRegisters;
use crate::pulse::PulseDevice;

/// The Spectrum bus, implementing `emu_core::MemoryDevice` and
/// `emu_core::PortDevice`.
pub struct SpectrumBus {
    pub memory: Box<dyn SpectrumMemory>,
    contention: ContentionTable,
    /// Absolute tact at which the current frame started.
    frame_start: u64,
    pub keyboard: KeyboardState,
    /// EAR output (bit 4 of $FE).
    pub beeper: PulseDevice,
    /// MIC output (bit 3 of $FE).
    pub mic: PulseDevice,
    /// Sound-chip registers (128K models only).
    pub psg: Option<PsgRegisters>,
    /// Last value written to port $FE.
    last_fe_write: u8,
    /// Tape EAR override: `Some(level)` while a tape signal drives the line,
    /// `None` falls back to MIC loopback.
    tape_ear: Option<bool>,
}

impl SpectrumBus {
    #[must_use]
    pub fn new(memory: Box<dyn SpectrumMemory>, contention: ContentionTable) -> Self {
        Self {
            memory,
            contention,
            frame_start: 0,
            keyboard: KeyboardState::new(),
            beeper: PulseDevice::new(false),
            mic: PulseDevice::new(false),
            psg: None,
            last_fe_write: 0,
            tape_ear: None,
        }
    }

    /// Attach the sound-chip register file (128K models).
    pub fn enable_psg(&mut self) {
        self.psg = Some(PsgRegisters::new());
    }

    /// Tact within the current frame for an absolute CPU tact.
    #[must_use]
    pub fn frame_tact(&self, tact: Tacts) -> u64 {
        tact.since(Tacts(self.frame_start))
    }

    #[must_use]
    pub fn frame_start(&self) -> u64 {
        self.frame_start
    }

    pub fn set_frame_start(&mut self, frame_start: u64) {
        self.frame_start = frame_start;
    }

    #[must_use]
    pub fn border(&self) -> u8 {
        self.last_fe_write & 0x07
    }

    #[must_use]
    pub fn last_fe_write(&self) -> u8 {
        self.last_fe_write
    }

    /// Restore the $FE latch without generating pulse edges.
    pub fn set_last_fe_write(&mut self, value: u8) {
        self.last_fe_write = value;
    }

    #[must_use]
    pub fn tape_ear(&self) -> Option<bool> {
        self.tape_ear
    }

    /// Drive the EAR input from a tape signal, or release it with `None`.
    /// While driven, OUT-generated beeper edges are suppressed and the tape
    /// level is recorded instead.
    pub fn set_tape_ear(&mut self, level: Option<bool>, tact: Tacts) {
        self.tape_ear = level;
        self.beeper.set_tape_mode(level.is_some());
        if let Some(level) = level {
            self.beeper.notify_tape(level, tact.get());
        }
    }

    /// Undo paging and restart the pulse lines at `tact`. RAM survives.
    pub fn reset(&mut self, tact: Tacts) {
        self.memory.reset();
        self.keyboard.release_all();
        self.reset_pulses(tact);
        if let Some(psg) = &mut self.psg {
            psg.reset();
        }
        self.last_fe_write = 0;
        self.tape_ear = None;
        self.frame_start = tact.get();
    }

    /// Drop pending pulses and restart both lines at `tact`.
    pub fn reset_pulses(&mut self, tact: Tacts) {
        self.beeper.reset(tact.get());
        self.mic.reset(tact.get());
    }

    fn io_wait(&self, port: u16, tact: Tacts) -> u8 {
        let ula_port = port & 0x01 == 0;
        let contended_high = self.memory.contended_page(port);
        self.contention.io_contention(ula_port, contended_high, self.frame_tact(tact))
    }

    fn ear_bit(&self) -> u8 {
        match self.tape_ear {
            Some(true) => 0x40,
            Some(false) => 0x00,
            None => (self.last_fe_write & 0x08) << 3,
        }
    }
}

impl MemoryDevice for SpectrumBus {
    fn read_memory(&mut self, address: u16, tact: Tacts) -> ReadResult {
        let wait = self
            .contention
            .memory_contention(self.memory.contended_page(address), self.frame_tact(tact));
        ReadResult::with_wait(self.memory.read(address), wait)
    }

    fn write_memory(&mut self, address: u16, value: u8, tact: Tacts) -> u8 {
        let wait = self
            .contention
            .memory_contention(self.memory.contended_page(address), self.frame_tact(tact));
        self.memory.write(address, value);
        wait
    }

    fn peek(&self, address: u16) -> u8 {
        self.memory.read(address)
    }
}

impl PortDevice for SpectrumBus {
    fn read_port(&mut self, port: u16, tact: Tacts) -> ReadResult {
        let wait = self.io_wait(port, tact);

        let data = if port & 0x01 == 0 {
            // Bits 0-4: keyboard, bit 5 and 7: always 1, bit 6: EAR input.
            let keyboard = self.keyboard.read((port >> 8) as u8) & 0x1F;
            keyboard | 0xA0 | self.ear_bit()
        } else if port & 0xC002 == 0xC000
            && let Some(psg) = &self.psg
        {
            psg.read()
        } else {
            0xFF
        };

        ReadResult::with_wait(data, wait)
    }

    fn write_port(&mut self, port: u16, value: u8, tact: Tacts) -> u8 {
        let wait = self.io_wait(port, tact);
        let ula_port = port & 0x01 == 0;

        if ula_port {
            self.last_fe_write = value;
            self.mic.notify(value & 0x08 != 0, tact.get());
            self.beeper.notify(value & 0x10 != 0, tact.get());
        }

        // $7FFD: bit 1 and bit 15 clear. No-op on 48K.
        if port & 0x8002 == 0x0000 && !ula_port {
            self.memory.write_bank_register(value);
        }

        if let Some(psg) = &mut self.psg {
            match port & 0xC002 {
                0xC000 => psg.select(value),
                0x8000 => psg.write(value, tact.get()),
                _ => {}
            }
        }

        wait
    }
}
