//! CPU signal state and decode modes.

use bitflags::bitflags;

bitflags! {
    /// Pending signals and the halt latch.
    ///
    /// Owners:
    /// - `RESET`: set by [`Cpu::set_reset_signal`](emu_core::Cpu::set_reset_signal),
    ///   cleared by the engine when it performs the reset.
    /// - `INT`: set only by an interrupt source through
    ///   [`Cpu::raise_interrupt`](emu_core::Cpu::raise_interrupt); cleared only
    ///   by the engine, either on acknowledge or when the source revokes it.
    /// - `NMI`: set by [`Cpu::request_nmi`](emu_core::Cpu::request_nmi), cleared
    ///   by the engine when the NMI is serviced.
    /// - `HALTED`: set and cleared by the engine alone.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StateFlags: u8 {
        const INT = 0x01;
        const NMI = 0x02;
        const RESET = 0x04;
        const HALTED = 0x08;
    }
}

/// Opcode table selected by a `0xCB` or `0xED` lead byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrefixMode {
    #[default]
    None,
    /// `0xED`
    Extended,
    /// `0xCB`
    Bit,
}

/// Index register substituted for HL by a `0xDD` or `0xFD` lead byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexMode {
    #[default]
    None,
    /// `0xDD`
    Ix,
    /// `0xFD`
    Iy,
}

impl PrefixMode {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PrefixMode::None => "none",
            PrefixMode::Extended => "extended",
            PrefixMode::Bit => "bit",
        }
    }
}

impl IndexMode {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            IndexMode::None => "none",
            IndexMode::Ix => "ix",
            IndexMode::Iy => "iy",
        }
    }
}
