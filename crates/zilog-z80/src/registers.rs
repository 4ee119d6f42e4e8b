//! Z80 register file.
//!
//! Eight-bit halves are the storage; sixteen-bit pairs are views over them,
//! so writing a half is always visible through its pair and vice versa.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

/// The complete Z80 register file, including the shadow set and the
/// internal memory pointer (WZ, also known as MEMPTR).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Registers {
    // Main registers
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    // Shadow registers
    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    // Index registers
    pub ix: u16,
    pub iy: u16,

    pub sp: u16,
    pub pc: u16,

    /// Interrupt vector base.
    pub i: u8,
    /// Memory refresh counter. Bit 7 is only changed by `LD R,A`.
    pub r: u8,

    /// Internal memory pointer. Leaks into the undocumented flag bits of
    /// `BIT n,(HL)` and is updated by most 16-bit addressing instructions.
    pub wz: u16,
}

const fn pair(hi: u8, lo: u8) -> u16 {
    (hi as u16) << 8 | lo as u16
}

impl Registers {
    #[must_use]
    pub const fn af(&self) -> u16 {
        pair(self.a, self.f)
    }

    #[must_use]
    pub const fn bc(&self) -> u16 {
        pair(self.b, self.c)
    }

    #[must_use]
    pub const fn de(&self) -> u16 {
        pair(self.d, self.e)
    }

    #[must_use]
    pub const fn hl(&self) -> u16 {
        pair(self.h, self.l)
    }

    /// The I and R registers as a pair (I high).
    #[must_use]
    pub const fn ir(&self) -> u16 {
        pair(self.i, self.r)
    }

    #[must_use]
    pub const fn af_alt(&self) -> u16 {
        pair(self.a_alt, self.f_alt)
    }

    #[must_use]
    pub const fn bc_alt(&self) -> u16 {
        pair(self.b_alt, self.c_alt)
    }

    #[must_use]
    pub const fn de_alt(&self) -> u16 {
        pair(self.d_alt, self.e_alt)
    }

    #[must_use]
    pub const fn hl_alt(&self) -> u16 {
        pair(self.h_alt, self.l_alt)
    }

    #[must_use]
    pub const fn ixh(&self) -> u8 {
        (self.ix >> 8) as u8
    }

    #[must_use]
    pub const fn ixl(&self) -> u8 {
        self.ix as u8
    }

    #[must_use]
    pub const fn iyh(&self) -> u8 {
        (self.iy >> 8) as u8
    }

    #[must_use]
    pub const fn iyl(&self) -> u8 {
        self.iy as u8
    }

    pub fn set_af(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.f = value as u8;
    }

    pub fn set_bc(&mut self, value: u16) {
        self.b = (value >> 8) as u8;
        self.c = value as u8;
    }

    pub fn set_de(&mut self, value: u16) {
        self.d = (value >> 8) as u8;
        self.e = value as u8;
    }

    pub fn set_hl(&mut self, value: u16) {
        self.h = (value >> 8) as u8;
        self.l = value as u8;
    }

    pub fn set_ir(&mut self, value: u16) {
        self.i = (value >> 8) as u8;
        self.r = value as u8;
    }

    pub fn set_af_alt(&mut self, value: u16) {
        self.a_alt = (value >> 8) as u8;
        self.f_alt = value as u8;
    }

    pub fn set_bc_alt(&mut self, value: u16) {
        self.b_alt = (value >> 8) as u8;
        self.c_alt = value as u8;
    }

    pub fn set_de_alt(&mut self, value: u16) {
        self.d_alt = (value >> 8) as u8;
        self.e_alt = value as u8;
    }

    pub fn set_hl_alt(&mut self, value: u16) {
        self.h_alt = (value >> 8) as u8;
        self.l_alt = value as u8;
    }

    pub fn set_ixh(&mut self, value: u8) {
        self.ix = (self.ix & 0x00FF) | (u16::from(value) << 8);
    }

    pub fn set_ixl(&mut self, value: u8) {
        self.ix = (self.ix & 0xFF00) | u16::from(value);
    }

    pub fn set_iyh(&mut self, value: u8) {
        self.iy = (self.iy & 0x00FF) | (u16::from(value) << 8);
    }

    pub fn set_iyl(&mut self, value: u8) {
        self.iy = (self.iy & 0xFF00) | u16::from(value);
    }

    /// `EX AF,AF'`
    pub fn exchange_af(&mut self) {
        std::mem::swap(&mut self.a, &mut self.a_alt);
        std::mem::swap(&mut self.f, &mut self.f_alt);
    }

    /// `EXX`: swap BC, DE and HL with their shadows.
    pub fn exchange_shadow(&mut self) {
        std::mem::swap(&mut self.b, &mut self.b_alt);
        std::mem::swap(&mut self.c, &mut self.c_alt);
        std::mem::swap(&mut self.d, &mut self.d_alt);
        std::mem::swap(&mut self.e, &mut self.e_alt);
        std::mem::swap(&mut self.h, &mut self.h_alt);
        std::mem::swap(&mut self.l, &mut self.l_alt);
    }

    /// Advance the refresh counter after an M1 cycle. Bit 7 is preserved.
    pub fn refresh(&mut self) {
        self.r = (self.r.wrapping_add(1) & 0x7F) | (self.r & 0x80);
    }
}
