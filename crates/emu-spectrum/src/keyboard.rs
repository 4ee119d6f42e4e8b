//! ZX Spectrum keyboard.
//!
//! The keyboard is an 8×5 matrix of half-rows, read via port $FE. The high
//! byte of the port address selects which half-rows to scan: each cleared
//! bit (A8-A15) enables one half-row, and several can be scanned at once.
//!
//! # Half-row layout
//!
//! | Addr bit | Row | Keys (bit 0-4)                |
//! |----------|-----|-------------------------------|
//! | A8       | 0   | Shift, Z, X, C, V            |
//! | A9       | 1   | A, S, D, F, G                |
//! | A10      | 2   | Q, W, E, R, T                |
//! | A11      | 3   | 1, 2, 3, 4, 5                |
//! | A12      | 4   | 0, 9, 8, 7, 6                |
//! | A13      | 5   | P, O, I, U, Y                |
//! | A14      | 6   | Enter, L, K, J, H            |
//! | A15      | 7   | Space, Sym, M, N, B          |
//!
//! A pressed key reads as 0 (active low).

/// Logical key on the 40-key keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[rustfmt::skip]
pub enum SpectrumKey {
    CapsShift, Z, X, C, V,
    A, S, D, F, G,
    Q, W, E, R, T,
    N1, N2, N3, N4, N5,
    N0, N9, N8, N7, N6,
    P, O, I, U, Y,
    Enter, L, K, J, H,
    Space, SymShift, M, N, B,
}

impl SpectrumKey {
    /// `(row, bit)` of the key in the matrix. Variants are declared in
    /// matrix order, five per half-row.
    #[must_use]
    pub const fn matrix(self) -> (usize, u8) {
        let index = self as usize;
        (index / 5, (index % 5) as u8)
    }
}

/// Keyboard state: 8 half-rows of 5 keys each, 1 = pressed.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    rows: [u8; 8],
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear a key. `row` is 0-7, `bit` is 0-4; anything else is
    /// ignored.
    pub fn set_key(&mut self, row: usize, bit: u8, pressed: bool) {
        if row < 8 && bit < 5 {
            if pressed {
                self.rows[row] |= 1 << bit;
            } else {
                self.rows[row] &= !(1 << bit);
            }
        }
    }

    /// Bits 0-4 of a port $FE read for `addr_high`, active low. Bits 5-7
    /// read as 1.
    #[must_use]
    pub fn read(&self, addr_high: u8) -> u8 {
        let pressed = self
            .rows
            .iter()
            .enumerate()
            .filter(|&(row, _)| addr_high & (1 << row) == 0)
            .fold(0u8, |acc, (_, &keys)| acc | keys);
        !pressed | 0xE0
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
    }

    pub fn press(&mut self, key: SpectrumKey) {
        let (row, bit) = key.matrix();
        self.set_key(row, bit, true);
    }

    pub fn release(&mut self, key: SpectrumKey) {
        let (row, bit) = key.matrix();
        self.set_key(row, bit, false);
    }
}
