//! CB-prefixed bit, rotate and shift instructions, plain and indexed.

use emu_core::Bus;

use crate::alu::{self, ShiftOp};
use crate::flags::CF;

use super::Z80;

impl Z80 {
    /// `CB op` with register or `(HL)` operand.
    pub(super) fn execute_cb<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let r = op & 7;
        let y = (op >> 3) & 7;

        if r == 6 {
            let address = self.regs.hl();
            let value = self.read_memory(bus, address);
            self.internal(1);
            match op >> 6 {
                // BIT y, (HL): undocumented bits come from WZ.
                1 => {
                    let xy = (self.regs.wz >> 8) as u8;
                    self.regs.f = alu::bit(y, value, xy, self.regs.f);
                }
                group => {
                    let result = self.bit_group(group, y, value);
                    self.write_memory(bus, address, result);
                }
            }
            return;
        }

        let value = self.get_reg8_plain(r);
        match op >> 6 {
            1 => self.regs.f = alu::bit(y, value, value, self.regs.f),
            group => {
                let result = self.bit_group(group, y, value);
                self.set_reg8_plain(r, result);
            }
        }
    }

    /// `DD CB d op` / `FD CB d op`.
    ///
    /// The displacement comes before the final opcode, which is read as
    /// plain data (no refresh). Non-BIT forms with a register code other than
    /// 6 also copy the result into that register.
    pub(super) fn execute_indexed_cb<B: Bus>(&mut self, bus: &mut B) {
        let d = self.fetch_byte(bus) as i8;
        let op = self.fetch_byte(bus);
        self.internal(2);
        self.opcode = op;

        let address = self.hl_or_index().wrapping_add_signed(i16::from(d));
        self.regs.wz = address;
        let value = self.read_memory(bus, address);
        self.internal(1);

        let y = (op >> 3) & 7;
        match op >> 6 {
            1 => {
                let xy = (address >> 8) as u8;
                self.regs.f = alu::bit(y, value, xy, self.regs.f);
            }
            group => {
                let result = self.bit_group(group, y, value);
                self.write_memory(bus, address, result);
                let r = op & 7;
                if r != 6 {
                    self.set_reg8_plain(r, result);
                }
            }
        }
    }

    /// Rotate/shift (group 0), RES (2) or SET (3). Updates F for shifts.
    fn bit_group(&mut self, group: u8, y: u8, value: u8) -> u8 {
        match group {
            0 => {
                let result = ShiftOp::from_bits(y).apply(value, self.regs.f & CF != 0);
                self.regs.f = result.flags;
                result.value
            }
            2 => value & !(1 << y),
            _ => value | (1 << y),
        }
    }
}
