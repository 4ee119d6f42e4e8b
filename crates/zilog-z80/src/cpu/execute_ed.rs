//! ED-prefixed instructions.
//!
//! Opcodes with no defined meaning execute as 8-tact NOPs.

#![allow(clippy::too_many_lines)]

use emu_core::Bus;

use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53};

use super::Z80;

/// Direction of a block instruction.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Step {
    Increment,
    Decrement,
}

impl Step {
    fn from_opcode(op: u8) -> Self {
        if op & 0x08 == 0 { Step::Increment } else { Step::Decrement }
    }

    fn apply(self, value: u16) -> u16 {
        match self {
            Step::Increment => value.wrapping_add(1),
            Step::Decrement => value.wrapping_sub(1),
        }
    }
}

impl Z80 {
    pub(super) fn execute_ed<B: Bus>(&mut self, bus: &mut B, op: u8) {
        match op {
            // IN r, (C) (ED 70 is IN (C): flags only)
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let port = self.regs.bc();
                let value = self.read_port(bus, port);
                self.regs.wz = port.wrapping_add(1);
                let r = (op >> 3) & 7;
                if r != 6 {
                    self.set_reg8_plain(r, value);
                }
                self.regs.f = alu::logic_flags(value, self.regs.f);
            }

            // OUT (C), r (ED 71 outputs 0)
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let port = self.regs.bc();
                let r = (op >> 3) & 7;
                let value = if r == 6 { 0 } else { self.get_reg8_plain(r) };
                self.write_port(bus, port, value);
                self.regs.wz = port.wrapping_add(1);
            }

            // SBC HL, rr / ADC HL, rr
            0x42 | 0x52 | 0x62 | 0x72 | 0x4A | 0x5A | 0x6A | 0x7A => {
                self.internal(7);
                let hl = self.regs.hl();
                let operand = self.get_rp(op >> 4);
                let carry = self.regs.f & CF != 0;
                let (result, flags) = if op & 0x08 == 0 {
                    alu::sbc16(hl, operand, carry)
                } else {
                    alu::adc16(hl, operand, carry)
                };
                self.regs.wz = hl.wrapping_add(1);
                self.regs.set_hl(result);
                self.regs.f = flags;
            }

            // LD (nn), rr
            0x43 | 0x53 | 0x63 | 0x73 => {
                let address = self.fetch_word(bus);
                let value = self.get_rp(op >> 4);
                self.write_word(bus, address, value);
                self.regs.wz = address.wrapping_add(1);
            }

            // LD rr, (nn)
            0x4B | 0x5B | 0x6B | 0x7B => {
                let address = self.fetch_word(bus);
                let value = self.read_word(bus, address);
                self.set_rp(op >> 4, value);
                self.regs.wz = address.wrapping_add(1);
            }

            // NEG (and its mirrors)
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let result = alu::sub8(0, self.regs.a, false);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }

            // RETN / RETI (and mirrors): both copy IFF2 into IFF1.
            0x45 | 0x4D | 0x55 | 0x5D | 0x65 | 0x6D | 0x75 | 0x7D => {
                self.iff1 = self.iff2;
                self.regs.pc = self.pop16(bus);
                self.regs.wz = self.regs.pc;
            }

            // IM 0 / IM 1 / IM 2 (and mirrors)
            0x46 | 0x4E | 0x66 | 0x6E => self.interrupt_mode = 0,
            0x56 | 0x76 => self.interrupt_mode = 1,
            0x5E | 0x7E => self.interrupt_mode = 2,

            // LD I, A
            0x47 => {
                self.internal(1);
                self.regs.i = self.regs.a;
            }

            // LD R, A
            0x4F => {
                self.internal(1);
                self.regs.r = self.regs.a;
            }

            // LD A, I / LD A, R: P/V reflects IFF2.
            0x57 | 0x5F => {
                self.internal(1);
                self.regs.a = if op == 0x57 { self.regs.i } else { self.regs.r };
                let iff = if self.iff2 { PF } else { 0 };
                self.regs.f = (self.regs.f & CF) | sz53(self.regs.a) | iff;
            }

            // RRD
            0x67 => {
                let hl = self.regs.hl();
                let value = self.read_memory(bus, hl);
                self.internal(4);
                let a = self.regs.a;
                self.write_memory(bus, hl, (a << 4) | (value >> 4));
                self.regs.a = (a & 0xF0) | (value & 0x0F);
                self.regs.f = alu::logic_flags(self.regs.a, self.regs.f);
                self.regs.wz = hl.wrapping_add(1);
            }

            // RLD
            0x6F => {
                let hl = self.regs.hl();
                let value = self.read_memory(bus, hl);
                self.internal(4);
                let a = self.regs.a;
                self.write_memory(bus, hl, (value << 4) | (a & 0x0F));
                self.regs.a = (a & 0xF0) | (value >> 4);
                self.regs.f = alu::logic_flags(self.regs.a, self.regs.f);
                self.regs.wz = hl.wrapping_add(1);
            }

            // LDI / LDD / LDIR / LDDR
            0xA0 | 0xA8 | 0xB0 | 0xB8 => self.block_load(bus, op),

            // CPI / CPD / CPIR / CPDR
            0xA1 | 0xA9 | 0xB1 | 0xB9 => self.block_compare(bus, op),

            // INI / IND / INIR / INDR
            0xA2 | 0xAA | 0xB2 | 0xBA => self.block_input(bus, op),

            // OUTI / OUTD / OTIR / OTDR
            0xA3 | 0xAB | 0xB3 | 0xBB => self.block_output(bus, op),

            _ => {}
        }
    }

    /// Rewind PC onto the ED prefix so the instruction repeats.
    fn repeat_block(&mut self) {
        self.internal(5);
        self.regs.pc = self.regs.pc.wrapping_sub(2);
        self.regs.wz = self.regs.pc.wrapping_add(1);
    }

    fn block_load<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let step = Step::from_opcode(op);
        let hl = self.regs.hl();
        let de = self.regs.de();
        let value = self.read_memory(bus, hl);
        self.write_memory(bus, de, value);
        self.internal(2);

        self.regs.set_hl(step.apply(hl));
        self.regs.set_de(step.apply(de));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        let n = value.wrapping_add(self.regs.a);
        let mut f = (self.regs.f & (SF | ZF | CF)) | (n & XF) | ((n << 4) & YF);
        if bc != 0 {
            f |= PF;
        }
        self.regs.f = f;

        if op & 0x10 != 0 && bc != 0 {
            self.repeat_block();
        }
    }

    fn block_compare<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let step = Step::from_opcode(op);
        let hl = self.regs.hl();
        let value = self.read_memory(bus, hl);
        self.internal(5);

        self.regs.set_hl(step.apply(hl));
        self.regs.wz = step.apply(self.regs.wz);
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        let diff = alu::sub8(self.regs.a, value, false);
        let half = diff.flags & HF;
        let n = diff.value.wrapping_sub(u8::from(half != 0));
        let mut f = (self.regs.f & CF) | (diff.flags & (SF | ZF)) | half | NF;
        f |= (n & XF) | ((n << 4) & YF);
        if bc != 0 {
            f |= PF;
        }
        self.regs.f = f;

        if op & 0x10 != 0 && bc != 0 && diff.value != 0 {
            self.repeat_block();
        }
    }

    fn block_input<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let step = Step::from_opcode(op);
        self.internal(1);
        let port = self.regs.bc();
        let value = self.read_port(bus, port);
        self.regs.wz = step.apply(port);
        self.regs.b = self.regs.b.wrapping_sub(1);
        let hl = self.regs.hl();
        self.write_memory(bus, hl, value);
        self.regs.set_hl(step.apply(hl));

        let c_adjusted = step.apply(u16::from(self.regs.c)) as u8;
        self.regs.f = alu::block_io_flags(self.regs.b, value, c_adjusted);

        if op & 0x10 != 0 && self.regs.b != 0 {
            self.repeat_block();
        }
    }

    fn block_output<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let step = Step::from_opcode(op);
        self.internal(1);
        let hl = self.regs.hl();
        let value = self.read_memory(bus, hl);
        self.regs.b = self.regs.b.wrapping_sub(1);
        let port = self.regs.bc();
        self.write_port(bus, port, value);
        self.regs.wz = step.apply(port);
        self.regs.set_hl(step.apply(hl));

        self.regs.f = alu::block_io_flags(self.regs.b, value, self.regs.l);

        if op & 0x10 != 0 && self.regs.b != 0 {
            self.repeat_block();
        }
    }
}
