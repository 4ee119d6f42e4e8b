//! Unprefixed and DD/FD-prefixed instructions.
//!
//! Under a DD/FD prefix the same table runs with HL replaced by IX/IY, H and
//! L replaced by the index halves, and `(HL)` replaced by `(IX+d)`. When an
//! instruction uses `(IX+d)`, its H/L register operand keeps meaning H/L.

#![allow(clippy::too_many_lines)]

use emu_core::Bus;

use crate::alu::{self, AluOp, ShiftOp};
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::state::{IndexMode, StateFlags};

use super::Z80;

impl Z80 {
    pub(super) fn execute_standard<B: Bus>(&mut self, bus: &mut B, op: u8) {
        match op {
            // NOP
            0x00 => {}

            // LD rr, nn (01=BC, 11=DE, 21=HL, 31=SP)
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch_word(bus);
                self.set_rp(op >> 4, value);
            }

            // LD (BC), A / LD (DE), A
            0x02 | 0x12 => {
                let address = if op == 0x02 { self.regs.bc() } else { self.regs.de() };
                self.write_memory(bus, address, self.regs.a);
                self.regs.wz = (u16::from(self.regs.a) << 8) | (address.wrapping_add(1) & 0xFF);
            }

            // INC rr / DEC rr
            0x03 | 0x13 | 0x23 | 0x33 | 0x0B | 0x1B | 0x2B | 0x3B => {
                self.internal(2);
                let p = op >> 4;
                let value = if op & 0x08 == 0 {
                    self.get_rp(p).wrapping_add(1)
                } else {
                    self.get_rp(p).wrapping_sub(1)
                };
                self.set_rp(p, value);
            }

            // INC r / DEC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C | 0x05 | 0x0D | 0x15 | 0x1D
            | 0x25 | 0x2D | 0x3D => {
                let r = (op >> 3) & 7;
                let value = self.get_reg8(r);
                let result = if op & 1 == 0 { alu::inc8(value) } else { alu::dec8(value) };
                self.set_reg8(r, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
            }

            // INC (HL) / DEC (HL)
            0x34 | 0x35 => {
                let address = self.memory_operand_address(bus);
                let value = self.read_memory(bus, address);
                self.internal(1);
                let result = if op == 0x34 { alu::inc8(value) } else { alu::dec8(value) };
                self.write_memory(bus, address, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
            }

            // LD r, n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let value = self.fetch_byte(bus);
                self.set_reg8((op >> 3) & 7, value);
            }

            // LD (HL), n
            0x36 => {
                if self.index_mode == IndexMode::None {
                    let value = self.fetch_byte(bus);
                    self.write_memory(bus, self.regs.hl(), value);
                } else {
                    // Displacement and operand are read back to back, then
                    // the address is computed.
                    let d = self.fetch_byte(bus) as i8;
                    let value = self.fetch_byte(bus);
                    self.internal(2);
                    let address = self.hl_or_index().wrapping_add_signed(i16::from(d));
                    self.regs.wz = address;
                    self.write_memory(bus, address, value);
                }
            }

            // RLCA / RRCA / RLA / RRA
            0x07 | 0x0F | 0x17 | 0x1F => {
                let result = alu::rotate_accumulator(ShiftOp::from_bits(op >> 3), self.regs.a, self.regs.f);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }

            // EX AF, AF'
            0x08 => self.regs.exchange_af(),

            // ADD HL, rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.internal(7);
                let hl = self.hl_or_index();
                let (result, flags) = alu::add16(hl, self.get_rp(op >> 4));
                self.regs.wz = hl.wrapping_add(1);
                self.set_hl_or_index(result);
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | flags;
            }

            // LD A, (BC) / LD A, (DE)
            0x0A | 0x1A => {
                let address = if op == 0x0A { self.regs.bc() } else { self.regs.de() };
                self.regs.a = self.read_memory(bus, address);
                self.regs.wz = address.wrapping_add(1);
            }

            // DJNZ e
            0x10 => {
                self.internal(1);
                let e = self.fetch_byte(bus) as i8;
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.relative_jump(e);
                }
            }

            // JR e
            0x18 => {
                let e = self.fetch_byte(bus) as i8;
                self.relative_jump(e);
            }

            // JR cc, e (20=NZ, 28=Z, 30=NC, 38=C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let e = self.fetch_byte(bus) as i8;
                if self.condition((op >> 3) & 3) {
                    self.relative_jump(e);
                }
            }

            // LD (nn), HL
            0x22 => {
                let address = self.fetch_word(bus);
                self.write_word(bus, address, self.hl_or_index());
                self.regs.wz = address.wrapping_add(1);
            }

            // LD HL, (nn)
            0x2A => {
                let address = self.fetch_word(bus);
                let value = self.read_word(bus, address);
                self.set_hl_or_index(value);
                self.regs.wz = address.wrapping_add(1);
            }

            // DAA
            0x27 => {
                let result = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF | CF)) | HF | NF | (self.regs.a & (YF | XF));
            }

            // LD (nn), A
            0x32 => {
                let address = self.fetch_word(bus);
                self.write_memory(bus, address, self.regs.a);
                self.regs.wz = (u16::from(self.regs.a) << 8) | (address.wrapping_add(1) & 0xFF);
            }

            // LD A, (nn)
            0x3A => {
                let address = self.fetch_word(bus);
                self.regs.a = self.read_memory(bus, address);
                self.regs.wz = address.wrapping_add(1);
            }

            // SCF
            0x37 => {
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | CF | (self.regs.a & (YF | XF));
            }

            // CCF
            0x3F => {
                let carry = self.regs.f & CF;
                let half = if carry != 0 { HF } else { 0 };
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | half | (carry ^ CF) | (self.regs.a & (YF | XF));
            }

            // HALT: PC stays on the HALT opcode until an interrupt steps past it.
            0x76 => {
                self.state.insert(StateFlags::HALTED);
                self.regs.pc = self.regs.pc.wrapping_sub(1);
            }

            // LD r, (HL)
            0x46 | 0x4E | 0x56 | 0x5E | 0x66 | 0x6E | 0x7E => {
                let address = self.memory_operand_address(bus);
                let value = self.read_memory(bus, address);
                self.set_reg8_plain((op >> 3) & 7, value);
            }

            // LD (HL), r
            0x70..=0x75 | 0x77 => {
                let address = self.memory_operand_address(bus);
                self.write_memory(bus, address, self.get_reg8_plain(op & 7));
            }

            // LD r, r'
            0x40..=0x7F => {
                let value = self.get_reg8(op & 7);
                self.set_reg8((op >> 3) & 7, value);
            }

            // ALU A, (HL)
            0x86 | 0x8E | 0x96 | 0x9E | 0xA6 | 0xAE | 0xB6 | 0xBE => {
                let address = self.memory_operand_address(bus);
                let value = self.read_memory(bus, address);
                self.alu_accumulator(op >> 3, value);
            }

            // ALU A, r
            0x80..=0xBF => {
                let value = self.get_reg8(op & 7);
                self.alu_accumulator(op >> 3, value);
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                self.internal(1);
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = self.pop16(bus);
                    self.regs.wz = self.regs.pc;
                }
            }

            // POP rr
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop16(bus);
                self.set_rp_af(op >> 4, value);
            }

            // JP cc, nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let target = self.fetch_word(bus);
                self.regs.wz = target;
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = target;
                }
            }

            // JP nn
            0xC3 => {
                let target = self.fetch_word(bus);
                self.regs.wz = target;
                self.regs.pc = target;
            }

            // CALL cc, nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let target = self.fetch_word(bus);
                self.regs.wz = target;
                if self.condition((op >> 3) & 7) {
                    self.internal(1);
                    self.push16(bus, self.regs.pc);
                    self.regs.pc = target;
                }
            }

            // CALL nn
            0xCD => {
                let target = self.fetch_word(bus);
                self.regs.wz = target;
                self.internal(1);
                self.push16(bus, self.regs.pc);
                self.regs.pc = target;
            }

            // PUSH rr
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                self.internal(1);
                let value = self.get_rp_af(op >> 4);
                self.push16(bus, value);
            }

            // ALU A, n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch_byte(bus);
                self.alu_accumulator(op >> 3, value);
            }

            // RST p
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.internal(1);
                self.push16(bus, self.regs.pc);
                self.regs.pc = u16::from(op & 0x38);
                self.regs.wz = self.regs.pc;
            }

            // RET
            0xC9 => {
                self.regs.pc = self.pop16(bus);
                self.regs.wz = self.regs.pc;
            }

            // OUT (n), A
            0xD3 => {
                let n = self.fetch_byte(bus);
                let port = (u16::from(self.regs.a) << 8) | u16::from(n);
                self.write_port(bus, port, self.regs.a);
                self.regs.wz = (u16::from(self.regs.a) << 8) | u16::from(n.wrapping_add(1));
            }

            // IN A, (n)
            0xDB => {
                let n = self.fetch_byte(bus);
                let port = (u16::from(self.regs.a) << 8) | u16::from(n);
                self.regs.a = self.read_port(bus, port);
                self.regs.wz = port.wrapping_add(1);
            }

            // EXX
            0xD9 => self.regs.exchange_shadow(),

            // EX (SP), HL
            0xE3 => {
                let sp = self.regs.sp;
                let value = self.read_word(bus, sp);
                self.internal(1);
                let [lo, hi] = self.hl_or_index().to_le_bytes();
                self.write_memory(bus, sp.wrapping_add(1), hi);
                self.write_memory(bus, sp, lo);
                self.internal(2);
                self.set_hl_or_index(value);
                self.regs.wz = value;
            }

            // JP (HL)
            0xE9 => self.regs.pc = self.hl_or_index(),

            // EX DE, HL (never affected by DD/FD)
            0xEB => {
                let de = self.regs.de();
                self.regs.set_de(self.regs.hl());
                self.regs.set_hl(de);
            }

            // DI
            0xF3 => self.set_iff(false),

            // EI
            0xFB => {
                self.set_iff(true);
                self.block_interrupt();
            }

            // LD SP, HL
            0xF9 => {
                self.internal(2);
                self.regs.sp = self.hl_or_index();
            }

            // Prefix bytes are consumed by the dispatcher before we get here.
            0xCB | 0xDD | 0xED | 0xFD => {}
        }
    }

    fn relative_jump(&mut self, e: i8) {
        self.internal(5);
        self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(e));
        self.regs.wz = self.regs.pc;
    }

    fn alu_accumulator(&mut self, bits: u8, value: u8) {
        let result = AluOp::from_bits(bits).apply(self.regs.a, value, self.regs.f & CF != 0);
        self.regs.a = result.value;
        self.regs.f = result.flags;
    }
}
