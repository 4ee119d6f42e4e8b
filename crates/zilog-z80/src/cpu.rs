//! Z80 CPU engine.
//!
//! One call to [`Z80::execute_cpu_cycle`] executes exactly one logical step:
//! a reset, an NMI or interrupt acknowledge, a halted refresh cycle, or one
//! whole instruction including all of its prefix bytes. Every memory and port
//! access goes through the bus with the tact at which the access starts; the
//! wait states the bus reports are added to the tact counter before the data
//! is used.

#![allow(clippy::cast_possible_truncation)]

mod execute;
mod execute_cb;
mod execute_ed;

use emu_core::{Bus, Cpu, Observable, Tacts, Value};

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::registers::Registers;
use crate::state::{IndexMode, PrefixMode, StateFlags};

/// Interrupt acknowledge cycle before the PC push (IM 0/1 total 13).
const INT_ACK_TACTS: u64 = 7;
/// NMI acknowledge cycle before the PC push (total 11).
const NMI_ACK_TACTS: u64 = 5;
/// Restart address for IM 0 and IM 1.
const IM1_VECTOR: u16 = 0x0038;
/// NMI restart address.
const NMI_VECTOR: u16 = 0x0066;

/// The Z80 CPU engine.
pub struct Z80 {
    pub(crate) regs: Registers,
    tacts: Tacts,
    state: StateFlags,
    prefix_mode: PrefixMode,
    index_mode: IndexMode,
    iff1: bool,
    iff2: bool,
    interrupt_mode: u8,
    /// Set by EI (and the reset signal); suppresses interrupt acknowledge at
    /// the next instruction boundary.
    interrupt_blocked: bool,
    /// Last opcode byte dispatched (after any prefixes).
    opcode: u8,
}

/// Serializable engine state for save states and debuggers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Z80State {
    pub registers: Registers,
    pub tacts: Tacts,
    pub state: StateFlags,
    pub iff1: bool,
    pub iff2: bool,
    pub interrupt_mode: u8,
    pub interrupt_blocked: bool,
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::default(),
            tacts: Tacts::ZERO,
            state: StateFlags::empty(),
            prefix_mode: PrefixMode::None,
            index_mode: IndexMode::None,
            iff1: false,
            iff2: false,
            interrupt_mode: 0,
            interrupt_blocked: false,
            opcode: 0,
        }
    }

    /// Execute one instruction, or service one pending signal.
    pub fn execute_cpu_cycle<B: Bus>(&mut self, bus: &mut B) {
        if self.process_signals(bus) {
            return;
        }

        let opcode = self.fetch_opcode(bus);
        self.interrupt_blocked = false;
        self.dispatch(bus, opcode);

        self.prefix_mode = PrefixMode::None;
        self.index_mode = IndexMode::None;
    }

    /// Reset immediately.
    ///
    /// The tact counter is left alone. IX, IY and the shadow registers keep
    /// their values; every other register is zeroed.
    pub fn reset(&mut self) {
        let Registers { ix, iy, a_alt, f_alt, b_alt, c_alt, d_alt, e_alt, h_alt, l_alt, .. } =
            self.regs;
        self.regs = Registers {
            ix,
            iy,
            a_alt,
            f_alt,
            b_alt,
            c_alt,
            d_alt,
            e_alt,
            h_alt,
            l_alt,
            ..Registers::default()
        };
        self.state = StateFlags::empty();
        self.prefix_mode = PrefixMode::None;
        self.index_mode = IndexMode::None;
        self.iff1 = false;
        self.iff2 = false;
        self.interrupt_mode = 0;
        self.interrupt_blocked = false;
        self.opcode = 0;
    }

    // =========================================================================
    // Observation
    // =========================================================================

    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    #[must_use]
    pub fn tacts(&self) -> Tacts {
        self.tacts
    }

    #[must_use]
    pub fn state_flags(&self) -> StateFlags {
        self.state
    }

    #[must_use]
    pub fn prefix_mode(&self) -> PrefixMode {
        self.prefix_mode
    }

    #[must_use]
    pub fn index_mode(&self) -> IndexMode {
        self.index_mode
    }

    #[must_use]
    pub fn iff1(&self) -> bool {
        self.iff1
    }

    #[must_use]
    pub fn iff2(&self) -> bool {
        self.iff2
    }

    #[must_use]
    pub fn interrupt_mode(&self) -> u8 {
        self.interrupt_mode
    }

    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    #[must_use]
    pub fn snapshot(&self) -> Z80State {
        Z80State {
            registers: self.regs,
            tacts: self.tacts,
            state: self.state,
            iff1: self.iff1,
            iff2: self.iff2,
            interrupt_mode: self.interrupt_mode,
            interrupt_blocked: self.interrupt_blocked,
        }
    }

    pub fn restore(&mut self, state: &Z80State) {
        self.regs = state.registers;
        self.tacts = state.tacts;
        self.state = state.state;
        self.iff1 = state.iff1;
        self.iff2 = state.iff2;
        self.interrupt_mode = state.interrupt_mode.min(2);
        self.interrupt_blocked = state.interrupt_blocked;
        self.prefix_mode = PrefixMode::None;
        self.index_mode = IndexMode::None;
    }

    // =========================================================================
    // Debug hooks. These bypass the engine's invariants and are not used on
    // any normal execution path.
    // =========================================================================

    pub fn set_tacts(&mut self, tacts: Tacts) {
        self.tacts = tacts;
    }

    pub fn set_interrupt_mode(&mut self, mode: u8) {
        self.interrupt_mode = mode.min(2);
    }

    pub fn set_iff(&mut self, enabled: bool) {
        self.iff1 = enabled;
        self.iff2 = enabled;
    }

    pub fn block_interrupt(&mut self) {
        self.interrupt_blocked = true;
    }

    /// Step past a HALT without an interrupt.
    pub fn remove_from_halted_state(&mut self) {
        self.leave_halt();
    }

    /// Direct register access for test harnesses.
    #[cfg(feature = "test-utils")]
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    // =========================================================================
    // Signals
    // =========================================================================

    /// Service a pending signal. Returns true if the cycle was consumed.
    fn process_signals<B: Bus>(&mut self, bus: &mut B) -> bool {
        if self.state.is_empty() {
            return false;
        }

        if self.state.contains(StateFlags::RESET) {
            self.reset();
            return true;
        }

        if self.state.contains(StateFlags::NMI) {
            self.service_nmi(bus);
            return true;
        }

        if self.state.contains(StateFlags::INT) && self.iff1 && !self.interrupt_blocked {
            self.service_interrupt(bus);
            return true;
        }

        if self.state.contains(StateFlags::HALTED) {
            // HALT executes NOPs to keep refreshing memory.
            self.tacts += 4;
            self.regs.refresh();
            return true;
        }

        false
    }

    fn leave_halt(&mut self) {
        if self.state.contains(StateFlags::HALTED) {
            self.regs.pc = self.regs.pc.wrapping_add(1);
            self.state.remove(StateFlags::HALTED);
        }
    }

    fn service_interrupt<B: Bus>(&mut self, bus: &mut B) {
        self.leave_halt();
        self.state.remove(StateFlags::INT);
        self.iff1 = false;
        self.iff2 = false;
        self.regs.refresh();
        self.tacts += INT_ACK_TACTS;
        self.push16(bus, self.regs.pc);

        self.regs.wz = if self.interrupt_mode == 2 {
            // The data bus floats high, so the vector low byte is 0xFF.
            let table = (u16::from(self.regs.i) << 8) | 0xFF;
            let lo = self.read_memory(bus, table);
            let hi = self.read_memory(bus, table.wrapping_add(1));
            u16::from_le_bytes([lo, hi])
        } else {
            IM1_VECTOR
        };
        self.regs.pc = self.regs.wz;
    }

    fn service_nmi<B: Bus>(&mut self, bus: &mut B) {
        self.leave_halt();
        self.state.remove(StateFlags::NMI);
        self.iff2 = self.iff1;
        self.iff1 = false;
        self.regs.refresh();
        self.tacts += NMI_ACK_TACTS;
        self.push16(bus, self.regs.pc);
        self.regs.wz = NMI_VECTOR;
        self.regs.pc = NMI_VECTOR;
    }

    // =========================================================================
    // Decode
    // =========================================================================

    /// Dispatch an opcode, following prefix bytes until a final opcode runs.
    fn dispatch<B: Bus>(&mut self, bus: &mut B, first: u8) {
        let mut opcode = first;
        loop {
            match opcode {
                0xDD | 0xFD => {
                    // A later DD/FD overrides an earlier one; the earlier
                    // prefix has cost its 4 tacts and does nothing else.
                    self.index_mode = if opcode == 0xDD {
                        IndexMode::Ix
                    } else {
                        IndexMode::Iy
                    };
                    opcode = self.fetch_opcode(bus);
                }
                0xCB => {
                    self.prefix_mode = PrefixMode::Bit;
                    if self.index_mode == IndexMode::None {
                        let op = self.fetch_opcode(bus);
                        self.opcode = op;
                        self.execute_cb(bus, op);
                    } else {
                        self.execute_indexed_cb(bus);
                    }
                    return;
                }
                0xED => {
                    // ED discards any index prefix.
                    self.prefix_mode = PrefixMode::Extended;
                    self.index_mode = IndexMode::None;
                    let op = self.fetch_opcode(bus);
                    self.opcode = op;
                    self.execute_ed(bus, op);
                    return;
                }
                _ => {
                    self.opcode = opcode;
                    self.execute_standard(bus, opcode);
                    return;
                }
            }
        }
    }

    // =========================================================================
    // Bus cycles
    // =========================================================================

    /// M1 cycle: opcode read, PC increment, refresh.
    fn fetch_opcode<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let read = bus.read_memory(self.regs.pc, self.tacts);
        self.tacts += u64::from(read.wait) + 4;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.regs.refresh();
        read.data
    }

    /// Operand byte at PC.
    fn fetch_byte<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = self.read_memory(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Little-endian operand word at PC.
    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn read_memory<B: Bus>(&mut self, bus: &mut B, address: u16) -> u8 {
        let read = bus.read_memory(address, self.tacts);
        self.tacts += u64::from(read.wait) + 3;
        read.data
    }

    fn write_memory<B: Bus>(&mut self, bus: &mut B, address: u16, value: u8) {
        let wait = bus.write_memory(address, value, self.tacts);
        self.tacts += u64::from(wait) + 3;
    }

    fn read_word<B: Bus>(&mut self, bus: &mut B, address: u16) -> u16 {
        let lo = self.read_memory(bus, address);
        let hi = self.read_memory(bus, address.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write_word<B: Bus>(&mut self, bus: &mut B, address: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_memory(bus, address, lo);
        self.write_memory(bus, address.wrapping_add(1), hi);
    }

    fn read_port<B: Bus>(&mut self, bus: &mut B, port: u16) -> u8 {
        let read = bus.read_port(port, self.tacts);
        self.tacts += u64::from(read.wait) + 4;
        read.data
    }

    fn write_port<B: Bus>(&mut self, bus: &mut B, port: u16, value: u8) {
        let wait = bus.write_port(port, value, self.tacts);
        self.tacts += u64::from(wait) + 4;
    }

    /// Internal cycles with no bus access.
    fn internal(&mut self, tacts: u64) {
        self.tacts += tacts;
    }

    fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_memory(bus, self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_memory(bus, self.regs.sp, lo);
    }

    fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.read_memory(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.read_memory(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    // =========================================================================
    // Register helpers
    // =========================================================================

    /// HL, or the index register selected by the current prefix.
    fn hl_or_index(&self) -> u16 {
        match self.index_mode {
            IndexMode::None => self.regs.hl(),
            IndexMode::Ix => self.regs.ix,
            IndexMode::Iy => self.regs.iy,
        }
    }

    fn set_hl_or_index(&mut self, value: u16) {
        match self.index_mode {
            IndexMode::None => self.regs.set_hl(value),
            IndexMode::Ix => self.regs.ix = value,
            IndexMode::Iy => self.regs.iy = value,
        }
    }

    /// 8-bit register by opcode encoding (0=B .. 5=L, 7=A), with H and L
    /// replaced by the index halves under a DD/FD prefix. Code 6 is the
    /// memory operand and is handled by the callers.
    fn get_reg8(&self, r: u8) -> u8 {
        match (r, self.index_mode) {
            (4, IndexMode::Ix) => self.regs.ixh(),
            (5, IndexMode::Ix) => self.regs.ixl(),
            (4, IndexMode::Iy) => self.regs.iyh(),
            (5, IndexMode::Iy) => self.regs.iyl(),
            _ => self.get_reg8_plain(r),
        }
    }

    fn set_reg8(&mut self, r: u8, value: u8) {
        match (r, self.index_mode) {
            (4, IndexMode::Ix) => self.regs.set_ixh(value),
            (5, IndexMode::Ix) => self.regs.set_ixl(value),
            (4, IndexMode::Iy) => self.regs.set_iyh(value),
            (5, IndexMode::Iy) => self.regs.set_iyl(value),
            _ => self.set_reg8_plain(r, value),
        }
    }

    /// 8-bit register without index substitution.
    fn get_reg8_plain(&self, r: u8) -> u8 {
        match r & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            _ => self.regs.a,
        }
    }

    fn set_reg8_plain(&mut self, r: u8, value: u8) {
        match r & 7 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            _ => self.regs.a = value,
        }
    }

    /// Register pair by opcode bits 4-5 (BC, DE, HL/IX/IY, SP).
    fn get_rp(&self, p: u8) -> u16 {
        match p & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.hl_or_index(),
            _ => self.regs.sp,
        }
    }

    fn set_rp(&mut self, p: u8, value: u16) {
        match p & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.set_hl_or_index(value),
            _ => self.regs.sp = value,
        }
    }

    /// Register pair for PUSH/POP (AF replaces SP).
    fn get_rp_af(&self, p: u8) -> u16 {
        if p & 3 == 3 {
            self.regs.af()
        } else {
            self.get_rp(p)
        }
    }

    fn set_rp_af(&mut self, p: u8, value: u16) {
        if p & 3 == 3 {
            self.regs.set_af(value);
        } else {
            self.set_rp(p, value);
        }
    }

    /// Evaluate condition code (NZ, Z, NC, C, PO, PE, P, M).
    fn condition(&self, cc: u8) -> bool {
        let f = self.regs.f;
        match cc & 7 {
            0 => f & ZF == 0,
            1 => f & ZF != 0,
            2 => f & CF == 0,
            3 => f & CF != 0,
            4 => f & PF == 0,
            5 => f & PF != 0,
            6 => f & SF == 0,
            _ => f & SF != 0,
        }
    }

    /// Address of the `(HL)` operand, or `(IX+d)`/`(IY+d)` under a prefix.
    /// The indexed form reads the displacement and spends 5 internal tacts.
    fn memory_operand_address<B: Bus>(&mut self, bus: &mut B) -> u16 {
        if self.index_mode == IndexMode::None {
            return self.regs.hl();
        }
        let d = self.fetch_byte(bus) as i8;
        self.internal(5);
        let address = self.hl_or_index().wrapping_add_signed(i16::from(d));
        self.regs.wz = address;
        address
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu for Z80 {
    fn tacts(&self) -> Tacts {
        self.tacts
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn is_halted(&self) -> bool {
        self.state.contains(StateFlags::HALTED)
    }

    fn is_interrupt_blocked(&self) -> bool {
        self.interrupt_blocked
    }

    fn raise_interrupt(&mut self) {
        self.state.insert(StateFlags::INT);
    }

    fn revoke_interrupt(&mut self) {
        self.state.remove(StateFlags::INT);
    }

    fn request_nmi(&mut self) {
        self.state.insert(StateFlags::NMI);
    }

    fn set_reset_signal(&mut self) {
        self.interrupt_blocked = true;
        self.state.insert(StateFlags::RESET);
    }
}

/// All paths supported by `Z80::query()`.
const Z80_QUERY_PATHS: &[&str] = &[
    "a", "f", "b", "c", "d", "e", "h", "l",
    "af", "bc", "de", "hl",
    "af'", "bc'", "de'", "hl'",
    "ix", "iy", "ixh", "ixl", "iyh", "iyl",
    "sp", "pc", "i", "r", "ir", "wz",
    "flags.s", "flags.z", "flags.y", "flags.h", "flags.x", "flags.pv", "flags.n", "flags.c",
    "iff1", "iff2", "im", "halted", "interrupt_blocked",
    "tacts", "state", "prefix", "index", "opcode",
];

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        let value = match path {
            "a" => r.a.into(),
            "f" => r.f.into(),
            "b" => r.b.into(),
            "c" => r.c.into(),
            "d" => r.d.into(),
            "e" => r.e.into(),
            "h" => r.h.into(),
            "l" => r.l.into(),
            "af" => r.af().into(),
            "bc" => r.bc().into(),
            "de" => r.de().into(),
            "hl" => r.hl().into(),
            "af'" => r.af_alt().into(),
            "bc'" => r.bc_alt().into(),
            "de'" => r.de_alt().into(),
            "hl'" => r.hl_alt().into(),
            "ix" => r.ix.into(),
            "iy" => r.iy.into(),
            "ixh" => r.ixh().into(),
            "ixl" => r.ixl().into(),
            "iyh" => r.iyh().into(),
            "iyl" => r.iyl().into(),
            "sp" => r.sp.into(),
            "pc" => r.pc.into(),
            "i" => r.i.into(),
            "r" => r.r.into(),
            "ir" => r.ir().into(),
            "wz" => r.wz.into(),
            "flags.s" => (r.f & SF != 0).into(),
            "flags.z" => (r.f & ZF != 0).into(),
            "flags.y" => (r.f & YF != 0).into(),
            "flags.h" => (r.f & HF != 0).into(),
            "flags.x" => (r.f & XF != 0).into(),
            "flags.pv" => (r.f & PF != 0).into(),
            "flags.n" => (r.f & NF != 0).into(),
            "flags.c" => (r.f & CF != 0).into(),
            "iff1" => self.iff1.into(),
            "iff2" => self.iff2.into(),
            "im" => self.interrupt_mode.into(),
            "halted" => self.state.contains(StateFlags::HALTED).into(),
            "interrupt_blocked" => self.interrupt_blocked.into(),
            "tacts" => self.tacts.get().into(),
            "state" => self.state.bits().into(),
            "prefix" => self.prefix_mode.name().into(),
            "index" => self.index_mode.name().into(),
            "opcode" => self.opcode.into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        Z80_QUERY_PATHS
    }
}
