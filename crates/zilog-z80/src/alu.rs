//! ALU flag unit.
//!
//! Pure functions from operands (and carry-in) to a result and a complete
//! flags byte. Instructions that keep some of the previous flags merge them
//! at the call site.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity, sz53, sz53p};

/// Result of an 8-bit ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

impl AluResult {
    const fn new(value: u8, flags: u8) -> Self {
        Self { value, flags }
    }
}

/// The eight accumulator operations selected by bits 3-5 of the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    /// Decode from opcode bits 3-5.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }

    /// Apply to the accumulator. `CP` reports A unchanged as its value.
    #[must_use]
    pub fn apply(self, a: u8, operand: u8, carry: bool) -> AluResult {
        match self {
            AluOp::Add => add8(a, operand, false),
            AluOp::Adc => add8(a, operand, carry),
            AluOp::Sub => sub8(a, operand, false),
            AluOp::Sbc => sub8(a, operand, carry),
            AluOp::And => and8(a, operand),
            AluOp::Xor => xor8(a, operand),
            AluOp::Or => or8(a, operand),
            AluOp::Cp => AluResult::new(a, cp8(a, operand).flags),
        }
    }
}

/// The eight rotate/shift operations of the CB table, selected by bits 3-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Sll,
    Srl,
}

impl ShiftOp {
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => ShiftOp::Rlc,
            1 => ShiftOp::Rrc,
            2 => ShiftOp::Rl,
            3 => ShiftOp::Rr,
            4 => ShiftOp::Sla,
            5 => ShiftOp::Sra,
            6 => ShiftOp::Sll,
            _ => ShiftOp::Srl,
        }
    }

    #[must_use]
    pub fn apply(self, value: u8, carry: bool) -> AluResult {
        let (result, carry_out) = match self {
            ShiftOp::Rlc => (value.rotate_left(1), value & 0x80 != 0),
            ShiftOp::Rrc => (value.rotate_right(1), value & 0x01 != 0),
            ShiftOp::Rl => ((value << 1) | u8::from(carry), value & 0x80 != 0),
            ShiftOp::Rr => ((value >> 1) | (u8::from(carry) << 7), value & 0x01 != 0),
            ShiftOp::Sla => (value << 1, value & 0x80 != 0),
            ShiftOp::Sra => ((value >> 1) | (value & 0x80), value & 0x01 != 0),
            ShiftOp::Sll => ((value << 1) | 1, value & 0x80 != 0),
            ShiftOp::Srl => (value >> 1, value & 0x01 != 0),
        };
        AluResult::new(result, sz53p(result) | if carry_out { CF } else { 0 })
    }
}

/// Add with optional carry.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u16::from(carry);
    let wide = u16::from(a) + u16::from(b) + c;
    let result = wide as u8;

    let mut flags = sz53(result);
    if (a & 0x0F) + (b & 0x0F) + c as u8 > 0x0F {
        flags |= HF;
    }
    // Both operands share a sign the result does not.
    if (a ^ b) & 0x80 == 0 && (a ^ result) & 0x80 != 0 {
        flags |= PF;
    }
    if wide > 0xFF {
        flags |= CF;
    }
    AluResult::new(result, flags)
}

/// Subtract with optional borrow.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = sz53(result) | NF;
    if (a & 0x0F) < (b & 0x0F) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x80 != 0 && (a ^ result) & 0x80 != 0 {
        flags |= PF;
    }
    if u16::from(a) < u16::from(b) + u16::from(c) {
        flags |= CF;
    }
    AluResult::new(result, flags)
}

/// Compare. The undocumented bits come from the operand, not the result.
#[must_use]
pub fn cp8(a: u8, b: u8) -> AluResult {
    let diff = sub8(a, b, false);
    AluResult::new(diff.value, (diff.flags & !(YF | XF)) | (b & (YF | XF)))
}

#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let result = a & b;
    AluResult::new(result, sz53p(result) | HF)
}

#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let result = a | b;
    AluResult::new(result, sz53p(result))
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let result = a ^ b;
    AluResult::new(result, sz53p(result))
}

/// Increment. The caller preserves C.
#[must_use]
pub fn inc8(a: u8) -> AluResult {
    let result = a.wrapping_add(1);
    let mut flags = sz53(result);
    if a & 0x0F == 0x0F {
        flags |= HF;
    }
    if a == 0x7F {
        flags |= PF;
    }
    AluResult::new(result, flags)
}

/// Decrement. The caller preserves C.
#[must_use]
pub fn dec8(a: u8) -> AluResult {
    let result = a.wrapping_sub(1);
    let mut flags = sz53(result) | NF;
    if a & 0x0F == 0x00 {
        flags |= HF;
    }
    if a == 0x80 {
        flags |= PF;
    }
    AluResult::new(result, flags)
}

/// Accumulator rotates (`RLCA`, `RRCA`, `RLA`, `RRA`): only H, N, C and the
/// undocumented bits change. `flags` is the current F.
#[must_use]
pub fn rotate_accumulator(op: ShiftOp, a: u8, flags: u8) -> AluResult {
    let shifted = op.apply(a, flags & CF != 0);
    let f = (flags & (SF | ZF | PF)) | (shifted.value & (YF | XF)) | (shifted.flags & CF);
    AluResult::new(shifted.value, f)
}

/// `BIT n,value`. `xy_source` supplies the undocumented bits (the operand for
/// registers, the high byte of WZ for memory forms). `flags` is the current F.
#[must_use]
pub fn bit(n: u8, value: u8, xy_source: u8, flags: u8) -> u8 {
    let tested = value & (1 << (n & 7));
    let mut f = (flags & CF) | HF | (xy_source & (YF | XF));
    if tested == 0 {
        f |= ZF | PF;
    }
    if tested & 0x80 != 0 {
        f |= SF;
    }
    f
}

/// Decimal adjust after an addition or subtraction.
#[must_use]
pub fn daa(a: u8, flags: u8) -> AluResult {
    let mut correction = 0u8;
    let mut carry = flags & CF != 0;
    if flags & HF != 0 || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }

    let subtract = flags & NF != 0;
    let result = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if subtract {
        flags & HF != 0 && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };

    let mut f = sz53p(result) | (flags & NF);
    if half {
        f |= HF;
    }
    if carry {
        f |= CF;
    }
    AluResult::new(result, f)
}

/// 16-bit add (`ADD HL,rr` and index forms). S, Z and P/V are preserved by
/// the caller; the returned flags carry H, C and the undocumented bits.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let result = wide as u16;
    let mut flags = ((result >> 8) as u8) & (YF | XF);
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (result, flags)
}

/// `ADC HL,rr`.
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u32::from(carry);
    let wide = u32::from(a) + u32::from(b) + c;
    let result = wide as u16;

    let mut flags = ((result >> 8) as u8) & (SF | YF | XF);
    if result == 0 {
        flags |= ZF;
    }
    if (u32::from(a) & 0x0FFF) + (u32::from(b) & 0x0FFF) + c > 0x0FFF {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ result) & 0x8000 != 0 {
        flags |= PF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (result, flags)
}

/// `SBC HL,rr`.
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = (((result >> 8) as u8) & (SF | YF | XF)) | NF;
    if result == 0 {
        flags |= ZF;
    }
    if (a & 0x0FFF) < (b & 0x0FFF) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (a ^ result) & 0x8000 != 0 {
        flags |= PF;
    }
    if u32::from(a) < u32::from(b) + u32::from(c) {
        flags |= CF;
    }
    (result, flags)
}

/// Flags for `IN r,(C)`, `RLD`, `RRD` and `LD A,I/R` style results.
/// C is preserved from `flags`.
#[must_use]
pub const fn logic_flags(value: u8, flags: u8) -> u8 {
    (flags & CF) | sz53p(value)
}

/// Shared flag rule for `INI`/`IND`/`OUTI`/`OUTD` and their repeats.
///
/// `b` is the decremented B, `value` the byte transferred, `k_addend` the
/// byte added to it (C±1 for input, L after the HL update for output).
#[must_use]
pub fn block_io_flags(b: u8, value: u8, k_addend: u8) -> u8 {
    let k = u16::from(value) + u16::from(k_addend);
    let mut f = sz53(b);
    if value & 0x80 != 0 {
        f |= NF;
    }
    if k > 0xFF {
        f |= HF | CF;
    }
    if parity((k as u8 & 7) ^ b) {
        f |= PF;
    }
    f
}
