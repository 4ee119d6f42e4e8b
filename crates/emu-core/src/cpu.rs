//! CPU signal trait.

use crate::Tacts;

/// The signal surface of a CPU, as seen by the devices that drive it.
///
/// Interrupt sources never manipulate PC or SP themselves. They assert or
/// withdraw a signal here and the CPU performs the actual push and jump on
/// its next cycle.
pub trait Cpu {
    /// Current tact counter.
    fn tacts(&self) -> Tacts;

    /// Returns the current program counter.
    fn pc(&self) -> u16;

    /// Returns true if the CPU is executing HALT.
    fn is_halted(&self) -> bool;

    /// Returns true while the CPU cannot accept a maskable interrupt at the
    /// next instruction boundary (after EI, or between a prefix and its opcode).
    fn is_interrupt_blocked(&self) -> bool;

    /// Assert the maskable interrupt line.
    fn raise_interrupt(&mut self);

    /// Withdraw the maskable interrupt line, whether or not it was serviced.
    fn revoke_interrupt(&mut self);

    /// Request a non-maskable interrupt.
    fn request_nmi(&mut self);

    /// Assert the reset signal. The CPU resets at its next cycle.
    fn set_reset_signal(&mut self);
}
