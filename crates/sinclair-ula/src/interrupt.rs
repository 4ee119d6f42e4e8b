//! Frame interrupt generator.

use emu_core::Cpu;
use tracing::trace;

/// Tact length of the longest instruction. The INT window stays open this
/// long so the CPU reaches at least one instruction boundary inside it.
pub const LONGEST_OP_TACTS: u64 = 23;

/// Raises the maskable interrupt once per frame at a fixed frame tact and
/// withdraws it when the window closes.
///
/// Per frame the device moves Idle -> Raised -> Revoked. It only reaches the
/// CPU through [`Cpu::raise_interrupt`] and [`Cpu::revoke_interrupt`]; the
/// CPU acknowledges (and clears) the signal itself.
#[derive(Debug, Clone)]
pub struct InterruptDevice {
    interrupt_tact: u64,
    raised: bool,
    revoked: bool,
    frame_count: u64,
}

impl InterruptDevice {
    #[must_use]
    pub fn new(interrupt_tact: u64) -> Self {
        Self {
            interrupt_tact,
            raised: false,
            revoked: false,
            frame_count: 0,
        }
    }

    /// Drive the INT line for the instruction about to start at `frame_tact`.
    pub fn check_for_interrupt<C: Cpu + ?Sized>(&mut self, cpu: &mut C, frame_tact: u64) {
        if self.revoked || frame_tact < self.interrupt_tact {
            return;
        }

        if frame_tact > self.interrupt_tact + LONGEST_OP_TACTS {
            self.revoked = true;
            cpu.revoke_interrupt();
            trace!(frame_tact, "interrupt revoked");
            return;
        }

        // Retried at the next boundary while the CPU is blocked.
        if self.raised || cpu.is_interrupt_blocked() {
            return;
        }

        self.raised = true;
        self.frame_count += 1;
        cpu.raise_interrupt();
        trace!(frame_tact, frame = self.frame_count, "interrupt raised");
    }

    /// Re-arm for a new frame.
    pub fn start_new_frame(&mut self) {
        self.raised = false;
        self.revoked = false;
    }

    pub fn reset(&mut self) {
        self.start_new_frame();
    }

    #[must_use]
    pub fn interrupt_tact(&self) -> u64 {
        self.interrupt_tact
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Number of interrupts raised since construction.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Restore the counter from a snapshot.
    pub fn set_frame_count(&mut self, frame_count: u64) {
        self.frame_count = frame_count;
    }

    /// Restore the per-frame state from a snapshot.
    pub fn restore(&mut self, raised: bool, revoked: bool) {
        self.raised = raised;
        self.revoked = revoked;
    }
}
