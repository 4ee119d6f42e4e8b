//! Sinclair ULA (Uncommitted Logic Array) timing.
//!
//! The ULA shares the memory bus with the CPU. While it fetches bitmap and
//! attribute bytes for the visible display it stalls CPU accesses to the
//! contended page, and once per frame it asserts the maskable interrupt.
//! This crate models those two effects; pixel rendering is out of scope.
//!
//! # Frame geometry (48K)
//!
//! - 224 T-states per line, 312 lines per frame
//! - 69,888 T-states per frame
//! - line 0 is the first line of vertical sync; the display starts at line 64
//! - within a line, 40 T-states of blanking and 24 of left border precede the
//!   first pixel
//!
//! The 128K uses 228 T-states per line and 311 lines (70,908 per frame).
//!
//! # Contention
//!
//! On every display line, from the pixel prefetch point for 126 T-states,
//! the delay follows `[6, 5, 4, 3, 2, 1, 0, 0]`. Everything else is free.
//! All tacts handed to this crate are frame-relative.

mod contention;
mod interrupt;
mod screen;

pub use contention::{CONTENTION_PATTERN, ContentionTable};
pub use interrupt::{InterruptDevice, LONGEST_OP_TACTS};
pub use screen::{MAX_FRAME_TACTS, ScreenConfiguration};

/// Is `address` in the always-contended page ($4000-$7FFF)?
#[must_use]
pub const fn is_contended_page(address: u16) -> bool {
    address & 0xC000 == 0x4000
}
