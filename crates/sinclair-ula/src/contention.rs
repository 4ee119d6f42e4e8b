//! Precomputed memory and I/O contention.

use crate::ScreenConfiguration;

/// Contention delay pattern (repeats every 8 T-states).
pub const CONTENTION_PATTERN: [u8; 8] = [6, 5, 4, 3, 2, 1, 0, 0];

/// One wait-state value per frame tact.
pub struct ContentionTable {
    delays: Box<[u8]>,
}

impl ContentionTable {
    #[must_use]
    pub fn new(screen: &ScreenConfiguration) -> Self {
        let line_time = usize::from(screen.screen_line_time());
        let mut delays = vec![0u8; screen.frame_tacts() as usize];

        // The ULA starts fetching `pixel_data_prefetch_time` tacts before the
        // first pixel and stops that many tacts before the right border.
        let window_start = usize::from(
            screen.first_pixel_tact_in_line() - screen.pixel_data_prefetch_time,
        );
        let window_length =
            usize::from(screen.display_line_time - screen.pixel_data_prefetch_time);

        for line in screen.first_display_line()..=screen.last_display_line() {
            let line_start = usize::from(line) * line_time;
            for offset in 0..window_length {
                delays[line_start + window_start + offset] = CONTENTION_PATTERN[offset % 8];
            }
        }

        Self { delays: delays.into_boxed_slice() }
    }

    /// Frame length the table was built for.
    #[must_use]
    pub fn frame_tacts(&self) -> u64 {
        self.delays.len() as u64
    }

    /// Extra T-states for a contended access starting at `frame_tact`.
    /// Tacts past the end of the frame wrap.
    #[must_use]
    pub fn get_contention_value(&self, frame_tact: u64) -> u8 {
        if self.delays.is_empty() {
            return 0;
        }
        // The remainder is below the table length, which fits in usize.
        #[allow(clippy::cast_possible_truncation)]
        let index = (frame_tact % self.delays.len() as u64) as usize;
        self.delays[index]
    }

    /// Wait states for a memory access. Exactly one lookup, and none at all
    /// for an uncontended address.
    #[must_use]
    pub fn memory_contention(&self, contended: bool, frame_tact: u64) -> u8 {
        if contended { self.get_contention_value(frame_tact) } else { 0 }
    }

    /// Wait states for an I/O access starting at `frame_tact`, beyond the
    /// base 4 T-states of the cycle.
    ///
    /// `ula_port` is true when bit 0 of the port address is clear.
    /// `contended_high` is true when the high byte of the port address falls
    /// in a contended page.
    #[must_use]
    pub fn io_contention(&self, ula_port: bool, contended_high: bool, frame_tact: u64) -> u8 {
        // | High byte contended? | ULA port? | Pattern                 |
        // |----------------------|-----------|-------------------------|
        // | No                   | No        | N:4                     |
        // | No                   | Yes       | N:1, C:3                |
        // | Yes                  | Yes       | C:1, C:3                |
        // | Yes                  | No        | C:1, C:1, C:1, C:1      |
        //
        // "C:n" applies contention at the current position, then advances n
        // T-states before the next check.
        let at = |offset: u64| self.get_contention_value(frame_tact + offset);

        match (contended_high, ula_port) {
            (false, false) => 0,
            (false, true) => at(1),
            (true, true) => {
                let d0 = at(0);
                let d1 = at(1 + u64::from(d0));
                d0 + d1
            }
            (true, false) => {
                let mut total = 0u8;
                for step in 0..4 {
                    total += at(step + u64::from(total));
                }
                total
            }
        }
    }
}
