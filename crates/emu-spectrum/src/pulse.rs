//! Pulse devices: edge-timed recordings of a one-bit line.
//!
//! The beeper (EAR out) and the MIC output are both one-bit lines the CPU
//! toggles with `OUT ($FE)`. Each edge closes a pulse whose length is the
//! tact distance from the previous edge. Pulses are collected per frame and
//! handed over as a whole at the frame boundary.

use serde::{Deserialize, Serialize};

/// A stretch of constant level, `length` tacts long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pulse {
    pub level: bool,
    pub length: u64,
}

/// Everything a frame recorded on one line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PulseFrame {
    /// Line level when the frame started.
    pub start_level: bool,
    /// Tacts of the first pulse that fell in the previous frame.
    pub carry_in: u64,
    /// Frame tact of the previous frame's last edge when that edge fell in
    /// its overshoot. The line held the level before that edge until then.
    pub lead_in: u64,
    /// Closed pulses, in order.
    pub pulses: Vec<Pulse>,
    /// Tacts since the last edge, still open at the frame end. They become
    /// part of the next frame's first pulse.
    pub overflow: u64,
    /// Line level when the frame ended.
    pub end_level: bool,
}

impl PulseFrame {
    /// Rasterise the frame into one sample per `tacts_per_sample`, 1.0 for
    /// high and 0.0 for low.
    #[must_use]
    pub fn render_samples(&self, frame_tacts: u64, tacts_per_sample: u64) -> Vec<f32> {
        if tacts_per_sample == 0 {
            return Vec::new();
        }

        // (level, frame tact at which the level ends)
        let mut segments = Vec::with_capacity(self.pulses.len() + 1);
        if self.lead_in > 0 {
            // Edges always flip the line, so the level before the edge is
            // the opposite of the level after it.
            segments.push((!self.start_level, self.lead_in));
        }
        let mut end = self.lead_in;
        for (i, pulse) in self.pulses.iter().enumerate() {
            let length = if i == 0 { pulse.length.saturating_sub(self.carry_in) } else { pulse.length };
            end += length;
            segments.push((pulse.level, end));
        }

        let count = frame_tacts.div_ceil(tacts_per_sample);
        let mut samples = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
        let mut segment = 0;
        for k in 0..count {
            let at = k * tacts_per_sample;
            while segment < segments.len() && at >= segments[segment].1 {
                segment += 1;
            }
            let level = segments.get(segment).map_or(self.end_level, |&(level, _)| level);
            samples.push(if level { 1.0 } else { 0.0 });
        }
        samples
    }

    /// No edge happened during the frame.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.pulses.is_empty()
    }
}

/// Records the edges of one line.
#[derive(Debug, Clone)]
pub struct PulseDevice {
    last_bit: bool,
    /// Absolute tact of the last edge.
    last_pulse_tact: u64,
    frame_start: u64,
    start_level: bool,
    carry_in: u64,
    lead_in: u64,
    pulses: Vec<Pulse>,
    tape_mode: bool,
}

impl PulseDevice {
    #[must_use]
    pub fn new(initial_level: bool) -> Self {
        Self {
            last_bit: initial_level,
            last_pulse_tact: 0,
            frame_start: 0,
            start_level: initial_level,
            carry_in: 0,
            lead_in: 0,
            pulses: Vec::new(),
            tape_mode: false,
        }
    }

    /// A CPU-driven level change at `tact`. Ignored in tape mode.
    pub fn notify(&mut self, bit: bool, tact: u64) {
        if !self.tape_mode {
            self.record(bit, tact);
        }
    }

    /// A tape-driven level change at `tact`.
    pub fn notify_tape(&mut self, bit: bool, tact: u64) {
        self.record(bit, tact);
    }

    fn record(&mut self, bit: bool, tact: u64) {
        if bit == self.last_bit {
            return;
        }
        if tact > self.last_pulse_tact {
            self.pulses.push(Pulse { level: self.last_bit, length: tact - self.last_pulse_tact });
        }
        self.last_bit = bit;
        self.last_pulse_tact = tact;
    }

    /// While set, only [`PulseDevice::notify_tape`] changes the line.
    pub fn set_tape_mode(&mut self, tape_mode: bool) {
        self.tape_mode = tape_mode;
    }

    #[must_use]
    pub fn tape_mode(&self) -> bool {
        self.tape_mode
    }

    #[must_use]
    pub fn level(&self) -> bool {
        self.last_bit
    }

    /// Close the frame at absolute tact `frame_end_tact` and hand over its
    /// pulses. Edges past the frame end stay in the frame that recorded them
    /// and shift the start of the next frame's first pulse.
    pub fn end_frame(&mut self, frame_end_tact: u64) -> PulseFrame {
        let overflow = frame_end_tact.saturating_sub(self.last_pulse_tact);
        let frame = PulseFrame {
            start_level: self.start_level,
            carry_in: self.carry_in,
            lead_in: self.lead_in,
            pulses: std::mem::take(&mut self.pulses),
            overflow,
            end_level: self.last_bit,
        };
        self.frame_start = frame_end_tact;
        self.start_level = self.last_bit;
        self.carry_in = overflow;
        self.lead_in = self.last_pulse_tact.saturating_sub(frame_end_tact);
        frame
    }

    /// Drop pending pulses and restart the line at `tact`.
    pub fn reset(&mut self, tact: u64) {
        self.pulses.clear();
        self.last_pulse_tact = tact;
        self.frame_start = tact;
        self.start_level = self.last_bit;
        self.carry_in = 0;
        self.lead_in = 0;
        self.tape_mode = false;
    }

    /// Absolute tact the current frame started at.
    #[must_use]
    pub fn frame_start(&self) -> u64 {
        self.frame_start
    }

    /// Pulses recorded so far in the current frame.
    #[must_use]
    pub fn pending(&self) -> &[Pulse] {
        &self.pulses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_level_is_not_an_edge() {
        let mut device = PulseDevice::new(false);
        device.notify(false, 100);
        assert!(device.pending().is_empty());
    }

    #[test]
    fn edges_close_pulses() {
        let mut device = PulseDevice::new(false);
        device.notify(true, 100);
        device.notify(false, 350);
        assert_eq!(
            device.pending(),
            &[Pulse { level: false, length: 100 }, Pulse { level: true, length: 250 }]
        );
        assert!(!device.level());
    }

    #[test]
    fn edge_at_last_tact_records_nothing_but_flips_level() {
        let mut device = PulseDevice::new(false);
        device.notify(true, 0);
        assert!(device.pending().is_empty());
        assert!(device.level());
    }

    #[test]
    fn quiet_frame_has_no_pulses() {
        let mut device = PulseDevice::new(true);
        let frame = device.end_frame(69_888);
        assert!(frame.is_silent());
        assert_eq!(frame.overflow, 69_888);
        assert!(frame.start_level && frame.end_level);
    }

    #[test]
    fn open_pulse_carries_into_next_frame() {
        let mut device = PulseDevice::new(false);
        device.notify(true, 69_000);
        let first = device.end_frame(69_888);
        assert_eq!(first.pulses, vec![Pulse { level: false, length: 69_000 }]);
        assert_eq!(first.overflow, 888);
        assert!(first.end_level);

        device.notify(false, 69_888 + 112);
        let second = device.end_frame(2 * 69_888);
        assert_eq!(second.carry_in, 888);
        assert!(second.start_level);
        // The merged pulse counts the carried tacts once, not twice.
        assert_eq!(second.pulses, vec![Pulse { level: true, length: 1000 }]);
    }

    #[test]
    fn tape_mode_suppresses_cpu_edges() {
        let mut device = PulseDevice::new(false);
        device.set_tape_mode(true);
        device.notify(true, 10);
        assert!(device.pending().is_empty());
        device.notify_tape(true, 20);
        assert_eq!(device.pending(), &[Pulse { level: false, length: 20 }]);
    }

    #[test]
    fn render_follows_edges() {
        let mut device = PulseDevice::new(false);
        device.notify(true, 40);
        device.notify(false, 80);
        let frame = device.end_frame(100);
        let samples = frame.render_samples(100, 10);
        assert_eq!(samples, vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn render_skips_carried_tacts() {
        let mut device = PulseDevice::new(false);
        device.notify(true, 90);
        device.end_frame(100);
        device.notify(false, 130);
        let frame = device.end_frame(200);
        // High for the first 30 tacts of this frame, then low.
        let samples = frame.render_samples(100, 10);
        assert_eq!(&samples[..4], &[1.0, 1.0, 1.0, 0.0]);
        assert!(samples[4..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn edge_in_overshoot_delays_next_frame() {
        let mut device = PulseDevice::new(false);
        // The last instruction of the frame toggles the line 8 tacts late.
        device.notify(true, 108);
        let first = device.end_frame(100);
        assert_eq!(first.overflow, 0);
        assert_eq!(&first.render_samples(100, 10)[9..], &[0.0]);

        device.notify(false, 140);
        let second = device.end_frame(200);
        assert_eq!(second.lead_in, 8);
        assert_eq!(second.pulses, vec![Pulse { level: true, length: 32 }]);
        // Low until frame tact 8, high until 40, then low again.
        let samples = second.render_samples(100, 4);
        assert_eq!(&samples[..11], &[0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
        assert!(samples[10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn render_silent_frame_holds_level() {
        let frame = PulseFrame { start_level: true, end_level: true, ..PulseFrame::default() };
        let samples = frame.render_samples(69_888, 79);
        assert_eq!(samples.len(), 885);
        assert!(samples.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn reset_restarts_the_line() {
        let mut device = PulseDevice::new(false);
        device.notify(true, 50);
        device.set_tape_mode(true);
        device.reset(1000);
        assert!(device.pending().is_empty());
        assert!(!device.tape_mode());
        device.notify(false, 1010);
        assert_eq!(device.pending(), &[Pulse { level: true, length: 10 }]);
    }
}
