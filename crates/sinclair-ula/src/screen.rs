//! Screen geometry: the line and tact layout the ULA scans every frame.

/// Largest frame a geometry may describe. The contention table holds one
/// byte per frame tact.
pub const MAX_FRAME_TACTS: u32 = 1 << 20;

/// Raster timing of one machine model. All horizontal values are in T-states,
/// all vertical values in lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScreenConfiguration {
    pub vertical_sync_lines: u16,
    pub nonvisible_border_top_lines: u16,
    pub border_top_lines: u16,
    pub display_lines: u16,
    pub border_bottom_lines: u16,
    pub nonvisible_border_bottom_lines: u16,

    pub horizontal_blanking_time: u16,
    pub border_left_time: u16,
    pub display_line_time: u16,
    pub border_right_time: u16,
    pub nonvisible_border_right_time: u16,

    /// T-states the ULA reads pixel data ahead of displaying it.
    pub pixel_data_prefetch_time: u16,
    /// T-states the ULA reads attribute data ahead of displaying it.
    pub attribute_data_prefetch_time: u16,
}

impl ScreenConfiguration {
    /// 48K geometry: 224 T-states x 312 lines.
    #[must_use]
    pub const fn spectrum48() -> Self {
        Self {
            vertical_sync_lines: 8,
            nonvisible_border_top_lines: 8,
            border_top_lines: 48,
            display_lines: 192,
            border_bottom_lines: 48,
            nonvisible_border_bottom_lines: 8,
            horizontal_blanking_time: 40,
            border_left_time: 24,
            display_line_time: 128,
            border_right_time: 24,
            nonvisible_border_right_time: 8,
            pixel_data_prefetch_time: 2,
            attribute_data_prefetch_time: 1,
        }
    }

    /// 128K geometry: 228 T-states x 311 lines.
    #[must_use]
    pub const fn spectrum128() -> Self {
        Self {
            vertical_sync_lines: 7,
            nonvisible_border_right_time: 12,
            ..Self::spectrum48()
        }
    }

    /// Lines per frame.
    #[must_use]
    pub const fn screen_lines(&self) -> u16 {
        self.vertical_sync_lines
            + self.nonvisible_border_top_lines
            + self.border_top_lines
            + self.display_lines
            + self.border_bottom_lines
            + self.nonvisible_border_bottom_lines
    }

    /// T-states per line.
    #[must_use]
    pub const fn screen_line_time(&self) -> u16 {
        self.horizontal_blanking_time
            + self.border_left_time
            + self.display_line_time
            + self.border_right_time
            + self.nonvisible_border_right_time
    }

    /// T-states per frame.
    #[must_use]
    pub const fn frame_tacts(&self) -> u32 {
        self.screen_lines() as u32 * self.screen_line_time() as u32
    }

    /// First line carrying display pixels.
    #[must_use]
    pub const fn first_display_line(&self) -> u16 {
        self.vertical_sync_lines + self.nonvisible_border_top_lines + self.border_top_lines
    }

    /// Last line carrying display pixels.
    #[must_use]
    pub const fn last_display_line(&self) -> u16 {
        self.first_display_line() + self.display_lines - 1
    }

    /// Tact within a line of the first display pixel.
    #[must_use]
    pub const fn first_pixel_tact_in_line(&self) -> u16 {
        self.horizontal_blanking_time + self.border_left_time
    }

    /// Frame tact of the top-left display pixel.
    #[must_use]
    pub const fn first_display_pixel_tact(&self) -> u32 {
        self.first_display_line() as u32 * self.screen_line_time() as u32
            + self.first_pixel_tact_in_line() as u32
    }

    /// `(line, tact in line)` for a frame tact, wrapping at the frame length.
    #[must_use]
    pub fn position(&self, frame_tact: u64) -> (u16, u16) {
        let line_time = u64::from(self.screen_line_time());
        let tact = frame_tact % u64::from(self.frame_tacts());
        // Both parts are bounded by the 16-bit geometry above.
        #[allow(clippy::cast_possible_truncation)]
        ((tact / line_time) as u16, (tact % line_time) as u16)
    }

    /// Reject geometries that cannot describe a frame. The derived values
    /// above are only meaningful for a geometry that passes.
    pub fn validate(&self) -> Result<(), String> {
        let lines: u32 = [
            self.vertical_sync_lines,
            self.nonvisible_border_top_lines,
            self.border_top_lines,
            self.display_lines,
            self.border_bottom_lines,
            self.nonvisible_border_bottom_lines,
        ]
        .into_iter()
        .map(u32::from)
        .sum();
        let line_time: u32 = [
            self.horizontal_blanking_time,
            self.border_left_time,
            self.display_line_time,
            self.border_right_time,
            self.nonvisible_border_right_time,
        ]
        .into_iter()
        .map(u32::from)
        .sum();

        if lines > u32::from(u16::MAX) || line_time > u32::from(u16::MAX) {
            return Err("screen geometry overflows 16 bits".to_string());
        }
        if lines == 0 || line_time == 0 {
            return Err("screen geometry has a zero-length frame".to_string());
        }
        if lines * line_time > MAX_FRAME_TACTS {
            return Err(format!(
                "screen geometry frame of {} tacts exceeds {MAX_FRAME_TACTS}",
                lines * line_time
            ));
        }
        if self.display_lines == 0 {
            return Err("screen geometry has no display lines".to_string());
        }
        if self.pixel_data_prefetch_time > self.first_pixel_tact_in_line() {
            return Err("pixel prefetch starts before the line".to_string());
        }
        if self.pixel_data_prefetch_time > self.display_line_time {
            return Err("pixel prefetch is longer than the display line".to_string());
        }
        Ok(())
    }
}

impl Default for ScreenConfiguration {
    fn default() -> Self {
        Self::spectrum48()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum48_frame() {
        let screen = ScreenConfiguration::spectrum48();
        assert_eq!(screen.screen_lines(), 312);
        assert_eq!(screen.screen_line_time(), 224);
        assert_eq!(screen.frame_tacts(), 69_888);
        assert_eq!(screen.first_display_line(), 64);
        assert_eq!(screen.last_display_line(), 255);
        assert_eq!(screen.first_pixel_tact_in_line(), 64);
        assert_eq!(screen.first_display_pixel_tact(), 64 * 224 + 64);
    }

    #[test]
    fn spectrum128_frame() {
        let screen = ScreenConfiguration::spectrum128();
        assert_eq!(screen.screen_lines(), 311);
        assert_eq!(screen.screen_line_time(), 228);
        assert_eq!(screen.frame_tacts(), 70_908);
        assert_eq!(screen.first_display_line(), 63);
    }

    #[test]
    fn position_wraps_at_frame_end() {
        let screen = ScreenConfiguration::spectrum48();
        assert_eq!(screen.position(0), (0, 0));
        assert_eq!(screen.position(224 * 64 + 10), (64, 10));
        assert_eq!(screen.position(69_888 + 225), (1, 1));
    }

    #[test]
    fn validate_rejects_empty_frame() {
        let screen = ScreenConfiguration {
            display_lines: 0,
            vertical_sync_lines: 0,
            nonvisible_border_top_lines: 0,
            border_top_lines: 0,
            border_bottom_lines: 0,
            nonvisible_border_bottom_lines: 0,
            ..ScreenConfiguration::spectrum48()
        };
        assert!(screen.validate().is_err());
        assert!(ScreenConfiguration::spectrum48().validate().is_ok());
    }

    #[test]
    fn validate_rejects_overflowing_sums() {
        let screen = ScreenConfiguration {
            vertical_sync_lines: u16::MAX,
            ..ScreenConfiguration::spectrum48()
        };
        assert_eq!(screen.validate(), Err("screen geometry overflows 16 bits".to_string()));

        let screen =
            ScreenConfiguration { horizontal_blanking_time: u16::MAX, ..ScreenConfiguration::spectrum128() };
        assert!(screen.validate().is_err());
    }

    #[test]
    fn validate_bounds_frame_length() {
        let screen = ScreenConfiguration { display_lines: 5000, ..ScreenConfiguration::spectrum48() };
        assert!(screen.validate().unwrap_err().contains("exceeds"));
        assert!(ScreenConfiguration::spectrum128().validate().is_ok());
    }
}
