//! Machine configuration, loaded from TOML.
//!
//! ```toml
//! model = "spectrum128"
//! interrupt_tact = 32
//!
//! [screen]
//! border_top_lines = 48
//! ```
//!
//! Every key is optional. Anything left out takes the default of the chosen
//! model, so a file can be as small as `model = "spectrum48"`. This includes
//! the keys of the `[screen]` table: a 128K file that only moves the top
//! border keeps the 128K line length.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sinclair_ula::ScreenConfiguration;
use tracing::info;

use crate::error::{Result, SpectrumError};

/// Supported Spectrum models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumModel {
    #[default]
    Spectrum48,
    Spectrum128,
}

impl SpectrumModel {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            SpectrumModel::Spectrum48 => "spectrum48",
            SpectrumModel::Spectrum128 => "spectrum128",
        }
    }

    /// ROM image size in bytes.
    #[must_use]
    pub const fn rom_size(self) -> usize {
        match self {
            SpectrumModel::Spectrum48 => 0x4000,
            SpectrumModel::Spectrum128 => 0x8000,
        }
    }
}

/// Configuration for creating a Spectrum instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PartialConfig")]
pub struct MachineConfig {
    pub model: SpectrumModel,
    /// CPU clock in Hz, used only for real-time pacing.
    pub clock_hz: u32,
    /// Frame tact at which the ULA raises INT.
    pub interrupt_tact: u64,
    /// Tacts per beeper output sample.
    pub tacts_per_sample: u64,
    pub screen: ScreenConfiguration,
}

impl MachineConfig {
    #[must_use]
    pub fn spectrum48() -> Self {
        Self {
            model: SpectrumModel::Spectrum48,
            clock_hz: 3_500_000,
            interrupt_tact: 32,
            tacts_per_sample: 79,
            screen: ScreenConfiguration::spectrum48(),
        }
    }

    #[must_use]
    pub fn spectrum128() -> Self {
        Self {
            model: SpectrumModel::Spectrum128,
            clock_hz: 3_546_900,
            screen: ScreenConfiguration::spectrum128(),
            ..Self::spectrum48()
        }
    }

    #[must_use]
    pub fn for_model(model: SpectrumModel) -> Self {
        match model {
            SpectrumModel::Spectrum48 => Self::spectrum48(),
            SpectrumModel::Spectrum128 => Self::spectrum128(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), model = config.model.name(), "loaded machine configuration");
        Ok(config)
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<()> {
        self.screen.validate().map_err(SpectrumError::InvalidConfig)?;
        let frame_tacts = u64::from(self.screen.frame_tacts());
        if self.interrupt_tact >= frame_tacts {
            return Err(SpectrumError::InvalidConfig(format!(
                "interrupt tact {} is outside the {frame_tacts}-tact frame",
                self.interrupt_tact
            )));
        }
        if self.clock_hz == 0 {
            return Err(SpectrumError::InvalidConfig("clock_hz must be non-zero".into()));
        }
        if self.tacts_per_sample == 0 {
            return Err(SpectrumError::InvalidConfig(
                "tacts_per_sample must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::spectrum48()
    }
}

/// On-disk form: every key optional, filled from the model's defaults.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    #[serde(default)]
    model: SpectrumModel,
    clock_hz: Option<u32>,
    interrupt_tact: Option<u64>,
    tacts_per_sample: Option<u64>,
    #[serde(default)]
    screen: PartialScreen,
}

/// `[screen]` table with every key optional.
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialScreen {
    vertical_sync_lines: Option<u16>,
    nonvisible_border_top_lines: Option<u16>,
    border_top_lines: Option<u16>,
    display_lines: Option<u16>,
    border_bottom_lines: Option<u16>,
    nonvisible_border_bottom_lines: Option<u16>,
    horizontal_blanking_time: Option<u16>,
    border_left_time: Option<u16>,
    display_line_time: Option<u16>,
    border_right_time: Option<u16>,
    nonvisible_border_right_time: Option<u16>,
    pixel_data_prefetch_time: Option<u16>,
    attribute_data_prefetch_time: Option<u16>,
}

impl PartialScreen {
    fn over(self, base: ScreenConfiguration) -> ScreenConfiguration {
        ScreenConfiguration {
            vertical_sync_lines: self.vertical_sync_lines.unwrap_or(base.vertical_sync_lines),
            nonvisible_border_top_lines: self
                .nonvisible_border_top_lines
                .unwrap_or(base.nonvisible_border_top_lines),
            border_top_lines: self.border_top_lines.unwrap_or(base.border_top_lines),
            display_lines: self.display_lines.unwrap_or(base.display_lines),
            border_bottom_lines: self.border_bottom_lines.unwrap_or(base.border_bottom_lines),
            nonvisible_border_bottom_lines: self
                .nonvisible_border_bottom_lines
                .unwrap_or(base.nonvisible_border_bottom_lines),
            horizontal_blanking_time: self
                .horizontal_blanking_time
                .unwrap_or(base.horizontal_blanking_time),
            border_left_time: self.border_left_time.unwrap_or(base.border_left_time),
            display_line_time: self.display_line_time.unwrap_or(base.display_line_time),
            border_right_time: self.border_right_time.unwrap_or(base.border_right_time),
            nonvisible_border_right_time: self
                .nonvisible_border_right_time
                .unwrap_or(base.nonvisible_border_right_time),
            pixel_data_prefetch_time: self
                .pixel_data_prefetch_time
                .unwrap_or(base.pixel_data_prefetch_time),
            attribute_data_prefetch_time: self
                .attribute_data_prefetch_time
                .unwrap_or(base.attribute_data_prefetch_time),
        }
    }
}

impl From<PartialConfig> for MachineConfig {
    fn from(partial: PartialConfig) -> Self {
        let defaults = MachineConfig::for_model(partial.model);
        Self {
            model: partial.model,
            clock_hz: partial.clock_hz.unwrap_or(defaults.clock_hz),
            interrupt_tact: partial.interrupt_tact.unwrap_or(defaults.interrupt_tact),
            tacts_per_sample: partial.tacts_per_sample.unwrap_or(defaults.tacts_per_sample),
            screen: partial.screen.over(defaults.screen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_48k() {
        let config = MachineConfig::from_toml_str("").unwrap();
        assert_eq!(config, MachineConfig::spectrum48());
    }

    #[test]
    fn model_selects_defaults() {
        let config = MachineConfig::from_toml_str(r#"model = "spectrum128""#).unwrap();
        assert_eq!(config.clock_hz, 3_546_900);
        assert_eq!(config.screen.frame_tacts(), 70_908);
    }

    #[test]
    fn explicit_keys_override_defaults() {
        let config = MachineConfig::from_toml_str(
            "interrupt_tact = 40\ntacts_per_sample = 100\n[screen]\nborder_top_lines = 56\n",
        )
        .unwrap();
        assert_eq!(config.interrupt_tact, 40);
        assert_eq!(config.tacts_per_sample, 100);
        assert_eq!(config.screen.first_display_line(), 72);
        assert_eq!(config.screen.display_lines, 192, "unlisted screen keys keep 48K values");
    }

    #[test]
    fn partial_screen_keeps_model_geometry() {
        let config =
            MachineConfig::from_toml_str("model = \"spectrum128\"\n[screen]\nborder_top_lines = 48\n")
                .unwrap();
        assert_eq!(config.screen, ScreenConfiguration::spectrum128());
        assert_eq!(config.screen.frame_tacts(), 70_908);

        let config = MachineConfig::from_toml_str(
            "model = \"spectrum128\"\n[screen]\nborder_top_lines = 56\n",
        )
        .unwrap();
        assert_eq!(config.screen.screen_line_time(), 228);
        assert_eq!(config.screen.first_display_line(), 71);
    }

    #[test]
    fn unknown_screen_key_is_reported() {
        let err = MachineConfig::from_toml_str("[screen]\nborder_top = 48\n").unwrap_err();
        assert!(matches!(err, SpectrumError::Toml(_)));
    }

    #[test]
    fn overflowing_geometry_is_rejected() {
        let err =
            MachineConfig::from_toml_str("[screen]\nvertical_sync_lines = 65535\n").unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidConfig(_)));

        let err =
            MachineConfig::from_toml_str("[screen]\nborder_left_time = 65500\n").unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidConfig(_)));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        // 4096 lines of 4096 tacts: no 16-bit overflow, but far beyond any
        // real frame.
        let err = MachineConfig::from_toml_str(
            "[screen]\ndisplay_lines = 4000\nborder_left_time = 3896\n",
        )
        .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidConfig(_)));
    }

    #[test]
    fn interrupt_outside_frame_is_rejected() {
        let err = MachineConfig::from_toml_str("interrupt_tact = 70000").unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_toml_is_reported() {
        let err = MachineConfig::from_toml_str("model = ").unwrap_err();
        assert!(matches!(err, SpectrumError::Toml(_)));
    }

    #[test]
    fn unknown_model_is_reported() {
        assert!(MachineConfig::from_toml_str(r#"model = "pentagon""#).is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = MachineConfig::spectrum128();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(MachineConfig::from_toml_str(&text).unwrap(), config);
    }
}
