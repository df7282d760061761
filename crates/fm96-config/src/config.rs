//! Encoder configuration file format and operations.

use fm96_core::{
    DEFAULT_LOWPASS_HZ, DEFAULT_LOWPASS_Q, DEFAULT_PREEMPHASIS_TAU, DEFAULT_SAMPLE_RATE,
    EncoderSettings,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::port::PortId;
use crate::validation::validate_config;

/// Complete encoder configuration.
///
/// Loaded from an optional TOML file, then overridden by command-line flags.
/// Every field has a default, so an empty file is a valid configuration.
///
/// # TOML Format
///
/// ```toml
/// stereo = true
/// sample_rate = 192000
/// input = "default"
/// output = "file:mpx.wav"
/// mpx = "rds-generator"
///
/// [filters]
/// preemphasis_us = 50.0
/// lowpass_hz = 15000.0
/// lowpass_q = 5.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// Emit pilot and L-R subcarrier.
    pub stereo: bool,

    /// Processing sample rate in Hz.
    pub sample_rate: u32,

    /// Stereo capture source.
    pub input: PortId,

    /// Composite playback sink.
    pub output: PortId,

    /// Optional mono capture source mixed into the composite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpx: Option<PortId>,

    /// Audio filter design.
    pub filters: FilterConfig,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            stereo: true,
            sample_rate: DEFAULT_SAMPLE_RATE,
            input: PortId::Default,
            output: PortId::Default,
            mpx: None,
            filters: FilterConfig::default(),
        }
    }
}

/// Filter parameters shared by both audio channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Preemphasis time constant in microseconds (50 in Europe, 75 in the US).
    pub preemphasis_us: f32,
    /// Lowpass cutoff in Hz.
    pub lowpass_hz: f32,
    /// Lowpass resonance.
    pub lowpass_q: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            preemphasis_us: DEFAULT_PREEMPHASIS_TAU * 1e6,
            lowpass_hz: DEFAULT_LOWPASS_HZ,
            lowpass_q: DEFAULT_LOWPASS_Q,
        }
    }
}

impl EncoderConfig {
    /// Load a configuration from a TOML file.
    ///
    /// The result is parsed but not validated; flags may still override it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every value, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config(self)?;
        Ok(())
    }

    /// Construction parameters for the encoder.
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            sample_rate: self.sample_rate,
            stereo: self.stereo,
            preemphasis_tau: self.filters.preemphasis_us * 1e-6,
            lowpass_hz: self.filters.lowpass_hz,
            lowpass_q: self.filters.lowpass_q,
        }
    }
}
