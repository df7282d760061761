//! Startup validation.
//!
//! Everything here runs before any port is opened, so a bad flag or config
//! value fails fast instead of half-starting the pipeline.
//!
//! # Example
//!
//! ```rust
//! use fm96_config::{validate_sample_rate, ValidationError};
//!
//! // 192 kHz leaves room for the 38 kHz subcarrier and its sidebands
//! validate_sample_rate(192_000, true, 15_000.0).unwrap();
//!
//! // 48 kHz cannot carry the subcarrier
//! assert!(matches!(
//!     validate_sample_rate(48_000, true, 15_000.0),
//!     Err(ValidationError::SampleRateTooLow { .. })
//! ));
//! ```

use crate::config::{EncoderConfig, FilterConfig};
use thiserror::Error;

/// Frequency of the L-R subcarrier in Hz.
const SUBCARRIER_HZ: f32 = 38_000.0;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Sample rate is zero or negative.
    #[error("invalid sample rate {0} Hz (must be positive)")]
    InvalidSampleRate(i64),

    /// Sample rate cannot represent the signal being generated.
    #[error("sample rate {sample_rate} Hz is too low: {reason} needs at least {minimum} Hz")]
    SampleRateTooLow {
        /// Requested sample rate.
        sample_rate: u32,
        /// Smallest usable sample rate.
        minimum: u32,
        /// What needs the bandwidth.
        reason: &'static str,
    },

    /// Malformed port identifier.
    #[error("invalid port identifier '{value}': {reason}")]
    InvalidPortId {
        /// The identifier as given, with control characters escaped.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Filter parameter is not a positive finite number.
    #[error("filter parameter '{param}' must be positive and finite, got {value}")]
    InvalidFilter {
        /// Name of the parameter.
        param: &'static str,
        /// The rejected value.
        value: f32,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Convert a signed sample rate (as typed on the command line) to `u32`.
pub fn sample_rate_from_i64(value: i64) -> ValidationResult<u32> {
    match u32::try_from(value) {
        Ok(rate) if rate > 0 => Ok(rate),
        _ => Err(ValidationError::InvalidSampleRate(value)),
    }
}

/// Check that `sample_rate` can carry the composite signal.
///
/// Stereo needs the upper L-R sideband (`38 kHz + lowpass`) below Nyquist.
/// Mono only needs the audio band below Nyquist.
pub fn validate_sample_rate(sample_rate: u32, stereo: bool, lowpass_hz: f32) -> ValidationResult<()> {
    if sample_rate == 0 {
        return Err(ValidationError::InvalidSampleRate(0));
    }

    // f64 so that an absurd cutoff cannot overflow the bound
    let lowpass_hz = f64::from(lowpass_hz);
    let (minimum, reason) = if stereo {
        (
            (2.0 * (f64::from(SUBCARRIER_HZ) + lowpass_hz)).ceil(),
            "the stereo subcarrier",
        )
    } else {
        ((2.0 * lowpass_hz).floor() + 1.0, "the audio lowpass")
    };

    if f64::from(sample_rate) < minimum {
        return Err(ValidationError::SampleRateTooLow {
            sample_rate,
            // Saturates at u32::MAX when no rate is high enough
            minimum: minimum.min(f64::from(u32::MAX)) as u32,
            reason,
        });
    }
    Ok(())
}

/// Check that every filter parameter is positive and finite.
pub fn validate_filters(filters: &FilterConfig) -> ValidationResult<()> {
    let params = [
        ("preemphasis_us", filters.preemphasis_us),
        ("lowpass_hz", filters.lowpass_hz),
        ("lowpass_q", filters.lowpass_q),
    ];

    let errors: Vec<ValidationError> = params
        .into_iter()
        .filter(|(_, value)| !(value.is_finite() && *value > 0.0))
        .map(|(param, value)| ValidationError::InvalidFilter { param, value })
        .collect();

    collapse(errors)
}

/// Validate a complete configuration.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_config(config: &EncoderConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    let filters_ok = match validate_filters(&config.filters) {
        Ok(()) => true,
        Err(ValidationError::Multiple(inner)) => {
            errors.extend(inner);
            false
        }
        Err(e) => {
            errors.push(e);
            false
        }
    };

    // The minimum rate depends on the lowpass, so only check it against a
    // sane cutoff.
    if filters_ok {
        if let Err(e) =
            validate_sample_rate(config.sample_rate, config.stereo, config.filters.lowpass_hz)
        {
            errors.push(e);
        }
    } else if config.sample_rate == 0 {
        errors.push(ValidationError::InvalidSampleRate(0));
    }

    collapse(errors)
}

fn collapse(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
