//! Configuration for the fm96 MPX encoder.
//!
//! This crate turns a TOML file and command-line values into a checked
//! [`EncoderConfig`], and parses the port identifiers that name audio sources
//! and sinks.
//!
//! # Features
//!
//! - **Config file**: load and save [`EncoderConfig`] as TOML
//! - **Port identifiers**: `default`, `file:<path>` or a device name ([`PortId`])
//! - **Validation**: sample rate and filter checks before any device is opened
//!
//! # Example
//!
//! ```rust
//! use fm96_config::{EncoderConfig, PortId};
//!
//! let config = EncoderConfig::from_toml(r#"
//!     sample_rate = 228000
//!     output = "file:mpx.wav"
//! "#).unwrap();
//!
//! config.validate().unwrap();
//! assert!(config.output.is_file());
//! assert_eq!(config.input, PortId::Default);
//! ```

mod config;
mod error;
mod port;

/// Startup validation of sample rate, filters and ports.
pub mod validation;

pub use config::{EncoderConfig, FilterConfig};
pub use error::ConfigError;
pub use port::PortId;
pub use validation::{
    ValidationError, ValidationResult, sample_rate_from_i64, validate_config, validate_filters,
    validate_sample_rate,
};
