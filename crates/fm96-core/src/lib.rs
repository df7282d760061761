//! fm96 Core - stereo MPX encoding primitives
//!
//! This crate holds the per-sample signal path of the fm96 encoder, designed
//! for real-time processing with zero allocation in the audio path.
//!
//! # Building Blocks
//!
//! - [`Oscillator`] - Phase-accumulating sine generator for the 19 kHz pilot
//!   and its phase-locked 38 kHz harmonic
//! - [`Biquad`] - Second-order IIR section shared by both filter stages
//! - [`preemphasis_coefficients`] / [`lowpass_coefficients`] - Coefficient
//!   design for the two stages
//! - [`ChannelFilter`] - Preemphasis → lowpass chain for one channel
//! - [`StereoEncoder`] - Combines both channels, pilot, subcarrier and an
//!   optional external subcarrier into one composite sample
//!
//! # no_std Support
//!
//! Disable the default `std` feature to use the encoder on targets without
//! an operating system:
//!
//! ```toml
//! [dependencies]
//! fm96-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use fm96_core::{EncoderSettings, StereoEncoder};
//!
//! let mut encoder = StereoEncoder::new(&EncoderSettings::default());
//!
//! let left = [0.1f32; 768];
//! let right = [-0.1f32; 768];
//! let mut composite = [0.0f32; 768];
//! encoder.process_block(&left, &right, None, &mut composite);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod biquad;
pub mod encoder;
pub mod oscillator;

pub use biquad::{Biquad, PREEMPHASIS_SHELF_HZ, lowpass_coefficients, preemphasis_coefficients};
pub use encoder::{
    ChannelFilter, DEFAULT_LOWPASS_HZ, DEFAULT_LOWPASS_Q, DEFAULT_PREEMPHASIS_TAU,
    DEFAULT_SAMPLE_RATE, EncoderSettings, MONO_GAIN, PILOT_GAIN, PILOT_HZ, STEREO_GAIN,
    SUBCARRIER_HARMONIC, StereoEncoder,
};
pub use oscillator::Oscillator;
