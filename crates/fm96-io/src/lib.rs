//! Audio transport and the real-time loop for the fm96 MPX encoder.
//!
//! This crate provides:
//!
//! - **Port contract**: [`AudioBackend`], [`CapturePort`] and [`PlaybackPort`],
//!   opened with a [`PortSpec`] carrying fixed [`BufferAttributes`]
//! - **Devices**: [`CpalBackend`] bridges cpal callbacks to blocking reads and
//!   writes through a lock-free ring
//! - **Files**: [`WavCapture`] and [`WavPlayback`] for offline rendering
//! - **Memory**: [`MemoryBackend`] for deterministic tests
//! - **Processing**: [`RealtimeLoop`] drives [`fm96_core::StereoEncoder`] one
//!   768-frame block at a time until a [`CancelToken`] fires or a source ends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fm96_config::EncoderConfig;
//! use fm96_core::StereoEncoder;
//! use fm96_io::{CancelToken, Ports, RealtimeLoop, SystemBackend};
//!
//! let config = EncoderConfig::default();
//! let ports = Ports::open(&SystemBackend::new(), &config)?;
//! let mut engine = RealtimeLoop::new(StereoEncoder::new(&config.encoder_settings()));
//! let summary = engine.run(ports, &CancelToken::new())?;
//! ```

mod backend;
mod cpal_backend;
mod engine;
mod memory;
mod wav;

pub use backend::{
    AudioBackend, BufferAttributes, CapturePort, PlaybackPort, PortSpec, ROLE_AUDIO_IN,
    ROLE_MPX_IN, ROLE_MPX_OUT, SystemBackend,
};
pub use cpal_backend::{AudioDevice, CpalBackend};
pub use engine::{BLOCK_FRAMES, CancelToken, Ports, RealtimeLoop, RunSummary, StopReason};
pub use memory::{MemoryBackend, PortEvent};
pub use wav::{WavCapture, WavPlayback};

/// Error types for audio transport.
///
/// Both variants are fatal: the loop never retries or skips a block.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A port could not be opened.
    #[error("failed to open {role} '{port}': {reason}")]
    DeviceOpen {
        /// Which stream the port was for.
        role: &'static str,
        /// The port identifier as given.
        port: String,
        /// Why opening failed.
        reason: String,
    },

    /// A read or write on an open port failed.
    #[error("{role} I/O failed: {reason}")]
    DeviceIo {
        /// Which stream failed.
        role: &'static str,
        /// What went wrong.
        reason: String,
    },
}

impl Error {
    /// Create a device open error.
    pub fn open(role: &'static str, port: impl ToString, reason: impl ToString) -> Self {
        Error::DeviceOpen {
            role,
            port: port.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a device I/O error.
    pub fn io(role: &'static str, reason: impl ToString) -> Self {
        Error::DeviceIo {
            role,
            reason: reason.to_string(),
        }
    }
}

/// Convenience result type for audio transport operations.
pub type Result<T> = std::result::Result<T, Error>;
