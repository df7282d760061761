//! Port contract between the real-time loop and audio transports.
//!
//! The loop only ever sees blocking, interleaved `f32` reads and writes. Each
//! transport decides how to satisfy them:
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │           RealtimeLoop           │
//! │   read ─► encode ─► write        │
//! └──────────────┬───────────────────┘
//!                │ CapturePort / PlaybackPort
//!                ▼
//! ┌──────────────────────────────────┐
//! │       AudioBackend trait         │
//! │  open_capture / open_playback    │
//! └──────────────┬───────────────────┘
//!        ┌───────┼──────────────┐
//!        ▼       ▼              ▼
//! ┌──────────┐ ┌──────────┐ ┌──────────────┐
//! │   cpal   │ │   WAV    │ │    memory    │
//! │ (ring)   │ │ (hound)  │ │   (tests)    │
//! └──────────┘ └──────────┘ └──────────────┘
//! ```
//!
//! Ports are handed out as boxed trait objects and closed by value, so the
//! type system guarantees a port is closed at most once.

use std::cell::OnceCell;

use fm96_config::PortId;

use crate::cpal_backend::CpalBackend;
use crate::wav::{WavCapture, WavPlayback};
use crate::{Error, Result};

/// Role name of the composite output stream.
pub const ROLE_MPX_OUT: &str = "MPX Output";

/// Role name of the stereo audio capture stream.
pub const ROLE_AUDIO_IN: &str = "Audio In";

/// Role name of the auxiliary subcarrier capture stream.
pub const ROLE_MPX_IN: &str = "MPX In";

/// Bytes per `f32` sample.
const SAMPLE_BYTES: u32 = 4;

/// Transport buffer sizing, in bytes, fixed when a port is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAttributes {
    /// Upper bound on buffered audio.
    pub max_length: u32,
    /// Preferred amount of buffered audio, also used as the fragment size.
    pub target_length: u32,
    /// Audio that must be queued before playback starts.
    pub prebuffer: u32,
}

impl BufferAttributes {
    /// The attributes every fm96 port is opened with.
    pub const DEFAULT: Self = Self {
        max_length: 12_288,
        target_length: 12_288,
        prebuffer: 32,
    };

    /// `max_length` in samples.
    pub fn max_samples(&self) -> usize {
        (self.max_length / SAMPLE_BYTES) as usize
    }

    /// `prebuffer` in samples.
    pub fn prebuffer_samples(&self) -> usize {
        (self.prebuffer / SAMPLE_BYTES) as usize
    }

    /// Frames per device period for a stream with `channels` channels.
    ///
    /// A quarter of the target length, so several periods fit in the buffer.
    pub fn fragment_frames(&self, channels: u16) -> u32 {
        (self.target_length / (SAMPLE_BYTES * 4 * u32::from(channels.max(1)))).max(1)
    }
}

impl Default for BufferAttributes {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Everything a backend needs to open one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    /// Role name used in logs and errors.
    pub role: &'static str,
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Buffer sizing.
    pub buffer: BufferAttributes,
}

impl PortSpec {
    /// Mono composite output.
    pub fn mpx_output(sample_rate: u32) -> Self {
        Self::new(ROLE_MPX_OUT, 1, sample_rate)
    }

    /// Stereo audio input.
    pub fn audio_input(sample_rate: u32) -> Self {
        Self::new(ROLE_AUDIO_IN, 2, sample_rate)
    }

    /// Mono auxiliary subcarrier input.
    pub fn mpx_input(sample_rate: u32) -> Self {
        Self::new(ROLE_MPX_IN, 1, sample_rate)
    }

    fn new(role: &'static str, channels: u16, sample_rate: u32) -> Self {
        Self {
            role,
            channels,
            sample_rate,
            buffer: BufferAttributes::DEFAULT,
        }
    }
}

/// A source of interleaved `f32` audio.
pub trait CapturePort {
    /// Fill `buf` with interleaved samples, blocking until it is full.
    ///
    /// Returns the number of whole frames read. Fewer frames than fit in
    /// `buf` means the source has ended; `0` means it had nothing left.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize>;

    /// Stop capturing and release the port.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A sink for interleaved `f32` audio.
pub trait PlaybackPort {
    /// Queue all of `buf`, blocking until there is room.
    ///
    /// Returns the number of frames written.
    fn write(&mut self, buf: &[f32]) -> Result<usize>;

    /// Flush queued audio and release the port.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens ports by identifier.
pub trait AudioBackend {
    /// Human-readable name of this backend.
    fn name(&self) -> &'static str;

    /// Open a capture port.
    fn open_capture(&self, port: &PortId, spec: &PortSpec) -> Result<Box<dyn CapturePort>>;

    /// Open a playback port.
    fn open_playback(&self, port: &PortId, spec: &PortSpec) -> Result<Box<dyn PlaybackPort>>;
}

/// The backend used by the binary.
///
/// `file:` identifiers go to WAV files, everything else to cpal devices. The
/// cpal host is only initialized once a device port is actually requested, so
/// a pure file render never touches the audio system.
#[derive(Default)]
pub struct SystemBackend {
    devices: OnceCell<CpalBackend>,
}

impl SystemBackend {
    /// Create a new system backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn devices(&self) -> &CpalBackend {
        self.devices.get_or_init(CpalBackend::new)
    }
}

impl AudioBackend for SystemBackend {
    fn name(&self) -> &'static str {
        "system"
    }

    fn open_capture(&self, port: &PortId, spec: &PortSpec) -> Result<Box<dyn CapturePort>> {
        match port {
            PortId::File(path) => Ok(Box::new(WavCapture::open(path, spec)?)),
            _ => self.devices().open_capture(port, spec),
        }
    }

    fn open_playback(&self, port: &PortId, spec: &PortSpec) -> Result<Box<dyn PlaybackPort>> {
        match port {
            PortId::File(path) => Ok(Box::new(WavPlayback::create(path, spec)?)),
            _ => self.devices().open_playback(port, spec),
        }
    }
}

pub(crate) fn check_frame_aligned(role: &'static str, len: usize, channels: u16) -> Result<()> {
    if len % usize::from(channels.max(1)) == 0 {
        Ok(())
    } else {
        Err(Error::io(
            role,
            format!("buffer of {len} samples is not a whole number of {channels}-channel frames"),
        ))
    }
}
