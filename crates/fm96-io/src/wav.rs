//! WAV file ports.
//!
//! A `file:` capture reads a WAV file whose rate and channel count match the
//! port, converting integer PCM to `f32`. Running out of samples is end of
//! stream, reported as a short read. A `file:` playback writes 32-bit float
//! WAV and finalizes the header on close.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::backend::{CapturePort, PlaybackPort, PortSpec, check_frame_aligned};
use crate::{Error, Result};

/// Reads interleaved audio from a WAV file.
pub struct WavCapture {
    reader: WavReader<BufReader<File>>,
    /// Scale from integer samples to [-1, 1); unused for float files.
    int_scale: Option<f32>,
    spec: PortSpec,
    frames_read: u64,
}

impl WavCapture {
    /// Open `path` for reading.
    ///
    /// Fails if the file's sample rate or channel count differs from `spec`;
    /// there is no resampling or channel mixing.
    pub fn open(path: &Path, spec: &PortSpec) -> Result<Self> {
        let port = path.display();
        let reader = WavReader::open(path).map_err(|e| Error::open(spec.role, &port, e))?;
        let file_spec = reader.spec();

        if file_spec.sample_rate != spec.sample_rate {
            return Err(Error::open(
                spec.role,
                &port,
                format!(
                    "file is {} Hz, encoder runs at {} Hz",
                    file_spec.sample_rate, spec.sample_rate
                ),
            ));
        }
        if file_spec.channels != spec.channels {
            return Err(Error::open(
                spec.role,
                &port,
                format!(
                    "file has {} channels, expected {}",
                    file_spec.channels, spec.channels
                ),
            ));
        }

        let int_scale = match file_spec.sample_format {
            SampleFormat::Float => None,
            SampleFormat::Int => Some((1u64 << (file_spec.bits_per_sample - 1)) as f32),
        };

        tracing::info!(
            role = spec.role,
            path = %port,
            frames = reader.duration(),
            bits = file_spec.bits_per_sample,
            "reading WAV"
        );

        Ok(Self {
            reader,
            int_scale,
            spec: *spec,
            frames_read: 0,
        })
    }
}

impl CapturePort for WavCapture {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        check_frame_aligned(self.spec.role, buf.len(), self.spec.channels)?;

        let mut filled = 0;
        match self.int_scale {
            None => {
                for (slot, sample) in buf.iter_mut().zip(self.reader.samples::<f32>()) {
                    *slot = sample.map_err(|e| Error::io(self.spec.role, e))?;
                    filled += 1;
                }
            }
            Some(scale) => {
                for (slot, sample) in buf.iter_mut().zip(self.reader.samples::<i32>()) {
                    *slot = sample.map_err(|e| Error::io(self.spec.role, e))? as f32 / scale;
                    filled += 1;
                }
            }
        }

        let frames = filled / usize::from(self.spec.channels);
        self.frames_read += frames as u64;
        Ok(frames)
    }

    fn close(self: Box<Self>) -> Result<()> {
        tracing::info!(
            role = self.spec.role,
            frames = self.frames_read,
            "WAV capture closed"
        );
        Ok(())
    }
}

/// Writes interleaved audio to a 32-bit float WAV file.
pub struct WavPlayback {
    writer: WavWriter<BufWriter<File>>,
    spec: PortSpec,
    frames_written: u64,
}

impl WavPlayback {
    /// Create (or truncate) `path` for writing.
    pub fn create(path: &Path, spec: &PortSpec) -> Result<Self> {
        let port = path.display();
        let wav_spec = WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, wav_spec).map_err(|e| Error::open(spec.role, &port, e))?;

        tracing::info!(role = spec.role, path = %port, "writing WAV");

        Ok(Self {
            writer,
            spec: *spec,
            frames_written: 0,
        })
    }
}

impl PlaybackPort for WavPlayback {
    fn write(&mut self, buf: &[f32]) -> Result<usize> {
        check_frame_aligned(self.spec.role, buf.len(), self.spec.channels)?;

        for &sample in buf {
            self.writer
                .write_sample(sample)
                .map_err(|e| Error::io(self.spec.role, e))?;
        }

        let frames = buf.len() / usize::from(self.spec.channels);
        self.frames_written += frames as u64;
        Ok(frames)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let role = self.spec.role;
        let frames = self.frames_written;
        self.writer.finalize().map_err(|e| Error::io(role, e))?;
        tracing::info!(role, frames, "WAV playback closed");
        Ok(())
    }
}
