//! cpal-based device ports.
//!
//! cpal delivers audio through callbacks on its own thread, while the
//! processing loop wants blocking reads and writes. Each port bridges the two
//! with a single-producer single-consumer [`rtrb`] ring:
//!
//! ```text
//! capture:  device callback ──push──► ring ──pop──► CpalCapture::read
//! playback: CpalPlayback::write ──push──► ring ──pop──► device callback
//! ```
//!
//! The callbacks never allocate, lock or log. They report trouble through
//! atomics in `StreamStatus`, which the processing thread checks on every
//! read and write:
//!
//! - a stream error or a capture overrun turns the next call into
//!   [`Error::DeviceIo`]
//! - a playback underrun plays silence, is counted, and is logged by the
//!   writer

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, Stream};
use fm96_config::PortId;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::backend::{AudioBackend, CapturePort, PlaybackPort, PortSpec, check_frame_aligned};
use crate::{Error, Result};

/// Audio device information.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports audio input.
    pub is_input: bool,
    /// Whether the device supports audio output.
    pub is_output: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// Extract device name via `description()` (cpal 0.17+).
fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Opens cpal devices on the platform's default host.
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    /// Create a backend on the default host (ALSA, CoreAudio, WASAPI, ...).
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal backend initialized");
        Self { host }
    }

    /// List all available audio devices.
    pub fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        let mut devices = Vec::new();

        let inputs = self
            .host
            .input_devices()
            .map_err(|e| Error::io("device list", e))?;
        for device in inputs {
            if let Ok(name) = device_name(&device) {
                let default_sample_rate = device
                    .default_input_config()
                    .map(|c| c.sample_rate())
                    .unwrap_or(0);
                let is_output = device.default_output_config().is_ok();
                devices.push(AudioDevice {
                    name,
                    is_input: true,
                    is_output,
                    default_sample_rate,
                });
            }
        }

        let outputs = self
            .host
            .output_devices()
            .map_err(|e| Error::io("device list", e))?;
        for device in outputs {
            if let Ok(name) = device_name(&device) {
                // Duplex devices were already listed as inputs
                if devices.iter().any(|d| d.name == name) {
                    continue;
                }
                let default_sample_rate = device
                    .default_output_config()
                    .map(|c| c.sample_rate())
                    .unwrap_or(0);
                devices.push(AudioDevice {
                    name,
                    is_input: false,
                    is_output: true,
                    default_sample_rate,
                });
            }
        }

        Ok(devices)
    }

    /// Find an input device by case-insensitive substring, or the default.
    fn find_input_device(&self, name: Option<&str>) -> std::result::Result<Device, String> {
        match name {
            Some(search) => {
                let search_lower = search.to_lowercase();
                let devices = self.host.input_devices().map_err(|e| e.to_string())?;
                for device in devices {
                    if let Ok(dev_name) = device_name(&device)
                        && dev_name.to_lowercase().contains(&search_lower)
                    {
                        return Ok(device);
                    }
                }
                Err(format!("no input device matching '{search}'"))
            }
            None => self
                .host
                .default_input_device()
                .ok_or_else(|| "no default input device".to_string()),
        }
    }

    /// Find an output device by case-insensitive substring, or the default.
    fn find_output_device(&self, name: Option<&str>) -> std::result::Result<Device, String> {
        match name {
            Some(search) => {
                let search_lower = search.to_lowercase();
                let devices = self.host.output_devices().map_err(|e| e.to_string())?;
                for device in devices {
                    if let Ok(dev_name) = device_name(&device)
                        && dev_name.to_lowercase().contains(&search_lower)
                    {
                        return Ok(device);
                    }
                }
                Err(format!("no output device matching '{search}'"))
            }
            None => self
                .host
                .default_output_device()
                .ok_or_else(|| "no default output device".to_string()),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_config(spec: &PortSpec) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        buffer_size: cpal::BufferSize::Fixed(spec.buffer.fragment_frames(spec.channels)),
    }
}

/// Ring capacity in samples: the buffer limit, but never less than four
/// device periods.
fn ring_capacity(spec: &PortSpec) -> usize {
    let fragment = spec.buffer.fragment_frames(spec.channels) as usize * usize::from(spec.channels);
    spec.buffer.max_samples().max(4 * fragment)
}

/// How long a blocked read or write sleeps before checking the ring again.
fn poll_interval(spec: &PortSpec) -> Duration {
    let fragment = f64::from(spec.buffer.fragment_frames(spec.channels));
    Duration::from_secs_f64(fragment / f64::from(spec.sample_rate.max(1)) / 4.0)
}

/// State shared between a device callback and the processing thread.
#[derive(Debug, Default)]
struct StreamStatus {
    error: OnceLock<String>,
    overrun: AtomicBool,
    underruns: AtomicU64,
}

impl StreamStatus {
    fn check(&self, role: &'static str) -> Result<()> {
        if let Some(reason) = self.error.get() {
            return Err(Error::io(role, reason));
        }
        if self.overrun.load(Ordering::Acquire) {
            return Err(Error::io(role, "capture overrun, samples were dropped"));
        }
        Ok(())
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open_capture(&self, port: &PortId, spec: &PortSpec) -> Result<Box<dyn CapturePort>> {
        let device = self
            .find_input_device(port.device_name())
            .map_err(|reason| Error::open(spec.role, port, reason))?;

        let (mut producer, consumer) = RingBuffer::<f32>::new(ring_capacity(spec));
        let status = Arc::new(StreamStatus::default());

        let data_status = Arc::clone(&status);
        let error_status = Arc::clone(&status);
        let stream = device
            .build_input_stream(
                &stream_config(spec),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        if producer.push(sample).is_err() {
                            data_status.overrun.store(true, Ordering::Release);
                            break;
                        }
                    }
                },
                move |err| {
                    let _ = error_status.error.set(err.to_string());
                },
                None,
            )
            .map_err(|e| Error::open(spec.role, port, e))?;

        tracing::info!(
            role = spec.role,
            port = %port,
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            "capture stream opened"
        );

        Ok(Box::new(CpalCapture {
            stream,
            consumer,
            status,
            spec: *spec,
            started: false,
        }))
    }

    fn open_playback(&self, port: &PortId, spec: &PortSpec) -> Result<Box<dyn PlaybackPort>> {
        let device = self
            .find_output_device(port.device_name())
            .map_err(|reason| Error::open(spec.role, port, reason))?;

        let capacity = ring_capacity(spec);
        let (producer, mut consumer) = RingBuffer::<f32>::new(capacity);
        let status = Arc::new(StreamStatus::default());
        let prebuffer = spec.buffer.prebuffer_samples();

        let data_status = Arc::clone(&status);
        let error_status = Arc::clone(&status);
        let mut primed = false;
        let stream = device
            .build_output_stream(
                &stream_config(spec),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let available = consumer.slots();
                    if !primed {
                        if available < prebuffer {
                            data.fill(0.0);
                            return;
                        }
                        primed = true;
                    }

                    let n = available.min(data.len());
                    if let Ok(chunk) = consumer.read_chunk(n) {
                        let (first, second) = chunk.as_slices();
                        data[..first.len()].copy_from_slice(first);
                        data[first.len()..n].copy_from_slice(second);
                        chunk.commit_all();
                    }
                    if n < data.len() {
                        data[n..].fill(0.0);
                        data_status.underruns.fetch_add(1, Ordering::Relaxed);
                    }
                },
                move |err| {
                    let _ = error_status.error.set(err.to_string());
                },
                None,
            )
            .map_err(|e| Error::open(spec.role, port, e))?;

        stream.play().map_err(|e| Error::open(spec.role, port, e))?;
        tracing::info!(
            role = spec.role,
            port = %port,
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            "playback stream started"
        );

        Ok(Box::new(CpalPlayback {
            stream,
            producer,
            capacity,
            status,
            spec: *spec,
            underruns_logged: 0,
        }))
    }
}

/// Blocking reader over a cpal input stream.
struct CpalCapture {
    stream: Stream,
    consumer: Consumer<f32>,
    status: Arc<StreamStatus>,
    spec: PortSpec,
    started: bool,
}

impl CpalCapture {
    /// Start the device on the first read, so audio captured before the loop
    /// is running cannot overrun the ring.
    fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        // Some hosts run a stream as soon as it is built
        let stale = self.consumer.slots();
        if let Ok(chunk) = self.consumer.read_chunk(stale) {
            chunk.commit_all();
        }
        self.status.overrun.store(false, Ordering::Release);

        self.stream
            .play()
            .map_err(|e| Error::io(self.spec.role, e))?;
        self.started = true;
        tracing::debug!(role = self.spec.role, "capture stream started");
        Ok(())
    }
}

impl CapturePort for CpalCapture {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        check_frame_aligned(self.spec.role, buf.len(), self.spec.channels)?;
        self.start()?;

        let mut filled = 0;
        while filled < buf.len() {
            self.status.check(self.spec.role)?;

            let n = self.consumer.slots().min(buf.len() - filled);
            if n == 0 {
                thread::sleep(poll_interval(&self.spec));
                continue;
            }

            let chunk = self
                .consumer
                .read_chunk(n)
                .map_err(|e| Error::io(self.spec.role, e))?;
            let (first, second) = chunk.as_slices();
            let dst = &mut buf[filled..filled + n];
            dst[..first.len()].copy_from_slice(first);
            dst[first.len()..].copy_from_slice(second);
            chunk.commit_all();
            filled += n;
        }

        Ok(buf.len() / usize::from(self.spec.channels))
    }

    fn close(self: Box<Self>) -> Result<()> {
        let result = self.stream.pause().map_err(|e| Error::io(self.spec.role, e));
        tracing::info!(role = self.spec.role, "capture stream closed");
        result
    }
}

/// Blocking writer over a cpal output stream.
struct CpalPlayback {
    stream: Stream,
    producer: Producer<f32>,
    capacity: usize,
    status: Arc<StreamStatus>,
    spec: PortSpec,
    underruns_logged: u64,
}

impl CpalPlayback {
    fn report_underruns(&mut self) {
        let underruns = self.status.underruns.load(Ordering::Relaxed);
        if underruns > self.underruns_logged {
            tracing::warn!(
                role = self.spec.role,
                underruns,
                new = underruns - self.underruns_logged,
                "playback underrun, device played silence"
            );
            self.underruns_logged = underruns;
        }
    }
}

impl PlaybackPort for CpalPlayback {
    fn write(&mut self, buf: &[f32]) -> Result<usize> {
        check_frame_aligned(self.spec.role, buf.len(), self.spec.channels)?;

        let mut written = 0;
        while written < buf.len() {
            self.status.check(self.spec.role)?;

            let n = self.producer.slots().min(buf.len() - written);
            if n == 0 {
                thread::sleep(poll_interval(&self.spec));
                continue;
            }

            let mut chunk = self
                .producer
                .write_chunk(n)
                .map_err(|e| Error::io(self.spec.role, e))?;
            let (first, second) = chunk.as_mut_slices();
            let src = &buf[written..written + n];
            let split = first.len();
            first.copy_from_slice(&src[..split]);
            second.copy_from_slice(&src[split..]);
            chunk.commit_all();
            written += n;
        }

        self.report_underruns();
        Ok(buf.len() / usize::from(self.spec.channels))
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        // Let the device drain what is queued, bounded by twice the ring length
        let capacity = self.capacity;
        let frames = capacity as f64 / f64::from(self.spec.channels.max(1));
        let limit = Duration::from_secs_f64(2.0 * frames / f64::from(self.spec.sample_rate.max(1)));
        let deadline = Instant::now() + limit;
        while self.producer.slots() < capacity
            && self.status.error.get().is_none()
            && Instant::now() < deadline
        {
            thread::sleep(poll_interval(&self.spec));
        }

        let queued = capacity - self.producer.slots();
        if queued > 0 {
            tracing::warn!(role = self.spec.role, queued, "playback closed with audio still queued");
        }

        let result = self.stream.pause().map_err(|e| Error::io(self.spec.role, e));
        tracing::info!(role = self.spec.role, "playback stream closed");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_holds_the_buffer_limit() {
        // 12288 bytes of f32, well above four 768-frame periods
        assert_eq!(ring_capacity(&PortSpec::mpx_output(192_000)), 3072);
        assert_eq!(ring_capacity(&PortSpec::audio_input(192_000)), 3072);
    }

    #[test]
    fn stream_config_uses_fragment_size() {
        let config = stream_config(&PortSpec::audio_input(192_000));
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, 192_000);
        assert!(matches!(config.buffer_size, cpal::BufferSize::Fixed(384)));
    }

    #[test]
    fn poll_interval_is_a_fraction_of_a_period() {
        let interval = poll_interval(&PortSpec::mpx_output(192_000));
        // 768 frames at 192 kHz is 4 ms
        assert!((interval.as_secs_f64() - 0.001).abs() < 1e-6, "got {interval:?}");
    }

    #[test]
    fn status_reports_first_error() {
        let status = StreamStatus::default();
        assert!(status.check("MPX Output").is_ok());

        let _ = status.error.set("device unplugged".to_string());
        let _ = status.error.set("second error".to_string());
        match status.check("MPX Output") {
            Err(Error::DeviceIo { reason, .. }) => assert_eq!(reason, "device unplugged"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn status_reports_overrun() {
        let status = StreamStatus::default();
        status.overrun.store(true, Ordering::Release);
        let err = status.check("Audio In").unwrap_err();
        assert!(err.to_string().contains("overrun"), "got: {err}");
    }

    // Requires audio hardware; not run in CI.
    #[test]
    #[ignore]
    fn list_devices_on_host() {
        let backend = CpalBackend::new();
        let devices = backend.list_devices().unwrap();
        println!("found {} devices", devices.len());
    }
}
