//! In-memory ports for deterministic tests.
//!
//! [`MemoryBackend`] serves capture data from vectors, collects playback data
//! into vectors, and records every open and close so tests can check
//! ordering. Failures can be injected at open time or after a number of
//! successful calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use fm96_config::PortId;

use crate::backend::{AudioBackend, CapturePort, PlaybackPort, PortSpec, check_frame_aligned};
use crate::engine::CancelToken;
use crate::{Error, Result};

/// A port lifecycle event, tagged with the port's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    /// The port was opened.
    Opened(&'static str),
    /// The port was closed.
    Closed(&'static str),
}

#[derive(Debug, Clone)]
enum Source {
    Samples(Arc<[f32]>),
    Silence,
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    fail_open: bool,
    fail_after: Option<usize>,
    cancel_after: Option<(usize, CancelToken)>,
}

type Shared<T> = Arc<Mutex<T>>;

fn lock<T>(shared: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend whose ports live in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sources: HashMap<String, Source>,
    behaviors: HashMap<String, Behavior>,
    sinks: Shared<HashMap<String, Vec<f32>>>,
    events: Shared<Vec<PortEvent>>,
}

impl MemoryBackend {
    /// Create an empty backend. Any playback port can be opened; capture
    /// ports need a source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `samples` (interleaved) from capture port `port`, then end.
    pub fn with_input(mut self, port: &str, samples: Vec<f32>) -> Self {
        self.sources
            .insert(port.to_string(), Source::Samples(samples.into()));
        self
    }

    /// Serve silence from capture port `port` forever.
    pub fn with_silence(mut self, port: &str) -> Self {
        self.sources.insert(port.to_string(), Source::Silence);
        self
    }

    /// Make opening `port` fail.
    pub fn fail_open(mut self, port: &str) -> Self {
        self.behavior(port).fail_open = true;
        self
    }

    /// Make `port` fail on the call after `calls` successful reads or writes.
    pub fn fail_after(mut self, port: &str, calls: usize) -> Self {
        self.behavior(port).fail_after = Some(calls);
        self
    }

    /// Raise `token` once `port` has completed `calls` reads or writes.
    pub fn cancel_after(mut self, port: &str, calls: usize, token: &CancelToken) -> Self {
        self.behavior(port).cancel_after = Some((calls, token.clone()));
        self
    }

    /// Everything written to playback port `port` so far.
    pub fn output(&self, port: &str) -> Vec<f32> {
        lock(&self.sinks).get(port).cloned().unwrap_or_default()
    }

    /// Every open and close, in order.
    pub fn events(&self) -> Vec<PortEvent> {
        lock(&self.events).clone()
    }

    fn behavior(&mut self, port: &str) -> &mut Behavior {
        self.behaviors.entry(port.to_string()).or_default()
    }

    fn open(&self, port: &PortId, spec: &PortSpec) -> Result<Behavior> {
        let behavior = self
            .behaviors
            .get(&port.to_string())
            .cloned()
            .unwrap_or_default();
        if behavior.fail_open {
            return Err(Error::open(spec.role, port, "injected open failure"));
        }
        lock(&self.events).push(PortEvent::Opened(spec.role));
        Ok(behavior)
    }
}

impl AudioBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open_capture(&self, port: &PortId, spec: &PortSpec) -> Result<Box<dyn CapturePort>> {
        let source = self
            .sources
            .get(&port.to_string())
            .cloned()
            .ok_or_else(|| Error::open(spec.role, port, "no such memory port"))?;
        let behavior = self.open(port, spec)?;

        Ok(Box::new(MemoryCapture {
            source,
            position: 0,
            calls: 0,
            behavior,
            spec: *spec,
            events: Arc::clone(&self.events),
        }))
    }

    fn open_playback(&self, port: &PortId, spec: &PortSpec) -> Result<Box<dyn PlaybackPort>> {
        let behavior = self.open(port, spec)?;
        lock(&self.sinks).entry(port.to_string()).or_default();

        Ok(Box::new(MemoryPlayback {
            name: port.to_string(),
            sinks: Arc::clone(&self.sinks),
            calls: 0,
            behavior,
            spec: *spec,
            events: Arc::clone(&self.events),
        }))
    }
}

/// Counts a completed call and applies injected behavior.
fn step(behavior: &Behavior, calls: &mut usize, role: &'static str) -> Result<()> {
    if behavior.fail_after.is_some_and(|n| *calls >= n) {
        return Err(Error::io(role, "injected I/O failure"));
    }
    *calls += 1;
    if let Some((n, token)) = &behavior.cancel_after
        && *calls >= *n
    {
        token.cancel();
    }
    Ok(())
}

struct MemoryCapture {
    source: Source,
    position: usize,
    calls: usize,
    behavior: Behavior,
    spec: PortSpec,
    events: Shared<Vec<PortEvent>>,
}

impl CapturePort for MemoryCapture {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        check_frame_aligned(self.spec.role, buf.len(), self.spec.channels)?;
        step(&self.behavior, &mut self.calls, self.spec.role)?;

        let filled = match &self.source {
            Source::Silence => {
                buf.fill(0.0);
                buf.len()
            }
            Source::Samples(samples) => {
                let remaining = &samples[self.position.min(samples.len())..];
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                self.position += n;
                n
            }
        };
        Ok(filled / usize::from(self.spec.channels))
    }

    fn close(self: Box<Self>) -> Result<()> {
        lock(&self.events).push(PortEvent::Closed(self.spec.role));
        Ok(())
    }
}

struct MemoryPlayback {
    name: String,
    sinks: Shared<HashMap<String, Vec<f32>>>,
    calls: usize,
    behavior: Behavior,
    spec: PortSpec,
    events: Shared<Vec<PortEvent>>,
}

impl PlaybackPort for MemoryPlayback {
    fn write(&mut self, buf: &[f32]) -> Result<usize> {
        check_frame_aligned(self.spec.role, buf.len(), self.spec.channels)?;
        step(&self.behavior, &mut self.calls, self.spec.role)?;

        lock(&self.sinks)
            .entry(self.name.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len() / usize::from(self.spec.channels))
    }

    fn close(self: Box<Self>) -> Result<()> {
        lock(&self.events).push(PortEvent::Closed(self.spec.role));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ROLE_AUDIO_IN, ROLE_MPX_OUT};

    #[test]
    fn capture_serves_samples_then_ends() {
        let backend = MemoryBackend::new().with_input("a", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let port: PortId = "a".parse().unwrap();
        let mut capture = backend
            .open_capture(&port, &PortSpec::audio_input(192_000))
            .unwrap();

        let mut buf = [0.0; 4];
        assert_eq!(capture.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(capture.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf[..2], &[5.0, 6.0]);
        assert_eq!(capture.read(&mut buf).unwrap(), 0);
        capture.close().unwrap();

        assert_eq!(
            backend.events(),
            vec![PortEvent::Opened(ROLE_AUDIO_IN), PortEvent::Closed(ROLE_AUDIO_IN)]
        );
    }

    #[test]
    fn unknown_capture_port_fails_to_open() {
        let backend = MemoryBackend::new();
        let err = backend
            .open_capture(&PortId::Default, &PortSpec::audio_input(192_000))
            .err()
            .unwrap();
        assert!(matches!(err, Error::DeviceOpen { .. }));
        assert!(backend.events().is_empty());
    }

    #[test]
    fn playback_collects_output() {
        let backend = MemoryBackend::new();
        let mut playback = backend
            .open_playback(&PortId::Default, &PortSpec::mpx_output(192_000))
            .unwrap();
        playback.write(&[0.1, 0.2]).unwrap();
        playback.write(&[0.3]).unwrap();
        playback.close().unwrap();

        assert_eq!(backend.output("default"), vec![0.1, 0.2, 0.3]);
        assert_eq!(
            backend.events(),
            vec![PortEvent::Opened(ROLE_MPX_OUT), PortEvent::Closed(ROLE_MPX_OUT)]
        );
    }

    #[test]
    fn injected_failure_after_calls() {
        let backend = MemoryBackend::new().fail_after("default", 2);
        let mut playback = backend
            .open_playback(&PortId::Default, &PortSpec::mpx_output(192_000))
            .unwrap();
        assert!(playback.write(&[0.0]).is_ok());
        assert!(playback.write(&[0.0]).is_ok());
        let err = playback.write(&[0.0]).unwrap_err();
        assert!(matches!(err, Error::DeviceIo { role: ROLE_MPX_OUT, .. }));
    }

    #[test]
    fn cancel_after_calls() {
        let token = CancelToken::new();
        let backend = MemoryBackend::new()
            .with_silence("in")
            .cancel_after("in", 3, &token);
        let mut capture = backend
            .open_capture(&"in".parse().unwrap(), &PortSpec::audio_input(192_000))
            .unwrap();

        let mut buf = [1.0; 2];
        for _ in 0..2 {
            capture.read(&mut buf).unwrap();
            assert!(!token.is_cancelled());
        }
        capture.read(&mut buf).unwrap();
        assert!(token.is_cancelled());
        assert_eq!(buf, [0.0, 0.0]);
    }
}
