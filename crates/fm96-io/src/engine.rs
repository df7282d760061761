//! Block-wise processing loop.
//!
//! One thread does everything: read a stereo block, read an optional
//! auxiliary block, encode, write the composite block. Buffers are allocated
//! once in [`RealtimeLoop::new`]; nothing allocates per block.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fm96_config::EncoderConfig;
use fm96_core::StereoEncoder;

use crate::backend::{AudioBackend, CapturePort, PlaybackPort, PortSpec};
use crate::Result;

/// Frames per processing block.
pub const BLOCK_FRAMES: usize = 768;

/// Cooperative stop signal shared between a signal handler and the loop.
///
/// The loop checks it once per block, so at most one more block is processed
/// after [`cancel`](Self::cancel).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The open ports of one run.
///
/// Opened in the order output, input, auxiliary; closed in reverse.
pub struct Ports {
    output: Box<dyn PlaybackPort>,
    input: Box<dyn CapturePort>,
    mpx: Option<Box<dyn CapturePort>>,
}

impl Ports {
    /// Open every port named by `config`.
    ///
    /// If a later port fails to open, the ones already open are closed in
    /// reverse order before the error is returned.
    pub fn open(backend: &dyn AudioBackend, config: &EncoderConfig) -> Result<Self> {
        let rate = config.sample_rate;
        tracing::debug!(backend = backend.name(), "opening ports");

        let output = backend.open_playback(&config.output, &PortSpec::mpx_output(rate))?;

        let input = match backend.open_capture(&config.input, &PortSpec::audio_input(rate)) {
            Ok(input) => input,
            Err(e) => {
                close_quietly("output", output.close());
                return Err(e);
            }
        };

        let mpx = match &config.mpx {
            Some(port) => match backend.open_capture(port, &PortSpec::mpx_input(rate)) {
                Ok(mpx) => Some(mpx),
                Err(e) => {
                    close_quietly("input", input.close());
                    close_quietly("output", output.close());
                    return Err(e);
                }
            },
            None => None,
        };

        Ok(Self { output, input, mpx })
    }

    /// Whether an auxiliary capture port is open.
    pub fn has_mpx(&self) -> bool {
        self.mpx.is_some()
    }

    /// Close every port in reverse open order.
    ///
    /// All ports are closed even if one fails; the first error is returned.
    pub fn close(self) -> Result<()> {
        let Self { output, input, mpx } = self;
        let mut result = Ok(());

        if let Some(mpx) = mpx {
            result = result.and(mpx.close());
        }
        result = result.and(input.close());
        result.and(output.close())
    }
}

/// Log a close failure that would otherwise hide the error being returned.
fn close_quietly(which: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(port = which, error = %e, "close failed while unwinding");
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The [`CancelToken`] was raised.
    Cancelled,
    /// A capture source ran out of audio.
    EndOfStream,
}

/// Totals for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Blocks written to the output.
    pub blocks: u64,
    /// Composite frames written to the output.
    pub frames: u64,
    /// Why the loop stopped.
    pub reason: StopReason,
}

/// Drives a [`StereoEncoder`] over open [`Ports`].
pub struct RealtimeLoop {
    encoder: StereoEncoder,
    interleaved: Vec<f32>,
    left: Vec<f32>,
    right: Vec<f32>,
    external: Vec<f32>,
    composite: Vec<f32>,
}

impl RealtimeLoop {
    /// Wrap `encoder` and allocate the block buffers.
    pub fn new(encoder: StereoEncoder) -> Self {
        Self {
            encoder,
            interleaved: vec![0.0; 2 * BLOCK_FRAMES],
            left: vec![0.0; BLOCK_FRAMES],
            right: vec![0.0; BLOCK_FRAMES],
            external: vec![0.0; BLOCK_FRAMES],
            composite: vec![0.0; BLOCK_FRAMES],
        }
    }

    /// The encoder being driven.
    pub fn encoder(&self) -> &StereoEncoder {
        &self.encoder
    }

    /// Process blocks until `cancel` is raised, a source ends, or a port
    /// fails.
    ///
    /// Consumes `ports` and closes every one of them exactly once, whatever
    /// the outcome. A port failure is returned after closing.
    pub fn run(&mut self, mut ports: Ports, cancel: &CancelToken) -> Result<RunSummary> {
        tracing::info!(
            stereo = self.encoder.is_stereo(),
            mpx = ports.has_mpx(),
            block_frames = BLOCK_FRAMES,
            "encoder running"
        );

        let outcome = self.pump(&mut ports, cancel);
        let closed = ports.close();

        match outcome {
            Ok(summary) => {
                closed?;
                tracing::info!(
                    blocks = summary.blocks,
                    frames = summary.frames,
                    reason = ?summary.reason,
                    "encoder stopped"
                );
                Ok(summary)
            }
            Err(e) => {
                close_quietly("all", closed);
                Err(e)
            }
        }
    }

    fn pump(&mut self, ports: &mut Ports, cancel: &CancelToken) -> Result<RunSummary> {
        let mut blocks = 0u64;

        let reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let frames = ports.input.read(&mut self.interleaved)?;
            if frames == 0 {
                break StopReason::EndOfStream;
            }
            let mut last = frames < BLOCK_FRAMES;
            self.deinterleave(frames);

            let external = match ports.mpx.as_mut() {
                Some(mpx) => {
                    let aux = mpx.read(&mut self.external)?;
                    if aux < BLOCK_FRAMES {
                        self.external[aux..].fill(0.0);
                        last = true;
                    }
                    Some(self.external.as_slice())
                }
                None => None,
            };

            self.encoder
                .process_block(&self.left, &self.right, external, &mut self.composite);
            ports.output.write(&self.composite)?;
            blocks += 1;

            if last {
                break StopReason::EndOfStream;
            }
        };

        Ok(RunSummary {
            blocks,
            frames: blocks * BLOCK_FRAMES as u64,
            reason,
        })
    }

    /// Split the interleaved block into channels, zero-padding past `frames`.
    fn deinterleave(&mut self, frames: usize) {
        for (i, frame) in self.interleaved.chunks_exact(2).enumerate() {
            if i < frames {
                self.left[i] = frame[0];
                self.right[i] = frame[1];
            } else {
                self.left[i] = 0.0;
                self.right[i] = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBackend, PortEvent};
    use crate::backend::{ROLE_AUDIO_IN, ROLE_MPX_IN, ROLE_MPX_OUT};
    use fm96_core::EncoderSettings;

    fn engine() -> RealtimeLoop {
        RealtimeLoop::new(StereoEncoder::new(&EncoderSettings::default()))
    }

    fn config(mpx: Option<&str>) -> EncoderConfig {
        EncoderConfig {
            input: "in".parse().unwrap(),
            output: "out".parse().unwrap(),
            mpx: mpx.map(|p| p.parse().unwrap()),
            ..EncoderConfig::default()
        }
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn deinterleave_pads_short_blocks() {
        let mut engine = engine();
        engine.interleaved.fill(7.0);
        engine.interleaved[0] = 1.0;
        engine.interleaved[1] = 2.0;
        engine.deinterleave(1);
        assert_eq!((engine.left[0], engine.right[0]), (1.0, 2.0));
        assert!(engine.left[1..].iter().all(|&s| s == 0.0));
        assert!(engine.right[1..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn pre_cancelled_run_processes_nothing() {
        let backend = MemoryBackend::new().with_silence("in");
        let ports = Ports::open(&backend, &config(None)).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let summary = engine().run(ports, &cancel).unwrap();
        assert_eq!(summary.blocks, 0);
        assert_eq!(summary.reason, StopReason::Cancelled);
        assert!(backend.output("out").is_empty());
    }

    #[test]
    fn open_order_and_reverse_close() {
        let backend = MemoryBackend::new().with_silence("in").with_silence("aux");
        let ports = Ports::open(&backend, &config(Some("aux"))).unwrap();
        assert!(ports.has_mpx());
        ports.close().unwrap();

        assert_eq!(
            backend.events(),
            vec![
                PortEvent::Opened(ROLE_MPX_OUT),
                PortEvent::Opened(ROLE_AUDIO_IN),
                PortEvent::Opened(ROLE_MPX_IN),
                PortEvent::Closed(ROLE_MPX_IN),
                PortEvent::Closed(ROLE_AUDIO_IN),
                PortEvent::Closed(ROLE_MPX_OUT),
            ]
        );
    }
}
