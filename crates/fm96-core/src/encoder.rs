//! Stereo MPX encoder.
//!
//! Turns one stereo audio frame into one composite baseband sample:
//!
//! ```text
//! left  ──► preemphasis ──► lowpass ──┐   mono = (L + R) / 2
//!                                      ├─► diff = (L - R) / 2
//! right ──► preemphasis ──► lowpass ──┘
//!
//! composite = 0.45·mono + 0.09·pilot(19 kHz) + 0.45·diff·sin(2·pilot phase)
//!           + external
//! ```
//!
//! In mono mode the composite is just `mono + external`.
//!
//! The output is not clamped. With full-scale audio and no external signal
//! the stereo composite peaks at 0.99; anything injected through `external`
//! adds on top, and bounding the sum is the job of whoever feeds the
//! modulator.

use crate::biquad::{Biquad, lowpass_coefficients, preemphasis_coefficients};
use crate::oscillator::Oscillator;

/// Stereo pilot frequency in Hz.
pub const PILOT_HZ: f32 = 19_000.0;

/// Harmonic of the pilot carrying the L-R subcarrier (38 kHz).
pub const SUBCARRIER_HARMONIC: u32 = 2;

/// Gain applied to the L+R component in stereo mode.
pub const MONO_GAIN: f32 = 0.45;

/// Pilot injection level.
pub const PILOT_GAIN: f32 = 0.09;

/// Gain applied to the L-R subcarrier.
pub const STEREO_GAIN: f32 = 0.45;

/// Broadcast preemphasis time constant used in Europe, in seconds.
pub const DEFAULT_PREEMPHASIS_TAU: f32 = 50e-6;

/// Audio band limit in Hz.
pub const DEFAULT_LOWPASS_HZ: f32 = 15_000.0;

/// Resonance of the audio lowpass.
pub const DEFAULT_LOWPASS_Q: f32 = 5.0;

/// Default processing sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 192_000;

/// Construction parameters for [`StereoEncoder`].
///
/// Everything here is fixed for the lifetime of the encoder; coefficients and
/// phase increments are derived once in [`StereoEncoder::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    /// Processing sample rate in Hz.
    pub sample_rate: u32,
    /// Emit pilot and L-R subcarrier. When false the output is plain mono.
    pub stereo: bool,
    /// Preemphasis time constant in seconds.
    pub preemphasis_tau: f32,
    /// Lowpass cutoff in Hz.
    pub lowpass_hz: f32,
    /// Lowpass resonance.
    pub lowpass_q: f32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            stereo: true,
            preemphasis_tau: DEFAULT_PREEMPHASIS_TAU,
            lowpass_hz: DEFAULT_LOWPASS_HZ,
            lowpass_q: DEFAULT_LOWPASS_Q,
        }
    }
}

/// One channel's filter chain: preemphasis followed by the band-limiting
/// lowpass.
///
/// The encoder owns two of these, so four independent [`Biquad`] states in
/// total.
#[derive(Debug, Clone)]
pub struct ChannelFilter {
    preemphasis: Biquad,
    lowpass: Biquad,
}

impl ChannelFilter {
    /// Build the chain for one channel.
    pub fn new(settings: &EncoderSettings) -> Self {
        let sample_rate = settings.sample_rate as f32;
        Self {
            preemphasis: Biquad::from_coefficients(preemphasis_coefficients(
                settings.preemphasis_tau,
                sample_rate,
            )),
            lowpass: Biquad::from_coefficients(lowpass_coefficients(
                settings.lowpass_hz,
                settings.lowpass_q,
                sample_rate,
            )),
        }
    }

    /// Run one sample through preemphasis, then lowpass.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.lowpass.process(self.preemphasis.process(input))
    }

    /// The preemphasis stage.
    pub fn preemphasis(&self) -> &Biquad {
        &self.preemphasis
    }

    /// The lowpass stage.
    pub fn lowpass(&self) -> &Biquad {
        &self.lowpass
    }

    /// Clear both stages' history.
    pub fn clear(&mut self) {
        self.preemphasis.clear();
        self.lowpass.clear();
    }
}

/// Per-sample stereo multiplex encoder.
///
/// # Example
///
/// ```rust
/// use fm96_core::{EncoderSettings, StereoEncoder};
///
/// let mut encoder = StereoEncoder::new(&EncoderSettings::default());
/// let composite = encoder.process(0.25, -0.25, 0.0);
/// assert!(composite.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct StereoEncoder {
    pilot: Oscillator,
    left: ChannelFilter,
    right: ChannelFilter,
    stereo: bool,
}

impl StereoEncoder {
    /// Build the encoder: four filter instances and the pilot oscillator.
    pub fn new(settings: &EncoderSettings) -> Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            sample_rate = settings.sample_rate,
            stereo = settings.stereo,
            tau = settings.preemphasis_tau,
            lowpass_hz = settings.lowpass_hz,
            lowpass_q = settings.lowpass_q,
            "stereo encoder configured"
        );

        Self {
            pilot: Oscillator::new(PILOT_HZ, settings.sample_rate as f32),
            left: ChannelFilter::new(settings),
            right: ChannelFilter::new(settings),
            stereo: settings.stereo,
        }
    }

    /// Whether pilot and subcarrier are being generated.
    pub fn is_stereo(&self) -> bool {
        self.stereo
    }

    /// The pilot oscillator, positioned at the next sample to be encoded.
    pub fn pilot(&self) -> &Oscillator {
        &self.pilot
    }

    /// Encode one frame.
    ///
    /// `external` is added to the composite unchanged; pass 0.0 when no
    /// auxiliary subcarrier is configured.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32, external: f32) -> f32 {
        let l = self.left.process(left);
        let r = self.right.process(right);

        let mono = (l + r) / 2.0;
        let diff = (l - r) / 2.0;

        let pilot = self.pilot.sine();
        let subcarrier = self.pilot.sine_harmonic(SUBCARRIER_HARMONIC);

        let mut composite = if self.stereo {
            mono * MONO_GAIN + pilot * PILOT_GAIN + (diff * subcarrier) * STEREO_GAIN
        } else {
            mono
        };
        composite += external;

        self.pilot.advance();

        composite
    }

    /// Encode a block of frames.
    ///
    /// `left`, `right`, `output` and, when present, `external` must all have
    /// the same length.
    pub fn process_block(
        &mut self,
        left: &[f32],
        right: &[f32],
        external: Option<&[f32]>,
        output: &mut [f32],
    ) {
        debug_assert_eq!(left.len(), output.len());
        debug_assert_eq!(right.len(), output.len());

        match external {
            Some(external) => {
                debug_assert_eq!(external.len(), output.len());
                for i in 0..output.len() {
                    output[i] = self.process(left[i], right[i], external[i]);
                }
            }
            None => {
                for i in 0..output.len() {
                    output[i] = self.process(left[i], right[i], 0.0);
                }
            }
        }
    }

    /// Return filters and pilot to their initial state.
    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.pilot.reset();
    }
}
