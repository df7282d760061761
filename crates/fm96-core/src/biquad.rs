//! Biquad (bi-quadratic) filter structure.
//!
//! Provides the generic second-order IIR section used for both encoder
//! stages. A stage is nothing more than a [`Biquad`] plus the coefficient
//! set produced by one of the design functions below:
//!
//! - [`preemphasis_coefficients`] - first-order broadcast preemphasis shelf
//! - [`lowpass_coefficients`] - resonant second-order lowpass (RBJ cookbook)
//!
//! Both designs go through the bilinear transform, so the digital response
//! matches the analog prototype at DC and compresses the frequency axis
//! towards Nyquist.

use core::f32::consts::PI;
use libm::{cosf, sinf};

/// Upper corner of the preemphasis shelf in Hz.
///
/// The analog preemphasis `1 + sτ` keeps rising forever; a second pole at this
/// frequency turns it into a shelf with finite gain at Nyquist.
pub const PREEMPHASIS_SHELF_HZ: f32 = 21_000.0;

/// Generic biquad filter coefficients and state.
///
/// Implements the Direct Form I biquad structure:
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
///
/// Every channel and every stage owns its own instance; history is never
/// shared.
#[derive(Debug, Clone)]
pub struct Biquad {
    /// Feedforward coefficients
    b0: f32,
    b1: f32,
    b2: f32,

    /// Feedback coefficients (normalized by a0)
    a1: f32,
    a2: f32,

    /// Input delay line: x[n-1], x[n-2]
    x1: f32,
    x2: f32,

    /// Output delay line: y[n-1], y[n-2]
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Creates a new biquad with passthrough coefficients.
    ///
    /// Initial state: `y[n] = x[n]` (no filtering)
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Creates a biquad from a `(b0, b1, b2, a0, a1, a2)` design tuple.
    ///
    /// ```rust
    /// use fm96_core::{Biquad, lowpass_coefficients};
    ///
    /// let mut lp = Biquad::from_coefficients(lowpass_coefficients(15_000.0, 5.0, 192_000.0));
    /// let y = lp.process(1.0);
    /// assert!(y.is_finite());
    /// ```
    pub fn from_coefficients(coefficients: (f32, f32, f32, f32, f32, f32)) -> Self {
        let (b0, b1, b2, a0, a1, a2) = coefficients;
        let mut biquad = Self::new();
        biquad.set_coefficients(b0, b1, b2, a0, a1, a2);
        biquad
    }

    /// Sets the biquad coefficients.
    ///
    /// # Arguments
    ///
    /// * `b0, b1, b2` - Feedforward coefficients
    /// * `a0, a1, a2` - Feedback coefficients (a0 is typically 1.0)
    ///
    /// Note: This function normalizes by a0 internally.
    pub fn set_coefficients(&mut self, b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) {
        let a0_inv = 1.0 / a0;
        self.b0 = b0 * a0_inv;
        self.b1 = b1 * a0_inv;
        self.b2 = b2 * a0_inv;
        self.a1 = a1 * a0_inv;
        self.a2 = a2 * a0_inv;
    }

    /// Returns the normalized coefficients as `(b0, b1, b2, a1, a2)`.
    pub fn coefficients(&self) -> (f32, f32, f32, f32, f32) {
        (self.b0, self.b1, self.b2, self.a1, self.a2)
    }

    /// Processes a single sample through the biquad filter.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        #[rustfmt::skip]
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
                                     - self.a1 * self.y1 - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Clears the filter state (delay lines) without touching coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Largest magnitude currently held in the delay lines.
    pub fn state_magnitude(&self) -> f32 {
        self.x1.abs().max(self.x2.abs()).max(self.y1.abs()).max(self.y2.abs())
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculates low-pass filter coefficients using the RBJ cookbook formula.
///
/// # Arguments
///
/// * `frequency` - Cutoff frequency in Hz
/// * `q` - Q factor (0.707 is Butterworth; the encoder uses 5.0)
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
///
/// (b0, b1, b2, a0, a1, a2) coefficients
pub fn lowpass_coefficients(frequency: f32, q: f32, sample_rate: f32) -> (f32, f32, f32, f32, f32, f32) {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = cosf(omega);
    let sin_omega = sinf(omega);
    let alpha = sin_omega / (2.0 * q);

    let b0 = (1.0 - cos_omega) / 2.0;
    let b1 = 1.0 - cos_omega;
    let b2 = (1.0 - cos_omega) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_omega;
    let a2 = 1.0 - alpha;

    (b0, b1, b2, a0, a1, a2)
}

/// Calculates broadcast preemphasis coefficients.
///
/// The analog prototype is a first-order high shelf
///
/// ```text
///          1 + s·tau
/// H(s) = -------------      tau_p = 1 / (2π · PREEMPHASIS_SHELF_HZ)
///          1 + s·tau_p
/// ```
///
/// mapped to the z-plane with the bilinear transform `s = K(1 - z⁻¹)/(1 + z⁻¹)`,
/// `K = 2·sample_rate`. DC gain is exactly 1 and the gain at Nyquist is
/// `tau / tau_p`. The second-order slots (`b2`, `a2`) are zero.
///
/// # Arguments
///
/// * `tau` - Time constant in seconds (50e-6 in Europe, 75e-6 in the Americas)
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
///
/// (b0, b1, b2, a0, a1, a2) coefficients
pub fn preemphasis_coefficients(tau: f32, sample_rate: f32) -> (f32, f32, f32, f32, f32, f32) {
    let k = 2.0 * sample_rate;
    let tau_p = 1.0 / (2.0 * PI * PREEMPHASIS_SHELF_HZ);

    let b0 = 1.0 + k * tau;
    let b1 = 1.0 - k * tau;
    let a0 = 1.0 + k * tau_p;
    let a1 = 1.0 - k * tau_p;

    (b0, b1, 0.0, a0, a1, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 192_000.0;

    #[test]
    fn test_biquad_passthrough() {
        let mut biquad = Biquad::new();

        for i in 0..10 {
            let input = i as f32 * 0.1;
            let output = biquad.process(input);
            assert!((output - input).abs() < 0.0001);
        }
    }

    #[test]
    fn test_biquad_clear() {
        let mut biquad = Biquad::from_coefficients(lowpass_coefficients(15_000.0, 5.0, SR));

        for _ in 0..10 {
            biquad.process(1.0);
        }
        assert!(biquad.state_magnitude() > 0.0);

        biquad.clear();

        assert_eq!(biquad.x1, 0.0);
        assert_eq!(biquad.x2, 0.0);
        assert_eq!(biquad.y1, 0.0);
        assert_eq!(biquad.y2, 0.0);
    }

    #[test]
    fn test_from_coefficients_normalizes() {
        let biquad = Biquad::from_coefficients((2.0, 4.0, 6.0, 2.0, 1.0, 0.5));
        assert_eq!(biquad.coefficients(), (1.0, 2.0, 3.0, 0.5, 0.25));
    }

    #[test]
    fn test_lowpass_coefficients() {
        let (b0, b1, b2, a0, a1, a2) = lowpass_coefficients(15_000.0, 5.0, SR);

        for c in [b0, b1, b2, a0, a1, a2] {
            assert!(c.is_finite());
        }
        assert!(a0 > 0.0);
        // Symmetric feedforward section of the RBJ lowpass
        assert_eq!(b0, b2);
        assert!((b1 - 2.0 * b0).abs() < 1e-7);
    }

    #[test]
    fn test_biquad_lowpass_dc_pass() {
        let mut biquad = Biquad::from_coefficients(lowpass_coefficients(15_000.0, 5.0, SR));

        let mut output = 0.0;
        for _ in 0..4000 {
            output = biquad.process(1.0);
        }

        assert!((output - 1.0).abs() < 1e-4, "DC gain should be unity, got {output}");
    }

    #[test]
    fn test_preemphasis_coefficients_first_order() {
        let (b0, b1, b2, a0, a1, a2) = preemphasis_coefficients(50e-6, SR);

        assert_eq!(b2, 0.0);
        assert_eq!(a2, 0.0);
        assert!(a0 > 0.0);
        // Pole inside the unit circle
        assert!((a1 / a0).abs() < 1.0);
        // Boost: b0 dominates
        assert!(b0 / a0 > 1.0);
        assert!(b1 < 0.0);
    }

    #[test]
    fn test_preemphasis_dc_unity() {
        let mut biquad = Biquad::from_coefficients(preemphasis_coefficients(50e-6, SR));

        let mut output = 0.0;
        for _ in 0..1000 {
            output = biquad.process(1.0);
        }

        assert!((output - 1.0).abs() < 1e-4, "DC should pass at unity, got {output}");
    }

    #[test]
    fn test_preemphasis_nyquist_gain_is_tau_ratio() {
        let tau = 50e-6;
        let mut biquad = Biquad::from_coefficients(preemphasis_coefficients(tau, SR));

        // Alternating ±1 is a Nyquist-frequency sinusoid
        let mut output = 0.0;
        for n in 0..1000 {
            let x = if n % 2 == 0 { 1.0 } else { -1.0 };
            output = biquad.process(x).abs();
        }

        let expected = tau * 2.0 * PI * PREEMPHASIS_SHELF_HZ;
        assert!(
            (output - expected).abs() / expected < 1e-3,
            "Nyquist gain {output}, expected {expected}"
        );
    }
}
