//! Property-based tests for the fm96-core encoder.
//!
//! Uses proptest to check the invariants the composite signal relies on:
//! determinism, exact mono fallback, additive external injection, phase
//! lock between pilot and subcarrier, and filter stability.

use fm96_core::{
    Biquad, ChannelFilter, EncoderSettings, Oscillator, StereoEncoder, lowpass_coefficients,
    preemphasis_coefficients,
};
use proptest::prelude::*;

fn settings(stereo: bool, sample_rate: u32) -> EncoderSettings {
    EncoderSettings {
        sample_rate,
        stereo,
        ..EncoderSettings::default()
    }
}

fn sample_rate_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(192_000u32), Just(176_400u32), Just(228_000u32), 110_000u32..400_000u32]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Same input and same initial state give bit-identical output.
    #[test]
    fn encoder_is_deterministic(
        left in prop::collection::vec(-1.0f32..=1.0f32, 1..512),
        stereo in any::<bool>(),
        sample_rate in sample_rate_strategy(),
    ) {
        let right: Vec<f32> = left.iter().rev().copied().collect();
        let mut a = StereoEncoder::new(&settings(stereo, sample_rate));
        let mut b = StereoEncoder::new(&settings(stereo, sample_rate));

        for (&l, &r) in left.iter().zip(right.iter()) {
            let x = a.process(l, r, 0.0);
            let y = b.process(l, r, 0.0);
            prop_assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    /// With stereo off, the composite is exactly the filtered mono sum.
    #[test]
    fn mono_mode_outputs_mono(
        left in prop::array::uniform32(-1.0f32..=1.0f32),
        right in prop::array::uniform32(-1.0f32..=1.0f32),
    ) {
        let s = settings(false, 192_000);
        let mut encoder = StereoEncoder::new(&s);
        let mut filter_l = ChannelFilter::new(&s);
        let mut filter_r = ChannelFilter::new(&s);

        for i in 0..32 {
            let mono = (filter_l.process(left[i]) + filter_r.process(right[i])) / 2.0;
            prop_assert_eq!(encoder.process(left[i], right[i], 0.0), mono);
        }
    }

    /// A constant external signal shifts every composite sample by exactly
    /// that amount, in both modes.
    #[test]
    fn external_injection_is_additive(
        left in prop::array::uniform32(-1.0f32..=1.0f32),
        right in prop::array::uniform32(-1.0f32..=1.0f32),
        v in -1.0f32..=1.0f32,
        stereo in any::<bool>(),
    ) {
        let mut without = StereoEncoder::new(&settings(stereo, 192_000));
        let mut with = StereoEncoder::new(&settings(stereo, 192_000));

        for i in 0..32 {
            let a = without.process(left[i], right[i], 0.0);
            let b = with.process(left[i], right[i], v);
            prop_assert!(((b - a) - v).abs() <= 1e-6 * (1.0 + a.abs()),
                "sample {}: {} - {} != {}", i, b, a, v);
        }
    }

    /// The subcarrier is always the second harmonic of the pilot's own phase.
    #[test]
    fn subcarrier_is_phase_locked(
        steps in 0usize..50_000,
        sample_rate in sample_rate_strategy(),
    ) {
        let mut osc = Oscillator::new(19_000.0, sample_rate as f32);
        for _ in 0..steps {
            osc.advance();
        }
        prop_assert_eq!(osc.sine_harmonic(2), libm::sin(2.0 * osc.phase()) as f32);
        prop_assert!((0.0..core::f64::consts::TAU).contains(&osc.phase()));
    }

    /// Both filter stages produce finite output for any in-range input and
    /// any supported sample rate.
    #[test]
    fn filter_stages_are_stable(
        input in prop::array::uniform32(-1.0f32..=1.0f32),
        sample_rate in sample_rate_strategy(),
        tau_us in 25.0f32..100.0f32,
    ) {
        let fs = sample_rate as f32;
        let mut pre = Biquad::from_coefficients(preemphasis_coefficients(tau_us * 1e-6, fs));
        let mut lp = Biquad::from_coefficients(lowpass_coefficients(15_000.0, 5.0, fs));

        for _ in 0..64 {
            for &x in &input {
                let y = lp.process(pre.process(x));
                prop_assert!(y.is_finite());
                prop_assert!(y.abs() < 100.0, "runaway output {}", y);
            }
        }
    }
}
