// src/fx_components/filter.rs

//! Biquad sections for the track EQ.
//!
//! Coefficients follow the RBJ audio-EQ cookbook; processing is
//! transposed direct form II. At 0 dB every shape reduces to unity.

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::identity()
    }
}

impl Biquad {
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    fn omega(frequency_hz: f32, sample_rate: f32) -> (f32, f32) {
        // Keep the corner safely below Nyquist for low sample rates.
        let frequency_hz = frequency_hz.min(sample_rate * 0.45);
        let w0 = 2.0 * PI * frequency_hz / sample_rate;
        (w0.cos(), w0.sin())
    }

    pub fn low_shelf(frequency_hz: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let (cos, sin) = Self::omega(frequency_hz, sample_rate);
        // Shelf slope S = 1.
        let alpha = sin / 2.0 * std::f32::consts::SQRT_2;
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * cos + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
            a * ((a + 1.0) - (a - 1.0) * cos - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos),
            (a + 1.0) + (a - 1.0) * cos - two_sqrt_a_alpha,
        )
    }

    pub fn high_shelf(frequency_hz: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let (cos, sin) = Self::omega(frequency_hz, sample_rate);
        let alpha = sin / 2.0 * std::f32::consts::SQRT_2;
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
            a * ((a + 1.0) + (a - 1.0) * cos - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos),
            (a + 1.0) - (a - 1.0) * cos - two_sqrt_a_alpha,
        )
    }

    pub fn peaking(frequency_hz: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let (cos, sin) = Self::omega(frequency_hz, sample_rate);
        let alpha = sin / (2.0 * q);

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos,
            1.0 - alpha / a,
        )
    }
}

/// Per-channel filter memory for one biquad.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    z1: f32,
    z2: f32,
}

impl BiquadState {
    #[inline(always)]
    pub fn process(&mut self, coeffs: &Biquad, input: f32) -> f32 {
        let output = coeffs.b0 * input + self.z1;
        self.z1 = coeffs.b1 * input - coeffs.a1 * output + self.z2;
        self.z2 = coeffs.b2 * input - coeffs.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn sine_gain(coeffs: &Biquad, frequency_hz: f32) -> f32 {
        let mut state = BiquadState::default();
        let mut peak = 0.0f32;
        let total = (SR * 0.5) as usize;
        for n in 0..total {
            let x = (2.0 * PI * frequency_hz * n as f32 / SR).sin();
            let y = state.process(coeffs, x);
            if n > total / 2 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn zero_db_sections_are_transparent() {
        for coeffs in [
            Biquad::low_shelf(200.0, 0.0, SR),
            Biquad::peaking(1_000.0, 0.707, 0.0, SR),
            Biquad::high_shelf(4_000.0, 0.0, SR),
        ] {
            let mut state = BiquadState::default();
            for n in 0..512 {
                let x = ((n * 7919) % 97) as f32 / 97.0 - 0.5;
                assert!((state.process(&coeffs, x) - x).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn low_shelf_boosts_bass_only() {
        let coeffs = Biquad::low_shelf(200.0, 6.0, SR);
        assert!((sine_gain(&coeffs, 40.0) - 2.0).abs() < 0.1);
        assert!((sine_gain(&coeffs, 7_777.0) - 1.0).abs() < 0.05);
    }

    #[test]
    fn high_shelf_cuts_treble_only() {
        let coeffs = Biquad::high_shelf(4_000.0, -12.0, SR);
        assert!(sine_gain(&coeffs, 15_000.0) < 0.3);
        assert!((sine_gain(&coeffs, 100.0) - 1.0).abs() < 0.05);
    }

    #[test]
    fn peaking_hits_its_centre() {
        let coeffs = Biquad::peaking(1_000.0, 0.707, 12.0, SR);
        assert!((sine_gain(&coeffs, 1_000.0) - 3.98).abs() < 0.2);
    }
}
