// src/fx_components/eq.rs

//! Three-band EQ: low shelf, mid peak, high shelf.
//!
//! Gains glide towards their targets and the coefficients are redesigned
//! while they move, so a slider jump never steps the filter memory.

use super::filter::{Biquad, BiquadState};
use super::{DspComponent, SmoothedParam};
use crate::fx::EqSettings;
use crate::sample_buffer::StereoFrame;

const LOW_SHELF_HZ: f32 = 200.0;
const MID_PEAK_HZ: f32 = 1_000.0;
const MID_PEAK_Q: f32 = 0.707;
const HIGH_SHELF_HZ: f32 = 4_000.0;
/// Gain glide time. Longer than a typical processing block.
const GAIN_SMOOTHING_MS: f32 = 20.0;
/// Redesign threshold; below this the coefficients are left alone.
const REDESIGN_EPSILON_DB: f32 = 0.001;

#[derive(Debug)]
struct Band {
    gain_db: SmoothedParam,
    designed_for_db: f32,
    coeffs: Biquad,
    state: [BiquadState; 2],
}

impl Band {
    fn new(sample_rate: f32) -> Self {
        Self {
            gain_db: SmoothedParam::new(0.0, GAIN_SMOOTHING_MS, sample_rate),
            designed_for_db: 0.0,
            coeffs: Biquad::identity(),
            state: [BiquadState::default(); 2],
        }
    }

    #[inline]
    fn process(&mut self, input: StereoFrame, design: impl Fn(f32) -> Biquad) -> StereoFrame {
        let gain_db = self.gain_db.next();
        if (gain_db - self.designed_for_db).abs() > REDESIGN_EPSILON_DB {
            self.coeffs = design(gain_db);
            self.designed_for_db = gain_db;
        }
        StereoFrame::new(
            self.state[0].process(&self.coeffs, input.left),
            self.state[1].process(&self.coeffs, input.right),
        )
    }

    fn reset(&mut self, design: impl Fn(f32) -> Biquad) {
        self.gain_db.snap();
        self.designed_for_db = self.gain_db.current();
        self.coeffs = design(self.designed_for_db);
        for state in self.state.iter_mut() {
            state.reset();
        }
    }
}

#[derive(Debug)]
pub struct ThreeBandEq {
    sample_rate: f32,
    low: Band,
    mid: Band,
    high: Band,
}

impl ThreeBandEq {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            low: Band::new(sample_rate),
            mid: Band::new(sample_rate),
            high: Band::new(sample_rate),
        }
    }
}

impl DspComponent for ThreeBandEq {
    type Settings = EqSettings;

    fn set_params(&mut self, settings: &EqSettings) {
        self.low.gain_db.set_target(settings.low);
        self.mid.gain_db.set_target(settings.mid);
        self.high.gain_db.set_target(settings.high);
    }

    #[inline]
    fn process_frame(&mut self, input: StereoFrame) -> StereoFrame {
        let sr = self.sample_rate;
        let frame = self
            .low
            .process(input, |db| Biquad::low_shelf(LOW_SHELF_HZ, db, sr));
        let frame = self
            .mid
            .process(frame, |db| Biquad::peaking(MID_PEAK_HZ, MID_PEAK_Q, db, sr));
        self.high
            .process(frame, |db| Biquad::high_shelf(HIGH_SHELF_HZ, db, sr))
    }

    fn reset(&mut self) {
        let sr = self.sample_rate;
        self.low.reset(|db| Biquad::low_shelf(LOW_SHELF_HZ, db, sr));
        self.mid
            .reset(|db| Biquad::peaking(MID_PEAK_HZ, MID_PEAK_Q, db, sr));
        self.high.reset(|db| Biquad::high_shelf(HIGH_SHELF_HZ, db, sr));
    }
}
