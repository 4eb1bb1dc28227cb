// src/fx_components/waveshaper.rs

//! Soft-clipping distortion. `amount` drives both the pre-gain and the
//! dry/wet blend, so 0.0 is a clean pass-through.
use super::{DspComponent, SmoothedParam};
use crate::fx::DistortionSettings;
use crate::sample_buffer::StereoFrame;

const AMOUNT_SMOOTHING_MS: f32 = 5.0;
const MAX_EXTRA_DRIVE: f32 = 20.0;
/// `fast_tanh` reaches exactly +-1 here and must not be fed anything larger.
const SHAPER_LIMIT: f32 = 3.0;

trait FastTanh {
    fn fast_tanh(self) -> Self;
}

impl FastTanh for f32 {
    #[inline(always)]
    fn fast_tanh(self) -> Self {
        let x2 = self * self;
        self * (27.0 + x2) / (27.0 + 9.0 * x2)
    }
}

#[derive(Debug)]
pub struct Waveshaper {
    amount: SmoothedParam,
}

impl Waveshaper {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            amount: SmoothedParam::new(0.0, AMOUNT_SMOOTHING_MS, sample_rate),
        }
    }

    #[inline(always)]
    fn shape(input: f32, amount: f32) -> f32 {
        let drive = 1.0 + amount * MAX_EXTRA_DRIVE;
        let shaped = (input * drive).clamp(-SHAPER_LIMIT, SHAPER_LIMIT).fast_tanh();
        input * (1.0 - amount) + shaped * amount
    }
}

impl DspComponent for Waveshaper {
    type Settings = DistortionSettings;

    fn set_params(&mut self, settings: &DistortionSettings) {
        self.amount.set_target(settings.amount.clamp(0.0, 1.0));
    }

    #[inline]
    fn process_frame(&mut self, input: StereoFrame) -> StereoFrame {
        let amount = self.amount.next();
        if amount <= 0.0 {
            return input;
        }
        StereoFrame::new(
            Self::shape(input.left, amount),
            Self::shape(input.right, amount),
        )
    }

    fn reset(&mut self) {
        self.amount.snap();
    }
}
