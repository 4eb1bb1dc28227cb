// src/fx_components/mod.rs

pub mod delay;
pub mod eq;
pub mod filter;
pub mod reverb;
pub mod waveshaper;

pub use delay::DelayLine;
pub use eq::ThreeBandEq;
pub use filter::{Biquad, BiquadState};
pub use reverb::Reverb;
pub use waveshaper::Waveshaper;

use crate::fx::StageSettings;
use crate::sample_buffer::StereoFrame;

/// A common interface for the per-track effect stages.
///
/// Stages own their filter/delay memory and are driven one frame at a
/// time from the audio thread. Nothing here may allocate after `new`.
pub trait DspComponent: Send {
    type Settings: StageSettings;

    /// Sets the target parameters. Stages smooth towards them internally.
    fn set_params(&mut self, settings: &Self::Settings);

    fn process_frame(&mut self, input: StereoFrame) -> StereoFrame;

    /// Clears all signal memory and snaps smoothed parameters to their
    /// current targets.
    fn reset(&mut self);

    fn process_block(&mut self, block: &mut [StereoFrame]) {
        for frame in block.iter_mut() {
            *frame = self.process_frame(*frame);
        }
    }
}

/// One-pole parameter smoother.
#[derive(Debug, Clone, Copy)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
}

impl SmoothedParam {
    pub fn new(value: f32, time_ms: f32, sample_rate: f32) -> Self {
        Self {
            current: value,
            target: value,
            coeff: (-1.0 / (time_ms * 0.001 * sample_rate)).exp(),
        }
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn snap(&mut self) {
        self.current = self.target;
    }

    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < 1e-5
    }

    #[inline(always)]
    pub fn next(&mut self) -> f32 {
        if self.is_settled() {
            self.current = self.target;
        } else {
            self.current = self.coeff * self.current + (1.0 - self.coeff) * self.target;
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }
}
