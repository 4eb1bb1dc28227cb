// src/audio_engine/fx_rack.rs

use crate::fx::{StageSettings, TrackEffects};
use crate::fx_components::{DelayLine, DspComponent, Reverb, ThreeBandEq, Waveshaper};
use crate::sample_buffer::StereoFrame;

/// One slot of the rack. A disabled stage is skipped entirely, so it is
/// an exact identity.
struct Stage<C: DspComponent> {
    component: C,
    enabled: bool,
}

impl<C: DspComponent> Stage<C> {
    fn new(component: C) -> Self {
        Self {
            component,
            enabled: false,
        }
    }

    fn configure(&mut self, settings: &C::Settings) {
        let enabled = settings.enabled();
        self.component.set_params(settings);
        if enabled && !self.enabled {
            // Start from silence instead of whatever was left when it was
            // switched off.
            self.component.reset();
        }
        self.enabled = enabled;
    }

    fn reset(&mut self) {
        self.component.reset();
    }

    #[inline]
    fn process_block(&mut self, block: &mut [StereoFrame]) {
        if self.enabled {
            self.component.process_block(block);
        }
    }
}

/// A track's effect chain: EQ, distortion, delay, reverb, in that order.
pub struct FxRack {
    eq: Stage<ThreeBandEq>,
    distortion: Stage<Waveshaper>,
    delay: Stage<DelayLine>,
    reverb: Stage<Reverb>,
}

impl FxRack {
    /// Allocates all stage memory. Call from the control domain.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            eq: Stage::new(ThreeBandEq::new(sample_rate)),
            distortion: Stage::new(Waveshaper::new(sample_rate)),
            delay: Stage::new(DelayLine::new(sample_rate)),
            reverb: Stage::new(Reverb::new(sample_rate)),
        }
    }

    pub fn configure(&mut self, effects: &TrackEffects) {
        self.eq.configure(&effects.eq);
        self.distortion.configure(&effects.distortion);
        self.delay.configure(&effects.delay);
        self.reverb.configure(&effects.reverb);
    }

    /// Clears the memory of every stage.
    pub fn reset(&mut self) {
        self.eq.reset();
        self.distortion.reset();
        self.delay.reset();
        self.reverb.reset();
    }

    pub fn process_block(&mut self, block: &mut [StereoFrame]) {
        self.eq.process_block(block);
        self.distortion.process_block(block);
        self.delay.process_block(block);
        self.reverb.process_block(block);
    }
}
