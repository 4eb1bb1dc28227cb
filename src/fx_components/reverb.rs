// src/fx_components/reverb.rs

//! A Schroeder-style reverb effect component.
//!
//! Each channel runs four parallel comb filters into two series all-pass
//! diffusers. The comb feedback is derived from the requested decay time
//! (the gain that loses 60 dB after `decay` seconds), so the tail length
//! follows `decay` and every loop gain stays below one.

use super::{DspComponent, SmoothedParam};
use crate::fx::{ReverbSettings, REVERB_DECAY_RANGE};
use crate::sample_buffer::StereoFrame;

const COMB_TUNING: [f32; 4] = [1117.0, 1187.0, 1277.0, 1351.0];
const ALLPASS_TUNING: [f32; 2] = [223.0, 557.0];
const TUNING_SAMPLE_RATE: f32 = 44_100.0;
/// Extra delay on the right channel's network, for width.
const STEREO_SPREAD: usize = 23;
const ALLPASS_GAIN: f32 = 0.5;
const DAMPING: f32 = 0.2;
const WET_SMOOTHING_MS: f32 = 10.0;
/// Amplitude ratio that defines the end of the tail (-60 dB).
const DECAY_FLOOR: f32 = 0.001;

// --- Internal Building Blocks for the Reverb ---

/// A simple one-pole low-pass filter, used for damping the reverb tail.
#[derive(Debug, Clone, Copy, Default)]
struct DampingFilter {
    z1: f32,
}
impl DampingFilter {
    #[inline(always)]
    fn process(&mut self, input: f32, coeff: f32) -> f32 {
        let output = input * (1.0 - coeff) + self.z1 * coeff;
        self.z1 = output;
        output
    }
}

/// A delay line with damped feedback.
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
    damping_filter: DampingFilter,
}
impl CombFilter {
    fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback: 0.0,
            damping_filter: DampingFilter::default(),
        }
    }

    fn set_decay(&mut self, decay_secs: f32, sample_rate: f32) {
        let delay_secs = self.buffer.len() as f32 / sample_rate;
        self.feedback = DECAY_FLOOR.powf(delay_secs / decay_secs);
    }

    #[inline(always)]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.write_pos];
        let damped_output = self.damping_filter.process(output, DAMPING);
        self.buffer[self.write_pos] = input + damped_output * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.damping_filter = DampingFilter::default();
    }
}

/// A filter that smears the phase of a signal, used to increase echo density.
#[derive(Debug, Clone)]
struct AllPassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
}
impl AllPassFilter {
    fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
        }
    }

    #[inline(always)]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.write_pos];
        let output = -input + delayed;
        self.buffer[self.write_pos] = input + delayed * ALLPASS_GAIN;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// One channel's comb/all-pass network.
#[derive(Debug, Clone)]
struct Network {
    combs: [CombFilter; 4],
    all_passes: [AllPassFilter; 2],
}

impl Network {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let scale = sample_rate / TUNING_SAMPLE_RATE;
        let len = |tuning: f32| (tuning * scale).round() as usize + spread;
        Self {
            combs: COMB_TUNING.map(|t| CombFilter::new(len(t))),
            all_passes: ALLPASS_TUNING.map(|t| AllPassFilter::new(len(t))),
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        // Average the parallel comb filters.
        let comb_out = self.combs.iter_mut().map(|c| c.process(input)).sum::<f32>() * 0.25;
        self.all_passes
            .iter_mut()
            .fold(comb_out, |acc, ap| ap.process(acc))
    }
}

#[derive(Debug)]
pub struct Reverb {
    sample_rate: f32,
    networks: [Network; 2],
    decay: f32,
    wet: SmoothedParam,
}

impl Reverb {
    pub fn new(sample_rate: f32) -> Self {
        let initial = ReverbSettings::default();
        let mut reverb = Self {
            sample_rate,
            networks: [
                Network::new(sample_rate, 0),
                Network::new(sample_rate, STEREO_SPREAD),
            ],
            decay: 0.0,
            wet: SmoothedParam::new(initial.wet, WET_SMOOTHING_MS, sample_rate),
        };
        reverb.set_decay(initial.decay);
        reverb
    }

    fn set_decay(&mut self, decay: f32) {
        let decay = decay.clamp(REVERB_DECAY_RANGE.0, REVERB_DECAY_RANGE.1);
        if decay == self.decay {
            return;
        }
        self.decay = decay;
        for network in self.networks.iter_mut() {
            for comb in network.combs.iter_mut() {
                comb.set_decay(decay, self.sample_rate);
            }
        }
    }
}

impl DspComponent for Reverb {
    type Settings = ReverbSettings;

    fn set_params(&mut self, settings: &ReverbSettings) {
        self.wet.set_target(settings.wet.clamp(0.0, 1.0));
        self.set_decay(settings.decay);
    }

    #[inline]
    fn process_frame(&mut self, input: StereoFrame) -> StereoFrame {
        let wet = self.wet.next();
        let left = self.networks[0].process(input.left);
        let right = self.networks[1].process(input.right);
        input
            .scale(1.0 - wet)
            .add(StereoFrame::new(left, right).scale(wet))
    }

    fn reset(&mut self) {
        self.wet.snap();
        for network in self.networks.iter_mut() {
            network.combs.iter_mut().for_each(CombFilter::clear);
            network.all_passes.iter_mut().for_each(AllPassFilter::clear);
        }
    }
}
