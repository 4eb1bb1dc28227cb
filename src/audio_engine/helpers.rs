// src/audio_engine/helpers.rs

use crate::sample_buffer::StereoFrame;

/// Decaying sine click used for the metronome and the count-in.
pub struct Metronome {
    phase: f32,
    envelope: f32,
    sample_rate: f32,
    pitch: f32,
}

impl Metronome {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            envelope: 0.0,
            sample_rate,
            pitch: 880.0,
        }
    }

    pub fn trigger(&mut self, pitch_hz: f32) {
        self.envelope = 1.0;
        self.phase = 0.0;
        // Each click keeps the pitch it was triggered with.
        self.pitch = pitch_hz;
    }

    pub fn is_sounding(&self) -> bool {
        self.envelope > 1e-6
    }

    pub fn process(&mut self) -> f32 {
        if !self.is_sounding() {
            return 0.0;
        }
        let phase_inc = self.pitch / self.sample_rate;
        self.phase = (self.phase + phase_inc) % 1.0;
        let sine_sample = (self.phase * std::f32::consts::TAU).sin();

        let output = sine_sample * self.envelope;
        self.envelope *= 0.999;

        output
    }

    pub fn silence(&mut self) {
        self.envelope = 0.0;
    }
}

pub fn block_peak(block: &[StereoFrame]) -> f32 {
    block.iter().fold(0.0f32, |max, frame| max.max(frame.peak()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_rings_then_decays() {
        let mut metronome = Metronome::new(48_000.0);
        assert_eq!(metronome.process(), 0.0);
        metronome.trigger(1_000.0);
        let early: f32 = (0..48).map(|_| metronome.process().abs()).fold(0.0, f32::max);
        for _ in 0..20_000 {
            metronome.process();
        }
        let late: f32 = (0..48).map(|_| metronome.process().abs()).fold(0.0, f32::max);
        assert!(early > 0.5);
        assert!(late < 1e-6);
        assert!(!metronome.is_sounding());
    }

    #[test]
    fn peak_covers_both_channels() {
        let block = [StereoFrame::new(0.1, -0.7), StereoFrame::new(0.3, 0.2)];
        assert_eq!(block_peak(&block), 0.7);
        assert_eq!(block_peak(&[]), 0.0);
    }
}
