// src/fx_components/delay.rs

//! Feedback echo on a stereo circular buffer.
//!
//! The buffer is sized once for the longest allowed delay. A change of
//! delay time moves the read tap by crossfading from the old tap to the
//! new one, so retiming never reads stale or half-written memory.
use super::{DspComponent, SmoothedParam};
use crate::fx::{DelaySettings, DELAY_FEEDBACK_RANGE, DELAY_TIME_RANGE};
use crate::sample_buffer::StereoFrame;

const TAP_CROSSFADE_MS: f32 = 10.0;
const FEEDBACK_SMOOTHING_MS: f32 = 10.0;
/// Fixed high-frequency loss in the feedback path.
const FEEDBACK_DAMPING: f32 = 0.3;

/// A simple one-pole low-pass filter used for damping the feedback signal.
#[derive(Debug, Default, Clone, Copy)]
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

#[derive(Debug, Clone, Copy)]
struct TapFade {
    from: usize,
    position: usize,
}

#[derive(Debug)]
pub struct DelayLine {
    buffer: Vec<StereoFrame>,
    write_pos: usize,
    sample_rate: f32,
    max_delay_samples: usize,
    /// The tap being read, or faded towards when `fade` is set.
    delay_samples: usize,
    target_delay_samples: usize,
    fade: Option<TapFade>,
    fade_len: usize,
    feedback: SmoothedParam,
    damping: [DampingFilter; 2],
}

impl DelayLine {
    pub fn new(sample_rate: f32) -> Self {
        let max_delay_samples = ((DELAY_TIME_RANGE.1 * sample_rate).ceil() as usize).max(1);
        let initial = DelaySettings::default();
        let delay_samples = Self::samples_for(initial.time, sample_rate, max_delay_samples);
        Self {
            // Two spare slots so the longest tap never aliases the write head.
            buffer: vec![StereoFrame::zero(); max_delay_samples + 2],
            write_pos: 0,
            sample_rate,
            max_delay_samples,
            delay_samples,
            target_delay_samples: delay_samples,
            fade: None,
            fade_len: ((TAP_CROSSFADE_MS * 0.001 * sample_rate) as usize).max(1),
            feedback: SmoothedParam::new(initial.feedback, FEEDBACK_SMOOTHING_MS, sample_rate),
            damping: [DampingFilter::default(); 2],
        }
    }

    fn samples_for(time_secs: f32, sample_rate: f32, max_delay_samples: usize) -> usize {
        ((time_secs.max(0.0) * sample_rate).round() as usize).clamp(1, max_delay_samples)
    }

    /// The tap the line is reading, or fading towards.
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    #[inline]
    fn read(&self, delay: usize) -> StereoFrame {
        let len = self.buffer.len();
        self.buffer[(self.write_pos + len - delay) % len]
    }

    #[inline]
    fn read_tap(&mut self) -> StereoFrame {
        let Some(fade) = self.fade else {
            return self.read(self.delay_samples);
        };

        let t = fade.position as f32 / self.fade_len as f32;
        let old = self.read(fade.from);
        let new = self.read(self.delay_samples);
        let mixed = old.scale(1.0 - t).add(new.scale(t));

        if fade.position + 1 >= self.fade_len {
            self.fade = None;
            // A retarget that arrived mid-fade starts its own fade now.
            self.start_fade_if_needed();
        } else {
            self.fade = Some(TapFade {
                position: fade.position + 1,
                ..fade
            });
        }
        mixed
    }

    fn start_fade_if_needed(&mut self) {
        if self.fade.is_none() && self.target_delay_samples != self.delay_samples {
            self.fade = Some(TapFade {
                from: self.delay_samples,
                position: 0,
            });
            self.delay_samples = self.target_delay_samples;
        }
    }
}

impl DspComponent for DelayLine {
    type Settings = DelaySettings;

    fn set_params(&mut self, settings: &DelaySettings) {
        self.target_delay_samples =
            Self::samples_for(settings.time, self.sample_rate, self.max_delay_samples);
        self.start_fade_if_needed();
        let (fb_min, fb_max) = DELAY_FEEDBACK_RANGE;
        self.feedback.set_target(settings.feedback.clamp(fb_min, fb_max));
    }

    #[inline]
    fn process_frame(&mut self, input: StereoFrame) -> StereoFrame {
        let delayed = self.read_tap();
        let feedback = self.feedback.next();

        let damped_left = self.damping[0].process(delayed.left, FEEDBACK_DAMPING);
        let damped_right = self.damping[1].process(delayed.right, FEEDBACK_DAMPING);
        // Feedback stays below 1 and is damped, so the loop cannot run away.
        self.buffer[self.write_pos] = StereoFrame::new(
            input.left + damped_left * feedback,
            input.right + damped_right * feedback,
        );
        self.write_pos = (self.write_pos + 1) % self.buffer.len();

        input.add(delayed)
    }

    fn reset(&mut self) {
        self.buffer.fill(StereoFrame::zero());
        self.write_pos = 0;
        self.delay_samples = self.target_delay_samples;
        self.fade = None;
        self.feedback.snap();
        self.damping = [DampingFilter::default(); 2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::f32::consts::PI;

    const SR: f32 = 48_000.0;

    fn line(time: f32, feedback: f32) -> DelayLine {
        let mut delay = DelayLine::new(SR);
        delay.set_params(&DelaySettings {
            enabled: true,
            time,
            feedback,
        });
        delay.reset();
        delay
    }

    fn impulse_peak_after(delay: &mut DelayLine, seconds: f32) -> f32 {
        let mut peak = delay.process_frame(StereoFrame::mono(1.0)).peak();
        for _ in 0..(seconds * SR) as usize {
            let y = delay.process_frame(StereoFrame::zero());
            assert!(y.left.is_finite() && y.right.is_finite());
            peak = peak.max(y.peak());
        }
        peak
    }

    #[test]
    fn echo_arrives_after_the_delay_time() {
        let mut delay = line(0.01, 0.0);
        assert_eq!(delay.delay_samples(), 480);
        assert_eq!(delay.process_frame(StereoFrame::mono(1.0)).left, 1.0);
        for n in 1..480 {
            assert_eq!(delay.process_frame(StereoFrame::zero()).left, 0.0, "sample {}", n);
        }
        assert_eq!(delay.process_frame(StereoFrame::zero()).left, 1.0);
    }

    #[test]
    fn loud_input_echoes_unclipped() {
        let mut delay = line(0.01, 0.0);
        delay.process_frame(StereoFrame::new(3.0, -2.5));
        for _ in 1..480 {
            delay.process_frame(StereoFrame::zero());
        }
        assert_eq!(delay.process_frame(StereoFrame::zero()), StereoFrame::new(3.0, -2.5));
    }

    #[test]
    fn zero_time_still_delays_by_one_sample() {
        let mut delay = line(0.0, 0.0);
        assert_eq!(delay.delay_samples(), 1);
        delay.process_frame(StereoFrame::mono(0.5));
        assert_eq!(delay.process_frame(StereoFrame::zero()).left, 0.5);
    }

    #[test]
    fn feedback_repeats_decay() {
        let mut delay = line(0.01, 0.5);
        delay.process_frame(StereoFrame::mono(1.0));
        let mut echoes = Vec::new();
        for n in 1..(480 * 4 + 1) {
            let y = delay.process_frame(StereoFrame::zero()).left;
            if n % 480 == 0 {
                echoes.push(y);
            }
        }
        assert_eq!(echoes[0], 1.0);
        for pair in echoes.windows(2) {
            assert!(pair[1] < pair[0] && pair[1] > 0.0, "echoes {:?}", echoes);
        }
    }

    #[test]
    fn impulse_response_stays_bounded_across_the_domain() {
        let mut combos = Vec::new();
        for &time in &[0.0, 0.001, 0.25, 1.0] {
            for &feedback in &[0.0, 0.5, 0.9, 0.99] {
                combos.push((time, feedback));
            }
        }
        let mut rng = rand::thread_rng();
        for _ in 0..4 {
            combos.push((rng.gen_range(0.0..=1.0), rng.gen_range(0.0..=0.99)));
        }

        for (time, feedback) in combos {
            let mut delay = line(time, feedback);
            let peak = impulse_peak_after(&mut delay, 10.0);
            assert!(peak <= 2.0, "time {} feedback {} peaked at {}", time, feedback, peak);
        }
    }

    #[test]
    fn retiming_crossfades_between_taps() {
        let mut delay = line(0.3, 0.0);
        let tone = |n: usize| (2.0 * PI * 50.0 * n as f32 / SR).sin() * 0.5;

        let mut n = 0;
        let mut previous = 0.0;
        while n < SR as usize {
            previous = delay.process_frame(StereoFrame::mono(tone(n))).left;
            n += 1;
        }

        delay.set_params(&DelaySettings {
            enabled: true,
            time: 0.31,
            feedback: 0.0,
        });
        let mut worst_step = 0.0f32;
        for _ in 0..2_000 {
            let y = delay.process_frame(StereoFrame::mono(tone(n))).left;
            worst_step = worst_step.max((y - previous).abs());
            previous = y;
            n += 1;
        }
        // A hard switch between these taps would jump by about 0.7.
        assert!(worst_step < 0.02, "worst step {}", worst_step);
        assert_eq!(delay.delay_samples(), (0.31 * SR).round() as usize);
    }

    #[test]
    fn retarget_during_a_fade_is_applied_afterwards() {
        let mut delay = line(0.1, 0.0);
        let settings = |time| DelaySettings {
            enabled: true,
            time,
            feedback: 0.0,
        };
        delay.set_params(&settings(0.2));
        for _ in 0..10 {
            delay.process_frame(StereoFrame::zero());
        }
        delay.set_params(&settings(0.05));
        assert_eq!(delay.delay_samples(), 9_600);
        for _ in 0..480 {
            delay.process_frame(StereoFrame::zero());
        }
        assert_eq!(delay.delay_samples(), 2_400);
    }
}
