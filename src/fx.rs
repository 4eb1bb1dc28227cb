// src/fx.rs

//! Per-track effect settings.
//!
//! These are plain data: the UI edits them, the control domain clamps and
//! snapshots them, and the audio thread reads them once per block from the
//! published mix snapshot. The DSP that consumes them lives in
//! `fx_components`.

use crate::error::{ensure_finite, EngineResult};
use serde::{Deserialize, Serialize};

pub const REVERB_DECAY_RANGE: (f32, f32) = (0.1, 10.0);
pub const DELAY_TIME_RANGE: (f32, f32) = (0.0, 1.0);
pub const DELAY_FEEDBACK_RANGE: (f32, f32) = (0.0, 0.99);
pub const EQ_GAIN_RANGE_DB: (f32, f32) = (-12.0, 12.0);

/// Implemented by every stage's settings so the rack can treat the four
/// stages uniformly.
pub trait StageSettings {
    fn enabled(&self) -> bool;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ReverbSettings {
    pub enabled: bool,
    pub wet: f32,
    /// Tail length in seconds.
    pub decay: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            wet: 0.3,
            decay: 1.5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct DelaySettings {
    pub enabled: bool,
    /// Delay time in seconds.
    pub time: f32,
    pub feedback: f32,
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            time: 0.3,
            feedback: 0.4,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct EqSettings {
    pub enabled: bool,
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct DistortionSettings {
    pub enabled: bool,
    pub amount: f32,
}

impl Default for DistortionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: 0.2,
        }
    }
}

impl StageSettings for ReverbSettings {
    fn enabled(&self) -> bool {
        self.enabled
    }
}

impl StageSettings for DelaySettings {
    fn enabled(&self) -> bool {
        self.enabled
    }
}

impl StageSettings for EqSettings {
    fn enabled(&self) -> bool {
        self.enabled
    }
}

impl StageSettings for DistortionSettings {
    fn enabled(&self) -> bool {
        self.enabled
    }
}

/// The four stages of a track's chain. Processing order is fixed:
/// EQ, distortion, delay, reverb.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct TrackEffects {
    pub reverb: ReverbSettings,
    pub delay: DelaySettings,
    pub eq: EqSettings,
    pub distortion: DistortionSettings,
}

impl TrackEffects {
    /// Rejects non-finite values and clamps everything else into range.
    pub fn sanitized(self) -> EngineResult<Self> {
        let (decay_min, decay_max) = REVERB_DECAY_RANGE;
        let (time_min, time_max) = DELAY_TIME_RANGE;
        let (fb_min, fb_max) = DELAY_FEEDBACK_RANGE;
        let (db_min, db_max) = EQ_GAIN_RANGE_DB;

        Ok(Self {
            reverb: ReverbSettings {
                enabled: self.reverb.enabled,
                wet: ensure_finite("reverb.wet", self.reverb.wet)?.clamp(0.0, 1.0),
                decay: ensure_finite("reverb.decay", self.reverb.decay)?
                    .clamp(decay_min, decay_max),
            },
            delay: DelaySettings {
                enabled: self.delay.enabled,
                time: ensure_finite("delay.time", self.delay.time)?.clamp(time_min, time_max),
                feedback: ensure_finite("delay.feedback", self.delay.feedback)?
                    .clamp(fb_min, fb_max),
            },
            eq: EqSettings {
                enabled: self.eq.enabled,
                low: ensure_finite("eq.low", self.eq.low)?.clamp(db_min, db_max),
                mid: ensure_finite("eq.mid", self.eq.mid)?.clamp(db_min, db_max),
                high: ensure_finite("eq.high", self.eq.high)?.clamp(db_min, db_max),
            },
            distortion: DistortionSettings {
                enabled: self.distortion.enabled,
                amount: ensure_finite("distortion.amount", self.distortion.amount)?
                    .clamp(0.0, 1.0),
            },
        })
    }
}
