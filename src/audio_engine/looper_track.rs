// src/audio_engine/looper_track.rs

use super::fx_rack::FxRack;
use crate::looper::LevelMeter;
use crate::track::TrackId;

/// Audio-thread state of one track: its effect memory and level meter.
/// Built in the control domain and handed over boxed, so installing a
/// voice never allocates on the audio thread.
pub struct TrackVoice {
    pub id: TrackId,
    pub rack: FxRack,
    pub meter: LevelMeter,
    /// Set while the track is muted or empty; the rack is cleared before
    /// it sounds again.
    pub silenced: bool,
}

impl TrackVoice {
    pub fn new(id: TrackId, sample_rate: f32, meter: LevelMeter) -> Self {
        Self {
            id,
            rack: FxRack::new(sample_rate),
            meter,
            silenced: true,
        }
    }
}
