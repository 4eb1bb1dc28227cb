use crate::fx::TrackEffects;
use crate::sample_buffer::SampleBuffer;
use crate::track::{Track, TrackId};
use std::sync::Arc;

/// What the audio thread needs to know about one track.
#[derive(Clone, Debug)]
pub struct TrackMix {
    pub id: TrackId,
    pub buffer: Option<Arc<SampleBuffer>>,
    pub volume: f32,
    pub effects: TrackEffects,
}

impl TrackMix {
    /// Has material and is not muted.
    pub fn is_audible(&self) -> bool {
        self.volume > 0.0 && self.buffer.as_ref().is_some_and(|b| !b.is_empty())
    }
}

impl From<&Track> for TrackMix {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            buffer: track.buffer.clone(),
            volume: track.volume.clamp(0.0, 1.0),
            effects: track.effects,
        }
    }
}

/// Immutable mix state published to the audio thread. Built whole in the
/// control domain and swapped in as one `Arc`, so the mixer never sees a
/// half-applied edit.
#[derive(Clone, Debug, Default)]
pub struct MixSnapshot {
    pub tracks: Vec<TrackMix>,
    pub loop_len: usize,
}

impl MixSnapshot {
    pub fn from_tracks(tracks: &[Track], loop_len: usize) -> Self {
        Self {
            tracks: tracks.iter().map(TrackMix::from).collect(),
            loop_len,
        }
    }

    pub fn track(&self, id: TrackId) -> Option<&TrackMix> {
        self.tracks.iter().find(|t| t.id == id)
    }
}
