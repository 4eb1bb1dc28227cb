use crate::fx::TrackEffects;
use crate::sample_buffer::SampleBuffer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_TRACK_VOLUME: f32 = 0.8;

/// Stable track identity. Ids are never reused within one engine.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One loop track. Owned by the engine's track collection; cloning is
/// cheap because the recorded audio is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    /// `None` until a recording has been finalized into this track.
    pub buffer: Option<Arc<SampleBuffer>>,
    /// 0.0 mutes the track.
    pub volume: f32,
    pub effects: TrackEffects,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            buffer: None,
            volume: DEFAULT_TRACK_VOLUME,
            effects: TrackEffects::default(),
        }
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }
}

/// Read-only view of a track for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackView {
    pub id: TrackId,
    pub name: String,
    pub has_buffer: bool,
    pub length_frames: usize,
    pub volume: f32,
    pub effects: TrackEffects,
}

impl From<&Track> for TrackView {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            name: track.name.clone(),
            has_buffer: track.has_buffer(),
            length_frames: track.buffer.as_ref().map_or(0, |b| b.len()),
            volume: track.volume,
            effects: track.effects,
        }
    }
}
