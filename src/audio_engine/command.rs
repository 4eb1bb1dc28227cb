// src/audio_engine/command.rs

use super::looper_track::TrackVoice;
use crate::mixer::MixSnapshot;
use crate::track::TrackId;
use std::sync::Arc;

/// Control domain to audio thread. Drained at the start of every cycle.
pub enum AudioCommand {
    InstallVoice(Box<TrackVoice>),
    RemoveVoice(TrackId),
    /// Replaces the mix state wholesale, including the loop length.
    PublishMix(Arc<MixSnapshot>),
    SetRunning(bool),
    SetPlayhead(usize),
    /// Stop and rewind.
    StopTransport,
    SetTempo(f32),
    SetMetronome(bool),
    SetMasterVolume(f32),
    StartCountIn { generation: u64, beats: u32 },
    CancelCountIn,
    /// Latch the playhead as the start of the take tagged with this
    /// generation. Queued after any transport command it depends on.
    MarkTakeStart(u64),
}

/// Audio thread back to the control domain, to be dropped there.
pub enum Retired {
    Mix(Arc<MixSnapshot>),
    Voice(Box<TrackVoice>),
}
