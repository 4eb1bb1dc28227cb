// src/error.rs

//! Control-domain error types.
//!
//! Every control operation either fully applies or returns one of these
//! without touching engine state.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A recording command was issued without a target track.
    #[error("no track selected")]
    NoTrackSelected,

    /// Another track is already recording or overdubbing.
    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// `stop_recording` was called while nothing was being recorded.
    #[error("not recording")]
    NotRecording,

    /// Out-of-domain value with no safe clamp (unknown track id, NaN, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    /// Capture or playback device could not be acquired.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Rejects NaN and infinities; finite values are clamped by the caller.
pub fn ensure_finite(name: &str, value: f32) -> EngineResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::InvalidParameter(format!(
            "{} must be a finite number, got {}",
            name, value
        )))
    }
}
