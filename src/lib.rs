//! Multi-track audio looper engine.
//!
//! [`LoopEngine`] is driven from the control thread. It hands back an
//! [`AudioEngine`] to run inside the output device callback and a
//! [`CaptureSink`] for the input callback; the three only talk through
//! lock-free queues and atomics.

pub mod audio_engine;
pub mod capture;
pub mod error;
pub mod fx;
pub mod fx_components;
pub mod history;
pub mod loop_engine;
pub mod looper;
pub mod mixer;
pub mod notify;
pub mod sample_buffer;
pub mod settings;
pub mod track;
pub mod transport;

#[cfg(feature = "device")]
pub mod audio_device;
#[cfg(feature = "device")]
pub mod audio_io;

pub use audio_engine::AudioEngine;
pub use capture::CaptureSink;
pub use error::{EngineError, EngineResult};
pub use fx::TrackEffects;
pub use loop_engine::{EngineSnapshot, LoopEngine};
pub use looper::LoopState;
pub use notify::EngineEvent;
pub use settings::EngineSettings;
pub use track::{Track, TrackId, TrackView};
