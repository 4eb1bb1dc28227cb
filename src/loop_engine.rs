// src/loop_engine.rs

//! The control-domain half of the looper.
//!
//! `LoopEngine` owns the track collection, the record/play state machine
//! and the undo history. Every mutation is applied to its private copy of
//! the tracks and then published to the audio thread as a fresh
//! `MixSnapshot`. Nothing here ever waits on the audio or capture threads.

use crate::audio_engine::command::{AudioCommand, Retired};
use crate::audio_engine::looper_track::TrackVoice;
use crate::audio_engine::{AudioEngine, ProcessorSettings};
use crate::capture::{capture_queue, CaptureSink};
use crate::error::{ensure_finite, EngineError, EngineResult};
use crate::fx::TrackEffects;
use crate::history::{HistoryKey, HistoryStack};
use crate::looper::{CaptureGate, LevelMeter, LoopState, SharedLooperState};
use crate::mixer::MixSnapshot;
use crate::notify::{EngineEvent, Subscribers};
use crate::sample_buffer::{RecordingTake, SampleBuffer, StereoFrame};
use crate::settings::EngineSettings;
use crate::track::{Track, TrackId, TrackView};
use crate::transport::{clamp_tempo, infer_beats_per_loop};
use log::{debug, info, warn};
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Read-only picture of the engine for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub state: LoopState,
    pub is_playing: bool,
    pub is_recording: bool,
    pub selected_track: Option<TrackId>,
    pub master_volume: f32,
    pub tempo: f32,
    pub metronome_enabled: bool,
    pub loop_length: usize,
    pub playhead: usize,
    pub tracks: Vec<TrackView>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub underruns: usize,
    pub capture_overruns: usize,
}

struct ActiveTake {
    track: TrackId,
    take: RecordingTake,
    /// False until the audio thread has reported where the take began.
    anchored: bool,
}

pub struct LoopEngine {
    sample_rate: u32,
    capture_channels: u16,
    max_tracks: usize,
    latency_compensation: usize,
    count_in_beats: u32,

    command_producer: HeapProducer<AudioCommand>,
    backlog: VecDeque<AudioCommand>,
    retired_consumer: HeapConsumer<Retired>,
    capture_consumer: HeapConsumer<StereoFrame>,
    shared: Arc<SharedLooperState>,

    tracks: Vec<Track>,
    voices: Vec<(TrackId, LevelMeter)>,
    next_track_id: u64,
    selected: Option<TrackId>,
    history: HistoryStack<Vec<Track>>,

    state: LoopState,
    take: Option<ActiveTake>,
    /// Tags each recording or count-in on the capture gate.
    generation: u64,
    loop_len: usize,

    tempo: f32,
    metronome_enabled: bool,
    master_volume: f32,

    subscribers: Subscribers,
}

impl LoopEngine {
    /// Builds the control side together with the processor for the output
    /// callback and the sink for the input callback.
    pub fn new(
        settings: &EngineSettings,
        sample_rate: u32,
        capture_channels: u16,
    ) -> (Self, AudioEngine, CaptureSink) {
        let processor_settings = ProcessorSettings::from_settings(settings, sample_rate);
        let max_tracks = processor_settings.max_tracks;

        let (command_producer, command_consumer) =
            HeapRb::<AudioCommand>::new(COMMAND_QUEUE_CAPACITY).split();
        // Room for every command's worth of retirements plus every voice.
        let (retired_producer, retired_consumer) =
            HeapRb::<Retired>::new(COMMAND_QUEUE_CAPACITY * 2 + max_tracks).split();
        let (capture_producer, capture_consumer) =
            capture_queue(sample_rate, settings.capture_buffer_seconds);

        let shared = SharedLooperState::new();
        let audio = AudioEngine::new(
            &processor_settings,
            command_consumer,
            retired_producer,
            shared.clone(),
        );
        let capture = CaptureSink::new(capture_producer, shared.clone(), capture_channels);

        let initial: Vec<Track> = (0..settings.initial_tracks.min(max_tracks))
            .map(|n| Track::new(TrackId(n as u64 + 1), format!("Track {}", n + 1)))
            .collect();
        let latency_compensation = (settings.input_latency_compensation_ms.max(0.0)
            * sample_rate as f32
            / 1000.0)
            .round() as usize;
        let tempo = if settings.default_tempo.is_finite() {
            clamp_tempo(settings.default_tempo)
        } else {
            120.0
        };

        let mut engine = Self {
            sample_rate,
            capture_channels: capture_channels.clamp(1, 2),
            max_tracks,
            latency_compensation,
            count_in_beats: settings.count_in_beats,
            command_producer,
            backlog: VecDeque::new(),
            retired_consumer,
            capture_consumer,
            shared,
            next_track_id: initial.len() as u64 + 1,
            selected: initial.last().map(|t| t.id),
            history: HistoryStack::new(
                initial.clone(),
                settings.history_limit,
                Duration::from_millis(settings.history_coalesce_ms),
            ),
            tracks: initial,
            voices: Vec::new(),
            state: LoopState::Idle,
            take: None,
            generation: 0,
            loop_len: 0,
            tempo,
            metronome_enabled: false,
            master_volume: 1.0,
            subscribers: Subscribers::default(),
        };
        engine.sync_voices();
        engine.publish_mix();
        engine.send(AudioCommand::SetTempo(tempo));
        info!(
            "Loop engine ready: {} Hz, {} capture channel(s), {} track(s)",
            sample_rate,
            engine.capture_channels,
            engine.tracks.len()
        );

        (engine, audio, capture)
    }

    // --- Plumbing ---

    fn send(&mut self, command: AudioCommand) {
        self.flush_backlog();
        if !self.backlog.is_empty() {
            self.backlog.push_back(command);
            return;
        }
        if let Err(command) = self.command_producer.push(command) {
            warn!("Audio command queue is full, deferring commands");
            self.backlog.push_back(command);
        }
    }

    fn flush_backlog(&mut self) {
        while let Some(command) = self.backlog.pop_front() {
            if let Err(command) = self.command_producer.push(command) {
                self.backlog.push_front(command);
                break;
            }
        }
    }

    fn emit(&mut self, event: EngineEvent) {
        self.subscribers.emit(event);
    }

    fn emit_history(&mut self) {
        let event = EngineEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        };
        self.emit(event);
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            self.state = state;
            self.emit(EngineEvent::TransportChanged(state));
        }
    }

    /// Housekeeping done at the top of every call: pending commands go
    /// out, retired audio state is freed here, and a count-in the audio
    /// thread has completed becomes a recording.
    fn service(&mut self) {
        self.flush_backlog();
        while self.retired_consumer.pop().is_some() {}
        self.sync_count_in();
        self.anchor_take();
    }

    /// Moves the take to the playhead the audio thread latched for it.
    fn anchor_take(&mut self) {
        let Some(playhead) = self
            .take
            .as_ref()
            .filter(|active| !active.anchored)
            .and_then(|_| self.shared.take_start(self.generation))
        else {
            return;
        };
        let offset = self.aligned_offset(playhead);
        if let Some(active) = self.take.as_mut() {
            active.take.set_start_offset(offset);
            active.anchored = true;
            debug!("Take for track {} starts at offset {}", active.track, offset);
        }
    }

    fn sync_count_in(&mut self) {
        let LoopState::CountingIn {
            track,
            beats_remaining,
            resume_playing,
        } = self.state
        else {
            return;
        };

        if self.shared.capture_gate() == CaptureGate::Open(self.generation) {
            info!("Count-in finished, recording into track {}", track);
            self.begin_take(track);
            return;
        }

        let remaining = self.shared.get_count_in_beats_remaining();
        if remaining > 0 && remaining != beats_remaining {
            self.set_state(LoopState::CountingIn {
                track,
                beats_remaining: remaining,
                resume_playing,
            });
        }
    }

    fn discard_captured(&mut self) {
        let pending = self.capture_consumer.len();
        self.capture_consumer.skip(pending);
    }

    fn drain_capture(&mut self) {
        if let Some(active) = self.take.as_mut() {
            while let Some(frame) = self.capture_consumer.pop() {
                active.take.append(frame);
            }
        }
    }

    /// Installs a voice for every track that lacks one and removes the
    /// voices of tracks that are gone.
    fn sync_voices(&mut self) {
        let stale: Vec<TrackId> = self
            .voices
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| self.track_index(*id).is_none())
            .collect();
        for id in stale {
            self.voices.retain(|(voice, _)| *voice != id);
            self.send(AudioCommand::RemoveVoice(id));
        }

        let missing: Vec<TrackId> = self
            .tracks
            .iter()
            .map(|t| t.id)
            .filter(|id| !self.voices.iter().any(|(voice, _)| voice == id))
            .collect();
        for id in missing {
            let meter = LevelMeter::new();
            self.voices.push((id, meter.clone()));
            let voice = TrackVoice::new(id, self.sample_rate as f32, meter);
            self.send(AudioCommand::InstallVoice(Box::new(voice)));
        }
    }

    fn publish_mix(&mut self) {
        let loop_len = self
            .tracks
            .iter()
            .find_map(|t| t.buffer.as_ref().map(|b| b.len()))
            .unwrap_or(0);
        if loop_len != self.loop_len {
            self.loop_len = loop_len;
            self.emit(EngineEvent::LoopLengthChanged(loop_len));
        }
        let mix = Arc::new(MixSnapshot::from_tracks(&self.tracks, loop_len));
        self.send(AudioCommand::PublishMix(mix));
    }

    /// Records the current tracks as a history entry and publishes them.
    fn commit(&mut self, key: Option<HistoryKey>) {
        let entry = self.tracks.clone();
        match key {
            Some(key) => self.history.record_coalesced(entry, key, Instant::now()),
            None => self.history.record(entry),
        }
        self.publish_mix();
        self.emit(EngineEvent::TracksChanged);
        self.emit_history();
    }

    fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    fn require_track(&self, id: TrackId) -> EngineResult<usize> {
        self.track_index(id)
            .ok_or_else(|| EngineError::InvalidParameter(format!("unknown track {}", id)))
    }

    /// Where in the loop a sample captured at `playhead` belongs.
    fn aligned_offset(&self, playhead: usize) -> usize {
        if self.loop_len == 0 {
            return 0;
        }
        let latency = self.latency_compensation % self.loop_len;
        (playhead % self.loop_len + self.loop_len - latency) % self.loop_len
    }

    // --- Tracks ---

    pub fn add_track(&mut self) -> EngineResult<TrackId> {
        self.service();
        if self.tracks.len() >= self.max_tracks {
            return Err(EngineError::InvalidParameter(format!(
                "track limit of {} reached",
                self.max_tracks
            )));
        }
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;
        self.tracks
            .push(Track::new(id, format!("Track {}", self.tracks.len() + 1)));
        self.sync_voices();
        self.commit(None);

        self.selected = Some(id);
        self.emit(EngineEvent::SelectionChanged(Some(id)));
        debug!("Added track {}", id);
        Ok(id)
    }

    pub fn delete_track(&mut self, id: TrackId) -> EngineResult<()> {
        self.service();
        let index = self.require_track(id)?;
        if self.state.recording_track() == Some(id) {
            return Err(EngineError::AlreadyRecording);
        }
        if matches!(self.state, LoopState::CountingIn { track, .. } if track == id) {
            self.cancel_count_in();
        }

        self.tracks.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
            self.emit(EngineEvent::SelectionChanged(None));
        }
        self.sync_voices();
        self.commit(None);
        debug!("Deleted track {}", id);
        Ok(())
    }

    pub fn select_track(&mut self, id: TrackId) -> EngineResult<()> {
        self.service();
        self.require_track(id)?;
        if self.selected != Some(id) {
            self.selected = Some(id);
            self.emit(EngineEvent::SelectionChanged(Some(id)));
        }
        Ok(())
    }

    pub fn rename_track(&mut self, id: TrackId, name: &str) -> EngineResult<()> {
        self.service();
        let index = self.require_track(id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidParameter("track name is empty".into()));
        }
        if self.tracks[index].name == name {
            return Ok(());
        }
        self.tracks[index].name = name.to_string();
        self.commit(None);
        Ok(())
    }

    // --- Recording ---

    fn check_can_record(&self, track: Option<TrackId>) -> EngineResult<TrackId> {
        let id = track.ok_or(EngineError::NoTrackSelected)?;
        self.require_track(id)?;
        if self.state.is_recording() {
            return Err(EngineError::AlreadyRecording);
        }
        if !self.shared.is_capture_connected() {
            return Err(EngineError::DeviceUnavailable(
                "no capture device is connected".into(),
            ));
        }
        Ok(id)
    }

    /// The take starts at the current published playhead and is moved to
    /// the exact start once the audio thread latches it.
    fn begin_take(&mut self, track: TrackId) {
        let overdub = self
            .track_index(track)
            .is_some_and(|index| self.tracks[index].has_buffer());
        let capacity = if self.loop_len > 0 {
            self.loop_len
        } else {
            self.sample_rate as usize
        };
        let start_offset = self.aligned_offset(self.shared.get_playhead());
        self.take = Some(ActiveTake {
            track,
            take: RecordingTake::new(start_offset, capacity),
            anchored: false,
        });
        self.set_state(if overdub {
            LoopState::Overdubbing(track)
        } else {
            LoopState::Recording(track)
        });
        self.anchor_take();
    }

    /// Starts recording into `track` straight away, overdubbing if it
    /// already holds audio. A pending count-in is cancelled first.
    pub fn start_recording(&mut self, track: Option<TrackId>) -> EngineResult<()> {
        self.service();
        let id = self.check_can_record(track)?;
        self.cancel_count_in();

        self.discard_captured();
        self.generation += 1;
        self.begin_take(id);
        self.shared.open_capture(self.generation);
        // Queued behind any pending rewind, so the latch sees the playhead
        // the transport will actually resume from.
        self.send(AudioCommand::SetRunning(true));
        self.send(AudioCommand::MarkTakeStart(self.generation));
        info!("Recording into track {}", id);
        Ok(())
    }

    /// Plays `beats` metronome clicks and then starts recording on the
    /// sample the count-in ends. Zero beats records immediately.
    pub fn record_with_count_in(&mut self, track: Option<TrackId>, beats: u32) -> EngineResult<()> {
        self.service();
        let id = self.check_can_record(track)?;
        if beats == 0 {
            return self.start_recording(Some(id));
        }

        let resume_playing = match self.state {
            LoopState::CountingIn { resume_playing, .. } => resume_playing,
            state => state.is_playing(),
        };
        self.cancel_count_in();

        self.discard_captured();
        self.generation += 1;
        self.shared.arm_count_in(self.generation);
        self.shared.set_count_in_beats_remaining(beats);
        self.send(AudioCommand::StartCountIn {
            generation: self.generation,
            beats,
        });
        self.set_state(LoopState::CountingIn {
            track: id,
            beats_remaining: beats,
            resume_playing,
        });
        info!("Counting in {} beat(s) for track {}", beats, id);
        Ok(())
    }

    /// Beats used when the caller does not ask for a specific count-in.
    pub fn count_in_beats(&self) -> u32 {
        self.count_in_beats
    }

    /// Drops a pending count-in and falls back to the transport state it
    /// interrupted. If the audio thread opened the gate before the cancel
    /// landed, whatever it captured is thrown away.
    fn cancel_count_in(&mut self) {
        let LoopState::CountingIn {
            track,
            resume_playing,
            ..
        } = self.state
        else {
            return;
        };

        if let CaptureGate::Open(generation) = self.shared.close_capture() {
            if generation == self.generation {
                self.discard_captured();
            }
        }
        self.send(AudioCommand::CancelCountIn);
        self.send(AudioCommand::SetRunning(resume_playing));
        self.shared.set_count_in_beats_remaining(0);
        self.set_state(if resume_playing {
            LoopState::Playing
        } else {
            LoopState::Idle
        });
        debug!("Count-in for track {} cancelled", track);
    }

    /// Finalizes the take into its track. Stopping during a count-in just
    /// cancels it.
    pub fn stop_recording(&mut self) -> EngineResult<()> {
        self.service();
        if self.state.is_counting_in() {
            self.cancel_count_in();
            return Ok(());
        }
        if self.take.is_none() {
            return Err(EngineError::NotRecording);
        }

        self.shared.close_capture();
        self.drain_capture();
        if let Some(active) = self.take.take() {
            if !active.anchored {
                debug!("Audio thread never reached take for track {}", active.track);
            }
            self.finalize_take(active);
        }
        Ok(())
    }

    fn finalize_take(&mut self, active: ActiveTake) {
        let ActiveTake { track, take, .. } = active;
        let frames = take.frames();
        let first_loop = self.loop_len == 0;

        let Some(index) = self.track_index(track) else {
            warn!("Track {} vanished while recording, take dropped", track);
            self.set_state(LoopState::Playing);
            return;
        };
        if frames.is_empty() {
            info!("Nothing was captured for track {}", track);
            if first_loop {
                self.send(AudioCommand::StopTransport);
                self.set_state(LoopState::Idle);
            } else {
                self.set_state(LoopState::Playing);
            }
            return;
        }

        let offset = take.start_offset();
        let buffer = match self.tracks[index].buffer.as_ref() {
            _ if first_loop => SampleBuffer::from_frames(self.sample_rate, self.capture_channels, frames),
            Some(existing) => existing.overdub(frames, self.capture_channels, offset),
            None => SampleBuffer::fit_to_loop(
                self.sample_rate,
                self.capture_channels,
                frames,
                self.loop_len,
                offset,
            ),
        };
        self.tracks[index].buffer = Some(Arc::new(buffer));
        self.commit(None);

        if first_loop {
            self.send(AudioCommand::SetPlayhead(0));
            info!(
                "Loop set to {} frames ({} beats at {} BPM)",
                self.loop_len,
                infer_beats_per_loop(self.loop_len, self.sample_rate as f32, self.tempo),
                self.tempo
            );
        } else {
            info!(
                "Recorded {} frames into track {} at offset {}",
                frames.len(),
                track,
                offset
            );
        }
        self.set_state(LoopState::Playing);
    }

    // --- Transport ---

    /// Pauses or resumes at the current playhead. Has no effect while
    /// recording.
    pub fn toggle_playback(&mut self) -> EngineResult<()> {
        self.service();
        self.cancel_count_in();
        match self.state {
            LoopState::Idle => {
                self.send(AudioCommand::SetRunning(true));
                self.set_state(LoopState::Playing);
            }
            LoopState::Playing => {
                self.send(AudioCommand::SetRunning(false));
                self.set_state(LoopState::Idle);
            }
            _ => {}
        }
        Ok(())
    }

    /// Stops and rewinds. An in-progress take is discarded.
    pub fn stop_playback(&mut self) -> EngineResult<()> {
        self.service();
        self.cancel_count_in();
        if let Some(active) = self.take.take() {
            self.shared.close_capture();
            self.discard_captured();
            warn!(
                "Discarded {} unfinished frames recorded into track {}",
                active.take.write_cursor(),
                active.track
            );
            self.emit(EngineEvent::RecordingDiscarded(active.track));
        }
        self.send(AudioCommand::StopTransport);
        self.set_state(LoopState::Idle);
        Ok(())
    }

    // --- Parameters ---

    pub fn set_track_volume(&mut self, id: TrackId, volume: f32) -> EngineResult<()> {
        self.service();
        let volume = ensure_finite("volume", volume)?.clamp(0.0, 1.0);
        let index = self.require_track(id)?;
        if self.tracks[index].volume == volume {
            return Ok(());
        }
        self.tracks[index].volume = volume;
        self.commit(Some(HistoryKey::TrackVolume(id)));
        Ok(())
    }

    pub fn set_track_effects(&mut self, id: TrackId, effects: TrackEffects) -> EngineResult<()> {
        self.service();
        let effects = effects.sanitized()?;
        let index = self.require_track(id)?;
        if self.tracks[index].effects == effects {
            return Ok(());
        }
        self.tracks[index].effects = effects;
        self.commit(Some(HistoryKey::TrackEffects(id)));
        Ok(())
    }

    pub fn set_master_volume(&mut self, volume: f32) -> EngineResult<()> {
        self.service();
        let volume = ensure_finite("master volume", volume)?.clamp(0.0, 1.0);
        self.master_volume = volume;
        self.send(AudioCommand::SetMasterVolume(volume));
        self.emit(EngineEvent::MasterVolumeChanged(volume));
        Ok(())
    }

    pub fn set_tempo(&mut self, bpm: f32) -> EngineResult<()> {
        self.service();
        let bpm = clamp_tempo(ensure_finite("tempo", bpm)?);
        self.tempo = bpm;
        self.send(AudioCommand::SetTempo(bpm));
        self.emit(EngineEvent::TempoChanged(bpm));
        Ok(())
    }

    /// Returns the new metronome setting.
    pub fn toggle_metronome(&mut self) -> EngineResult<bool> {
        self.service();
        self.metronome_enabled = !self.metronome_enabled;
        let enabled = self.metronome_enabled;
        self.send(AudioCommand::SetMetronome(enabled));
        self.emit(EngineEvent::MetronomeChanged(enabled));
        Ok(enabled)
    }

    // --- History ---

    pub fn undo(&mut self) -> EngineResult<EngineSnapshot> {
        self.service();
        if self.state.is_recording() {
            return Err(EngineError::AlreadyRecording);
        }
        let tracks = self.history.undo()?.clone();
        self.restore_tracks(tracks);
        Ok(self.snapshot())
    }

    pub fn redo(&mut self) -> EngineResult<EngineSnapshot> {
        self.service();
        if self.state.is_recording() {
            return Err(EngineError::AlreadyRecording);
        }
        let tracks = self.history.redo()?.clone();
        self.restore_tracks(tracks);
        Ok(self.snapshot())
    }

    fn restore_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        if let Some(selected) = self.selected {
            if self.track_index(selected).is_none() {
                self.selected = None;
                self.emit(EngineEvent::SelectionChanged(None));
            }
        }
        if let LoopState::CountingIn { track, .. } = self.state {
            if self.track_index(track).is_none() {
                self.cancel_count_in();
            }
        }
        self.sync_voices();
        self.publish_mix();
        self.emit(EngineEvent::TracksChanged);
        self.emit_history();
    }

    // --- Queries ---

    /// Moves captured audio into the take and picks up count-in progress.
    /// Call regularly from the control thread.
    pub fn poll(&mut self) {
        self.service();
        self.drain_capture();
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.subscribers.subscribe()
    }

    pub fn shared(&self) -> &Arc<SharedLooperState> {
        &self.shared
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn selected_track(&self) -> Option<TrackId> {
        self.selected
    }

    pub fn loop_length(&self) -> usize {
        self.loop_len
    }

    pub fn playhead(&self) -> usize {
        self.shared.get_playhead()
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    pub fn metronome_enabled(&self) -> bool {
        self.metronome_enabled
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn track_level(&self, id: TrackId) -> Option<f32> {
        self.voices
            .iter()
            .find(|(voice, _)| *voice == id)
            .map(|(_, meter)| meter.load())
    }

    pub fn master_level(&self) -> f32 {
        self.shared.master_meter().load()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.state,
            is_playing: self.state.is_playing(),
            is_recording: self.state.is_recording(),
            selected_track: self.selected,
            master_volume: self.master_volume,
            tempo: self.tempo,
            metronome_enabled: self.metronome_enabled,
            loop_length: self.loop_len,
            playhead: self.shared.get_playhead(),
            tracks: self.tracks.iter().map(TrackView::from).collect(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            underruns: self.shared.get_underruns(),
            capture_overruns: self.shared.get_capture_overruns(),
        }
    }
}
