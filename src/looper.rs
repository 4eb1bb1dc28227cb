// src/looper.rs
use crate::track::TrackId;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Transport/record state machine of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Playing,
    Recording(TrackId),
    Overdubbing(TrackId),
    /// Waiting out metronome beats before recording into `track`.
    /// `resume_playing` is the transport state to fall back to if the
    /// count-in is cancelled.
    CountingIn {
        track: TrackId,
        beats_remaining: u32,
        resume_playing: bool,
    },
}

impl LoopState {
    pub fn is_playing(&self) -> bool {
        match self {
            LoopState::Idle => false,
            LoopState::Playing | LoopState::Recording(_) | LoopState::Overdubbing(_) => true,
            LoopState::CountingIn { resume_playing, .. } => *resume_playing,
        }
    }

    pub fn recording_track(&self) -> Option<TrackId> {
        match self {
            LoopState::Recording(id) | LoopState::Overdubbing(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording_track().is_some()
    }

    pub fn is_counting_in(&self) -> bool {
        matches!(self, LoopState::CountingIn { .. })
    }
}

const GATE_OPEN: u64 = 1 << 63;
const GATE_PENDING: u64 = 1 << 62;
const GATE_GENERATION_MASK: u64 = GATE_PENDING - 1;

/// Decoded value of the capture gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureGate {
    Closed,
    /// A count-in with this generation will open the gate when it ends.
    Pending(u64),
    Open(u64),
}

impl CaptureGate {
    fn decode(raw: u64) -> Self {
        let generation = raw & GATE_GENERATION_MASK;
        if raw & GATE_OPEN != 0 {
            CaptureGate::Open(generation)
        } else if raw & GATE_PENDING != 0 {
            CaptureGate::Pending(generation)
        } else {
            CaptureGate::Closed
        }
    }
}

/// Peak level published by the audio thread for meters.
#[derive(Clone, Debug, Default)]
pub struct LevelMeter(Arc<AtomicU32>);

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn store(&self, peak: f32) {
        self.0.store(peak.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// State that is shared between the control, audio and capture threads.
/// Every field is a single atomic, so no side ever blocks the others.
#[derive(Debug, Default)]
pub struct SharedLooperState {
    playhead: AtomicUsize,
    loop_len: AtomicUsize,
    running: AtomicBool,
    count_in_beats_remaining: AtomicU32,
    take_start_playhead: AtomicUsize,
    take_start_generation: AtomicU64,
    capture_gate: AtomicU64,
    capture_connected: AtomicBool,
    underruns: AtomicUsize,
    capture_overruns: AtomicUsize,
    cycles: AtomicU64,
    master_meter: LevelMeter,
}

impl SharedLooperState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get_playhead(&self) -> usize {
        self.playhead.load(Ordering::Relaxed)
    }

    pub fn set_playhead(&self, playhead: usize) {
        self.playhead.store(playhead, Ordering::Relaxed);
    }

    pub fn get_loop_len(&self) -> usize {
        self.loop_len.load(Ordering::Relaxed)
    }

    pub fn set_loop_len(&self, len: usize) {
        self.loop_len.store(len, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn get_count_in_beats_remaining(&self) -> u32 {
        self.count_in_beats_remaining.load(Ordering::Relaxed)
    }

    pub fn set_count_in_beats_remaining(&self, beats: u32) {
        self.count_in_beats_remaining.store(beats, Ordering::Relaxed);
    }

    /// Records the audio thread's playhead at the start of the take tagged
    /// `generation`.
    pub fn latch_take_start(&self, generation: u64, playhead: usize) {
        self.take_start_playhead.store(playhead, Ordering::Relaxed);
        self.take_start_generation
            .store(generation & GATE_GENERATION_MASK, Ordering::Release);
    }

    /// Playhead latched for `generation`, or `None` if the audio thread
    /// has not reached that take yet.
    pub fn take_start(&self, generation: u64) -> Option<usize> {
        let latched = self.take_start_generation.load(Ordering::Acquire);
        (latched == generation & GATE_GENERATION_MASK)
            .then(|| self.take_start_playhead.load(Ordering::Relaxed))
    }

    // --- capture gate ---

    pub fn capture_gate(&self) -> CaptureGate {
        CaptureGate::decode(self.capture_gate.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_capture_open(&self) -> bool {
        self.capture_gate.load(Ordering::Acquire) & GATE_OPEN != 0
    }

    pub fn open_capture(&self, generation: u64) {
        self.capture_gate
            .store(GATE_OPEN | (generation & GATE_GENERATION_MASK), Ordering::Release);
    }

    pub fn arm_count_in(&self, generation: u64) {
        self.capture_gate
            .store(GATE_PENDING | (generation & GATE_GENERATION_MASK), Ordering::Release);
    }

    /// Called by the audio thread when a count-in finishes. Succeeds only
    /// if the count-in is still pending, i.e. nobody cancelled it.
    /// The take start is latched first, so it is valid once `Open` is
    /// observed.
    pub fn fire_count_in(&self, generation: u64, playhead: usize) -> bool {
        self.latch_take_start(generation, playhead);
        let generation = generation & GATE_GENERATION_MASK;
        self.capture_gate
            .compare_exchange(
                GATE_PENDING | generation,
                GATE_OPEN | generation,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Closes the gate and reports what it was closed from.
    pub fn close_capture(&self) -> CaptureGate {
        CaptureGate::decode(self.capture_gate.swap(0, Ordering::AcqRel))
    }

    pub fn is_capture_connected(&self) -> bool {
        self.capture_connected.load(Ordering::Relaxed)
    }

    pub fn set_capture_connected(&self, connected: bool) {
        self.capture_connected.store(connected, Ordering::Relaxed);
    }

    // --- fault counters and meters ---

    pub fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_underruns(&self) -> usize {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn record_capture_overrun(&self, dropped_frames: usize) {
        self.capture_overruns
            .fetch_add(dropped_frames, Ordering::Relaxed);
    }

    pub fn get_capture_overruns(&self) -> usize {
        self.capture_overruns.load(Ordering::Relaxed)
    }

    pub fn count_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn master_meter(&self) -> &LevelMeter {
        &self.master_meter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_implies_playing() {
        let id = TrackId(1);
        assert!(LoopState::Recording(id).is_playing());
        assert!(LoopState::Overdubbing(id).is_playing());
        assert!(!LoopState::Idle.is_playing());
        assert_eq!(LoopState::Overdubbing(id).recording_track(), Some(id));
        assert_eq!(LoopState::Playing.recording_track(), None);
    }

    #[test]
    fn count_in_reports_the_transport_it_resumes() {
        let state = LoopState::CountingIn {
            track: TrackId(3),
            beats_remaining: 2,
            resume_playing: true,
        };
        assert!(state.is_playing());
        assert!(state.is_counting_in());
        assert!(!state.is_recording());
    }

    #[test]
    fn count_in_opens_the_gate_once() {
        let shared = SharedLooperState::new();
        shared.arm_count_in(7);
        assert_eq!(shared.capture_gate(), CaptureGate::Pending(7));
        assert!(!shared.is_capture_open());

        assert!(shared.fire_count_in(7, 1234));
        assert_eq!(shared.capture_gate(), CaptureGate::Open(7));
        assert_eq!(shared.take_start(7), Some(1234));
        assert!(!shared.fire_count_in(7, 0));
    }

    #[test]
    fn cancelled_count_in_never_opens() {
        let shared = SharedLooperState::new();
        shared.arm_count_in(3);
        assert_eq!(shared.close_capture(), CaptureGate::Pending(3));
        assert!(!shared.fire_count_in(3, 0));
        assert_eq!(shared.capture_gate(), CaptureGate::Closed);
    }

    #[test]
    fn stale_generation_cannot_fire() {
        let shared = SharedLooperState::new();
        shared.arm_count_in(4);
        assert!(!shared.fire_count_in(3, 0));
        assert_eq!(shared.capture_gate(), CaptureGate::Pending(4));
    }

    #[test]
    fn take_start_belongs_to_one_generation() {
        let shared = SharedLooperState::new();
        assert_eq!(shared.take_start(1), None);
        shared.latch_take_start(1, 480);
        assert_eq!(shared.take_start(1), Some(480));
        assert_eq!(shared.take_start(2), None);
        shared.latch_take_start(2, 0);
        assert_eq!(shared.take_start(1), None);
        assert_eq!(shared.take_start(2), Some(0));
    }

    #[test]
    fn meters_round_trip_floats() {
        let meter = LevelMeter::new();
        meter.store(0.375);
        assert_eq!(meter.load(), 0.375);
    }
}
