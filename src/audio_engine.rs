// src/audio_engine.rs

//! The real-time half of the looper.
//!
//! `AudioEngine` runs inside the output device callback. It owns the
//! transport clock, the metronome and one `TrackVoice` per track, reads
//! the latest published `MixSnapshot`, and reports back through the
//! atomics in `SharedLooperState`. Nothing in `process_buffer` blocks,
//! allocates or frees: new state arrives by command and old state leaves
//! through the retire queue.

pub mod command;
pub mod fx_rack;
pub mod helpers;
pub mod looper_track;

use self::command::{AudioCommand, Retired};
use self::helpers::{block_peak, Metronome};
use self::looper_track::TrackVoice;
use crate::looper::SharedLooperState;
use crate::mixer::MixSnapshot;
use crate::sample_buffer::StereoFrame;
use crate::settings::EngineSettings;
use crate::transport::{Beat, CountInClock, CountInTick, TransportClock};
use ringbuf::{HeapConsumer, HeapProducer};
use std::sync::Arc;

/// The parts of `EngineSettings` the audio thread needs, fixed at start.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorSettings {
    pub sample_rate: f32,
    pub tempo: f32,
    pub max_tracks: usize,
    pub max_block_frames: usize,
    pub metronome_volume: f32,
    pub metronome_pitch_hz: f32,
    pub metronome_accent_pitch_hz: f32,
}

impl ProcessorSettings {
    pub fn from_settings(settings: &EngineSettings, sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            tempo: settings.default_tempo,
            max_tracks: settings.max_tracks.max(1),
            max_block_frames: settings.max_block_frames.max(1),
            metronome_volume: settings.metronome_volume.clamp(0.0, 1.0),
            metronome_pitch_hz: settings.metronome_pitch_hz,
            metronome_accent_pitch_hz: settings.metronome_accent_pitch_hz,
        }
    }
}

pub struct AudioEngine {
    command_consumer: HeapConsumer<AudioCommand>,
    retired_producer: HeapProducer<Retired>,
    shared: Arc<SharedLooperState>,
    clock: TransportClock,
    count_in: CountInClock,
    metronome: Metronome,
    metronome_volume: f32,
    metronome_pitch_hz: f32,
    metronome_accent_pitch_hz: f32,
    mix: Arc<MixSnapshot>,
    voices: Vec<Box<TrackVoice>>,
    scratch: Vec<StereoFrame>,
    max_block_frames: usize,
    master_volume: f32,
    target_master_volume: f32,
}

impl AudioEngine {
    pub fn new(
        settings: &ProcessorSettings,
        command_consumer: HeapConsumer<AudioCommand>,
        retired_producer: HeapProducer<Retired>,
        shared: Arc<SharedLooperState>,
    ) -> Self {
        Self {
            command_consumer,
            retired_producer,
            shared,
            clock: TransportClock::new(settings.sample_rate, settings.tempo),
            count_in: CountInClock::new(settings.sample_rate),
            metronome: Metronome::new(settings.sample_rate),
            metronome_volume: settings.metronome_volume,
            metronome_pitch_hz: settings.metronome_pitch_hz,
            metronome_accent_pitch_hz: settings.metronome_accent_pitch_hz,
            mix: Arc::new(MixSnapshot::default()),
            voices: Vec::with_capacity(settings.max_tracks),
            scratch: Vec::with_capacity(settings.max_block_frames),
            max_block_frames: settings.max_block_frames,
            master_volume: 1.0,
            target_master_volume: 1.0,
        }
    }

    pub fn max_block_frames(&self) -> usize {
        self.max_block_frames
    }

    fn retire(&mut self, item: Retired) {
        // The queue is sized so this cannot fail while the control side
        // keeps polling. If it ever does, the item is dropped here.
        let _ = self.retired_producer.push(item);
    }

    pub fn handle_commands(&mut self) {
        while let Some(command) = self.command_consumer.pop() {
            match command {
                AudioCommand::InstallVoice(voice) => {
                    if self.voices.len() < self.voices.capacity() {
                        self.voices.push(voice);
                    } else {
                        self.retire(Retired::Voice(voice));
                    }
                }
                AudioCommand::RemoveVoice(id) => {
                    if let Some(index) = self.voices.iter().position(|v| v.id == id) {
                        let voice = self.voices.swap_remove(index);
                        voice.meter.store(0.0);
                        self.retire(Retired::Voice(voice));
                    }
                }
                AudioCommand::PublishMix(mix) => {
                    self.clock.set_loop_len(mix.loop_len);
                    let old = std::mem::replace(&mut self.mix, mix);
                    self.retire(Retired::Mix(old));
                }
                AudioCommand::SetRunning(running) => self.clock.set_running(running),
                AudioCommand::SetPlayhead(playhead) => self.clock.set_playhead(playhead),
                AudioCommand::StopTransport => {
                    self.clock.stop();
                    self.metronome.silence();
                }
                AudioCommand::SetTempo(bpm) => self.clock.set_tempo(bpm),
                AudioCommand::SetMetronome(enabled) => self.clock.set_metronome_enabled(enabled),
                AudioCommand::SetMasterVolume(volume) => {
                    self.target_master_volume = volume.clamp(0.0, 1.0)
                }
                AudioCommand::StartCountIn { generation, beats } => {
                    self.count_in.start(generation, beats);
                    self.shared.set_count_in_beats_remaining(beats);
                }
                AudioCommand::CancelCountIn => {
                    self.count_in.cancel();
                    self.shared.set_count_in_beats_remaining(0);
                }
                AudioCommand::MarkTakeStart(generation) => {
                    self.shared.latch_take_start(generation, self.clock.playhead());
                }
            }
        }
    }

    /// Consumes commands for a block the device asked for but that is too
    /// large to render. The caller outputs silence.
    pub fn skip_block(&mut self) {
        self.handle_commands();
        self.shared.record_underrun();
        self.shared.count_cycle();
    }

    pub fn process_buffer(&mut self, output: &mut [StereoFrame]) {
        output.fill(StereoFrame::zero());
        let num_frames = output.len();
        if num_frames > self.max_block_frames {
            self.skip_block();
            return;
        }
        self.handle_commands();

        self.mix_tracks(output);
        self.run_clocks(output);
        let master_peak = self.apply_master_volume(output);

        self.shared.set_playhead(self.clock.playhead());
        self.shared.set_loop_len(self.clock.loop_len());
        self.shared.set_running(self.clock.is_running());
        self.shared.master_meter().store(master_peak);
        self.shared.count_cycle();
    }

    fn mix_tracks(&mut self, output: &mut [StereoFrame]) {
        let loop_len = self.clock.loop_len();
        let start = self.clock.playhead();
        let active = self.clock.is_running() && loop_len > 0;

        for voice in self.voices.iter() {
            voice.meter.store(0.0);
        }
        if !active {
            return;
        }

        for track in self.mix.tracks.iter() {
            let voice = self.voices.iter_mut().find(|v| v.id == track.id);
            let Some(buffer) = track.buffer.as_ref().filter(|_| track.is_audible()) else {
                if let Some(voice) = voice {
                    voice.silenced = true;
                }
                continue;
            };
            let buffer_len = buffer.len();

            self.scratch.clear();
            self.scratch.extend(
                (0..output.len()).map(|i| buffer.frame((start + i) % buffer_len)),
            );

            if let Some(voice) = voice {
                if voice.silenced {
                    // Tails left over from before a mute must not replay.
                    voice.rack.reset();
                    voice.silenced = false;
                }
                voice.rack.configure(&track.effects);
                voice.rack.process_block(&mut self.scratch);
                voice.meter.store(block_peak(&self.scratch));
            }

            for (out, frame) in output.iter_mut().zip(self.scratch.iter()) {
                *out = out.add(frame.scale(track.volume));
            }
        }
    }

    /// Advances the transport one sample at a time so clicks and the
    /// count-in land on exact sample positions.
    fn run_clocks(&mut self, output: &mut [StereoFrame]) {
        let tempo = self.clock.tempo();
        for frame in output.iter_mut() {
            match self.count_in.tick(tempo) {
                CountInTick::Silent => {}
                CountInTick::Click { accent, remaining } => {
                    let pitch = if accent {
                        self.metronome_accent_pitch_hz
                    } else {
                        self.metronome_pitch_hz
                    };
                    self.metronome.trigger(pitch);
                    self.shared.set_count_in_beats_remaining(remaining);
                }
                CountInTick::Done { generation } => {
                    self.shared.set_count_in_beats_remaining(0);
                    if self.shared.fire_count_in(generation, self.clock.playhead()) {
                        self.clock.set_running(true);
                    }
                }
            }

            match self.clock.tick() {
                Some(Beat::Downbeat) => self.metronome.trigger(self.metronome_accent_pitch_hz),
                Some(Beat::Beat) => self.metronome.trigger(self.metronome_pitch_hz),
                None => {}
            }

            if self.metronome.is_sounding() {
                let click = self.metronome.process() * self.metronome_volume;
                *frame = frame.add(StereoFrame::mono(click));
            }
        }
    }

    /// Ramps linearly from the previous block's gain to the target and
    /// returns the block peak after gain.
    fn apply_master_volume(&mut self, output: &mut [StereoFrame]) -> f32 {
        let from = self.master_volume;
        let to = self.target_master_volume;
        let len = output.len().max(1) as f32;
        let mut peak = 0.0f32;
        for (i, frame) in output.iter_mut().enumerate() {
            let gain = from + (to - from) * (i + 1) as f32 / len;
            *frame = frame.scale(gain);
            peak = peak.max(frame.peak());
        }
        self.master_volume = to;
        peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::looper::{CaptureGate, LevelMeter};
    use crate::mixer::TrackMix;
    use crate::sample_buffer::SampleBuffer;
    use crate::track::TrackId;
    use crate::fx::TrackEffects;
    use ringbuf::HeapRb;

    const SR: u32 = 48_000;

    struct Harness {
        engine: AudioEngine,
        commands: HeapProducer<AudioCommand>,
        retired: HeapConsumer<Retired>,
        shared: Arc<SharedLooperState>,
    }

    impl Harness {
        fn new() -> Self {
            let settings = ProcessorSettings::from_settings(&EngineSettings::default(), SR);
            let (commands, command_consumer) = HeapRb::<AudioCommand>::new(64).split();
            let (retired_producer, retired) = HeapRb::<Retired>::new(64).split();
            let shared = SharedLooperState::new();
            let engine = AudioEngine::new(&settings, command_consumer, retired_producer, shared.clone());
            Self {
                engine,
                commands,
                retired,
                shared,
            }
        }

        fn send(&mut self, command: AudioCommand) {
            assert!(self.commands.push(command).is_ok());
        }

        fn add_voice(&mut self, id: TrackId) -> LevelMeter {
            let meter = LevelMeter::new();
            self.send(AudioCommand::InstallVoice(Box::new(TrackVoice::new(
                id,
                SR as f32,
                meter.clone(),
            ))));
            meter
        }

        fn publish(&mut self, tracks: Vec<TrackMix>, loop_len: usize) {
            self.send(AudioCommand::PublishMix(Arc::new(MixSnapshot { tracks, loop_len })));
        }

        fn render(&mut self, frames: usize) -> Vec<StereoFrame> {
            let mut out = vec![StereoFrame::mono(9.0); frames];
            self.engine.process_buffer(&mut out);
            out
        }

        fn render_blocks(&mut self, total: usize, block: usize) -> Vec<StereoFrame> {
            let mut all = Vec::with_capacity(total);
            while all.len() < total {
                let n = block.min(total - all.len());
                all.extend(self.render(n));
            }
            all
        }
    }

    fn track(id: u64, frames: &[f32], volume: f32) -> TrackMix {
        let frames: Vec<StereoFrame> = frames.iter().map(|&v| StereoFrame::mono(v)).collect();
        TrackMix {
            id: TrackId(id),
            buffer: Some(Arc::new(SampleBuffer::from_frames(SR, 1, &frames))),
            volume,
            effects: TrackEffects::default(),
        }
    }

    #[test]
    fn no_loop_means_silence() {
        let mut h = Harness::new();
        h.send(AudioCommand::SetRunning(true));
        let out = h.render(256);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
        assert_eq!(h.shared.get_playhead(), 0);
        assert_eq!(h.shared.get_cycles(), 1);
    }

    #[test]
    fn tracks_are_mixed_with_volume_and_wrap() {
        let mut h = Harness::new();
        let meter = h.add_voice(TrackId(1));
        h.add_voice(TrackId(2));
        h.publish(
            vec![
                track(1, &[0.1, 0.2, 0.3, 0.4], 0.5),
                track(2, &[0.25; 4], 1.0),
            ],
            4,
        );
        h.send(AudioCommand::SetRunning(true));

        let out = h.render(6);
        let ramp = [0.1f32, 0.2, 0.3, 0.4];
        for (i, frame) in out.iter().enumerate() {
            let expected = ramp[i % 4] * 0.5 + 0.25;
            assert!((frame.left - expected).abs() < 1e-6, "frame {}", i);
            assert_eq!(frame.left, frame.right);
        }
        assert_eq!(h.shared.get_playhead(), 2);
        assert_eq!(h.shared.get_loop_len(), 4);
        assert!((meter.load() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn muted_and_empty_tracks_are_skipped() {
        let mut h = Harness::new();
        h.add_voice(TrackId(1));
        let mut empty = track(2, &[], 1.0);
        empty.buffer = None;
        h.publish(vec![track(1, &[0.5; 8], 0.0), empty], 8);
        h.send(AudioCommand::SetRunning(true));
        assert!(h.render(8).iter().all(|f| *f == StereoFrame::zero()));
    }

    #[test]
    fn paused_transport_holds_its_position() {
        let mut h = Harness::new();
        h.publish(vec![track(1, &[0.5; 100], 1.0)], 100);
        h.send(AudioCommand::SetRunning(true));
        h.render(30);
        h.send(AudioCommand::SetRunning(false));
        let out = h.render(30);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
        assert_eq!(h.shared.get_playhead(), 30);
        assert!(!h.shared.is_running());

        h.send(AudioCommand::StopTransport);
        h.render(1);
        assert_eq!(h.shared.get_playhead(), 0);
    }

    #[test]
    fn oversized_block_is_an_underrun() {
        let mut h = Harness::new();
        h.publish(vec![track(1, &[0.5; 100], 1.0)], 100);
        h.send(AudioCommand::SetRunning(true));
        let too_big = h.engine.max_block_frames() + 1;
        let out = h.render(too_big);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
        assert_eq!(h.shared.get_underruns(), 1);
        assert_eq!(h.shared.get_playhead(), 0);

        // The next normal block plays as usual.
        let out = h.render(10);
        assert!(out.iter().all(|f| (f.left - 0.5).abs() < 1e-6));
    }

    #[test]
    fn metronome_clicks_on_the_beat() {
        let mut h = Harness::new();
        h.send(AudioCommand::SetMetronome(true));
        h.send(AudioCommand::SetRunning(true));
        // 120 BPM at 48 kHz is a beat every 24000 samples.
        let out = h.render_blocks(48_000, 512);
        assert!(out[..48].iter().any(|f| f.left.abs() > 0.1));
        assert!(out[20_000..24_000].iter().all(|f| *f == StereoFrame::zero()));
        assert!(out[24_000..24_048].iter().any(|f| f.left.abs() > 0.1));
    }

    #[test]
    fn metronome_follows_a_tempo_change_over_a_loop() {
        let mut h = Harness::new();
        h.publish(vec![track(1, &[0.0; 96_000], 1.0)], 96_000);
        h.send(AudioCommand::SetTempo(100.0));
        h.send(AudioCommand::SetMetronome(true));
        h.send(AudioCommand::SetRunning(true));
        let out = h.render_blocks(96_000, 512);

        let mut onsets = Vec::new();
        let mut last_sound: Option<usize> = None;
        for (n, frame) in out.iter().enumerate() {
            if frame.left != 0.0 {
                if last_sound.map_or(true, |last| n - last > 1_000) {
                    onsets.push(n);
                }
                last_sound = Some(n);
            }
        }
        assert_eq!(onsets, vec![0, 28_800, 57_600, 86_400]);
    }

    #[test]
    fn unmuted_track_does_not_replay_an_old_tail() {
        let mut h = Harness::new();
        h.add_voice(TrackId(1));
        let mut loud = track(1, &[0.5; 4_800], 1.0);
        loud.effects.delay.enabled = true;
        loud.effects.delay.feedback = 0.9;
        h.publish(vec![loud.clone()], 4_800);
        h.send(AudioCommand::SetRunning(true));
        h.render_blocks(4_800, 480);

        let mut muted = loud.clone();
        muted.volume = 0.0;
        h.publish(vec![muted], 4_800);
        h.render(480);

        let mut silent = track(1, &[0.0; 4_800], 1.0);
        silent.effects = loud.effects;
        h.publish(vec![silent], 4_800);
        // The default 0.3 s delay would echo the earlier audio in here.
        let out = h.render_blocks(30_000, 480);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
    }

    #[test]
    fn no_clicks_when_the_metronome_is_off() {
        let mut h = Harness::new();
        h.send(AudioCommand::SetRunning(true));
        let out = h.render_blocks(30_000, 512);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
    }

    #[test]
    fn master_volume_ramps_across_one_block() {
        let mut h = Harness::new();
        h.publish(vec![track(1, &[0.5; 1_000], 1.0)], 1_000);
        h.send(AudioCommand::SetRunning(true));
        h.send(AudioCommand::SetMasterVolume(0.0));
        let out = h.render(100);
        for pair in out.windows(2) {
            assert!(pair[1].left <= pair[0].left);
        }
        assert!(out[0].left > 0.49);
        assert_eq!(out[99].left, 0.0);
        assert!(h.render(100).iter().all(|f| f.left == 0.0));
    }

    #[test]
    fn count_in_opens_the_gate_after_its_beats() {
        let mut h = Harness::new();
        h.shared.arm_count_in(5);
        h.send(AudioCommand::StartCountIn {
            generation: 5,
            beats: 2,
        });
        h.render_blocks(47_616, 512);
        assert_eq!(h.shared.capture_gate(), CaptureGate::Pending(5));
        assert_eq!(h.shared.get_count_in_beats_remaining(), 1);

        h.render_blocks(1_024, 512);
        assert_eq!(h.shared.capture_gate(), CaptureGate::Open(5));
        assert!(h.shared.is_running());
        assert_eq!(h.shared.get_count_in_beats_remaining(), 0);
    }

    #[test]
    fn cancelled_count_in_never_starts() {
        let mut h = Harness::new();
        h.shared.arm_count_in(2);
        h.send(AudioCommand::StartCountIn {
            generation: 2,
            beats: 4,
        });
        h.render_blocks(10_240, 512);
        assert_eq!(h.shared.close_capture(), CaptureGate::Pending(2));
        h.send(AudioCommand::CancelCountIn);
        h.render_blocks(200_000, 512);
        assert_eq!(h.shared.capture_gate(), CaptureGate::Closed);
        assert!(!h.shared.is_running());
    }

    #[test]
    fn replaced_state_is_sent_back_for_dropping() {
        let mut h = Harness::new();
        h.add_voice(TrackId(1));
        h.publish(vec![], 0);
        h.render(16);
        assert!(matches!(h.retired.pop(), Some(Retired::Mix(_))));

        h.send(AudioCommand::RemoveVoice(TrackId(1)));
        h.render(16);
        match h.retired.pop() {
            Some(Retired::Voice(voice)) => assert_eq!(voice.id, TrackId(1)),
            _ => panic!("expected the removed voice"),
        }
        assert!(h.retired.pop().is_none());
    }
}
