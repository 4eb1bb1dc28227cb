// src/transport.rs

//! Sample-accurate timing for the audio thread.
//!
//! `TransportClock` owns the playhead and decides where metronome clicks
//! fall. Before a loop exists the beat clock free-runs at the tempo. Once
//! a loop length is set, beat 0 sits on the loop start: at the tempo the
//! loop was made at the beats divide the loop evenly, and after a tempo
//! change they fall every `60/tempo` seconds from the loop start.
//!
//! `CountInClock` is separate because it must keep counting whether or
//! not the transport is running.

pub const TEMPO_RANGE: (f32, f32) = (40.0, 240.0);
pub const BEATS_PER_BAR: u64 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Beat {
    /// First beat of a bar. Played with the accent pitch.
    Downbeat,
    Beat,
}

impl Beat {
    fn from_index(index: u64) -> Self {
        if index % BEATS_PER_BAR == 0 {
            Beat::Downbeat
        } else {
            Beat::Beat
        }
    }
}

pub fn clamp_tempo(bpm: f32) -> f32 {
    bpm.clamp(TEMPO_RANGE.0, TEMPO_RANGE.1)
}

pub fn samples_per_beat(sample_rate: f32, bpm: f32) -> f64 {
    sample_rate as f64 * 60.0 / clamp_tempo(bpm) as f64
}

/// How many whole beats of `bpm` fit a loop of `loop_len` frames, never 0.
pub fn infer_beats_per_loop(loop_len: usize, sample_rate: f32, bpm: f32) -> u32 {
    let beats = (loop_len as f64 / samples_per_beat(sample_rate, bpm)).round();
    (beats as u32).max(1)
}

#[derive(Debug)]
pub struct TransportClock {
    sample_rate: f32,
    tempo: f32,
    loop_len: usize,
    beats_per_loop: u32,
    /// Tempo `beats_per_loop` was inferred at.
    grid_tempo: f32,
    playhead: usize,
    running: bool,
    metronome_enabled: bool,
    /// Free-running clock: samples until the next beat, and its index.
    free_countdown: f64,
    free_beat_index: u64,
}

impl TransportClock {
    pub fn new(sample_rate: f32, tempo: f32) -> Self {
        Self {
            sample_rate,
            tempo: clamp_tempo(tempo),
            loop_len: 0,
            beats_per_loop: 1,
            grid_tempo: clamp_tempo(tempo),
            playhead: 0,
            running: false,
            metronome_enabled: false,
            free_countdown: 0.0,
            free_beat_index: 0,
        }
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Future beat boundaries follow the new tempo. The loop itself and
    /// its inferred beat count are left alone.
    pub fn set_tempo(&mut self, bpm: f32) {
        let old_spb = self.samples_per_beat();
        self.tempo = clamp_tempo(bpm);
        if self.loop_len == 0 {
            // Keep the elapsed fraction of the current beat.
            let fraction = (self.free_countdown / old_spb).clamp(0.0, 1.0);
            self.free_countdown = fraction * self.samples_per_beat();
        }
    }

    pub fn samples_per_beat(&self) -> f64 {
        samples_per_beat(self.sample_rate, self.tempo)
    }

    pub fn loop_len(&self) -> usize {
        self.loop_len
    }

    pub fn beats_per_loop(&self) -> u32 {
        self.beats_per_loop
    }

    /// Sets the loop length and keeps the playhead inside it. Going back
    /// to 0 returns the beat clock to free-running.
    pub fn set_loop_len(&mut self, len: usize) {
        if len == self.loop_len {
            return;
        }
        self.loop_len = len;
        if len == 0 {
            self.playhead = 0;
            self.free_countdown = 0.0;
            self.free_beat_index = 0;
        } else {
            self.beats_per_loop = infer_beats_per_loop(len, self.sample_rate, self.tempo);
            self.grid_tempo = self.tempo;
            self.playhead %= len;
        }
    }

    pub fn playhead(&self) -> usize {
        self.playhead
    }

    pub fn set_playhead(&mut self, playhead: usize) {
        self.playhead = if self.loop_len > 0 {
            playhead % self.loop_len
        } else {
            0
        };
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        if running && !self.running && self.loop_len == 0 {
            // A fresh free-running start clicks on its first sample.
            self.free_countdown = 0.0;
            self.free_beat_index = 0;
        }
        self.running = running;
    }

    /// Stops and rewinds.
    pub fn stop(&mut self) {
        self.running = false;
        self.playhead = 0;
        self.free_countdown = 0.0;
        self.free_beat_index = 0;
    }

    pub fn metronome_enabled(&self) -> bool {
        self.metronome_enabled
    }

    pub fn set_metronome_enabled(&mut self, enabled: bool) {
        self.metronome_enabled = enabled;
    }

    /// Index of the beat `position` falls in, counted from the loop start.
    #[inline]
    fn grid_beat(&self, position: usize) -> u64 {
        if self.tempo == self.grid_tempo {
            position as u64 * self.beats_per_loop as u64 / self.loop_len as u64
        } else {
            (position as f64 / self.samples_per_beat()) as u64
        }
    }

    /// Advances one sample. Returns the click to sound on this sample, if
    /// any.
    #[inline]
    pub fn tick(&mut self) -> Option<Beat> {
        if !self.running {
            return None;
        }

        let beat = if self.loop_len > 0 {
            let position = self.playhead;
            let index = self.grid_beat(position);
            let on_boundary = position == 0 || index != self.grid_beat(position - 1);
            self.playhead = (position + 1) % self.loop_len;
            on_boundary.then(|| Beat::from_index(index))
        } else {
            let mut beat = None;
            if self.free_countdown <= 0.0 {
                beat = Some(Beat::from_index(self.free_beat_index));
                self.free_beat_index += 1;
                self.free_countdown += self.samples_per_beat();
            }
            self.free_countdown -= 1.0;
            beat
        };

        beat.filter(|_| self.metronome_enabled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountInTick {
    Silent,
    /// A count-in click. `remaining` includes this beat.
    Click { accent: bool, remaining: u32 },
    /// The last beat has elapsed; recording should start now.
    Done { generation: u64 },
}

#[derive(Debug)]
pub struct CountInClock {
    sample_rate: f32,
    active: Option<u64>,
    total_beats: u32,
    remaining: u32,
    countdown: f64,
}

impl CountInClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            active: None,
            total_beats: 0,
            remaining: 0,
            countdown: 0.0,
        }
    }

    pub fn start(&mut self, generation: u64, beats: u32) {
        self.active = Some(generation);
        self.total_beats = beats;
        self.remaining = beats;
        self.countdown = 0.0;
    }

    pub fn cancel(&mut self) {
        self.active = None;
        self.remaining = 0;
    }

    #[inline]
    pub fn tick(&mut self, tempo: f32) -> CountInTick {
        let Some(generation) = self.active else {
            return CountInTick::Silent;
        };

        let mut result = CountInTick::Silent;
        if self.countdown <= 0.0 {
            if self.remaining == 0 {
                self.active = None;
                return CountInTick::Done { generation };
            }
            result = CountInTick::Click {
                accent: self.remaining == self.total_beats,
                remaining: self.remaining,
            };
            self.remaining -= 1;
            self.countdown += samples_per_beat(self.sample_rate, tempo);
        }
        self.countdown -= 1.0;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn click_positions(clock: &mut TransportClock, samples: usize) -> Vec<(usize, Beat)> {
        (0..samples)
            .filter_map(|n| clock.tick().map(|beat| (n, beat)))
            .collect()
    }

    fn running_clock(tempo: f32) -> TransportClock {
        let mut clock = TransportClock::new(SR, tempo);
        clock.set_metronome_enabled(true);
        clock.set_running(true);
        clock
    }

    #[test]
    fn free_running_clicks_match_the_tempo() {
        let mut tempo = TEMPO_RANGE.0;
        while tempo <= TEMPO_RANGE.1 {
            let mut clock = running_clock(tempo);
            let expected = SR as f64 * 60.0 / tempo as f64;
            let clicks = click_positions(&mut clock, (expected * 8.5) as usize);
            assert_eq!(clicks.len(), 9, "tempo {}", tempo);
            assert_eq!(clicks[0], (0, Beat::Downbeat));
            for (k, (position, _)) in clicks.iter().enumerate() {
                let ideal = expected * k as f64;
                assert!(
                    (*position as f64 - ideal).abs() <= 1.0,
                    "tempo {} beat {} at {} (ideal {})",
                    tempo,
                    k,
                    position,
                    ideal
                );
            }
            tempo += 7.3;
        }
    }

    #[test]
    fn bars_accent_every_fourth_beat() {
        let mut clock = running_clock(120.0);
        let beats: Vec<Beat> = click_positions(&mut clock, 24_000 * 8)
            .into_iter()
            .map(|(_, b)| b)
            .collect();
        assert_eq!(beats[0], Beat::Downbeat);
        assert_eq!(beats[1], Beat::Beat);
        assert_eq!(beats[4], Beat::Downbeat);
    }

    #[test]
    fn silent_when_disabled_or_stopped() {
        let mut clock = TransportClock::new(SR, 120.0);
        clock.set_running(true);
        assert!(click_positions(&mut clock, 50_000).is_empty());

        let mut clock = TransportClock::new(SR, 120.0);
        clock.set_metronome_enabled(true);
        clock.set_loop_len(1_000);
        assert!(click_positions(&mut clock, 50_000).is_empty());
        assert_eq!(clock.playhead(), 0);
    }

    #[test]
    fn loop_grid_divides_the_loop() {
        let mut clock = running_clock(120.0);
        clock.set_loop_len(96_000);
        assert_eq!(clock.beats_per_loop(), 4);
        let positions: Vec<usize> = click_positions(&mut clock, 96_001)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(positions, vec![0, 24_000, 48_000, 72_000, 96_000]);
        assert_eq!(clock.playhead(), 1);
    }

    #[test]
    fn uneven_loops_round_to_whole_beats() {
        let mut clock = running_clock(120.0);
        clock.set_loop_len(100_000);
        assert_eq!(clock.beats_per_loop(), 4);
        let positions: Vec<usize> = click_positions(&mut clock, 100_000)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(positions, vec![0, 25_000, 50_000, 75_000]);
    }

    #[test]
    fn tempo_change_leaves_the_loop_alone() {
        let mut clock = running_clock(120.0);
        clock.set_loop_len(96_000);
        clock.set_tempo(90.0);
        assert_eq!(clock.loop_len(), 96_000);
        assert_eq!(clock.beats_per_loop(), 4);

        clock.set_tempo(500.0);
        assert_eq!(clock.tempo(), TEMPO_RANGE.1);
    }

    #[test]
    fn clicks_follow_a_new_tempo_over_an_existing_loop() {
        let mut tempo = TEMPO_RANGE.0;
        while tempo <= TEMPO_RANGE.1 {
            let mut clock = running_clock(120.0);
            clock.set_loop_len(96_000);
            clock.set_tempo(tempo);
            let spb = SR as f64 * 60.0 / tempo as f64;
            let positions: Vec<usize> = click_positions(&mut clock, 96_000)
                .into_iter()
                .map(|(n, _)| n)
                .collect();
            assert_eq!(positions[0], 0, "tempo {}", tempo);
            for (k, position) in positions.iter().enumerate() {
                let ideal = spb * k as f64;
                assert!(
                    (*position as f64 - ideal).abs() <= 1.0,
                    "tempo {} beat {} at {} (ideal {})",
                    tempo,
                    k,
                    position,
                    ideal
                );
            }
            tempo += 7.3;
        }

        // Exactly the case of a 2 s loop slowed to 100 BPM.
        let mut clock = running_clock(120.0);
        clock.set_loop_len(96_000);
        clock.set_tempo(100.0);
        let positions: Vec<usize> = click_positions(&mut clock, 96_001)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(positions, vec![0, 28_800, 57_600, 86_400, 96_000]);
    }

    #[test]
    fn returning_to_the_loop_tempo_restores_the_even_grid() {
        let mut clock = running_clock(120.0);
        clock.set_loop_len(100_000);
        clock.set_tempo(100.0);
        clock.set_tempo(120.0);
        let positions: Vec<usize> = click_positions(&mut clock, 100_000)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(positions, vec![0, 25_000, 50_000, 75_000]);
    }

    #[test]
    fn tiny_loops_still_have_one_beat() {
        assert_eq!(infer_beats_per_loop(10, SR, 120.0), 1);
    }

    #[test]
    fn stop_rewinds_the_playhead() {
        let mut clock = running_clock(120.0);
        clock.set_loop_len(1_000);
        for _ in 0..1_500 {
            clock.tick();
        }
        assert_eq!(clock.playhead(), 500);
        clock.stop();
        assert_eq!(clock.playhead(), 0);
        assert!(!clock.is_running());
    }

    #[test]
    fn count_in_clicks_then_fires() {
        let mut count_in = CountInClock::new(SR);
        count_in.start(9, 4);
        let mut clicks = Vec::new();
        let mut done_at = None;
        for n in 0..100_000 {
            match count_in.tick(120.0) {
                CountInTick::Click { accent, remaining } => clicks.push((n, accent, remaining)),
                CountInTick::Done { generation } => {
                    assert_eq!(generation, 9);
                    done_at = Some(n);
                    break;
                }
                CountInTick::Silent => {}
            }
        }
        assert_eq!(
            clicks,
            vec![
                (0, true, 4),
                (24_000, false, 3),
                (48_000, false, 2),
                (72_000, false, 1)
            ]
        );
        assert_eq!(done_at, Some(96_000));
        assert_eq!(count_in.tick(120.0), CountInTick::Silent);
    }

    #[test]
    fn cancelled_count_in_goes_quiet() {
        let mut count_in = CountInClock::new(SR);
        count_in.start(1, 4);
        count_in.tick(120.0);
        count_in.cancel();
        for _ in 0..200_000 {
            assert_eq!(count_in.tick(120.0), CountInTick::Silent);
        }
    }

    #[test]
    fn zero_beat_count_in_fires_immediately() {
        let mut count_in = CountInClock::new(SR);
        count_in.start(2, 0);
        assert_eq!(count_in.tick(120.0), CountInTick::Done { generation: 2 });
    }
}
