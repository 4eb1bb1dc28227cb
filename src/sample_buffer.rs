// src/sample_buffer.rs

//! Recorded audio: the stereo frame type, finalized buffers and the
//! in-progress take that a recording writes into.

use serde::{Deserialize, Serialize};

/// One stereo frame. Mono material is carried with both sides equal.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    pub const fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn scale(self, gain: f32) -> Self {
        Self::new(self.left * gain, self.right * gain)
    }

    #[inline(always)]
    pub fn add(self, other: Self) -> Self {
        Self::new(self.left + other.left, self.right + other.right)
    }

    #[inline(always)]
    pub fn peak(self) -> f32 {
        self.left.abs().max(self.right.abs())
    }
}

/// A finalized recording. Length, rate and channel layout never change
/// after construction, so it is shared freely behind an `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: u16,
    /// Interleaved samples, `channels` per frame.
    samples: Vec<f32>,
}

impl SampleBuffer {
    pub fn from_frames(sample_rate: u32, channels: u16, frames: &[StereoFrame]) -> Self {
        let channels = channels.clamp(1, 2);
        let samples = if channels == 1 {
            frames.iter().map(|f| f.left).collect()
        } else {
            frames.iter().flat_map(|f| [f.left, f.right]).collect()
        };
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    pub fn silent(sample_rate: u32, channels: u16, len: usize) -> Self {
        let channels = channels.clamp(1, 2);
        Self {
            sample_rate,
            channels,
            samples: vec![0.0; len * channels as usize],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn frame(&self, index: usize) -> StereoFrame {
        if self.channels == 1 {
            StereoFrame::mono(self.samples[index])
        } else {
            let i = index * 2;
            StereoFrame::new(self.samples[i], self.samples[i + 1])
        }
    }

    pub fn frames(&self) -> impl Iterator<Item = StereoFrame> + '_ {
        (0..self.len()).map(move |i| self.frame(i))
    }

    /// Lays a take onto an empty loop of `loop_len` frames starting at
    /// `offset`. Anything past one loop is dropped; a short take leaves
    /// the remainder silent.
    pub fn fit_to_loop(
        sample_rate: u32,
        channels: u16,
        take: &[StereoFrame],
        loop_len: usize,
        offset: usize,
    ) -> Self {
        let mut frames = vec![StereoFrame::zero(); loop_len];
        if loop_len > 0 {
            for (i, frame) in take.iter().take(loop_len).enumerate() {
                frames[(offset + i) % loop_len] = *frame;
            }
        }
        Self::from_frames(sample_rate, channels, &frames)
    }

    /// Returns a new buffer with `take` summed in from `offset`, wrapping
    /// around the loop as many times as the take is long. The length of
    /// the existing material is preserved.
    pub fn overdub(&self, take: &[StereoFrame], take_channels: u16, offset: usize) -> Self {
        let len = self.len();
        let channels = self.channels.max(take_channels.clamp(1, 2));
        let mut frames: Vec<StereoFrame> = self.frames().collect();
        if len > 0 {
            for (i, frame) in take.iter().enumerate() {
                let slot = &mut frames[(offset + i) % len];
                *slot = slot.add(*frame);
            }
        }
        Self::from_frames(self.sample_rate, channels, &frames)
    }
}

/// The buffer a recording writes into. The write cursor is the current
/// length; it exists only until the take is finalized or discarded.
#[derive(Debug)]
pub struct RecordingTake {
    frames: Vec<StereoFrame>,
    start_offset: usize,
}

impl RecordingTake {
    pub fn new(start_offset: usize, capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            start_offset,
        }
    }

    pub fn append(&mut self, frame: StereoFrame) {
        self.frames.push(frame);
    }

    pub fn write_cursor(&self) -> usize {
        self.frames.len()
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn set_start_offset(&mut self, start_offset: usize) {
        self.start_offset = start_offset;
    }

    pub fn frames(&self) -> &[StereoFrame] {
        &self.frames
    }
}
