// src/capture.rs

//! Hand-off from the capture device callback to the control domain.
//!
//! The sink lives on the input stream's thread. It only forwards frames
//! while the capture gate is open, never blocks, and counts what it had
//! to drop when the queue was full.

use crate::looper::SharedLooperState;
use crate::sample_buffer::StereoFrame;
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::sync::Arc;

pub struct CaptureSink {
    producer: HeapProducer<StereoFrame>,
    shared: Arc<SharedLooperState>,
    channels: usize,
}

impl CaptureSink {
    pub(crate) fn new(
        producer: HeapProducer<StereoFrame>,
        shared: Arc<SharedLooperState>,
        channels: u16,
    ) -> Self {
        Self {
            producer,
            shared,
            channels: channels.max(1) as usize,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Accepts one device callback's worth of interleaved samples. Only
    /// the first two channels are kept; mono input is duplicated.
    pub fn push_interleaved(&mut self, data: &[f32]) {
        if !self.shared.is_capture_open() {
            return;
        }
        let mut dropped = 0;
        for frame in data.chunks_exact(self.channels) {
            let frame = match frame {
                [mono] => StereoFrame::mono(*mono),
                [left, right, ..] => StereoFrame::new(*left, *right),
                [] => continue,
            };
            if self.producer.push(frame).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.shared.record_capture_overrun(dropped);
        }
    }
}

/// Creates the capture queue. The consumer stays with the control domain.
pub(crate) fn capture_queue(
    sample_rate: u32,
    seconds: f32,
) -> (HeapProducer<StereoFrame>, HeapConsumer<StereoFrame>) {
    let capacity = ((sample_rate as f32 * seconds.max(0.1)) as usize).max(1);
    HeapRb::<StereoFrame>::new(capacity).split()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sink(channels: u16, capacity: usize) -> (CaptureSink, HeapConsumer<StereoFrame>, Arc<SharedLooperState>) {
        let shared = SharedLooperState::new();
        let (producer, consumer) = HeapRb::<StereoFrame>::new(capacity).split();
        (CaptureSink::new(producer, shared.clone(), channels), consumer, shared)
    }

    fn drain(consumer: &mut HeapConsumer<StereoFrame>) -> Vec<StereoFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = consumer.pop() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn closed_gate_drops_everything() {
        let (mut sink, mut consumer, _shared) = make_sink(1, 16);
        sink.push_interleaved(&[0.1, 0.2, 0.3]);
        assert!(drain(&mut consumer).is_empty());
    }

    #[test]
    fn open_gate_forwards_frames() {
        let (mut sink, mut consumer, shared) = make_sink(2, 16);
        shared.open_capture(1);
        sink.push_interleaved(&[0.1, -0.1, 0.2, -0.2]);
        assert_eq!(
            drain(&mut consumer),
            vec![StereoFrame::new(0.1, -0.1), StereoFrame::new(0.2, -0.2)]
        );
    }

    #[test]
    fn extra_channels_are_ignored_and_mono_is_duplicated() {
        let (mut sink, mut consumer, shared) = make_sink(4, 16);
        shared.open_capture(1);
        sink.push_interleaved(&[0.5, 0.25, 9.0, 9.0]);
        assert_eq!(drain(&mut consumer), vec![StereoFrame::new(0.5, 0.25)]);

        let (mut sink, mut consumer, shared) = make_sink(1, 16);
        shared.open_capture(1);
        sink.push_interleaved(&[0.75]);
        assert_eq!(drain(&mut consumer), vec![StereoFrame::mono(0.75)]);
    }

    #[test]
    fn full_queue_counts_overruns() {
        let (mut sink, mut consumer, shared) = make_sink(1, 4);
        shared.open_capture(1);
        sink.push_interleaved(&[0.0; 10]);
        assert_eq!(shared.get_capture_overruns(), 6);
        assert_eq!(drain(&mut consumer).len(), 4);
    }
}
