// src/notify.rs

//! State-change notifications for whoever renders the engine.

use crate::looper::LoopState;
use crate::track::TrackId;
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    TransportChanged(LoopState),
    SelectionChanged(Option<TrackId>),
    /// Track composition, names, buffers, volumes or effects changed.
    TracksChanged,
    HistoryChanged { can_undo: bool, can_redo: bool },
    LoopLengthChanged(usize),
    TempoChanged(f32),
    MetronomeChanged(bool),
    MasterVolumeChanged(f32),
    /// An in-progress recording was thrown away by `stop_playback`.
    RecordingDiscarded(TrackId),
}

#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<Sender<EngineEvent>>,
}

impl Subscribers {
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        rx
    }

    /// Delivers to every live subscriber and forgets the ones that hung up.
    pub fn emit(&mut self, event: EngineEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_each_event() {
        let mut subscribers = Subscribers::default();
        let a = subscribers.subscribe();
        let b = subscribers.subscribe();
        subscribers.emit(EngineEvent::TempoChanged(96.0));
        assert_eq!(a.try_recv(), Ok(EngineEvent::TempoChanged(96.0)));
        assert_eq!(b.try_recv(), Ok(EngineEvent::TempoChanged(96.0)));
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut subscribers = Subscribers::default();
        let kept = subscribers.subscribe();
        drop(subscribers.subscribe());
        subscribers.emit(EngineEvent::TracksChanged);
        assert_eq!(subscribers.len(), 1);
        assert_eq!(kept.try_recv(), Ok(EngineEvent::TracksChanged));
    }
}
