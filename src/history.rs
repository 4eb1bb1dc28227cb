// src/history.rs

//! Linear undo/redo over immutable snapshots.

use crate::error::{EngineError, EngineResult};
use crate::track::TrackId;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Identifies a continuous edit (a slider drag) so that a burst of
/// updates to the same control can share one history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryKey {
    TrackVolume(TrackId),
    TrackEffects(TrackId),
}

#[derive(Debug)]
struct LastEdit {
    key: HistoryKey,
    at: Instant,
}

#[derive(Debug)]
pub struct HistoryStack<T> {
    entries: VecDeque<T>,
    index: usize,
    limit: usize,
    coalesce_window: Duration,
    last_edit: Option<LastEdit>,
}

impl<T: Clone> HistoryStack<T> {
    /// `initial` becomes entry 0, the state undo can never go past.
    pub fn new(initial: T, limit: usize, coalesce_window: Duration) -> Self {
        let mut entries = VecDeque::new();
        entries.push_back(initial);
        Self {
            entries,
            index: 0,
            limit: limit.max(1),
            coalesce_window,
            last_edit: None,
        }
    }

    pub fn current(&self) -> &T {
        // `index` is always in bounds and there is at least one entry.
        &self.entries[self.index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Drops any redo entries and appends `entry` as the new current state.
    pub fn record(&mut self, entry: T) {
        self.last_edit = None;
        self.push(entry);
    }

    /// Like `record`, but replaces the current entry when it was produced
    /// by the same continuous edit less than the coalescing window ago.
    pub fn record_coalesced(&mut self, entry: T, key: HistoryKey, now: Instant) {
        let extends_last = !self.coalesce_window.is_zero()
            && !self.can_redo()
            && self.index > 0
            && self.last_edit.as_ref().is_some_and(|last| {
                last.key == key && now.saturating_duration_since(last.at) <= self.coalesce_window
            });

        if extends_last {
            self.entries[self.index] = entry;
        } else {
            self.push(entry);
        }
        self.last_edit = Some(LastEdit { key, at: now });
    }

    fn push(&mut self, entry: T) {
        self.entries.truncate(self.index + 1);
        self.entries.push_back(entry);
        self.index += 1;
        while self.entries.len() > self.limit {
            self.entries.pop_front();
            self.index -= 1;
        }
    }

    pub fn undo(&mut self) -> EngineResult<&T> {
        if self.index == 0 {
            return Err(EngineError::NothingToUndo);
        }
        self.last_edit = None;
        self.index -= 1;
        Ok(&self.entries[self.index])
    }

    pub fn redo(&mut self) -> EngineResult<&T> {
        if !self.can_redo() {
            return Err(EngineError::NothingToRedo);
        }
        self.last_edit = None;
        self.index += 1;
        Ok(&self.entries[self.index])
    }
}
