// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-chunk state of a download session.

use crate::types::ChunkState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// Tracks the [`ChunkState`] of every remote chunk and how many chunks are
/// in flight (downloading or parsing) at once.
///
/// Workers, the consumer and cancellation all update it concurrently.
/// Terminal states are final: a late transition from a worker that has not
/// yet noticed cancellation is ignored.
#[derive(Debug, Default)]
pub struct ChunkStateTracker {
    states: DashMap<usize, ChunkState>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ChunkStateTracker {
    /// Register `ordinals` as `Pending`.
    pub fn new(ordinals: impl IntoIterator<Item = usize>) -> Self {
        let tracker = Self::default();
        for ordinal in ordinals {
            tracker.states.insert(ordinal, ChunkState::Pending);
        }
        tracker
    }

    /// Move `ordinal` to `next`. Returns false if the chunk was already in a
    /// terminal state and kept it.
    pub fn transition(&self, ordinal: usize, next: ChunkState) -> bool {
        let mut entry = self.states.entry(ordinal).or_insert(ChunkState::Pending);
        let prev = *entry;
        if prev.is_terminal() {
            return false;
        }
        *entry = next;

        match (prev.is_in_flight(), next.is_in_flight()) {
            (false, true) => {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            }
            (true, false) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            _ => {}
        }
        trace!("Chunk {}: {:?} -> {:?}", ordinal, prev, next);
        true
    }

    pub fn state(&self, ordinal: usize) -> Option<ChunkState> {
        self.states.get(&ordinal).map(|s| *s)
    }

    /// Mark every chunk that has not reached a terminal state as cancelled.
    pub fn cancel_all(&self) {
        let ordinals: Vec<usize> = self
            .states
            .iter()
            .filter(|entry| !entry.value().is_terminal())
            .map(|entry| *entry.key())
            .collect();
        for ordinal in ordinals {
            self.transition(ordinal, ChunkState::Cancelled);
        }
    }

    /// Chunks currently downloading or parsing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of chunks that were in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Number of chunks currently in `state`.
    pub fn count(&self, state: ChunkState) -> usize {
        self.states.iter().filter(|entry| *entry.value() == state).count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
