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

//! Values passed between the scheduler, the workers and the consumer.
//!
//! ```text
//! [Scheduler] --work queue--> [Workers: fetch + parse]
//!      |                              |
//!      | ChunkHandle (in order)       | oneshot, keyed by ordinal
//!      v                              v
//! [ChunkDownloader::next_chunk] <-----+
//! ```
//!
//! Every chunk gets a connected [`ChunkTask`] / [`ChunkHandle`] pair. The
//! handle goes into the bounded, ordered result channel; the task goes to
//! whichever worker is free. The consumer awaits handles in order, so chunks
//! come out in ordinal order however the workers finish.

use super::parser::RowSet;
use crate::error::Result;
use crate::types::ChunkDescriptor;
use tokio::sync::oneshot;

/// Work item for a download worker.
#[derive(Debug)]
pub struct ChunkTask {
    pub descriptor: ChunkDescriptor,
    /// Consumed when the worker publishes the outcome.
    pub result_tx: oneshot::Sender<Result<RowSet>>,
}

impl ChunkTask {
    pub fn ordinal(&self) -> usize {
        self.descriptor.ordinal
    }
}

/// The consumer's end of a chunk.
#[derive(Debug)]
pub struct ChunkHandle {
    pub ordinal: usize,
    pub result_rx: oneshot::Receiver<Result<RowSet>>,
}

/// A chunk whose rows are ready to be read.
#[derive(Debug, Clone)]
pub struct ResultChunk {
    pub ordinal: usize,
    pub rows: RowSet,
}

/// Create a connected (task, handle) pair for `descriptor`.
pub fn create_chunk_pair(descriptor: ChunkDescriptor) -> (ChunkTask, ChunkHandle) {
    let (result_tx, result_rx) = oneshot::channel();
    let handle = ChunkHandle {
        ordinal: descriptor.ordinal,
        result_rx,
    };
    let task = ChunkTask {
        descriptor,
        result_tx,
    };
    (task, handle)
}
