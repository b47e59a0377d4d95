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

//! Scheduler task feeding the download workers.
//!
//! For each descriptor, in ordinal order, the scheduler creates a task and
//! handle pair and:
//! 1. sends the handle to the bounded result channel, waiting while the
//!    window of `prefetch_workers` handles is full
//! 2. then sends the task to the unbounded work queue
//!
//! Sending the handle first means a worker never starts on a chunk the
//! consumer has no room for, so the result channel's capacity bounds how far
//! downloads run ahead of consumption.

use super::pipeline_types::{create_chunk_pair, ChunkHandle, ChunkTask};
use crate::types::ChunkDescriptor;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Channels and task produced by [`spawn_scheduler`].
pub struct SchedulerChannels {
    /// Work queue, drained by the download workers.
    pub work_rx: mpsc::UnboundedReceiver<ChunkTask>,
    /// Handles in ordinal order, drained by the consumer.
    pub result_rx: mpsc::Receiver<ChunkHandle>,
    pub scheduler_handle: JoinHandle<()>,
}

/// Spawn the scheduler on `runtime` with a result window of `window` handles.
pub fn spawn_scheduler(
    runtime: &Handle,
    descriptors: Vec<ChunkDescriptor>,
    window: usize,
    cancel_token: CancellationToken,
) -> SchedulerChannels {
    let (work_tx, work_rx) = mpsc::unbounded_channel::<ChunkTask>();
    let (result_tx, result_rx) = mpsc::channel::<ChunkHandle>(window.max(1));

    debug!(
        "Spawning scheduler for {} chunks with window {}",
        descriptors.len(),
        window
    );

    let scheduler_handle =
        runtime.spawn(scheduler_task(descriptors, work_tx, result_tx, cancel_token));

    SchedulerChannels {
        work_rx,
        result_rx,
        scheduler_handle,
    }
}

async fn scheduler_task(
    descriptors: Vec<ChunkDescriptor>,
    work_tx: mpsc::UnboundedSender<ChunkTask>,
    result_tx: mpsc::Sender<ChunkHandle>,
    cancel_token: CancellationToken,
) {
    for descriptor in descriptors {
        let ordinal = descriptor.ordinal;
        let (task, handle) = create_chunk_pair(descriptor);

        let sent = tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Scheduler cancelled while queueing chunk {}", ordinal);
                return;
            }
            result = result_tx.send(handle) => result,
        };
        if sent.is_err() {
            debug!("Scheduler: result channel closed at chunk {}", ordinal);
            return;
        }

        if work_tx.send(task).is_err() {
            debug!("Scheduler: work queue closed at chunk {}", ordinal);
            return;
        }
        trace!("Scheduler: queued chunk {}", ordinal);
    }

    debug!("Scheduler: all chunks queued");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::time::timeout;

    fn descriptors(n: usize) -> Vec<ChunkDescriptor> {
        (1..=n)
            .map(|ordinal| ChunkDescriptor {
                ordinal,
                row_count: 10,
                uncompressed_size: 100,
                compressed_size: 100,
                url: Some(format!("https://stage.example.com/chunk{}", ordinal)),
                http_headers: HashMap::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_handles_and_tasks_in_ordinal_order() {
        let mut channels =
            spawn_scheduler(&Handle::current(), descriptors(5), 8, CancellationToken::new());

        for expected in 1..=5 {
            let handle = channels.result_rx.recv().await.unwrap();
            assert_eq!(handle.ordinal, expected);
            let task = channels.work_rx.recv().await.unwrap();
            assert_eq!(task.ordinal(), expected);
        }
        channels.scheduler_handle.await.unwrap();
        assert!(channels.result_rx.recv().await.is_none());
        assert!(channels.work_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_window_limits_queued_work() {
        let mut channels =
            spawn_scheduler(&Handle::current(), descriptors(10), 2, CancellationToken::new());

        // Let the scheduler fill the window.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut queued = 0;
        while channels.work_rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 2);

        // Consuming one handle lets exactly one more task through.
        channels.result_rx.recv().await.unwrap();
        let task = timeout(Duration::from_secs(1), channels.work_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.ordinal(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_scheduler() {
        let token = CancellationToken::new();
        let channels = spawn_scheduler(&Handle::current(), descriptors(10), 1, token.clone());

        token.cancel();
        timeout(Duration::from_secs(1), channels.scheduler_handle)
            .await
            .expect("scheduler should exit promptly")
            .unwrap();
    }
}
