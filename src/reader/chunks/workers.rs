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

//! Download workers.
//!
//! Workers are tokio tasks sharing one work queue. Each takes the next
//! chunk, fetches and parses it, and publishes the rows through the chunk's
//! oneshot channel. A worker holds one chunk at a time, so the number of
//! workers bounds the chunks in flight.
//!
//! ## Failure handling
//!
//! | Error | Action |
//! |---|---|
//! | `Transport`, `CorruptChunk` | Back off and retry the same chunk until its attempts run out, then `MaxRetryExceeded` |
//! | `Auth`, `SchemaMismatch`, `InvalidManifest` | Fail the session |
//!
//! A failure that ends the session is stored in the shared failure slot and
//! the session token is cancelled, which stops every other worker.

use super::fetcher::ChunkFetcher;
use super::parser::{ChunkParser, RowSet};
use super::pipeline_types::ChunkTask;
use super::retry::RetryPolicy;
use super::state::ChunkStateTracker;
use crate::error::{CancelReason, Error, Result};
use crate::types::chunk::FailureKind;
use crate::types::{ChunkDescriptor, ChunkState, ColumnSchemaRef};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Slot holding the error that ended a session. The first error wins.
pub type FailureSlot = Arc<Mutex<Option<Error>>>;

/// Record `error` as the session failure unless one is already recorded,
/// then stop the session.
pub(crate) fn fail_session(slot: &FailureSlot, token: &CancellationToken, error: Error) {
    {
        let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_none() {
            *guard = Some(error);
        }
    }
    token.cancel();
}

/// Everything a worker needs, shared by all workers of a session.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub fetcher: Arc<dyn ChunkFetcher>,
    pub parser: Arc<dyn ChunkParser>,
    pub schema: ColumnSchemaRef,
    pub policy: RetryPolicy,
    pub tracker: Arc<ChunkStateTracker>,
    pub failure: FailureSlot,
    pub cancel_token: CancellationToken,
}

/// Spawn `num_workers` workers draining `work_rx`.
pub fn spawn_workers(
    runtime: &Handle,
    work_rx: mpsc::UnboundedReceiver<ChunkTask>,
    num_workers: usize,
    context: WorkerContext,
) -> Vec<JoinHandle<()>> {
    let work_rx = Arc::new(tokio::sync::Mutex::new(work_rx));

    debug!(
        "Spawning {} download workers: max_attempts={}, base_delay={:?}, max_delay={:?}",
        num_workers,
        context.policy.max_attempts,
        context.policy.base_delay,
        context.policy.max_delay
    );

    (0..num_workers)
        .map(|worker_id| {
            let rx = Arc::clone(&work_rx);
            let ctx = context.clone();
            runtime.spawn(async move { worker_task(worker_id, rx, ctx).await })
        })
        .collect()
}

async fn worker_task(
    worker_id: usize,
    work_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<ChunkTask>>>,
    ctx: WorkerContext,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let task = {
            let mut rx = work_rx.lock().await;
            tokio::select! {
                _ = ctx.cancel_token.cancelled() => {
                    debug!("Worker {} cancelled while waiting for work", worker_id);
                    return;
                }
                task = rx.recv() => task,
            }
        };

        let Some(task) = task else {
            debug!("Worker {} exiting: work queue drained", worker_id);
            return;
        };

        trace!("Worker {} took chunk {}", worker_id, task.ordinal());
        let result = process_chunk(worker_id, &task.descriptor, &ctx).await;

        if task.result_tx.send(result).is_err() {
            debug!(
                "Worker {}: consumer gone before chunk {} was delivered",
                worker_id,
                task.descriptor.ordinal
            );
        }
    }
}

/// One fetch and parse attempt.
async fn attempt(descriptor: &ChunkDescriptor, ctx: &WorkerContext) -> Result<RowSet> {
    ctx.tracker
        .transition(descriptor.ordinal, ChunkState::Downloading);

    let bytes = tokio::select! {
        biased;
        _ = ctx.cancel_token.cancelled() => {
            return Err(Error::cancelled(CancelReason::Caller));
        }
        bytes = ctx.fetcher.fetch(descriptor) => bytes?,
    };

    ctx.tracker.transition(descriptor.ordinal, ChunkState::Parsing);
    let rows = ctx.parser.parse(&bytes, &ctx.schema)?;

    if rows.row_count() != descriptor.row_count {
        return Err(Error::corrupt(format!(
            "chunk {} decoded to {} rows, manifest declares {}",
            descriptor.ordinal,
            rows.row_count(),
            descriptor.row_count
        )));
    }
    Ok(rows)
}

/// Drive one chunk to `Ready`, retrying within its budget.
async fn process_chunk(
    worker_id: usize,
    descriptor: &ChunkDescriptor,
    ctx: &WorkerContext,
) -> Result<RowSet> {
    let ordinal = descriptor.ordinal;
    let mut failures: u32 = 0;

    loop {
        if ctx.cancel_token.is_cancelled() {
            return Err(Error::cancelled(CancelReason::Caller));
        }

        let error = match attempt(descriptor, ctx).await {
            Ok(rows) => {
                ctx.tracker.transition(ordinal, ChunkState::Ready);
                trace!(
                    "Worker {}: chunk {} ready ({} rows)",
                    worker_id,
                    ordinal,
                    rows.row_count()
                );
                return Ok(rows);
            }
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => e,
        };

        if error.is_fatal() {
            error!(
                "Worker {}: chunk {} failed with non-retryable error: {}",
                worker_id, ordinal, error
            );
            ctx.tracker
                .transition(ordinal, ChunkState::Failed(FailureKind::Fatal));
            fail_session(&ctx.failure, &ctx.cancel_token, error.clone());
            return Err(error);
        }

        failures += 1;
        if !ctx.policy.should_retry(failures) {
            error!(
                "Worker {}: chunk {} failed {} times, giving up: {}",
                worker_id, ordinal, failures, error
            );
            ctx.tracker
                .transition(ordinal, ChunkState::Failed(FailureKind::Fatal));
            let exhausted = Error::MaxRetryExceeded {
                ordinal,
                attempts: failures,
                last_error: Box::new(error),
            };
            fail_session(&ctx.failure, &ctx.cancel_token, exhausted.clone());
            return Err(exhausted);
        }

        ctx.tracker
            .transition(ordinal, ChunkState::Failed(FailureKind::Retryable));
        let delay = ctx.policy.delay_for(failures);
        warn!(
            "Worker {}: chunk {} attempt {}/{} failed: {}; retrying in {:?}",
            worker_id, ordinal, failures, ctx.policy.max_attempts, error, delay
        );

        tokio::select! {
            _ = ctx.cancel_token.cancelled() => {
                return Err(Error::cancelled(CancelReason::Caller));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
