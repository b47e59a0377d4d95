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

//! Download session for the remote chunks of one result set.
//!
//! [`ChunkDownloader::start`] spawns the scheduler, the workers and, when a
//! command timeout is configured, a watchdog. [`ChunkDownloader::next_chunk`]
//! hands the chunks back strictly in ordinal order.
//!
//! The session owns a child of the caller's cancellation token. Cancelling
//! it stops every task of the session; it is cancelled when:
//! - the caller cancels its token
//! - the command timeout elapses
//! - a chunk fails in a way that ends the session
//! - the downloader is closed or dropped
//!
//! Once `next_chunk` has returned an error it returns the same error on
//! every later call.

use super::fetcher::ChunkFetcher;
use super::parser::ChunkParser;
use super::pipeline_types::{ChunkHandle, ResultChunk};
use super::retry::RetryPolicy;
use super::scheduler::spawn_scheduler;
use super::state::ChunkStateTracker;
use super::workers::{fail_session, spawn_workers, FailureSlot, WorkerContext};
use crate::error::{CancelReason, Error, Result};
use crate::types::{ChunkDescriptor, ChunkFetchConfig, ChunkState, ColumnSchemaRef};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Orders, prefetches and serves the remote chunks of a result set.
#[derive(Debug)]
pub struct ChunkDownloader {
    result_rx: mpsc::Receiver<ChunkHandle>,
    /// Child of the caller's token; cancelled to stop the whole session.
    session_token: CancellationToken,
    caller_token: CancellationToken,
    failure: FailureSlot,
    tracker: Arc<ChunkStateTracker>,
    total_chunks: usize,
    next_ordinal: usize,
    last_served: Option<usize>,
    /// Terminal error returned by every call once the session failed.
    sticky_error: Option<Error>,
    tasks: Vec<JoinHandle<()>>,
}

/// Check that remote chunks are numbered `1..=n` in order and can be fetched.
fn validate_descriptors(descriptors: &[ChunkDescriptor]) -> Result<()> {
    for (index, descriptor) in descriptors.iter().enumerate() {
        if descriptor.ordinal != index + 1 {
            return Err(Error::manifest(format!(
                "expected chunk ordinal {}, found {}",
                index + 1,
                descriptor.ordinal
            )));
        }
        match descriptor.url.as_deref() {
            Some(url) if !url.is_empty() => {}
            _ => {
                return Err(Error::manifest(format!(
                    "chunk {} has no download url",
                    descriptor.ordinal
                )))
            }
        }
    }
    Ok(())
}

impl ChunkDownloader {
    /// Validate `descriptors` and start downloading on `runtime`.
    ///
    /// `min(prefetch_workers, descriptors.len())` workers are spawned. The
    /// configuration is copied; later changes do not affect this session.
    pub fn start(
        runtime: &Handle,
        schema: ColumnSchemaRef,
        descriptors: Vec<ChunkDescriptor>,
        config: &ChunkFetchConfig,
        fetcher: Arc<dyn ChunkFetcher>,
        parser: Arc<dyn ChunkParser>,
        cancel_token: &CancellationToken,
    ) -> Result<Self> {
        validate_descriptors(&descriptors)?;

        let total_chunks = descriptors.len();
        let session_token = cancel_token.child_token();
        let failure: FailureSlot = Arc::new(Mutex::new(None));
        let tracker = Arc::new(ChunkStateTracker::new(1..=total_chunks));
        let window = config.prefetch_workers.max(1);
        let num_workers = window.min(total_chunks);

        debug!(
            "Starting chunk download: {} chunks, {} workers, max_attempts={}",
            total_chunks,
            num_workers,
            config.max_retries
        );

        let channels = spawn_scheduler(runtime, descriptors, window, session_token.clone());
        let mut tasks = vec![channels.scheduler_handle];

        let context = WorkerContext {
            fetcher,
            parser,
            schema,
            policy: RetryPolicy::from(config),
            tracker: Arc::clone(&tracker),
            failure: Arc::clone(&failure),
            cancel_token: session_token.clone(),
        };
        tasks.extend(spawn_workers(
            runtime,
            channels.work_rx,
            num_workers,
            context,
        ));

        if let Some(timeout) = config.command_timeout {
            tasks.push(spawn_watchdog(
                runtime,
                timeout,
                Arc::clone(&failure),
                session_token.clone(),
            ));
        }

        Ok(Self {
            result_rx: channels.result_rx,
            session_token,
            caller_token: cancel_token.clone(),
            failure,
            tracker,
            total_chunks,
            next_ordinal: 1,
            last_served: None,
            sticky_error: None,
            tasks,
        })
    }

    /// Next chunk in ordinal order, `None` once every chunk was served.
    ///
    /// Waits without polling until the chunk is ready or the session ends.
    /// The chunk returned by the previous call is marked released.
    pub async fn next_chunk(&mut self) -> Result<Option<ResultChunk>> {
        if let Some(err) = &self.sticky_error {
            return Err(err.clone());
        }
        if let Some(previous) = self.last_served.take() {
            self.tracker.transition(previous, ChunkState::Released);
        }
        if self.next_ordinal > self.total_chunks {
            return Ok(None);
        }
        if self.session_token.is_cancelled() {
            return self.fail(self.session_error());
        }

        let expected = self.next_ordinal;
        let handle = tokio::select! {
            biased;
            _ = self.session_token.cancelled() => return self.fail(self.session_error()),
            handle = self.result_rx.recv() => handle,
        };
        let Some(handle) = handle else {
            let err = self.session_error_or(Error::invalid_state(format!(
                "scheduler stopped before chunk {}",
                expected
            )));
            return self.fail(err);
        };
        if handle.ordinal != expected {
            return self.fail(Error::invalid_state(format!(
                "expected chunk {}, scheduler produced chunk {}",
                expected, handle.ordinal
            )));
        }

        let result = tokio::select! {
            biased;
            _ = self.session_token.cancelled() => return self.fail(self.session_error()),
            result = handle.result_rx => result,
        };

        match result {
            Ok(Ok(rows)) => {
                debug!(
                    "Serving chunk {}/{} ({} rows)",
                    expected,
                    self.total_chunks,
                    rows.row_count()
                );
                self.next_ordinal += 1;
                self.last_served = Some(expected);
                Ok(Some(ResultChunk {
                    ordinal: expected,
                    rows,
                }))
            }
            Ok(Err(err)) if err.is_cancellation() => self.fail(self.session_error()),
            Ok(Err(err)) => {
                let err = self.session_error_or(err);
                self.fail(err)
            }
            Err(_) => {
                let err = self.session_error_or(Error::invalid_state(format!(
                    "worker stopped before delivering chunk {}",
                    expected
                )));
                self.fail(err)
            }
        }
    }

    /// Stop all downloads. Later calls to `next_chunk` fail.
    pub fn close(&mut self) {
        if self.sticky_error.is_none() {
            self.sticky_error = Some(Error::invalid_state("result set is closed"));
        }
        self.shutdown();
    }

    /// Per-chunk state of this session.
    pub fn state_tracker(&self) -> Arc<ChunkStateTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    fn shutdown(&mut self) {
        self.session_token.cancel();
        self.tracker.cancel_all();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    fn fail(&mut self, err: Error) -> Result<Option<ResultChunk>> {
        warn!("Chunk retrieval failed: {}", err);
        self.sticky_error = Some(err.clone());
        self.shutdown();
        Err(err)
    }

    fn recorded_failure(&self) -> Option<Error> {
        self.failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The error that ended the session; a cancellation if none was recorded.
    fn session_error(&self) -> Error {
        self.session_error_or(Error::cancelled(CancelReason::Caller))
    }

    fn session_error_or(&self, fallback: Error) -> Error {
        if let Some(err) = self.recorded_failure() {
            return err;
        }
        if self.caller_token.is_cancelled() {
            return Error::cancelled(CancelReason::Caller);
        }
        fallback
    }
}

impl Drop for ChunkDownloader {
    fn drop(&mut self) {
        self.session_token.cancel();
    }
}

fn spawn_watchdog(
    runtime: &Handle,
    timeout: Duration,
    failure: FailureSlot,
    token: CancellationToken,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                warn!("Command timeout of {:?} elapsed, cancelling chunk retrieval", timeout);
                fail_session(&failure, &token, Error::cancelled(CancelReason::Timeout));
            }
        }
    })
}
