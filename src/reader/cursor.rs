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

//! Forward-only row cursors over a result set.

use crate::error::{Error, Result};
use crate::reader::chunks::{ChunkDownloader, ChunkStateTracker, RowSet};
use crate::types::{ColumnSchemaRef, Value};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Open,
    Exhausted,
    Closed,
}

/// Reads the rows of one result set, one at a time.
///
/// The cursor starts on the inline chunk delivered with the execution
/// response and then pulls the remote chunks from a [`ChunkDownloader`] as
/// each one is used up. Only the chunk being read is held; it is dropped
/// before the next one is awaited.
///
/// Once `read` has returned an error the cursor keeps returning it.
#[derive(Debug)]
pub struct RowCursor {
    schema: ColumnSchemaRef,
    current: Option<RowSet>,
    /// Row within `current`, `None` before the first `read` on it.
    position: Option<usize>,
    downloader: Option<ChunkDownloader>,
    records_affected: i64,
    has_rows: bool,
    rows_read: u64,
    state: CursorState,
    sticky_error: Option<Error>,
}

impl RowCursor {
    /// Cursor over `first` followed by the chunks served by `downloader`.
    ///
    /// `has_rows` is fixed here so that asking never waits on a download.
    pub fn new(
        schema: ColumnSchemaRef,
        first: RowSet,
        downloader: Option<ChunkDownloader>,
        records_affected: i64,
        remote_rows: usize,
    ) -> Self {
        let has_rows = first.row_count() > 0 || remote_rows > 0;
        Self {
            schema,
            current: Some(first),
            position: None,
            downloader,
            records_affected,
            has_rows,
            rows_read: 0,
            state: CursorState::Open,
            sticky_error: None,
        }
    }

    /// Advance to the next row. Returns false once the result set is
    /// exhausted, and on every call after that.
    ///
    /// Suspends while the next chunk is still being downloaded.
    pub async fn read(&mut self) -> Result<bool> {
        if let Some(err) = &self.sticky_error {
            return Err(err.clone());
        }
        match self.state {
            CursorState::Closed => return Err(Error::invalid_state("cursor is closed")),
            CursorState::Exhausted => return Ok(false),
            CursorState::Open => {}
        }

        loop {
            if let Some(rows) = &self.current {
                let next = self.position.map_or(0, |p| p + 1);
                if next < rows.row_count() {
                    self.position = Some(next);
                    self.rows_read += 1;
                    return Ok(true);
                }
            }

            self.current = None;
            self.position = None;

            let Some(downloader) = self.downloader.as_mut() else {
                return Ok(self.finish());
            };
            match downloader.next_chunk().await {
                Ok(Some(chunk)) => {
                    debug!(
                        "Cursor advancing to chunk {} ({} rows)",
                        chunk.ordinal,
                        chunk.rows.row_count()
                    );
                    self.current = Some(chunk.rows);
                }
                Ok(None) => return Ok(self.finish()),
                Err(err) => {
                    self.sticky_error = Some(err.clone());
                    return Err(err);
                }
            }
        }
    }

    fn finish(&mut self) -> bool {
        debug!("Cursor exhausted after {} rows", self.rows_read);
        self.downloader = None;
        self.state = CursorState::Exhausted;
        false
    }

    /// Value of `column` in the current row.
    pub fn get_value(&self, column: usize) -> Result<Value> {
        if let Some(err) = &self.sticky_error {
            return Err(err.clone());
        }
        if self.state == CursorState::Closed {
            return Err(Error::invalid_state("cursor is closed"));
        }
        match (&self.current, self.position) {
            (Some(rows), Some(row)) => rows.get(row, column),
            _ => Err(Error::invalid_state("no current row, call read() first")),
        }
    }

    /// Values of every column in the current row.
    pub fn row(&self) -> Result<Vec<Value>> {
        (0..self.column_count()).map(|c| self.get_value(c)).collect()
    }

    /// Rows changed by a DML statement, -1 for queries. Still available
    /// after [`close`](Self::close).
    pub fn records_affected(&self) -> i64 {
        self.records_affected
    }

    /// Whether the result set has at least one row. Never waits.
    pub fn has_rows(&self) -> bool {
        self.has_rows
    }

    pub fn schema(&self) -> &ColumnSchemaRef {
        &self.schema
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    /// Rows returned by `read` so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Chunk states of the remote download, if the result set has remote
    /// chunks that are still being served.
    pub fn chunk_states(&self) -> Option<Arc<ChunkStateTracker>> {
        self.downloader.as_ref().map(ChunkDownloader::state_tracker)
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Stop any outstanding downloads and release the current chunk.
    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        if let Some(mut downloader) = self.downloader.take() {
            downloader.close();
        }
        self.current = None;
        self.position = None;
        self.state = CursorState::Closed;
        debug!("Cursor closed after {} rows", self.rows_read);
    }
}

/// [`RowCursor`] for synchronous callers.
///
/// Each call blocks on the runtime the downloads run on, so it must not be
/// used from inside that runtime's async context.
#[derive(Debug)]
pub struct BlockingRowCursor {
    inner: RowCursor,
    runtime_handle: Handle,
}

impl BlockingRowCursor {
    pub fn new(inner: RowCursor, runtime_handle: Handle) -> Self {
        Self {
            inner,
            runtime_handle,
        }
    }

    pub fn read(&mut self) -> Result<bool> {
        self.runtime_handle.block_on(self.inner.read())
    }

    pub fn get_value(&self, column: usize) -> Result<Value> {
        self.inner.get_value(column)
    }

    pub fn row(&self) -> Result<Vec<Value>> {
        self.inner.row()
    }

    pub fn records_affected(&self) -> i64 {
        self.inner.records_affected()
    }

    pub fn has_rows(&self) -> bool {
        self.inner.has_rows()
    }

    pub fn schema(&self) -> &ColumnSchemaRef {
        self.inner.schema()
    }

    pub fn rows_read(&self) -> u64 {
        self.inner.rows_read()
    }

    pub fn close(&mut self) {
        self.inner.close();
    }

    pub fn into_inner(self) -> RowCursor {
        self.inner
    }
}
