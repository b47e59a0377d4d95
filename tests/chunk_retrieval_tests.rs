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

//! End-to-end tests for chunked result retrieval.
//!
//! These tests drive a `RowCursor` opened by `ResultReaderFactory` against a
//! mock fetcher serving Arrow IPC (or textual) chunks:
//! - Ordering: rows come back in order whatever order chunks finish in
//! - Completeness: every declared row is delivered exactly once
//! - Retry: per-chunk budget shared by download and parse failures
//! - Memory bound: never more chunks in flight than workers
//! - Cancellation and command timeout stop a blocked read promptly
//!
//! ## Pipeline Architecture
//!
//! ```text
//! [Scheduler] → work queue → [Workers: MockFetcher → parser]
//!      |                              |
//!      v                              v
//! result channel ←──────────── oneshot per chunk (in order)
//!      |
//!      v
//!  [RowCursor]
//! ```

use arrow_array::{Int64Array, RecordBatch};
use arrow_ipc::writer::StreamWriter;
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use warehouse_driver::error::{CancelReason, Error, Result};
use warehouse_driver::reader::chunks::parser::ArrowChunkParser;
use warehouse_driver::reader::chunks::{
    ChunkFetcher, ChunkParser, DefaultParserFactory, ParserFactory, RowSet,
};
use warehouse_driver::reader::{BlockingRowCursor, ResultReaderFactory, RowCursor};
use warehouse_driver::types::response::{ChunkInfo, RowType};
use warehouse_driver::types::{
    ChunkDescriptor, ChunkFetchConfig, ChunkState, ColumnSchemaRef, CompressionCodec,
    ExecuteResponse, ResultFormat,
};

// =============================================================================
// Test Helpers
// =============================================================================

/// Arrow IPC stream with one `ID` column holding `start..start + rows`.
fn ipc_bytes(start: i64, rows: usize) -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![Field::new("ID", DataType::Int64, false)]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Int64Array::from_iter_values(
            start..start + rows as i64,
        ))],
    )
    .unwrap();

    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, &schema).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
    }
    buf
}

/// Textual rows `["start"],["start+1"],...` compressed as an LZ4 frame.
fn lz4_text_bytes(start: i64, rows: usize) -> Vec<u8> {
    let text = (start..start + rows as i64)
        .map(|id| format!("[\"{}\"]", id))
        .collect::<Vec<_>>()
        .join(",");
    let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Execution response with `inline_rows` inline rows and one remote chunk per
/// entry of `chunk_rows`. Row ids run from 0 across all chunks.
fn response(format: ResultFormat, inline_rows: usize, chunk_rows: &[usize]) -> ExecuteResponse {
    let total = inline_rows + chunk_rows.iter().sum::<usize>();
    let mut response = ExecuteResponse {
        query_id: Some("01b2-test".to_string()),
        row_type: vec![RowType {
            name: "ID".to_string(),
            type_name: "fixed".to_string(),
            nullable: false,
            precision: Some(38),
            scale: Some(0),
            length: None,
        }],
        chunks: chunk_rows
            .iter()
            .enumerate()
            .map(|(i, rows)| ChunkInfo {
                url: format!("https://stage.example.com/results/chunk{}", i + 1),
                row_count: *rows,
                uncompressed_size: 0,
                compressed_size: 0,
            })
            .collect(),
        total: Some(total as u64),
        returned: Some(inline_rows as u64),
        ..Default::default()
    };
    match format {
        ResultFormat::Arrow => {
            response.query_result_format = Some("arrow".to_string());
            if inline_rows > 0 {
                response.rowset_base64 = Some(ipc_bytes(0, inline_rows));
            }
        }
        ResultFormat::Textual => {
            response.query_result_format = Some("json".to_string());
            response.result_compression = Some("LZ4_FRAME".to_string());
            response.rowset = Some(
                (0..inline_rows)
                    .map(|id| vec![Some(id.to_string())])
                    .collect(),
            );
        }
    }
    response
}

/// Config with a fast backoff so retry tests finish quickly.
fn fast_config(workers: usize) -> ChunkFetchConfig {
    ChunkFetchConfig {
        prefetch_workers: workers,
        retry_base_delay: Duration::from_millis(1),
        retry_max_delay: Duration::from_millis(5),
        ..Default::default()
    }
}

fn factory(
    fetcher: Arc<dyn ChunkFetcher>,
    parsers: Arc<dyn ParserFactory>,
    config: ChunkFetchConfig,
) -> ResultReaderFactory {
    ResultReaderFactory::new(fetcher, parsers, config, tokio::runtime::Handle::current())
}

/// Read every remaining id, stopping at the first error.
async fn read_ids(cursor: &mut RowCursor) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    while cursor.read().await? {
        ids.push(cursor.get_value(0)?.as_i64().expect("integer id"));
    }
    Ok(ids)
}

// =============================================================================
// Mock ChunkFetcher
// =============================================================================

/// Serves chunks whose ids continue where the previous chunk stopped.
///
/// Can delay, fail, reject or hang individual chunks, and records attempts
/// and concurrency.
#[derive(Debug)]
struct MockFetcher {
    format: ResultFormat,
    /// ordinal -> (first id, rows)
    chunks: HashMap<usize, (i64, usize)>,
    delays: HashMap<usize, Duration>,
    /// ordinal -> number of leading attempts that fail with HTTP 503
    failures: HashMap<usize, u32>,
    auth_failure: Option<usize>,
    hang: Option<usize>,
    attempts: Mutex<HashMap<usize, u32>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockFetcher {
    fn new(format: ResultFormat, inline_rows: usize, chunk_rows: &[usize]) -> Self {
        let mut chunks = HashMap::new();
        let mut start = inline_rows as i64;
        for (i, rows) in chunk_rows.iter().enumerate() {
            chunks.insert(i + 1, (start, *rows));
            start += *rows as i64;
        }
        Self {
            format,
            chunks,
            delays: HashMap::new(),
            failures: HashMap::new(),
            auth_failure: None,
            hang: None,
            attempts: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, ordinal: usize, delay: Duration) -> Self {
        self.delays.insert(ordinal, delay);
        self
    }

    fn with_failures(mut self, ordinal: usize, failures: u32) -> Self {
        self.failures.insert(ordinal, failures);
        self
    }

    fn with_auth_failure(mut self, ordinal: usize) -> Self {
        self.auth_failure = Some(ordinal);
        self
    }

    fn with_hang(mut self, ordinal: usize) -> Self {
        self.hang = Some(ordinal);
        self
    }

    fn attempts(&self, ordinal: usize) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(&ordinal)
            .copied()
            .unwrap_or(0)
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight count when a fetch ends or is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChunkFetcher for MockFetcher {
    async fn fetch(&self, descriptor: &ChunkDescriptor) -> Result<Bytes> {
        let ordinal = descriptor.ordinal;
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(ordinal).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if self.hang == Some(ordinal) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delays.get(&ordinal) {
            tokio::time::sleep(*delay).await;
        }
        if attempt <= self.failures.get(&ordinal).copied().unwrap_or(0) {
            return Err(Error::http_status(503, "service unavailable"));
        }
        if self.auth_failure == Some(ordinal) {
            return Err(Error::Auth {
                status: 403,
                message: "presigned url expired".to_string(),
            });
        }

        let (start, rows) = self.chunks[&ordinal];
        let data = match self.format {
            ResultFormat::Arrow => ipc_bytes(start, rows),
            ResultFormat::Textual => lz4_text_bytes(start, rows),
        };
        Ok(Bytes::from(data))
    }
}

// =============================================================================
// Mock ChunkParser
// =============================================================================

/// Arrow parser whose first `failures` calls report a corrupt chunk.
#[derive(Debug)]
struct FlakyParser {
    inner: ArrowChunkParser,
    failures: u32,
    calls: AtomicU32,
}

impl ChunkParser for FlakyParser {
    fn parse(&self, data: &[u8], schema: &ColumnSchemaRef) -> Result<RowSet> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(Error::corrupt("unexpected end of IPC stream"));
        }
        self.inner.parse(data, schema)
    }
}

#[derive(Debug)]
struct FlakyParserFactory(Arc<FlakyParser>);

impl ParserFactory for FlakyParserFactory {
    fn parser_for(&self, _: ResultFormat, _: CompressionCodec) -> Arc<dyn ChunkParser> {
        self.0.clone()
    }
}

// =============================================================================
// Ordering and completeness
// =============================================================================

async fn assert_in_order_with_workers(workers: usize) {
    let chunk_rows = vec![50; 12];
    let n = chunk_rows.len();
    // Later chunks finish first.
    let mut fetcher = MockFetcher::new(ResultFormat::Arrow, 20, &chunk_rows);
    for ordinal in 1..=n {
        fetcher = fetcher.with_delay(ordinal, Duration::from_millis(((n - ordinal) % 4) as u64 * 5));
    }
    let fetcher = Arc::new(fetcher);

    let mut cursor = factory(fetcher.clone(), Arc::new(DefaultParserFactory), fast_config(workers))
        .create_cursor(&response(ResultFormat::Arrow, 20, &chunk_rows), &CancellationToken::new())
        .unwrap();

    let ids = timeout(Duration::from_secs(10), read_ids(&mut cursor))
        .await
        .expect("read should finish")
        .unwrap();

    let expected: Vec<i64> = (0..620).collect();
    assert_eq!(ids, expected, "rows out of order with {} workers", workers);
    assert!(fetcher.peak_in_flight() <= workers);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rows_in_order_with_one_worker() {
    assert_in_order_with_workers(1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rows_in_order_with_two_workers() {
    assert_in_order_with_workers(2).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rows_in_order_with_four_workers() {
    assert_in_order_with_workers(4).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_completeness_ten_thousand_rows() {
    let chunk_rows = vec![1_000; 9];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 1_000, &chunk_rows));
    let mut cursor = factory(fetcher, Arc::new(DefaultParserFactory), fast_config(4))
        .create_cursor(&response(ResultFormat::Arrow, 1_000, &chunk_rows), &CancellationToken::new())
        .unwrap();

    let ids = read_ids(&mut cursor).await.unwrap();
    assert_eq!(ids.len(), 10_000);
    assert!(ids.iter().enumerate().all(|(i, id)| *id == i as i64));
    assert_eq!(cursor.rows_read(), 10_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_completeness_two_hundred_thousand_rows() {
    let chunk_rows = vec![4_000; 49];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 4_000, &chunk_rows));
    let mut cursor = factory(fetcher, Arc::new(DefaultParserFactory), fast_config(4))
        .create_cursor(&response(ResultFormat::Arrow, 4_000, &chunk_rows), &CancellationToken::new())
        .unwrap();

    let mut count = 0i64;
    while cursor.read().await.unwrap() {
        assert_eq!(cursor.get_value(0).unwrap().as_i64(), Some(count));
        count += 1;
    }
    assert_eq!(count, 200_000);
    assert!(!cursor.read().await.unwrap());
}

#[tokio::test]
async fn test_textual_lz4_chunks() {
    let chunk_rows = vec![30, 30, 40];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Textual, 5, &chunk_rows));
    let mut cursor = factory(fetcher, Arc::new(DefaultParserFactory), fast_config(2))
        .create_cursor(&response(ResultFormat::Textual, 5, &chunk_rows), &CancellationToken::new())
        .unwrap();

    let ids = read_ids(&mut cursor).await.unwrap();
    assert_eq!(ids, (0..105).collect::<Vec<i64>>());
}

// =============================================================================
// Retry
// =============================================================================

#[tokio::test]
async fn test_chunk_succeeds_within_retry_budget() {
    let chunk_rows = vec![100; 4];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 0, &chunk_rows).with_failures(3, 6));
    let mut cursor = factory(fetcher.clone(), Arc::new(DefaultParserFactory), fast_config(2))
        .create_cursor(&response(ResultFormat::Arrow, 0, &chunk_rows), &CancellationToken::new())
        .unwrap();

    let ids = read_ids(&mut cursor).await.unwrap();
    assert_eq!(ids.len(), 400);
    assert_eq!(fetcher.attempts(3), 7);
    assert_eq!(fetcher.attempts(1), 1);
}

#[tokio::test]
async fn test_chunk_exhausts_retry_budget() {
    let chunk_rows = vec![100; 3];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 100, &chunk_rows).with_failures(2, 8));
    let config = ChunkFetchConfig {
        retry_base_delay: Duration::from_millis(5),
        retry_max_delay: Duration::from_millis(20),
        ..fast_config(2)
    };
    let mut cursor = factory(fetcher.clone(), Arc::new(DefaultParserFactory), config)
        .create_cursor(&response(ResultFormat::Arrow, 100, &chunk_rows), &CancellationToken::new())
        .unwrap();

    let err = read_ids(&mut cursor).await.unwrap_err();
    match &err {
        Error::MaxRetryExceeded {
            ordinal,
            attempts,
            last_error,
        } => {
            assert_eq!(*ordinal, 2);
            assert_eq!(*attempts, 7);
            assert_eq!(last_error.status(), Some(503));
        }
        other => panic!("expected MaxRetryExceeded, got {:?}", other),
    }
    assert_eq!(fetcher.attempts(2), 7);
    assert!(cursor.rows_read() < 400);
    assert_eq!(cursor.rows_read(), 200);

    // The failure is sticky.
    assert!(matches!(
        cursor.read().await,
        Err(Error::MaxRetryExceeded { ordinal: 2, .. })
    ));
}

#[tokio::test]
async fn test_download_and_parse_failures_share_budget() {
    let chunk_rows = vec![10];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 0, &chunk_rows).with_failures(1, 3));
    let parser = Arc::new(FlakyParser {
        inner: ArrowChunkParser::new(CompressionCodec::None),
        failures: 4,
        calls: AtomicU32::new(0),
    });

    // 3 download failures + 4 parse failures = 7 failed attempts.
    let mut cursor = factory(
        fetcher.clone(),
        Arc::new(FlakyParserFactory(parser.clone())),
        fast_config(1),
    )
    .create_cursor(&response(ResultFormat::Arrow, 0, &chunk_rows), &CancellationToken::new())
    .unwrap();

    let err = read_ids(&mut cursor).await.unwrap_err();
    assert!(matches!(
        err,
        Error::MaxRetryExceeded { ordinal: 1, attempts: 7, .. }
    ));
    assert_eq!(fetcher.attempts(1), 7);
    assert_eq!(parser.calls.load(Ordering::SeqCst), 4);
}

fn flaky_parser(failures: u32) -> Arc<FlakyParser> {
    Arc::new(FlakyParser {
        inner: ArrowChunkParser::new(CompressionCodec::None),
        failures,
        calls: AtomicU32::new(0),
    })
}

#[tokio::test]
async fn test_corrupt_chunk_succeeds_within_retry_budget() {
    let chunk_rows = vec![10];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 5, &chunk_rows));
    let parser = flaky_parser(6);
    let mut cursor = factory(
        fetcher.clone(),
        Arc::new(FlakyParserFactory(parser.clone())),
        fast_config(1),
    )
    .create_cursor(&response(ResultFormat::Arrow, 5, &chunk_rows), &CancellationToken::new())
    .unwrap();

    let ids = read_ids(&mut cursor).await.unwrap();
    assert_eq!(ids, (0..15).collect::<Vec<i64>>());
    assert_eq!(parser.calls.load(Ordering::SeqCst), 7);
    assert_eq!(fetcher.attempts(1), 7);
}

#[tokio::test]
async fn test_corrupt_chunk_exhausts_retry_budget() {
    let chunk_rows = vec![10];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 5, &chunk_rows));
    let parser = flaky_parser(8);
    let mut cursor = factory(
        fetcher.clone(),
        Arc::new(FlakyParserFactory(parser.clone())),
        fast_config(1),
    )
    .create_cursor(&response(ResultFormat::Arrow, 5, &chunk_rows), &CancellationToken::new())
    .unwrap();

    let err = read_ids(&mut cursor).await.unwrap_err();
    match &err {
        Error::MaxRetryExceeded {
            ordinal,
            attempts,
            last_error,
        } => {
            assert_eq!(*ordinal, 1);
            assert_eq!(*attempts, 7);
            assert!(matches!(**last_error, Error::CorruptChunk(_)));
        }
        other => panic!("expected MaxRetryExceeded, got {:?}", other),
    }
    assert_eq!(parser.calls.load(Ordering::SeqCst), 7);
    assert!(cursor.rows_read() < 15);
    assert_eq!(cursor.rows_read(), 5);
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let chunk_rows = vec![10, 10, 10];
    // Delayed so chunk 1 is served before the session fails.
    let fetcher = Arc::new(
        MockFetcher::new(ResultFormat::Arrow, 0, &chunk_rows)
            .with_delay(2, Duration::from_millis(50))
            .with_auth_failure(2),
    );
    let mut cursor = factory(fetcher.clone(), Arc::new(DefaultParserFactory), fast_config(1))
        .create_cursor(&response(ResultFormat::Arrow, 0, &chunk_rows), &CancellationToken::new())
        .unwrap();

    let err = read_ids(&mut cursor).await.unwrap_err();
    assert!(matches!(err, Error::Auth { status: 403, .. }));
    assert_eq!(fetcher.attempts(2), 1);
    assert_eq!(cursor.rows_read(), 10);
}

// =============================================================================
// Memory bound
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_never_exceeds_workers() {
    let chunk_rows = vec![200; 20];
    let mut fetcher = MockFetcher::new(ResultFormat::Arrow, 0, &chunk_rows);
    for ordinal in 1..=20 {
        fetcher = fetcher.with_delay(ordinal, Duration::from_millis(5));
    }
    let fetcher = Arc::new(fetcher);

    let mut cursor = factory(fetcher.clone(), Arc::new(DefaultParserFactory), fast_config(3))
        .create_cursor(&response(ResultFormat::Arrow, 0, &chunk_rows), &CancellationToken::new())
        .unwrap();
    let tracker = cursor.chunk_states().expect("remote chunks");

    // A slow consumer lets the workers run as far ahead as they may.
    let mut rows = 0;
    while cursor.read().await.unwrap() {
        rows += 1;
        if rows % 200 == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    assert_eq!(rows, 4_000);
    assert!(fetcher.peak_in_flight() <= 3);
    assert!(tracker.peak_in_flight() <= 3);
    assert!(tracker.peak_in_flight() >= 1);
    assert_eq!(tracker.count(ChunkState::Released), 20);
}

// =============================================================================
// Close, cancellation and timeout
// =============================================================================

#[tokio::test]
async fn test_records_affected_after_close() {
    let chunk_rows = vec![10, 10];
    let mut response = response(ResultFormat::Arrow, 5, &chunk_rows);
    response.stats = serde_json::from_str(r#"{"numRowsUpdated": 7, "numRowsDeleted": 2}"#).ok();

    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 5, &chunk_rows));
    let mut cursor = factory(fetcher, Arc::new(DefaultParserFactory), fast_config(2))
        .create_cursor(&response, &CancellationToken::new())
        .unwrap();

    assert!(cursor.read().await.unwrap());
    cursor.close();
    assert_eq!(cursor.records_affected(), 9);
    assert!(matches!(cursor.read().await, Err(Error::InvalidState(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancellation_with_outstanding_fetch() {
    let chunk_rows = vec![10, 10, 10];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 0, &chunk_rows).with_hang(2));
    let cancel = CancellationToken::new();
    let mut cursor = factory(fetcher.clone(), Arc::new(DefaultParserFactory), fast_config(2))
        .create_cursor(&response(ResultFormat::Arrow, 0, &chunk_rows), &cancel)
        .unwrap();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = timeout(Duration::from_secs(2), read_ids(&mut cursor))
        .await
        .expect("read should return promptly after cancellation");
    assert!(matches!(
        result,
        Err(Error::Cancelled {
            reason: CancelReason::Caller
        })
    ));
    assert_eq!(cursor.rows_read(), 10);

    // The hanging request was dropped.
    timeout(Duration::from_secs(1), async {
        while fetcher.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("in-flight fetch should be aborted");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_command_timeout() {
    let chunk_rows = vec![10, 10];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 0, &chunk_rows).with_hang(1));
    let config = ChunkFetchConfig {
        command_timeout: Some(Duration::from_millis(100)),
        ..fast_config(2)
    };
    let mut cursor = factory(fetcher, Arc::new(DefaultParserFactory), config)
        .create_cursor(&response(ResultFormat::Arrow, 0, &chunk_rows), &CancellationToken::new())
        .unwrap();

    let result = timeout(Duration::from_secs(2), cursor.read())
        .await
        .expect("read should return after the command timeout");
    assert!(matches!(
        result,
        Err(Error::Cancelled {
            reason: CancelReason::Timeout
        })
    ));
}

// =============================================================================
// Blocking cursor
// =============================================================================

#[test]
fn test_blocking_cursor_reads_all_rows() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let chunk_rows = vec![25; 4];
    let fetcher = Arc::new(MockFetcher::new(ResultFormat::Arrow, 10, &chunk_rows));
    let factory = ResultReaderFactory::new(
        fetcher,
        Arc::new(DefaultParserFactory),
        fast_config(2),
        runtime.handle().clone(),
    );
    let mut cursor: BlockingRowCursor = factory
        .create_blocking_cursor(&response(ResultFormat::Arrow, 10, &chunk_rows), &CancellationToken::new())
        .unwrap();

    let mut ids = Vec::new();
    while cursor.read().unwrap() {
        ids.push(cursor.get_value(0).unwrap().as_i64().unwrap());
    }
    assert_eq!(ids, (0..110).collect::<Vec<i64>>());
    assert!(cursor.has_rows());
}
