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

//! Result readers for query results.
//!
//! This module provides:
//! - `ResultReaderFactory`: opens a cursor for an execution response
//! - `RowCursor` / `BlockingRowCursor`: forward-only row access
//! - `chunks`: the remote chunk download pipeline

pub mod chunks;
pub mod cursor;

use crate::client::WarehouseHttpClient;
use crate::config::DriverConfig;
use crate::error::Result;
use crate::logging;
use crate::reader::chunks::parser::{text, ArrowChunkParser, ChunkParser};
use crate::reader::chunks::{
    ChunkDownloader, ChunkFetcher, DefaultParserFactory, HttpChunkFetcher, ParserFactory, RowSet,
};
use crate::types::{
    ChunkFetchConfig, CompressionCodec, ExecuteResponse, InlineChunk, ResultManifest,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use cursor::{BlockingRowCursor, RowCursor};

/// Opens row cursors over execution responses.
///
/// Holds what every result set of a connection shares: the chunk fetcher,
/// the parser strategy, the chunk retrieval settings and the runtime the
/// downloads run on.
#[derive(Debug)]
pub struct ResultReaderFactory {
    fetcher: Arc<dyn ChunkFetcher>,
    parsers: Arc<dyn ParserFactory>,
    config: ChunkFetchConfig,
    runtime_handle: tokio::runtime::Handle,
}

impl ResultReaderFactory {
    /// Create a factory from its collaborators.
    pub fn new(
        fetcher: Arc<dyn ChunkFetcher>,
        parsers: Arc<dyn ParserFactory>,
        config: ChunkFetchConfig,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        Self {
            fetcher,
            parsers,
            config,
            runtime_handle,
        }
    }

    /// Create a factory that downloads over HTTP with the built-in parsers.
    ///
    /// Also installs logging as configured by `config.log`.
    pub fn from_config(
        config: &DriverConfig,
        runtime_handle: tokio::runtime::Handle,
    ) -> Result<Self> {
        logging::init_logging(&config.log);

        let http_client = Arc::new(WarehouseHttpClient::new(config.http.clone())?);
        let fetcher = HttpChunkFetcher::new(http_client, config.chunks.speed_threshold_mbps);

        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(DefaultParserFactory),
            config.chunks.clone(),
            runtime_handle,
        ))
    }

    pub fn config(&self) -> &ChunkFetchConfig {
        &self.config
    }

    /// Open a cursor over the result set of `response`.
    ///
    /// The inline chunk is decoded right away; remote chunks start
    /// downloading in the background. Cancelling `cancel_token` stops the
    /// downloads and fails a pending `read`.
    pub fn create_cursor(
        &self,
        response: &ExecuteResponse,
        cancel_token: &CancellationToken,
    ) -> Result<RowCursor> {
        let manifest = ResultManifest::from_response(response, self.config.result_format)?;
        let first = Self::decode_inline(&manifest)?;

        let downloader = if manifest.chunks.is_empty() {
            None
        } else {
            let parser = self
                .parsers
                .parser_for(manifest.format, manifest.compression);
            tracing::debug!(
                "Using {} parser for {} remote chunks, compression={:?}",
                manifest.format,
                manifest.chunks.len(),
                manifest.compression
            );
            Some(ChunkDownloader::start(
                &self.runtime_handle,
                Arc::clone(&manifest.schema),
                manifest.chunks.clone(),
                &self.config,
                Arc::clone(&self.fetcher),
                parser,
                cancel_token,
            )?)
        };

        Ok(RowCursor::new(
            Arc::clone(&manifest.schema),
            first,
            downloader,
            manifest.records_affected,
            manifest.remote_row_count(),
        ))
    }

    /// Like [`create_cursor`](Self::create_cursor), for synchronous callers.
    pub fn create_blocking_cursor(
        &self,
        response: &ExecuteResponse,
        cancel_token: &CancellationToken,
    ) -> Result<BlockingRowCursor> {
        let cursor = self.create_cursor(response, cancel_token)?;
        Ok(BlockingRowCursor::new(cursor, self.runtime_handle.clone()))
    }

    /// Decode chunk 0. Inline Arrow data is never compressed.
    fn decode_inline(manifest: &ResultManifest) -> Result<RowSet> {
        match &manifest.inline {
            InlineChunk::Rows(rows) => Ok(RowSet::Rows(text::decode_rows(rows, &manifest.schema)?)),
            InlineChunk::Arrow(bytes) => {
                ArrowChunkParser::new(CompressionCodec::None).parse(bytes, &manifest.schema)
            }
            InlineChunk::Empty => Ok(RowSet::empty(manifest.schema.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{ChunkDescriptor, Value};
    use async_trait::async_trait;
    use bytes::Bytes;

    #[derive(Debug)]
    struct TextFetcher;

    #[async_trait]
    impl ChunkFetcher for TextFetcher {
        async fn fetch(&self, descriptor: &ChunkDescriptor) -> Result<Bytes> {
            let base = descriptor.ordinal * 10;
            let rows: Vec<String> = (0..descriptor.row_count)
                .map(|i| format!("[\"{}\"]", base + i))
                .collect();
            Ok(Bytes::from(rows.join(",")))
        }
    }

    fn factory() -> ResultReaderFactory {
        ResultReaderFactory::new(
            Arc::new(TextFetcher),
            Arc::new(DefaultParserFactory),
            ChunkFetchConfig::default(),
            tokio::runtime::Handle::current(),
        )
    }

    fn response(json: &str) -> ExecuteResponse {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_inline_then_remote_chunks() {
        let response = response(
            r#"{
                "rowtype": [{"name": "N", "type": "fixed", "scale": 0}],
                "queryResultFormat": "json",
                "rowset": [["1"], ["2"]],
                "chunks": [
                    {"url": "https://stage.example.com/c1", "rowCount": 2},
                    {"url": "https://stage.example.com/c2", "rowCount": 3}
                ]
            }"#,
        );
        let mut cursor = factory()
            .create_cursor(&response, &CancellationToken::new())
            .unwrap();
        assert!(cursor.has_rows());
        assert_eq!(cursor.records_affected(), -1);

        let mut values = Vec::new();
        while cursor.read().await.unwrap() {
            values.push(cursor.get_value(0).unwrap());
        }
        let expected: Vec<Value> = [1, 2, 10, 11, 20, 21, 22].into_iter().map(Value::Int).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn test_dml_response_without_rows() {
        let response = response(
            r#"{
                "rowtype": [{"name": "number of rows inserted", "type": "fixed"}],
                "queryResultFormat": "json",
                "rowset": [],
                "stats": {"numRowsInserted": 5}
            }"#,
        );
        let mut cursor = factory()
            .create_cursor(&response, &CancellationToken::new())
            .unwrap();
        assert!(!cursor.has_rows());
        assert!(!cursor.read().await.unwrap());
        cursor.close();
        assert_eq!(cursor.records_affected(), 5);
    }

    #[tokio::test]
    async fn test_inline_schema_mismatch_fails_open() {
        let response = response(
            r#"{
                "rowtype": [{"name": "A", "type": "text"}],
                "queryResultFormat": "json",
                "rowset": [["x", "y"]]
            }"#,
        );
        let err = factory()
            .create_cursor(&response, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }
}
