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

//! Execution response types.
//!
//! These types map the JSON `data` object the query executor receives after
//! a statement completes. [`ResultManifest::from_response`] turns it into the
//! schema, inline chunk and remote chunk descriptors the reader works with.

use crate::error::{Error, Result};
use crate::types::chunk::{ChunkDescriptor, CompressionCodec, ResultFormat};
use crate::types::schema::{ColumnMetadata, ColumnSchema, ColumnSchemaRef, WireType};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Header carrying the per-result encryption key for chunk downloads.
pub const SSE_C_KEY_HEADER: &str = "x-amz-server-side-encryption-customer-key";
/// Header naming the algorithm of [`SSE_C_KEY_HEADER`].
pub const SSE_C_ALGORITHM_HEADER: &str = "x-amz-server-side-encryption-customer-algorithm";

/// Result portion of a statement execution response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(rename = "rowtype", default)]
    pub row_type: Vec<RowType>,
    /// `"arrow"` or `"json"`.
    #[serde(default)]
    pub query_result_format: Option<String>,
    /// Inline first chunk in the textual format.
    #[serde(default)]
    pub rowset: Option<Vec<Vec<Option<String>>>>,
    /// Inline first chunk as Arrow IPC (base64-encoded in JSON, decoded by serde).
    #[serde(default, deserialize_with = "deserialize_base64_rowset")]
    pub rowset_base64: Option<Vec<u8>>,
    #[serde(default)]
    pub chunks: Vec<ChunkInfo>,
    #[serde(default)]
    pub chunk_headers: Option<HashMap<String, String>>,
    /// Per-result encryption key, sent with every chunk GET.
    #[serde(default)]
    pub qrmk: Option<String>,
    /// Compression codec of chunk payloads ("LZ4_FRAME" or absent for none).
    #[serde(default)]
    pub result_compression: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub returned: Option<u64>,
    #[serde(default)]
    pub stats: Option<DmlStats>,
}

/// Column description from the `rowtype` array.
#[derive(Debug, Clone, Deserialize)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub scale: Option<i8>,
    #[serde(default)]
    pub length: Option<u64>,
}

fn default_nullable() -> bool {
    true
}

/// Remote chunk entry from the `chunks` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    pub url: String,
    pub row_count: usize,
    #[serde(default)]
    pub uncompressed_size: u64,
    #[serde(default)]
    pub compressed_size: u64,
}

/// Row counts reported for DML statements.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmlStats {
    #[serde(default)]
    pub num_rows_inserted: i64,
    #[serde(default)]
    pub num_rows_updated: i64,
    #[serde(default)]
    pub num_rows_deleted: i64,
    #[serde(default)]
    pub num_dml_duplicates: i64,
}

impl DmlStats {
    pub fn records_affected(&self) -> i64 {
        self.num_rows_inserted + self.num_rows_updated + self.num_rows_deleted
            + self.num_dml_duplicates
    }
}

/// Deserialize base64-encoded inline Arrow data from JSON.
fn deserialize_base64_rowset<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) if !s.is_empty() => STANDARD
            .decode(s.as_bytes())
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// The first chunk of a result set, delivered inside the execution response.
#[derive(Debug, Clone)]
pub enum InlineChunk {
    /// Textual rows, one `Option<String>` per cell.
    Rows(Vec<Vec<Option<String>>>),
    /// Arrow IPC stream bytes.
    Arrow(Vec<u8>),
    Empty,
}

/// Everything the reader needs to know about a result set up front.
#[derive(Debug, Clone)]
pub struct ResultManifest {
    pub schema: ColumnSchemaRef,
    pub format: ResultFormat,
    pub compression: CompressionCodec,
    pub inline: InlineChunk,
    /// Remote chunks, ordinals `1..=chunks.len()` in ascending order.
    pub chunks: Vec<ChunkDescriptor>,
    /// Rows affected by a DML statement, -1 for queries.
    pub records_affected: i64,
    /// Total row count declared by the server, if any.
    pub total_rows: Option<u64>,
}

impl ResultManifest {
    /// Build the manifest from an execution response.
    ///
    /// `default_format` is used when the response does not name its format.
    pub fn from_response(response: &ExecuteResponse, default_format: ResultFormat) -> Result<Self> {
        let schema = Arc::new(ColumnSchema::new(
            response
                .row_type
                .iter()
                .map(|rt| ColumnMetadata {
                    name: rt.name.clone(),
                    wire_type: WireType::from_type_name(&rt.type_name),
                    nullable: rt.nullable,
                    precision: rt.precision,
                    scale: rt.scale,
                    length: rt.length,
                })
                .collect(),
        ));

        let format = match response.query_result_format.as_deref() {
            Some(f) => f.parse()?,
            None => default_format,
        };

        let inline = match format {
            ResultFormat::Arrow => match &response.rowset_base64 {
                Some(bytes) if !bytes.is_empty() => InlineChunk::Arrow(bytes.clone()),
                _ => InlineChunk::Empty,
            },
            ResultFormat::Textual => match &response.rowset {
                Some(rows) if !rows.is_empty() => InlineChunk::Rows(rows.clone()),
                _ => InlineChunk::Empty,
            },
        };

        let headers = Self::chunk_headers(response);
        let chunks = response
            .chunks
            .iter()
            .enumerate()
            .map(|(i, info)| {
                if info.url.is_empty() {
                    return Err(Error::manifest(format!("chunk {} has an empty url", i + 1)));
                }
                Ok(ChunkDescriptor {
                    ordinal: i + 1,
                    row_count: info.row_count,
                    uncompressed_size: info.uncompressed_size,
                    compressed_size: info.compressed_size,
                    url: Some(info.url.clone()),
                    http_headers: headers.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let records_affected = response
            .stats
            .as_ref()
            .map(DmlStats::records_affected)
            .unwrap_or(-1);

        tracing::debug!(
            "Result manifest: format={}, columns={}, remote_chunks={}, total_rows={:?}",
            format,
            schema.len(),
            chunks.len(),
            response.total
        );

        Ok(Self {
            schema,
            format,
            compression: CompressionCodec::from_manifest(response.result_compression.as_deref()),
            inline,
            chunks,
            records_affected,
            total_rows: response.total,
        })
    }

    /// Headers for chunk GETs: explicit `chunkHeaders` win over the `qrmk` key.
    fn chunk_headers(response: &ExecuteResponse) -> HashMap<String, String> {
        if let Some(headers) = &response.chunk_headers {
            if !headers.is_empty() {
                return headers.clone();
            }
        }
        match &response.qrmk {
            Some(key) => HashMap::from([
                (SSE_C_ALGORITHM_HEADER.to_string(), "AES256".to_string()),
                (SSE_C_KEY_HEADER.to_string(), key.clone()),
            ]),
            None => HashMap::new(),
        }
    }

    /// Sum of the declared row counts of all remote chunks.
    pub fn remote_row_count(&self) -> usize {
        self.chunks.iter().map(|c| c.row_count).sum()
    }
}
