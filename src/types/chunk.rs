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

//! Chunk-specific types for result retrieval.
//!
//! These types are used by `ChunkDownloader` and the download workers to
//! describe, track and configure the download of remote result chunks.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default number of prefetch workers per result set.
pub const DEFAULT_PREFETCH_WORKERS: usize = 4;

/// Default number of attempts allowed per chunk before the session fails.
pub const DEFAULT_MAX_RETRIES: u32 = 7;

/// Configuration for chunk retrieval.
///
/// Values are captured when a result set is opened and are not reloaded
/// while its chunks are being downloaded.
#[derive(Debug, Clone)]
pub struct ChunkFetchConfig {
    /// Number of concurrent fetch+parse workers. Also sizes the window of
    /// chunk handles queued ahead of the consumer.
    pub prefetch_workers: usize,
    /// Attempts allowed per chunk; the chunk fails once this many attempts failed.
    pub max_retries: u32,
    /// First backoff delay; doubles with every further attempt.
    pub retry_base_delay: Duration,
    /// Upper bound for a single backoff delay, before jitter.
    pub retry_max_delay: Duration,
    /// Log warning if download speed falls below this threshold (MB/s).
    pub speed_threshold_mbps: f64,
    /// Format requested from the server; used when a response omits its format.
    pub result_format: ResultFormat,
    /// Cancel the retrieval once this much time has passed since it started.
    pub command_timeout: Option<Duration>,
}

impl Default for ChunkFetchConfig {
    fn default() -> Self {
        Self {
            prefetch_workers: DEFAULT_PREFETCH_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(16),
            speed_threshold_mbps: 0.1,
            result_format: ResultFormat::Arrow,
            command_timeout: None,
        }
    }
}

/// Wire format a result set was produced in.
///
/// Chosen once per result set; every chunk of the set uses the same format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFormat {
    /// Arrow IPC stream (binary, columnar).
    #[default]
    Arrow,
    /// Escaped JSON-like token stream (textual, row-major).
    Textual,
}

impl FromStr for ResultFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "arrow" | "arrow_force" => Ok(ResultFormat::Arrow),
            "json" | "text" | "textual" => Ok(ResultFormat::Textual),
            other => Err(Error::manifest(format!("unknown result format '{}'", other))),
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultFormat::Arrow => write!(f, "arrow"),
            ResultFormat::Textual => write!(f, "json"),
        }
    }
}

/// Compression applied to chunk payloads on top of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionCodec {
    #[default]
    None,
    Lz4Frame,
}

impl CompressionCodec {
    /// Map the `resultCompression` field of an execution response.
    pub fn from_manifest(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("LZ4_FRAME") => Self::Lz4Frame,
            _ => Self::None,
        }
    }
}

/// Descriptor of one chunk of a result set.
///
/// Ordinal 0 is the inline chunk delivered with the execution response and
/// has no URL. Remote chunks carry the URL and the headers the GET needs.
#[derive(Debug, Clone)]
pub struct ChunkDescriptor {
    /// Position of this chunk in the result set.
    pub ordinal: usize,
    /// Number of rows the server declared for this chunk.
    pub row_count: usize,
    /// Decoded size in bytes, as declared by the server.
    pub uncompressed_size: u64,
    /// Size on the wire in bytes, as declared by the server.
    pub compressed_size: u64,
    /// Presigned download URL; `None` for the inline chunk.
    pub url: Option<String>,
    /// Headers to send with the GET (per-result encryption key and the like).
    pub http_headers: HashMap<String, String>,
}

impl ChunkDescriptor {
    /// Descriptor for the inline chunk that came with the execution response.
    pub fn inline(row_count: usize) -> Self {
        Self {
            ordinal: 0,
            row_count,
            uncompressed_size: 0,
            compressed_size: 0,
            url: None,
            http_headers: HashMap::new(),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.url.is_none()
    }
}

/// How a failed chunk attempt is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Waiting out a backoff delay before the next attempt.
    Retryable,
    /// Terminal; the session has failed.
    Fatal,
}

/// State of a chunk in the download pipeline.
///
/// State transitions:
/// ```text
///   Pending -> Downloading (worker claimed the chunk)
///   Downloading -> Parsing (bytes received)
///   Parsing -> Ready (row set published)
///   Downloading | Parsing -> Failed(Retryable) -> Downloading (retry)
///   Downloading | Parsing -> Failed(Fatal) (session fails)
///   Ready -> Released (consumer moved past the chunk)
///   * -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Downloading,
    Parsing,
    Ready,
    Failed(FailureKind),
    Released,
    Cancelled,
}

impl ChunkState {
    /// True while a worker holds network or parse resources for the chunk.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ChunkState::Downloading | ChunkState::Parsing)
    }

    /// True once no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChunkState::Failed(FailureKind::Fatal) | ChunkState::Released | ChunkState::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_fetch_config_default() {
        let config = ChunkFetchConfig::default();
        assert_eq!(config.prefetch_workers, 4);
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.retry_base_delay, Duration::from_millis(500));
        assert_eq!(config.retry_max_delay, Duration::from_secs(16));
        assert_eq!(config.result_format, ResultFormat::Arrow);
        assert!(config.command_timeout.is_none());
    }

    #[test]
    fn test_result_format_parsing() {
        assert_eq!("arrow".parse::<ResultFormat>().unwrap(), ResultFormat::Arrow);
        assert_eq!("ARROW".parse::<ResultFormat>().unwrap(), ResultFormat::Arrow);
        assert_eq!("json".parse::<ResultFormat>().unwrap(), ResultFormat::Textual);
        assert!("xml".parse::<ResultFormat>().is_err());
        assert_eq!(ResultFormat::Textual.to_string(), "json");
    }

    #[test]
    fn test_compression_from_manifest() {
        assert_eq!(
            CompressionCodec::from_manifest(Some("LZ4_FRAME")),
            CompressionCodec::Lz4Frame
        );
        assert_eq!(
            CompressionCodec::from_manifest(Some("lz4_frame")),
            CompressionCodec::Lz4Frame
        );
        assert_eq!(CompressionCodec::from_manifest(None), CompressionCodec::None);
    }

    #[test]
    fn test_inline_descriptor() {
        let desc = ChunkDescriptor::inline(42);
        assert_eq!(desc.ordinal, 0);
        assert_eq!(desc.row_count, 42);
        assert!(desc.is_inline());
    }

    #[test]
    fn test_chunk_state_predicates() {
        assert!(ChunkState::Downloading.is_in_flight());
        assert!(ChunkState::Parsing.is_in_flight());
        assert!(!ChunkState::Failed(FailureKind::Retryable).is_in_flight());
        assert!(!ChunkState::Ready.is_in_flight());
        assert!(ChunkState::Released.is_terminal());
        assert!(ChunkState::Failed(FailureKind::Fatal).is_terminal());
        assert!(!ChunkState::Failed(FailureKind::Retryable).is_terminal());
    }
}
