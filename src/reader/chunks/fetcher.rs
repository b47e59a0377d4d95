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

//! Fetching the raw bytes of remote chunks.
//!
//! A fetch is a single GET against the chunk's presigned URL with the
//! headers from its descriptor. Chunk-level retries are the download
//! workers' job; the fetcher only classifies what went wrong.

use crate::client::http::redact_url;
use crate::client::WarehouseHttpClient;
use crate::error::{Error, Result};
use crate::types::ChunkDescriptor;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Retrieves the bytes of one remote chunk.
///
/// Implementations hold no per-chunk state and can be called concurrently
/// from every download worker.
#[async_trait]
pub trait ChunkFetcher: Send + Sync + Debug {
    async fn fetch(&self, descriptor: &ChunkDescriptor) -> Result<Bytes>;
}

/// [`ChunkFetcher`] backed by the driver's HTTP client.
#[derive(Debug)]
pub struct HttpChunkFetcher {
    http_client: Arc<WarehouseHttpClient>,
    speed_threshold_mbps: f64,
}

impl HttpChunkFetcher {
    pub fn new(http_client: Arc<WarehouseHttpClient>, speed_threshold_mbps: f64) -> Self {
        Self {
            http_client,
            speed_threshold_mbps,
        }
    }
}

/// 401 and 403 mean the chunk URL or its key was rejected; retrying the
/// same request cannot succeed.
fn classify(error: Error) -> Error {
    match error {
        Error::Transport {
            status: Some(status @ (401 | 403)),
            message,
        } => Error::Auth { status, message },
        other => other,
    }
}

#[async_trait]
impl ChunkFetcher for HttpChunkFetcher {
    async fn fetch(&self, descriptor: &ChunkDescriptor) -> Result<Bytes> {
        let url = descriptor.url.as_deref().ok_or_else(|| {
            Error::manifest(format!("chunk {} has no download url", descriptor.ordinal))
        })?;

        let start = Instant::now();
        debug!(
            "Downloading chunk {} from {} ({} bytes expected)",
            descriptor.ordinal,
            redact_url(url),
            descriptor.compressed_size
        );

        let response = self
            .http_client
            .get(url, &descriptor.http_headers)
            .await
            .map_err(classify)?;

        let bytes = response.bytes().await.map_err(|e| {
            Error::transport(format!(
                "failed to read body of chunk {}: {}",
                descriptor.ordinal, e
            ))
        })?;

        let elapsed = start.elapsed();
        let size_mb = bytes.len() as f64 / 1024.0 / 1024.0;
        let speed_mbps = size_mb / elapsed.as_secs_f64().max(f64::EPSILON);

        debug!(
            "Downloaded chunk {}: {:.2} MB in {:.2}s ({:.2} MB/s)",
            descriptor.ordinal,
            size_mb,
            elapsed.as_secs_f64(),
            speed_mbps
        );

        if speed_mbps < self.speed_threshold_mbps {
            warn!(
                "Chunk download slower than threshold: {:.2} MB/s (threshold: {:.2} MB/s)",
                speed_mbps, self.speed_threshold_mbps
            );
        }

        Ok(bytes)
    }
}
