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

//! Result retrieval for a cloud data warehouse SQL driver.
//!
//! A statement execution returns its first rows inline and the rest as a
//! manifest of chunks stored behind presigned URLs. This crate turns such a
//! response into a forward-only row cursor, downloading and decoding the
//! remote chunks ahead of the reader.
//!
//! ## Overview
//!
//! - [`ResultReaderFactory`] - Opens a cursor for an [`ExecuteResponse`]
//! - [`RowCursor`] - Async forward-only row access
//! - [`BlockingRowCursor`] - The same, for synchronous callers
//! - [`reader::chunks`] - The download pipeline: fetcher, parsers, workers
//!
//! ## Features
//!
//! - **Prefetching**: a bounded pool of workers downloads chunks in parallel
//!   while rows are served strictly in order
//! - **Retry**: per-chunk attempt budget with exponential backoff and jitter
//! - **Formats**: Arrow IPC (optionally LZ4 compressed) and the textual row
//!   format
//! - **Cancellation**: caller cancellation and command timeout stop all
//!   downloads promptly
//!
//! ## Example
//!
//! ```ignore
//! use warehouse_driver::{DriverConfig, ExecuteResponse, ResultReaderFactory};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = DriverConfig::from_options([("warehouse.chunk.prefetch_workers", "8")])?;
//! let factory = ResultReaderFactory::from_config(&config, runtime.handle().clone())?;
//!
//! let response: ExecuteResponse = serde_json::from_slice(&body)?;
//! let mut cursor = factory.create_cursor(&response, &CancellationToken::new())?;
//! while cursor.read().await? {
//!     println!("{}", cursor.get_value(0)?);
//! }
//! ```
//!
//! ## Configuration Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `warehouse.chunk.prefetch_workers` | 4 | Download workers and prefetch window |
//! | `warehouse.chunk.max_retries` | 7 | Attempts per chunk |
//! | `warehouse.chunk.retry_base_delay_ms` | 500 | First backoff delay |
//! | `warehouse.chunk.retry_max_delay_ms` | 16000 | Backoff ceiling |
//! | `warehouse.chunk.speed_threshold_mbps` | 0.1 | Slow download warning threshold |
//! | `warehouse.result_format` | arrow | Format assumed when a response omits it |
//! | `warehouse.command_timeout_ms` | unset | Cancel retrieval after this long |
//! | `warehouse.http.connect_timeout_ms` | 30000 | TCP connect timeout |
//! | `warehouse.http.read_timeout_ms` | 60000 | Request timeout |
//! | `warehouse.http.max_retries` | 5 | Connection-level retries per request |
//! | `warehouse.log_level` | unset | Log filter for this crate |
//! | `warehouse.log_file` | unset | Log to this file instead of stderr |

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod reader;
pub mod types;

// Re-export main types
pub use config::DriverConfig;
pub use error::{CancelReason, Error, Result};
pub use reader::{BlockingRowCursor, ResultReaderFactory, RowCursor};
pub use types::{ExecuteResponse, ResultManifest, Value};

// Re-export client types for advanced users
pub use client::{HttpClientConfig, WarehouseHttpClient};

// Re-export configuration types
pub use types::ChunkFetchConfig;
