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

//! Remote chunk retrieval.
//!
//! Large results arrive as a manifest of chunks stored behind presigned
//! URLs. This module downloads them ahead of the consumer with a bounded
//! pool of workers and hands them back in order:
//!
//! ```text
//! [Scheduler] --work queue--> [Workers: fetch -> parse, retry]
//!      |                              |
//!      v                              v
//! result channel (ordered) <--- oneshot per chunk
//!      |
//!      v
//! ChunkDownloader::next_chunk() -> RowCursor
//! ```
//!
//! ## Components
//!
//! - [`fetcher`]: one GET per chunk, failure classification
//! - [`parser`]: Arrow IPC and textual decoding into [`RowSet`]s
//! - [`retry`]: per-chunk attempt budget and backoff
//! - [`scheduler`]: ordered handles with a bounded window
//! - [`workers`]: fetch, parse and retry loop
//! - [`state`]: per-chunk state and in-flight accounting
//! - [`downloader`]: the session tying them together
//!
//! [`RowSet`]: parser::RowSet

pub mod downloader;
pub mod fetcher;
pub mod parser;
pub mod pipeline_types;
pub mod retry;
pub mod scheduler;
pub mod state;
pub mod workers;

pub use downloader::ChunkDownloader;
pub use fetcher::{ChunkFetcher, HttpChunkFetcher};
pub use parser::{ChunkParser, DefaultParserFactory, ParserFactory, RowSet};
pub use pipeline_types::ResultChunk;
pub use retry::RetryPolicy;
pub use state::ChunkStateTracker;
