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

//! Types shared across the driver.
//!
//! - `chunk`: chunk descriptors, states and retrieval configuration
//! - `response`: execution response and result manifest
//! - `schema`: column metadata
//! - `value`: decoded cell values

pub mod chunk;
pub mod response;
pub mod schema;
pub mod value;

pub use chunk::{ChunkDescriptor, ChunkFetchConfig, ChunkState, CompressionCodec, ResultFormat};
pub use response::{ExecuteResponse, InlineChunk, ResultManifest};
pub use schema::{ColumnMetadata, ColumnSchema, ColumnSchemaRef, WireType};
pub use value::Value;
