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

//! Chunk parsers.
//!
//! A result set uses one wire format for all of its chunks, so the parser is
//! chosen once, when the result set is opened, through a [`ParserFactory`].
//! Parsers are stateless and shared by all download workers.
//!
//! Parsers classify failures so the workers know whether to retry:
//! - bytes that are truncated or undecodable: [`Error::CorruptChunk`]
//! - data that decodes but does not fit the column schema:
//!   [`Error::SchemaMismatch`]
//!
//! [`Error::CorruptChunk`]: crate::error::Error::CorruptChunk
//! [`Error::SchemaMismatch`]: crate::error::Error::SchemaMismatch

pub mod arrow;
pub mod text;

use crate::error::{Error, Result};
use crate::types::{ColumnSchemaRef, CompressionCodec, ResultFormat, Value};
use lz4_flex::frame::FrameDecoder;
use std::borrow::Cow;
use std::fmt::Debug;
use std::io::{Cursor, Read};
use std::sync::Arc;

pub use self::arrow::{ArrowChunkParser, ArrowRowSet};
pub use self::text::{TextChunkParser, ValueRows};

/// Decodes the raw bytes of one chunk into rows.
pub trait ChunkParser: Send + Sync + Debug {
    /// Parse `data` against the result set's column schema.
    ///
    /// Must be deterministic: the same bytes always give the same rows.
    fn parse(&self, data: &[u8], schema: &ColumnSchemaRef) -> Result<RowSet>;
}

/// Chooses the parser for a result set.
pub trait ParserFactory: Send + Sync + Debug {
    fn parser_for(
        &self,
        format: ResultFormat,
        compression: CompressionCodec,
    ) -> Arc<dyn ChunkParser>;
}

/// Picks the built-in parser matching the result format.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultParserFactory;

impl ParserFactory for DefaultParserFactory {
    fn parser_for(
        &self,
        format: ResultFormat,
        compression: CompressionCodec,
    ) -> Arc<dyn ChunkParser> {
        match format {
            ResultFormat::Arrow => Arc::new(ArrowChunkParser::new(compression)),
            ResultFormat::Textual => Arc::new(TextChunkParser::new(compression)),
        }
    }
}

/// Decoded rows of one chunk.
#[derive(Debug, Clone)]
pub enum RowSet {
    /// Arrow record batches, read cell by cell on access.
    Columnar(ArrowRowSet),
    /// Rows decoded eagerly from the textual format.
    Rows(ValueRows),
}

impl RowSet {
    /// A row set without rows.
    pub fn empty(column_count: usize) -> Self {
        RowSet::Rows(ValueRows::new(column_count, Vec::new()))
    }

    pub fn row_count(&self) -> usize {
        match self {
            RowSet::Columnar(rows) => rows.row_count(),
            RowSet::Rows(rows) => rows.row_count(),
        }
    }

    pub fn column_count(&self) -> usize {
        match self {
            RowSet::Columnar(rows) => rows.column_count(),
            RowSet::Rows(rows) => rows.column_count(),
        }
    }

    /// Value at `(row, column)`, or `IndexOutOfRange`.
    pub fn get(&self, row: usize, column: usize) -> Result<Value> {
        check_bounds(row, column, self.row_count(), self.column_count())?;
        match self {
            RowSet::Columnar(rows) => rows.get(row, column),
            RowSet::Rows(rows) => rows.get(row, column),
        }
    }
}

pub(crate) fn check_bounds(row: usize, column: usize, rows: usize, columns: usize) -> Result<()> {
    if row >= rows {
        return Err(Error::IndexOutOfRange(format!(
            "row {} of a chunk with {} rows",
            row, rows
        )));
    }
    if column >= columns {
        return Err(Error::IndexOutOfRange(format!(
            "column {} of a result with {} columns",
            column, columns
        )));
    }
    Ok(())
}

/// Undo chunk compression. A broken LZ4 frame is reported as a corrupt chunk.
pub(crate) fn decompress(data: &[u8], compression: CompressionCodec) -> Result<Cow<'_, [u8]>> {
    match compression {
        CompressionCodec::None => Ok(Cow::Borrowed(data)),
        CompressionCodec::Lz4Frame => {
            let mut decoder = FrameDecoder::new(Cursor::new(data));
            let mut buf = Vec::new();
            decoder
                .read_to_end(&mut buf)
                .map_err(|e| Error::corrupt(format!("LZ4 decompression failed: {}", e)))?;
            Ok(Cow::Owned(buf))
        }
    }
}
