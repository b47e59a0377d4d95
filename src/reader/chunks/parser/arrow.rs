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

//! Arrow IPC stream chunks.
//!
//! A chunk is an Arrow IPC stream, optionally wrapped in an LZ4 frame, and
//! may hold several record batches. Cells are converted to [`Value`] on
//! access using the declared column metadata: integer columns with a
//! non-zero scale are fixed-point numbers, and integer time and timestamp
//! columns count units of `10^-scale` seconds.
//!
//! Timestamp columns may also arrive as a struct of `epoch` seconds, an
//! optional `fraction` in nanoseconds and, for zoned timestamps, a
//! `timezone` in minutes east of UTC biased by 1440.

use super::{decompress, ChunkParser, RowSet};
use crate::error::{Error, Result};
use crate::types::{ColumnMetadata, ColumnSchemaRef, CompressionCodec, Value, WireType};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Decimal128Type, Decimal256Type, Float32Type, Float64Type, Int16Type,
    Int32Type, Int64Type, Int8Type, Time32MillisecondType, Time32SecondType,
    Time64MicrosecondType, Time64NanosecondType, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType,
};
use arrow_array::{Array, ArrowPrimitiveType, FixedSizeBinaryArray, RecordBatch, StructArray};
use arrow_ipc::reader::StreamReader;
use arrow_schema::{DataType, TimeUnit};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use std::io::Cursor;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Parser for Arrow IPC stream chunks.
#[derive(Debug, Clone, Copy)]
pub struct ArrowChunkParser {
    compression: CompressionCodec,
}

impl ArrowChunkParser {
    pub fn new(compression: CompressionCodec) -> Self {
        Self { compression }
    }
}

impl ChunkParser for ArrowChunkParser {
    fn parse(&self, data: &[u8], schema: &ColumnSchemaRef) -> Result<RowSet> {
        let bytes = decompress(data, self.compression)?;

        let reader = StreamReader::try_new(Cursor::new(bytes.as_ref()), None)
            .map_err(|e| Error::corrupt(format!("failed to open Arrow IPC stream: {}", e)))?;

        let stream_schema = reader.schema();
        if stream_schema.fields().len() != schema.len() {
            return Err(Error::schema(format!(
                "chunk has {} columns, result declares {}",
                stream_schema.fields().len(),
                schema.len()
            )));
        }
        for (field, column) in stream_schema.fields().iter().zip(schema.columns()) {
            if !column.wire_type.accepts_arrow(field.data_type()) {
                return Err(Error::schema(format!(
                    "column '{}' declared {:?} but chunk holds {}",
                    column.name,
                    column.wire_type,
                    field.data_type()
                )));
            }
        }

        let batches = reader
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::corrupt(format!("failed to read Arrow batches: {}", e)))?;

        Ok(RowSet::Columnar(ArrowRowSet::new(schema.clone(), batches)))
    }
}

/// Record batches of one chunk with a row index across them.
#[derive(Debug, Clone)]
pub struct ArrowRowSet {
    schema: ColumnSchemaRef,
    batches: Vec<RecordBatch>,
    /// First row of each batch.
    starts: Vec<usize>,
    row_count: usize,
}

impl ArrowRowSet {
    pub fn new(schema: ColumnSchemaRef, batches: Vec<RecordBatch>) -> Self {
        let batches: Vec<RecordBatch> = batches.into_iter().filter(|b| b.num_rows() > 0).collect();
        let mut starts = Vec::with_capacity(batches.len());
        let mut row_count = 0;
        for batch in &batches {
            starts.push(row_count);
            row_count += batch.num_rows();
        }
        Self {
            schema,
            batches,
            starts,
            row_count,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub(super) fn get(&self, row: usize, column: usize) -> Result<Value> {
        super::check_bounds(row, column, self.row_count, self.column_count())?;
        let batch_index = self.starts.partition_point(|&start| start <= row) - 1;
        let batch = &self.batches[batch_index];
        let array = batch.column(column);
        cell(
            array.as_ref(),
            row - self.starts[batch_index],
            self.schema.column(column),
        )
    }
}

fn unsupported(data_type: &DataType) -> Error {
    Error::schema(format!("unsupported Arrow type {}", data_type))
}

fn primitive<T: ArrowPrimitiveType>(array: &dyn Array, row: usize) -> Result<T::Native> {
    array
        .as_primitive_opt::<T>()
        .map(|a| a.value(row))
        .ok_or_else(|| unsupported(array.data_type()))
}

/// Convert one cell. `meta` is `None` for values nested inside lists,
/// structs and maps, which carry no column metadata of their own.
fn cell(array: &dyn Array, row: usize, meta: Option<&ColumnMetadata>) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let data_type = array.data_type();
    let value = match data_type {
        DataType::Boolean => Value::Boolean(
            array
                .as_boolean_opt()
                .ok_or_else(|| unsupported(data_type))?
                .value(row),
        ),
        DataType::Int8 => integer(i64::from(primitive::<Int8Type>(array, row)?), meta)?,
        DataType::Int16 => integer(i64::from(primitive::<Int16Type>(array, row)?), meta)?,
        DataType::Int32 => integer(i64::from(primitive::<Int32Type>(array, row)?), meta)?,
        DataType::Int64 => integer(primitive::<Int64Type>(array, row)?, meta)?,
        DataType::Float32 => Value::Real(f64::from(primitive::<Float32Type>(array, row)?)),
        DataType::Float64 => Value::Real(primitive::<Float64Type>(array, row)?),
        DataType::Decimal128(_, scale) => Value::Decimal {
            unscaled: primitive::<Decimal128Type>(array, row)?,
            scale: *scale,
        },
        DataType::Decimal256(_, scale) => Value::Decimal {
            unscaled: primitive::<Decimal256Type>(array, row)?
                .to_i128()
                .ok_or_else(|| Error::schema("decimal value exceeds 38 digits"))?,
            scale: *scale,
        },
        DataType::Utf8 => Value::Text(
            array
                .as_string_opt::<i32>()
                .ok_or_else(|| unsupported(data_type))?
                .value(row)
                .to_string(),
        ),
        DataType::LargeUtf8 => Value::Text(
            array
                .as_string_opt::<i64>()
                .ok_or_else(|| unsupported(data_type))?
                .value(row)
                .to_string(),
        ),
        DataType::Binary => Value::Binary(
            array
                .as_binary_opt::<i32>()
                .ok_or_else(|| unsupported(data_type))?
                .value(row)
                .to_vec(),
        ),
        DataType::LargeBinary => Value::Binary(
            array
                .as_binary_opt::<i64>()
                .ok_or_else(|| unsupported(data_type))?
                .value(row)
                .to_vec(),
        ),
        DataType::FixedSizeBinary(_) => Value::Binary(
            array
                .as_any()
                .downcast_ref::<FixedSizeBinaryArray>()
                .ok_or_else(|| unsupported(data_type))?
                .value(row)
                .to_vec(),
        ),
        DataType::Date32 => Value::Date(date_from_days(i64::from(primitive::<Date32Type>(
            array, row,
        )?))?),
        DataType::Date64 => {
            let millis = primitive::<Date64Type>(array, row)?;
            Value::Date(date_from_days(millis.div_euclid(86_400_000))?)
        }
        DataType::Time32(TimeUnit::Second) => {
            time_from_nanos(i128::from(primitive::<Time32SecondType>(array, row)?) * NANOS_PER_SEC)?
        }
        DataType::Time32(TimeUnit::Millisecond) => time_from_nanos(
            i128::from(primitive::<Time32MillisecondType>(array, row)?) * 1_000_000,
        )?,
        DataType::Time64(TimeUnit::Microsecond) => time_from_nanos(
            i128::from(primitive::<Time64MicrosecondType>(array, row)?) * 1_000,
        )?,
        DataType::Time64(TimeUnit::Nanosecond) => {
            time_from_nanos(i128::from(primitive::<Time64NanosecondType>(array, row)?))?
        }
        DataType::Timestamp(unit, tz) => {
            let nanos = match unit {
                TimeUnit::Second => {
                    i128::from(primitive::<TimestampSecondType>(array, row)?) * NANOS_PER_SEC
                }
                TimeUnit::Millisecond => {
                    i128::from(primitive::<TimestampMillisecondType>(array, row)?) * 1_000_000
                }
                TimeUnit::Microsecond => {
                    i128::from(primitive::<TimestampMicrosecondType>(array, row)?) * 1_000
                }
                TimeUnit::Nanosecond => {
                    i128::from(primitive::<TimestampNanosecondType>(array, row)?)
                }
            };
            let offset = tz.as_deref().and_then(|tz| tz.parse::<FixedOffset>().ok());
            timestamp(nanos, meta.map(|m| m.wire_type), offset)?
        }
        DataType::List(_) => {
            let list = array
                .as_list_opt::<i32>()
                .ok_or_else(|| unsupported(data_type))?
                .value(row);
            list_values(list.as_ref())?
        }
        DataType::LargeList(_) => {
            let list = array
                .as_list_opt::<i64>()
                .ok_or_else(|| unsupported(data_type))?
                .value(row);
            list_values(list.as_ref())?
        }
        DataType::Struct(fields) => {
            let strukt = array.as_struct_opt().ok_or_else(|| unsupported(data_type))?;
            match meta.map(|m| m.wire_type) {
                Some(
                    wire_type @ (WireType::TimestampNtz
                    | WireType::TimestampLtz
                    | WireType::TimestampTz),
                ) => struct_timestamp(strukt, row, wire_type)?,
                _ => {
                    let values = fields
                        .iter()
                        .zip(strukt.columns())
                        .map(|(field, child)| {
                            Ok((field.name().clone(), cell(child.as_ref(), row, None)?))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Value::Struct(values)
                }
            }
        }
        DataType::Map(_, _) => {
            let map = array.as_map_opt().ok_or_else(|| unsupported(data_type))?;
            let offsets = map.value_offsets();
            let (start, end) = (offsets[row] as usize, offsets[row + 1] as usize);
            let entries = (start..end)
                .map(|i| {
                    Ok((
                        cell(map.keys().as_ref(), i, None)?,
                        cell(map.values().as_ref(), i, None)?,
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            Value::Map(entries)
        }
        other => return Err(unsupported(other)),
    };
    Ok(value)
}

fn list_values(values: &dyn Array) -> Result<Value> {
    (0..values.len())
        .map(|i| cell(values, i, None))
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

/// Interpret an integer using the column's declared type and scale.
fn integer(value: i64, meta: Option<&ColumnMetadata>) -> Result<Value> {
    let Some(meta) = meta else {
        return Ok(Value::Int(value));
    };
    let scale = meta.scale_or_zero();
    match meta.wire_type {
        WireType::Fixed if scale != 0 => Ok(Value::Decimal {
            unscaled: i128::from(value),
            scale,
        }),
        WireType::Time => time_from_nanos(scaled_to_nanos(value, scale)?),
        WireType::TimestampNtz | WireType::TimestampLtz | WireType::TimestampTz => {
            timestamp(scaled_to_nanos(value, scale)?, Some(meta.wire_type), None)
        }
        _ => Ok(Value::Int(value)),
    }
}

fn struct_timestamp(strukt: &StructArray, row: usize, wire_type: WireType) -> Result<Value> {
    let epoch = strukt
        .column_by_name("epoch")
        .ok_or_else(|| Error::schema("timestamp struct has no 'epoch' field"))?;
    let secs = struct_int(epoch.as_ref(), row)?;
    let fraction = match strukt.column_by_name("fraction") {
        Some(fraction) => struct_int(fraction.as_ref(), row)?,
        None => 0,
    };
    let offset = match strukt.column_by_name("timezone") {
        Some(zone) => {
            let biased = struct_int(zone.as_ref(), row)?;
            Some(offset_from_biased_minutes(biased).ok_or_else(|| {
                Error::schema(format!("timezone {} out of range", biased))
            })?)
        }
        None => None,
    };
    timestamp(
        i128::from(secs) * NANOS_PER_SEC + i128::from(fraction),
        Some(wire_type),
        offset,
    )
}

fn struct_int(array: &dyn Array, row: usize) -> Result<i64> {
    match array.data_type() {
        DataType::Int32 => Ok(i64::from(primitive::<Int32Type>(array, row)?)),
        DataType::Int64 => primitive::<Int64Type>(array, row),
        other => Err(unsupported(other)),
    }
}

/// Zone offset from minutes east of UTC biased by 1440.
pub(crate) fn offset_from_biased_minutes(biased: i64) -> Option<FixedOffset> {
    let seconds = biased.checked_sub(1440)?.checked_mul(60)?;
    FixedOffset::east_opt(i32::try_from(seconds).ok()?)
}

/// `value * 10^-scale` seconds, in nanoseconds.
fn scaled_to_nanos(value: i64, scale: i8) -> Result<i128> {
    if !(0..=9).contains(&scale) {
        return Err(Error::schema(format!("unsupported time scale {}", scale)));
    }
    Ok(i128::from(value) * 10i128.pow(9 - scale as u32))
}

fn date_from_days(days: i64) -> Result<NaiveDate> {
    // 1970-01-01 is day 719163 of the common era.
    days.checked_add(719_163)
        .and_then(|d| i32::try_from(d).ok())
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| Error::schema(format!("date out of range: {} days", days)))
}

fn split_nanos(nanos: i128) -> Result<(i64, u32)> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC))
        .map_err(|_| Error::schema("time value out of range"))?;
    Ok((secs, nanos.rem_euclid(NANOS_PER_SEC) as u32))
}

pub(crate) fn time_from_nanos(nanos: i128) -> Result<Value> {
    let (secs, sub) = split_nanos(nanos)?;
    u32::try_from(secs)
        .ok()
        .and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, sub))
        .map(Value::Time)
        .ok_or_else(|| Error::schema(format!("time of day out of range: {}s", secs)))
}

/// Build a timestamp from nanoseconds since the epoch.
///
/// Without a declared wire type the value is treated as a UTC instant if the
/// Arrow type carries a zone, and as a naive timestamp otherwise.
pub(crate) fn timestamp(
    nanos: i128,
    wire_type: Option<WireType>,
    offset: Option<FixedOffset>,
) -> Result<Value> {
    let (secs, sub) = split_nanos(nanos)?;
    let utc: DateTime<Utc> = DateTime::from_timestamp(secs, sub)
        .ok_or_else(|| Error::schema(format!("timestamp out of range: {}s", secs)))?;
    Ok(match (wire_type, offset) {
        (Some(WireType::TimestampTz), offset) => {
            let offset = offset.unwrap_or_else(|| Utc.fix());
            Value::TimestampTz(utc.with_timezone(&offset))
        }
        (Some(WireType::TimestampLtz), _) | (None, Some(_)) => Value::TimestampUtc(utc),
        _ => Value::Timestamp(utc.naive_utc()),
    })
}
