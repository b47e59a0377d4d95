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

//! Column metadata shared by every chunk of a result set.

use arrow_schema::DataType;
use std::sync::Arc;

/// Column type as declared by the server in the execution response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    /// Fixed-point number; `scale` gives the digits after the decimal point.
    Fixed,
    Real,
    Text,
    Boolean,
    Date,
    Time,
    TimestampNtz,
    TimestampLtz,
    TimestampTz,
    Binary,
    Variant,
    Object,
    Array,
}

impl WireType {
    /// Map the server's type name. Unknown names decode as text.
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "fixed" | "number" | "decimal" => WireType::Fixed,
            "real" | "float" | "double" => WireType::Real,
            "text" | "string" | "varchar" => WireType::Text,
            "boolean" => WireType::Boolean,
            "date" => WireType::Date,
            "time" => WireType::Time,
            "timestamp" | "timestamp_ntz" => WireType::TimestampNtz,
            "timestamp_ltz" => WireType::TimestampLtz,
            "timestamp_tz" => WireType::TimestampTz,
            "binary" => WireType::Binary,
            "variant" => WireType::Variant,
            "object" => WireType::Object,
            "array" => WireType::Array,
            other => {
                tracing::debug!("Unknown wire type '{}', decoding as text", other);
                WireType::Text
            }
        }
    }

    /// Whether an Arrow column of `data_type` can carry values of this type.
    pub fn accepts_arrow(&self, data_type: &DataType) -> bool {
        use DataType::*;
        match self {
            WireType::Fixed => matches!(
                data_type,
                Int8 | Int16 | Int32 | Int64 | Decimal128(_, _) | Decimal256(_, _)
            ),
            WireType::Real => matches!(data_type, Float32 | Float64),
            WireType::Text => matches!(data_type, Utf8 | LargeUtf8),
            WireType::Boolean => matches!(data_type, Boolean),
            WireType::Date => matches!(data_type, Date32 | Date64),
            WireType::Time => matches!(data_type, Time32(_) | Time64(_) | Int32 | Int64),
            WireType::TimestampNtz | WireType::TimestampLtz | WireType::TimestampTz => {
                matches!(data_type, Timestamp(_, _) | Int64 | Struct(_))
            }
            WireType::Binary => matches!(data_type, Binary | LargeBinary | FixedSizeBinary(_)),
            WireType::Variant | WireType::Object | WireType::Array => matches!(
                data_type,
                Utf8 | LargeUtf8 | List(_) | LargeList(_) | Struct(_) | Map(_, _)
            ),
        }
    }
}

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    pub wire_type: WireType,
    pub nullable: bool,
    pub precision: Option<u8>,
    pub scale: Option<i8>,
    pub length: Option<u64>,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, wire_type: WireType) -> Self {
        Self {
            name: name.into(),
            wire_type,
            nullable: true,
            precision: None,
            scale: None,
            length: None,
        }
    }

    pub fn with_scale(mut self, precision: u8, scale: i8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Declared scale, treating an absent scale as zero.
    pub fn scale_or_zero(&self) -> i8 {
        self.scale.unwrap_or(0)
    }
}

/// Ordered column list of a result set. Immutable once the result is opened.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnSchema {
    columns: Vec<ColumnMetadata>,
}

/// Shared handle to a result set's schema.
pub type ColumnSchemaRef = Arc<ColumnSchema>;

impl ColumnSchema {
    pub fn new(columns: Vec<ColumnMetadata>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&ColumnMetadata> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Position of the first column with this name (case-insensitive).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::TimeUnit;

    #[test]
    fn test_wire_type_from_name() {
        assert_eq!(WireType::from_type_name("FIXED"), WireType::Fixed);
        assert_eq!(WireType::from_type_name("text"), WireType::Text);
        assert_eq!(
            WireType::from_type_name("timestamp_tz"),
            WireType::TimestampTz
        );
        assert_eq!(WireType::from_type_name("geography"), WireType::Text);
    }

    #[test]
    fn test_wire_type_accepts_arrow() {
        assert!(WireType::Fixed.accepts_arrow(&DataType::Int64));
        assert!(WireType::Fixed.accepts_arrow(&DataType::Decimal128(38, 2)));
        assert!(!WireType::Fixed.accepts_arrow(&DataType::Utf8));
        assert!(WireType::TimestampNtz
            .accepts_arrow(&DataType::Timestamp(TimeUnit::Microsecond, None)));
        assert!(!WireType::Boolean.accepts_arrow(&DataType::Int8));
    }

    #[test]
    fn test_schema_lookup() {
        let schema = ColumnSchema::new(vec![
            ColumnMetadata::new("ID", WireType::Fixed).not_null(),
            ColumnMetadata::new("name", WireType::Text),
        ]);
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.index_of("id"), Some(0));
        assert_eq!(schema.index_of("NAME"), Some(1));
        assert_eq!(schema.index_of("missing"), None);
        assert!(!schema.column(0).unwrap().nullable);
    }
}
