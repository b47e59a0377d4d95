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

//! Textual chunks.
//!
//! A textual chunk is a sequence of rows, each a bracketed array of string
//! tokens or `null`, separated by commas. The whole sequence may or may not
//! be wrapped in an outer array:
//!
//! ```text
//! ["1","abc",null],["2","d\"ef","3.5"]
//! [["1","abc",null],["2","d\"ef","3.5"]]
//! ```
//!
//! Strings use the JSON escapes. In addition, the private-use character
//! U+E000 followed by a character `c` stands for the control character
//! `c - 0x40` (`U+E000 J` is a line feed, `U+E000 ?` is DEL).
//!
//! Every token is a string, whatever the column type; the column metadata
//! decides how it is converted.

use super::arrow::{offset_from_biased_minutes, time_from_nanos, timestamp};
use super::{decompress, ChunkParser, RowSet};
use crate::error::{Error, Result};
use crate::types::{
    ColumnMetadata, ColumnSchema, ColumnSchemaRef, CompressionCodec, Value, WireType,
};
use chrono::NaiveDate;

const CONTROL_ESCAPE: char = '\u{E000}';
const MAX_DECIMAL_DIGITS: usize = 38;
const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Parser for the textual chunk format.
#[derive(Debug, Clone, Copy)]
pub struct TextChunkParser {
    compression: CompressionCodec,
}

impl TextChunkParser {
    pub fn new(compression: CompressionCodec) -> Self {
        Self { compression }
    }
}

impl ChunkParser for TextChunkParser {
    fn parse(&self, data: &[u8], schema: &ColumnSchemaRef) -> Result<RowSet> {
        let bytes = decompress(data, self.compression)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| Error::corrupt(format!("chunk is not valid UTF-8: {}", e)))?;
        let tokens = Lexer::new(text).rows()?;
        decode_rows(&tokens, schema).map(RowSet::Rows)
    }
}

/// Rows already converted to values.
#[derive(Debug, Clone, Default)]
pub struct ValueRows {
    column_count: usize,
    rows: Vec<Vec<Value>>,
}

impl ValueRows {
    pub fn new(column_count: usize, rows: Vec<Vec<Value>>) -> Self {
        Self { column_count, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub(super) fn get(&self, row: usize, column: usize) -> Result<Value> {
        super::check_bounds(row, column, self.rows.len(), self.column_count)?;
        Ok(self.rows[row][column].clone())
    }
}

/// Convert raw string cells, as found in the inline `rowset` of an execution
/// response or produced by the lexer, into typed rows.
pub fn decode_rows<S: AsRef<str>>(rows: &[Vec<Option<S>>], schema: &ColumnSchema) -> Result<ValueRows> {
    let decoded = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            if row.len() != schema.len() {
                return Err(Error::schema(format!(
                    "row {} has {} columns, result declares {}",
                    index,
                    row.len(),
                    schema.len()
                )));
            }
            row.iter()
                .zip(schema.columns())
                .map(|(token, column)| match token {
                    Some(token) => convert(token.as_ref(), column),
                    None => Ok(Value::Null),
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ValueRows::new(schema.len(), decoded))
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn truncated(&self) -> Error {
        Error::corrupt(format!("chunk ends inside a row at byte {}", self.pos))
    }

    fn unexpected(&self, expected: &str) -> Error {
        match self.peek() {
            Some(c) => Error::corrupt(format!(
                "expected {} at byte {}, found '{}'",
                expected, self.pos, c
            )),
            None => self.truncated(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn rows(mut self) -> Result<Vec<Vec<Option<String>>>> {
        self.skip_ws();
        if self.peek().is_none() {
            return Ok(Vec::new());
        }

        // An outer array starts with '[' followed by another '[' or by ']'.
        let checkpoint = self.pos;
        let mut outer = false;
        if self.eat('[') {
            self.skip_ws();
            outer = matches!(self.peek(), Some('[' | ']'));
            if !outer {
                self.pos = checkpoint;
            }
        }

        let mut rows = Vec::new();
        loop {
            self.skip_ws();
            if outer && self.eat(']') {
                break;
            }
            if !outer && self.peek().is_none() && rows.is_empty() {
                break;
            }
            rows.push(self.row()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if outer {
                if self.eat(']') {
                    break;
                }
                return Err(self.unexpected("',' or ']'"));
            }
            if self.peek().is_none() {
                break;
            }
            return Err(self.unexpected("','"));
        }

        self.skip_ws();
        if self.peek().is_some() {
            return Err(self.unexpected("end of chunk"));
        }
        Ok(rows)
    }

    fn row(&mut self) -> Result<Vec<Option<String>>> {
        if !self.eat('[') {
            return Err(self.unexpected("'['"));
        }
        let mut cells = Vec::new();
        self.skip_ws();
        if self.eat(']') {
            return Ok(cells);
        }
        loop {
            self.skip_ws();
            cells.push(self.cell()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat(']') {
                return Ok(cells);
            }
            return Err(self.unexpected("',' or ']'"));
        }
    }

    fn cell(&mut self) -> Result<Option<String>> {
        match self.peek() {
            Some('"') => self.string().map(Some),
            Some('n') => {
                if self.src[self.pos..].starts_with("null") {
                    self.pos += 4;
                    Ok(None)
                } else if "null".starts_with(&self.src[self.pos..]) {
                    Err(self.truncated())
                } else {
                    Err(self.unexpected("string or null"))
                }
            }
            _ => Err(self.unexpected("string or null")),
        }
    }

    fn string(&mut self) -> Result<String> {
        self.bump();
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(|| self.truncated())?;
            match c {
                '"' if out.ends_with(CONTROL_ESCAPE) => {
                    return Err(Error::corrupt(format!(
                        "string ends inside a control escape at byte {}",
                        self.pos
                    )))
                }
                '"' => return Ok(out),
                '\\' => {
                    let decoded = self.escape()?;
                    self.push_char(&mut out, decoded)?;
                }
                c => self.push_char(&mut out, c)?,
            }
        }
    }

    /// Append `c`, resolving a pending U+E000 control escape.
    fn push_char(&mut self, out: &mut String, c: char) -> Result<()> {
        if out.ends_with(CONTROL_ESCAPE) {
            out.pop();
            out.push(control_char(c).ok_or_else(|| {
                Error::corrupt(format!(
                    "invalid control escape U+E000 '{}' at byte {}",
                    c, self.pos
                ))
            })?);
        } else {
            out.push(c);
        }
        Ok(())
    }

    fn escape(&mut self) -> Result<char> {
        let c = self.bump().ok_or_else(|| self.truncated())?;
        Ok(match c {
            '"' => '"',
            '\\' => '\\',
            '/' => '/',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => {
                let high = self.hex4()?;
                if (0xD800..0xDC00).contains(&high) {
                    if !(self.eat('\\') && self.eat('u')) {
                        return Err(self.unexpected("low surrogate escape"));
                    }
                    let low = self.hex4()?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(Error::corrupt(format!(
                            "invalid low surrogate \\u{:04x}",
                            low
                        )));
                    }
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    char::from_u32(code)
                        .ok_or_else(|| Error::corrupt("invalid surrogate pair"))?
                } else {
                    char::from_u32(high).ok_or_else(|| {
                        Error::corrupt(format!("invalid unicode escape \\u{:04x}", high))
                    })?
                }
            }
            other => {
                return Err(Error::corrupt(format!(
                    "invalid escape '\\{}' at byte {}",
                    other, self.pos
                )))
            }
        })
    }

    fn hex4(&mut self) -> Result<u32> {
        let end = self.pos + 4;
        let digits = self.src.get(self.pos..end).ok_or_else(|| self.truncated())?;
        let code = u32::from_str_radix(digits, 16)
            .map_err(|_| Error::corrupt(format!("invalid unicode escape '{}'", digits)))?;
        self.pos = end;
        Ok(code)
    }
}

/// Caret notation: `@` is NUL, `A` is SOH, ..., `_` is US, `?` is DEL.
fn control_char(c: char) -> Option<char> {
    match c {
        '@'..='_' => char::from_u32(c as u32 - 0x40),
        '?' => Some('\u{7f}'),
        _ => None,
    }
}

fn mismatch(token: &str, column: &ColumnMetadata) -> Error {
    Error::schema(format!(
        "value '{}' is not a valid {:?} for column '{}'",
        token, column.wire_type, column.name
    ))
}

/// Convert one non-null token according to the column's wire type.
fn convert(token: &str, column: &ColumnMetadata) -> Result<Value> {
    let fail = || mismatch(token, column);
    match column.wire_type {
        WireType::Text | WireType::Variant | WireType::Object | WireType::Array => {
            Ok(Value::Text(token.to_string()))
        }
        WireType::Fixed => parse_fixed(token, column.scale_or_zero()).ok_or_else(fail),
        WireType::Real => parse_real(token).map(Value::Real).ok_or_else(fail),
        WireType::Boolean => match token.to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(Value::Boolean(true)),
            "0" | "false" => Ok(Value::Boolean(false)),
            _ => Err(fail()),
        },
        WireType::Date => {
            let days: i64 = token.trim().parse().map_err(|_| fail())?;
            days.checked_add(719_163)
                .and_then(|d| i32::try_from(d).ok())
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .map(Value::Date)
                .ok_or_else(fail)
        }
        WireType::Time => time_from_nanos(parse_seconds(token).ok_or_else(fail)?),
        WireType::TimestampNtz | WireType::TimestampLtz => timestamp(
            parse_seconds(token).ok_or_else(fail)?,
            Some(column.wire_type),
            None,
        ),
        WireType::TimestampTz => {
            let mut parts = token.split_whitespace();
            let nanos = parts.next().and_then(parse_seconds).ok_or_else(fail)?;
            // The zone is minutes east of UTC, biased by 1440.
            let offset = match parts.next() {
                Some(biased) => {
                    let minutes: i64 = biased.parse().map_err(|_| fail())?;
                    Some(offset_from_biased_minutes(minutes).ok_or_else(fail)?)
                }
                None => None,
            };
            if parts.next().is_some() {
                return Err(fail());
            }
            timestamp(nanos, Some(WireType::TimestampTz), offset)
        }
        WireType::Binary => decode_hex(token).map(Value::Binary).ok_or_else(fail),
    }
}

/// Parse a plain decimal literal and rescale it to `scale` digits.
///
/// Scale 0 values that fit in 64 bits decode as [`Value::Int`]. A literal
/// with more significant fractional digits than the column scale keeps its
/// own scale rather than losing precision.
fn parse_fixed(token: &str, scale: i8) -> Option<Value> {
    let token = token.trim();
    let (negative, digits) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let frac_part = frac_part.trim_end_matches('0');
    let target = usize::try_from(scale.max(0)).ok()?;
    let literal_scale = frac_part.len().max(target);
    let significant = int_part.trim_start_matches('0').len() + literal_scale;
    if significant > MAX_DECIMAL_DIGITS {
        return None;
    }

    let mut unscaled: i128 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        unscaled = unscaled.checked_mul(10)?.checked_add(i128::from(b - b'0'))?;
    }
    unscaled = unscaled.checked_mul(10i128.checked_pow((literal_scale - frac_part.len()) as u32)?)?;
    if negative {
        unscaled = -unscaled;
    }

    let literal_scale = i8::try_from(literal_scale).ok()?;
    if literal_scale == 0 {
        if let Ok(v) = i64::try_from(unscaled) {
            return Some(Value::Int(v));
        }
    }
    Some(Value::Decimal {
        unscaled,
        scale: literal_scale,
    })
}

fn parse_real(token: &str) -> Option<f64> {
    match token.trim().to_ascii_lowercase().as_str() {
        "inf" | "infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

/// `secs[.fraction]` to nanoseconds. Fractions beyond nanoseconds are cut off.
fn parse_seconds(token: &str) -> Option<i128> {
    let token = token.trim();
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let (secs, frac) = body.split_once('.').unwrap_or((body, ""));
    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs: i128 = secs.parse().ok()?;
    let frac = &frac[..frac.len().min(9)];
    let frac_nanos: i128 = if frac.is_empty() {
        0
    } else {
        frac.parse::<i128>().ok()? * 10i128.pow(9 - frac.len() as u32)
    };
    let nanos = secs.checked_mul(NANOS_PER_SEC)?.checked_add(frac_nanos)?;
    Some(if negative { -nanos } else { nanos })
}

fn decode_hex(token: &str) -> Option<Vec<u8>> {
    let bytes = token.as_bytes();
    if bytes.len() % 2 != 0 {
        return None;
    }
    bytes
        .chunks_exact(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}
