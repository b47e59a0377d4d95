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

//! String-keyed driver options.
//!
//! Options are set before a result set is opened and copied into the
//! downloader when it starts. Changing them afterwards only affects result
//! sets opened later.

use crate::client::HttpClientConfig;
use crate::error::{Error, Result};
use crate::logging::LogConfig;
use crate::types::{ChunkFetchConfig, ResultFormat};
use std::time::Duration;

pub const OPT_PREFETCH_WORKERS: &str = "warehouse.chunk.prefetch_workers";
pub const OPT_CHUNK_MAX_RETRIES: &str = "warehouse.chunk.max_retries";
pub const OPT_RETRY_BASE_DELAY_MS: &str = "warehouse.chunk.retry_base_delay_ms";
pub const OPT_RETRY_MAX_DELAY_MS: &str = "warehouse.chunk.retry_max_delay_ms";
pub const OPT_SPEED_THRESHOLD_MBPS: &str = "warehouse.chunk.speed_threshold_mbps";
pub const OPT_RESULT_FORMAT: &str = "warehouse.result_format";
pub const OPT_COMMAND_TIMEOUT_MS: &str = "warehouse.command_timeout_ms";
pub const OPT_HTTP_CONNECT_TIMEOUT_MS: &str = "warehouse.http.connect_timeout_ms";
pub const OPT_HTTP_READ_TIMEOUT_MS: &str = "warehouse.http.read_timeout_ms";
pub const OPT_HTTP_MAX_RETRIES: &str = "warehouse.http.max_retries";
pub const OPT_LOG_LEVEL: &str = "warehouse.log_level";
pub const OPT_LOG_FILE: &str = "warehouse.log_file";

/// All driver configuration in one place.
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    pub http: HttpClientConfig,
    pub chunks: ChunkFetchConfig,
    pub log: LogConfig,
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `(key, value)` pairs, failing on the first bad one.
    pub fn from_options<'a, I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (key, value) in options {
            config.set_option(key, value)?;
        }
        Ok(config)
    }

    fn parse_int_option(key: &str, value: &str) -> Result<i64> {
        value
            .trim()
            .parse()
            .map_err(|_| Error::invalid_option(key, format!("'{}' is not an integer", value)))
    }

    fn parse_float_option(key: &str, value: &str) -> Result<f64> {
        value
            .trim()
            .parse()
            .map_err(|_| Error::invalid_option(key, format!("'{}' is not a number", value)))
    }

    fn parse_positive(key: &str, value: &str) -> Result<u64> {
        let v = Self::parse_int_option(key, value)?;
        if v < 1 {
            return Err(Error::invalid_option(key, "must be at least 1"));
        }
        Ok(v as u64)
    }

    fn parse_millis(key: &str, value: &str) -> Result<Duration> {
        let v = Self::parse_int_option(key, value)?;
        if v < 0 {
            return Err(Error::invalid_option(key, "must not be negative"));
        }
        Ok(Duration::from_millis(v as u64))
    }

    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            // Chunk retrieval
            OPT_PREFETCH_WORKERS => {
                self.chunks.prefetch_workers = Self::parse_positive(key, value)? as usize;
            }
            OPT_CHUNK_MAX_RETRIES => {
                self.chunks.max_retries = Self::parse_positive(key, value)?
                    .try_into()
                    .map_err(|_| Error::invalid_option(key, "value too large"))?;
            }
            OPT_RETRY_BASE_DELAY_MS => {
                self.chunks.retry_base_delay = Self::parse_millis(key, value)?;
            }
            OPT_RETRY_MAX_DELAY_MS => {
                self.chunks.retry_max_delay = Self::parse_millis(key, value)?;
            }
            OPT_SPEED_THRESHOLD_MBPS => {
                self.chunks.speed_threshold_mbps = Self::parse_float_option(key, value)?;
            }
            OPT_RESULT_FORMAT => {
                self.chunks.result_format = value
                    .parse::<ResultFormat>()
                    .map_err(|e| Error::invalid_option(key, e.to_string()))?;
            }
            OPT_COMMAND_TIMEOUT_MS => {
                let timeout = Self::parse_millis(key, value)?;
                // 0 disables the timeout
                self.chunks.command_timeout = (!timeout.is_zero()).then_some(timeout);
            }

            // HTTP client
            OPT_HTTP_CONNECT_TIMEOUT_MS => {
                self.http.connect_timeout = Self::parse_millis(key, value)?;
            }
            OPT_HTTP_READ_TIMEOUT_MS => {
                self.http.read_timeout = Self::parse_millis(key, value)?;
            }
            OPT_HTTP_MAX_RETRIES => {
                let v = Self::parse_int_option(key, value)?;
                self.http.max_retries = u32::try_from(v)
                    .map_err(|_| Error::invalid_option(key, "must be between 0 and 2^32-1"))?;
            }

            // Logging
            OPT_LOG_LEVEL => self.log.level = Some(value.to_string()),
            OPT_LOG_FILE => self.log.file = Some(value.to_string()),

            _ => return Err(Error::invalid_option(key, "unknown option")),
        }
        Ok(())
    }

    pub fn get_option_string(&self, key: &str) -> Result<String> {
        match key {
            OPT_RESULT_FORMAT => Ok(self.chunks.result_format.to_string()),
            OPT_LOG_LEVEL => self
                .log
                .level
                .clone()
                .ok_or_else(|| Error::invalid_state(format!("option '{}' is not set", key))),
            OPT_LOG_FILE => self
                .log
                .file
                .clone()
                .ok_or_else(|| Error::invalid_state(format!("option '{}' is not set", key))),
            _ => self.get_option_int(key).map(|v| v.to_string()).or_else(|_| {
                self.get_option_double(key)
                    .map(|v| v.to_string())
                    .map_err(|_| Error::invalid_option(key, "unknown option"))
            }),
        }
    }

    pub fn get_option_int(&self, key: &str) -> Result<i64> {
        let millis = |d: Duration| d.as_millis() as i64;
        match key {
            OPT_PREFETCH_WORKERS => Ok(self.chunks.prefetch_workers as i64),
            OPT_CHUNK_MAX_RETRIES => Ok(self.chunks.max_retries as i64),
            OPT_RETRY_BASE_DELAY_MS => Ok(millis(self.chunks.retry_base_delay)),
            OPT_RETRY_MAX_DELAY_MS => Ok(millis(self.chunks.retry_max_delay)),
            OPT_COMMAND_TIMEOUT_MS => Ok(self.chunks.command_timeout.map_or(0, millis)),
            OPT_HTTP_CONNECT_TIMEOUT_MS => Ok(millis(self.http.connect_timeout)),
            OPT_HTTP_READ_TIMEOUT_MS => Ok(millis(self.http.read_timeout)),
            OPT_HTTP_MAX_RETRIES => Ok(self.http.max_retries as i64),
            _ => Err(Error::invalid_option(key, "unknown integer option")),
        }
    }

    pub fn get_option_double(&self, key: &str) -> Result<f64> {
        match key {
            OPT_SPEED_THRESHOLD_MBPS => Ok(self.chunks.speed_threshold_mbps),
            _ => Err(Error::invalid_option(key, "unknown floating point option")),
        }
    }
}
