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

//! Error types for the warehouse driver.
//!
//! Every failure in the chunk pipeline is reported as an [`Error`]. The
//! variants encode how the download workers react to them:
//!
//! | Variant | Retried | Ends the session |
//! |---|---|---|
//! | `Transport` | Yes | Only once the retry budget is spent |
//! | `CorruptChunk` | Yes | Only once the retry budget is spent |
//! | `Auth` | No | Yes |
//! | `SchemaMismatch` | No | Yes |
//! | `InvalidManifest` | No | Yes |
//! | `MaxRetryExceeded` | - | Yes |
//! | `Cancelled` | - | Yes |
//!
//! `Error` is `Clone` so that a failed session can hand the same error to
//! every later call on the cursor.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a retrieval was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller cancelled the command.
    Caller,
    /// The command timeout elapsed.
    Timeout,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Caller => write!(f, "cancelled by caller"),
            CancelReason::Timeout => write!(f, "command timeout elapsed"),
        }
    }
}

/// Errors produced by the driver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Network failure, timeout or non-success HTTP status while fetching.
    #[error("transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Chunk bytes were truncated or otherwise undecodable.
    #[error("corrupt chunk data: {0}")]
    CorruptChunk(String),

    /// The chunk URL rejected our credentials.
    #[error("authorization failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// Decoded data does not fit the declared column schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The chunk manifest from the execution response is malformed.
    #[error("invalid chunk manifest: {0}")]
    InvalidManifest(String),

    /// A chunk failed on every attempt its retry budget allowed.
    #[error("chunk {ordinal} failed after {attempts} attempts: {last_error}")]
    MaxRetryExceeded {
        ordinal: usize,
        attempts: u32,
        last_error: Box<Error>,
    },

    /// Retrieval was cancelled before the result set was consumed.
    #[error("operation cancelled: {reason}")]
    Cancelled { reason: CancelReason },

    /// Row or column index outside the current row set.
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),

    /// The cursor or pipeline was used in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An unknown option key or an unparsable option value.
    #[error("invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    /// The HTTP client itself could not be set up.
    #[error("http client error: {0}")]
    Http(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl Error {
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Error::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Error::CorruptChunk(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Error::SchemaMismatch(message.into())
    }

    pub fn manifest(message: impl Into<String>) -> Self {
        Error::InvalidManifest(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Error::InvalidState(message.into())
    }

    pub fn cancelled(reason: CancelReason) -> Self {
        Error::Cancelled { reason }
    }

    pub fn invalid_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidOption {
            key: key.into(),
            message: message.into(),
        }
    }

    /// True for failures the download workers retry on the same chunk.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::CorruptChunk(_))
    }

    /// True for failures that end the session immediately, without retry.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// True if this error came from cancellation or a command timeout.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => *status,
            Error::Auth { status, .. } => Some(*status),
            _ => None,
        }
    }
}
