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

//! Per-chunk retry budget and backoff.
//!
//! | Outcome of attempt `n` | Action |
//! |---|---|
//! | Success | Publish the rows |
//! | Retryable error, `n < max_attempts` | Sleep `backoff(n)`, try again |
//! | Retryable error, `n >= max_attempts` | `MaxRetryExceeded` |
//! | Fatal error | Fail the session at once |
//!
//! `backoff(n) = min(base * 2^(n-1), max) + jitter`, with the jitter drawn
//! uniformly from `[0, capped / 4]`.

use crate::types::ChunkFetchConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed per chunk, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl From<&ChunkFetchConfig> for RetryPolicy {
    fn from(config: &ChunkFetchConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `failed_attempts` failures.
    pub fn should_retry(&self, failed_attempts: u32) -> bool {
        failed_attempts < self.max_attempts
    }

    /// Backoff before attempt `failed_attempts + 1`, without jitter.
    pub fn capped_delay(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff before attempt `failed_attempts + 1`, jitter included.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let capped = self.capped_delay(failed_attempts);
        let jitter_ceiling = capped / 4;
        if jitter_ceiling.is_zero() {
            return capped;
        }
        let jitter = rand::rng().random_range(Duration::ZERO..=jitter_ceiling);
        capped + jitter
    }
}
