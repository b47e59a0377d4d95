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

//! Process-wide log output for the driver.
//!
//! The driver emits `tracing` events under the `warehouse_driver` target.
//! A subscriber is installed the first time a [`ResultReaderFactory`] is
//! built; embedding applications that install their own subscriber first
//! keep theirs.
//!
//! Level resolution, first match wins:
//!
//! 1. `warehouse.log_level` option
//! 2. `RUST_LOG` environment variable
//! 3. `warn`
//!
//! ```bash
//! RUST_LOG=warehouse_driver=debug ./my_app
//! ```
//!
//! [`ResultReaderFactory`]: crate::reader::ResultReaderFactory

use std::fs::File;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_TARGET: &str = "warehouse_driver";

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Log settings taken from `warehouse.log_*` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub level: Option<String>,
    /// Append to this file instead of writing to stderr.
    pub file: Option<String>,
}

impl LogConfig {
    fn is_off(&self) -> bool {
        self.level
            .as_deref()
            .is_some_and(|level| level.eq_ignore_ascii_case("off"))
    }

    fn filter(&self) -> EnvFilter {
        match self.level {
            Some(ref level) => EnvFilter::new(format!("{}={}", LOG_TARGET, level.to_lowercase())),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{}=warn", LOG_TARGET))),
        }
    }
}

/// Install the tracing subscriber once per process. Later calls are no-ops.
pub fn init_logging(config: &LogConfig) {
    LOGGING_INITIALIZED.get_or_init(|| {
        if config.is_off() {
            return;
        }

        let filter = config.filter();
        let file = config.file.as_deref().and_then(|path| {
            match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => Some(f),
                Err(e) => {
                    eprintln!("warehouse-driver: cannot open log file {}: {}", path, e);
                    None
                }
            }
        });

        install(filter, file);
    });
}

fn install(filter: EnvFilter, file: Option<File>) {
    let registry = tracing_subscriber::registry().with(filter);
    match file {
        Some(file) => registry
            .with(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_timer(SystemTime),
            )
            .try_init()
            .ok(),
        None => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_timer(SystemTime),
            )
            .try_init()
            .ok(),
    };
}
