// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    env,
    io::IsTerminal,
    sync::{Arc, Mutex, Once},
};

use bon::Builder;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use tracing::Subscriber;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, layer::SubscriberExt, prelude::*, registry::LookupSpan,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// Lets configuration files write `log_format = ""` to mean "use the
/// default".
///
/// # Errors
/// Returns an error if the non-empty string is not a valid `T`.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// Handle for changing the log filter at runtime.
///
/// Only populated after `init_global_logging` has run.
pub static RELOAD_HANDLE: OnceCell<tracing_subscriber::reload::Handle<filter::Targets, Registry>> =
    OnceCell::new();

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for log files.
    ///
    /// When non-empty, logs are also written to hourly rotated files in this
    /// directory, plus a separate error-only file. Empty means stdout only.
    #[default = ""]
    #[builder(default, into)]
    pub dir: String,

    /// Log level filter string such as `"info"` or
    /// `"debug,hyper=warn,reqwest=info"`. Falls back to `RUST_LOG`, then
    /// `"info"`.
    #[builder(into)]
    pub level: Option<String>,

    /// Output format for log messages.
    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Maximum number of rotated log files to retain (default: 720, 30 days
    /// of hourly files).
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Whether to write logs to stdout in addition to files.
    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event, for log aggregation.
    ///
    /// ```json
    /// {"timestamp":"2024-01-01T12:00:00Z","level":"WARN","fields":{"message":"segment 3 attempt 1 failed","index":3,"attempt":1}}
    /// ```
    Json,

    /// Human-readable text.
    ///
    /// ```text
    /// 2024-01-01T12:00:00.123Z  INFO splitget::retry: segment 3 is ok index=3 attempt=2
    /// ```
    #[default]
    Text,
}

/// Initialize logging to stdout with default options.
///
/// Keep the returned guards alive for as long as logs should be flushed.
#[must_use]
pub fn init_tracing_subscriber(app_name: &str) -> Vec<WorkerGuard> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Initialize logging for tests.
///
/// Safe to call from every test; only the first call does anything. Logs go
/// to `UNITTEST_LOG_DIR` (default `/tmp/__unittest_logs`) at
/// `UNITTEST_LOG_LEVEL` (default debug with noisy HTTP crates turned down).
///
/// # Panics
///
/// Panics if the guard mutex was poisoned by an earlier panic.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let mut g = GLOBAL_UT_LOG_GUARD.as_ref().lock().unwrap();

        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());

        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| {
            "debug,hyper=warn,hyper_util=warn,tower=warn,reqwest=warn,h2=info,axum=info"
                .to_string()
        });
        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            ..Default::default()
        };
        *g = Some(init_global_logging("unittest", &opts));

        tracing::info!("logs dir = {}", dir);
    });
}

/// Worker guards of the test logger, kept alive for the whole test binary.
static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<Vec<WorkerGuard>>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Filter used when neither `level` nor `RUST_LOG` is set.
const DEFAULT_LOG_TARGETS: &str = "info";

/// Initialize the global subscriber.
///
/// Layers, depending on `opts`:
///
/// - **Stdout**: when `append_stdout` is true
/// - **File**: hourly rotated `<app_name>.*` files when `dir` is set
/// - **Error file**: `<app_name>-err.*` with only ERROR events when `dir` is
///   set
///
/// All writers are non-blocking; the returned guards flush them on drop.
/// Only the first call per process takes effect.
///
/// # Panics
///
/// Panics when the log directory cannot be used or the level string does not
/// parse, so misconfigured logging is noticed at startup.
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    static START: Once = Once::new();
    let mut guards = vec![];

    START.call_once(|| {
        LogTracer::init().expect("log tracer must be valid");

        let stdout_logging_layer = opts.append_stdout.then(|| {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);
            fmt_layer(
                writer,
                opts.log_format,
                std::io::stdout().is_terminal(),
                filter::LevelFilter::TRACE,
            )
        });

        let file_logging_layer = (!opts.dir.is_empty()).then(|| {
            let (writer, guard) = rolling_writer(app_name, opts);
            guards.push(guard);
            fmt_layer(writer, opts.log_format, false, filter::LevelFilter::TRACE)
        });

        let err_file_logging_layer = (!opts.dir.is_empty()).then(|| {
            let (writer, guard) = rolling_writer(&format!("{app_name}-err"), opts);
            guards.push(guard);
            fmt_layer(writer, opts.log_format, false, filter::LevelFilter::ERROR)
        });

        let filter = opts
            .level
            .as_deref()
            .or(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
            .unwrap_or(DEFAULT_LOG_TARGETS)
            .parse::<filter::Targets>()
            .expect("error parsing log level string");

        let (dyn_filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

        RELOAD_HANDLE
            .set(reload_handle)
            .expect("reload handle already set, maybe init_global_logging get called twice?");

        let subscriber = Registry::default()
            .with(dyn_filter)
            .with(stdout_logging_layer)
            .with(file_logging_layer)
            .with(err_file_logging_layer);

        tracing::subscriber::set_global_default(subscriber)
            .expect("error setting global tracing subscriber");
    });

    guards
}

fn rolling_writer(prefix: &str, opts: &LoggingOptions) -> (NonBlocking, WorkerGuard) {
    let rolling_appender = RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
        .unwrap_or_else(|e| {
            panic!(
                "initializing rolling file appender at {} failed: {}",
                &opts.dir, e
            )
        });
    tracing_appender::non_blocking(rolling_appender)
}

fn fmt_layer<S>(
    writer: NonBlocking,
    format: LogFormat,
    ansi: bool,
    level: filter::LevelFilter,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(level)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::Layer::new()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_filter(level)
            .boxed(),
    }
}
