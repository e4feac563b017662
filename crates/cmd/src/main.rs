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

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use jiff::SignedDuration;
use snafu::{ResultExt, Whatever};
use splitget::{Backoff, DownloadJob, Downloader, DownloaderConfig, RetryPolicy};
use splitget_common_telemetry::{
    logging::{LogFormat, LoggingOptions, init_global_logging},
    panic_hook::set_panic_hook,
};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "splitget",
about = "Download a file over HTTP in parallel byte-range segments",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION,
long_version = build_info::LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Get(GetArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Download a resource by splitting it into byte ranges that are fetched
concurrently and written to one file in order. The server must advertise
`Accept-Ranges: bytes` and a Content-Length.
Examples:

splitget get https://example.com/big.iso --dest ~/Downloads --parts 32

")]
struct GetArgs {
    /// URL of the resource to download
    url: String,

    /// Existing directory to write the file into
    #[arg(short, long, default_value = ".")]
    dest: PathBuf,

    /// Number of segments to split the resource into
    #[arg(short, long, default_value_t = 16)]
    parts: usize,

    /// Attempts per segment before the download is given up
    #[arg(short, long, default_value_t = 5)]
    retries: usize,

    /// Delay between attempts of a segment in milliseconds (default: none)
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Deadline for each ranged request in seconds (default: none)
    #[arg(long)]
    timeout_secs: Option<i64>,

    /// Maximum number of segments fetched at the same time
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Log filter, e.g. "info" or "debug,reqwest=warn"
    #[arg(long)]
    log_level: Option<String>,

    /// Also write rotated log files into this directory
    #[arg(long)]
    log_dir: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl GetArgs {
    fn logging_options(&self) -> LoggingOptions {
        LoggingOptions {
            dir: self.log_dir.clone().unwrap_or_default(),
            level: self.log_level.clone(),
            log_format: if self.json_logs {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            ..LoggingOptions::default()
        }
    }

    fn downloader_config(&self) -> DownloaderConfig {
        let backoff = self
            .retry_delay_ms
            .map_or(Backoff::Immediate, |ms| Backoff::Constant(Duration::from_millis(ms)));

        DownloaderConfig {
            parts: self.parts,
            retry: RetryPolicy::new(self.retries, backoff),
            request_timeout: self.timeout_secs.map(SignedDuration::from_secs),
            max_concurrency: self.max_concurrency,
            ..DownloaderConfig::default()
        }
    }

    #[allow(clippy::print_stdout)]
    async fn run(&self) -> Result<(), Whatever> {
        let _guards = init_global_logging("splitget", &self.logging_options());
        set_panic_hook();

        let config = self.downloader_config();
        let job = DownloadJob::from_config(self.url.clone(), self.dest.clone(), &config);
        let downloader = Downloader::new(config).whatever_context("Failed to set up downloader")?;

        let result = downloader
            .download(&job)
            .await
            .with_whatever_context(|e| format!("Failed to download {}: {e}", job.url))?;

        println!(
            "{} ({} bytes in {} parts, {:#})",
            result.path.display(),
            result.size,
            result.parts,
            result.duration
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    match cli.commands {
        Commands::Get(args) => args.run().await,
    }
}
