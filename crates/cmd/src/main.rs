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

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand};
use snafu::{ResultExt, Whatever};
use switchboard_playback::{
    AudioFetcher, AudioSource, ClockElement, HttpFetcher, PlayOutcome, PlaybackConfig,
    PlaybackContext, PlayerWidget, SourceDescriptor,
};
use switchboard_telemetry::LoggingOptions;
use tokio::time::Instant;
use tracing::{info, warn};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
    name = "switchboard",
    about = "Fetch and audition recorded call audio",
    author = build_info::AUTHOR,
    version = build_info::FULL_VERSION
)]
struct Cli {
    /// Directory for rotated log files. Logs go to stdout only when omitted.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `info,switchboard_playback=debug`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Fetch(FetchArgs),
    Audition(AuditionArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Fetch one recording through the authenticated fetcher and write its bytes.
Examples:

switchboard fetch --config switchboard.toml --out call.mp3 /api/recordings/17/audio

")]
struct FetchArgs {
    /// TOML settings file. `SWITCHBOARD__*` variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identifier used in logs. Defaults to the locator.
    #[arg(long)]
    file_id: Option<String>,

    /// Where to write the fetched bytes.
    #[arg(long)]
    out: PathBuf,

    /// Direct media URL or API path.
    locator: String,
}

impl FetchArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let config = PlaybackConfig::load(self.config.as_deref())
            .whatever_context("failed to load playback configuration")?;
        let fetcher = HttpFetcher::new(&config).whatever_context("failed to build HTTP client")?;
        let file_id = self.file_id.clone().unwrap_or_else(|| self.locator.clone());
        let descriptor = SourceDescriptor::new(file_id, self.locator.clone(), 0.0);

        match fetcher
            .fetch(&descriptor)
            .await
            .with_whatever_context(|_| format!("failed to fetch {}", self.locator))?
        {
            AudioSource::Buffered {
                bytes,
                content_type,
            } => {
                tokio::fs::write(&self.out, &bytes)
                    .await
                    .with_whatever_context(|_| format!("failed to write {}", self.out.display()))?;
                println!(
                    "{} bytes ({}) written to {}",
                    bytes.len(),
                    content_type.as_deref().unwrap_or("unknown type"),
                    self.out.display()
                );
            }
            AudioSource::Remote { url } => {
                println!("{url} is a direct media URL; nothing to download");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Play recordings one after another on a silent clock. Each row preempts the
previous one, exactly as clicking through rows in the admin UI would.
Examples:

switchboard audition --seconds 2 /api/recordings/17/audio https://cdn.example.com/18.mp3

")]
struct AuditionArgs {
    /// TOML settings file. `SWITCHBOARD__*` variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long each row plays before the next one takes over.
    #[arg(long, default_value_t = 3)]
    seconds: u64,

    /// Declared duration of every recording, in seconds.
    #[arg(long, default_value_t = 30.0)]
    duration: f64,

    /// Direct media URLs or API paths, one row each.
    #[arg(required = true)]
    locators: Vec<String>,
}

impl AuditionArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let config = PlaybackConfig::load(self.config.as_deref())
            .whatever_context("failed to load playback configuration")?;
        let context =
            PlaybackContext::from_config(config).whatever_context("failed to build playback context")?;

        let widgets: Vec<PlayerWidget> = self
            .locators
            .iter()
            .enumerate()
            .map(|(row, locator)| {
                let descriptor =
                    SourceDescriptor::new(format!("row-{row}"), locator.clone(), self.duration);
                context.widget(descriptor, Arc::new(ClockElement::new(Some(self.duration))))
            })
            .collect();

        tokio::select! {
            () = self.audition(&widgets) => {}
            _ = tokio::signal::ctrl_c() => warn!("interrupted, tearing down"),
        }

        drop(widgets);
        let live = context.registry().live_count();
        info!(
            minted = context.registry().minted(),
            revoked = context.registry().revoked(),
            live,
            "audition finished"
        );
        println!("live handles after teardown: {live}");
        Ok(())
    }

    async fn audition(&self, widgets: &[PlayerWidget]) {
        let per_row = Duration::from_secs(self.seconds);
        for widget in widgets {
            let outcome = widget.play().await;
            info!(file_id = %widget.file_id(), %outcome, "play requested");
            if outcome != PlayOutcome::Started {
                if let Some(error) = widget.snapshot().last_error {
                    warn!(file_id = %widget.file_id(), %error, "row failed");
                }
                continue;
            }

            let deadline = Instant::now() + per_row;
            let mut ticker = tokio::time::interval(Duration::from_millis(250));
            while Instant::now() < deadline {
                ticker.tick().await;
                let snapshot = widget.tick();
                info!(
                    file_id = %snapshot.file_id,
                    status = %snapshot.status,
                    position = %snapshot.formatted_current_time(),
                    duration = %snapshot.formatted_duration(),
                    "tick"
                );
                if !snapshot.is_active() {
                    break;
                }
            }
        }
        if let Some(last) = widgets.last() {
            last.stop();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();

    let logging = LoggingOptions::builder()
        .dir(
            cli.log_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
        )
        .maybe_level(cli.log_level.clone())
        .build();
    let _guards = switchboard_telemetry::init_global_logging("switchboard", &logging);
    switchboard_telemetry::set_panic_hook();

    match cli.commands {
        Commands::Fetch(args) => args.run().await,
        Commands::Audition(args) => args.run().await,
    }
}
