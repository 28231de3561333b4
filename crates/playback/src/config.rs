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

use std::{path::Path, time::Duration};

use ::config::{Config, Environment, File, FileFormat};
use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{ResultExt, ensure};
use validator::Validate;

use crate::err::{ConfigError, LoadSnafu, MissingFileSnafu, ValidateSnafu};

/// Prefix for environment overrides, e.g. `SWITCHBOARD__BEARER_TOKEN`.
pub const ENV_PREFIX: &str = "SWITCHBOARD";

/// What `pause()` does with the playback slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum_macros::Display, strum_macros::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PausePolicy {
    /// Pause is a stop: time resets and another row may claim the slot.
    #[default]
    ReleaseSlot,
    /// Pause keeps the position and the slot until this row resumes, stops
    /// or is preempted.
    HoldSlot,
}

/// Settings for fetching and playing recordings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder, Validate)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Base URL that API path locators are joined to.
    #[validate(url)]
    #[builder(into)]
    pub api_base_url:         Option<String>,
    /// Sent as `Authorization: Bearer` on API fetches only.
    #[builder(into)]
    pub bearer_token:         Option<String>,
    /// Whole-request timeout for one fetch.
    #[default = 30]
    #[builder(default = 30)]
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,
    /// Upper bound on a fetched recording.
    #[default(64 * 1024 * 1024)]
    #[builder(default = 64 * 1024 * 1024)]
    #[validate(range(min = 1))]
    pub max_audio_bytes:      u64,
    /// Custom User-Agent header.
    #[builder(into)]
    pub user_agent:           Option<String>,
    #[builder(default)]
    pub pause_policy:         PausePolicy,
}

impl PlaybackConfig {
    /// Layers compiled defaults, an optional TOML file and `SWITCHBOARD__*`
    /// environment variables, then validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = toml_defaults();
        let mut builder =
            Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));

        if let Some(path) = path {
            ensure!(
                path.exists(),
                MissingFileSnafu {
                    path: path.to_path_buf(),
                }
            );
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context(LoadSnafu)?
            .try_deserialize()
            .context(LoadSnafu)?;
        config.validate().context(ValidateSnafu)?;
        Ok(config)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }
}

fn toml_defaults() -> String {
    let defaults = PlaybackConfig::default();
    format!(
        "request_timeout_secs = {}\nmax_audio_bytes = {}\npause_policy = \"{}\"\n",
        defaults.request_timeout_secs, defaults.max_audio_bytes, defaults.pause_policy
    )
}
