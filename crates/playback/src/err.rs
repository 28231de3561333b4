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

use snafu::Snafu;

use crate::types::FileId;

/// Failure to obtain or start playable audio for one recording.
///
/// Always local to the widget that hit it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    #[snafu(display("Invalid locator {locator}: {reason}"))]
    InvalidLocator {
        locator: String,
        reason:  String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("Locator {locator} is an API path but no api_base_url is configured"))]
    MissingApiBase {
        locator: String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("Network error fetching {url}"))]
    Request {
        url:    String,
        source: reqwest::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Not authorized to fetch {url} (HTTP {status})"))]
    Unauthorized {
        url:    String,
        status: u16,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("HTTP error {status} for URL: {url}"))]
    Status {
        url:    String,
        status: u16,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Response for {url} exceeded {limit} bytes"))]
    TooLarge {
        url:   String,
        limit: u64,
        #[snafu(implicit)]
        loc:   snafu::Location,
    },

    #[snafu(display("Response for {url} had an empty body"))]
    EmptyBody {
        url: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Playback engine rejected {file_id}: {reason}"))]
    PlaybackRejected {
        file_id: FileId,
        reason:  String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },
}

/// Outcome of a load that did not produce a handle for the caller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoadError {
    #[snafu(transparent)]
    Fetch { source: FetchError },

    /// The request epoch moved on while the fetch was in flight. Bookkeeping
    /// only; never shown to the user.
    #[snafu(display("Discarded stale result for {file_id}"))]
    StaleResultDiscarded { file_id: FileId },
}

impl LoadError {
    #[must_use]
    pub const fn is_stale(&self) -> bool { matches!(self, Self::StaleResultDiscarded { .. }) }
}

/// Failure to assemble a [`crate::config::PlaybackConfig`] or the clients
/// built from it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("Failed to load playback configuration"))]
    Load {
        source: ::config::ConfigError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Config file {} does not exist", path.display()))]
    MissingFile {
        path: std::path::PathBuf,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    #[snafu(display("Invalid playback configuration: {source}"))]
    Validate {
        source: validator::ValidationErrors,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to build HTTP client"))]
    HttpClient {
        source: reqwest::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}
