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

//! Row-level data handed to the playback core by the data layer.

use derive_more::{Debug, Display};
use serde::{Deserialize, Serialize};

/// Opaque identifier for one recorded call's audio.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Display, Serialize, Deserialize)]
#[debug("FileId({_0})")]
#[display("{_0}")]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self { Self::new(value) }
}

impl From<String> for FileId {
    fn from(value: String) -> Self { Self(value) }
}

/// Where the audio bytes for a recording live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator<'a> {
    /// A directly playable media URL.
    Direct(&'a str),
    /// An API path that must be fetched with the bearer token.
    Api(&'a str),
}

/// Immutable per-row description of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub file_id:           FileId,
    pub locator:           String,
    /// Duration reported by the data layer. Zero, negative or non-finite
    /// values mean "unknown until metadata arrives".
    #[serde(rename = "duration_seconds", default)]
    pub declared_duration: f64,
}

impl SourceDescriptor {
    pub fn new(file_id: impl Into<FileId>, locator: impl Into<String>, duration: f64) -> Self {
        Self {
            file_id:           file_id.into(),
            locator:           locator.into(),
            declared_duration: duration,
        }
    }

    /// Classifies the locator. Anything with an `http(s)://` scheme is played
    /// as is; everything else is an API path.
    #[must_use]
    pub fn locator(&self) -> Locator<'_> {
        let lower = self.locator.trim_start().to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Locator::Direct(self.locator.trim())
        } else {
            Locator::Api(self.locator.trim())
        }
    }

    /// The declared duration when it is usable for seeking.
    #[must_use]
    pub fn known_duration(&self) -> Option<f64> {
        (self.declared_duration.is_finite() && self.declared_duration > 0.0)
            .then_some(self.declared_duration)
    }
}
