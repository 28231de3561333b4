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

use std::time::Duration;

use serde::Serialize;

use crate::{
    machine::{PlayerState, PlayerStatus},
    types::FileId,
};

/// What a row renders. The UI layer only presents this.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub file_id:      FileId,
    pub status:       PlayerStatus,
    pub current_time: f64,
    pub duration:     Option<f64>,
    pub last_error:   Option<String>,
}

impl From<&PlayerState> for PlayerSnapshot {
    fn from(state: &PlayerState) -> Self {
        Self {
            file_id:      state.file_id.clone(),
            status:       state.status,
            current_time: state.current_time,
            duration:     state.duration,
            last_error:   state.last_error.clone(),
        }
    }
}

impl PlayerSnapshot {
    /// Returns the current progress as a fraction (0.0 to 1.0).
    #[must_use]
    pub fn progress_fraction(&self) -> f64 {
        match self.duration {
            Some(duration) if duration > 0.0 => (self.current_time / duration).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Formats the current time as "M:SS" or "H:MM:SS".
    #[must_use]
    pub fn formatted_current_time(&self) -> String { format_duration(self.current_time) }

    /// Formats the duration, or "--:--" while it is unknown.
    #[must_use]
    pub fn formatted_duration(&self) -> String {
        self.duration.map_or_else(|| "--:--".to_owned(), format_duration)
    }

    #[must_use]
    pub const fn is_active(&self) -> bool { self.status.is_active() }
}

/// Formats seconds as "M:SS" or "H:MM:SS".
fn format_duration(seconds: f64) -> String {
    let total_secs = Duration::try_from_secs_f64(seconds).unwrap_or_default().as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
