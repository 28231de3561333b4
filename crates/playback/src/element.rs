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

//! The playback engine seam.

use async_trait::async_trait;
use parking_lot::Mutex;
use snafu::ensure;
use tokio::time::Instant;

use crate::{
    err::{FetchError, PlaybackRejectedSnafu},
    handle::PlayableHandle,
};

/// One widget's audio output.
///
/// `start` is the only suspension point; everything else is synchronous and
/// must be cheap, since the widget calls it while reacting to other widgets.
#[async_trait]
pub trait AudioElement: Send + Sync {
    /// Begins audible playback of `handle` at `from` seconds. Resolves once
    /// the engine has confirmed (or refused) playback.
    async fn start(&self, handle: &PlayableHandle, from: f64) -> Result<(), FetchError>;

    fn pause(&self);

    fn stop(&self);

    fn seek(&self, seconds: f64);

    /// Current playback position in seconds.
    fn position(&self) -> f64;

    fn is_ended(&self) -> bool;
}

/// Silent element whose position follows the wall clock.
///
/// Useful for headless hosts. Refuses revoked handles the way a real engine
/// refuses a dead object URL.
#[derive(Debug, Default)]
pub struct ClockElement {
    state: Mutex<ClockState>,
}

#[derive(Debug, Default)]
struct ClockState {
    duration:   Option<f64>,
    started_at: Option<Instant>,
    offset:     f64,
}

impl ClockState {
    fn position(&self) -> f64 {
        let elapsed = self
            .started_at
            .map_or(0.0, |at| at.elapsed().as_secs_f64());
        let position = self.offset + elapsed;
        self.duration.map_or(position, |d| position.min(d))
    }
}

impl ClockElement {
    /// `duration` caps the reported position; `None` lets it run forever.
    #[must_use]
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            state: Mutex::new(ClockState {
                duration,
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl AudioElement for ClockElement {
    async fn start(&self, handle: &PlayableHandle, from: f64) -> Result<(), FetchError> {
        ensure!(
            !handle.is_revoked(),
            PlaybackRejectedSnafu {
                file_id: handle.file_id().clone(),
                reason:  "handle was revoked",
            }
        );
        let mut state = self.state.lock();
        state.offset = from.max(0.0);
        state.started_at = Some(Instant::now());
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        state.offset = state.position();
        state.started_at = None;
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.offset = 0.0;
        state.started_at = None;
    }

    fn seek(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.offset = seconds.max(0.0);
        if state.started_at.is_some() {
            state.started_at = Some(Instant::now());
        }
    }

    fn position(&self) -> f64 { self.state.lock().position() }

    fn is_ended(&self) -> bool {
        let state = self.state.lock();
        match state.duration {
            Some(duration) => state.started_at.is_some() && state.position() >= duration,
            None => false,
        }
    }
}
