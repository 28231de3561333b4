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

//! The player state machine.
//!
//! [`transition`] is pure: it maps a state and an event to the next state and
//! the side effects the widget must carry out, in order. Events that make no
//! sense in the current state are ignored rather than rejected.

use serde::Serialize;
use strum_macros::Display;

use crate::{config::PausePolicy, types::FileId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
    Error,
}

impl PlayerStatus {
    /// Whether a widget in this status owns (or is acquiring) the slot.
    #[must_use]
    pub const fn is_active(self) -> bool { matches!(self, Self::Loading | Self::Playing | Self::Paused) }

    /// Whether `play()` is accepted in this status.
    #[must_use]
    pub const fn can_play(self) -> bool { matches!(self, Self::Stopped | Self::Paused | Self::Error) }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerState {
    pub file_id:      FileId,
    pub status:       PlayerStatus,
    pub current_time: f64,
    /// `None` until the descriptor or the engine provides a usable duration.
    pub duration:     Option<f64>,
    pub policy:       PausePolicy,
    pub last_error:   Option<String>,
    /// Set by teardown; every later event is ignored.
    pub detached:     bool,
}

impl PlayerState {
    #[must_use]
    pub fn new(file_id: FileId, duration: Option<f64>, policy: PausePolicy) -> Self {
        Self {
            file_id,
            status: PlayerStatus::Stopped,
            current_time: 0.0,
            duration,
            policy,
            last_error: None,
            detached: false,
        }
    }

    fn clamp(&self, seconds: f64) -> f64 {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.duration.map_or(seconds, |duration| seconds.min(duration))
    }

    fn enter_stopped(&mut self) {
        self.status = PlayerStatus::Stopped;
        self.current_time = 0.0;
    }

    fn enter_error(&mut self, reason: &str) {
        self.status = PlayerStatus::Error;
        self.last_error = Some(reason.to_owned());
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    /// The coordinator granted the slot to this widget's `play()`.
    SlotGranted,
    /// The engine confirmed playback.
    Started,
    /// Fetching a handle failed.
    LoadFailed(String),
    /// The engine refused a ready handle.
    StartRejected(String),
    Pause,
    Stop,
    /// The coordinator reported a new holder.
    HolderChanged(Option<FileId>),
    Ended,
    TimeUpdate(f64),
    Metadata(f64),
    Seek(f64),
    /// The engine failed after playback had begun.
    PlaybackError(String),
    Teardown,
}

/// Work the widget performs after committing a transition.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Advance the request epoch so in-flight results are discarded.
    InvalidateRequests,
    StopElement,
    PauseElement,
    SeekElement(f64),
    /// Revoke the cached handle and empty the cache.
    EvictResource,
    /// Give the slot back if this widget still holds it.
    ReleaseSlot,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub next:    PlayerState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn ignore(state: &PlayerState) -> Self {
        Self {
            next:    state.clone(),
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn changed_status(&self, from: &PlayerState) -> bool { self.next.status != from.status }
}

/// Computes the next state for `event`.
#[must_use]
pub fn transition(state: &PlayerState, event: &PlayerEvent) -> Transition {
    use PlayerStatus::{Error, Loading, Paused, Playing};

    if state.detached {
        return Transition::ignore(state);
    }

    let mut next = state.clone();
    let effects = match (state.status, event) {
        (status, PlayerEvent::SlotGranted) if status.can_play() => {
            next.status = Loading;
            next.last_error = None;
            if status == Error {
                next.current_time = 0.0;
            }
            vec![Effect::InvalidateRequests]
        }
        (Loading, PlayerEvent::Started) => {
            next.status = Playing;
            vec![]
        }
        (Loading, PlayerEvent::LoadFailed(reason)) => {
            next.enter_error(reason);
            vec![Effect::ReleaseSlot]
        }
        (Loading, PlayerEvent::StartRejected(reason)) => {
            next.enter_error(reason);
            vec![Effect::EvictResource, Effect::ReleaseSlot]
        }

        // Pausing a pending load cancels it under either policy. The stop
        // aborts an engine start that may still be pending.
        (Loading, PlayerEvent::Pause | PlayerEvent::Stop) => {
            next.enter_stopped();
            vec![Effect::InvalidateRequests, Effect::StopElement, Effect::ReleaseSlot]
        }
        (Playing, PlayerEvent::Pause) if state.policy == PausePolicy::HoldSlot => {
            next.status = Paused;
            vec![Effect::PauseElement]
        }
        (Playing | Paused, PlayerEvent::Pause | PlayerEvent::Stop) => {
            next.enter_stopped();
            vec![Effect::StopElement, Effect::ReleaseSlot]
        }
        (Error, PlayerEvent::Stop) => {
            next.enter_stopped();
            next.last_error = None;
            vec![]
        }

        (status, PlayerEvent::HolderChanged(holder))
            if status.is_active() && holder.as_ref() != Some(&state.file_id) =>
        {
            next.enter_stopped();
            vec![Effect::InvalidateRequests, Effect::StopElement]
        }

        (Playing, PlayerEvent::Ended) => {
            next.enter_stopped();
            vec![Effect::StopElement, Effect::ReleaseSlot]
        }
        (Playing, PlayerEvent::TimeUpdate(seconds)) => {
            next.current_time = state.clamp(*seconds);
            vec![]
        }
        (_, PlayerEvent::Metadata(duration)) if duration.is_finite() && *duration > 0.0 => {
            next.duration = Some(*duration);
            next.current_time = next.current_time.min(*duration);
            vec![]
        }
        (status, PlayerEvent::Seek(seconds)) if state.duration.is_some() => {
            let target = state.clamp(*seconds);
            next.current_time = target;
            if matches!(status, Playing | Paused) {
                vec![Effect::SeekElement(target)]
            } else {
                vec![]
            }
        }
        (status, PlayerEvent::PlaybackError(reason)) if status.is_active() => {
            next.enter_error(reason);
            let mut effects = Vec::with_capacity(3);
            if status == Loading {
                effects.push(Effect::InvalidateRequests);
            }
            effects.extend([Effect::StopElement, Effect::ReleaseSlot]);
            effects
        }
        (_, PlayerEvent::Teardown) => {
            next.enter_stopped();
            next.detached = true;
            vec![
                Effect::InvalidateRequests,
                Effect::StopElement,
                Effect::EvictResource,
                Effect::ReleaseSlot,
            ]
        }
        _ => return Transition::ignore(state),
    };

    Transition { next, effects }
}
