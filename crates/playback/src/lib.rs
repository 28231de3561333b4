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

//! Playback coordination for auditioning recorded calls.
//!
//! Any number of [`PlayerWidget`]s share one exclusive playback slot owned by
//! a [`PlaybackCoordinator`]. Each widget fetches its recording lazily
//! through a [`ResourceLoader`], memoizes the resulting [`PlayableHandle`]
//! for its own lifetime and discards any asynchronous result that a newer
//! request, a preemption or teardown has overtaken.
//!
//! ```text
//! play() ─► request_slot ─► (previous holder stops) ─► load ─► start ─► Playing
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod element;
pub mod epoch;
pub mod err;
pub mod fetcher;
pub mod handle;
pub mod loader;
pub mod machine;
pub mod metrics;
pub mod snapshot;
pub mod types;
pub mod widget;

pub use crate::{
    cache::{AudioResource, ResourceCache, ResourceState},
    config::{PausePolicy, PlaybackConfig},
    context::PlaybackContext,
    coordinator::{PlaybackCoordinator, Subscription},
    element::{AudioElement, ClockElement},
    epoch::{EpochTicket, RequestEpoch},
    err::{ConfigError, FetchError, LoadError},
    fetcher::{AudioFetcher, HttpFetcher},
    handle::{AudioSource, HandleId, HandleRegistry, PlayableHandle},
    loader::ResourceLoader,
    machine::{Effect, PlayerEvent, PlayerState, PlayerStatus, Transition, transition},
    snapshot::PlayerSnapshot,
    types::{FileId, Locator, SourceDescriptor},
    widget::{PlayOutcome, PlayerWidget},
};
