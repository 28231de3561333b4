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

//! One player row.
//!
//! A [`PlayerWidget`] drives a single [`AudioElement`] through the state
//! machine in [`crate::machine`]. It reacts to coordinator notifications on
//! whatever thread raised them, so all of its state sits behind short-lived
//! locks that are never held across an `.await` or while effects run.

use std::{
    future::Future,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use strum_macros::Display;
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::{AudioResource, ResourceCache},
    context::PlaybackContext,
    coordinator::{PlaybackCoordinator, Subscription},
    element::AudioElement,
    epoch::RequestEpoch,
    err::LoadError,
    loader::ResourceLoader,
    machine::{Effect, PlayerEvent, PlayerState, PlayerStatus, transition},
    snapshot::PlayerSnapshot,
    types::{FileId, SourceDescriptor},
};

/// How a `play()` call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum PlayOutcome {
    /// The engine confirmed playback.
    Started,
    /// The widget was already loading or playing, or has been torn down.
    Ignored,
    /// A newer request, a preemption or teardown overtook this one.
    Superseded,
    /// Fetching or starting failed; the widget is in `Error`.
    Failed,
}

/// A player bound to one [`SourceDescriptor`].
///
/// Dropping the widget tears it down.
pub struct PlayerWidget {
    inner: Arc<WidgetInner>,
}

struct WidgetInner {
    descriptor:   SourceDescriptor,
    coordinator:  PlaybackCoordinator,
    loader:       ResourceLoader,
    cache:        ResourceCache,
    epoch:        RequestEpoch,
    element:      Arc<dyn AudioElement>,
    state:        Mutex<PlayerState>,
    subscription: Mutex<Option<Subscription>>,
}

impl PlayerWidget {
    pub fn new(
        context: &PlaybackContext,
        descriptor: SourceDescriptor,
        element: Arc<dyn AudioElement>,
    ) -> Self {
        let state = PlayerState::new(
            descriptor.file_id.clone(),
            descriptor.known_duration(),
            context.config().pause_policy,
        );
        let inner = Arc::new_cyclic(|weak: &Weak<WidgetInner>| {
            let listener = weak.clone();
            let subscription = context.coordinator().subscribe(move |holder| {
                if let Some(inner) = listener.upgrade() {
                    inner.dispatch(PlayerEvent::HolderChanged(holder.cloned()));
                }
            });
            WidgetInner {
                cache: ResourceCache::new(descriptor.file_id.clone()),
                descriptor,
                coordinator: context.coordinator().clone(),
                loader: context.loader().clone(),
                epoch: RequestEpoch::new(),
                element,
                state: Mutex::new(state),
                subscription: Mutex::new(Some(subscription)),
            }
        });
        Self { inner }
    }

    #[must_use]
    pub fn file_id(&self) -> &FileId { &self.inner.descriptor.file_id }

    #[must_use]
    pub fn descriptor(&self) -> &SourceDescriptor { &self.inner.descriptor }

    /// Requests the slot, loads the handle and starts the element.
    ///
    /// The returned future owns what it needs, so hosts may spawn it and
    /// keep handling other events on the widget meanwhile.
    pub fn play(&self) -> impl Future<Output = PlayOutcome> + Send + use<> {
        let inner = self.inner.clone();
        async move { inner.play().await }
    }

    /// Pause according to the configured [`crate::PausePolicy`]. Cancels a
    /// pending load.
    pub fn pause(&self) { self.inner.dispatch(PlayerEvent::Pause); }

    pub fn stop(&self) { self.inner.dispatch(PlayerEvent::Stop); }

    /// Seeks to `seconds`, clamped to the known duration. Ignored while the
    /// duration is unknown.
    pub fn seek(&self, seconds: f64) { self.inner.dispatch(PlayerEvent::Seek(seconds)); }

    /// Seeks to a fraction of the duration, as a progress bar click would.
    pub fn seek_fraction(&self, fraction: f64) {
        let duration = self.inner.state.lock().duration;
        if let Some(duration) = duration {
            self.seek(fraction.clamp(0.0, 1.0) * duration);
        }
    }

    pub fn on_time_update(&self, seconds: f64) {
        self.inner.dispatch(PlayerEvent::TimeUpdate(seconds));
    }

    pub fn on_metadata(&self, duration: f64) { self.inner.dispatch(PlayerEvent::Metadata(duration)); }

    pub fn on_ended(&self) { self.inner.dispatch(PlayerEvent::Ended); }

    pub fn on_playback_error(&self, reason: impl Into<String>) {
        self.inner.dispatch(PlayerEvent::PlaybackError(reason.into()));
    }

    /// Samples the element while playing: reports its position or its end.
    pub fn tick(&self) -> PlayerSnapshot {
        if self.inner.state.lock().status == PlayerStatus::Playing {
            let event = if self.inner.element.is_ended() {
                PlayerEvent::Ended
            } else {
                PlayerEvent::TimeUpdate(self.inner.element.position())
            };
            self.inner.dispatch(event);
        }
        self.snapshot()
    }

    #[must_use]
    pub fn snapshot(&self) -> PlayerSnapshot { PlayerSnapshot::from(&*self.inner.state.lock()) }

    /// The widget's cached resource, for inspection.
    #[must_use]
    pub fn resource(&self) -> AudioResource { self.inner.cache.snapshot() }

    /// Cancels in-flight work, revokes the cached handle, gives up the slot
    /// and stops listening to the coordinator. Idempotent.
    pub fn teardown(&self) {
        self.inner.dispatch(PlayerEvent::Teardown);
        let subscription = self.inner.subscription.lock().take();
        drop(subscription);
    }
}

impl Drop for PlayerWidget {
    fn drop(&mut self) { self.teardown(); }
}

impl std::fmt::Debug for PlayerWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerWidget")
            .field("descriptor", &self.inner.descriptor)
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

impl WidgetInner {
    fn file_id(&self) -> &FileId { &self.descriptor.file_id }

    #[instrument(skip(self), fields(file_id = %self.descriptor.file_id))]
    async fn play(&self) -> PlayOutcome {
        let playable = {
            let state = self.state.lock();
            !state.detached && state.status.can_play()
        };
        if !playable {
            return PlayOutcome::Ignored;
        }

        // Every other subscriber has reacted by the time this returns.
        self.coordinator.request_slot(self.file_id());
        let (from, to) = self.step(PlayerEvent::SlotGranted);
        if from == to || to != PlayerStatus::Loading {
            // Torn down or started elsewhere since the check above. A slot
            // nobody on this widget uses goes back at once.
            if !to.is_active() {
                self.coordinator.release(self.file_id());
            }
            return PlayOutcome::Ignored;
        }
        let ticket = self.epoch.ticket(self.file_id(), &self.coordinator);
        if !ticket.is_current() {
            return self.superseded();
        }

        let handle = match self.loader.load(&self.cache, &self.descriptor, &ticket).await {
            Ok(handle) => handle,
            Err(LoadError::StaleResultDiscarded { .. }) => return self.superseded(),
            Err(LoadError::Fetch { source }) => {
                warn!(error = %source, "could not load recording");
                self.dispatch(PlayerEvent::LoadFailed(source.to_string()));
                return PlayOutcome::Failed;
            }
        };
        if !ticket.is_current() {
            return self.superseded();
        }

        let from = self.state.lock().current_time;
        let started = self.element.start(&handle, from).await;

        if !ticket.is_current() {
            self.discard_late_start(started.is_ok());
            return self.superseded();
        }
        match started {
            Ok(()) => {
                self.dispatch(PlayerEvent::Started);
                info!(handle = %handle.id(), from, "playback started");
                PlayOutcome::Started
            }
            Err(e) => {
                warn!(error = %e, "playback engine rejected recording");
                self.dispatch(PlayerEvent::StartRejected(e.to_string()));
                PlayOutcome::Failed
            }
        }
    }

    /// The engine confirmed a start that is no longer wanted. Silence it
    /// unless a newer request on this widget owns the element by now.
    fn discard_late_start(&self, started: bool) {
        let status = self.state.lock().status;
        if started && !matches!(status, PlayerStatus::Loading | PlayerStatus::Playing) {
            debug!(%status, "stopping element after superseded start");
            self.element.stop();
        }
    }

    /// Bookkeeping for a request that lost its epoch. A widget that is
    /// still `Loading` without the slot is brought back in line.
    fn superseded(&self) -> PlayOutcome {
        debug!(epoch = self.epoch.current(), "request superseded");
        self.dispatch(PlayerEvent::HolderChanged(self.coordinator.current_holder()));
        PlayOutcome::Superseded
    }

    /// Runs `event` through the machine and carries out the effects. Returns
    /// the status after the transition.
    fn dispatch(&self, event: PlayerEvent) -> PlayerStatus { self.step(event).1 }

    /// Like [`Self::dispatch`], returning the status before and after.
    fn step(&self, event: PlayerEvent) -> (PlayerStatus, PlayerStatus) {
        let (from, to, effects) = {
            let mut state = self.state.lock();
            let step = transition(&state, &event);
            let from = state.status;
            *state = step.next;
            (from, state.status, step.effects)
        };
        if from != to {
            debug!(file_id = %self.file_id(), %from, %to, ?event, "player transition");
        }
        for effect in effects {
            self.apply(effect);
        }
        (from, to)
    }

    fn apply(&self, effect: Effect) {
        match effect {
            Effect::InvalidateRequests => {
                self.epoch.advance();
            }
            Effect::StopElement => self.element.stop(),
            Effect::PauseElement => self.element.pause(),
            Effect::SeekElement(seconds) => self.element.seek(seconds),
            Effect::EvictResource => self.loader.evict(&self.cache),
            Effect::ReleaseSlot => self.coordinator.release(self.file_id()),
        }
    }
}
