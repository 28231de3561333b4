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

//! The process-wide arbiter of "who may be audible now".
//!
//! A [`PlaybackCoordinator`] owns the single playback slot. Widgets ask for
//! the slot with [`PlaybackCoordinator::request_slot`] and give it back with
//! [`PlaybackCoordinator::release`]. Every holder change is pushed to all
//! subscribers synchronously, before `request_slot` returns, so a preempted
//! widget has already stopped by the time the new holder starts loading.
//!
//! The coordinator is an ordinary value. Create one per application (or per
//! test) and hand clones of it to every widget.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, info};

use crate::{metrics, types::FileId};

type Listener = Arc<dyn Fn(Option<&FileId>) + Send + Sync>;

/// Shared handle to the playback slot. Cloning is cheap and every clone
/// refers to the same slot.
#[derive(Clone, Default)]
pub struct PlaybackCoordinator {
    inner: Arc<CoordinatorInner>,
}

#[derive(Default)]
struct CoordinatorInner {
    holder:    Mutex<Option<FileId>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    // Serialises delivery across threads. Reentrant because listeners may
    // release or request the slot from inside a notification.
    delivery:  ReentrantMutex<()>,
    next_id:   AtomicU64,
}

impl PlaybackCoordinator {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Claims the slot for `file_id`, preempting any other holder.
    ///
    /// Subscribers are notified of the new holder before this returns. Always
    /// grants today; the return value leaves room for capacity limits.
    pub fn request_slot(&self, file_id: &FileId) -> bool {
        let previous = {
            let mut holder = self.inner.holder.lock();
            if holder.as_ref() == Some(file_id) {
                debug!(%file_id, "slot already held");
                return true;
            }
            holder.replace(file_id.clone())
        };

        metrics::SLOT_GRANTS.inc();
        match &previous {
            Some(previous) => {
                metrics::SLOT_PREEMPTIONS.inc();
                info!(%file_id, preempted = %previous, "slot preempted");
            }
            None => debug!(%file_id, "slot granted"),
        }

        self.notify();
        true
    }

    /// Clears the slot if, and only if, `file_id` still holds it.
    pub fn release(&self, file_id: &FileId) {
        {
            let mut holder = self.inner.holder.lock();
            if holder.as_ref() != Some(file_id) {
                return;
            }
            *holder = None;
        }
        debug!(%file_id, "slot released");
        self.notify();
    }

    /// Registers `listener` for holder changes. The listener stays registered
    /// until the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Option<&FileId>) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            coordinator: Arc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn current_holder(&self) -> Option<FileId> { self.inner.holder.lock().clone() }

    #[must_use]
    pub fn subscriber_count(&self) -> usize { self.inner.listeners.lock().len() }

    /// Tells every listener the holder as of its own delivery, so a listener
    /// never sees an older holder after a newer one.
    fn notify(&self) {
        let _delivery = self.inner.delivery.lock();
        // Snapshot first: listeners call back into the coordinator (release,
        // unsubscribe) and neither lock may be held while they run.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            let holder = self.current_holder();
            listener(holder.as_ref());
        }
    }
}

impl std::fmt::Debug for PlaybackCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackCoordinator")
            .field("holder", &self.current_holder())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Keeps a listener registered with a [`PlaybackCoordinator`]. Dropping it
/// unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id:          u64,
    coordinator: Weak<CoordinatorInner>,
}

impl Subscription {
    /// Unsubscribes now rather than at drop time.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.coordinator.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(coordinator: &PlaybackCoordinator) -> (Arc<Mutex<Vec<Option<FileId>>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = coordinator.subscribe(move |holder| sink.lock().push(holder.cloned()));
        (seen, subscription)
    }

    #[test]
    fn test_request_on_empty_slot_grants() {
        let coordinator = PlaybackCoordinator::new();
        let a = FileId::new("a");

        assert!(coordinator.request_slot(&a));
        assert_eq!(coordinator.current_holder(), Some(a));
    }

    #[test]
    fn test_request_preempts_and_notifies_new_holder() {
        let coordinator = PlaybackCoordinator::new();
        let (seen, _sub) = recorder(&coordinator);
        let a = FileId::new("a");
        let b = FileId::new("b");

        coordinator.request_slot(&a);
        coordinator.request_slot(&b);

        assert_eq!(coordinator.current_holder(), Some(b.clone()));
        assert_eq!(*seen.lock(), vec![Some(a), Some(b)]);
    }

    #[test]
    fn test_rerequest_by_holder_is_silent() {
        let coordinator = PlaybackCoordinator::new();
        let a = FileId::new("a");
        coordinator.request_slot(&a);
        let (seen, _sub) = recorder(&coordinator);

        assert!(coordinator.request_slot(&a));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_stale_release_keeps_newer_holder() {
        let coordinator = PlaybackCoordinator::new();
        let a = FileId::new("a");
        let b = FileId::new("b");
        coordinator.request_slot(&a);
        coordinator.request_slot(&b);
        let (seen, _sub) = recorder(&coordinator);

        coordinator.release(&a);

        assert_eq!(coordinator.current_holder(), Some(b));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_release_by_holder_clears_and_notifies() {
        let coordinator = PlaybackCoordinator::new();
        let a = FileId::new("a");
        coordinator.request_slot(&a);
        let (seen, _sub) = recorder(&coordinator);

        coordinator.release(&a);

        assert_eq!(coordinator.current_holder(), None);
        assert_eq!(*seen.lock(), vec![None]);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let coordinator = PlaybackCoordinator::new();
        let (seen, sub) = recorder(&coordinator);
        assert_eq!(coordinator.subscriber_count(), 1);

        drop(sub);
        coordinator.request_slot(&FileId::new("a"));

        assert_eq!(coordinator.subscriber_count(), 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_listener_may_reenter_coordinator() {
        let coordinator = PlaybackCoordinator::new();
        let a = FileId::new("a");
        let b = FileId::new("b");
        let reentrant = coordinator.clone();
        let a_listener = a.clone();
        // Mirrors a preempted widget releasing its (already lost) slot.
        let _sub = coordinator.subscribe(move |holder| {
            if holder != Some(&a_listener) {
                reentrant.release(&a_listener);
            }
        });

        coordinator.request_slot(&a);
        coordinator.request_slot(&b);

        assert_eq!(coordinator.current_holder(), Some(b));
    }

    #[test]
    fn test_listeners_never_see_an_older_holder_last() {
        let coordinator = PlaybackCoordinator::new();
        let a = FileId::new("a");
        let b = FileId::new("b");
        let reentrant = coordinator.clone();
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (b_once, fired_once) = (b.clone(), fired.clone());
        // The first listener claims the slot for `b` while `a` is still
        // being announced.
        let _first = coordinator.subscribe(move |_| {
            if !fired_once.swap(true, Ordering::SeqCst) {
                reentrant.request_slot(&b_once);
            }
        });
        let (seen, _second) = recorder(&coordinator);

        coordinator.request_slot(&a);

        assert_eq!(coordinator.current_holder(), Some(b.clone()));
        assert_eq!(seen.lock().last(), Some(&Some(b)));
        assert!(!seen.lock().contains(&Some(a)));
    }

    #[test]
    fn test_concurrent_requests_end_on_the_holder() {
        for _ in 0..50 {
            let coordinator = PlaybackCoordinator::new();
            let (seen, _sub) = recorder(&coordinator);
            std::thread::scope(|scope| {
                for id in ["a", "b", "c", "d"] {
                    let coordinator = coordinator.clone();
                    scope.spawn(move || coordinator.request_slot(&FileId::new(id)));
                }
            });
            assert_eq!(seen.lock().last().cloned(), Some(coordinator.current_holder()));
        }
    }

    #[test]
    fn test_all_subscribers_see_change_before_request_returns() {
        let coordinator = PlaybackCoordinator::new();
        let (first, _s1) = recorder(&coordinator);
        let (second, _s2) = recorder(&coordinator);
        let b = FileId::new("b");

        coordinator.request_slot(&b);

        assert_eq!(*first.lock(), vec![Some(b.clone())]);
        assert_eq!(*second.lock(), vec![Some(b)]);
    }
}
