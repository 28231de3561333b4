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

//! Per-widget memoization of the playable handle.

use parking_lot::Mutex;

use crate::{handle::PlayableHandle, types::FileId};

/// Lifecycle of the one resource a widget owns.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResourceState {
    #[default]
    NotLoaded,
    Loading,
    Ready(PlayableHandle),
    Failed,
}

#[derive(Debug, Clone)]
pub struct AudioResource {
    pub file_id:       FileId,
    pub state:         ResourceState,
    /// Epoch of the request that last touched this resource.
    pub request_epoch: u64,
}

/// Holds a widget's [`AudioResource`]. Owned by exactly one widget; never
/// shared across rows.
#[derive(Debug)]
pub struct ResourceCache {
    resource: Mutex<AudioResource>,
}

impl ResourceCache {
    #[must_use]
    pub fn new(file_id: FileId) -> Self {
        Self {
            resource: Mutex::new(AudioResource {
                file_id,
                state: ResourceState::NotLoaded,
                request_epoch: 0,
            }),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AudioResource { self.resource.lock().clone() }

    /// The cached handle, if one is ready and not revoked.
    #[must_use]
    pub fn ready(&self) -> Option<PlayableHandle> {
        match &self.resource.lock().state {
            ResourceState::Ready(handle) if !handle.is_revoked() => Some(handle.clone()),
            _ => None,
        }
    }

    pub(crate) fn begin(&self, epoch: u64) {
        let mut resource = self.resource.lock();
        resource.state = ResourceState::Loading;
        resource.request_epoch = epoch;
    }

    /// Installs `handle` if the in-flight request is still the one started at
    /// `epoch`. Returns false otherwise and leaves the cache untouched.
    pub(crate) fn install(&self, epoch: u64, handle: PlayableHandle) -> bool {
        let mut resource = self.resource.lock();
        if resource.request_epoch != epoch || resource.state != ResourceState::Loading {
            return false;
        }
        resource.state = ResourceState::Ready(handle);
        true
    }

    pub(crate) fn fail(&self, epoch: u64) {
        let mut resource = self.resource.lock();
        if resource.request_epoch == epoch && resource.state == ResourceState::Loading {
            resource.state = ResourceState::Failed;
        }
    }

    /// Forgets an in-flight request that was superseded.
    pub(crate) fn abandon(&self, epoch: u64) {
        let mut resource = self.resource.lock();
        if resource.request_epoch == epoch && resource.state == ResourceState::Loading {
            resource.state = ResourceState::NotLoaded;
        }
    }

    /// Empties the cache, handing back a ready handle for revocation.
    pub(crate) fn take(&self) -> Option<PlayableHandle> {
        let mut resource = self.resource.lock();
        match std::mem::take(&mut resource.state) {
            ResourceState::Ready(handle) => Some(handle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{AudioSource, HandleRegistry};

    fn handle(registry: &HandleRegistry) -> PlayableHandle {
        registry.mint(
            &FileId::new("a"),
            AudioSource::Remote {
                url: "https://cdn.example.com/a.mp3".into(),
            },
        )
    }

    #[test]
    fn test_install_requires_matching_epoch() {
        let registry = HandleRegistry::new();
        let cache = ResourceCache::new(FileId::new("a"));
        cache.begin(1);
        cache.begin(2);

        assert!(!cache.install(1, handle(&registry)));
        assert!(cache.ready().is_none());

        assert!(cache.install(2, handle(&registry)));
        assert!(cache.ready().is_some());
    }

    #[test]
    fn test_failed_attempt_is_not_served() {
        let cache = ResourceCache::new(FileId::new("a"));
        cache.begin(1);
        cache.fail(1);

        assert_eq!(cache.snapshot().state, ResourceState::Failed);
        assert!(cache.ready().is_none());
    }

    #[test]
    fn test_revoked_handle_is_not_served() {
        let registry = HandleRegistry::new();
        let cache = ResourceCache::new(FileId::new("a"));
        cache.begin(1);
        let handle = handle(&registry);
        cache.install(1, handle.clone());

        registry.revoke(&handle);

        assert!(cache.ready().is_none());
    }

    #[test]
    fn test_take_empties_cache() {
        let registry = HandleRegistry::new();
        let cache = ResourceCache::new(FileId::new("a"));
        cache.begin(3);
        cache.install(3, handle(&registry));

        assert!(cache.take().is_some());
        assert!(cache.take().is_none());
        assert_eq!(cache.snapshot().state, ResourceState::NotLoaded);
    }
}
