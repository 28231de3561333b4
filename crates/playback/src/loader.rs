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

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::{
    cache::ResourceCache,
    epoch::EpochTicket,
    err::LoadError,
    fetcher::AudioFetcher,
    handle::{HandleRegistry, PlayableHandle},
    metrics::{self, FETCHES},
    types::SourceDescriptor,
};

/// Produces playable handles for widgets.
///
/// Shared by every widget in an application. The loader itself holds no
/// per-file state; memoization lives in each widget's [`ResourceCache`].
#[derive(Clone)]
pub struct ResourceLoader {
    fetcher:  Arc<dyn AudioFetcher>,
    registry: HandleRegistry,
}

impl ResourceLoader {
    pub fn new(fetcher: Arc<dyn AudioFetcher>, registry: HandleRegistry) -> Self {
        Self { fetcher, registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &HandleRegistry { &self.registry }

    /// Returns the cached handle or fetches a new one.
    ///
    /// A fetched handle is installed only if `ticket` is still current when
    /// the fetch resolves. Otherwise it is revoked on the spot and
    /// [`LoadError::StaleResultDiscarded`] is returned.
    #[instrument(skip_all, fields(file_id = %descriptor.file_id, epoch = ticket.epoch()))]
    pub async fn load(
        &self,
        cache: &ResourceCache,
        descriptor: &SourceDescriptor,
        ticket: &EpochTicket,
    ) -> Result<PlayableHandle, LoadError> {
        if let Some(handle) = cache.ready() {
            metrics::CACHE_HITS.inc();
            debug!(handle = %handle.id(), "cache hit");
            return Ok(handle);
        }

        let epoch = ticket.epoch();
        cache.begin(epoch);
        let fetched = self.fetcher.fetch(descriptor).await;

        let source = match fetched {
            Ok(source) => source,
            Err(source) if ticket.is_current() => {
                FETCHES.with_label_values(&["error"]).inc();
                warn!(error = %source, "fetch failed");
                cache.fail(epoch);
                return Err(LoadError::Fetch { source });
            }
            Err(source) => {
                FETCHES.with_label_values(&["stale"]).inc();
                debug!(error = %source, "stale fetch failed");
                cache.abandon(epoch);
                return Err(LoadError::StaleResultDiscarded {
                    file_id: descriptor.file_id.clone(),
                });
            }
        };

        let handle = self.registry.mint(&descriptor.file_id, source);
        if !ticket.is_current() || !cache.install(epoch, handle.clone()) {
            FETCHES.with_label_values(&["stale"]).inc();
            debug!(handle = %handle.id(), "discarding stale fetch result");
            self.registry.revoke(&handle);
            cache.abandon(epoch);
            return Err(LoadError::StaleResultDiscarded {
                file_id: descriptor.file_id.clone(),
            });
        }

        FETCHES.with_label_values(&["ok"]).inc();
        Ok(handle)
    }

    /// Revokes `handle`. Safe to call more than once.
    pub fn release(&self, handle: &PlayableHandle) { self.registry.revoke(handle); }

    /// Revokes whatever `cache` holds and leaves it empty.
    pub fn evict(&self, cache: &ResourceCache) {
        if let Some(handle) = cache.take() {
            self.release(&handle);
        }
    }
}

impl std::fmt::Debug for ResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("live_handles", &self.registry.live_count())
            .finish_non_exhaustive()
    }
}
