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

//! Transient, revocable references to playable audio.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use derive_more::{Debug, Display};
use parking_lot::Mutex;
use tracing::debug;

use crate::{metrics, types::FileId};

/// Unique identifier for a minted handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[debug("HandleId({_0})")]
#[display("{_0}")]
pub struct HandleId(u64);

/// What a handle points at.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AudioSource {
    /// A media URL the engine streams itself.
    Remote { url: String },
    /// Bytes retrieved through an authenticated fetch.
    Buffered {
        bytes:        Bytes,
        content_type: Option<String>,
    },
}

impl AudioSource {
    #[must_use]
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            Self::Remote { .. } => None,
            Self::Buffered { bytes, .. } => Some(bytes.len()),
        }
    }
}

/// A playable reference handed to an [`crate::AudioElement`].
///
/// Clones share the same revocation state.
#[derive(Clone, Debug)]
#[debug("PlayableHandle({}, {})", inner.id, inner.file_id)]
pub struct PlayableHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id:      HandleId,
    file_id: FileId,
    source:  AudioSource,
    revoked: AtomicBool,
}

impl PlayableHandle {
    #[must_use]
    pub fn id(&self) -> HandleId { self.inner.id }

    #[must_use]
    pub fn file_id(&self) -> &FileId { &self.inner.file_id }

    #[must_use]
    pub fn source(&self) -> &AudioSource { &self.inner.source }

    #[must_use]
    pub fn is_revoked(&self) -> bool { self.inner.revoked.load(Ordering::Acquire) }
}

impl PartialEq for PlayableHandle {
    fn eq(&self, other: &Self) -> bool { self.inner.id == other.inner.id }
}

/// Mints handles and tracks which are still live.
#[derive(Clone, Default)]
pub struct HandleRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    live:    Mutex<HashMap<HandleId, FileId>>,
    minted:  AtomicU64,
    revoked: AtomicU64,
}

impl HandleRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn mint(&self, file_id: &FileId, source: AudioSource) -> PlayableHandle {
        let id = HandleId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.live.lock().insert(id, file_id.clone());
        self.inner.minted.fetch_add(1, Ordering::Relaxed);
        metrics::HANDLES_MINTED.inc();
        metrics::HANDLES_LIVE.inc();
        debug!(%id, %file_id, bytes = ?source.byte_len(), "handle minted");
        PlayableHandle {
            inner: Arc::new(HandleInner {
                id,
                file_id: file_id.clone(),
                source,
                revoked: AtomicBool::new(false),
            }),
        }
    }

    /// Revokes `handle`. Only the first call has an effect; returns whether
    /// this call was it.
    pub fn revoke(&self, handle: &PlayableHandle) -> bool {
        if handle.inner.revoked.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.live.lock().remove(&handle.inner.id);
        self.inner.revoked.fetch_add(1, Ordering::Relaxed);
        metrics::HANDLES_REVOKED.inc();
        metrics::HANDLES_LIVE.dec();
        debug!(id = %handle.inner.id, file_id = %handle.inner.file_id, "handle revoked");
        true
    }

    #[must_use]
    pub fn live_count(&self) -> usize { self.inner.live.lock().len() }

    /// Files that still have at least one live handle.
    #[must_use]
    pub fn live_files(&self) -> Vec<FileId> {
        let mut files: Vec<FileId> = self.inner.live.lock().values().cloned().collect();
        files.sort();
        files.dedup();
        files
    }

    #[must_use]
    pub fn minted(&self) -> u64 { self.inner.minted.load(Ordering::Relaxed) }

    #[must_use]
    pub fn revoked(&self) -> u64 { self.inner.revoked.load(Ordering::Relaxed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffered() -> AudioSource {
        AudioSource::Buffered {
            bytes:        Bytes::from_static(b"RIFF"),
            content_type: Some("audio/wav".into()),
        }
    }

    #[test]
    fn test_mint_tracks_live_handles() {
        let registry = HandleRegistry::new();
        let a = registry.mint(&FileId::new("a"), buffered());
        let b = registry.mint(&FileId::new("b"), buffered());

        assert_ne!(a.id(), b.id());
        assert_eq!(registry.live_count(), 2);
        assert_eq!(registry.live_files(), vec![FileId::new("a"), FileId::new("b")]);
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let registry = HandleRegistry::new();
        let handle = registry.mint(&FileId::new("a"), buffered());
        let clone = handle.clone();

        assert!(registry.revoke(&handle));
        assert!(!registry.revoke(&handle));
        assert!(!registry.revoke(&clone));

        assert!(clone.is_revoked());
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.minted(), 1);
        assert_eq!(registry.revoked(), 1);
    }
}
