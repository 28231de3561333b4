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

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{coordinator::PlaybackCoordinator, types::FileId};

/// Per-widget request counter. Advancing it invalidates every ticket issued
/// before.
#[derive(Debug, Clone, Default)]
pub struct RequestEpoch(Arc<AtomicU64>);

impl RequestEpoch {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn current(&self) -> u64 { self.0.load(Ordering::Acquire) }

    /// Moves to a new epoch and returns it.
    pub fn advance(&self) -> u64 { self.0.fetch_add(1, Ordering::AcqRel) + 1 }

    /// Captures the current epoch for an asynchronous request made on behalf
    /// of `file_id`.
    #[must_use]
    pub fn ticket(&self, file_id: &FileId, coordinator: &PlaybackCoordinator) -> EpochTicket {
        EpochTicket {
            epoch:       self.current(),
            counter:     self.clone(),
            file_id:     file_id.clone(),
            coordinator: coordinator.clone(),
        }
    }
}

/// Proof that a request was made at a given epoch. Checked at every
/// asynchronous resumption.
#[derive(Debug, Clone)]
pub struct EpochTicket {
    epoch:       u64,
    counter:     RequestEpoch,
    file_id:     FileId,
    coordinator: PlaybackCoordinator,
}

impl EpochTicket {
    #[must_use]
    pub const fn epoch(&self) -> u64 { self.epoch }

    #[must_use]
    pub const fn file_id(&self) -> &FileId { &self.file_id }

    /// True while no newer request or teardown has happened and the widget
    /// still holds the slot.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.counter.current() == self.epoch
            && self.coordinator.current_holder().as_ref() == Some(&self.file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_goes_stale_on_advance() {
        let coordinator = PlaybackCoordinator::new();
        let file = FileId::new("a");
        coordinator.request_slot(&file);
        let epoch = RequestEpoch::new();

        let ticket = epoch.ticket(&file, &coordinator);
        assert!(ticket.is_current());

        epoch.advance();
        assert!(!ticket.is_current());
        assert!(epoch.ticket(&file, &coordinator).is_current());
    }

    #[test]
    fn test_ticket_goes_stale_when_slot_lost() {
        let coordinator = PlaybackCoordinator::new();
        let file = FileId::new("a");
        coordinator.request_slot(&file);
        let ticket = RequestEpoch::new().ticket(&file, &coordinator);

        coordinator.request_slot(&FileId::new("b"));

        assert!(!ticket.is_current());
    }
}
