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

use std::sync::LazyLock;

use prometheus::{
    IntCounter, IntCounterVec, IntGauge, register_int_counter, register_int_counter_vec,
    register_int_gauge,
};

pub const OUTCOME_LABEL: &str = "outcome";

pub static SLOT_GRANTS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "playback_slot_grants_total",
        "Total number of times the playback slot changed hands"
    )
    .unwrap()
});

pub static SLOT_PREEMPTIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "playback_slot_preemptions_total",
        "Total number of grants that stopped another holder"
    )
    .unwrap()
});

pub static FETCHES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "playback_fetches_total",
        "Total number of audio fetches by outcome",
        &[OUTCOME_LABEL]
    )
    .unwrap()
});

pub static CACHE_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "playback_cache_hits_total",
        "Total number of loads served from a widget's cache"
    )
    .unwrap()
});

pub static HANDLES_MINTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "playback_handles_minted_total",
        "Total number of playable handles created"
    )
    .unwrap()
});

pub static HANDLES_REVOKED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "playback_handles_revoked_total",
        "Total number of playable handles revoked"
    )
    .unwrap()
});

pub static HANDLES_LIVE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "playback_handles_live",
        "Number of playable handles minted and not yet revoked"
    )
    .unwrap()
});
