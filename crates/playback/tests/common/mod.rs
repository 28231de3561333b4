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

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use switchboard_playback::{
    AudioElement, AudioFetcher, AudioSource, FetchError, FileId, PausePolicy, PlayableHandle,
    PlaybackConfig, PlaybackContext, PlayerWidget, SourceDescriptor,
    err::{PlaybackRejectedSnafu, StatusSnafu},
};
use tokio::sync::oneshot;

pub fn context(fetcher: Arc<GatedFetcher>, policy: PausePolicy) -> PlaybackContext {
    switchboard_telemetry::init_default_ut_logging();
    let config = PlaybackConfig::builder().pause_policy(policy).build();
    PlaybackContext::with_fetcher(config, fetcher)
}

pub fn widget(
    context: &PlaybackContext,
    stage: &Arc<Stage>,
    file_id: &str,
    duration: f64,
) -> (PlayerWidget, Arc<RecordingElement>) {
    let element = Arc::new(RecordingElement::new(file_id, stage.clone()));
    let descriptor = SourceDescriptor::new(file_id, format!("/api/recordings/{file_id}/audio"), duration);
    (context.widget(descriptor, element.clone()), element)
}

/// Releases or fails one pending fetch.
pub struct Gate(oneshot::Sender<Result<(), String>>);

impl Gate {
    pub fn open(self) { let _ = self.0.send(Ok(())); }

    pub fn fail(self, reason: &str) { let _ = self.0.send(Err(reason.to_owned())); }
}

/// Fetcher whose responses the test controls.
///
/// Fetches for a file with a pending [`Gate`] wait on it; others resolve at
/// once. Files marked failing always fail.
#[derive(Default)]
pub struct GatedFetcher {
    gates:   Mutex<HashMap<FileId, VecDeque<oneshot::Receiver<Result<(), String>>>>>,
    failing: Mutex<HashSet<FileId>>,
    calls:   Mutex<HashMap<FileId, usize>>,
}

impl GatedFetcher {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// The next fetch of `file_id` waits until the returned gate is used.
    pub fn gate(&self, file_id: &str) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .entry(FileId::new(file_id))
            .or_default()
            .push_back(rx);
        Gate(tx)
    }

    pub fn set_failing(&self, file_id: &str, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(FileId::new(file_id));
        } else {
            set.remove(&FileId::new(file_id));
        }
    }

    pub fn calls(&self, file_id: &str) -> usize {
        self.calls.lock().get(&FileId::new(file_id)).copied().unwrap_or(0)
    }

    /// Waits until `file_id` has been fetched `n` times.
    pub async fn wait_for_calls(&self, file_id: &str, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls(file_id) < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetch never started");
    }
}

#[async_trait]
impl AudioFetcher for GatedFetcher {
    async fn fetch(&self, descriptor: &SourceDescriptor) -> Result<AudioSource, FetchError> {
        let file_id = &descriptor.file_id;
        *self.calls.lock().entry(file_id.clone()).or_default() += 1;

        let gate = self.gates.lock().get_mut(file_id).and_then(VecDeque::pop_front);
        let mut outcome = match gate {
            Some(rx) => rx.await.unwrap_or_else(|_| Err("gate dropped".to_owned())),
            None => Ok(()),
        };
        if self.failing.lock().contains(file_id) {
            outcome = Err("server error".to_owned());
        }

        match outcome {
            Ok(()) => Ok(AudioSource::Buffered {
                bytes:        Bytes::from(format!("audio:{file_id}")),
                content_type: Some("audio/mpeg".to_owned()),
            }),
            Err(_) => StatusSnafu {
                url:    format!("https://crm.example.com/api/recordings/{file_id}/audio"),
                status: 500u16,
            }
            .fail(),
        }
    }
}

/// Tracks which elements are audible, across all widgets of a test.
#[derive(Default)]
pub struct Stage {
    audible:     Mutex<HashSet<String>>,
    max_audible: AtomicUsize,
}

impl Stage {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    fn enter(&self, name: &str) {
        let mut audible = self.audible.lock();
        audible.insert(name.to_owned());
        self.max_audible.fetch_max(audible.len(), Ordering::SeqCst);
    }

    fn leave(&self, name: &str) { self.audible.lock().remove(name); }

    pub fn audible(&self) -> Vec<String> {
        let mut names: Vec<String> = self.audible.lock().iter().cloned().collect();
        names.sort();
        names
    }

    /// The most elements ever audible at once.
    pub fn max_audible(&self) -> usize { self.max_audible.load(Ordering::SeqCst) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start { file_id: FileId, from: f64 },
    Pause,
    Stop,
    Seek(f64),
}

/// Element that records every call and reports audibility to a [`Stage`].
///
/// Like a browser media element, a `stop` issued while a start is pending
/// aborts that start, unless the element is made stubborn.
pub struct RecordingElement {
    name:        String,
    stage:       Arc<Stage>,
    calls:       Mutex<Vec<Call>>,
    start_gates: Mutex<VecDeque<oneshot::Receiver<Result<(), String>>>>,
    stops:       AtomicUsize,
    stubborn:    AtomicBool,
    reject_next: AtomicBool,
    ended:       AtomicBool,
    position:    Mutex<f64>,
}

impl RecordingElement {
    pub fn new(name: &str, stage: Arc<Stage>) -> Self {
        Self {
            name: name.to_owned(),
            stage,
            calls: Mutex::new(Vec::new()),
            start_gates: Mutex::new(VecDeque::new()),
            stops: AtomicUsize::new(0),
            stubborn: AtomicBool::new(false),
            reject_next: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            position: Mutex::new(0.0),
        }
    }

    pub fn calls(&self) -> Vec<Call> { self.calls.lock().clone() }

    pub fn starts(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Start { .. }))
            .collect()
    }

    /// The next `start` waits until the returned gate is used.
    pub fn gate_start(&self) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.start_gates.lock().push_back(rx);
        Gate(tx)
    }

    /// Pending starts complete even when stopped meanwhile.
    pub fn set_stubborn(&self) { self.stubborn.store(true, Ordering::SeqCst); }

    pub fn stop_count(&self) -> usize { self.stops.load(Ordering::SeqCst) }

    /// Waits until `start` has been called `n` times.
    pub async fn wait_for_starts(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.starts().len() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("start never called");
    }

    /// The next `start` fails the way an autoplay policy would.
    pub fn reject_next_start(&self) { self.reject_next.store(true, Ordering::SeqCst); }

    pub fn set_ended(&self) { self.ended.store(true, Ordering::SeqCst); }

    pub fn set_position(&self, seconds: f64) { *self.position.lock() = seconds; }
}

#[async_trait]
impl AudioElement for RecordingElement {
    async fn start(&self, handle: &PlayableHandle, from: f64) -> Result<(), FetchError> {
        self.calls.lock().push(Call::Start {
            file_id: handle.file_id().clone(),
            from,
        });
        let stops_before = self.stop_count();
        let gate = self.start_gates.lock().pop_front();
        let gate = match gate {
            Some(rx) => rx.await.unwrap_or_else(|_| Err("gate dropped".to_owned())),
            None => Ok(()),
        };
        let aborted = !self.stubborn.load(Ordering::SeqCst) && self.stop_count() != stops_before;
        if let Err(reason) = gate {
            return PlaybackRejectedSnafu {
                file_id: handle.file_id().clone(),
                reason,
            }
            .fail();
        }
        if aborted {
            return PlaybackRejectedSnafu {
                file_id: handle.file_id().clone(),
                reason:  "start aborted by stop",
            }
            .fail();
        }
        if self.reject_next.swap(false, Ordering::SeqCst) || handle.is_revoked() {
            return PlaybackRejectedSnafu {
                file_id: handle.file_id().clone(),
                reason:  "play() request was denied",
            }
            .fail();
        }
        *self.position.lock() = from;
        self.ended.store(false, Ordering::SeqCst);
        self.stage.enter(&self.name);
        Ok(())
    }

    fn pause(&self) {
        self.calls.lock().push(Call::Pause);
        self.stage.leave(&self.name);
    }

    fn stop(&self) {
        self.calls.lock().push(Call::Stop);
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.position.lock() = 0.0;
        self.stage.leave(&self.name);
    }

    fn seek(&self, seconds: f64) {
        self.calls.lock().push(Call::Seek(seconds));
        *self.position.lock() = seconds;
    }

    fn position(&self) -> f64 { *self.position.lock() }

    fn is_ended(&self) -> bool { self.ended.load(Ordering::SeqCst) }
}
