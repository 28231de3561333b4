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

use crate::{
    config::PlaybackConfig,
    coordinator::PlaybackCoordinator,
    element::AudioElement,
    err::ConfigError,
    fetcher::{AudioFetcher, HttpFetcher},
    handle::HandleRegistry,
    loader::ResourceLoader,
    types::SourceDescriptor,
    widget::PlayerWidget,
};

/// Everything a widget needs from the application: the one coordinator, the
/// shared loader and the settings.
#[derive(Debug, Clone)]
pub struct PlaybackContext {
    coordinator: PlaybackCoordinator,
    loader:      ResourceLoader,
    config:      PlaybackConfig,
}

impl PlaybackContext {
    pub const fn new(
        coordinator: PlaybackCoordinator,
        loader: ResourceLoader,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            coordinator,
            loader,
            config,
        }
    }

    /// A context with a fresh coordinator and the HTTP fetcher.
    pub fn from_config(config: PlaybackConfig) -> Result<Self, ConfigError> {
        let fetcher: Arc<dyn AudioFetcher> = Arc::new(HttpFetcher::new(&config)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// A context with a fresh coordinator and a custom fetcher.
    pub fn with_fetcher(config: PlaybackConfig, fetcher: Arc<dyn AudioFetcher>) -> Self {
        Self::new(
            PlaybackCoordinator::new(),
            ResourceLoader::new(fetcher, HandleRegistry::new()),
            config,
        )
    }

    #[must_use]
    pub const fn coordinator(&self) -> &PlaybackCoordinator { &self.coordinator }

    #[must_use]
    pub const fn loader(&self) -> &ResourceLoader { &self.loader }

    #[must_use]
    pub const fn config(&self) -> &PlaybackConfig { &self.config }

    #[must_use]
    pub const fn registry(&self) -> &HandleRegistry { self.loader.registry() }

    /// Builds a widget for one row.
    pub fn widget(
        &self,
        descriptor: SourceDescriptor,
        element: Arc<dyn AudioElement>,
    ) -> PlayerWidget {
        PlayerWidget::new(self, descriptor, element)
    }
}
