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

//! Retrieval of audio bytes for a [`SourceDescriptor`].

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{StatusCode, Url, header};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{info, instrument};

use crate::{
    config::PlaybackConfig,
    err::{
        ConfigError, EmptyBodySnafu, FetchError, HttpClientSnafu, InvalidLocatorSnafu,
        MissingApiBaseSnafu, RequestSnafu, StatusSnafu, TooLargeSnafu, UnauthorizedSnafu,
    },
    handle::AudioSource,
    types::{Locator, SourceDescriptor},
};

/// Turns a descriptor into something an element can play.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, descriptor: &SourceDescriptor) -> Result<AudioSource, FetchError>;
}

/// Fetcher backed by `reqwest`.
///
/// Direct media URLs are passed through untouched so the engine can stream
/// them. API paths are joined to `api_base_url` and downloaded with the bearer
/// token.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client:       reqwest::Client,
    api_base:     Option<Url>,
    bearer_token: Option<String>,
    max_bytes:    u64,
}

impl HttpFetcher {
    pub fn new(config: &PlaybackConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout());
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context(HttpClientSnafu)?;
        // The config is validated before it gets here; an unparsable base is
        // treated as absent and reported per fetch.
        let api_base = config
            .api_base_url
            .as_deref()
            .and_then(|base| Url::parse(base).ok())
            .map(with_trailing_slash);

        Ok(Self {
            client,
            api_base,
            bearer_token: config.bearer_token.clone(),
            max_bytes: config.max_audio_bytes,
        })
    }

    /// Resolves an API path under the configured base. The path is always
    /// relative to the base, so `/api/x` against `https://crm/app` yields
    /// `https://crm/app/api/x`.
    pub fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        let base = self.api_base.as_ref().context(MissingApiBaseSnafu { locator: path })?;
        base.join(path.trim_start_matches('/')).map_err(|e| {
            InvalidLocatorSnafu {
                locator: path,
                reason:  e.to_string(),
            }
            .build()
        })
    }

    async fn download(&self, url: Url) -> Result<AudioSource, FetchError> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let mut response = request.send().await.context(RequestSnafu { url: url.as_str() })?;

        let status = response.status();
        ensure!(
            !matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN),
            UnauthorizedSnafu {
                url:    url.as_str(),
                status: status.as_u16(),
            }
        );
        ensure!(
            status.is_success(),
            StatusSnafu {
                url:    url.as_str(),
                status: status.as_u16(),
            }
        );
        if let Some(length) = response.content_length() {
            ensure!(
                length <= self.max_bytes,
                TooLargeSnafu {
                    url:   url.as_str(),
                    limit: self.max_bytes,
                }
            );
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.context(RequestSnafu { url: url.as_str() })? {
            ensure!(
                (body.len() + chunk.len()) as u64 <= self.max_bytes,
                TooLargeSnafu {
                    url:   url.as_str(),
                    limit: self.max_bytes,
                }
            );
            body.extend_from_slice(&chunk);
        }
        ensure!(!body.is_empty(), EmptyBodySnafu { url: url.as_str() });

        info!(%url, bytes = body.len(), content_type = ?content_type, "fetched recording");
        Ok(AudioSource::Buffered {
            bytes: body.freeze(),
            content_type,
        })
    }
}

#[async_trait]
impl AudioFetcher for HttpFetcher {
    #[instrument(skip_all, fields(file_id = %descriptor.file_id), err(Display))]
    async fn fetch(&self, descriptor: &SourceDescriptor) -> Result<AudioSource, FetchError> {
        match descriptor.locator() {
            Locator::Direct(url) => {
                let url = Url::parse(url).map_err(|e| {
                    InvalidLocatorSnafu {
                        locator: url,
                        reason:  e.to_string(),
                    }
                    .build()
                })?;
                Ok(AudioSource::Remote { url: url.into() })
            }
            Locator::Api(path) => {
                let url = self.resolve(path)?;
                self.download(url).await
            }
        }
    }
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
