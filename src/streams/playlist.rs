// CourseSync - Course Content Sync
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Adaptive playlist discovery
//!
//! An `"auto"` stream descriptor points at an HLS master playlist. Each variant of that
//! playlist is one more quality the asset can be played at. [`PlaylistResolver`] is the
//! seam; [`HlsPlaylistResolver`] is the default implementation.

use crate::api::cache::{request_key, ResponseCache, DEFAULT_CACHE_TTL};
use crate::api::client::transport_error;
use crate::error::{CourseError, Result};
use async_trait::async_trait;
use m3u8_rs::Playlist;
use reqwest::{Client, Method};
use std::time::Duration;
use url::Url;

/// One rendition discovered in an adaptive playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistVariant {
    /// Vertical resolution, used as the quality key
    pub quality: u32,
    /// Absolute URL of the rendition playlist
    pub url: String,
}

/// Discovers the renditions behind an adaptive playlist URL
#[async_trait]
pub trait PlaylistResolver: Send + Sync {
    async fn load_playlist(&self, url: &str) -> Result<Vec<PlaylistVariant>>;
}

/// [`PlaylistResolver`] for HLS master playlists
#[derive(Debug, Clone)]
pub struct HlsPlaylistResolver {
    client: Client,
    timeout: Duration,
    cache: ResponseCache<String>,
}

impl HlsPlaylistResolver {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self::with_cache_ttl(client, timeout, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(client: Client, timeout: Duration, cache_ttl: Duration) -> Self {
        Self {
            client,
            timeout,
            cache: ResponseCache::new(cache_ttl),
        }
    }

    async fn fetch_manifest(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, url, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourseError::api_failed(
                format!("Playlist request failed with status {}", status),
                Some(status.as_u16()),
                Some(url.to_string()),
            ));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PlaylistResolver for HlsPlaylistResolver {
    async fn load_playlist(&self, url: &str) -> Result<Vec<PlaylistVariant>> {
        let key = request_key(&Method::GET, url);
        let manifest = self
            .cache
            .get_or_fetch(&key, || self.fetch_manifest(url))
            .await?;

        let variants = parse_master_playlist(url, manifest.as_bytes())?;
        tracing::debug!(url, variants = variants.len(), "loaded adaptive playlist");
        Ok(variants)
    }
}

/// Parse an HLS master playlist into its renditions
///
/// I-frame variants and variants without a `RESOLUTION` are skipped. Variant URIs are
/// resolved against `manifest_url`. A media playlist has a single implicit rendition of
/// unknown quality and yields nothing.
pub fn parse_master_playlist(manifest_url: &str, data: &[u8]) -> Result<Vec<PlaylistVariant>> {
    let base = Url::parse(manifest_url)?;

    match m3u8_rs::parse_playlist_res(data) {
        Ok(Playlist::MasterPlaylist(master)) => Ok(master
            .variants
            .into_iter()
            .filter(|variant| !variant.is_i_frame)
            .filter_map(|variant| {
                let resolution = variant.resolution?;
                let url = base.join(&variant.uri).ok()?;
                Some(PlaylistVariant {
                    quality: u32::try_from(resolution.height).ok()?,
                    url: url.to_string(),
                })
            })
            .collect()),
        Ok(Playlist::MediaPlaylist(_)) => Ok(Vec::new()),
        Err(e) => Err(CourseError::InvalidPlaylist(format!(
            "{}: {:?}",
            manifest_url, e
        ))),
    }
}
