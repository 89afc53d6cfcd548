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


//! Stream descriptor resolution
//!
//! # Pipeline
//! 1. Empty input fails with `ENO_STREAMS`
//! 2. With an encryption hint, descriptors under the encrypted-file path are dropped.
//!    If that drops everything the hint is considered stale: the asset is treated as
//!    unencrypted and the unfiltered list is used.
//! 3. DASH manifests are dropped
//! 4. Numeric labels are registered under their quality; `"auto"` entries are
//!    registered verbatim and, for unencrypted assets, expanded through the
//!    [`PlaylistResolver`]
//! 5. Bounds are the numeric min/max, else `"auto"` when present, else none
//!
//! # Merge order
//! Explicit descriptors are registered first, in input order. Playlist-discovered
//! renditions are merged afterwards, in descriptor order, and never replace a key that
//! is already present. The first writer of a key always wins.

use crate::api::fanout::FanOut;
use crate::api::models::StreamDescriptor;
use crate::error::{CourseError, Result};
use crate::streams::playlist::PlaylistResolver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Quality label of adaptive playlist entry points
pub const AUTO_QUALITY: &str = "auto";

/// Mime type of DASH manifests, which are not played directly
pub const DASH_MIME_TYPE: &str = "application/dash+xml";

/// Path segment of DRM-protected media files
pub const ENCRYPTED_FILE_MARKER: &str = "/encrypted-files";

/// One playable source of a [`ResolvedStreamSet`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSource {
    pub mime_type: String,
    pub url: String,
}

/// Quality-indexed streams of one asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStreamSet {
    /// Lowest numeric quality, `"auto"` when only adaptive sources exist
    pub min_quality: Option<String>,
    /// Highest numeric quality, `"auto"` when only adaptive sources exist
    pub max_quality: Option<String>,
    pub is_encrypted: bool,
    /// Quality label → source
    pub sources: HashMap<String, StreamSource>,
}

/// Which source to pick from a [`ResolvedStreamSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreference {
    Highest,
    Lowest,
    /// Exact quality, or the nearest lower one
    Exact(u32),
}

impl ResolvedStreamSet {
    /// Numeric quality keys, ascending
    pub fn numeric_qualities(&self) -> Vec<u32> {
        let mut qualities: Vec<u32> = self
            .sources
            .keys()
            .filter_map(|label| label.parse().ok())
            .collect();
        qualities.sort_unstable();
        qualities
    }

    pub fn source(&self, label: &str) -> Option<&StreamSource> {
        self.sources.get(label)
    }

    /// Pick a source for playback or download
    ///
    /// `Exact(n)` falls back to the highest quality below `n`, then to the lowest
    /// available. With no numeric qualities at all, the `"auto"` source is returned.
    pub fn select(&self, preference: QualityPreference) -> Option<(String, &StreamSource)> {
        let qualities = self.numeric_qualities();

        let chosen = match preference {
            QualityPreference::Highest => qualities.last().copied(),
            QualityPreference::Lowest => qualities.first().copied(),
            QualityPreference::Exact(wanted) => qualities
                .iter()
                .rev()
                .find(|q| **q <= wanted)
                .or_else(|| qualities.first())
                .copied(),
        };

        match chosen {
            Some(quality) => {
                let label = quality.to_string();
                let source = self.sources.get(&label)?;
                Some((label, source))
            }
            None => self
                .sources
                .get(AUTO_QUALITY)
                .map(|source| (AUTO_QUALITY.to_string(), source)),
        }
    }
}

/// Accumulates sources and numeric bounds
#[derive(Debug, Default)]
struct SourceSet {
    sources: HashMap<String, StreamSource>,
    min: Option<u32>,
    max: Option<u32>,
}

impl SourceSet {
    /// Register `source` under `label` unless the label is taken
    fn insert(&mut self, label: String, source: StreamSource) {
        if let Ok(quality) = label.parse::<u32>() {
            self.min = Some(self.min.map_or(quality, |min| min.min(quality)));
            self.max = Some(self.max.map_or(quality, |max| max.max(quality)));
        }
        self.sources.entry(label).or_insert(source);
    }

    fn finish(self, is_encrypted: bool) -> ResolvedStreamSet {
        let (min_quality, max_quality) = match (self.min, self.max) {
            (Some(min), Some(max)) => (Some(min.to_string()), Some(max.to_string())),
            _ if self.sources.contains_key(AUTO_QUALITY) => {
                (Some(AUTO_QUALITY.to_string()), Some(AUTO_QUALITY.to_string()))
            }
            _ => (None, None),
        };

        ResolvedStreamSet {
            min_quality,
            max_quality,
            is_encrypted,
            sources: self.sources,
        }
    }
}

fn is_numeric_label(label: &str) -> bool {
    label.parse::<u32>().is_ok()
}

/// Apply the encryption hint to the descriptor list
///
/// Returns the descriptors to use and the effective encryption flag.
fn reconcile_encryption(
    descriptors: Vec<StreamDescriptor>,
    encrypted_hint: bool,
) -> (Vec<StreamDescriptor>, bool) {
    if !encrypted_hint {
        return (descriptors, false);
    }

    let filtered: Vec<StreamDescriptor> = descriptors
        .iter()
        .filter(|d| !d.url.contains(ENCRYPTED_FILE_MARKER))
        .cloned()
        .collect();

    if filtered.is_empty() {
        // TODO: confirm against DRM-only assets that have no clear fallback; the flag
        // flips to unencrypted even though every source sits under the marker.
        tracing::warn!(
            descriptors = descriptors.len(),
            "encryption hint removed every stream, treating asset as unencrypted"
        );
        (descriptors, false)
    } else {
        (filtered, true)
    }
}

/// Resolves raw descriptors into a [`ResolvedStreamSet`]
#[derive(Clone)]
pub struct StreamSourceResolver {
    playlists: Arc<dyn PlaylistResolver>,
    fan_out: FanOut,
}

impl std::fmt::Debug for StreamSourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSourceResolver")
            .field("fan_out", &self.fan_out)
            .finish_non_exhaustive()
    }
}

impl StreamSourceResolver {
    pub fn new(playlists: Arc<dyn PlaylistResolver>, fan_out: FanOut) -> Self {
        Self { playlists, fan_out }
    }

    /// Resolve `descriptors` into one quality-indexed set
    ///
    /// # Errors
    /// - `NoStreams` if `descriptors` is empty
    /// - `ConvertToStreams` if an adaptive playlist cannot be resolved
    pub async fn resolve(
        &self,
        descriptors: Vec<StreamDescriptor>,
        encrypted_hint: bool,
    ) -> Result<ResolvedStreamSet> {
        if descriptors.is_empty() {
            return Err(CourseError::no_streams("asset has no stream descriptors"));
        }

        let (candidates, is_encrypted) = reconcile_encryption(descriptors, encrypted_hint);
        let candidates: Vec<StreamDescriptor> = candidates
            .into_iter()
            .filter(|d| d.mime_type != DASH_MIME_TYPE)
            .collect();

        let mut set = SourceSet::default();
        let mut adaptive = Vec::new();

        for descriptor in &candidates {
            let label = descriptor.quality_label.as_str();
            if label == AUTO_QUALITY {
                if !is_encrypted {
                    adaptive.push(descriptor);
                }
            } else if !is_numeric_label(label) {
                tracing::debug!(label, "ignoring stream with unsupported quality label");
                continue;
            }

            set.insert(
                label.to_string(),
                StreamSource {
                    mime_type: descriptor.mime_type.clone(),
                    url: descriptor.url.clone(),
                },
            );
        }

        let discovered = self
            .fan_out
            .try_join_all(adaptive.iter().map(|d| self.playlists.load_playlist(&d.url)))
            .await
            .map_err(|e| CourseError::convert_to_streams("adaptive playlist resolution failed", e))?;

        for (descriptor, variants) in adaptive.iter().zip(discovered) {
            for variant in variants {
                set.insert(
                    variant.quality.to_string(),
                    StreamSource {
                        mime_type: descriptor.mime_type.clone(),
                        url: variant.url,
                    },
                );
            }
        }

        Ok(set.finish(is_encrypted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::playlist::PlaylistVariant;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HLS: &str = "application/x-mpegURL";
    const MP4: &str = "video/mp4";

    struct StubPlaylists {
        variants: Vec<PlaylistVariant>,
        calls: AtomicUsize,
    }

    impl StubPlaylists {
        fn new(variants: &[(u32, &str)]) -> Arc<Self> {
            Arc::new(Self {
                variants: variants
                    .iter()
                    .map(|(quality, url)| PlaylistVariant {
                        quality: *quality,
                        url: url.to_string(),
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PlaylistResolver for StubPlaylists {
        async fn load_playlist(&self, _url: &str) -> Result<Vec<PlaylistVariant>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.variants.clone())
        }
    }

    struct FailingPlaylists;

    #[async_trait]
    impl PlaylistResolver for FailingPlaylists {
        async fn load_playlist(&self, url: &str) -> Result<Vec<PlaylistVariant>> {
            Err(CourseError::InvalidPlaylist(url.to_string()))
        }
    }

    fn resolver(playlists: Arc<dyn PlaylistResolver>) -> StreamSourceResolver {
        StreamSourceResolver::new(playlists, FanOut::unbounded())
    }

    fn url_of<'a>(set: &'a ResolvedStreamSet, label: &str) -> &'a str {
        set.sources[label].url.as_str()
    }

    #[tokio::test]
    async fn test_empty_input_fails_with_no_streams() {
        let result = resolver(StubPlaylists::new(&[])).resolve(Vec::new(), false).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind().code(), "ENO_STREAMS");
    }

    #[tokio::test]
    async fn test_numeric_bounds() {
        let set = resolver(StubPlaylists::new(&[]))
            .resolve(
                vec![
                    StreamDescriptor::new(MP4, "720", "b"),
                    StreamDescriptor::new(MP4, "360", "a"),
                    StreamDescriptor::new(MP4, "1080", "c"),
                    StreamDescriptor::new(MP4, "360", "dup"),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(set.min_quality.as_deref(), Some("360"));
        assert_eq!(set.max_quality.as_deref(), Some("1080"));
        assert_eq!(set.sources.len(), 3);
        assert_eq!(url_of(&set, "360"), "a");
        assert!(!set.is_encrypted);
    }

    #[tokio::test]
    async fn test_auto_is_expanded_and_kept() {
        let playlists = StubPlaylists::new(&[(480, "d"), (720, "ignored")]);
        let set = resolver(playlists.clone())
            .resolve(
                vec![
                    StreamDescriptor::new(MP4, "360", "a"),
                    StreamDescriptor::new(MP4, "720", "b"),
                    StreamDescriptor::new(HLS, "auto", "c"),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(set.sources.len(), 4);
        assert_eq!(url_of(&set, "360"), "a");
        assert_eq!(url_of(&set, "480"), "d");
        assert_eq!(url_of(&set, "720"), "b");
        assert_eq!(url_of(&set, "auto"), "c");
        assert_eq!(set.sources["480"].mime_type, HLS);
        assert_eq!(set.min_quality.as_deref(), Some("360"));
        assert_eq!(set.max_quality.as_deref(), Some("720"));
        assert_eq!(playlists.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discovered_quality_extends_bounds() {
        let set = resolver(StubPlaylists::new(&[(1080, "hd"), (144, "low")]))
            .resolve(
                vec![
                    StreamDescriptor::new(MP4, "360", "a"),
                    StreamDescriptor::new(HLS, "auto", "c"),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(set.min_quality.as_deref(), Some("144"));
        assert_eq!(set.max_quality.as_deref(), Some("1080"));
    }

    #[tokio::test]
    async fn test_auto_only_bounds() {
        let set = resolver(StubPlaylists::new(&[]))
            .resolve(vec![StreamDescriptor::new(HLS, "auto", "c")], false)
            .await
            .unwrap();

        assert_eq!(set.min_quality.as_deref(), Some("auto"));
        assert_eq!(set.max_quality.as_deref(), Some("auto"));
        assert_eq!(set.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_dash_only_yields_empty_set() {
        let set = resolver(StubPlaylists::new(&[]))
            .resolve(
                vec![StreamDescriptor::new(DASH_MIME_TYPE, "auto", "m.mpd")],
                false,
            )
            .await
            .unwrap();

        assert_eq!(set.min_quality, None);
        assert_eq!(set.max_quality, None);
        assert!(set.sources.is_empty());
    }

    #[tokio::test]
    async fn test_encrypted_sources_are_filtered() {
        let playlists = StubPlaylists::new(&[(1080, "never")]);
        let set = resolver(playlists.clone())
            .resolve(
                vec![
                    StreamDescriptor::new(MP4, "720", "https://cdn/encrypted-files/720.mp4"),
                    StreamDescriptor::new(MP4, "360", "https://cdn/clear/360.mp4"),
                    StreamDescriptor::new(HLS, "auto", "https://cdn/clear/master.m3u8"),
                ],
                true,
            )
            .await
            .unwrap();

        assert!(set.is_encrypted);
        assert!(!set.sources.contains_key("720"));
        assert_eq!(url_of(&set, "auto"), "https://cdn/clear/master.m3u8");
        assert_eq!(set.max_quality.as_deref(), Some("360"));
        // Encrypted assets never expand adaptive playlists
        assert_eq!(playlists.calls.load(Ordering::SeqCst), 0);
    }

    // Stale-hint heuristic: when every source is under the encrypted path the asset
    // is reported as unencrypted. Kept as observed behaviour; not verified against
    // DRM-only content.
    #[tokio::test]
    async fn test_stale_encryption_hint_flips_flag() {
        let playlists = StubPlaylists::new(&[(480, "https://cdn/encrypted-files/480.m3u8")]);
        let set = resolver(playlists.clone())
            .resolve(
                vec![
                    StreamDescriptor::new(MP4, "720", "https://cdn/encrypted-files/720.mp4"),
                    StreamDescriptor::new(HLS, "auto", "https://cdn/encrypted-files/m.m3u8"),
                ],
                true,
            )
            .await
            .unwrap();

        assert!(!set.is_encrypted);
        assert_eq!(set.sources.len(), 3);
        assert_eq!(playlists.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_playlist_failure_is_wrapped() {
        let err = resolver(Arc::new(FailingPlaylists))
            .resolve(
                vec![
                    StreamDescriptor::new(MP4, "360", "a"),
                    StreamDescriptor::new(HLS, "auto", "c"),
                ],
                false,
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind().code(), "ECONVERT_TO_STREAMS");
        assert!(matches!(err.root_cause(), CourseError::InvalidPlaylist(_)));
    }

    #[tokio::test]
    async fn test_unknown_labels_are_ignored() {
        let set = resolver(StubPlaylists::new(&[]))
            .resolve(
                vec![
                    StreamDescriptor::new(MP4, "HD", "x"),
                    StreamDescriptor::new(MP4, "480", "y"),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(set.sources.len(), 1);
        assert_eq!(set.min_quality.as_deref(), Some("480"));
    }

    fn sample_set() -> ResolvedStreamSet {
        let mut set = SourceSet::default();
        for (label, url) in [("360", "a"), ("720", "b"), ("1080", "c"), ("auto", "d")] {
            set.insert(
                label.to_string(),
                StreamSource {
                    mime_type: MP4.to_string(),
                    url: url.to_string(),
                },
            );
        }
        set.finish(false)
    }

    #[test]
    fn test_select() {
        let set = sample_set();
        assert_eq!(set.numeric_qualities(), vec![360, 720, 1080]);

        let (label, source) = set.select(QualityPreference::Highest).unwrap();
        assert_eq!((label.as_str(), source.url.as_str()), ("1080", "c"));

        let (label, _) = set.select(QualityPreference::Lowest).unwrap();
        assert_eq!(label, "360");

        let (label, _) = set.select(QualityPreference::Exact(900)).unwrap();
        assert_eq!(label, "720");

        let (label, _) = set.select(QualityPreference::Exact(144)).unwrap();
        assert_eq!(label, "360");
    }

    #[test]
    fn test_select_auto_only() {
        let mut set = SourceSet::default();
        set.insert(
            AUTO_QUALITY.to_string(),
            StreamSource {
                mime_type: HLS.to_string(),
                url: "m".to_string(),
            },
        );
        let set = set.finish(false);

        let (label, source) = set.select(QualityPreference::Exact(720)).unwrap();
        assert_eq!(label, "auto");
        assert_eq!(source.url, "m");
        assert!(ResolvedStreamSet::default().select(QualityPreference::Highest).is_none());
    }
}
