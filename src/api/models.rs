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


//! API response models
//!
//! Wire shapes of the platform responses this crate consumes. Only the fields that are
//! actually read are modelled; everything else is ignored by serde.

use crate::streams::ResolvedStreamSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a field whose `null` means "empty"
///
/// `#[serde(default)]` only covers a missing key; the platform also sends explicit
/// `null` for empty lists and strings.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ============================================================================
// PAGINATION
// ============================================================================

/// Continuation link of a [`PaginatedCollection`]
///
/// The platform returns a single URL. Merged collections carry one link per
/// underlying collection that still had one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageLink {
    Single(String),
    Many(Vec<String>),
}

impl PageLink {
    /// All URLs of this link
    pub fn urls(&self) -> Vec<&str> {
        match self {
            PageLink::Single(url) => vec![url.as_str()],
            PageLink::Many(urls) => urls.iter().map(String::as_str).collect(),
        }
    }

    fn into_urls(self) -> Vec<String> {
        match self {
            PageLink::Single(url) => vec![url],
            PageLink::Many(urls) => urls,
        }
    }

    /// Merge two optional links: `None` only when both sides are `None`
    pub fn merge(a: Option<PageLink>, b: Option<PageLink>) -> Option<PageLink> {
        if a.is_none() && b.is_none() {
            return None;
        }
        let urls = a
            .into_iter()
            .chain(b)
            .flat_map(PageLink::into_urls)
            .collect();
        Some(PageLink::Many(urls))
    }
}

/// One page (or an accumulation of pages) of a platform listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedCollection<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,

    #[serde(default)]
    pub next: Option<PageLink>,

    #[serde(default)]
    pub previous: Option<PageLink>,

    #[serde(
        default = "Vec::new",
        deserialize_with = "null_as_default",
        bound(deserialize = "T: Deserialize<'de>")
    )]
    pub results: Vec<T>,
}

impl<T> Default for PaginatedCollection<T> {
    fn default() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }
}

impl<T> PaginatedCollection<T> {
    /// Combine two independently paginated collections into one
    ///
    /// Counts are summed, results concatenated (`self` first), and `next`/`previous`
    /// become lists of the non-null links, or `None` when neither side has one.
    pub fn merge(self, other: PaginatedCollection<T>) -> PaginatedCollection<T> {
        let mut results = self.results;
        results.extend(other.results);

        PaginatedCollection {
            count: self.count + other.count,
            next: PageLink::merge(self.next, other.next),
            previous: PageLink::merge(self.previous, other.previous),
            results,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// ============================================================================
// COURSES
// ============================================================================

/// Course summary from the subscribed/enrolled listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub published_title: Option<String>,

    #[serde(default)]
    pub image_240x135: Option<String>,

    #[serde(default)]
    pub num_published_lectures: Option<u32>,

    #[serde(default)]
    pub last_accessed_time: Option<DateTime<Utc>>,
}

// ============================================================================
// CURRICULUM
// ============================================================================

/// Kind of a curriculum row (wire field `_class`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Chapter,
    Lecture,
    Quiz,
    Practice,
    #[serde(other)]
    Other,
}

/// One row of a course outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,

    #[serde(rename = "_class")]
    pub kind: ItemKind,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Asset>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplementary_assets: Option<Vec<Asset>>,
}

impl CurriculumItem {
    /// Placeholder chapter prepended to outlines that do not start with one
    pub fn placeholder_chapter() -> Self {
        Self {
            id: 0,
            kind: ItemKind::Chapter,
            title: "Chapter 1".to_string(),
            asset: None,
            supplementary_assets: None,
        }
    }

    pub fn is_chapter(&self) -> bool {
        self.kind == ItemKind::Chapter
    }

    pub fn is_lecture(&self) -> bool {
        self.kind == ItemKind::Lecture
    }
}

/// Full lecture record from the lecture detail endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default)]
    pub asset: Option<Asset>,

    #[serde(default)]
    pub supplementary_assets: Option<Vec<Asset>>,
}

impl From<Lecture> for CurriculumItem {
    fn from(lecture: Lecture) -> Self {
        Self {
            id: lecture.id,
            kind: ItemKind::Lecture,
            title: lecture.title,
            asset: lecture.asset,
            supplementary_assets: lecture.supplementary_assets,
        }
    }
}

// ============================================================================
// ASSETS
// ============================================================================

/// Asset type (wire field `asset_type`, case-insensitive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum AssetType {
    Video,
    VideoMashup,
    Presentation,
    Article,
    File,
    ExternalLink,
    Audio,
    Other,
}

impl AssetType {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "video" => Self::Video,
            "videomashup" => Self::VideoMashup,
            "presentation" => Self::Presentation,
            "article" => Self::Article,
            "file" => Self::File,
            "externallink" => Self::ExternalLink,
            "audio" => Self::Audio,
            _ => Self::Other,
        }
    }

    /// Whether this asset type is played from stream descriptors
    pub fn is_streamable(&self) -> bool {
        matches!(self, Self::Video | Self::VideoMashup | Self::Presentation | Self::Audio)
    }
}

impl<'de> Deserialize<'de> for AssetType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map_or(AssetType::Other, |raw| AssetType::parse(&raw)))
    }
}

/// A single stream variant as returned by the platform
///
/// `media_sources` entries use `src`, `stream_urls.Video` entries use `file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub mime_type: String,

    #[serde(rename = "label", default, deserialize_with = "null_as_default")]
    pub quality_label: String,

    #[serde(rename = "src", alias = "file")]
    pub url: String,
}

impl StreamDescriptor {
    pub fn new(mime_type: &str, quality_label: &str, url: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            quality_label: quality_label.to_string(),
            url: url.to_string(),
        }
    }
}

/// Legacy progressive stream listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamUrls {
    #[serde(rename = "Video", default, deserialize_with = "null_as_default")]
    pub video: Vec<StreamDescriptor>,
}

/// Caption track of a video asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    #[serde(default)]
    pub locale_id: Option<String>,

    #[serde(default)]
    pub video_label: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

/// Playable or downloadable payload of a lecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,

    #[serde(default = "default_asset_type")]
    pub asset_type: AssetType,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub captions: Vec<Caption>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub media_sources: Vec<StreamDescriptor>,

    #[serde(default)]
    pub stream_urls: Option<StreamUrls>,

    #[serde(default)]
    pub download_urls: Option<serde_json::Value>,

    #[serde(default)]
    pub external_url: Option<String>,

    #[serde(default)]
    pub media_license_token: Option<String>,

    /// Resolved streams, filled in by stream source preparation
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub streams: Option<ResolvedStreamSet>,
}

fn default_asset_type() -> AssetType {
    AssetType::Other
}

impl Asset {
    /// Encryption hint from the platform
    pub fn is_encrypted_hint(&self) -> bool {
        self.media_license_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// Whether this asset still carries unresolved stream descriptors
    pub fn has_raw_streams(&self) -> bool {
        !self.media_sources.is_empty()
            || self
                .stream_urls
                .as_ref()
                .is_some_and(|urls| !urls.video.is_empty())
    }

    /// Take the raw stream descriptors out of this asset
    ///
    /// `media_sources` wins when present, otherwise `stream_urls.Video` is used.
    pub fn take_raw_streams(&mut self) -> Vec<StreamDescriptor> {
        let media_sources = std::mem::take(&mut self.media_sources);
        let legacy = self
            .stream_urls
            .take()
            .map(|urls| urls.video)
            .unwrap_or_default();

        if media_sources.is_empty() {
            legacy
        } else {
            media_sources
        }
    }
}
