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


//! Course content retrieval
//!
//! This module drives retrieval of a course outline and prepares every lecture's
//! streams for playback or download.
//!
//! # API Endpoints
//!
//! **Primary endpoint:** `GET /courses/{id}/subscriber-curriculum-items/`
//! - `page_size` - 200
//! - `fields[lecture]`, `fields[chapter]`, `fields[quiz]`, `fields[asset]` - selected by
//!   [`ContentType`]
//! - `caching_intent=True`
//!
//! **Fallback endpoint:** `GET /courses/{id}/cached-subscriber-curriculum-items`
//! - Single unpaginated response without asset data
//! - Used when the primary endpoint answers 503
//!
//! # Process
//! 1. Fetch every page, following `next` (decoded, see [`decode_next_url`])
//! 2. On a 503, switch to the fallback endpoint; lectures then need hydration when the
//!    content type asks for assets
//! 3. Empty outline → `None`
//! 4. Prepend a placeholder chapter when the outline does not start with one
//! 5. Hydrate lectures concurrently (fallback only)
//! 6. Recompute `count` from the final item list
//! 7. Prepare the stream source of every item concurrently
//!
//! Every concurrent step is all-or-nothing: the first failure fails the whole call.

use crate::api::client::CourseClient;
use crate::api::lecture::{LectureOptions, ASSET_FIELDS};
use crate::api::models::{Asset, AssetType, CurriculumItem, PaginatedCollection};
use crate::error::{CourseError, Result};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Page size of the paginated curriculum endpoint
pub const CURRICULUM_PAGE_SIZE: u32 = 200;

/// Page size used with the unpaginated fallback endpoint
pub const CACHED_CURRICULUM_PAGE_SIZE: u32 = 100_000;

/// How much lecture data to request
///
/// Ordered from least to most data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// Outline only: titles of chapters, lectures and quizzes
    Less,
    /// Lectures with their assets
    Lectures,
    /// Lectures with their assets and attachments
    Attachments,
    /// Everything
    All,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Less => "less",
            Self::Lectures => "lectures",
            Self::Attachments => "attachments",
            Self::All => "all",
        }
    }

    fn lecture_fields(&self) -> &'static str {
        match self {
            Self::Less => "title",
            Self::Lectures => "title,asset",
            Self::Attachments => "title,asset,supplementary_assets",
            Self::All => "title,object_index,is_published,sort_order,created,asset,supplementary_assets,is_free",
        }
    }

    fn includes_assets(&self) -> bool {
        !matches!(self, Self::Less)
    }

    /// Whether lectures must be re-fetched one by one when the outline lacks assets
    pub fn needs_hydration(&self) -> bool {
        self.includes_assets()
    }

    /// Field selection for lecture hydration
    ///
    /// Hydration always pulls the whole lecture record including attachments; only
    /// `All` widens the asset fields.
    pub fn lecture_options(&self) -> LectureOptions {
        LectureOptions {
            attachments: true,
            all_asset_fields: matches!(self, Self::All),
        }
    }

    fn query(&self) -> String {
        let mut query = format!(
            "page_size={}&fields[lecture]={}",
            CURRICULUM_PAGE_SIZE,
            self.lecture_fields()
        );

        match self {
            Self::Less => query.push_str("&fields[chapter]=title&fields[quiz]=title"),
            Self::All => {
                query.push_str("&fields[chapter]=title,object_index,description");
                query.push_str("&fields[quiz]=title,object_index,type");
            }
            _ => query.push_str("&fields[chapter]=title,object_index&fields[quiz]=title,object_index"),
        }

        if self.includes_assets() {
            query.push_str("&fields[asset]=");
            query.push_str(ASSET_FIELDS);
        }

        query.push_str("&caching_intent=True");
        query
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = CourseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "less" => Ok(Self::Less),
            "lectures" => Ok(Self::Lectures),
            "attachments" => Ok(Self::Attachments),
            "all" => Ok(Self::All),
            other => Err(CourseError::invalid_input(format!(
                "Unknown content type '{}', expected less, lectures, attachments or all",
                other
            ))),
        }
    }
}

/// First page of the paginated curriculum
pub fn curriculum_url(course_id: u64, content_type: ContentType) -> String {
    format!(
        "/courses/{}/subscriber-curriculum-items/?{}",
        course_id,
        content_type.query()
    )
}

/// Unpaginated cached curriculum
pub fn cached_curriculum_url(course_id: u64) -> String {
    format!(
        "/courses/{}/cached-subscriber-curriculum-items?page_size={}",
        course_id, CACHED_CURRICULUM_PAGE_SIZE
    )
}

/// Undo the platform's encoding of `[`, `]` and `,` in continuation URLs
pub fn decode_next_url(url: &str) -> String {
    url.replace("%5B", "[")
        .replace("%5b", "[")
        .replace("%5D", "]")
        .replace("%5d", "]")
        .replace("%2C", ",")
        .replace("%2c", ",")
}

impl CourseClient {
    /// Fetch a course outline and prepare the streams of its lectures
    ///
    /// # Arguments
    /// * `course_id` - Course to fetch
    /// * `content_type` - How much lecture data to request
    ///
    /// # Returns
    /// The whole outline as one collection, or `None` when the course has no content
    ///
    /// # Errors
    /// - HTTP failures other than the 503 fallback propagate unchanged
    /// - `PrepareStreamsSource` if any item's streams cannot be prepared
    pub async fn fetch_course_content(
        &self,
        course_id: u64,
        content_type: ContentType,
    ) -> Result<Option<PaginatedCollection<CurriculumItem>>> {
        let (mut collection, hydrate) = match self.fetch_curriculum_pages(course_id, content_type).await {
            Ok(collection) => (collection, false),
            Err(e) if e.is_service_unavailable() => {
                tracing::warn!(
                    course_id,
                    "curriculum endpoint unavailable, falling back to cached curriculum"
                );
                let collection: PaginatedCollection<CurriculumItem> =
                    self.get(&cached_curriculum_url(course_id)).await?;
                (collection, content_type.needs_hydration())
            }
            Err(e) => return Err(e),
        };

        if collection.results.is_empty() || collection.count == 0 {
            tracing::debug!(course_id, "course has no content");
            return Ok(None);
        }

        if !collection.results[0].is_chapter() {
            collection.results.insert(0, CurriculumItem::placeholder_chapter());
            collection.count += 1;
        }

        if hydrate {
            self.hydrate_lectures(course_id, content_type, &mut collection.results)
                .await?;
        }

        collection.count = collection.results.len() as u64;

        self.prepare_streams_source(course_id, &mut collection.results)
            .await?;

        tracing::info!(
            course_id,
            content_type = %content_type,
            items = collection.count,
            hydrated = hydrate,
            "course content ready"
        );

        Ok(Some(collection))
    }

    /// Fetch every page of the paginated curriculum into one collection
    async fn fetch_curriculum_pages(
        &self,
        course_id: u64,
        content_type: ContentType,
    ) -> Result<PaginatedCollection<CurriculumItem>> {
        let mut target = curriculum_url(course_id, content_type);
        let mut accumulated: Option<PaginatedCollection<CurriculumItem>> = None;
        let mut visited = HashSet::new();
        let mut pages = 0;

        loop {
            visited.insert(self.endpoint_url(&target));
            let page: PaginatedCollection<CurriculumItem> = self.get(&target).await?;
            pages += 1;

            let next = page.next.as_ref().and_then(|link| link.urls().first().map(|u| u.to_string()));

            match accumulated.as_mut() {
                None => accumulated = Some(page),
                Some(collection) => {
                    collection.results.extend(page.results);
                    collection.next = page.next;
                }
            }

            match next.map(|url| decode_next_url(&url)) {
                Some(url) if visited.contains(&self.endpoint_url(&url)) => {
                    tracing::warn!(course_id, next = %url, "curriculum continuation repeats a fetched page");
                    break;
                }
                Some(url) => target = url,
                None => break,
            }
        }

        tracing::debug!(course_id, pages, "fetched curriculum pages");
        Ok(accumulated.unwrap_or_default())
    }

    /// Replace each lecture's asset data with its full lecture record
    async fn hydrate_lectures(
        &self,
        course_id: u64,
        content_type: ContentType,
        items: &mut [CurriculumItem],
    ) -> Result<()> {
        let options = content_type.lecture_options();

        let lectures = self
            .fan_out()
            .try_join_all(
                items
                    .iter()
                    .filter(|item| item.is_lecture())
                    .map(|item| self.fetch_lecture(course_id, item.id, options)),
            )
            .await?;

        tracing::debug!(course_id, lectures = lectures.len(), "hydrated lectures");

        for (item, lecture) in items
            .iter_mut()
            .filter(|item| item.is_lecture())
            .zip(lectures)
        {
            item.asset = lecture.asset;
            item.supplementary_assets = lecture.supplementary_assets;
        }

        Ok(())
    }

    /// Resolve the streams of every item of a course
    ///
    /// # Errors
    /// `PrepareStreamsSource` wrapping the first item failure
    pub async fn prepare_streams_source(
        &self,
        course_id: u64,
        items: &mut [CurriculumItem],
    ) -> Result<()> {
        self.fan_out()
            .try_join_all(
                items
                    .iter_mut()
                    .map(|item| self.prepare_stream_source(course_id, item)),
            )
            .await
            .map_err(|e| CourseError::prepare_streams_source(course_id, e))?;
        Ok(())
    }

    /// Resolve the streams of one item in place
    ///
    /// Non-lecture items and assets without stream descriptors are left untouched.
    /// Presentation lectures are re-fetched with every asset field first.
    ///
    /// # Errors
    /// `PrepareStreamSource` wrapping the re-fetch or resolution failure
    pub async fn prepare_stream_source(
        &self,
        course_id: u64,
        item: &mut CurriculumItem,
    ) -> Result<()> {
        let item_id = item.id;
        if !item.is_lecture() {
            return Ok(());
        }
        let Some(asset) = item.asset.as_mut() else {
            return Ok(());
        };

        self.resolve_asset_streams(course_id, item_id, asset)
            .await
            .map_err(|e| CourseError::prepare_stream_source(item_id, e))
    }

    async fn resolve_asset_streams(
        &self,
        course_id: u64,
        lecture_id: u64,
        asset: &mut Asset,
    ) -> Result<()> {
        if asset.asset_type == AssetType::Presentation {
            let lecture = self
                .fetch_lecture(course_id, lecture_id, LectureOptions::full())
                .await?;
            if let Some(full) = lecture.asset {
                *asset = full;
            }
        }

        if !asset.asset_type.is_streamable() || !asset.has_raw_streams() {
            return Ok(());
        }

        let encrypted_hint = asset.is_encrypted_hint();
        let descriptors = asset.take_raw_streams();
        let resolved = self
            .stream_resolver()
            .resolve(descriptors, encrypted_hint)
            .await?;

        tracing::debug!(
            lecture_id,
            min = ?resolved.min_quality,
            max = ?resolved.max_quality,
            encrypted = resolved.is_encrypted,
            "resolved streams"
        );
        asset.streams = Some(resolved);
        Ok(())
    }
}
