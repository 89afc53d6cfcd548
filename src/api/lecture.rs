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


//! Lecture detail queries
//!
//! # API Endpoints
//!
//! ## Lecture Detail
//! **GET** `/users/me/subscribed-courses/{course_id}/lectures/{lecture_id}`
//!
//! Query parameters:
//! - `fields[lecture]` - `title,asset` plus `supplementary_assets` when attachments
//!   are requested
//! - `fields[asset]` - the fixed [`ASSET_FIELDS`] allow-list, or `@all`
//!
//! ## Supplementary Asset
//! **GET** `/users/me/subscribed-courses/{course_id}/lectures/{lecture_id}/supplementary-assets/{asset_id}`
//!
//! Returns the download URLs of a single attachment.

use crate::api::client::CourseClient;
use crate::api::models::{Asset, Lecture};
use crate::error::Result;

/// Asset fields requested whenever extended lecture data is needed
pub const ASSET_FIELDS: &str = "asset_type,title,filename,body,captions,media_sources,stream_urls,download_urls,external_url,media_license_token";

const SUPPLEMENTARY_ASSET_FIELDS: &str = "asset_type,title,filename,download_urls,external_url";

/// Field selection for a lecture request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LectureOptions {
    /// Include `supplementary_assets`
    pub attachments: bool,
    /// Request every asset field instead of [`ASSET_FIELDS`]
    pub all_asset_fields: bool,
}

impl LectureOptions {
    /// Everything the platform has for the lecture
    pub fn full() -> Self {
        Self {
            attachments: true,
            all_asset_fields: true,
        }
    }

    fn query(&self) -> String {
        let lecture_fields = if self.attachments {
            "title,asset,supplementary_assets"
        } else {
            "title,asset"
        };
        let asset_fields = if self.all_asset_fields {
            "@all"
        } else {
            ASSET_FIELDS
        };
        format!(
            "fields[lecture]={}&fields[asset]={}",
            lecture_fields, asset_fields
        )
    }
}

/// Endpoint path of a lecture record
pub fn lecture_url(course_id: u64, lecture_id: u64, options: LectureOptions) -> String {
    format!(
        "/users/me/subscribed-courses/{}/lectures/{}?{}",
        course_id,
        lecture_id,
        options.query()
    )
}

/// Endpoint path of one supplementary asset
pub fn supplementary_asset_url(course_id: u64, lecture_id: u64, asset_id: u64) -> String {
    format!(
        "/users/me/subscribed-courses/{}/lectures/{}/supplementary-assets/{}?fields[asset]={}",
        course_id, lecture_id, asset_id, SUPPLEMENTARY_ASSET_FIELDS
    )
}

impl CourseClient {
    /// Fetch one lecture record
    ///
    /// # Arguments
    /// * `course_id` - Course the lecture belongs to
    /// * `lecture_id` - Lecture to fetch
    /// * `options` - Which lecture and asset fields to request
    ///
    /// # Errors
    /// Returns error if the request fails or the response is not a lecture
    pub async fn fetch_lecture(
        &self,
        course_id: u64,
        lecture_id: u64,
        options: LectureOptions,
    ) -> Result<Lecture> {
        self.get(&lecture_url(course_id, lecture_id, options)).await
    }

    /// Fetch the download data of one supplementary asset
    pub async fn fetch_supplementary_asset(
        &self,
        course_id: u64,
        lecture_id: u64,
        asset_id: u64,
    ) -> Result<Asset> {
        self.get(&supplementary_asset_url(course_id, lecture_id, asset_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lecture_url_default_fields() {
        assert_eq!(
            lecture_url(1, 2, LectureOptions::default()),
            format!(
                "/users/me/subscribed-courses/1/lectures/2?fields[lecture]=title,asset&fields[asset]={}",
                ASSET_FIELDS
            )
        );
    }

    #[test]
    fn test_lecture_url_full() {
        assert_eq!(
            lecture_url(1, 2, LectureOptions::full()),
            "/users/me/subscribed-courses/1/lectures/2?fields[lecture]=title,asset,supplementary_assets&fields[asset]=@all"
        );
    }

    #[test]
    fn test_asset_fields_allow_list() {
        let fields: Vec<&str> = ASSET_FIELDS.split(',').collect();
        assert_eq!(fields.len(), 10);
        assert!(fields.contains(&"media_sources"));
        assert!(fields.contains(&"media_license_token"));
    }
}
