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


//! Course listings
//!
//! # API Endpoints
//! - `GET /users/me/subscribed-courses` - courses owned by the user
//! - `GET /users/me/subscription-course-enrollments` - courses enrolled through a
//!   subscription plan
//!
//! Subscribers get both listings fetched concurrently and merged into one collection
//! (see [`PaginatedCollection::merge`]). Everyone else only gets the first one.

use crate::api::client::CourseClient;
use crate::api::models::{Course, PaginatedCollection};
use crate::error::Result;

/// Owned courses listing
pub const SUBSCRIBED_COURSES_PATH: &str = "/users/me/subscribed-courses";

/// Subscription enrollments listing
pub const SUBSCRIPTION_ENROLLMENTS_PATH: &str = "/users/me/subscription-course-enrollments";

/// Default listing page size
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Smallest page size used for searches
pub const MIN_SEARCH_PAGE_SIZE: u32 = 10;

const COURSE_FIELDS: &str =
    "id,url,title,published_title,image_240x135,num_published_lectures,last_accessed_time";

/// Query options for the course listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseListOptions {
    pub page_size: u32,
    pub ordering: String,
    pub search: Option<String>,
}

impl Default for CourseListOptions {
    fn default() -> Self {
        Self::listing(DEFAULT_PAGE_SIZE)
    }
}

impl CourseListOptions {
    /// Plain listing, most recently accessed first
    pub fn listing(page_size: u32) -> Self {
        Self {
            page_size,
            ordering: "-last_accessed".to_string(),
            search: None,
        }
    }

    /// Keyword search, page size floored at [`MIN_SEARCH_PAGE_SIZE`]
    pub fn search(keyword: &str, page_size: u32) -> Self {
        Self {
            page_size: page_size.max(MIN_SEARCH_PAGE_SIZE),
            ordering: "title".to_string(),
            search: Some(keyword.to_string()),
        }
    }

    pub fn to_query(&self) -> String {
        let mut query = format!(
            "page_size={}&ordering={}&fields[course]={}",
            self.page_size, self.ordering, COURSE_FIELDS
        );
        if let Some(ref keyword) = self.search {
            query.push_str("&search=");
            query.push_str(&urlencoding::encode(keyword));
        }
        query
    }
}

impl CourseClient {
    /// List the user's courses
    ///
    /// # Arguments
    /// * `page_size` - Number of courses per page
    /// * `is_subscriber` - Also include subscription enrollments
    pub async fn fetch_courses(
        &self,
        page_size: u32,
        is_subscriber: bool,
    ) -> Result<PaginatedCollection<Course>> {
        self.fetch_course_listing(&CourseListOptions::listing(page_size), is_subscriber)
            .await
    }

    /// Search the user's courses by keyword
    ///
    /// A blank keyword is the same as [`CourseClient::fetch_courses`].
    pub async fn fetch_search_courses(
        &self,
        keyword: &str,
        page_size: u32,
        is_subscriber: bool,
    ) -> Result<PaginatedCollection<Course>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return self.fetch_courses(page_size, is_subscriber).await;
        }

        self.fetch_course_listing(&CourseListOptions::search(keyword, page_size), is_subscriber)
            .await
    }

    async fn fetch_course_listing(
        &self,
        options: &CourseListOptions,
        is_subscriber: bool,
    ) -> Result<PaginatedCollection<Course>> {
        let query = options.to_query();
        let subscribed = format!("{}?{}", SUBSCRIBED_COURSES_PATH, query);

        if !is_subscriber {
            return self.get(&subscribed).await;
        }

        let enrolled = format!("{}?{}", SUBSCRIPTION_ENROLLMENTS_PATH, query);
        let mut listings = self
            .fan_out()
            .try_join_all([
                self.get::<PaginatedCollection<Course>>(&subscribed),
                self.get::<PaginatedCollection<Course>>(&enrolled),
            ])
            .await?
            .into_iter();

        let owned = listings.next().unwrap_or_default();
        let enrolled = listings.next().unwrap_or_default();
        tracing::debug!(
            owned = owned.count,
            enrolled = enrolled.count,
            "merging course listings"
        );
        Ok(owned.merge(enrolled))
    }
}
