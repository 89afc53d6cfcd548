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


//! Course platform API client
//!
//! Course listings, course outlines, lecture details and the user profile, all read
//! through one cached HTTP client.

pub mod cache;
pub mod client;
pub mod courses;
pub mod curriculum;
pub mod fanout;
pub mod lecture;
pub mod models;
pub mod profile;

// Re-export commonly used types
pub use cache::{CacheStore, MemoryCacheStore, ResponseCache};
pub use client::{ClientConfig, CourseClient, RequestOptions};
pub use courses::CourseListOptions;
pub use curriculum::ContentType;
pub use fanout::FanOut;
pub use lecture::LectureOptions;
pub use models::{Asset, AssetType, Course, CurriculumItem, ItemKind, Lecture, PageLink, PaginatedCollection, StreamDescriptor};
pub use profile::UserProfile;
