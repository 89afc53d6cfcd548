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


//! CourseSync core
//!
//! Retrieves a learning platform's course catalog and lecture content and normalizes
//! lecture streams into one quality-indexed representation.

pub mod api;
pub mod error;
pub mod streams;

pub use api::{ClientConfig, ContentType, CourseClient};
pub use error::{CourseError, ErrorKind, Result};
pub use streams::{QualityPreference, ResolvedStreamSet};
