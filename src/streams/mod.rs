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


//! Stream source resolution
//!
//! Turns the heterogeneous stream descriptors of an asset (progressive files,
//! adaptive playlist entry points, encrypted variants) into one quality-indexed
//! [`ResolvedStreamSet`].
//!
//! # Modules
//! - `resolver` - descriptor filtering and quality merge
//! - `playlist` - adaptive playlist discovery (HLS master playlists)

pub mod playlist;
pub mod resolver;

pub use playlist::{HlsPlaylistResolver, PlaylistResolver, PlaylistVariant};
pub use resolver::{
    QualityPreference, ResolvedStreamSet, StreamSource, StreamSourceResolver, AUTO_QUALITY,
    DASH_MIME_TYPE, ENCRYPTED_FILE_MARKER,
};
