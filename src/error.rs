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


//! Error types for CourseSync
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by domain (API, stream resolution, configuration) so that
//! callers can react to a failure kind without parsing messages.
//!
//! ## Stream preparation failure kinds
//!
//! Resolution of course content reports four named failure kinds. Each one has a
//! stable code returned by [`ErrorKind::code`]:
//!
//! - `ENO_STREAMS` → [`CourseError::NoStreams`]: an asset carried no stream descriptors
//! - `ECONVERT_TO_STREAMS` → [`CourseError::ConvertToStreams`]: descriptor conversion
//!   failed, including adaptive playlist failures
//! - `EPREPARE_STREAM_SOURCE` → [`CourseError::PrepareStreamSource`]: one curriculum
//!   item could not be prepared (or its presentation lecture could not be re-fetched)
//! - `EPREPARE_STREAMS_SOURCE` → [`CourseError::PrepareStreamsSource`]: the batch over
//!   all items of a course failed
//!
//! The wrapping kinds keep the underlying error as their `source()`.

use thiserror::Error;

/// Result type alias using our CourseError type
pub type Result<T> = std::result::Result<T, CourseError>;

/// Closed set of failure kinds, used as a discriminator for [`CourseError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoStreams,
    ConvertToStreams,
    PrepareStreamSource,
    PrepareStreamsSource,
    Api,
    InvalidResponse,
    Network,
    Timeout,
    InvalidPlaylist,
    InvalidInput,
    Configuration,
}

impl ErrorKind {
    /// Stable code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoStreams => "ENO_STREAMS",
            Self::ConvertToStreams => "ECONVERT_TO_STREAMS",
            Self::PrepareStreamSource => "EPREPARE_STREAM_SOURCE",
            Self::PrepareStreamsSource => "EPREPARE_STREAMS_SOURCE",
            Self::Api => "EAPI",
            Self::InvalidResponse => "EINVALID_RESPONSE",
            Self::Network => "ENETWORK",
            Self::Timeout => "ETIMEOUT",
            Self::InvalidPlaylist => "EINVALID_PLAYLIST",
            Self::InvalidInput => "EINVALID_INPUT",
            Self::Configuration => "ECONFIG",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Main error type for CourseSync
#[derive(Error, Debug)]
pub enum CourseError {
    // ===== Stream Preparation Errors =====

    /// Asset has no stream descriptors to resolve
    #[error("No streams available: {0}")]
    NoStreams(String),

    /// Converting stream descriptors into a resolved stream set failed
    #[error("Failed to convert streams: {message}")]
    ConvertToStreams {
        message: String,
        #[source]
        source: Box<CourseError>,
    },

    /// Preparing the stream source of a single curriculum item failed
    #[error("Failed to prepare stream source for item {item_id}")]
    PrepareStreamSource {
        item_id: u64,
        #[source]
        source: Box<CourseError>,
    },

    /// Preparing stream sources for a whole course failed
    #[error("Failed to prepare stream sources for course {course_id}")]
    PrepareStreamsSource {
        course_id: u64,
        #[source]
        source: Box<CourseError>,
    },

    // ===== API Errors =====

    /// Generic API request failure
    #[error("API request failed: {message}")]
    ApiRequestFailed {
        message: String,
        /// HTTP status code if available
        status_code: Option<u16>,
        /// API endpoint that failed
        endpoint: Option<String>,
    },

    /// API returned invalid or unexpected response format
    #[error("Invalid API response: {message}")]
    InvalidApiResponse {
        message: String,
        /// Response body snippet for debugging
        response_body: Option<String>,
    },

    /// Network connectivity error
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    /// Request did not complete within its timeout
    #[error("Request to {endpoint} timed out after {timeout_ms} ms")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
    },

    /// Adaptive playlist could not be parsed
    #[error("Invalid playlist: {0}")]
    InvalidPlaylist(String),

    // ===== Input/Configuration Errors =====

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

impl CourseError {
    /// Create a NoStreams error
    pub fn no_streams<S: Into<String>>(message: S) -> Self {
        CourseError::NoStreams(message.into())
    }

    /// Wrap a failure that happened while converting descriptors
    pub fn convert_to_streams<S: Into<String>>(message: S, source: CourseError) -> Self {
        CourseError::ConvertToStreams {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure that happened while preparing one item
    pub fn prepare_stream_source(item_id: u64, source: CourseError) -> Self {
        CourseError::PrepareStreamSource {
            item_id,
            source: Box::new(source),
        }
    }

    /// Wrap a failure of the per-course batch
    pub fn prepare_streams_source(course_id: u64, source: CourseError) -> Self {
        CourseError::PrepareStreamsSource {
            course_id,
            source: Box::new(source),
        }
    }

    /// Create an ApiRequestFailed error
    pub fn api_failed<S: Into<String>>(
        message: S,
        status_code: Option<u16>,
        endpoint: Option<String>,
    ) -> Self {
        CourseError::ApiRequestFailed {
            message: message.into(),
            status_code,
            endpoint,
        }
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, is_transient: bool) -> Self {
        CourseError::NetworkError {
            message: message.into(),
            is_transient,
        }
    }

    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        CourseError::InvalidInput(message.into())
    }

    /// Failure kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CourseError::NoStreams(_) => ErrorKind::NoStreams,
            CourseError::ConvertToStreams { .. } => ErrorKind::ConvertToStreams,
            CourseError::PrepareStreamSource { .. } => ErrorKind::PrepareStreamSource,
            CourseError::PrepareStreamsSource { .. } => ErrorKind::PrepareStreamsSource,
            CourseError::ApiRequestFailed { .. } => ErrorKind::Api,
            CourseError::InvalidApiResponse { .. } | CourseError::SerdeJsonError(_) => {
                ErrorKind::InvalidResponse
            }
            CourseError::NetworkError { .. } | CourseError::ReqwestError(_) => ErrorKind::Network,
            CourseError::Timeout { .. } => ErrorKind::Timeout,
            CourseError::InvalidPlaylist(_) => ErrorKind::InvalidPlaylist,
            CourseError::InvalidInput(_) | CourseError::UrlError(_) => ErrorKind::InvalidInput,
            CourseError::InvalidConfiguration(_) => ErrorKind::Configuration,
        }
    }

    /// HTTP status code carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CourseError::ApiRequestFailed { status_code, .. } => *status_code,
            CourseError::ReqwestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if the platform answered 503 Service Unavailable
    ///
    /// The paginated curriculum fetch switches to the cached curriculum endpoint
    /// when this is true.
    pub fn is_service_unavailable(&self) -> bool {
        self.status_code() == Some(503)
    }

    /// Check if error is transient
    ///
    /// Nothing in this crate retries automatically; this is informational for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CourseError::NetworkError { is_transient: true, .. }
                | CourseError::Timeout { .. }
                | CourseError::ApiRequestFailed { status_code: Some(500..=599), .. }
        )
    }

    /// Innermost error of a wrapping chain
    pub fn root_cause(&self) -> &CourseError {
        match self {
            CourseError::ConvertToStreams { source, .. }
            | CourseError::PrepareStreamSource { source, .. }
            | CourseError::PrepareStreamsSource { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self.root_cause() {
            CourseError::NoStreams(_) => {
                "This lecture has no playable streams.".to_string()
            }
            CourseError::ApiRequestFailed { status_code: Some(401), .. } => {
                "Your session has expired. Please log in again.".to_string()
            }
            CourseError::ApiRequestFailed { status_code: Some(403), .. } => {
                "You do not have access to this course.".to_string()
            }
            CourseError::Timeout { timeout_ms, .. } => {
                format!(
                    "The platform did not respond within {} seconds. Please try again.",
                    timeout_ms / 1000
                )
            }
            CourseError::InvalidPlaylist(_) => {
                "A video playlist could not be read.".to_string()
            }
            root => format!("[{}] {}", self.kind(), root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(CourseError::no_streams("x").kind().code(), "ENO_STREAMS");
        let convert = CourseError::convert_to_streams("x", CourseError::InvalidPlaylist("bad".into()));
        assert_eq!(convert.kind().code(), "ECONVERT_TO_STREAMS");
        let item = CourseError::prepare_stream_source(7, convert);
        assert_eq!(item.kind().code(), "EPREPARE_STREAM_SOURCE");
        let batch = CourseError::prepare_streams_source(1, item);
        assert_eq!(batch.kind().code(), "EPREPARE_STREAMS_SOURCE");
    }

    #[test]
    fn test_root_cause_unwraps_chain() {
        let err = CourseError::prepare_streams_source(
            1,
            CourseError::prepare_stream_source(2, CourseError::no_streams("asset 3")),
        );
        assert_eq!(err.root_cause().kind(), ErrorKind::NoStreams);
        assert_eq!(err.user_message(), "This lecture has no playable streams.");
    }

    #[test]
    fn test_service_unavailable() {
        let err = CourseError::api_failed("down", Some(503), Some("/courses/1".to_string()));
        assert!(err.is_service_unavailable());
        assert!(err.is_retryable());

        let err = CourseError::api_failed("missing", Some(404), None);
        assert!(!err.is_service_unavailable());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let err = CourseError::prepare_stream_source(9, CourseError::no_streams("empty"));
        let source = err.source().expect("wrapped error keeps its source");
        assert_eq!(source.to_string(), "No streams available: empty");
    }
}
