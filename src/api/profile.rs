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


//! User profile API
//!
//! # API Endpoint
//! `GET /contexts/me/?header=True`

use crate::api::client::CourseClient;
use crate::error::{CourseError, Result};
use serde::{Deserialize, Serialize};

/// Profile/context endpoint
pub const PROFILE_PATH: &str = "/contexts/me/?header=True";

/// Logged-in user summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Entitled to subscription enrollments
    #[serde(default, alias = "consumer_subscription_active")]
    pub is_subscriber: bool,
}

impl CourseClient {
    /// Get the profile of the logged-in user
    ///
    /// # Errors
    /// - `ApiRequestFailed` with status 401 if the platform reports no logged-in user
    /// - `InvalidApiResponse` if the user record is missing
    pub async fn fetch_profile(&self) -> Result<UserProfile> {
        let response = self.get_json(PROFILE_PATH).await?;
        let header = response.get("header").unwrap_or(&response);

        let logged_in = header
            .get("isLoggedIn")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if !logged_in {
            return Err(CourseError::api_failed(
                "Not logged in",
                Some(401),
                Some(PROFILE_PATH.to_string()),
            ));
        }

        let user = header
            .get("user")
            .ok_or_else(|| CourseError::InvalidApiResponse {
                message: "Missing 'user' field in profile response".to_string(),
                response_body: Some(response.to_string()),
            })?;

        serde_json::from_value(user.clone()).map_err(|e| CourseError::InvalidApiResponse {
            message: format!("Failed to parse user profile: {}", e),
            response_body: Some(user.to_string()),
        })
    }
}
