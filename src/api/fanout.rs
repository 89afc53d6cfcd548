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


//! All-or-nothing concurrent joins
//!
//! Every fan-out point (per-item stream resolution, lecture hydration, the dual course
//! listing, per-descriptor playlist discovery) goes through [`FanOut`]. The first
//! failure to complete fails the whole join and the remaining results are dropped.
//! Requests already on the wire are not cancelled by the platform; their futures are
//! simply no longer polled.

use crate::error::Result;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

/// Task group with an optional concurrency cap
///
/// `None` runs every sub-operation at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    limit: Option<usize>,
}

impl FanOut {
    pub fn unbounded() -> Self {
        Self { limit: None }
    }

    /// At most `limit` sub-operations in flight (a limit of 0 is treated as 1)
    pub fn bounded(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
        }
    }

    pub fn new(limit: Option<usize>) -> Self {
        limit.map_or_else(Self::unbounded, Self::bounded)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Run all futures and collect their outputs in input order
    pub async fn try_join_all<I, Fut, T>(&self, futures: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T>>,
    {
        match self.limit {
            None => futures_util::future::try_join_all(futures).await,
            Some(limit) => {
                let mut indexed: Vec<(usize, T)> = stream::iter(
                    futures
                        .into_iter()
                        .enumerate()
                        .map(|(index, fut)| async move { fut.await.map(|value| (index, value)) }),
                )
                .buffer_unordered(limit)
                .try_collect()
                .await?;

                indexed.sort_by_key(|(index, _)| *index);
                Ok(indexed.into_iter().map(|(_, value)| value).collect())
            }
        }
    }
}
