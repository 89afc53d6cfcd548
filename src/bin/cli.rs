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


use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use course_core::api::{ClientConfig, ContentType, CourseClient, CurriculumItem, LectureOptions};
use course_core::streams::QualityPreference;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "course-cli")]
#[command(about = "CourseSync CLI - Desktop testing tool", long_about = None)]
struct Cli {
    /// Bearer access token
    #[arg(long, env = "COURSE_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Platform subdomain (business accounts use their own)
    #[arg(long, default_value = "www")]
    subdomain: String,

    /// Full API base URL, overrides --subdomain
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 40_000)]
    timeout_ms: u64,

    /// Cap on concurrent requests
    #[arg(long)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the logged-in user
    Profile,
    /// List courses
    Courses {
        #[arg(long, default_value_t = 30)]
        page_size: u32,
        /// Include subscription enrollments
        #[arg(long)]
        subscriber: bool,
    },
    /// Search courses by keyword
    Search {
        keyword: String,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
        #[arg(long)]
        subscriber: bool,
    },
    /// Fetch a course outline with resolved streams
    Content {
        course_id: u64,
        /// less, lectures, attachments or all
        #[arg(long, default_value = "all")]
        content_type: ContentType,
    },
    /// Fetch one lecture and pick a stream
    Lecture {
        course_id: u64,
        lecture_id: u64,
        /// Preferred quality height, highest when omitted
        #[arg(long)]
        quality: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("course_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = ClientConfig::builder()
        .subdomain(&cli.subdomain)
        .timeout(Duration::from_millis(cli.timeout_ms))
        .max_concurrency(cli.concurrency);
    if let Some(base_url) = cli.base_url {
        builder = builder.base_url(base_url);
    }
    if let Some(token) = cli.token {
        builder = builder.access_token(token);
    }
    let client = CourseClient::new(builder.build()).context("failed to create client")?;

    match cli.command {
        Commands::Profile => print_json(&client.fetch_profile().await?),
        Commands::Courses { page_size, subscriber } => {
            print_json(&client.fetch_courses(page_size, subscriber).await?)
        }
        Commands::Search { keyword, page_size, subscriber } => print_json(
            &client
                .fetch_search_courses(&keyword, page_size, subscriber)
                .await?,
        ),
        Commands::Content { course_id, content_type } => {
            match client.fetch_course_content(course_id, content_type).await? {
                Some(content) => print_json(&content),
                None => {
                    eprintln!("Course {} has no content", course_id);
                    Ok(())
                }
            }
        }
        Commands::Lecture { course_id, lecture_id, quality } => {
            let lecture = client
                .fetch_lecture(course_id, lecture_id, LectureOptions::full())
                .await?;
            let mut item = CurriculumItem::from(lecture);
            item.id = lecture_id;
            client.prepare_stream_source(course_id, &mut item).await?;

            let preference = quality.map_or(QualityPreference::Highest, QualityPreference::Exact);
            let selected = item
                .asset
                .as_ref()
                .and_then(|asset| asset.streams.as_ref())
                .and_then(|streams| streams.select(preference));
            match selected {
                Some((label, source)) => println!("{}\t{}\t{}", label, source.mime_type, source.url),
                None => print_json(&item)?,
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
