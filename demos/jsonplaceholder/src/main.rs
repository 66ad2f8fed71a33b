//! JSONPlaceholder demo.
//!
//! Declares a small client for <https://jsonplaceholder.typicode.com>, with
//! one rate-limited route, and calls it.

#![allow(missing_docs)]
#![allow(clippy::print_stdout)]
#![allow(dead_code)]

use std::time::Duration;

use courier::prelude::*;
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Data Types
// ============================================================================

/// A JSONPlaceholder user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub email: String,
}

/// A post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub id: u64,
    pub title: String,
    pub body: String,
}

/// Payload for a new post.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost<'a> {
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub title: &'a str,
    pub body: &'a str,
}

// ============================================================================
// Declared API
// ============================================================================

#[courier(base_url = "https://jsonplaceholder.typicode.com", timeout = 10)]
pub trait JsonPlaceholder {
    /// Fetch one user.
    #[get("users/{user_id}")]
    #[rate_limit(max_calls = 2, interval = 1)]
    async fn get_user(&self, user_id: u64) -> courier::Result<User>;

    /// Posts of a user, optionally limited.
    #[get("posts")]
    async fn posts(
        &self,
        #[query("userId")] user_id: u64,
        #[query("_limit")] limit: Option<u32>,
    ) -> courier::Result<Vec<Post>>;

    /// Create a post; the service echoes it back with an id.
    #[post("posts")]
    async fn create_post(&self, #[body] post: &NewPost<'_>) -> courier::Result<Map<String, Value>>;

    /// Rename a post.
    #[patch("posts/{post_id}", timeout = 5)]
    async fn rename(&self, post_id: u64, #[field] title: &str) -> courier::Result<Post>;

    /// Delete a post.
    #[delete("posts/{post_id}")]
    async fn delete_post(&self, post_id: u64) -> courier::Result<()>;
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> courier::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let http = HyperClient::builder()
        .with_logging()
        .with_retry(2)
        .build();
    let api = JsonPlaceholderClient::builder()
        .default_header("Accept", "application/json")
        .timeout(Duration::from_secs(15))
        .build_with(http)?;

    // the third call waits for the rate limit to refill
    for user_id in 1..=3 {
        let user = api.get_user(user_id).await?;
        info!(id = user.id, name = %user.name, "fetched user");
    }

    let posts = api.posts(1, Some(3)).await?;
    println!("user 1 has posts: {:?}", posts.iter().map(|p| &p.title).collect::<Vec<_>>());

    let created = api
        .create_post(&NewPost {
            user_id: 1,
            title: "courier",
            body: "declarative HTTP for Rust",
        })
        .await?;
    println!("created post: {}", Value::Object(created));

    let renamed = api.rename(1, "renamed").await?;
    println!("renamed post {} to {:?}", renamed.id, renamed.title);

    api.delete_post(1).await?;
    println!("deleted post 1");

    Ok(())
}

// ============================================================================
// Tests using wiremock
// ============================================================================
