// src/publish/mod.rs
pub mod bluesky;

use anyhow::Result;
use async_trait::async_trait;

/// Final post: caption text within the platform ceiling, optional image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPost {
    pub text: String,
    pub image_bytes: Option<Vec<u8>>,
    pub alt_text: String,
}

/// The social network side. Any error means the post did not go out.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, post: &FormattedPost) -> Result<()>;
    fn name(&self) -> &'static str;
}
