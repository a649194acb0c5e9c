// src/publish/bluesky.rs
//! Bluesky publisher over plain AT Protocol XRPC calls:
//! `createSession` → `uploadBlob` (when there is an image) → `createRecord`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use super::{FormattedPost, Publisher};
use crate::config::BlueskySettings;
use crate::imaging::sniff_mime;
use crate::sources::fetch::USER_AGENT;

const POST_COLLECTION: &str = "app.bsky.feed.post";
const IMAGES_EMBED: &str = "app.bsky.embed.images";

#[derive(Clone)]
pub struct BlueskyPublisher {
    settings: BlueskySettings,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Deserialize)]
struct UploadBlobResponse {
    blob: Value,
}

#[derive(Serialize)]
struct CreateRecord<'a> {
    repo: &'a str,
    collection: &'a str,
    record: PostRecord<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostRecord<'a> {
    #[serde(rename = "$type")]
    kind: &'a str,
    text: &'a str,
    created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    embed: Option<ImagesEmbed<'a>>,
}

#[derive(Serialize)]
struct ImagesEmbed<'a> {
    #[serde(rename = "$type")]
    kind: &'a str,
    images: Vec<EmbeddedImage<'a>>,
}

#[derive(Serialize)]
struct EmbeddedImage<'a> {
    alt: &'a str,
    image: Value,
}

impl BlueskyPublisher {
    pub fn new(settings: BlueskySettings, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .context("building bluesky http client")?;
        Ok(Self { settings, client })
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{method}", self.settings.pds_url.trim_end_matches('/'))
    }

    async fn login(&self, handle: &str, password: &str) -> Result<Session> {
        info!(handle, "logging into bluesky");
        let rsp = self
            .client
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&SessionRequest {
                identifier: handle,
                password,
            })
            .send()
            .await
            .context("bluesky createSession request")?
            .error_for_status()
            .map_err(|e| anyhow!("bluesky login rejected: {e}"))?;
        rsp.json().await.context("parsing bluesky session")
    }

    async fn upload_blob(&self, session: &Session, bytes: &[u8]) -> Result<Value> {
        let rsp = self
            .client
            .post(self.xrpc("com.atproto.repo.uploadBlob"))
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, sniff_mime(bytes))
            .body(bytes.to_vec())
            .send()
            .await
            .context("bluesky uploadBlob request")?
            .error_for_status()
            .map_err(|e| anyhow!("bluesky blob upload rejected: {e}"))?;
        let body: UploadBlobResponse = rsp.json().await.context("parsing uploadBlob response")?;
        Ok(body.blob)
    }
}

#[async_trait]
impl Publisher for BlueskyPublisher {
    async fn publish(&self, post: &FormattedPost) -> Result<()> {
        let (handle, password) = match (&self.settings.handle, &self.settings.app_password) {
            (Some(h), Some(p)) => (h.as_str(), p.as_str()),
            _ => return Err(anyhow!("missing Bluesky credentials (BSKY_HANDLE / BSKY_APP_PASSWORD)")),
        };

        let session = self.login(handle, password).await?;

        let embed = match &post.image_bytes {
            Some(bytes) => {
                info!(size = bytes.len(), "uploading image blob");
                let blob = self.upload_blob(&session, bytes).await?;
                Some(ImagesEmbed {
                    kind: IMAGES_EMBED,
                    images: vec![EmbeddedImage {
                        alt: &post.alt_text,
                        image: blob,
                    }],
                })
            }
            None => None,
        };

        let req = CreateRecord {
            repo: &session.did,
            collection: POST_COLLECTION,
            record: PostRecord {
                kind: POST_COLLECTION,
                text: &post.text,
                created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                embed,
            },
        };

        info!("creating bluesky post");
        self.client
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&req)
            .send()
            .await
            .context("bluesky createRecord request")?
            .error_for_status()
            .map_err(|e| anyhow!("bluesky post rejected: {e}"))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "bluesky"
    }
}
