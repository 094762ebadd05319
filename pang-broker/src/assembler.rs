//! Builds the next outbound user message, inlining a pending image.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pang_common::util::log_preview;
use pang_common::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use crate::session::{Connection, Message};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Assembles user messages for a connection.
#[derive(Debug, Clone)]
pub struct MessageAssembler {
    client: reqwest::Client,
}

impl MessageAssembler {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(client)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build the user message for `prompt`.
    ///
    /// The connection's pending image is consumed before anything else
    /// happens, whether or not one was set. When it was set, the image is
    /// fetched and inlined as a data URL; a failed fetch degrades to a
    /// text-only message and is only logged.
    pub async fn assemble(&self, connection: &Connection, prompt: &str) -> Message {
        let Some(image_url) = connection.take_pending_image().await else {
            return Message::user(prompt);
        };

        match self.fetch_data_url(&image_url).await {
            Ok(data_url) => Message::user_with_image(prompt, data_url),
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection.id(),
                    image_url = %log_preview(&image_url),
                    error = %e,
                    "Image fetch failed, sending text only"
                );
                Message::user(prompt)
            }
        }
    }

    /// Fetch `url` and encode it as `data:<type>;base64,<payload>`.
    pub async fn fetch_data_url(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::External(format!("Image request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::External(format!("Image fetch failed: {}", status.as_u16())));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::External(format!("Image body read failed: {}", e)))?;

        Ok(format!("data:{};base64,{}", content_type, STANDARD.encode(&bytes)))
    }
}
