//! HTTP client for the reelsync media server API.
//!
//! Implements the [`ActivitySink`] and [`ResumeLookup`] seams of
//! `reelsync-playback` on top of the server's versioned REST API. Activity
//! writes retry with exponential backoff; reads fail fast so a missing
//! resume record never delays playback.

use anyhow::Result;
use async_trait::async_trait;
use reelsync_model::{ItemID, ProgressUpdate, RawStream, ResumeInfo};
use reelsync_playback::traits::{ActivitySink, ResumeLookup};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Standard envelope around every JSON API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
}

/// Errors raised while talking to the server
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("empty response from server")]
    EmptyResponse,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Delay before the given retry attempt (1-based): 2s, 4s, 8s, ...
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_mul(1 << (attempt - 1)))
}

/// Client for the reelsync server with bearer-token authentication
#[derive(Clone, Debug)]
pub struct ReelsyncClient {
    client: Client,
    base_url: String,
    api_version: String,
    max_retries: u32,
    token_store: Arc<RwLock<Option<String>>>,
}

impl ReelsyncClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            // In development, don't follow redirects to avoid HTTP->HTTPS issues
            .redirect(if cfg!(debug_assertions) {
                reqwest::redirect::Policy::none()
            } else {
                reqwest::redirect::Policy::default()
            })
            .build()
            .unwrap_or_else(|_| Client::new());

        let base_url = base_url.into();
        log::info!("[Client] Created client for {}", base_url);
        Self {
            client,
            base_url,
            api_version: "v1".to_string(),
            max_retries: 3,
            token_store: Arc::new(RwLock::new(None)),
        }
    }

    /// Retry budget for activity writes; reads never retry
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Build a versioned API URL
    pub fn build_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!(
            "{}/api/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_version,
            path
        )
    }

    /// Set the bearer token used on subsequent requests
    pub async fn set_token(&self, token: Option<String>) {
        *self.token_store.write().await = token;
    }

    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        if let Some(token) = self.token_store.read().await.as_ref() {
            builder.header("Authorization", format!("Bearer {token}"))
        } else {
            builder
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {
                let envelope: ApiResponse<T> = response.json().await?;
                envelope.data.ok_or(ClientError::EmptyResponse)
            }
            StatusCode::UNAUTHORIZED => {
                // Token expired; clear it so the host can re-authenticate
                self.set_token(None).await;
                Err(ClientError::Unauthorized)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Status { status, body })
            }
        }
    }

    async fn execute_no_content(&self, request: RequestBuilder) -> Result<(), ClientError> {
        let response = request.send().await?;
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::UNAUTHORIZED => {
                self.set_token(None).await;
                Err(ClientError::Unauthorized)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Status { status, body })
            }
        }
    }

    /// POST with a JSON body and no expected response body, retrying with
    /// exponential backoff (2s, 4s, 8s) up to the configured budget
    async fn post_no_content_with_retry<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let url = self.build_url(path);
        let mut attempt = 0;
        loop {
            let request = self.authorize(self.client.post(&url).json(body)).await;
            match self.execute_no_content(request).await {
                Ok(()) => return Ok(()),
                // Retrying with the same token cannot succeed
                Err(err @ ClientError::Unauthorized) => return Err(err.into()),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(anyhow::Error::new(err).context(format!(
                            "POST {path} failed after {} retries",
                            self.max_retries
                        )));
                    }
                    let delay = retry_delay(attempt);
                    log::warn!(
                        "[Client] POST {} failed, retrying ({}/{}) in {}s: {}",
                        path,
                        attempt,
                        self.max_retries,
                        delay.as_secs(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Stream list for an item, in server-preference order
    pub async fn streams(&self, item_id: ItemID) -> Result<Vec<RawStream>, ClientError> {
        let url = self.build_url(&format!("items/{item_id}/streams"));
        log::debug!("[Client] GET {}", url);
        let request = self.authorize(self.client.get(&url)).await;
        self.execute(request).await
    }
}

#[async_trait]
impl ActivitySink for ReelsyncClient {
    async fn save(&self, update: ProgressUpdate) -> Result<()> {
        log::debug!(
            "[Client] Saving progress for {}: resume {:.2}s, delta {:.2}s",
            update.item_id,
            update.resume_position,
            update.played_delta
        );
        self.post_no_content_with_retry("activity/progress", &update)
            .await
    }

    async fn play_counted(&self, item_id: Uuid) -> Result<()> {
        log::info!("[Client] Marking play counted for {}", item_id);
        self.post_no_content_with_retry(&format!("items/{item_id}/played"), &serde_json::json!({}))
            .await
    }
}

#[async_trait]
impl ResumeLookup for ReelsyncClient {
    async fn resume_info(&self, item_id: Uuid) -> Result<Option<ResumeInfo>> {
        let url = self.build_url(&format!("items/{item_id}/activity"));
        let request = self.authorize(self.client.get(&url)).await;
        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {
                let envelope: ApiResponse<ResumeInfo> = response.json().await?;
                Ok(envelope.data)
            }
            // Never watched: not an error
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => {
                self.set_token(None).await;
                Err(ClientError::Unauthorized.into())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Status { status, body }.into())
            }
        }
    }
}
