// In-app notifications and multicast push fan-out

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::{DbPool, NotificationRepo};
use crate::models::Notification;

/// Most tokens the multicast API accepts per request
pub const MULTICAST_BATCH_SIZE: usize = 500;

/// Provider errors meaning the token will never be deliverable again
const INVALID_TOKEN_ERRORS: &[&str] = &["NotRegistered", "InvalidRegistration"];

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push provider returned {status}: {body}")]
    Provider { status: u16, body: String },
}

#[derive(Serialize)]
struct MulticastRequest<'a> {
    registration_ids: &'a [String],
    notification: PushPayload<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
}

#[derive(Serialize)]
struct PushPayload<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct MulticastResponse {
    #[serde(default)]
    results: Vec<TokenResult>,
}

#[derive(Debug, Deserialize)]
struct TokenResult {
    message_id: Option<String>,
    error: Option<String>,
}

/// Outcome of one fan-out across all batches
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub sent: usize,
    pub failed: usize,
    pub invalid_tokens: Vec<String>,
}

impl PushReport {
    fn absorb(&mut self, batch: &[String], response: MulticastResponse) {
        for (token, result) in batch.iter().zip(response.results) {
            match (result.message_id, result.error) {
                (Some(_), _) => self.sent += 1,
                (None, Some(err)) => {
                    self.failed += 1;
                    if INVALID_TOKEN_ERRORS.contains(&err.as_str()) {
                        self.invalid_tokens.push(token.clone());
                    } else {
                        warn!("Push to token {}… failed: {}", token_prefix(token), err);
                    }
                }
                (None, None) => self.failed += 1,
            }
        }
    }
}

fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

#[derive(Debug, Clone)]
pub struct PushClient {
    http: HttpClient,
    server_key: String,
    api_url: String,
}

impl PushClient {
    /// Each multicast request is abandoned after `timeout`
    pub fn new(server_key: String, api_url: String, timeout: Duration) -> reqwest::Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            server_key,
            api_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.server_key.is_empty()
    }

    /// Send to every token, `MULTICAST_BATCH_SIZE` at a time. A failed batch
    /// is logged and counted; the remaining batches still go out.
    pub async fn send_multicast(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: Option<&Value>,
    ) -> PushReport {
        let mut report = PushReport::default();
        if tokens.is_empty() {
            return report;
        }

        if !self.is_configured() {
            info!(
                "Push not configured, skipping delivery of \"{}\" to {} device(s)",
                title,
                tokens.len()
            );
            return report;
        }

        for batch in tokens.chunks(MULTICAST_BATCH_SIZE) {
            match self.send_batch(batch, title, body, data).await {
                Ok(response) => report.absorb(batch, response),
                Err(e) => {
                    error!("Multicast batch of {} tokens failed: {}", batch.len(), e);
                    report.failed += batch.len();
                }
            }
        }

        info!(
            "Push \"{}\": {} sent, {} failed, {} invalid token(s)",
            title,
            report.sent,
            report.failed,
            report.invalid_tokens.len()
        );
        report
    }

    async fn send_batch(
        &self,
        batch: &[String],
        title: &str,
        body: &str,
        data: Option<&Value>,
    ) -> Result<MulticastResponse, PushError> {
        let request = MulticastRequest {
            registration_ids: batch,
            notification: PushPayload { title, body },
            data,
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("key={}", self.server_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Provider { status, body });
        }

        Ok(response.json().await?)
    }
}

/// Store an in-app notification for one user and push it to their devices in
/// the background. Push problems are logged and never reach the caller.
pub async fn notify_user(
    pool: &DbPool,
    push: &PushClient,
    user_id: Uuid,
    title: &str,
    body: &str,
    kind: &str,
) -> sqlx::Result<Notification> {
    let notification = NotificationRepo::insert(pool, user_id, title, body, kind).await?;

    let pool = pool.clone();
    let push = push.clone();
    let (title, body) = (title.to_string(), body.to_string());
    let data = serde_json::json!({ "notification_id": notification.id, "kind": kind });
    tokio::spawn(async move {
        match NotificationRepo::device_tokens(&pool, user_id).await {
            Ok(tokens) => {
                let report = push.send_multicast(&tokens, &title, &body, Some(&data)).await;
                prune(&pool, &report).await;
            }
            Err(e) => error!("Failed to load device tokens for user {}: {}", user_id, e),
        }
    });

    Ok(notification)
}

/// In-app notification for every user plus a push to every registered device
pub async fn broadcast(
    pool: &DbPool,
    push: &PushClient,
    title: &str,
    body: &str,
) -> sqlx::Result<u64> {
    let stored = NotificationRepo::insert_for_all(pool, title, body, "broadcast").await?;
    let tokens = NotificationRepo::all_device_tokens(pool).await?;

    let pool = pool.clone();
    let push = push.clone();
    let (title, body) = (title.to_string(), body.to_string());
    tokio::spawn(async move {
        let report = push.send_multicast(&tokens, &title, &body, None).await;
        prune(&pool, &report).await;
    });

    Ok(stored)
}

async fn prune(pool: &DbPool, report: &PushReport) {
    if report.invalid_tokens.is_empty() {
        return;
    }
    match NotificationRepo::prune_devices(pool, &report.invalid_tokens).await {
        Ok(removed) => info!("Removed {} unregistered device token(s)", removed),
        Err(e) => error!("Failed to prune device tokens: {}", e),
    }
}
