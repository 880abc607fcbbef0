// Funding platform models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "platform_category", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlatformCategory {
    Ads,
    Surveys,
    #[sqlx(rename = "P2P_LENDING")]
    #[serde(rename = "P2P_LENDING")]
    P2pLending,
    Crowdfunding,
    Staking,
    Other,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Platform {
    pub id: Uuid,
    pub name: String,
    pub category: PlatformCategory,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub min_investment: i64,
    pub expected_return_pct: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PlatformQuery {
    pub category: Option<PlatformCategory>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlatformRequest {
    pub name: String,
    pub category: PlatformCategory,
    pub description: Option<String>,
    pub website_url: Option<String>,
    #[serde(default)]
    pub min_investment: i64,
    pub expected_return_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlatformRequest {
    pub name: Option<String>,
    pub category: Option<PlatformCategory>,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub min_investment: Option<i64>,
    pub expected_return_pct: Option<f64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "connection_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlatformConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform_id: Uuid,
    pub external_account_id: String,
    pub status: ConnectionStatus,
    pub connected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectPlatformRequest {
    pub external_account_id: String,
}
