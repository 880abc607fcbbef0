// Funding (investment position) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "funding_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundingStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl FundingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FundingStatus::Completed | FundingStatus::Cancelled)
    }

    /// Allowed moves: ACTIVE <-> PAUSED, and any open state to a terminal one.
    pub fn can_transition_to(self, next: FundingStatus) -> bool {
        use FundingStatus::*;
        match (self, next) {
            (Active, Paused) | (Paused, Active) => true,
            (Active | Paused, Completed | Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FundingStatus::Active => "ACTIVE",
            FundingStatus::Paused => "PAUSED",
            FundingStatus::Completed => "COMPLETED",
            FundingStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Funding {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform_id: Uuid,
    pub amount: i64,
    pub profit_share: i32,
    pub status: FundingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Funding {
    /// The user's cut of `gross` platform earnings, rounded down to the minor unit.
    pub fn profit_from(&self, gross: i64) -> i64 {
        gross * i64::from(self.profit_share) / 100
    }
}

#[derive(Debug, Deserialize)]
pub struct FundingQuery {
    pub status: Option<FundingStatus>,
    pub platform_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFundingRequest {
    pub platform_id: Uuid,
    pub amount: i64,
    pub profit_share: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFundingRequest {
    pub amount: Option<i64>,
    pub profit_share: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFundingStatusRequest {
    pub status: FundingStatus,
}

#[derive(Debug, Deserialize)]
pub struct RecordEarningsRequest {
    pub gross_amount: i64,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::FundingStatus::*;
    use super::*;

    #[test]
    fn pause_and_resume() {
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
    }

    #[test]
    fn open_states_can_close() {
        for from in [Active, Paused] {
            assert!(from.can_transition_to(Completed));
            assert!(from.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn terminal_states_are_final() {
        for from in [Completed, Cancelled] {
            assert!(from.is_terminal());
            for to in [Active, Paused, Completed, Cancelled] {
                assert!(!from.can_transition_to(to), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn self_transition_rejected() {
        assert!(!Active.can_transition_to(Active));
        assert!(!Paused.can_transition_to(Paused));
    }

    #[test]
    fn profit_share_rounds_down() {
        let now = Utc::now();
        let funding = Funding {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            platform_id: Uuid::new_v4(),
            amount: 50_000,
            profit_share: 33,
            status: Active,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(funding.profit_from(1_000), 330);
        assert_eq!(funding.profit_from(999), 329);
        assert_eq!(funding.profit_from(0), 0);
    }
}
