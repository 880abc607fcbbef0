// Portfolio advice: chat completion provider with a rule-based fallback

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::analytics::{platform_breakdown, roi_pct, PlatformStats};
use super::ledger::{self, Balance};
use crate::database::{AnalyticsRepo, DbPool, FundingPerformance};
use crate::models::{AdviceSource, FundingStatus};

/// Share of open capital on one platform above which we suggest diversifying
const CONCENTRATION_LIMIT_PCT: f64 = 60.0;

const DISCLAIMER: &str = "This is general information, not personalised financial advice.";

#[derive(Debug, Error)]
pub enum AdviceError {
    #[error("advice provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("advice provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("advice provider returned no answer")]
    EmptyResponse,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// What the advisor knows about the user's money
#[derive(Debug, Clone, Default)]
pub struct PortfolioContext {
    pub balance: Balance,
    pub open_invested: i64,
    pub paused_fundings: usize,
    pub platforms: Vec<PlatformStats>,
    open_by_platform: Vec<(String, i64)>,
}

impl PortfolioContext {
    pub fn new(balance: Balance, rows: &[FundingPerformance]) -> Self {
        let mut open_by_platform: Vec<(String, i64)> = Vec::new();
        let mut open_invested = 0;
        let mut paused_fundings = 0;

        for row in rows.iter().filter(|r| !r.status.is_terminal()) {
            open_invested += row.amount;
            if row.status == FundingStatus::Paused {
                paused_fundings += 1;
            }
            match open_by_platform.iter_mut().find(|(name, _)| *name == row.platform_name) {
                Some((_, amount)) => *amount += row.amount,
                None => open_by_platform.push((row.platform_name.clone(), row.amount)),
            }
        }
        open_by_platform.sort_by(|a, b| b.1.cmp(&a.1));

        Self {
            balance,
            open_invested,
            paused_fundings,
            platforms: platform_breakdown(rows),
            open_by_platform,
        }
    }

    /// Largest single-platform share of open capital, as a percentage
    pub fn top_concentration(&self) -> Option<(&str, f64)> {
        let (name, amount) = self.open_by_platform.first()?;
        if self.open_invested == 0 {
            return None;
        }
        Some((name.as_str(), *amount as f64 / self.open_invested as f64 * 100.0))
    }

    fn describe(&self) -> String {
        let mut lines = vec![
            format!("Open invested amount: {}", self.open_invested),
            format!("Total profit: {}", self.balance.total_profit),
            format!("Withdrawn: {}", self.balance.completed_withdrawals),
            format!("Pending withdrawals: {}", self.balance.pending_withdrawals),
            format!("Available balance: {}", self.balance.available),
        ];
        for p in &self.platforms {
            lines.push(format!(
                "Platform {}: invested {}, profit {}, fundings {}, ROI {:.2}%",
                p.platform_name, p.invested, p.profit, p.fundings, p.roi_pct
            ));
        }
        lines.join("\n")
    }
}

/// Deterministic advice from the portfolio shape and question keywords
pub fn rule_based_advice(question: &str, ctx: &PortfolioContext) -> String {
    let question = question.to_lowercase();
    let mut points = Vec::new();

    if ctx.platforms.is_empty() {
        points.push(
            "You have no fundings yet. Start with a small amount on one or two platforms \
             and compare their returns before committing more."
                .to_string(),
        );
    } else {
        let invested: i64 = ctx.platforms.iter().map(|p| p.invested).sum();
        let profit: i64 = ctx.platforms.iter().map(|p| p.profit).sum();
        points.push(format!(
            "Across {} platform(s) your overall return is {:.2}%.",
            ctx.platforms.len(),
            roi_pct(profit, invested)
        ));

        if let Some(best) = ctx.platforms.iter().filter(|p| p.invested > 0).max_by(|a, b| {
            a.roi_pct
                .partial_cmp(&b.roi_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) {
            points.push(format!(
                "{} is your best performer at {:.2}% ROI.",
                best.platform_name, best.roi_pct
            ));
        }
    }

    if let Some((name, share)) = ctx.top_concentration() {
        if share > CONCENTRATION_LIMIT_PCT {
            points.push(format!(
                "{:.0}% of your open capital sits on {}. Spreading it across more platforms \
                 lowers the impact of any single one failing.",
                share, name
            ));
        }
    }

    if ctx.paused_fundings > 0 {
        points.push(format!(
            "You have {} paused funding(s). Resume or close them so the capital is working.",
            ctx.paused_fundings
        ));
    }

    if question.contains("withdraw") || question.contains("cash out") {
        if ctx.balance.available > 0 {
            points.push(format!(
                "You can withdraw up to {} right now. Withdrawals settle shortly after the request.",
                ctx.balance.available
            ));
        } else {
            points.push(
                "You have no available balance to withdraw yet. Profit becomes withdrawable \
                 once it is recorded as completed."
                    .to_string(),
            );
        }
    } else if ctx.balance.available > 0 {
        points.push(format!(
            "{} of profit is available. Consider reinvesting part of it or withdrawing it.",
            ctx.balance.available
        ));
    }

    if question.contains("risk") || question.contains("safe") {
        points.push(
            "Platforms like P2P lending and staking can return more but carry default and \
             lock-up risk. Only invest what you can leave untouched."
                .to_string(),
        );
    }

    points.push(DISCLAIMER.to_string());
    points.join(" ")
}

#[derive(Debug, Clone)]
pub struct Advisor {
    http: HttpClient,
    api_key: String,
    model: String,
    api_url: String,
}

impl Advisor {
    /// A provider slower than `timeout` counts as failed and the rules answer
    pub fn new(
        api_key: String,
        model: String,
        api_url: String,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            model,
            api_url,
        })
    }

    /// Ask the provider, falling back to the rules when it is unavailable
    pub async fn advise(&self, question: &str, ctx: &PortfolioContext) -> (String, AdviceSource) {
        if !self.api_key.is_empty() {
            match self.ask_provider(question, ctx).await {
                Ok(answer) => return (answer, AdviceSource::Ai),
                Err(e) => error!("Advice provider failed: {}", e),
            }
        }

        warn!("Using rule-based advice (no provider available)");
        (rule_based_advice(question, ctx), AdviceSource::Rules)
    }

    async fn ask_provider(
        &self,
        question: &str,
        ctx: &PortfolioContext,
    ) -> Result<String, AdviceError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: format!(
                        "You are a careful assistant for a personal funding platform. Answer in \
                         at most five sentences using the user's portfolio below. Amounts are in \
                         minor currency units. End with: \"{}\"\n\n{}",
                        DISCLAIMER,
                        ctx.describe()
                    ),
                },
                ChatMessage {
                    role: "user",
                    content: question.to_string(),
                },
            ],
            temperature: 0.3,
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdviceError::Provider { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AdviceError::EmptyResponse)?;

        info!("Advice provider answered ({} chars)", answer.len());
        Ok(answer)
    }
}

pub async fn portfolio_context(pool: &DbPool, user_id: Uuid) -> sqlx::Result<PortfolioContext> {
    let rows = AnalyticsRepo::funding_performance(pool, user_id).await?;
    let balance = ledger::balance(pool, user_id).await?;
    Ok(PortfolioContext::new(balance, &rows))
}
