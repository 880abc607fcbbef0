// Report aggregation. Rows come from the database and are grouped here.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::ledger::{self, Balance};
use crate::database::{
    AnalyticsRepo, DbPool, FundingPerformance, FundingRepo, StatusCount, TransactionRepo,
    TypeVolume, UserCounts,
};
use crate::models::{Funding, FundingStatus, Transaction, TransactionType};

const DEFAULT_DAYS: i64 = 30;
const MAX_DAYS: i64 = 365;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub active: i64,
    pub paused: i64,
    pub completed: i64,
    pub cancelled: i64,
}

impl StatusCounts {
    fn add(&mut self, status: FundingStatus, n: i64) {
        match status {
            FundingStatus::Active => self.active += n,
            FundingStatus::Paused => self.paused += n,
            FundingStatus::Completed => self.completed += n,
            FundingStatus::Cancelled => self.cancelled += n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub total_invested: i64,
    pub total_profit: i64,
    pub total_withdrawn: i64,
    pub pending_withdrawals: i64,
    pub available_balance: i64,
    pub fundings: StatusCounts,
}

/// Invested capital is the amount held in ACTIVE or PAUSED fundings.
pub fn overview(fundings: &[Funding], balance: &Balance) -> Overview {
    let mut counts = StatusCounts::default();
    let mut invested = 0;
    for funding in fundings {
        counts.add(funding.status, 1);
        if !funding.status.is_terminal() {
            invested += funding.amount;
        }
    }

    Overview {
        total_invested: invested,
        total_profit: balance.total_profit,
        total_withdrawn: balance.completed_withdrawals,
        pending_withdrawals: balance.pending_withdrawals,
        available_balance: balance.available,
        fundings: counts,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// First day of the bucket containing `at`. Weeks start on Monday.
    pub fn bucket_start(self, at: DateTime<Utc>) -> NaiveDate {
        let day = at.date_naive();
        match self {
            Period::Daily => day,
            Period::Weekly => day - Duration::days(i64::from(day.weekday().num_days_from_monday())),
            Period::Monthly => day.with_day(1).unwrap_or(day),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfitQuery {
    pub period: Option<Period>,
    pub days: Option<i64>,
}

impl ProfitQuery {
    pub fn period(&self) -> Period {
        self.period.unwrap_or_default()
    }

    pub fn days(&self) -> i64 {
        self.days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfitBucket {
    pub period_start: NaiveDate,
    pub total: i64,
    pub count: usize,
}

pub fn profit_series(profits: &[Transaction], period: Period) -> Vec<ProfitBucket> {
    let mut buckets: BTreeMap<NaiveDate, (i64, usize)> = BTreeMap::new();
    for tx in profits.iter().filter(|t| t.tx_type == TransactionType::Profit) {
        let entry = buckets.entry(period.bucket_start(tx.created_at)).or_default();
        entry.0 += tx.amount;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(period_start, (total, count))| ProfitBucket {
            period_start,
            total,
            count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformStats {
    pub platform_id: Uuid,
    pub platform_name: String,
    pub invested: i64,
    pub profit: i64,
    pub fundings: usize,
    pub roi_pct: f64,
}

pub fn roi_pct(profit: i64, invested: i64) -> f64 {
    if invested <= 0 {
        return 0.0;
    }
    let pct = profit as f64 / invested as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Per-platform totals, largest first. Profit and funding counts cover every
/// funding the user has held; invested follows [`overview`] and only counts
/// ACTIVE or PAUSED amounts.
pub fn platform_breakdown(rows: &[FundingPerformance]) -> Vec<PlatformStats> {
    let mut by_platform: HashMap<Uuid, PlatformStats> = HashMap::new();
    for row in rows {
        let stats = by_platform
            .entry(row.platform_id)
            .or_insert_with(|| PlatformStats {
                platform_id: row.platform_id,
                platform_name: row.platform_name.clone(),
                invested: 0,
                profit: 0,
                fundings: 0,
                roi_pct: 0.0,
            });
        if !row.status.is_terminal() {
            stats.invested += row.amount;
        }
        stats.profit += row.profit;
        stats.fundings += 1;
    }

    let mut stats: Vec<PlatformStats> = by_platform
        .into_values()
        .map(|mut s| {
            s.roi_pct = roi_pct(s.profit, s.invested);
            s
        })
        .collect();
    stats.sort_by(|a, b| {
        b.invested
            .cmp(&a.invested)
            .then_with(|| a.platform_name.cmp(&b.platform_name))
    });
    stats
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeEntry {
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub count: i64,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminReport {
    pub total_users: i64,
    pub verified_users: i64,
    pub fundings: StatusCounts,
    pub completed_volume: Vec<VolumeEntry>,
    pub active_subscriptions: i64,
}

pub fn admin_report(
    users: UserCounts,
    statuses: &[StatusCount],
    volumes: &[TypeVolume],
    active_subscriptions: i64,
) -> AdminReport {
    let mut fundings = StatusCounts::default();
    for row in statuses {
        fundings.add(row.status, row.count);
    }

    let mut completed_volume: Vec<VolumeEntry> = volumes
        .iter()
        .map(|v| VolumeEntry {
            tx_type: v.tx_type,
            count: v.count,
            volume: v.volume,
        })
        .collect();
    completed_volume.sort_by(|a, b| b.volume.cmp(&a.volume));

    AdminReport {
        total_users: users.total,
        verified_users: users.verified,
        fundings,
        completed_volume,
        active_subscriptions,
    }
}

pub async fn user_overview(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Overview> {
    let fundings = FundingRepo::all_for_user(pool, user_id).await?;
    let balance = ledger::balance(pool, user_id).await?;
    Ok(overview(&fundings, &balance))
}

pub async fn user_profit(
    pool: &DbPool,
    user_id: Uuid,
    query: &ProfitQuery,
) -> sqlx::Result<Vec<ProfitBucket>> {
    let period = query.period();
    let since = Utc::now() - Duration::days(query.days());
    let profits = TransactionRepo::profits_since(pool, user_id, since).await?;
    Ok(profit_series(&profits, period))
}

pub async fn user_platforms(pool: &DbPool, user_id: Uuid) -> sqlx::Result<Vec<PlatformStats>> {
    let rows = AnalyticsRepo::funding_performance(pool, user_id).await?;
    Ok(platform_breakdown(&rows))
}

pub async fn platform_report(pool: &DbPool) -> sqlx::Result<AdminReport> {
    let users = AnalyticsRepo::user_counts(pool).await?;
    let statuses = AnalyticsRepo::fundings_by_status(pool).await?;
    let volumes = AnalyticsRepo::completed_volume_by_type(pool).await?;
    let active = AnalyticsRepo::active_subscriptions(pool).await?;
    Ok(admin_report(users, &statuses, &volumes, active))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionStatus;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn funding(amount: i64, status: FundingStatus) -> Funding {
        let now = Utc::now();
        Funding {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            platform_id: Uuid::new_v4(),
            amount,
            profit_share: 50,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    fn profit(amount: i64, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tx_type: TransactionType::Profit,
            status: TransactionStatus::Completed,
            amount,
            funding_id: None,
            bank_account_id: None,
            payment_method_id: None,
            reference: None,
            description: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn perf(platform_id: Uuid, name: &str, amount: i64, profit: i64) -> FundingPerformance {
        FundingPerformance {
            funding_id: Uuid::new_v4(),
            platform_id,
            platform_name: name.to_string(),
            amount,
            status: FundingStatus::Active,
            profit,
        }
    }

    #[test]
    fn overview_counts_only_open_fundings_as_invested() {
        let fundings = vec![
            funding(10_000, FundingStatus::Active),
            funding(5_000, FundingStatus::Paused),
            funding(7_000, FundingStatus::Completed),
            funding(1_000, FundingStatus::Cancelled),
        ];
        let balance = Balance {
            total_profit: 3_000,
            completed_withdrawals: 1_000,
            pending_withdrawals: 500,
            available: 1_500,
        };

        let report = overview(&fundings, &balance);
        assert_eq!(report.total_invested, 15_000);
        assert_eq!(report.total_profit, 3_000);
        assert_eq!(report.total_withdrawn, 1_000);
        assert_eq!(report.available_balance, 1_500);
        assert_eq!(
            report.fundings,
            StatusCounts {
                active: 1,
                paused: 1,
                completed: 1,
                cancelled: 1
            }
        );
    }

    #[test]
    fn bucket_boundaries() {
        // 2025-06-18 is a Wednesday
        let wednesday = at(2025, 6, 18);
        assert_eq!(Period::Daily.bucket_start(wednesday), date(2025, 6, 18));
        assert_eq!(Period::Weekly.bucket_start(wednesday), date(2025, 6, 16));
        assert_eq!(Period::Monthly.bucket_start(wednesday), date(2025, 6, 1));
        assert_eq!(Period::Weekly.bucket_start(at(2025, 6, 16)), date(2025, 6, 16));
    }

    #[test]
    fn profit_series_groups_and_sorts() {
        let profits = vec![
            profit(300, at(2025, 7, 2)),
            profit(100, at(2025, 6, 3)),
            profit(200, at(2025, 6, 28)),
        ];

        let monthly = profit_series(&profits, Period::Monthly);
        assert_eq!(
            monthly,
            vec![
                ProfitBucket {
                    period_start: date(2025, 6, 1),
                    total: 300,
                    count: 2
                },
                ProfitBucket {
                    period_start: date(2025, 7, 1),
                    total: 300,
                    count: 1
                },
            ]
        );

        let daily = profit_series(&profits, Period::Daily);
        assert_eq!(daily.len(), 3);
        assert!(daily.windows(2).all(|w| w[0].period_start < w[1].period_start));
    }

    #[test]
    fn profit_query_defaults_and_clamps() {
        let query = ProfitQuery::default();
        assert_eq!(query.period(), Period::Daily);
        assert_eq!(query.days(), 30);

        let query = ProfitQuery {
            period: Some(Period::Weekly),
            days: Some(10_000),
        };
        assert_eq!(query.days(), 365);
        assert_eq!(ProfitQuery { period: None, days: Some(0) }.days(), 1);
    }

    #[test]
    fn period_parses_lowercase() {
        let period: Period = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(period, Period::Monthly);
        assert!(serde_json::from_str::<Period>("\"yearly\"").is_err());
    }

    #[test]
    fn roi_handles_zero_investment() {
        assert_eq!(roi_pct(500, 0), 0.0);
        assert_eq!(roi_pct(500, 10_000), 5.0);
        assert_eq!(roi_pct(1, 3), 33.33);
    }

    #[test]
    fn breakdown_merges_fundings_per_platform() {
        let ads = Uuid::new_v4();
        let p2p = Uuid::new_v4();
        let rows = vec![
            perf(ads, "AdNet", 1_000, 50),
            perf(p2p, "LendCo", 20_000, 1_000),
            perf(ads, "AdNet", 3_000, 150),
        ];

        let stats = platform_breakdown(&rows);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].platform_name, "LendCo");
        assert_eq!(stats[0].roi_pct, 5.0);
        assert_eq!(stats[1].invested, 4_000);
        assert_eq!(stats[1].profit, 200);
        assert_eq!(stats[1].fundings, 2);
        assert_eq!(stats[1].roi_pct, 5.0);
    }

    #[test]
    fn breakdown_invested_agrees_with_overview() {
        let ads = Uuid::new_v4();
        let mut closed = perf(ads, "AdNet", 7_000, 700);
        closed.status = FundingStatus::Completed;
        let mut paused = perf(ads, "AdNet", 5_000, 0);
        paused.status = FundingStatus::Paused;
        let rows = vec![perf(ads, "AdNet", 10_000, 300), paused, closed];

        let stats = platform_breakdown(&rows);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].invested, 15_000);
        assert_eq!(stats[0].profit, 1_000);
        assert_eq!(stats[0].fundings, 3);

        let fundings = vec![
            funding(10_000, FundingStatus::Active),
            funding(5_000, FundingStatus::Paused),
            funding(7_000, FundingStatus::Completed),
        ];
        let report = overview(&fundings, &Balance::default());
        let per_platform: i64 = stats.iter().map(|s| s.invested).sum();
        assert_eq!(per_platform, report.total_invested);
    }

    #[test]
    fn admin_report_shapes_rows() {
        let report = admin_report(
            UserCounts {
                total: 10,
                verified: 4,
            },
            &[
                StatusCount {
                    status: FundingStatus::Active,
                    count: 6,
                },
                StatusCount {
                    status: FundingStatus::Cancelled,
                    count: 2,
                },
            ],
            &[
                TypeVolume {
                    tx_type: TransactionType::Deposit,
                    count: 8,
                    volume: 80_000,
                },
                TypeVolume {
                    tx_type: TransactionType::Profit,
                    count: 20,
                    volume: 90_000,
                },
            ],
            3,
        );

        assert_eq!(report.total_users, 10);
        assert_eq!(report.fundings.active, 6);
        assert_eq!(report.fundings.cancelled, 2);
        assert_eq!(report.completed_volume[0].tx_type, TransactionType::Profit);
        assert_eq!(report.active_subscriptions, 3);
    }
}
