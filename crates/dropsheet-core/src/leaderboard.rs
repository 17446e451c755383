use std::collections::BTreeMap;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::info;

use crate::date_window::{days_inclusive, format_date, DateWindow};
use crate::error::{PipelineError, Result};
use crate::tables::{date_column, int_column, string_column};

const RANKING: &str = "top_wallets";
const ACTIVITY: &str = "wallet_activity";

/// Inclusive calendar window covered by the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl LeaderboardWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(PipelineError::Range(format!(
                "leaderboard window starts {start} after it ends {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// `[today - days_back, today - 1]`, the window the activity query is run for.
    pub fn trailing(window: &DateWindow, days_back: u32) -> Result<Self> {
        Self::new(window.date_days_ago(days_back)?, window.date_days_ago(1)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedWallet {
    pub wallet: String,
    pub token_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletActivity {
    pub wallet: String,
    pub date: Option<NaiveDate>,
    pub purchases: Option<i64>,
    pub sales: Option<i64>,
    pub mints: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub date: NaiveDate,
    pub wallet: String,
    pub token_count: i64,
    pub purchases: i64,
    pub sales: i64,
    pub mints: i64,
    pub net_trade_balance: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct DayActivity {
    purchases: i64,
    sales: i64,
    mints: i64,
}

impl DayActivity {
    fn net_trade_balance(&self) -> i64 {
        self.purchases + self.mints - self.sales
    }
}

#[derive(Debug, Default)]
struct WalletDays {
    token_count: Option<i64>,
    days: BTreeMap<NaiveDate, DayActivity>,
}

/// Reads the ranking query result (`wallet`, `token_count`, any further columns ignored).
pub fn read_ranking(df: &DataFrame) -> Result<Vec<RankedWallet>> {
    // Empty result sets may come back without any columns.
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    let wallets = string_column(df, RANKING, "wallet")?;
    let token_counts = int_column(df, RANKING, "token_count")?;

    wallets
        .into_iter()
        .zip(token_counts)
        .enumerate()
        .map(|(idx, (wallet, token_count))| {
            let wallet = wallet
                .ok_or_else(|| PipelineError::schema(RANKING, format!("row {idx}: null wallet")))?;
            Ok(RankedWallet {
                wallet,
                token_count,
            })
        })
        .collect()
}

/// Reads the activity query result (`wallet`, `date`, `purchases`, `sales`, `mints`).
pub fn read_activity(df: &DataFrame) -> Result<Vec<WalletActivity>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    let wallets = string_column(df, ACTIVITY, "wallet")?;
    let dates = date_column(df, ACTIVITY, "date")?;
    let purchases = int_column(df, ACTIVITY, "purchases")?;
    let sales = int_column(df, ACTIVITY, "sales")?;
    let mints = int_column(df, ACTIVITY, "mints")?;

    let mut records = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let wallet = wallets[idx]
            .clone()
            .ok_or_else(|| PipelineError::schema(ACTIVITY, format!("row {idx}: null wallet")))?;
        records.push(WalletActivity {
            wallet,
            date: dates[idx],
            purchases: purchases[idx],
            sales: sales[idx],
            mints: mints[idx],
        });
    }
    Ok(records)
}

/// Builds the dense daily leaderboard.
///
/// Ranked wallets and activity are outer-joined on wallet, so wallets that only show up in
/// the activity feed are kept. Every wallet gets exactly one row per day of `window`, ordered
/// by wallet then date; days without activity are zero. A wallet's `token_count` is the largest
/// count observed for it in the join, or 0 when it never had one.
pub fn leaderboard_rows(
    ranking: &[RankedWallet],
    activity: &[WalletActivity],
    window: LeaderboardWindow,
) -> Result<Vec<LeaderboardRow>> {
    // Window violations are reported even when there is nobody to rank.
    let dated = activity
        .iter()
        .map(|record| Ok((record, activity_date(record, window)?)))
        .collect::<Result<Vec<_>>>()?;
    if ranking.is_empty() {
        return Ok(Vec::new());
    }

    let mut joined: BTreeMap<&str, WalletDays> = BTreeMap::new();
    for ranked in ranking {
        let previous = joined.insert(
            ranked.wallet.as_str(),
            WalletDays {
                token_count: ranked.token_count,
                days: BTreeMap::new(),
            },
        );
        if previous.is_some() {
            return Err(PipelineError::Consistency(format!(
                "wallet {} is ranked more than once",
                ranked.wallet
            )));
        }
    }

    for (record, date) in dated {
        let day = DayActivity {
            purchases: record.purchases.unwrap_or(0),
            sales: record.sales.unwrap_or(0),
            mints: record.mints.unwrap_or(0),
        };
        let entry = joined.entry(record.wallet.as_str()).or_default();
        if entry.days.insert(date, day).is_some() {
            return Err(PipelineError::Consistency(format!(
                "wallet {} has more than one activity row for {}",
                record.wallet, date
            )));
        }
    }

    let mut rows = Vec::with_capacity(joined.len() * window.days());
    for (wallet, history) in joined {
        let token_count = history.token_count.unwrap_or(0);
        for date in days_inclusive(window.start, window.end) {
            let day = history.days.get(&date).copied().unwrap_or_default();
            rows.push(LeaderboardRow {
                date,
                wallet: wallet.to_string(),
                token_count,
                purchases: day.purchases,
                sales: day.sales,
                mints: day.mints,
                net_trade_balance: day.net_trade_balance(),
            });
        }
    }

    Ok(rows)
}

fn activity_date(record: &WalletActivity, window: LeaderboardWindow) -> Result<NaiveDate> {
    // Undated rows land on the last day of the window.
    let date = record.date.unwrap_or(window.end);
    if !window.contains(date) {
        return Err(PipelineError::Range(format!(
            "activity for wallet {} on {} falls outside {}..={}",
            record.wallet, date, window.start, window.end
        )));
    }
    Ok(date)
}

/// Reads both query results and returns the published leaderboard table.
pub fn build_leaderboard(
    wallets: &DataFrame,
    activity: &DataFrame,
    window: LeaderboardWindow,
) -> Result<DataFrame> {
    let ranking = read_ranking(wallets)?;
    let activity = read_activity(activity)?;
    let rows = leaderboard_rows(&ranking, &activity, window)?;
    info!(
        wallets = ranking.len(),
        activity_rows = activity.len(),
        rows = rows.len(),
        start = %window.start,
        end = %window.end,
        "Built leaderboard table"
    );
    leaderboard_frame(&rows)
}

/// Column order: `date, wallet, token_count, purchases, sales, mints, netTradeBalance`.
pub fn leaderboard_frame(rows: &[LeaderboardRow]) -> Result<DataFrame> {
    let dates: Vec<String> = rows.iter().map(|row| format_date(row.date)).collect();
    let wallets: Vec<&str> = rows.iter().map(|row| row.wallet.as_str()).collect();
    let token_counts: Vec<i64> = rows.iter().map(|row| row.token_count).collect();
    let purchases: Vec<i64> = rows.iter().map(|row| row.purchases).collect();
    let sales: Vec<i64> = rows.iter().map(|row| row.sales).collect();
    let mints: Vec<i64> = rows.iter().map(|row| row.mints).collect();
    let balances: Vec<i64> = rows.iter().map(|row| row.net_trade_balance).collect();

    DataFrame::new(vec![
        Series::new("date".into(), dates).into(),
        Series::new("wallet".into(), wallets).into(),
        Series::new("token_count".into(), token_counts).into(),
        Series::new("purchases".into(), purchases).into(),
        Series::new("sales".into(), sales).into(),
        Series::new("mints".into(), mints).into(),
        Series::new("netTradeBalance".into(), balances).into(),
    ])
    .map_err(PipelineError::from)
}
