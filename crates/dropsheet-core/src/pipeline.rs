use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::collaborators::{MetadataFetcher, QueryExecutor, SheetPublisher, SheetTarget};
use crate::config::{LeaderboardConfig, TargetsConfig};
use crate::date_window::{format_date, DateWindow};
use crate::error::Result;
use crate::leaderboard::{build_leaderboard, read_ranking, LeaderboardWindow};
use crate::metadata::{build_drop_metadata, transform_collectibles, transform_comics};
use crate::query::{self, sql_list, QueryParams, QueryTemplateStore};
use crate::tables;

/// Everything a run needs besides the collaborators.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub window: DateWindow,
    pub queries: QueryTemplateStore,
    pub leaderboard: LeaderboardConfig,
    pub targets: TargetsConfig,
    pub collectibles_url: String,
    pub comics_url: String,
}

#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub executor: &'a dyn QueryExecutor,
    pub fetcher: &'a dyn MetadataFetcher,
    pub publisher: &'a dyn SheetPublisher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    Append,
    Replace,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub table: &'static str,
    pub rows: usize,
    pub target: SheetTarget,
    pub mode: PublishMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub reference_date: NaiveDate,
    pub tables: Vec<TableSummary>,
}

enum Payload {
    Row(Vec<Value>),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

struct PendingPublish {
    table: &'static str,
    target: SheetTarget,
    payload: Payload,
}

impl PendingPublish {
    fn append(table: &'static str, target: &SheetTarget, df: &DataFrame) -> Result<Self> {
        Ok(Self {
            table,
            target: target.clone(),
            payload: Payload::Row(tables::first_row(df, table)?),
        })
    }

    fn replace(table: &'static str, target: &SheetTarget, df: &DataFrame) -> Result<Self> {
        Ok(Self {
            table,
            target: target.clone(),
            payload: Payload::Table {
                header: tables::header(df),
                rows: tables::rows(df)?,
            },
        })
    }
}

/// Runs the nightly batch: extract, transform, then publish.
///
/// Nothing is published until every table has been built and rendered. Publishing itself
/// stops at the first failure without undoing the tabs already written.
pub async fn run_pipeline(
    ctx: &PipelineContext,
    collaborators: Collaborators<'_>,
) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let span = info_span!("pipeline_run", %run_id, today = %ctx.window.today());
    run_steps(ctx, collaborators, run_id).instrument(span).await
}

async fn run_steps(
    ctx: &PipelineContext,
    collaborators: Collaborators<'_>,
    run_id: Uuid,
) -> Result<RunSummary> {
    let transfers = daily_table(ctx, collaborators, query::TRANSFERS_DAILY, "transfers").await?;
    let mints = daily_table(ctx, collaborators, query::MINTS_DAILY, "mints").await?;
    let active_wallets =
        daily_table(ctx, collaborators, query::ACTIVE_WALLETS_DAILY, "active_wallets").await?;

    let drops = drop_metadata(ctx, collaborators).await?;
    let leaderboard = leaderboard_table(ctx, collaborators).await?;

    let targets = &ctx.targets;
    let pending = vec![
        PendingPublish::append("transfers", &targets.transfers, &transfers)?,
        PendingPublish::append("mints", &targets.mints, &mints)?,
        PendingPublish::append("active_wallets", &targets.active_wallets, &active_wallets)?,
        PendingPublish::replace("drops", &targets.drops, &drops)?,
        PendingPublish::replace("leaderboard", &targets.leaderboard, &leaderboard)?,
    ];

    let mut summaries = Vec::with_capacity(pending.len());
    for item in pending {
        summaries.push(publish(collaborators.publisher, item).await?);
    }

    info!(tables = summaries.len(), "Pipeline run complete");
    Ok(RunSummary {
        run_id,
        reference_date: ctx.window.today(),
        tables: summaries,
    })
}

async fn publish(publisher: &dyn SheetPublisher, item: PendingPublish) -> Result<TableSummary> {
    let PendingPublish {
        table,
        target,
        payload,
    } = item;
    info!(table, sheet = %target, "Publishing table");

    let (rows, mode) = match payload {
        Payload::Row(row) => {
            publisher.append(&target, row).await?;
            (1, PublishMode::Append)
        }
        Payload::Table { header, rows } => {
            let count = rows.len();
            publisher.replace(&target, header, rows).await?;
            (count, PublishMode::Replace)
        }
    };

    Ok(TableSummary {
        table,
        rows,
        target,
        mode,
    })
}

fn daily_params(window: &DateWindow) -> Result<QueryParams> {
    Ok(QueryParams::new().with("day", window.days_ago(1)?))
}

async fn daily_table(
    ctx: &PipelineContext,
    collaborators: Collaborators<'_>,
    template: &str,
    table: &'static str,
) -> Result<DataFrame> {
    info!(table, "Fetching daily data");
    let sql = ctx.queries.render(template, &daily_params(&ctx.window)?)?;
    let df = collaborators.executor.run(&sql).await?;
    info!(table, rows = df.height(), "Fetched daily data");
    Ok(df)
}

async fn drop_metadata(
    ctx: &PipelineContext,
    collaborators: Collaborators<'_>,
) -> Result<DataFrame> {
    info!("Fetching collectibles metadata");
    let collectibles_payload = collaborators.fetcher.fetch(&ctx.collectibles_url).await?;
    info!("Fetching comics metadata");
    let comics_payload = collaborators.fetcher.fetch(&ctx.comics_url).await?;

    let collectibles = transform_collectibles(&collectibles_payload)?;
    let comics = transform_comics(&comics_payload)?;
    info!(
        collectibles = collectibles.len(),
        comics = comics.len(),
        "Creating drop metadata table"
    );
    build_drop_metadata(collectibles, comics)
}

fn top_wallets_params(settings: &LeaderboardConfig) -> QueryParams {
    QueryParams::new()
        .with("limit", settings.limit)
        .with("wallets_to_exclude", sql_list(&settings.excluded_wallets))
}

fn activity_params<S: AsRef<str>>(window: &LeaderboardWindow, wallets: &[S]) -> QueryParams {
    QueryParams::new()
        .with("start_date", format_date(window.start()))
        .with("end_date", format_date(window.end()))
        .with("list", sql_list(wallets))
}

async fn leaderboard_table(
    ctx: &PipelineContext,
    collaborators: Collaborators<'_>,
) -> Result<DataFrame> {
    info!(limit = ctx.leaderboard.limit, "Fetching top wallets");
    let sql = ctx
        .queries
        .render(query::TOP_WALLETS, &top_wallets_params(&ctx.leaderboard))?;
    let wallets = collaborators.executor.run(&sql).await?;
    let ranking = read_ranking(&wallets)?;
    let names: Vec<&str> = ranking.iter().map(|ranked| ranked.wallet.as_str()).collect();

    let window = LeaderboardWindow::trailing(&ctx.window, ctx.leaderboard.window_days)?;
    info!(
        wallets = names.len(),
        start = %window.start(),
        end = %window.end(),
        "Fetching wallet activity"
    );
    let sql = ctx
        .queries
        .render(query::WALLET_ACTIVITY, &activity_params(&window, &names))?;
    let activity = collaborators.executor.run(&sql).await?;

    build_leaderboard(&wallets, &activity, window)
}

/// The SQL a run would send, in execution order. The activity query's wallet list is only
/// known after the ranking query runs, so `{list}` is left in place.
pub fn plan_queries(ctx: &PipelineContext) -> Result<Vec<(&'static str, String)>> {
    let daily = daily_params(&ctx.window)?;
    let window = LeaderboardWindow::trailing(&ctx.window, ctx.leaderboard.window_days)?;
    let activity = activity_params::<&str>(&window, &[]).with("list", "{list}");

    Ok(vec![
        (query::TRANSFERS_DAILY, ctx.queries.render(query::TRANSFERS_DAILY, &daily)?),
        (query::MINTS_DAILY, ctx.queries.render(query::MINTS_DAILY, &daily)?),
        (
            query::ACTIVE_WALLETS_DAILY,
            ctx.queries.render(query::ACTIVE_WALLETS_DAILY, &daily)?,
        ),
        (
            query::TOP_WALLETS,
            ctx.queries
                .render(query::TOP_WALLETS, &top_wallets_params(&ctx.leaderboard))?,
        ),
        (query::WALLET_ACTIVITY, ctx.queries.render(query::WALLET_ACTIVITY, &activity)?),
    ])
}
