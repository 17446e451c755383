use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use dropsheet_core::{
    collaborators::SheetPublisher,
    config::{required_env, Config, PublisherKind},
    date_window::DateWindow,
    http::HttpMetadataFetcher,
    pipeline::{plan_queries, run_pipeline, Collaborators, PipelineContext, RunSummary},
    query::QueryTemplateStore,
    sheets::{CsvPublisher, GoogleSheetsPublisher},
    warehouse::{self, PgQueryExecutor},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Nightly drop and leaderboard report publisher",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, transform and publish every report table
    Run(RunArgs),
    /// Print the SQL a run would execute
    Plan(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pipeline configuration file
    #[arg(long, default_value = "config/dropsheet.toml")]
    config: PathBuf,
    /// Reference date (YYYY-MM-DD); defaults to today in the configured timezone
    #[arg(long)]
    today: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args).await,
        Command::Plan(args) => handle_plan(args),
    }
}

fn load(args: &RunArgs) -> Result<(Config, PipelineContext)> {
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let window = match args.today {
        Some(today) => DateWindow::new(today),
        None => DateWindow::today_in(config.tz()?, Utc::now()),
    };

    let context = PipelineContext {
        window,
        queries: QueryTemplateStore::new(config.queries.dir.clone()),
        leaderboard: config.leaderboard.clone(),
        targets: config.targets.clone(),
        collectibles_url: String::new(),
        comics_url: String::new(),
    };
    Ok((config, context))
}

fn handle_plan(args: RunArgs) -> Result<()> {
    let (_, context) = load(&args)?;
    for (name, sql) in plan_queries(&context)? {
        println!("-- {name}");
        println!("{}", sql.trim_end());
        println!();
    }
    Ok(())
}

async fn handle_run(args: RunArgs) -> Result<()> {
    let (config, mut context) = load(&args)?;
    context.collectibles_url = required_env(&config.metadata.collectibles_url_env)?;
    context.comics_url = required_env(&config.metadata.comics_url_env)?;

    let database_url = required_env(&config.warehouse.database_url_env)?;
    let pool = warehouse::connect(&database_url).await?;
    let executor = PgQueryExecutor::new(pool);
    let fetcher = HttpMetadataFetcher::new()?;

    let publisher: Box<dyn SheetPublisher> = match config.publisher.kind {
        PublisherKind::GoogleSheets => {
            let token = required_env(&config.publisher.access_token_env)?;
            Box::new(GoogleSheetsPublisher::new(token)?)
        }
        PublisherKind::Csv => {
            info!(dir = %config.publisher.output_dir.display(), "Publishing to CSV files");
            Box::new(CsvPublisher::new(config.publisher.output_dir.clone()))
        }
    };

    let summary = run_pipeline(
        &context,
        Collaborators {
            executor: &executor,
            fetcher: &fetcher,
            publisher: publisher.as_ref(),
        },
    )
    .await
    .context("pipeline run failed")?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Table", "Rows", "Target", "Mode"]);
    for entry in &summary.tables {
        table.add_row(vec![
            entry.table.to_string(),
            entry.rows.to_string(),
            entry.target.to_string(),
            format!("{:?}", entry.mode),
        ]);
    }
    println!("Run {} for {}", summary.run_id, summary.reference_date);
    println!("{table}");
}
