use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use dropsheet_core::collaborators::{MetadataFetcher, QueryExecutor, SheetPublisher, SheetTarget};
use dropsheet_core::config::{LeaderboardConfig, TargetsConfig};
use dropsheet_core::date_window::DateWindow;
use dropsheet_core::pipeline::{
    plan_queries, run_pipeline, Collaborators, PipelineContext, PublishMode,
};
use dropsheet_core::query::QueryTemplateStore;
use dropsheet_core::{PipelineError, Result};
use polars::df;
use polars::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

const TEMPLATES: [(&str, &str); 5] = [
    ("transfers_daily.sql", "-- transfers\nSELECT '{day}'"),
    ("mints_daily.sql", "-- mints\nSELECT '{day}'"),
    ("active_wallets_daily.sql", "-- active\nSELECT '{day}'"),
    ("top_x_wallets.sql", "-- top\nLIMIT {limit} EXCLUDE [{wallets_to_exclude}]"),
    ("wallet_activity.sql", "-- activity\n'{start_date}'..'{end_date}' IN [{list}]"),
];

fn template_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dropsheet-pipeline-{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create template dir");
    for (name, body) in TEMPLATES {
        fs::write(dir.join(name), body).expect("write template");
    }
    dir
}

fn context(dir: &PathBuf) -> PipelineContext {
    PipelineContext {
        window: DateWindow::new(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()),
        queries: QueryTemplateStore::new(dir),
        leaderboard: LeaderboardConfig {
            limit: 2,
            window_days: 3,
            excluded_wallets: vec!["0xburn".into()],
        },
        targets: TargetsConfig::default(),
        collectibles_url: "https://api.test/sets".into(),
        comics_url: "https://api.test/comics".into(),
    }
}

struct FakeWarehouse {
    activity: DataFrame,
    empty_mints: bool,
    executed: Mutex<Vec<String>>,
}

impl FakeWarehouse {
    fn new(activity: DataFrame) -> Self {
        Self {
            activity,
            empty_mints: false,
            executed: Mutex::new(Vec::new()),
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeWarehouse {
    async fn run(&self, sql: &str) -> Result<DataFrame> {
        self.executed.lock().unwrap().push(sql.to_string());
        let df = if sql.starts_with("-- transfers") {
            df!["date" => ["2024-01-03"], "transfers" => [120i64]]?
        } else if sql.starts_with("-- mints") {
            if self.empty_mints {
                df!["date" => Vec::<&str>::new(), "mints" => Vec::<i64>::new()]?
            } else {
                df!["date" => ["2024-01-03"], "mints" => [7i64]]?
            }
        } else if sql.starts_with("-- active") {
            df![
                "date" => ["2024-01-03"],
                "active_wallets" => [55i64],
                "new_active_wallets" => [4i64],
            ]?
        } else if sql.starts_with("-- top") {
            df!["wallet" => ["0xa", "0xb"], "token_count" => [30i64, 20]]?
        } else {
            self.activity.clone()
        };
        Ok(df)
    }
}

struct FakeApis {
    payloads: HashMap<String, Value>,
}

#[async_trait]
impl MetadataFetcher for FakeApis {
    async fn fetch(&self, url: &str) -> Result<Value> {
        self.payloads
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::connectivity("metadata API", format!("404 {url}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Published {
    Row(SheetTarget, Vec<Value>),
    Table(SheetTarget, Vec<String>, Vec<Vec<Value>>),
}

#[derive(Default)]
struct RecordingSheets {
    published: Mutex<Vec<Published>>,
}

impl RecordingSheets {
    fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl SheetPublisher for RecordingSheets {
    async fn append(&self, target: &SheetTarget, row: Vec<Value>) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push(Published::Row(target.clone(), row));
        Ok(())
    }

    async fn replace(
        &self,
        target: &SheetTarget,
        header: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push(Published::Table(target.clone(), header, rows));
        Ok(())
    }
}

fn apis() -> FakeApis {
    let mut payloads = HashMap::new();
    payloads.insert(
        "https://api.test/sets".to_string(),
        json!([{
            "brand": "X", "series": "S1", "dropDate": "2024-01-01T00:00:00Z", "season": 2,
            "collectibles": [{ "totalIssued": 100 }, { "totalIssued": 50 }]
        }]),
    );
    payloads.insert(
        "https://api.test/comics".to_string(),
        json!([{
            "dropDate": "2024-01-02", "publisher": "P", "series": "Saga", "issue": 3, "editions": 10
        }]),
    );
    FakeApis { payloads }
}

fn activity() -> DataFrame {
    df![
        "wallet" => ["0xa", "0xc"],
        "date" => ["2024-01-02", "2024-01-03"],
        "purchases" => [2i64, 1],
        "sales" => [1i64, 0],
        "mints" => [0i64, 0],
    ]
    .expect("activity frame")
}

#[tokio::test]
async fn run_publishes_every_table_in_order() {
    let dir = template_dir();
    let ctx = context(&dir);
    let warehouse = FakeWarehouse::new(activity());
    let apis = apis();
    let sheets = RecordingSheets::default();

    let summary = run_pipeline(
        &ctx,
        Collaborators {
            executor: &warehouse,
            fetcher: &apis,
            publisher: &sheets,
        },
    )
    .await
    .expect("pipeline run");

    let executed = warehouse.executed();
    assert_eq!(executed.len(), 5);
    assert_eq!(executed[0], "-- transfers\nSELECT '2024-01-03'");
    assert_eq!(executed[3], "-- top\nLIMIT 2 EXCLUDE ['0xburn']");
    assert_eq!(executed[4], "-- activity\n'2024-01-01'..'2024-01-03' IN ['0xa', '0xb']");

    let published = sheets.published();
    assert_eq!(published.len(), 5);
    assert_eq!(
        published[0],
        Published::Row(
            SheetTarget::new("Veve Tracker Daily", "Transfers"),
            vec![json!("2024-01-03"), json!(120)]
        )
    );
    assert_eq!(
        published[2],
        Published::Row(
            SheetTarget::new("Active Wallets", "Daily"),
            vec![json!("2024-01-03"), json!(55), json!(4)]
        )
    );

    let Published::Table(target, header, rows) = &published[3] else {
        panic!("drops should replace the tab");
    };
    assert_eq!(target, &SheetTarget::new("Veve Drops", "All"));
    assert_eq!(header, &["dropDate", "brand", "series", "type", "season", "editions"]);
    assert_eq!(
        rows,
        &vec![
            vec![
                json!("2024-01-01"),
                json!("X"),
                json!("S1"),
                json!("Collectible"),
                json!(2),
                json!(150)
            ],
            vec![
                json!("2024-01-02"),
                json!("P"),
                json!("Saga #3"),
                json!("Comic"),
                json!(2),
                json!(10)
            ],
        ]
    );

    let Published::Table(target, header, rows) = &published[4] else {
        panic!("leaderboard should replace the tab");
    };
    assert_eq!(target, &SheetTarget::new("Leaderboard", "Daily"));
    assert_eq!(
        header,
        &["date", "wallet", "token_count", "purchases", "sales", "mints", "netTradeBalance"]
    );
    // 0xa, 0xb ranked plus 0xc from activity, three days each.
    assert_eq!(rows.len(), 9);
    assert_eq!(
        rows[1],
        vec![json!("2024-01-02"), json!("0xa"), json!(30), json!(2), json!(1), json!(0), json!(1)]
    );
    assert_eq!(
        rows[8],
        vec![json!("2024-01-03"), json!("0xc"), json!(0), json!(1), json!(0), json!(0), json!(1)]
    );

    assert_eq!(summary.reference_date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    let modes: Vec<(&str, usize, PublishMode)> = summary
        .tables
        .iter()
        .map(|entry| (entry.table, entry.rows, entry.mode))
        .collect();
    assert_eq!(
        modes,
        [
            ("transfers", 1, PublishMode::Append),
            ("mints", 1, PublishMode::Append),
            ("active_wallets", 1, PublishMode::Append),
            ("drops", 2, PublishMode::Replace),
            ("leaderboard", 9, PublishMode::Replace),
        ]
    );

    fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn failed_transformation_publishes_nothing() {
    let dir = template_dir();
    let ctx = context(&dir);
    let stale = df![
        "wallet" => ["0xa"],
        "date" => ["2023-12-01"],
        "purchases" => [1i64],
        "sales" => [0i64],
        "mints" => [0i64],
    ]
    .expect("activity frame");
    let warehouse = FakeWarehouse::new(stale);
    let apis = apis();
    let sheets = RecordingSheets::default();

    let err = run_pipeline(
        &ctx,
        Collaborators {
            executor: &warehouse,
            fetcher: &apis,
            publisher: &sheets,
        },
    )
    .await
    .expect_err("activity outside window");

    assert!(matches!(err, PipelineError::Range(_)));
    assert!(sheets.published().is_empty());
    fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn empty_daily_result_aborts_before_publishing() {
    let dir = template_dir();
    let ctx = context(&dir);
    let mut warehouse = FakeWarehouse::new(activity());
    warehouse.empty_mints = true;
    let apis = apis();
    let sheets = RecordingSheets::default();

    let err = run_pipeline(
        &ctx,
        Collaborators {
            executor: &warehouse,
            fetcher: &apis,
            publisher: &sheets,
        },
    )
    .await
    .expect_err("mints returned nothing");

    assert!(matches!(err, PipelineError::EmptyResult { table: "mints" }));
    assert!(sheets.published().is_empty());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn plan_renders_every_query() {
    let dir = template_dir();
    let ctx = context(&dir);

    let plan = plan_queries(&ctx).expect("plan");

    let names: Vec<&str> = plan.iter().map(|(name, _)| *name).collect();
    assert_eq!(
        names,
        [
            "transfers_daily.sql",
            "mints_daily.sql",
            "active_wallets_daily.sql",
            "top_x_wallets.sql",
            "wallet_activity.sql"
        ]
    );
    assert_eq!(plan[4].1, "-- activity\n'2024-01-01'..'2024-01-03' IN [{list}]");
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn oversized_leaderboard_window_fails_to_plan() {
    let dir = template_dir();
    let mut ctx = context(&dir);
    ctx.leaderboard.window_days = 200_000_000;

    let err = plan_queries(&ctx).expect_err("window reaches before the calendar");
    assert!(matches!(err, PipelineError::Range(_)));
    fs::remove_dir_all(&dir).ok();
}
