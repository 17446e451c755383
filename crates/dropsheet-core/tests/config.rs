use dropsheet_core::config::{Config, PublisherKind};
use dropsheet_core::PipelineError;

#[test]
fn empty_file_uses_defaults() {
    let config = Config::from_toml("").expect("defaults");

    assert_eq!(config.timezone, "UTC");
    assert_eq!(config.leaderboard.limit, 100);
    assert_eq!(config.leaderboard.window_days, 61);
    assert!(config.leaderboard.excluded_wallets.is_empty());
    assert_eq!(config.publisher.kind, PublisherKind::GoogleSheets);
    assert_eq!(config.metadata.collectibles_url_env, "API_CALL_URL_SETS");
    assert_eq!(config.targets.drops.spreadsheet, "Veve Drops");
    assert_eq!(config.targets.leaderboard.tab, "Daily");
}

#[test]
fn values_are_read_from_toml() {
    let config = Config::from_toml(
        r#"
        timezone = "America/New_York"

        [leaderboard]
        limit = 25
        excluded_wallets = ["0xdead"]

        [publisher]
        kind = "csv"
        output_dir = "/tmp/dropsheet"

        [targets]
        mints = { spreadsheet = "sheet-id", tab = "Mints" }
        "#,
    )
    .expect("config");

    assert_eq!(config.tz().expect("tz"), chrono_tz::America::New_York);
    assert_eq!(config.leaderboard.limit, 25);
    assert_eq!(config.leaderboard.window_days, 61);
    assert_eq!(config.leaderboard.excluded_wallets, ["0xdead"]);
    assert_eq!(config.publisher.kind, PublisherKind::Csv);
    assert_eq!(config.targets.mints.spreadsheet, "sheet-id");
    assert_eq!(config.targets.transfers.tab, "Transfers");
}

#[test]
fn invalid_settings_are_rejected() {
    let err = Config::from_toml(r#"timezone = "Mars/Olympus""#).expect_err("bad tz");
    assert!(matches!(err, PipelineError::Config(_)));

    let err = Config::from_toml("[leaderboard]\nwindow_days = 0").expect_err("empty window");
    assert!(matches!(err, PipelineError::Config(_)));

    let err = Config::from_toml("[leaderboard]\nlimits = 5").expect_err("unknown key");
    assert!(matches!(err, PipelineError::Toml(_)));
}
