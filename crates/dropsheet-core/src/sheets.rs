use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::collaborators::{SheetPublisher, SheetTarget};
use crate::error::Result;
use crate::tables::cell_text;

/// Writes each tab to `<dir>/<spreadsheet>/<tab>.csv`.
#[derive(Debug, Clone)]
pub struct CsvPublisher {
    dir: PathBuf,
}

impl CsvPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn tab_path(&self, target: &SheetTarget) -> PathBuf {
        self.dir
            .join(sanitize(&target.spreadsheet))
            .join(format!("{}.csv", sanitize(&target.tab)))
    }

    fn prepare(&self, target: &SheetTarget) -> Result<PathBuf> {
        let path = self.tab_path(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|ch| if ch == '/' || ch == '\\' { '_' } else { ch })
        .collect()
}

fn text_record(row: &[Value]) -> Vec<String> {
    row.iter().map(cell_text).collect()
}

#[async_trait]
impl SheetPublisher for CsvPublisher {
    async fn append(&self, target: &SheetTarget, row: Vec<Value>) -> Result<()> {
        let path = self.prepare(target)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().from_writer(file);
        writer.write_record(text_record(&row))?;
        writer.flush()?;
        info!(sheet = %target, path = %path.display(), "Appended row");
        Ok(())
    }

    async fn replace(
        &self,
        target: &SheetTarget,
        header: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<()> {
        let path = self.prepare(target)?;
        write_table(&path, &header, &rows)?;
        info!(sheet = %target, rows = rows.len(), path = %path.display(), "Replaced tab");
        Ok(())
    }
}

fn write_table(path: &Path, header: &[String], rows: &[Vec<Value>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(text_record(row))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(feature = "runtime")]
pub use google::GoogleSheetsPublisher;

#[cfg(feature = "runtime")]
mod google {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::{Method, Url};
    use serde_json::{json, Value};
    use tracing::info;

    use crate::collaborators::{SheetPublisher, SheetTarget};
    use crate::error::{PipelineError, Result};

    const SHEETS: &str = "Google Sheets";
    const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

    /// Sheets v4 REST client; `spreadsheet` in each target is the spreadsheet id.
    #[derive(Debug, Clone)]
    pub struct GoogleSheetsPublisher {
        client: reqwest::Client,
        access_token: String,
        base_url: Url,
    }

    impl GoogleSheetsPublisher {
        pub fn new(access_token: impl Into<String>) -> Result<Self> {
            Self::with_base_url(access_token, DEFAULT_BASE_URL)
        }

        pub fn with_base_url(access_token: impl Into<String>, base_url: &str) -> Result<Self> {
            let base_url = Url::parse(base_url)
                .map_err(|err| PipelineError::Config(format!("invalid Sheets base url: {err}")))?;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .map_err(|err| PipelineError::connectivity(SHEETS, err))?;
            Ok(Self {
                client,
                access_token: access_token.into(),
                base_url,
            })
        }

        fn values_url(&self, spreadsheet: &str, range: &str) -> Result<Url> {
            let mut url = self.base_url.clone();
            url.path_segments_mut()
                .map_err(|_| PipelineError::Config("Sheets base url cannot be a base".into()))?
                .pop_if_empty()
                .extend(["v4", "spreadsheets", spreadsheet, "values", range]);
            Ok(url)
        }

        async fn send(&self, method: Method, url: Url, body: Value) -> Result<()> {
            self.client
                .request(method, url)
                .bearer_auth(&self.access_token)
                .query(&[("valueInputOption", "USER_ENTERED")])
                .json(&body)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|err| PipelineError::connectivity(SHEETS, err))?;
            Ok(())
        }
    }

    /// A1 notation for a whole tab, quoted so names with spaces survive.
    fn tab_range(tab: &str) -> String {
        format!("'{}'", tab.replace('\'', "''"))
    }

    #[async_trait]
    impl SheetPublisher for GoogleSheetsPublisher {
        async fn append(&self, target: &SheetTarget, row: Vec<Value>) -> Result<()> {
            let range = format!("{}:append", tab_range(&target.tab));
            let url = self.values_url(&target.spreadsheet, &range)?;
            self.send(Method::POST, url, json!({ "values": [row] })).await?;
            info!(sheet = %target, "Appended row");
            Ok(())
        }

        async fn replace(
            &self,
            target: &SheetTarget,
            header: Vec<String>,
            rows: Vec<Vec<Value>>,
        ) -> Result<()> {
            let tab = tab_range(&target.tab);
            let clear_url = self.values_url(&target.spreadsheet, &format!("{tab}:clear"))?;
            self.client
                .post(clear_url)
                .bearer_auth(&self.access_token)
                .json(&json!({}))
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|err| PipelineError::connectivity(SHEETS, err))?;

            let row_count = rows.len();
            let mut values: Vec<Vec<Value>> = Vec::with_capacity(row_count + 1);
            values.push(header.into_iter().map(Value::String).collect());
            values.extend(rows);

            let range = format!("{tab}!A1");
            let url = self.values_url(&target.spreadsheet, &range)?;
            let body = json!({ "range": range, "majorDimension": "ROWS", "values": values });
            self.send(Method::PUT, url, body).await?;
            info!(sheet = %target, rows = row_count, "Replaced tab");
            Ok(())
        }
    }
}
