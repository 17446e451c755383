//! Seams to the warehouse, the metadata APIs and the spreadsheet destinations.

use async_trait::async_trait;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Executes fully rendered SQL against the warehouse.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn run(&self, sql: &str) -> Result<DataFrame>;
}

/// Fetches the decoded JSON body of a metadata endpoint.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetTarget {
    pub spreadsheet: String,
    pub tab: String,
}

impl SheetTarget {
    pub fn new(spreadsheet: impl Into<String>, tab: impl Into<String>) -> Self {
        Self {
            spreadsheet: spreadsheet.into(),
            tab: tab.into(),
        }
    }
}

impl std::fmt::Display for SheetTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.spreadsheet, self.tab)
    }
}

#[async_trait]
pub trait SheetPublisher: Send + Sync {
    /// Appends a single row below the existing content of the tab.
    async fn append(&self, target: &SheetTarget, row: Vec<Value>) -> Result<()>;

    /// Replaces the whole tab with a header row followed by `rows`.
    async fn replace(
        &self,
        target: &SheetTarget,
        header: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<()>;
}
