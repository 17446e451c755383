// crates/dropsheet-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A payload or result set is missing a field the transformations rely on.
    #[error("{source_name} schema error: {message}")]
    Schema {
        source_name: &'static str,
        message: String,
    },

    /// The caller handed over data outside the window it promised.
    #[error("Date range violation: {0}")]
    Range(String),

    /// A join or fill produced something the table invariants forbid.
    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("{collaborator} unreachable: {message}")]
    Connectivity {
        collaborator: &'static str,
        message: String,
    },

    #[error("Table {table} returned no rows")]
    EmptyResult { table: &'static str },

    #[error("Query template {template} could not be rendered: {message}")]
    QueryTemplate { template: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV writing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PipelineError {
    pub fn schema(source_name: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Schema {
            source_name,
            message: message.into(),
        }
    }

    pub fn connectivity(collaborator: &'static str, message: impl std::fmt::Display) -> Self {
        PipelineError::Connectivity {
            collaborator,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
