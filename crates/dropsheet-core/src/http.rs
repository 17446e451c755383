use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::collaborators::MetadataFetcher;
use crate::error::{PipelineError, Result};

const METADATA_API: &str = "metadata API";

#[derive(Debug, Clone)]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
}

impl HttpMetadataFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PipelineError::connectivity(METADATA_API, err))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<Value> {
        info!(url, "Fetching metadata");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| PipelineError::connectivity(METADATA_API, err))?;

        response
            .json::<Value>()
            .await
            .map_err(|err| PipelineError::schema("metadata", format!("invalid JSON body: {err}")))
    }
}
