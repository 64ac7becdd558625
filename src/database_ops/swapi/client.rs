use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::models::RawRecord;
use crate::errors::IngestError;

/// Read access to the catalog. Used for the index, for records and for the
/// resources that record references point at.
#[async_trait]
pub trait CatalogFetch: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, IngestError>;
}

/// HTTP client for the people catalog (default https://swapi.py4e.com/api/people/).
#[derive(Debug, Clone)]
pub struct SwapiClient {
    http: Client,
}

impl SwapiClient {
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, IngestError> {
        let timeout_secs = timeout_secs.unwrap_or(30);
        let http = Client::builder()
            .user_agent("swapi-ingest/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IngestError::Config(format!("http client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl CatalogFetch for SwapiClient {
    async fn fetch_json(&self, url: &str) -> Result<Value, IngestError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::transport(url, e))?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| IngestError::transport(url, e))?;
        let value =
            serde_json::from_slice::<Value>(&body).map_err(|e| IngestError::decode(url, e))?;
        debug!(url, bytes = body.len(), "catalog fetch");
        Ok(value)
    }
}

pub fn index_url(base_url: &str) -> String {
    format!("{}/", base_url.trim_end_matches('/'))
}

pub fn record_url(base_url: &str, id: u64) -> String {
    format!("{}/{id}/", base_url.trim_end_matches('/'))
}

/// Total number of records advertised by the collection index.
pub async fn fetch_count<F>(fetch: &F, base_url: &str) -> Result<u64, IngestError>
where
    F: CatalogFetch + ?Sized,
{
    let url = index_url(base_url);
    let index = fetch.fetch_json(&url).await?;
    index
        .get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| IngestError::decode(&url, "index has no integer `count`"))
}

pub async fn fetch_record<F>(fetch: &F, base_url: &str, id: u64) -> Result<RawRecord, IngestError>
where
    F: CatalogFetch + ?Sized,
{
    let url = record_url(base_url, id);
    let record = fetch.fetch_json(&url).await?;
    if !record.is_object() {
        return Err(IngestError::decode(&url, "record is not a JSON object"));
    }
    Ok(record)
}
