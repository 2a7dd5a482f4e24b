use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

use super::{InsertOutcome, NewsStore, StorageError};
use crate::record::{NewNewsRecord, NewsRecord};

pub const DEFAULT_TABLE: &str = "webhooks";
const ERROR_BODY_MAX: usize = 512;

/// Supabase (PostgREST) backed store.
#[derive(Clone)]
pub struct SupabaseStore {
    http: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl SupabaseStore {
    pub fn new(
        base_url: &str,
        api_key: &str,
        table: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let http = Client::builder()
            .user_agent(concat!("krux-news-ingest/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            table: table.to_string(),
        })
    }

    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authed(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows(rsp: Response) -> Result<Vec<NewsRecord>, StorageError> {
        let rsp = check_status(rsp).await?;
        rsp.json::<Vec<NewsRecord>>()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))
    }
}

async fn check_status(rsp: Response) -> Result<Response, StorageError> {
    let status = rsp.status();
    if status.is_success() {
        return Ok(rsp);
    }
    let body = rsp.text().await.unwrap_or_default();
    Err(StorageError::Status {
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_MAX).collect(),
    })
}

#[derive(serde::Deserialize)]
struct IdOnly {
    id: i64,
}

#[async_trait::async_trait]
impl NewsStore for SupabaseStore {
    async fn insert(&self, record: &NewNewsRecord) -> Result<InsertOutcome, StorageError> {
        let rsp = self
            .authed(self.http.post(self.table_url()))
            .query(&[("on_conflict", "dedup_key"), ("select", "id")])
            .header("Prefer", "return=representation,resolution=ignore-duplicates")
            .json(record)
            .send()
            .await?;
        let rsp = check_status(rsp).await?;

        // Ignored duplicates come back as an empty representation.
        let ids = rsp
            .json::<Vec<IdOnly>>()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(match ids.first() {
            Some(row) => InsertOutcome::Inserted(row.id),
            None => InsertOutcome::Duplicate,
        })
    }

    async fn select_all(&self) -> Result<Vec<NewsRecord>, StorageError> {
        let rsp = self
            .authed(self.http.get(self.table_url()))
            .query(&[("select", "*"), ("order", "created_at.desc,id.desc")])
            .send()
            .await?;
        Self::rows(rsp).await
    }

    async fn select_by_id(&self, id: i64) -> Result<Option<NewsRecord>, StorageError> {
        let filter = format!("eq.{id}");
        let rsp = self
            .authed(self.http.get(self.table_url()))
            .query(&[("select", "*"), ("id", filter.as_str())])
            .send()
            .await?;
        Ok(Self::rows(rsp).await?.into_iter().next())
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}
