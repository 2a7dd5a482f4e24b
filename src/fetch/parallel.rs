use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::{EventFetcher, FetchError};
use crate::ingest::types::{EventGroup, RawEvent};

pub const DEFAULT_BASE_URL: &str = "https://api.parallel.ai";
const API_KEY_HEADER: &str = "x-api-key";
const ERROR_BODY_MAX: usize = 512;

/// Parallel monitor API client for the event-group resource.
#[derive(Clone)]
pub struct ParallelClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ParallelClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("krux-news-ingest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn event_group_url(&self, monitor_id: &str, event_group_id: &str) -> String {
        format!(
            "{}/v1alpha/monitors/{}/event_groups/{}",
            self.base_url, monitor_id, event_group_id
        )
    }
}

#[async_trait::async_trait]
impl EventFetcher for ParallelClient {
    async fn fetch_event_group(
        &self,
        monitor_id: &str,
        event_group_id: &str,
    ) -> Result<EventGroup, FetchError> {
        if self.api_key.is_empty() {
            return Err(FetchError::Auth("PARALLEL_API_KEY is not set".into()));
        }

        let url = self.event_group_url(monitor_id, event_group_id);
        let rsp = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = rsp.status();
        let body = rsp.text().await?;

        match status {
            s if s.is_success() => parse_event_group(&body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(FetchError::Auth(truncate(&body, ERROR_BODY_MAX)))
            }
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                monitor_id: monitor_id.to_string(),
                event_group_id: event_group_id.to_string(),
            }),
            s => Err(FetchError::Status {
                status: s.as_u16(),
                body: truncate(&body, ERROR_BODY_MAX),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}

// Accepted response shapes: `{events:[..]}`, a bare array, or either wrapped in `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupAny {
    Object { events: Vec<RawEvent> },
    Bare(Vec<RawEvent>),
    Wrapped { data: Box<GroupAny> },
}

fn flatten(any: GroupAny) -> Vec<RawEvent> {
    match any {
        GroupAny::Object { events } | GroupAny::Bare(events) => events,
        GroupAny::Wrapped { data } => flatten(*data),
    }
}

/// Decode an event-group response body, keeping API order.
pub fn parse_event_group(body: &str) -> Result<EventGroup, FetchError> {
    let any: GroupAny = serde_json::from_str(body)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
    Ok(EventGroup {
        events: flatten(any),
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_has_no_double_slash() {
        let c = ParallelClient::new("https://api.parallel.ai/", "k", Duration::from_secs(1)).unwrap();
        assert_eq!(
            c.event_group_url("monitor_1", "mevtgrp_2"),
            "https://api.parallel.ai/v1alpha/monitors/monitor_1/event_groups/mevtgrp_2"
        );
    }

    #[test]
    fn parses_object_bare_and_wrapped_shapes() {
        let obj = r#"{"events":[{"output":"a","event_date":"2026-01-24","source_urls":["https://a.com"]},{"output":"b"}]}"#;
        let g = parse_event_group(obj).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.events[0].output, "a");
        assert_eq!(g.events[1].output, "b");

        let bare = r#"[{"output":"c"}]"#;
        assert_eq!(parse_event_group(bare).unwrap().events[0].output, "c");

        let wrapped = r#"{"data":{"events":[{"output":"d"}]}}"#;
        assert_eq!(parse_event_group(wrapped).unwrap().events[0].output, "d");
    }

    #[test]
    fn garbage_is_malformed() {
        let err = parse_event_group("<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.kind(), "malformed");
        let err = parse_event_group(r#"{"events": "nope"}"#).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let c = ParallelClient::new("http://127.0.0.1:9", "  ", Duration::from_secs(1)).unwrap();
        let err = c.fetch_event_group("m", "g").await.unwrap_err();
        assert_eq!(err.kind(), "auth");
    }
}
