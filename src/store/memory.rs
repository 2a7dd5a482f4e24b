use chrono::Utc;
use std::collections::HashSet;
use std::sync::Mutex;

use super::{sort_newest_first, InsertOutcome, NewsStore, StorageError};
use crate::record::{NewNewsRecord, NewsRecord};

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<NewsRecord>,
    keys: HashSet<String>,
    next_id: i64,
}

/// In-process store with the same contract as the database-backed one.
/// Used when no storage credentials are configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl NewsStore for MemoryStore {
    async fn insert(&self, record: &NewNewsRecord) -> Result<InsertOutcome, StorageError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))?;

        if !g.keys.insert(record.dedup_key.clone()) {
            return Ok(InsertOutcome::Duplicate);
        }
        g.next_id += 1;
        let id = g.next_id;
        g.rows.push(record.clone().into_stored(id, Utc::now()));
        Ok(InsertOutcome::Inserted(id))
    }

    async fn select_all(&self) -> Result<Vec<NewsRecord>, StorageError> {
        let g = self
            .inner
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))?;
        let mut rows = g.rows.clone();
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    async fn select_by_id(&self, id: i64) -> Result<Option<NewsRecord>, StorageError> {
        let g = self
            .inner
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))?;
        Ok(g.rows.iter().find(|r| r.id == id).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::RawEvent;
    use crate::record::RecordContext;
    use serde_json::json;

    fn rec(output: &str) -> NewNewsRecord {
        let full = json!({});
        let ctx = RecordContext {
            received_at: Utc::now(),
            event_type: "monitor.event.detected",
            monitor_id: "m1",
            event_group_id: "g1",
            monitor_type: "general",
            full_data: &full,
        };
        NewNewsRecord::from_event(
            &ctx,
            &RawEvent {
                output: output.into(),
                event_date: Some("2026-01-24".into()),
                source_urls: vec![],
            },
        )
    }

    #[tokio::test]
    async fn duplicate_key_is_ignored_not_overwritten() {
        let s = MemoryStore::new();
        let first = s.insert(&rec("a")).await.unwrap();
        assert_eq!(first, InsertOutcome::Inserted(1));

        let mut again = rec("a");
        again.monitor_type = "changed".into();
        assert_eq!(s.insert(&again).await.unwrap(), InsertOutcome::Duplicate);

        let rows = s.select_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].monitor_type, "general");
    }

    #[tokio::test]
    async fn select_all_is_newest_first_and_by_id_works() {
        let s = MemoryStore::new();
        for t in ["a", "b", "c"] {
            s.insert(&rec(t)).await.unwrap();
        }
        let rows = s.select_all().await.unwrap();
        let outs: Vec<_> = rows.iter().map(|r| r.news_output.as_str()).collect();
        assert_eq!(outs, vec!["c", "b", "a"]);

        let one = s.select_by_id(2).await.unwrap().unwrap();
        assert_eq!(one.news_output, "b");
        assert!(s.select_by_id(99).await.unwrap().is_none());
    }
}
