// src/registry.rs
//! Monitor registry: monitor id → category (`monitor_type`).
//!
//! - Loaded once at startup from a JSON object file (TOML `[monitors]` also accepted).
//! - Missing or corrupt file degrades to an empty map; startup never fails on it.
//! - Readers take an `Arc` snapshot; reloads swap the snapshot, never mutate it.

use anyhow::{anyhow, Context, Result};
use metrics::gauge;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

pub const DEFAULT_MONITOR_MAP_PATH: &str = "config/monitor_map.json";
pub const ENV_MONITOR_MAP_PATH: &str = "MONITOR_MAP_PATH";
pub const ENV_MONITOR_MAP_HOT_RELOAD: &str = "MONITOR_MAP_HOT_RELOAD";

/// Immutable monitor id → category mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorMap {
    entries: HashMap<String, String>,
}

impl MonitorMap {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries: clean_entries(entries),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Load from an explicit path. JSON unless the extension is `.toml`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading monitor map from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let map = if ext == "toml" {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        };
        map.with_context(|| format!("parsing monitor map {}", path.display()))
    }

    /// Like [`MonitorMap::load_from`], but any failure yields an empty map.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(m) => {
                info!(path = %path.display(), entries = m.len(), "monitor map loaded");
                m
            }
            Err(e) => {
                warn!(error = ?e, path = %path.display(), "monitor map unavailable; every monitor falls back to 'general'");
                Self::default()
            }
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let v: serde_json::Value = serde_json::from_str(s)?;
        let obj = v
            .as_object()
            .ok_or_else(|| anyhow!("monitor map must be a JSON object"))?;
        let entries = obj
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();
        Ok(Self::new(entries))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        #[derive(serde::Deserialize)]
        struct TomlMap {
            monitors: HashMap<String, String>,
        }
        let v: TomlMap = toml::from_str(s)?;
        Ok(Self::new(v.monitors))
    }

    pub fn resolve(&self, monitor_id: &str) -> Option<&str> {
        self.entries.get(monitor_id.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn clean_entries(entries: HashMap<String, String>) -> HashMap<String, String> {
    entries
        .into_iter()
        .filter_map(|(k, v)| {
            let (k, v) = (k.trim(), v.trim());
            (!k.is_empty() && !v.is_empty()).then(|| (k.to_string(), v.to_string()))
        })
        .collect()
}

/// Shared, cheaply cloneable handle over the current [`MonitorMap`] snapshot.
#[derive(Clone, Debug, Default)]
pub struct MonitorRegistry {
    inner: Arc<RwLock<Arc<MonitorMap>>>,
}

impl MonitorRegistry {
    pub fn new(map: MonitorMap) -> Self {
        gauge!("monitor_registry_entries").set(map.len() as f64);
        Self {
            inner: Arc::new(RwLock::new(Arc::new(map))),
        }
    }

    /// Current snapshot. A poisoned lock reads as an empty map.
    pub fn snapshot(&self) -> Arc<MonitorMap> {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(_) => Arc::new(MonitorMap::default()),
        }
    }

    pub fn resolve(&self, monitor_id: &str) -> Option<String> {
        self.snapshot().resolve(monitor_id).map(str::to_string)
    }

    /// Swap in a new map.
    pub fn replace(&self, map: MonitorMap) {
        let len = map.len();
        match self.inner.write() {
            Ok(mut g) => *g = Arc::new(map),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(map),
        }
        gauge!("monitor_registry_entries").set(len as f64);
    }

    /// Reload from `path`. On error the current map stays in place.
    pub fn reload_from(&self, path: &Path) -> Result<usize> {
        let map = MonitorMap::load_from(path)?;
        let len = map.len();
        self.replace(map);
        info!(path = %path.display(), entries = len, "monitor map reloaded");
        Ok(len)
    }
}

fn hot_reload_enabled() -> bool {
    std::env::var(ENV_MONITOR_MAP_HOT_RELOAD)
        .ok()
        .is_some_and(|v| v == "1")
}

const HOT_RELOAD_POLL: Duration = Duration::from_secs(2);

/// Poll `path` mtime every 2s and reload on change. No-op unless MONITOR_MAP_HOT_RELOAD=1.
pub fn start_hot_reload_thread(
    registry: MonitorRegistry,
    path: PathBuf,
) -> Option<thread::JoinHandle<()>> {
    if !hot_reload_enabled() {
        return None;
    }
    info!(path = %path.display(), "monitor map hot reload enabled");
    Some(spawn_hot_reload(registry, path, HOT_RELOAD_POLL))
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Ungated watcher loop. The mtime is sampled before the thread starts; a file
/// that appears later, or whose mtime changes, is reloaded. A file that
/// disappears keeps the current map.
pub fn spawn_hot_reload(
    registry: MonitorRegistry,
    path: PathBuf,
    poll: Duration,
) -> thread::JoinHandle<()> {
    let mut last_mtime = modified(&path);

    thread::spawn(move || loop {
        thread::sleep(poll);
        let current = modified(&path);
        let changed = match (last_mtime, current) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(prev), Some(now)) => now != prev,
        };
        if changed {
            if let Err(e) = registry.reload_from(&path) {
                warn!(error = ?e, "monitor map reload failed; keeping previous map");
            }
            last_mtime = current;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_map_trims_and_skips_non_strings() {
        let m = MonitorMap::from_json_str(
            r#"{" m1 ": "workflow_tools", "m2": "", "m3": 5, "m4": "policy_reports"}"#,
        )
        .unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.resolve("m1"), Some("workflow_tools"));
        assert_eq!(m.resolve("m4"), Some("policy_reports"));
        assert_eq!(m.resolve("m2"), None);
    }

    #[test]
    fn json_array_is_rejected() {
        assert!(MonitorMap::from_json_str(r#"["m1"]"#).is_err());
    }

    #[test]
    fn toml_map_is_accepted() {
        let m = MonitorMap::from_toml_str(
            r#"
[monitors]
m1 = "funding_models"
"#,
        )
        .unwrap();
        assert_eq!(m.resolve("m1"), Some("funding_models"));
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let m = MonitorMap::load_or_empty(Path::new("does/not/exist.json"));
        assert!(m.is_empty());
    }

    #[test]
    fn replace_does_not_affect_held_snapshot() {
        let reg = MonitorRegistry::new(MonitorMap::from_pairs([("m1", "a")]));
        let held = reg.snapshot();
        reg.replace(MonitorMap::from_pairs([("m1", "b")]));
        assert_eq!(held.resolve("m1"), Some("a"));
        assert_eq!(reg.resolve("m1").as_deref(), Some("b"));
    }
}
