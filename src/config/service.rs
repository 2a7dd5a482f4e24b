// src/config/service.rs
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::fetch::parallel::DEFAULT_BASE_URL;
use crate::registry::{DEFAULT_MONITOR_MAP_PATH, ENV_MONITOR_MAP_PATH};
use crate::store::supabase::DEFAULT_TABLE;

pub const DEFAULT_WEBHOOK_PATH: &str = "/parallel-webhooks";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 15;

/// Storage credentials; both must be present to use the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    pub table: String,
}

/// Runtime settings derived from the environment (`.env` is loaded by the entrypoint).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub parallel_api_key: String,
    pub parallel_base_url: String,
    pub fetch_timeout: Duration,
    pub store_timeout: Duration,
    /// `None` → in-memory store.
    pub supabase: Option<SupabaseConfig>,
    pub monitor_map_path: PathBuf,
    pub webhook_path: String,
    pub public_webhook_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            parallel_api_key: String::new(),
            parallel_base_url: DEFAULT_BASE_URL.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
            supabase: None,
            monitor_map_path: PathBuf::from(DEFAULT_MONITOR_MAP_PATH),
            webhook_path: DEFAULT_WEBHOOK_PATH.to_string(),
            public_webhook_url: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        if let Some(k) = get("PARALLEL_API_KEY") {
            cfg.parallel_api_key = k;
        }
        if let Some(u) = get("PARALLEL_API_BASE_URL") {
            cfg.parallel_base_url = u;
        }
        if let Some(t) = get("PARALLEL_FETCH_TIMEOUT_SECS") {
            let secs: u64 = t
                .parse()
                .with_context(|| format!("PARALLEL_FETCH_TIMEOUT_SECS must be an integer, got {t:?}"))?;
            cfg.fetch_timeout = Duration::from_secs(secs.max(1));
        }

        // Older deployments shipped the key as SUPBASE_KEY.
        let key = get("SUPABASE_KEY").or_else(|| get("SUPBASE_KEY"));
        cfg.supabase = match (get("SUPABASE_URL"), key) {
            (Some(url), Some(key)) => Some(SupabaseConfig {
                url,
                key,
                table: get("SUPABASE_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            }),
            (None, None) => None,
            _ => {
                warn!("only one of SUPABASE_URL / SUPABASE_KEY is set; using in-memory store");
                None
            }
        };

        if let Some(p) = get(ENV_MONITOR_MAP_PATH) {
            cfg.monitor_map_path = PathBuf::from(p);
        }

        cfg.public_webhook_url = get("PUBLIC_WEBHOOK_URL");
        let from_public = cfg
            .public_webhook_url
            .as_deref()
            .map(|u| url_path(u).with_context(|| format!("PUBLIC_WEBHOOK_URL is not a URL: {u}")))
            .transpose()?;

        cfg.webhook_path = match (get("WEBHOOK_PATH"), from_public) {
            (Some(explicit), Some(public)) => {
                let explicit = normalize_path(&explicit);
                if explicit != public {
                    warn!(
                        route = %explicit,
                        registered = %public,
                        "WEBHOOK_PATH differs from PUBLIC_WEBHOOK_URL; monitor callbacks will miss the route"
                    );
                }
                explicit
            }
            (Some(explicit), None) => normalize_path(&explicit),
            (None, Some(public)) => public,
            (None, None) => DEFAULT_WEBHOOK_PATH.to_string(),
        };

        Ok(cfg)
    }
}

fn url_path(u: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(u)?;
    Ok(normalize_path(parsed.path()))
}

fn normalize_path(p: &str) -> String {
    let trimmed = p.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_WEBHOOK_PATH.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
