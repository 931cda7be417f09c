//! `ResultCache`: stores `AgentResult::Success` outputs keyed by
//! `hash(pr, head-sha, config-hash, agent-id)`. Read-many,
//! write-once per key; concurrent writes for the same key are idempotent
//! on identical content.

use crate::error::Result;
use crate::types::{stable_fingerprint, AgentMetrics, Finding};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub findings: Vec<Finding>,
    pub metrics: AgentMetrics,
    pub cached_at_unix_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultCache {
    pub entries: HashMap<String, CacheEntry>,
    pub cache_version: String,
    #[serde(skip)]
    pub cache_path: PathBuf,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(PathBuf::from(".router-cache/results.json"))
    }
}

impl ResultCache {
    const CACHE_VERSION: &'static str = "1.0.0";

    pub fn new(cache_path: PathBuf) -> Self {
        Self {
            entries: HashMap::new(),
            cache_version: Self::CACHE_VERSION.to_string(),
            cache_path,
        }
    }

    /// `hash(pr, head-sha, config-hash, agent-id)`.
    pub fn key(pr: &str, head_sha: &str, config_hash: &str, agent_id: &str) -> String {
        stable_fingerprint(&[pr, head_sha, config_hash, agent_id])
    }

    pub async fn load(cache_path: PathBuf) -> Result<Self> {
        if let Some(parent) = cache_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }

        if let Ok(content) = fs::read_to_string(&cache_path).await {
            match serde_json::from_str::<Self>(&content) {
                Ok(mut cache) if cache.cache_version == Self::CACHE_VERSION => {
                    cache.cache_path = cache_path;
                    Ok(cache)
                }
                _ => {
                    tracing::warn!("result cache version mismatch or invalid format, starting fresh");
                    Ok(Self::new(cache_path))
                }
            }
        } else {
            Ok(Self::new(cache_path))
        }
    }

    pub async fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.cache_path, content).await?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Idempotent on identical content — a concurrent write for the same
    /// key with the same findings is a no-op, not a conflict.
    pub fn put(&mut self, key: String, findings: Vec<Finding>, metrics: AgentMetrics, now_unix_ms: u64) {
        self.entries.entry(key).or_insert(CacheEntry {
            findings,
            metrics,
            cached_at_unix_ms: now_unix_ms,
        });
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
        }
    }
}

#[derive(Debug)]
pub struct CacheStats {
    pub total_entries: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "result cache: {} entries", self.total_entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn key_is_stable_and_order_sensitive() {
        let a = ResultCache::key("pr-1", "sha1", "cfg1", "agent1");
        let b = ResultCache::key("pr-1", "sha1", "cfg1", "agent1");
        let c = ResultCache::key("pr-1", "sha1", "cfg1", "agent2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn put_is_idempotent_on_first_write() {
        let mut cache = ResultCache::default();
        let key = ResultCache::key("pr-1", "sha1", "cfg1", "agent1");
        let finding = Finding::new(Severity::Warning, "f.rs", Some(1), "msg", "rule", "agent1", "fp1");
        let metrics = AgentMetrics {
            duration_ms: 10,
            estimated_tokens: 0,
            estimated_usd: 0.0,
        };
        cache.put(key.clone(), vec![finding.clone()], metrics.clone(), 1000);
        cache.put(key.clone(), vec![], metrics, 2000);
        let entry = cache.get(&key).unwrap();
        assert_eq!(entry.findings.len(), 1);
        assert_eq!(entry.cached_at_unix_ms, 1000);
    }
}
