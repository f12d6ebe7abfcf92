//! Ephemeral analysis store: bridge the gap between analysis and export.
//!
//! The HTTP surface hands the client a short-lived `analysis_id` so derived
//! exports can be fetched in a follow-up request. The store behind that id
//! is an explicit, injected interface ([`AnalysisStore`]) with a defined TTL
//! policy — swapping the in-memory implementation for an external store with
//! expiry is a trait implementation, not a rewrite.
//!
//! [`MemoryStore`] is valid only for the lifetime of one process and must
//! never be treated as correctness-relevant in a horizontally scaled
//! deployment: each instance has its own map, and an expired or unknown id
//! simply yields `None` (a 404 upstream).

use crate::output::Proposal;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// What the export endpoints need from a finished analysis.
#[derive(Debug, Clone)]
pub struct StoredAnalysis {
    pub url: String,
    pub proposal: Proposal,
}

/// Keyed store for finished analyses.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Store an analysis and return its freshly minted id.
    async fn insert(&self, analysis: StoredAnalysis) -> Uuid;

    /// Fetch a stored analysis; `None` when unknown or expired.
    async fn get(&self, id: Uuid) -> Option<StoredAnalysis>;
}

struct Entry {
    analysis: StoredAnalysis,
    stored_at: Instant,
}

/// In-memory TTL store. Expired entries are purged on every insert and
/// lookup; there is no background reaper to manage.
pub struct MemoryStore {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn purge(&self, entries: &mut HashMap<Uuid, Entry>) {
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn insert(&self, analysis: StoredAnalysis) -> Uuid {
        let id = Uuid::new_v4();
        let mut entries = self.entries.lock().await;
        self.purge(&mut entries);
        entries.insert(
            id,
            Entry {
                analysis,
                stored_at: Instant::now(),
            },
        );
        debug!("stored analysis {id} ({} live entries)", entries.len());
        id
    }

    async fn get(&self, id: Uuid) -> Option<StoredAnalysis> {
        let mut entries = self.entries.lock().await;
        self.purge(&mut entries);
        entries.get(&id).map(|entry| entry.analysis.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Language;

    fn sample() -> StoredAnalysis {
        StoredAnalysis {
            url: "https://example.com/".into(),
            proposal: Proposal {
                text: "Dear owner".into(),
                language: Language::En,
            },
        }
    }

    #[tokio::test]
    async fn insert_then_get_roundtrips() {
        let store = MemoryStore::default();
        let id = store.insert(sample()).await;
        let fetched = store.get(id).await.expect("entry should be live");
        assert_eq!(fetched.url, "https://example.com/");
        assert_eq!(fetched.proposal.text, "Dear owner");
    }

    #[tokio::test]
    async fn unknown_id_yields_none() {
        let store = MemoryStore::default();
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_gone() {
        let store = MemoryStore::new(Duration::from_millis(0));
        let id = store.insert(sample()).await;
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn ids_are_unique_per_insert() {
        let store = MemoryStore::default();
        let a = store.insert(sample()).await;
        let b = store.insert(sample()).await;
        assert_ne!(a, b);
    }
}
