//! Registry of finished downloads awaiting retrieval.
//!
//! A session registers its artifact under a fresh ID and hands the ID to the
//! browser, which then fetches `/api/file/{id}`. Entries expire after a TTL;
//! expired entries are invisible to lookups and their work dirs are removed
//! either lazily on access or by the periodic sweeper.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::download::workdir::WorkDir;

/// A finished artifact and the directory that holds it
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub artifact_path: PathBuf,
    /// Name offered to the browser, e.g. `My Video.mp4`
    pub filename: String,
    pub size_bytes: u64,
    /// Removed together with the entry
    pub work_dir: PathBuf,
    pub created_at: Instant,
}

impl RegistryEntry {
    pub fn new(artifact_path: PathBuf, filename: String, size_bytes: u64, work_dir: PathBuf) -> Self {
        Self {
            artifact_path,
            filename,
            size_bytes,
            work_dir,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

pub struct DownloadRegistry {
    entries: DashMap<String, RegistryEntry>,
    ttl: Duration,
}

impl DownloadRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Stores an entry under a new unique ID and returns the ID.
    pub fn register(&self, entry: RegistryEntry) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            download_id = %id,
            filename = %entry.filename,
            size_bytes = entry.size_bytes,
            "Download registered"
        );
        self.entries.insert(id.clone(), entry);
        id
    }

    /// Returns a copy of a live entry. An expired entry is dropped on the spot.
    pub fn lookup(&self, id: &str) -> Option<RegistryEntry> {
        if let Some(entry) = self.entries.get(id) {
            if !entry.is_expired(self.ttl) {
                return Some(entry.clone());
            }
        }
        // The read guard must be gone before removing from the same shard
        self.remove_if_expired(id);
        None
    }

    /// Removes a live entry and transfers ownership of its files to the caller.
    pub fn take(&self, id: &str) -> Option<RegistryEntry> {
        let (_, entry) = self.entries.remove(id)?;
        if entry.is_expired(self.ttl) {
            tracing::debug!(download_id = %id, "Entry expired before retrieval");
            discard(entry);
            return None;
        }
        Some(entry)
    }

    /// Removes an entry and its work dir. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some((_, entry)) => {
                discard(entry);
                true
            }
            None => false,
        }
    }

    /// Drops every expired entry. Returns how many were purged.
    pub fn purge_expired(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired(self.ttl))
            .map(|e| e.key().clone())
            .collect();

        expired.iter().filter(|id| self.remove_if_expired(id)).count()
    }

    /// Drops every entry regardless of age (server shutdown).
    pub fn clear(&self) -> usize {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.remove(id)).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs [`purge_expired`](Self::purge_expired) every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = self.purge_expired();
                        if purged > 0 {
                            tracing::info!(purged, remaining = self.len(), "Expired downloads purged");
                        }
                    }
                }
            }
            tracing::debug!("Registry sweeper stopped");
        })
    }

    fn remove_if_expired(&self, id: &str) -> bool {
        match self.entries.remove_if(id, |_, entry| entry.is_expired(self.ttl)) {
            Some((id, entry)) => {
                tracing::debug!(download_id = %id, "Expired download removed");
                discard(entry);
                true
            }
            None => false,
        }
    }
}

fn discard(entry: RegistryEntry) {
    drop(WorkDir::adopt(entry.work_dir));
}
