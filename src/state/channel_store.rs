use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::types::{Channel, FilterConfig};

/// In-memory read cache of channels and their filter configs, refreshed
/// periodically from the database. The scraper asks it which terms to
/// search; the pipeline asks it which configs a candidate must be
/// evaluated against.
pub struct ChannelStore {
    /// channel_id → Channel (with configs)
    channels: DashMap<String, Channel>,
}

impl ChannelStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
        })
    }

    /// Swap the cache contents for a freshly loaded set: stale channels are
    /// dropped, everything else upserted. Returns `(added, removed)` counts
    /// for the refresh log line.
    pub fn replace_all(&self, fresh: Vec<Channel>) -> (usize, usize) {
        let fresh_ids: HashSet<String> = fresh.iter().map(|c| c.id.clone()).collect();
        let stale: Vec<String> = self
            .channels
            .iter()
            .map(|e| e.key().clone())
            .filter(|id| !fresh_ids.contains(id))
            .collect();
        let removed = stale.len();
        for id in stale {
            self.channels.remove(&id);
        }

        let mut added = 0;
        for channel in fresh {
            if self.channels.insert(channel.id.clone(), channel).is_none() {
                added += 1;
            }
        }
        (added, removed)
    }

    pub fn get(&self, channel_id: &str) -> Option<Channel> {
        self.channels.get(channel_id).map(|c| c.clone())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Every distinct search term configured across all channels — the
    /// scraper's work list.
    pub fn distinct_search_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for entry in self.channels.iter() {
            for config in &entry.value().configs {
                if seen.insert(config.search_term.clone()) {
                    terms.push(config.search_term.clone());
                }
            }
        }
        terms
    }

    /// All (channel, config) pairs whose configured term produced this
    /// candidate. One deal may be evaluated for many channels.
    pub fn configs_for_term(&self, term: &str) -> Vec<(Channel, FilterConfig)> {
        let mut out = Vec::new();
        for entry in self.channels.iter() {
            let channel = entry.value();
            for config in &channel.configs {
                if config.search_term == term {
                    out.push((channel.clone(), config.clone()));
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
