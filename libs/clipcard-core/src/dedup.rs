//! Content fingerprints and the bounded recent-clip cache.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};

/// Lowercase, collapse whitespace runs and trim.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA-256 hex digest of the normalized text.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One remembered fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    pub fingerprint: String,
    pub recorded_at: DateTime<Utc>,
}

/// FIFO cache of recently accepted fingerprints.
///
/// Holds at most `capacity` entries; the oldest is evicted first.
/// Re-recording a fingerprint already present does not refresh it.
#[derive(Debug, Clone)]
pub struct DedupCache {
    capacity: usize,
    max_age: Option<Duration>,
    order: VecDeque<DedupEntry>,
    members: HashSet<String>,
}

impl DedupCache {
    pub fn new(capacity: usize, max_age: Option<Duration>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            max_age,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    pub fn seen(&self, fingerprint: &str) -> bool {
        self.members.contains(fingerprint)
    }

    pub fn record(&mut self, fingerprint: impl Into<String>) {
        self.record_at(fingerprint, Utc::now());
    }

    pub fn record_at(&mut self, fingerprint: impl Into<String>, at: DateTime<Utc>) {
        let fingerprint = fingerprint.into();
        if self.members.contains(&fingerprint) {
            return;
        }
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(evicted) => {
                    self.members.remove(&evicted.fingerprint);
                }
                None => break,
            }
        }
        self.members.insert(fingerprint.clone());
        self.order.push_back(DedupEntry {
            fingerprint,
            recorded_at: at,
        });
    }

    /// Drop entries older than `max_age`. Returns how many were removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let Some(max_age) = self.max_age else {
            return 0;
        };
        let cutoff = now - max_age;
        let mut removed = 0;
        // Entries are in insertion order, so expired ones sit at the front.
        while self
            .order
            .front()
            .is_some_and(|entry| entry.recorded_at < cutoff)
        {
            if let Some(entry) = self.order.pop_front() {
                self.members.remove(&entry.fingerprint);
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> impl Iterator<Item = &DedupEntry> {
        self.order.iter()
    }
}
