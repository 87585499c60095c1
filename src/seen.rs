// src/seen.rs
//! Seen-set: links that were already notified in a previous run.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::error::StorageError;
use crate::storage::KvStore;

/// Ordered, duplicate-free set of links. Insertion order is kept so the stored
/// array reads oldest-first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    links: Vec<String>,
    index: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, link: &str) -> bool {
        self.index.contains(link)
    }

    /// Returns false if the link was already present.
    pub fn insert(&mut self, link: impl Into<String>) -> bool {
        let link = link.into();
        if self.index.contains(&link) {
            return false;
        }
        self.index.insert(link.clone());
        self.links.push(link);
        true
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.links
    }

    fn from_value(key: &str, v: Value) -> Result<Self, StorageError> {
        let links: Vec<String> =
            serde_json::from_value(v).map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(links.into_iter().collect())
    }

    fn to_value(&self) -> Value {
        Value::from(self.links.clone())
    }
}

impl<S: Into<String>> FromIterator<S> for SeenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SeenSet::new();
        for s in iter {
            set.insert(s);
        }
        set
    }
}

/// Read/merge/write contract over one storage key.
#[derive(Clone)]
pub struct SeenStore {
    kv: Arc<dyn KvStore>,
    key: String,
}

impl SeenStore {
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Never fails: an unreadable store counts as empty, so everything looks
    /// new rather than the run stalling.
    pub async fn load(&self) -> SeenSet {
        match self.snapshot().await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(target: "seen", error = %e, key = %self.key, "seen-set unreadable, treating as empty");
                SeenSet::new()
            }
        }
    }

    /// Strict read, for diagnostics and for commit.
    pub async fn snapshot(&self) -> Result<SeenSet, StorageError> {
        match self.kv.get(&self.key).await? {
            None | Some(Value::Null) => Ok(SeenSet::new()),
            Some(v) => SeenSet::from_value(&self.key, v),
        }
    }

    /// Merge `new_links` into what is stored now and write the union back.
    /// Returns the stored size afterwards.
    ///
    /// If the store cannot be read (I/O or backend failure) nothing is
    /// written, otherwise history would be replaced by just `new_links`.
    /// A value that reads fine but is not a list of links is replaced.
    pub async fn commit<I, S>(&self, new_links: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut current = match self.snapshot().await {
            Ok(set) => set,
            Err(e @ StorageError::Corrupt { .. }) => {
                tracing::warn!(target: "seen", error = %e, key = %self.key, "stored seen-set is corrupt, starting a new one");
                SeenSet::new()
            }
            Err(e) => return Err(e),
        };
        let mut added = 0usize;
        for l in new_links {
            if current.insert(l) {
                added += 1;
            }
        }
        if added > 0 {
            self.kv.set(&self.key, current.to_value()).await?;
        }
        tracing::debug!(target: "seen", added, total = current.len(), "seen-set committed");
        Ok(current.len())
    }

    /// Administrative reset.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let existed = self.kv.delete(&self.key).await?;
        tracing::info!(target: "seen", key = %self.key, existed, "seen-set cleared");
        Ok(())
    }
}
