//! Snapshot cache for whole relations.
//!
//! This module provides the `SnapshotCache` key/value seam and its backends.
//! A key is a relation name and a value is a compressed columnar snapshot of
//! the full relation restricted to the cache window (see `codec`). Entries
//! never expire; a snapshot built for an older window is treated as a miss.
//!
//! Backends:
//! - `DirSnapshotCache`: one file per relation in a local directory
//! - `HttpSnapshotCache`: a remote cache service
//! - `MemorySnapshotCache`: process-local map

pub mod codec;
pub mod dir;
pub mod http;
pub mod memory;
pub mod records;

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::CacheError;

pub use codec::{Record, Snapshot};
pub use dir::DirSnapshotCache;
pub use http::HttpSnapshotCache;
pub use memory::MemorySnapshotCache;

/// Relations held as snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Statements,
    Employees,
    Objects,
    Divisions,
    Schedules,
    Journal,
    Serves,
    Clusters,
}

impl Relation {
    pub const ALL: [Relation; 8] = [
        Relation::Statements,
        Relation::Employees,
        Relation::Objects,
        Relation::Divisions,
        Relation::Schedules,
        Relation::Journal,
        Relation::Serves,
        Relation::Clusters,
    ];

    /// Cache key of the relation.
    pub fn key(&self) -> &'static str {
        match self {
            Relation::Statements => "statements",
            Relation::Employees => "employees",
            Relation::Objects => "objects",
            Relation::Divisions => "divisions",
            Relation::Schedules => "schedules",
            Relation::Journal => "journal",
            Relation::Serves => "serves",
            Relation::Clusters => "clusters",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|relation| relation.key() == key)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, key: Relation) -> Result<Option<Vec<u8>>, CacheError>;

    async fn put(&self, key: Relation, value: Vec<u8>) -> Result<(), CacheError>;

    /// Liveness probe. Any connection error means unavailable.
    async fn available(&self) -> bool;

    /// Backend name for logging.
    fn backend_type(&self) -> &'static str;
}

/// Read and decode the snapshot of `R`.
///
/// An entry that does not decode is reported as absent so the caller
/// rebuilds it.
pub async fn load<R: Record>(cache: &dyn SnapshotCache) -> Result<Option<Snapshot<R>>, CacheError> {
    let relation = R::RELATION;
    let Some(bytes) = cache.get(relation).await? else {
        return Ok(None);
    };

    match codec::decode::<R>(&bytes) {
        Ok(snapshot) => {
            debug!(
                %relation,
                rows = snapshot.rows.len(),
                age_minutes = snapshot.age_minutes(),
                "Loaded snapshot"
            );
            Ok(Some(snapshot))
        }
        Err(e) => {
            warn!(%relation, error = %e, "Discarding undecodable snapshot");
            Ok(None)
        }
    }
}

/// Encode and store the snapshot of `R` built for the window starting at `window_start`.
pub async fn save<R: Record>(
    cache: &dyn SnapshotCache,
    rows: &[R],
    window_start: NaiveDate,
) -> Result<(), CacheError> {
    let relation = R::RELATION;
    let bytes = codec::encode(rows, window_start)?;
    debug!(%relation, rows = rows.len(), bytes = bytes.len(), "Storing snapshot");
    cache.put(relation, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Division;

    #[test]
    fn test_relation_keys_round_trip() {
        for relation in Relation::ALL {
            assert_eq!(Relation::from_key(relation.key()), Some(relation));
        }
        assert_eq!(Relation::from_key("coordinates"), None);
    }

    #[tokio::test]
    async fn test_load_treats_corrupt_entry_as_miss() {
        let cache = MemorySnapshotCache::new();
        cache.put(Relation::Divisions, b"garbage".to_vec()).await.unwrap();
        let loaded = load::<Division>(&cache).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let cache = MemorySnapshotCache::new();
        let window_start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let divisions = vec![Division { id: 4, name: "East".to_string() }];

        save(&cache, &divisions, window_start).await.unwrap();
        let snapshot = load::<Division>(&cache).await.unwrap().unwrap();
        assert_eq!(snapshot.rows, divisions);
        assert_eq!(snapshot.window_start, window_start);
    }
}
