//! Stay clusters from raw pings.
//!
//! Historic clusters are produced by a batch job and read from the store.
//! Pings of the current day are not clustered yet, so reports covering
//! today derive their clusters at read time through a `ClusterDeriver`.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{ClusterDerivationError, StoreError};
use crate::models::{Cluster, Coordinate, Ping};
use crate::store::RelationStore;

/// Geometric clustering of pings into stays.
pub trait ClusterDeriver: Send + Sync {
    /// Fails when the pings are too few or malformed to cluster.
    fn derive(&self, pings: &[Ping]) -> Result<Vec<Cluster>, ClusterDerivationError>;
}

/// Pings with a reported position; unresolved requests are dropped.
pub fn resolved_pings(coordinates: &[Coordinate]) -> Vec<Ping> {
    coordinates.iter().filter_map(Coordinate::to_ping).collect()
}

pub fn includes_today(date_from: NaiveDate, date_to: NaiveDate, today: NaiveDate) -> bool {
    date_from <= today && today <= date_to
}

/// Append clusters derived from today's pings of `device_ids` to `clusters`.
///
/// A derivation failure leaves `clusters` untouched; only store errors are
/// returned.
pub async fn append_live_clusters(
    clusters: &mut Vec<Cluster>,
    store: &dyn RelationStore,
    deriver: &dyn ClusterDeriver,
    device_ids: &[i64],
    today: NaiveDate,
) -> Result<(), StoreError> {
    let locations = store.current_locations(device_ids, today).await?;
    let pings = resolved_pings(&locations);
    if pings.is_empty() {
        debug!(devices = device_ids.len(), "No current locations to cluster");
        return Ok(());
    }

    match deriver.derive(&pings) {
        Ok(derived) => {
            info!(
                pings = pings.len(),
                clusters = derived.len(),
                "Derived clusters from current locations"
            );
            clusters.extend(derived);
        }
        Err(e) => {
            warn!(
                error = %e,
                pings = pings.len(),
                "Clusters from current locations were not built"
            );
        }
    }
    Ok(())
}
