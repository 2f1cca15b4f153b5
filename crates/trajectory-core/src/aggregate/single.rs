use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::cluster::{resolved_pings, ClusterDeriver};
use crate::error::ReportError;
use crate::models::{find_active_period, Cluster, Coordinate, StatementRow};
use crate::store::{DivisionFilter, RelationStore};

/// One employee's day: declared statements, derived stays and every ping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmployeeDay {
    pub statements: Vec<StatementRow>,
    pub clusters: Vec<Cluster>,
    /// All pings requested that day, including unresolved ones.
    pub locations: Vec<Coordinate>,
}

/// Drill-down for one employee on one date. Always reads the store.
pub struct SingleEntityAggregator<'a> {
    store: &'a dyn RelationStore,
    deriver: &'a dyn ClusterDeriver,
}

impl<'a> SingleEntityAggregator<'a> {
    pub fn new(store: &'a dyn RelationStore, deriver: &'a dyn ClusterDeriver) -> Self {
        Self { store, deriver }
    }

    pub async fn assemble(
        &self,
        employee_id: i64,
        date: NaiveDate,
        division: &DivisionFilter,
        today: NaiveDate,
    ) -> Result<EmployeeDay, ReportError> {
        let statements = self.store.statements_for_day(employee_id, date, division).await?;

        let journal = self.store.journal_for_employee(employee_id).await?;
        let period = find_active_period(&journal, date, today)
            .ok_or(ReportError::MissingBinding { employee_id, date })?;
        let device_id = period.device_id;

        let locations = self.store.locations_for_day(device_id, date).await?;
        let pings = resolved_pings(&locations);
        if pings.is_empty() {
            return Err(ReportError::NoLocationData {
                employee_id,
                device_id,
                date,
            });
        }

        let clusters = match self.deriver.derive(&pings) {
            Ok(clusters) => clusters,
            Err(e) => {
                warn!(employee_id, device_id, %date, error = %e, "Clusters were not built");
                Vec::new()
            }
        };

        info!(
            employee_id,
            device_id,
            %date,
            locations = locations.len(),
            clusters = clusters.len(),
            "Assembled employee day"
        );

        Ok(EmployeeDay {
            statements,
            clusters,
            locations,
        })
    }
}
