use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};

use super::{distinct_device_ids, distinct_employee_ids, Aggregator, Bundle, ReportRequest};
use crate::cluster::{append_live_clusters, includes_today, ClusterDeriver};
use crate::error::ReportError;
use crate::models::JournalPeriod;
use crate::store::RelationStore;

/// Builds the bundle straight from the relation store.
pub struct DirectAggregator<'a> {
    store: &'a dyn RelationStore,
    deriver: &'a dyn ClusterDeriver,
}

impl<'a> DirectAggregator<'a> {
    pub fn new(store: &'a dyn RelationStore, deriver: &'a dyn ClusterDeriver) -> Self {
        Self { store, deriver }
    }
}

#[async_trait]
impl Aggregator for DirectAggregator<'_> {
    async fn assemble(&self, request: &ReportRequest, today: NaiveDate) -> Result<Bundle, ReportError> {
        let (date_from, date_to) = (request.date_from, request.date_to);

        let statements = self.store.statements(&request.statement_filter()).await?;
        if statements.is_empty() {
            return Err(ReportError::EmptyResult { date_from, date_to });
        }
        let employee_ids = distinct_employee_ids(&statements);

        let journal: Vec<JournalPeriod> = self
            .store
            .journal(&employee_ids)
            .await?
            .iter()
            .map(|entry| entry.resolve(today))
            .collect();
        let device_ids = distinct_device_ids(&journal);
        debug!(
            employees = employee_ids.len(),
            devices = device_ids.len(),
            "Resolved report scope"
        );

        let (schedules, serves, mut clusters) = futures::try_join!(
            self.store.schedules(&employee_ids),
            self.store.serves(date_from, date_to, &employee_ids),
            self.store.clusters(date_from, date_to, &device_ids),
        )?;

        if includes_today(date_from, date_to, today) {
            append_live_clusters(&mut clusters, self.store, self.deriver, &device_ids, today).await?;
        }

        info!(
            %date_from,
            %date_to,
            statements = statements.len(),
            clusters = clusters.len(),
            "Assembled report from store"
        );

        Ok(Bundle {
            statements,
            journal,
            schedules,
            serves,
            clusters,
        })
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}
