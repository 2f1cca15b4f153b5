//! Snapshot-backed aggregation.
//!
//! Every relation is read as a whole-window snapshot and then narrowed in
//! memory with the same predicates the relation store applies, so for a
//! request inside the window the bundle is set-equal to the direct one.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::{distinct_device_ids, distinct_employee_ids, Aggregator, Bundle, ReportRequest};
use crate::cache::{self, Record, SnapshotCache};
use crate::cluster::{append_live_clusters, includes_today, ClusterDeriver};
use crate::error::{ReportError, StoreError};
use crate::models::{
    Cluster, Division, Employee, JournalEntry, JournalPeriod, Schedule, Serve, Site, Statement,
    StatementRow,
};
use crate::store::{DivisionFilter, RelationStore, StatementFilter};
use crate::window::CacheWindow;

pub struct CachedAggregator<'a> {
    store: &'a dyn RelationStore,
    cache: &'a dyn SnapshotCache,
    deriver: &'a dyn ClusterDeriver,
}

impl<'a> CachedAggregator<'a> {
    pub fn new(
        store: &'a dyn RelationStore,
        cache: &'a dyn SnapshotCache,
        deriver: &'a dyn ClusterDeriver,
    ) -> Self {
        Self {
            store,
            cache,
            deriver,
        }
    }

    /// Snapshot of `R` for `window`, rebuilt from `source` when absent or
    /// built for another window.
    async fn get_or_refresh<R, F, Fut>(&self, window: &CacheWindow, source: F) -> Result<Vec<R>, ReportError>
    where
        R: Record + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Vec<R>, StoreError>> + Send,
    {
        let relation = R::RELATION;
        if let Some(snapshot) = cache::load::<R>(self.cache).await? {
            if snapshot.window_start == window.start {
                debug!(%relation, rows = snapshot.rows.len(), "Snapshot hit");
                return Ok(snapshot.rows);
            }
            info!(
                %relation,
                snapshot_window = %snapshot.window_start,
                window = %window.start,
                "Snapshot belongs to another window"
            );
        }

        let rows = source().await?;
        info!(%relation, rows = rows.len(), window = %window.start, "Refreshing snapshot");
        self.store_snapshot(&rows, window).await;
        Ok(rows)
    }

    /// A failed write only costs the next request a refill.
    async fn store_snapshot<R>(&self, rows: &[R], window: &CacheWindow)
    where
        R: Record + Send + Sync + 'static,
    {
        if let Err(e) = cache::save(self.cache, rows, window.start).await {
            let relation = R::RELATION;
            warn!(%relation, error = %e, "Failed to store snapshot");
        }
    }

    async fn statements(
        &self,
        window: &CacheWindow,
        filter: &StatementFilter,
    ) -> Result<Vec<StatementRow>, ReportError> {
        let statements: Vec<Statement> = self
            .get_or_refresh(window, || self.store.all_statements(window.start))
            .await?;
        let employees: Vec<Employee> = self.get_or_refresh(window, || self.store.employees()).await?;
        let sites: Vec<Site> = self.get_or_refresh(window, || self.store.sites()).await?;
        let divisions: Vec<Division> = match filter.division {
            DivisionFilter::ByName(_) => self.get_or_refresh(window, || self.store.divisions()).await?,
            _ => Vec::new(),
        };

        Ok(narrow_statements(filter, &statements, &employees, &sites, &divisions))
    }

    /// Rebuild every snapshot for the window of `today`, overwriting what is cached.
    pub async fn refresh_all(&self, today: NaiveDate) -> Result<(), ReportError> {
        let window = CacheWindow::as_of(today);
        let since = window.start;

        let statements = self.store.all_statements(since).await?;
        cache::save(self.cache, &statements, since).await?;
        let employees = self.store.employees().await?;
        cache::save(self.cache, &employees, since).await?;
        let sites = self.store.sites().await?;
        cache::save(self.cache, &sites, since).await?;
        let divisions = self.store.divisions().await?;
        cache::save(self.cache, &divisions, since).await?;
        let schedules = self.store.all_schedules().await?;
        cache::save(self.cache, &schedules, since).await?;
        let journal = self.store.all_journal().await?;
        cache::save(self.cache, &journal, since).await?;
        let serves = self.store.all_serves(since).await?;
        cache::save(self.cache, &serves, since).await?;
        let clusters = self.store.all_clusters(since).await?;
        cache::save(self.cache, &clusters, since).await?;

        info!(window = %since, backend = self.cache.backend_type(), "Refreshed all snapshots");
        Ok(())
    }
}

#[async_trait]
impl Aggregator for CachedAggregator<'_> {
    async fn assemble(&self, request: &ReportRequest, today: NaiveDate) -> Result<Bundle, ReportError> {
        let (date_from, date_to) = (request.date_from, request.date_to);
        let window = CacheWindow::as_of(today);
        if !window.contains(date_from) {
            return Err(ReportError::OutsideCacheWindow {
                date_from,
                window_start: window.start,
            });
        }

        let statements = self.statements(&window, &request.statement_filter()).await?;
        if statements.is_empty() {
            return Err(ReportError::EmptyResult { date_from, date_to });
        }
        let employee_ids = distinct_employee_ids(&statements);

        let journal_snapshot: Vec<JournalEntry> =
            self.get_or_refresh(&window, || self.store.all_journal()).await?;
        let journal = narrow_journal(&journal_snapshot, &employee_ids, today);
        let device_ids = distinct_device_ids(&journal);

        let schedules: Vec<Schedule> = self.get_or_refresh(&window, || self.store.all_schedules()).await?;
        let serves: Vec<Serve> = self
            .get_or_refresh(&window, || self.store.all_serves(window.start))
            .await?;
        let clusters: Vec<Cluster> = self
            .get_or_refresh(&window, || self.store.all_clusters(window.start))
            .await?;

        let schedules = narrow_schedules(schedules, &employee_ids);
        let serves = narrow_serves(serves, date_from, date_to, &employee_ids);
        let mut clusters = narrow_clusters(clusters, date_from, date_to, &device_ids);

        if includes_today(date_from, date_to, today) {
            append_live_clusters(&mut clusters, self.store, self.deriver, &device_ids, today).await?;
        }

        info!(
            %date_from,
            %date_to,
            statements = statements.len(),
            clusters = clusters.len(),
            "Assembled report from snapshots"
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
        "cached"
    }
}

// ===== In-memory narrowing =====

fn in_range(date: NaiveDate, date_from: NaiveDate, date_to: NaiveDate) -> bool {
    date_from <= date && date <= date_to
}

/// Inner join of statements with employees and sites, then the statement filters.
fn narrow_statements(
    filter: &StatementFilter,
    statements: &[Statement],
    employees: &[Employee],
    sites: &[Site],
    divisions: &[Division],
) -> Vec<StatementRow> {
    let employees: HashMap<i64, &Employee> = employees.iter().map(|e| (e.id, e)).collect();
    let sites: HashMap<i64, &Site> = sites.iter().map(|s| (s.id, s)).collect();
    let division_ids = filter.division.resolve_ids(divisions).map(|ids| id_set(&ids));
    let employee_scope = filter.employee_scope().map(id_set);
    let site_scope = filter.site_scope().map(id_set);

    statements
        .iter()
        .filter(|s| in_range(s.date, filter.date_from, filter.date_to))
        .filter(|s| division_ids.as_ref().map_or(true, |ids| ids.contains(&s.division_id)))
        .filter(|s| employee_scope.as_ref().map_or(true, |ids| ids.contains(&s.employee_id)))
        .filter(|s| site_scope.as_ref().map_or(true, |ids| ids.contains(&s.object_id)))
        .filter_map(|s| {
            let employee = employees.get(&s.employee_id)?;
            let site = sites.get(&s.object_id)?;
            Some(StatementRow::join(s, employee, site))
        })
        .collect()
}

fn id_set(ids: &[i64]) -> HashSet<i64> {
    ids.iter().copied().collect()
}

fn narrow_journal(entries: &[JournalEntry], employee_ids: &[i64], today: NaiveDate) -> Vec<JournalPeriod> {
    let employee_ids = id_set(employee_ids);
    entries
        .iter()
        .filter(|entry| employee_ids.contains(&entry.employee_id))
        .map(|entry| entry.resolve(today))
        .collect()
}

fn narrow_schedules(schedules: Vec<Schedule>, employee_ids: &[i64]) -> Vec<Schedule> {
    let employee_ids = id_set(employee_ids);
    schedules
        .into_iter()
        .filter(|s| employee_ids.contains(&s.employee_id))
        .collect()
}

fn narrow_serves(
    serves: Vec<Serve>,
    date_from: NaiveDate,
    date_to: NaiveDate,
    employee_ids: &[i64],
) -> Vec<Serve> {
    let employee_ids = id_set(employee_ids);
    serves
        .into_iter()
        .filter(|s| employee_ids.contains(&s.employee_id) && in_range(s.date, date_from, date_to))
        .collect()
}

fn narrow_clusters(
    clusters: Vec<Cluster>,
    date_from: NaiveDate,
    date_to: NaiveDate,
    device_ids: &[i64],
) -> Vec<Cluster> {
    let device_ids = id_set(device_ids);
    clusters
        .into_iter()
        .filter(|c| device_ids.contains(&c.device_id) && in_range(c.date, date_from, date_to))
        .collect()
}
