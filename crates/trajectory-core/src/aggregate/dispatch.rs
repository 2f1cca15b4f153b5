//! Per-request choice between the direct and the cached aggregator.

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use super::{Aggregator, Bundle, CachedAggregator, DirectAggregator, EmployeeDay, ReportRequest, SingleEntityAggregator};
use crate::cache::SnapshotCache;
use crate::cluster::ClusterDeriver;
use crate::error::ReportError;
use crate::store::{DivisionFilter, RelationStore};
use crate::window::CacheWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Cached,
}

/// Entry point of the report data layer.
///
/// The cache handle is injected once and borrowed for every request.
pub struct Dispatcher<'a> {
    store: &'a dyn RelationStore,
    cache: Option<&'a dyn SnapshotCache>,
    deriver: &'a dyn ClusterDeriver,
}

impl<'a> Dispatcher<'a> {
    pub fn new(store: &'a dyn RelationStore, deriver: &'a dyn ClusterDeriver) -> Self {
        Self {
            store,
            cache: None,
            deriver,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The cache to serve `request` from, probed once.
    async fn eligible_cache(&self, request: &ReportRequest, today: NaiveDate) -> Option<&'a dyn SnapshotCache> {
        if !request.use_cache {
            return None;
        }
        let window = CacheWindow::as_of(today);
        if !window.contains(request.date_from) {
            info!(
                date_from = %request.date_from,
                window = %window.start,
                "Request starts before cache window"
            );
            return None;
        }
        let cache = self.cache?;
        if !cache.available().await {
            warn!(backend = cache.backend_type(), "Snapshot cache unavailable");
            return None;
        }
        Some(cache)
    }

    pub async fn route(&self, request: &ReportRequest, today: NaiveDate) -> Route {
        match self.eligible_cache(request, today).await {
            Some(_) => Route::Cached,
            None => Route::Direct,
        }
    }

    /// Assemble the bundle as of the current local date.
    pub async fn assemble(&self, request: &ReportRequest) -> Result<Bundle, ReportError> {
        self.assemble_as_of(request, Local::now().date_naive()).await
    }

    pub async fn assemble_as_of(&self, request: &ReportRequest, today: NaiveDate) -> Result<Bundle, ReportError> {
        let direct = DirectAggregator::new(self.store, self.deriver);

        let Some(cache) = self.eligible_cache(request, today).await else {
            info!(aggregator = direct.name(), "Routing report request");
            return direct.assemble(request, today).await;
        };

        let cached = CachedAggregator::new(self.store, cache, self.deriver);
        info!(
            aggregator = cached.name(),
            backend = cache.backend_type(),
            "Routing report request"
        );
        match cached.assemble(request, today).await {
            Err(e) if e.is_cache_fallback() => {
                warn!(
                    error = %e,
                    fallback = direct.name(),
                    "Cached path failed, re-running request"
                );
                direct.assemble(request, today).await
            }
            result => result,
        }
    }

    /// Single employee drill-down as of the current local date.
    pub async fn employee_day(
        &self,
        employee_id: i64,
        date: NaiveDate,
        division: &DivisionFilter,
    ) -> Result<EmployeeDay, ReportError> {
        self.employee_day_as_of(employee_id, date, division, Local::now().date_naive())
            .await
    }

    pub async fn employee_day_as_of(
        &self,
        employee_id: i64,
        date: NaiveDate,
        division: &DivisionFilter,
        today: NaiveDate,
    ) -> Result<EmployeeDay, ReportError> {
        SingleEntityAggregator::new(self.store, self.deriver)
            .assemble(employee_id, date, division, today)
            .await
    }
}
