//! Assembly of the report bundle.
//!
//! Two interchangeable strategies produce the same `Bundle`:
//! - `DirectAggregator` queries the relation store for every relation
//! - `CachedAggregator` reads whole-relation snapshots and narrows them in memory
//!
//! `Dispatcher` picks one per request. `SingleEntityAggregator` serves the
//! single-employee, single-day drill-down and never uses the cache.

pub mod cached;
pub mod direct;
pub mod dispatch;
pub mod single;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ReportError;
use crate::models::{Cluster, JournalPeriod, Schedule, Serve, StatementRow};
use crate::store::{DivisionFilter, StatementFilter};

pub use cached::CachedAggregator;
pub use direct::DirectAggregator;
pub use dispatch::{Dispatcher, Route};
pub use single::{EmployeeDay, SingleEntityAggregator};

/// Scope of one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub division: DivisionFilter,
    pub employee_ids: Option<Vec<i64>>,
    pub site_ids: Option<Vec<i64>>,
    pub use_cache: bool,
}

impl ReportRequest {
    pub fn new(date_from: NaiveDate, date_to: NaiveDate) -> Result<Self, ReportError> {
        if date_from > date_to {
            return Err(ReportError::InvalidRange { date_from, date_to });
        }
        Ok(Self {
            date_from,
            date_to,
            division: DivisionFilter::Any,
            employee_ids: None,
            site_ids: None,
            use_cache: true,
        })
    }

    pub fn division(mut self, division: impl Into<DivisionFilter>) -> Self {
        self.division = division.into();
        self
    }

    pub fn employees(mut self, ids: Vec<i64>) -> Self {
        self.employee_ids = Some(ids);
        self
    }

    pub fn sites(mut self, ids: Vec<i64>) -> Self {
        self.site_ids = Some(ids);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn statement_filter(&self) -> StatementFilter {
        StatementFilter {
            date_from: self.date_from,
            date_to: self.date_to,
            division: self.division.clone(),
            employee_ids: self.employee_ids.clone(),
            site_ids: self.site_ids.clone(),
        }
    }
}

/// The five relations of one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bundle {
    pub statements: Vec<StatementRow>,
    pub journal: Vec<JournalPeriod>,
    pub schedules: Vec<Schedule>,
    pub serves: Vec<Serve>,
    pub clusters: Vec<Cluster>,
}

impl Bundle {
    /// Sort every relation by its natural key.
    pub fn normalize(&mut self) {
        self.statements
            .sort_by(|a, b| (a.date, a.employee_id, a.site_id, &a.code).cmp(&(b.date, b.employee_id, b.site_id, &b.code)));
        self.journal
            .sort_by_key(|p| (p.employee_id, p.period_start, p.device_id, p.period_end));
        self.schedules.sort_by_key(|s| s.employee_id);
        self.serves
            .sort_by_key(|s| (s.date, s.employee_id, s.object_id));
        self.clusters
            .sort_by_key(|c| (c.device_id, c.datetime, c.cluster_id, c.leaving_time));
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// A strategy producing the bundle of a request.
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// `today` is the as-of date for open journal periods, the cache
    /// window and same-day augmentation.
    async fn assemble(&self, request: &ReportRequest, today: NaiveDate) -> Result<Bundle, ReportError>;

    fn name(&self) -> &'static str;
}

pub(crate) fn distinct_employee_ids(statements: &[StatementRow]) -> Vec<i64> {
    statements
        .iter()
        .map(|row| row.employee_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub(crate) fn distinct_device_ids(journal: &[JournalPeriod]) -> Vec<i64> {
    journal
        .iter()
        .map(|period| period.device_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
