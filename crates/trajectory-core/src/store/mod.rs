//! Read-only access to the backing relational store.
//!
//! `RelationStore` exposes one operation per relation, each taking only the
//! filters meaningful to it. The unfiltered `all_*` variants are snapshot
//! sources for the cached aggregator.

pub mod query;
pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreError;
use crate::models::{
    Cluster, Coordinate, Division, Employee, JournalEntry, Schedule, Serve, Site, Statement,
    StatementRow,
};

pub use sqlite::SqliteRelationStore;

/// Division restriction on statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DivisionFilter {
    #[default]
    Any,
    ById(i64),
    ByName(String),
}

impl DivisionFilter {
    /// Resolve to the set of matching division ids, `None` meaning any.
    pub fn resolve_ids(&self, divisions: &[Division]) -> Option<Vec<i64>> {
        match self {
            DivisionFilter::Any => None,
            DivisionFilter::ById(id) => Some(vec![*id]),
            DivisionFilter::ByName(name) => Some(
                divisions
                    .iter()
                    .filter(|division| &division.name == name)
                    .map(|division| division.id)
                    .collect(),
            ),
        }
    }
}

impl From<i64> for DivisionFilter {
    fn from(id: i64) -> Self {
        DivisionFilter::ById(id)
    }
}

impl From<&str> for DivisionFilter {
    fn from(name: &str) -> Self {
        DivisionFilter::ByName(name.to_string())
    }
}

/// Filters of the joined statements relation.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementFilter {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub division: DivisionFilter,
    pub employee_ids: Option<Vec<i64>>,
    pub site_ids: Option<Vec<i64>>,
}

impl StatementFilter {
    pub fn employee_scope(&self) -> Option<&[i64]> {
        id_scope(&self.employee_ids)
    }

    pub fn site_scope(&self) -> Option<&[i64]> {
        id_scope(&self.site_ids)
    }
}

/// An empty id set restricts nothing, same as an absent one.
pub fn id_scope(ids: &Option<Vec<i64>>) -> Option<&[i64]> {
    ids.as_deref().filter(|ids| !ids.is_empty())
}

#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Statements joined with employee and site, dates inclusive.
    async fn statements(&self, filter: &StatementFilter) -> Result<Vec<StatementRow>, StoreError>;

    async fn schedules(&self, employee_ids: &[i64]) -> Result<Vec<Schedule>, StoreError>;

    async fn journal(&self, employee_ids: &[i64]) -> Result<Vec<JournalEntry>, StoreError>;

    async fn serves(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
        employee_ids: &[i64],
    ) -> Result<Vec<Serve>, StoreError>;

    /// Stored clusters with `date_from <= date < date_to + 1 day`.
    async fn clusters(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
        device_ids: &[i64],
    ) -> Result<Vec<Cluster>, StoreError>;

    /// Resolved pings requested after the start of `today`.
    async fn current_locations(
        &self,
        device_ids: &[i64],
        today: NaiveDate,
    ) -> Result<Vec<Coordinate>, StoreError>;

    async fn statements_for_day(
        &self,
        employee_id: i64,
        date: NaiveDate,
        division: &DivisionFilter,
    ) -> Result<Vec<StatementRow>, StoreError>;

    async fn journal_for_employee(&self, employee_id: i64) -> Result<Vec<JournalEntry>, StoreError>;

    /// Every ping requested on `date`, resolved or not.
    async fn locations_for_day(
        &self,
        device_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Coordinate>, StoreError>;

    async fn all_statements(&self, since: NaiveDate) -> Result<Vec<Statement>, StoreError>;

    async fn employees(&self) -> Result<Vec<Employee>, StoreError>;

    async fn sites(&self) -> Result<Vec<Site>, StoreError>;

    async fn divisions(&self) -> Result<Vec<Division>, StoreError>;

    async fn all_schedules(&self) -> Result<Vec<Schedule>, StoreError>;

    async fn all_journal(&self) -> Result<Vec<JournalEntry>, StoreError>;

    async fn all_serves(&self, since: NaiveDate) -> Result<Vec<Serve>, StoreError>;

    async fn all_clusters(&self, since: NaiveDate) -> Result<Vec<Cluster>, StoreError>;
}
