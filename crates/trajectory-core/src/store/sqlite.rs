//! SQLite relation store.
//!
//! Every operation opens its own read-only connection on a blocking worker
//! thread and closes it before returning, whatever the outcome.
//!
//! Expected tables:
//! - `division(id, name)`
//! - `employee(id, name, division_id, schedule)`
//! - `object(id, name, division_id, address, lng, lat)`
//! - `statement(employee_id, object_id, date, statement, division_id)`
//! - `journal(employee_id, subscriber, period_init, period_end)`
//! - `serve(employee_id, object_id, date, approval)`
//! - `coordinate(subscriber, request_dt, location_dt, lng, lat)`
//! - `cluster(subscriber, date, datetime, lng, lat, leaving_dt, cluster)`

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveTime};
use rusqlite::{params_from_iter, Connection, OpenFlags, Row};
use tracing::debug;

use super::query::{date_value, datetime_value, Select};
use super::{DivisionFilter, RelationStore, StatementFilter};
use crate::error::StoreError;
use crate::models::{
    Cluster, Coordinate, Division, Employee, JournalEntry, Schedule, Serve, Site, Statement,
    StatementRow,
};

/// How long a query waits on a locked database before failing.
const BUSY_TIMEOUT_SECS: u64 = 5;

const STATEMENT_ROWS: &str = "SELECT s.employee_id, e.name, s.object_id, o.name, o.lng, o.lat, \
     o.address, s.date, s.statement, s.division_id \
     FROM statement s \
     JOIN employee e ON s.employee_id = e.id \
     JOIN object o ON s.object_id = o.id";

const JOURNAL: &str = "SELECT employee_id, subscriber, period_init, period_end FROM journal";

const SCHEDULES: &str = "SELECT id, schedule FROM employee";

const SERVES: &str = "SELECT employee_id, object_id, date, approval FROM serve";

const CLUSTERS: &str =
    "SELECT subscriber, date, datetime, lng, lat, leaving_dt, cluster FROM cluster";

const COORDINATES: &str = "SELECT subscriber, request_dt, location_dt, lng, lat FROM coordinate";

#[derive(Debug, Clone)]
pub struct SqliteRelationStore {
    path: PathBuf,
}

impl SqliteRelationStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
        Ok(conn)
    }

    async fn fetch<T>(
        &self,
        relation: &'static str,
        select: Select,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, StoreError>
    where
        T: Send + 'static,
    {
        let path = self.path.clone();
        let (sql, params) = select.into_parts();

        let rows = tokio::task::spawn_blocking(move || -> rusqlite::Result<Vec<T>> {
            let conn = Self::open(&path)?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map)?
                .collect::<rusqlite::Result<Vec<T>>>()?;
            Ok(rows)
        })
        .await??;

        debug!(relation, rows = rows.len(), "Fetched relation");
        Ok(rows)
    }
}

// ===== Row mapping =====

fn statement_row(row: &Row<'_>) -> rusqlite::Result<StatementRow> {
    Ok(StatementRow {
        employee_id: row.get(0)?,
        employee_name: row.get(1)?,
        site_id: row.get(2)?,
        site_name: row.get(3)?,
        longitude: row.get(4)?,
        latitude: row.get(5)?,
        address: row.get(6)?,
        date: row.get(7)?,
        code: row.get(8)?,
        division: row.get(9)?,
    })
}

fn statement(row: &Row<'_>) -> rusqlite::Result<Statement> {
    Ok(Statement {
        employee_id: row.get(0)?,
        object_id: row.get(1)?,
        date: row.get(2)?,
        code: row.get(3)?,
        division_id: row.get(4)?,
    })
}

fn employee(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        name: row.get(1)?,
        division_id: row.get(2)?,
        schedule: row.get(3)?,
    })
}

fn site(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        name: row.get(1)?,
        division_id: row.get(2)?,
        longitude: row.get(3)?,
        latitude: row.get(4)?,
        address: row.get(5)?,
    })
}

fn division(row: &Row<'_>) -> rusqlite::Result<Division> {
    Ok(Division {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn schedule(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        employee_id: row.get(0)?,
        schedule: row.get(1)?,
    })
}

fn journal_entry(row: &Row<'_>) -> rusqlite::Result<JournalEntry> {
    Ok(JournalEntry {
        employee_id: row.get(0)?,
        device_id: row.get(1)?,
        period_start: row.get(2)?,
        period_end: row.get(3)?,
    })
}

fn serve(row: &Row<'_>) -> rusqlite::Result<Serve> {
    Ok(Serve {
        employee_id: row.get(0)?,
        object_id: row.get(1)?,
        date: row.get(2)?,
        approval: row.get(3)?,
    })
}

fn cluster(row: &Row<'_>) -> rusqlite::Result<Cluster> {
    Ok(Cluster {
        device_id: row.get(0)?,
        date: row.get(1)?,
        datetime: row.get(2)?,
        longitude: row.get(3)?,
        latitude: row.get(4)?,
        leaving_time: row.get(5)?,
        cluster_id: row.get(6)?,
    })
}

fn coordinate(row: &Row<'_>) -> rusqlite::Result<Coordinate> {
    Ok(Coordinate {
        device_id: row.get(0)?,
        request_time: row.get(1)?,
        location_time: row.get(2)?,
        longitude: row.get(3)?,
        latitude: row.get(4)?,
    })
}

// ===== Query construction =====

fn with_division(select: Select, division: &DivisionFilter) -> Select {
    match division {
        DivisionFilter::Any => select,
        DivisionFilter::ById(id) => select.filter("s.division_id = ?", (*id).into()),
        DivisionFilter::ByName(name) => select
            .join("JOIN division d ON s.division_id = d.id")
            .filter("d.name = ?", name.clone().into()),
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}

pub(crate) fn statements_query(filter: &StatementFilter) -> Select {
    let mut select = Select::new(STATEMENT_ROWS)
        .filter("s.date >= ?", date_value(filter.date_from))
        .filter("s.date <= ?", date_value(filter.date_to));
    select = with_division(select, &filter.division);
    if let Some(ids) = filter.employee_scope() {
        select = select.filter_in("s.employee_id", ids);
    }
    if let Some(ids) = filter.site_scope() {
        select = select.filter_in("s.object_id", ids);
    }
    select
}

pub(crate) fn clusters_query(date_from: NaiveDate, date_to: NaiveDate, device_ids: &[i64]) -> Select {
    Select::new(CLUSTERS)
        .filter_in("subscriber", device_ids)
        .filter("date >= ?", date_value(date_from))
        .filter("date < ?", date_value(next_day(date_to)))
}

pub(crate) fn current_locations_query(device_ids: &[i64], today: NaiveDate) -> Select {
    Select::new(COORDINATES)
        .filter_in("subscriber", device_ids)
        .filter("request_dt > ?", datetime_value(today.and_time(NaiveTime::MIN)))
        .filter_raw("location_dt IS NOT NULL")
}

#[async_trait]
impl RelationStore for SqliteRelationStore {
    async fn statements(&self, filter: &StatementFilter) -> Result<Vec<StatementRow>, StoreError> {
        self.fetch("statements", statements_query(filter), statement_row).await
    }

    async fn schedules(&self, employee_ids: &[i64]) -> Result<Vec<Schedule>, StoreError> {
        let select = Select::new(SCHEDULES).filter_in("id", employee_ids);
        self.fetch("schedules", select, schedule).await
    }

    async fn journal(&self, employee_ids: &[i64]) -> Result<Vec<JournalEntry>, StoreError> {
        let select = Select::new(JOURNAL).filter_in("employee_id", employee_ids);
        self.fetch("journal", select, journal_entry).await
    }

    async fn serves(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
        employee_ids: &[i64],
    ) -> Result<Vec<Serve>, StoreError> {
        let select = Select::new(SERVES)
            .filter_in("employee_id", employee_ids)
            .filter("date >= ?", date_value(date_from))
            .filter("date <= ?", date_value(date_to));
        self.fetch("serves", select, serve).await
    }

    async fn clusters(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
        device_ids: &[i64],
    ) -> Result<Vec<Cluster>, StoreError> {
        self.fetch("clusters", clusters_query(date_from, date_to, device_ids), cluster)
            .await
    }

    async fn current_locations(
        &self,
        device_ids: &[i64],
        today: NaiveDate,
    ) -> Result<Vec<Coordinate>, StoreError> {
        self.fetch(
            "current_locations",
            current_locations_query(device_ids, today),
            coordinate,
        )
        .await
    }

    async fn statements_for_day(
        &self,
        employee_id: i64,
        date: NaiveDate,
        division: &DivisionFilter,
    ) -> Result<Vec<StatementRow>, StoreError> {
        let select = Select::new(STATEMENT_ROWS)
            .filter("s.date = ?", date_value(date))
            .filter("s.employee_id = ?", employee_id.into());
        self.fetch("statements", with_division(select, division), statement_row)
            .await
    }

    async fn journal_for_employee(&self, employee_id: i64) -> Result<Vec<JournalEntry>, StoreError> {
        let select = Select::new(JOURNAL).filter("employee_id = ?", employee_id.into());
        self.fetch("journal", select, journal_entry).await
    }

    async fn locations_for_day(
        &self,
        device_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Coordinate>, StoreError> {
        let select = Select::new(COORDINATES)
            .filter("subscriber = ?", device_id.into())
            .filter("request_dt >= ?", datetime_value(date.and_time(NaiveTime::MIN)))
            .filter("request_dt < ?", datetime_value(next_day(date).and_time(NaiveTime::MIN)));
        self.fetch("locations", select, coordinate).await
    }

    async fn all_statements(&self, since: NaiveDate) -> Result<Vec<Statement>, StoreError> {
        let select = Select::new(
            "SELECT employee_id, object_id, date, statement, division_id FROM statement",
        )
        .filter("date >= ?", date_value(since));
        self.fetch("statements", select, statement).await
    }

    async fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        let select = Select::new("SELECT id, name, division_id, schedule FROM employee");
        self.fetch("employees", select, employee).await
    }

    async fn sites(&self) -> Result<Vec<Site>, StoreError> {
        let select = Select::new("SELECT id, name, division_id, lng, lat, address FROM object");
        self.fetch("objects", select, site).await
    }

    async fn divisions(&self) -> Result<Vec<Division>, StoreError> {
        self.fetch("divisions", Select::new("SELECT id, name FROM division"), division)
            .await
    }

    async fn all_schedules(&self) -> Result<Vec<Schedule>, StoreError> {
        self.fetch("schedules", Select::new(SCHEDULES), schedule).await
    }

    async fn all_journal(&self) -> Result<Vec<JournalEntry>, StoreError> {
        self.fetch("journal", Select::new(JOURNAL), journal_entry).await
    }

    async fn all_serves(&self, since: NaiveDate) -> Result<Vec<Serve>, StoreError> {
        let select = Select::new(SERVES).filter("date >= ?", date_value(since));
        self.fetch("serves", select, serve).await
    }

    async fn all_clusters(&self, since: NaiveDate) -> Result<Vec<Cluster>, StoreError> {
        let select = Select::new(CLUSTERS).filter("date >= ?", date_value(since));
        self.fetch("clusters", select, cluster).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn filter(division: DivisionFilter) -> StatementFilter {
        StatementFilter {
            date_from: date(2024, 3, 1),
            date_to: date(2024, 3, 5),
            division,
            employee_ids: None,
            site_ids: Some(vec![]),
        }
    }

    #[test]
    fn test_statements_query_by_division_id() {
        let select = statements_query(&filter(DivisionFilter::ById(3)));
        let sql = select.sql();
        assert!(sql.ends_with("WHERE s.date >= ? AND s.date <= ? AND s.division_id = ?"));
        assert!(!sql.contains("JOIN division"));
        assert_eq!(select.params()[2], Value::Integer(3));
    }

    #[test]
    fn test_statements_query_by_division_name_joins_division() {
        let select = statements_query(&filter(DivisionFilter::ByName("North".to_string())));
        let sql = select.sql();
        assert!(sql.contains("JOIN division d ON s.division_id = d.id"));
        assert!(sql.contains("d.name = ?"));
        assert_eq!(select.params()[2], Value::Text("North".to_string()));
    }

    #[test]
    fn test_clusters_query_exclusive_upper_bound() {
        let select = clusters_query(date(2024, 3, 1), date(2024, 3, 31), &[1]);
        assert!(select.sql().contains("date < ?"));
        assert_eq!(select.params()[2], Value::Text("2024-04-01".to_string()));
    }

    #[test]
    fn test_current_locations_query_starts_at_midnight() {
        let select = current_locations_query(&[4, 5], date(2024, 3, 5));
        assert!(select.sql().ends_with("location_dt IS NOT NULL"));
        assert_eq!(select.params()[2], Value::Text("2024-03-05 00:00:00".to_string()));
    }
}
