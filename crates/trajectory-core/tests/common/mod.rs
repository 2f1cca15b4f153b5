#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use tempfile::TempDir;

use trajectory_core::cache::Relation;
use trajectory_core::models::{
    Cluster, Coordinate, Division, Employee, JournalEntry, Ping, Schedule, Serve, Site, Statement,
    StatementRow,
};
use trajectory_core::{
    CacheError, ClusterDerivationError, ClusterDeriver, DivisionFilter, MemorySnapshotCache,
    RelationStore, SnapshotCache, SqliteRelationStore, StatementFilter, StoreError,
};

pub const DEVICE_A: i64 = 501;
pub const DEVICE_B: i64 = 502;
pub const DEVICE_C: i64 = 503;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    date.and_hms_opt(h, m, 0).unwrap()
}

/// The as-of date of most tests.
pub fn today() -> NaiveDate {
    date(2024, 3, 5)
}

const SCHEMA: &str = "
    CREATE TABLE division (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE employee (id INTEGER PRIMARY KEY, name TEXT NOT NULL, division_id INTEGER NOT NULL, schedule TEXT);
    CREATE TABLE object (id INTEGER PRIMARY KEY, name TEXT NOT NULL, division_id INTEGER NOT NULL,
                         address TEXT, lng REAL NOT NULL, lat REAL NOT NULL);
    CREATE TABLE statement (employee_id INTEGER NOT NULL, object_id INTEGER NOT NULL, date TEXT NOT NULL,
                            statement TEXT NOT NULL, division_id INTEGER NOT NULL);
    CREATE TABLE journal (employee_id INTEGER NOT NULL, subscriber INTEGER NOT NULL,
                          period_init TEXT NOT NULL, period_end TEXT);
    CREATE TABLE serve (employee_id INTEGER NOT NULL, object_id INTEGER NOT NULL, date TEXT NOT NULL, approval TEXT);
    CREATE TABLE coordinate (subscriber INTEGER NOT NULL, request_dt TEXT NOT NULL, location_dt TEXT,
                             lng REAL, lat REAL);
    CREATE TABLE cluster (subscriber INTEGER NOT NULL, date TEXT NOT NULL, datetime TEXT NOT NULL,
                          lng REAL NOT NULL, lat REAL NOT NULL, leaving_dt TEXT NOT NULL, cluster INTEGER NOT NULL);
";

// Employees 7 and 9 work at the depot (North), 11 at the yard (South).
// 9's device binding ended on 2024-02-28, 7's and 11's are open.
const SEED: &str = "
    INSERT INTO division VALUES (1, 'North'), (2, 'South');

    INSERT INTO employee VALUES
        (7, 'Ivanov', 1, '5/2'),
        (9, 'Petrov', 1, '2/2'),
        (11, 'Sidorov', 2, NULL);

    INSERT INTO object VALUES
        (100, 'Depot', 1, 'Main st. 1', 37.6173, 55.7558),
        (101, 'Yard', 2, NULL, 37.7012, 55.8123);

    INSERT INTO statement VALUES
        (7, 100, '2024-01-15', 'D', 1),
        (7, 100, '2024-03-01', 'D', 1),
        (7, 100, '2024-03-02', 'D', 1),
        (7, 100, '2024-03-03', 'D', 1),
        (7, 100, '2024-03-04', 'D', 1),
        (7, 100, '2024-03-05', 'D', 1),
        (9, 100, '2024-03-01', 'D', 1),
        (9, 100, '2024-03-02', 'D', 1),
        (9, 100, '2024-03-03', 'N', 1),
        (9, 100, '2024-03-04', 'N', 1),
        (9, 100, '2024-03-05', 'D', 1),
        (11, 101, '2024-03-03', 'O', 2);

    INSERT INTO journal VALUES
        (7, 501, '2024-01-01', NULL),
        (9, 502, '2023-06-01', '2024-02-28'),
        (11, 503, '2024-02-01', NULL);

    INSERT INTO serve VALUES
        (7, 100, '2024-02-10', 'approved'),
        (7, 100, '2024-03-02', 'approved'),
        (9, 100, '2024-03-01', NULL),
        (11, 101, '2024-03-03', 'rejected');

    INSERT INTO cluster VALUES
        (501, '2024-01-15', '2024-01-15 08:00:00', 37.6173, 55.7558, '2024-01-15 17:00:00', 1),
        (501, '2024-03-01', '2024-03-01 08:05:00', 37.6173, 55.7558, '2024-03-01 17:10:00', 2),
        (501, '2024-03-04', '2024-03-04 08:15:00', 37.6175, 55.7559, '2024-03-04 16:45:00', 3),
        (502, '2024-02-20', '2024-02-20 09:00:00', 37.6173, 55.7558, '2024-02-20 18:00:00', 4),
        (503, '2024-03-03', '2024-03-03 07:30:00', 37.7012, 55.8123, '2024-03-03 19:00:00', 5);

    INSERT INTO coordinate VALUES
        (501, '2024-03-04 12:00:00', '2024-03-04 12:00:04', 37.6174, 55.7558),
        (501, '2024-03-05 09:00:00', '2024-03-05 09:00:05', 37.6173, 55.7558),
        (501, '2024-03-05 09:10:00', '2024-03-05 09:10:03', 37.6174, 55.7557),
        (501, '2024-03-05 09:20:00', NULL, NULL, NULL);
";

/// A seeded SQLite database in a temporary directory.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(SEED).unwrap();
        Self { _dir: dir, path }
    }

    pub fn execute(&self, sql: &str) {
        let conn = Connection::open(&self.path).unwrap();
        conn.execute_batch(sql).unwrap();
    }

    pub fn store(&self) -> SqliteRelationStore {
        SqliteRelationStore::new(&self.path)
    }
}

/// Puts all pings of a device into one stay, refusing fewer than `min_pings` pings.
pub struct StubDeriver {
    pub min_pings: usize,
}

impl ClusterDeriver for StubDeriver {
    fn derive(&self, pings: &[Ping]) -> Result<Vec<Cluster>, ClusterDerivationError> {
        if pings.len() < self.min_pings {
            return Err(ClusterDerivationError::InsufficientPings {
                found: pings.len(),
                required: self.min_pings,
            });
        }

        let mut by_device: BTreeMap<i64, Vec<&Ping>> = BTreeMap::new();
        for ping in pings {
            by_device.entry(ping.device_id).or_default().push(ping);
        }

        Ok(by_device
            .into_iter()
            .map(|(device_id, pings)| {
                let first = pings.iter().map(|p| p.location_time).min().unwrap();
                let last = pings.iter().map(|p| p.location_time).max().unwrap();
                let n = pings.len() as f64;
                Cluster {
                    device_id,
                    date: first.date(),
                    datetime: first,
                    longitude: pings.iter().map(|p| p.longitude).sum::<f64>() / n,
                    latitude: pings.iter().map(|p| p.latitude).sum::<f64>() / n,
                    leaving_time: last,
                    cluster_id: 0,
                }
            })
            .collect())
    }
}

/// Relation store recording how often each operation runs.
pub struct CountingStore {
    inner: SqliteRelationStore,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl CountingStore {
    pub fn new(inner: SqliteRelationStore) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn hit(&self, operation: &'static str) {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl RelationStore for CountingStore {
    async fn statements(&self, filter: &StatementFilter) -> Result<Vec<StatementRow>, StoreError> {
        self.hit("statements");
        self.inner.statements(filter).await
    }

    async fn schedules(&self, employee_ids: &[i64]) -> Result<Vec<Schedule>, StoreError> {
        self.hit("schedules");
        self.inner.schedules(employee_ids).await
    }

    async fn journal(&self, employee_ids: &[i64]) -> Result<Vec<JournalEntry>, StoreError> {
        self.hit("journal");
        self.inner.journal(employee_ids).await
    }

    async fn serves(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
        employee_ids: &[i64],
    ) -> Result<Vec<Serve>, StoreError> {
        self.hit("serves");
        self.inner.serves(date_from, date_to, employee_ids).await
    }

    async fn clusters(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
        device_ids: &[i64],
    ) -> Result<Vec<Cluster>, StoreError> {
        self.hit("clusters");
        self.inner.clusters(date_from, date_to, device_ids).await
    }

    async fn current_locations(
        &self,
        device_ids: &[i64],
        today: NaiveDate,
    ) -> Result<Vec<Coordinate>, StoreError> {
        self.hit("current_locations");
        self.inner.current_locations(device_ids, today).await
    }

    async fn statements_for_day(
        &self,
        employee_id: i64,
        date: NaiveDate,
        division: &DivisionFilter,
    ) -> Result<Vec<StatementRow>, StoreError> {
        self.hit("statements_for_day");
        self.inner.statements_for_day(employee_id, date, division).await
    }

    async fn journal_for_employee(&self, employee_id: i64) -> Result<Vec<JournalEntry>, StoreError> {
        self.hit("journal_for_employee");
        self.inner.journal_for_employee(employee_id).await
    }

    async fn locations_for_day(
        &self,
        device_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Coordinate>, StoreError> {
        self.hit("locations_for_day");
        self.inner.locations_for_day(device_id, date).await
    }

    async fn all_statements(&self, since: NaiveDate) -> Result<Vec<Statement>, StoreError> {
        self.hit("all_statements");
        self.inner.all_statements(since).await
    }

    async fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        self.hit("employees");
        self.inner.employees().await
    }

    async fn sites(&self) -> Result<Vec<Site>, StoreError> {
        self.hit("sites");
        self.inner.sites().await
    }

    async fn divisions(&self) -> Result<Vec<Division>, StoreError> {
        self.hit("divisions");
        self.inner.divisions().await
    }

    async fn all_schedules(&self) -> Result<Vec<Schedule>, StoreError> {
        self.hit("all_schedules");
        self.inner.all_schedules().await
    }

    async fn all_journal(&self) -> Result<Vec<JournalEntry>, StoreError> {
        self.hit("all_journal");
        self.inner.all_journal().await
    }

    async fn all_serves(&self, since: NaiveDate) -> Result<Vec<Serve>, StoreError> {
        self.hit("all_serves");
        self.inner.all_serves(since).await
    }

    async fn all_clusters(&self, since: NaiveDate) -> Result<Vec<Cluster>, StoreError> {
        self.hit("all_clusters");
        self.inner.all_clusters(since).await
    }
}

/// In-memory cache recording traffic, optionally down or failing after some reads.
pub struct CountingCache {
    inner: MemorySnapshotCache,
    gets: AtomicUsize,
    puts: Mutex<Vec<Relation>>,
    available: bool,
    fail_after_gets: Option<usize>,
}

impl CountingCache {
    pub fn new() -> Self {
        Self {
            inner: MemorySnapshotCache::new(),
            gets: AtomicUsize::new(0),
            puts: Mutex::new(Vec::new()),
            available: true,
            fail_after_gets: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn failing_after(gets: usize) -> Self {
        Self {
            fail_after_gets: Some(gets),
            ..Self::new()
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> Vec<Relation> {
        let mut puts = self.puts.lock().unwrap().clone();
        puts.sort();
        puts
    }
}

#[async_trait]
impl SnapshotCache for CountingCache {
    async fn get(&self, key: Relation) -> Result<Option<Vec<u8>>, CacheError> {
        let n = self.gets.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fail_after_gets {
            Some(limit) if n > limit => Err(CacheError::Unavailable("connection reset".to_string())),
            _ => self.inner.get(key).await,
        }
    }

    async fn put(&self, key: Relation, value: Vec<u8>) -> Result<(), CacheError> {
        self.puts.lock().unwrap().push(key);
        self.inner.put(key, value).await
    }

    async fn available(&self) -> bool {
        self.available
    }

    fn backend_type(&self) -> &'static str {
        "counting"
    }
}
