//! Trajectory report data layer.
//!
//! Assembles the five relations behind an employee trajectory report
//! (statements, device journal, schedules, service visits, stay clusters)
//! for a date range and optional division, employee and site filters.
//!
//! A request is served either straight from the relational store or from
//! whole-relation snapshots narrowed in memory. Requests covering today
//! get clusters derived from the current day's pings appended.
//!
//! ```no_run
//! # async fn run(deriver: &dyn trajectory_core::ClusterDeriver) -> anyhow::Result<()> {
//! use chrono::NaiveDate;
//! use trajectory_core::{config::Config, Dispatcher, ReportRequest};
//!
//! let config = Config::load()?;
//! let store = config.open_store()?;
//! let cache = config.open_cache()?;
//!
//! let mut dispatcher = Dispatcher::new(&store, deriver);
//! if let Some(cache) = cache.as_deref() {
//!     dispatcher = dispatcher.with_cache(cache);
//! }
//!
//! let request = ReportRequest::new(
//!     NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
//! )?
//! .division("North");
//! let bundle = dispatcher.assemble(&request).await?;
//! println!("{} statements", bundle.statements.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod cache;
pub mod cluster;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod store;
pub mod window;

pub use aggregate::{
    Aggregator, Bundle, CachedAggregator, DirectAggregator, Dispatcher, EmployeeDay,
    ReportRequest, Route, SingleEntityAggregator,
};
pub use cache::{DirSnapshotCache, HttpSnapshotCache, MemorySnapshotCache, Relation, SnapshotCache};
pub use cluster::ClusterDeriver;
pub use error::{CacheError, ClusterDerivationError, CodecError, ReportError, StoreError};
pub use store::{DivisionFilter, RelationStore, SqliteRelationStore, StatementFilter};
pub use window::CacheWindow;
