//! Data models for the report relations.
//!
//! This module contains the row types of every relation the report layer
//! reads or produces:
//!
//! - `Employee`, `Division`, `Site`, `Schedule`: organization structure
//! - `Statement`, `StatementRow`, `Serve`: declared attendance and service visits
//! - `JournalEntry`, `JournalPeriod`: device bindings
//! - `Coordinate`, `Ping`, `Cluster`: raw locations and derived stays

pub mod attendance;
pub mod organization;
pub mod tracking;

pub use attendance::{Serve, Statement, StatementRow};
pub use organization::{Division, Employee, Schedule, Site};
pub use tracking::{find_active_period, Cluster, Coordinate, JournalEntry, JournalPeriod, Ping};
