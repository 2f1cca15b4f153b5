//! Device bindings, raw location pings and derived stay clusters.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Binding of an employee to a tracked device as stored.
/// `period_end == None` means the binding is still active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub employee_id: i64,
    pub device_id: i64,
    pub period_start: NaiveDate,
    pub period_end: Option<NaiveDate>,
}

impl JournalEntry {
    /// Close an open period at `today`.
    pub fn resolve(&self, today: NaiveDate) -> JournalPeriod {
        JournalPeriod {
            employee_id: self.employee_id,
            device_id: self.device_id,
            period_start: self.period_start,
            period_end: self.period_end.unwrap_or(today),
        }
    }
}

/// A journal binding with its end date resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalPeriod {
    pub employee_id: i64,
    pub device_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

impl JournalPeriod {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.period_start <= date && date <= self.period_end
    }
}

/// First period covering `date`, with open periods closed at `today`.
///
/// Overlapping periods for one employee are not disambiguated.
pub fn find_active_period(
    entries: &[JournalEntry],
    date: NaiveDate,
    today: NaiveDate,
) -> Option<JournalPeriod> {
    entries
        .iter()
        .map(|entry| entry.resolve(today))
        .find(|period| period.covers(date))
}

/// A location request, possibly unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub device_id: i64,
    pub request_time: NaiveDateTime,
    pub location_time: Option<NaiveDateTime>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl Coordinate {
    /// The resolved ping, if the device reported a position.
    pub fn to_ping(&self) -> Option<Ping> {
        match (self.location_time, self.longitude, self.latitude) {
            (Some(location_time), Some(longitude), Some(latitude)) => Some(Ping {
                device_id: self.device_id,
                date: location_time.date(),
                location_time,
                longitude,
                latitude,
            }),
            _ => None,
        }
    }
}

/// A resolved location, input of the cluster deriver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub device_id: i64,
    pub date: NaiveDate,
    pub location_time: NaiveDateTime,
    pub longitude: f64,
    pub latitude: f64,
}

/// A stay at one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub device_id: i64,
    pub date: NaiveDate,
    pub datetime: NaiveDateTime,
    pub longitude: f64,
    pub latitude: f64,
    pub leaving_time: NaiveDateTime,
    pub cluster_id: i64,
}
