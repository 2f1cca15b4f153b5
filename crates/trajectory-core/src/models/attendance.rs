use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Employee, Site};

/// A declared attendance record as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub employee_id: i64,
    pub object_id: i64,
    pub date: NaiveDate,
    pub code: String,
    pub division_id: i64,
}

/// A statement joined with its employee and site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub employee_id: i64,
    pub employee_name: String,
    pub site_id: i64,
    pub site_name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub address: Option<String>,
    pub date: NaiveDate,
    pub code: String,
    pub division: i64,
}

impl StatementRow {
    pub fn join(statement: &Statement, employee: &Employee, site: &Site) -> Self {
        Self {
            employee_id: statement.employee_id,
            employee_name: employee.name.clone(),
            site_id: site.id,
            site_name: site.name.clone(),
            longitude: site.longitude,
            latitude: site.latitude,
            address: site.address.clone(),
            date: statement.date,
            code: statement.code.clone(),
            division: statement.division_id,
        }
    }
}

/// A service-visit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Serve {
    pub employee_id: i64,
    pub object_id: i64,
    pub date: NaiveDate,
    pub approval: Option<String>,
}
