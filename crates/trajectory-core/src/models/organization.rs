use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Division {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub division_id: i64,
    pub schedule: Option<String>,
}

impl Employee {
    pub fn to_schedule(&self) -> Schedule {
        Schedule {
            employee_id: self.id,
            schedule: self.schedule.clone(),
        }
    }
}

/// A work site (object) employees declare attendance for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub name: String,
    pub division_id: i64,
    pub longitude: f64,
    pub latitude: f64,
    pub address: Option<String>,
}

/// Work schedule of one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub employee_id: i64,
    pub schedule: Option<String>,
}
