//! Columnar schemas of the snapshot relations.

use super::codec::{Column, Record, Table};
use super::Relation;
use crate::error::CodecError;
use crate::models::{Cluster, Division, Employee, JournalEntry, Schedule, Serve, Site, Statement};

fn collect<R, T: Clone>(rows: &[R], field: impl Fn(&R) -> &T) -> Vec<T> {
    rows.iter().map(|row| field(row).clone()).collect()
}

impl Record for Statement {
    const RELATION: Relation = Relation::Statements;

    fn to_table(rows: &[Self]) -> Table {
        Table::new(rows.len())
            .with("employee_id", Column::Int(collect(rows, |r| &r.employee_id)))
            .with("object_id", Column::Int(collect(rows, |r| &r.object_id)))
            .with("date", Column::Date(collect(rows, |r| &r.date)))
            .with("code", Column::Text(collect(rows, |r| &r.code)))
            .with("division_id", Column::Int(collect(rows, |r| &r.division_id)))
    }

    fn from_table(table: &Table) -> Result<Vec<Self>, CodecError> {
        let employee_id = table.ints("employee_id")?;
        let object_id = table.ints("object_id")?;
        let date = table.dates("date")?;
        let code = table.texts("code")?;
        let division_id = table.ints("division_id")?;

        Ok((0..table.len())
            .map(|i| Statement {
                employee_id: employee_id[i],
                object_id: object_id[i],
                date: date[i],
                code: code[i].clone(),
                division_id: division_id[i],
            })
            .collect())
    }
}

impl Record for Employee {
    const RELATION: Relation = Relation::Employees;

    fn to_table(rows: &[Self]) -> Table {
        Table::new(rows.len())
            .with("id", Column::Int(collect(rows, |r| &r.id)))
            .with("name", Column::Text(collect(rows, |r| &r.name)))
            .with("division_id", Column::Int(collect(rows, |r| &r.division_id)))
            .with("schedule", Column::NullableText(collect(rows, |r| &r.schedule)))
    }

    fn from_table(table: &Table) -> Result<Vec<Self>, CodecError> {
        let id = table.ints("id")?;
        let name = table.texts("name")?;
        let division_id = table.ints("division_id")?;
        let schedule = table.nullable_texts("schedule")?;

        Ok((0..table.len())
            .map(|i| Employee {
                id: id[i],
                name: name[i].clone(),
                division_id: division_id[i],
                schedule: schedule[i].clone(),
            })
            .collect())
    }
}

impl Record for Site {
    const RELATION: Relation = Relation::Objects;

    fn to_table(rows: &[Self]) -> Table {
        Table::new(rows.len())
            .with("id", Column::Int(collect(rows, |r| &r.id)))
            .with("name", Column::Text(collect(rows, |r| &r.name)))
            .with("division_id", Column::Int(collect(rows, |r| &r.division_id)))
            .with("longitude", Column::Float(collect(rows, |r| &r.longitude)))
            .with("latitude", Column::Float(collect(rows, |r| &r.latitude)))
            .with("address", Column::NullableText(collect(rows, |r| &r.address)))
    }

    fn from_table(table: &Table) -> Result<Vec<Self>, CodecError> {
        let id = table.ints("id")?;
        let name = table.texts("name")?;
        let division_id = table.ints("division_id")?;
        let longitude = table.floats("longitude")?;
        let latitude = table.floats("latitude")?;
        let address = table.nullable_texts("address")?;

        Ok((0..table.len())
            .map(|i| Site {
                id: id[i],
                name: name[i].clone(),
                division_id: division_id[i],
                longitude: longitude[i],
                latitude: latitude[i],
                address: address[i].clone(),
            })
            .collect())
    }
}

impl Record for Division {
    const RELATION: Relation = Relation::Divisions;

    fn to_table(rows: &[Self]) -> Table {
        Table::new(rows.len())
            .with("id", Column::Int(collect(rows, |r| &r.id)))
            .with("name", Column::Text(collect(rows, |r| &r.name)))
    }

    fn from_table(table: &Table) -> Result<Vec<Self>, CodecError> {
        let id = table.ints("id")?;
        let name = table.texts("name")?;

        Ok((0..table.len())
            .map(|i| Division {
                id: id[i],
                name: name[i].clone(),
            })
            .collect())
    }
}

impl Record for Schedule {
    const RELATION: Relation = Relation::Schedules;

    fn to_table(rows: &[Self]) -> Table {
        Table::new(rows.len())
            .with("employee_id", Column::Int(collect(rows, |r| &r.employee_id)))
            .with("schedule", Column::NullableText(collect(rows, |r| &r.schedule)))
    }

    fn from_table(table: &Table) -> Result<Vec<Self>, CodecError> {
        let employee_id = table.ints("employee_id")?;
        let schedule = table.nullable_texts("schedule")?;

        Ok((0..table.len())
            .map(|i| Schedule {
                employee_id: employee_id[i],
                schedule: schedule[i].clone(),
            })
            .collect())
    }
}

impl Record for JournalEntry {
    const RELATION: Relation = Relation::Journal;

    fn to_table(rows: &[Self]) -> Table {
        Table::new(rows.len())
            .with("employee_id", Column::Int(collect(rows, |r| &r.employee_id)))
            .with("device_id", Column::Int(collect(rows, |r| &r.device_id)))
            .with("period_start", Column::Date(collect(rows, |r| &r.period_start)))
            .with("period_end", Column::NullableDate(collect(rows, |r| &r.period_end)))
    }

    fn from_table(table: &Table) -> Result<Vec<Self>, CodecError> {
        let employee_id = table.ints("employee_id")?;
        let device_id = table.ints("device_id")?;
        let period_start = table.dates("period_start")?;
        let period_end = table.nullable_dates("period_end")?;

        Ok((0..table.len())
            .map(|i| JournalEntry {
                employee_id: employee_id[i],
                device_id: device_id[i],
                period_start: period_start[i],
                period_end: period_end[i],
            })
            .collect())
    }
}

impl Record for Serve {
    const RELATION: Relation = Relation::Serves;

    fn to_table(rows: &[Self]) -> Table {
        Table::new(rows.len())
            .with("employee_id", Column::Int(collect(rows, |r| &r.employee_id)))
            .with("object_id", Column::Int(collect(rows, |r| &r.object_id)))
            .with("date", Column::Date(collect(rows, |r| &r.date)))
            .with("approval", Column::NullableText(collect(rows, |r| &r.approval)))
    }

    fn from_table(table: &Table) -> Result<Vec<Self>, CodecError> {
        let employee_id = table.ints("employee_id")?;
        let object_id = table.ints("object_id")?;
        let date = table.dates("date")?;
        let approval = table.nullable_texts("approval")?;

        Ok((0..table.len())
            .map(|i| Serve {
                employee_id: employee_id[i],
                object_id: object_id[i],
                date: date[i],
                approval: approval[i].clone(),
            })
            .collect())
    }
}

impl Record for Cluster {
    const RELATION: Relation = Relation::Clusters;

    fn to_table(rows: &[Self]) -> Table {
        Table::new(rows.len())
            .with("device_id", Column::Int(collect(rows, |r| &r.device_id)))
            .with("date", Column::Date(collect(rows, |r| &r.date)))
            .with("datetime", Column::DateTime(collect(rows, |r| &r.datetime)))
            .with("longitude", Column::Float(collect(rows, |r| &r.longitude)))
            .with("latitude", Column::Float(collect(rows, |r| &r.latitude)))
            .with("leaving_time", Column::DateTime(collect(rows, |r| &r.leaving_time)))
            .with("cluster_id", Column::Int(collect(rows, |r| &r.cluster_id)))
    }

    fn from_table(table: &Table) -> Result<Vec<Self>, CodecError> {
        let device_id = table.ints("device_id")?;
        let date = table.dates("date")?;
        let datetime = table.datetimes("datetime")?;
        let longitude = table.floats("longitude")?;
        let latitude = table.floats("latitude")?;
        let leaving_time = table.datetimes("leaving_time")?;
        let cluster_id = table.ints("cluster_id")?;

        Ok((0..table.len())
            .map(|i| Cluster {
                device_id: device_id[i],
                date: date[i],
                datetime: datetime[i],
                longitude: longitude[i],
                latitude: latitude[i],
                leaving_time: leaving_time[i],
                cluster_id: cluster_id[i],
            })
            .collect())
    }
}
