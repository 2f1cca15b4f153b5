//! Parametrized SELECT construction.
//!
//! Values are always bound as parameters; only table and column names are
//! written into the query text.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format(DATE_FORMAT).to_string())
}

pub fn datetime_value(datetime: NaiveDateTime) -> Value {
    Value::Text(datetime.format(DATETIME_FORMAT).to_string())
}

#[derive(Debug, Clone)]
pub struct Select {
    base: String,
    joins: Vec<String>,
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl Select {
    /// `base` is the `SELECT ... FROM ...` head of the query.
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            joins: Vec::new(),
            conditions: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn join(mut self, clause: &str) -> Self {
        self.joins.push(clause.to_string());
        self
    }

    /// Add a condition holding exactly one `?` placeholder.
    pub fn filter(mut self, condition: &str, value: Value) -> Self {
        self.conditions.push(condition.to_string());
        self.params.push(value);
        self
    }

    /// Add a condition without parameters.
    pub fn filter_raw(mut self, condition: &str) -> Self {
        self.conditions.push(condition.to_string());
        self
    }

    /// Restrict `column` to `ids`. An empty list matches no row.
    pub fn filter_in(mut self, column: &str, ids: &[i64]) -> Self {
        if ids.is_empty() {
            self.conditions.push("1 = 0".to_string());
            return self;
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        self.conditions.push(format!("{} IN ({})", column, placeholders));
        self.params.extend(ids.iter().map(|id| Value::Integer(*id)));
        self
    }

    pub fn sql(&self) -> String {
        let mut sql = self.base.clone();
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        let sql = self.sql();
        (sql, self.params)
    }
}
