// src/db/executor.rs

use rusqlite::types::Value;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::errors::EngineError;

/// One result row with its column names. Getters are lenient about
/// storage classes (an INTEGER price still reads as f64) because the
/// schema behind each query is configured, not compiled in.
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Integer(i) => Some(*i),
            Value::Real(r) => Some(*r as i64),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Every column rendered to display text, in select order.
    /// NULLs and blobs are skipped.
    pub fn display_fields(&self) -> Vec<(String, String)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .filter_map(|(col, val)| {
                let text = match val {
                    Value::Text(s) => s.clone(),
                    Value::Integer(i) => i.to_string(),
                    Value::Real(r) => r.to_string(),
                    Value::Null | Value::Blob(_) => return None,
                };
                Some((col.clone(), text))
            })
            .collect()
    }
}

/// The engine's seam to the relational store: parameterized query in,
/// ordered named-column rows out. Implementations are synchronous;
/// callers own any retry policy for transient errors.
pub trait SqlExecutor: Send + Sync {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, EngineError>;
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, EngineError>;
}

/// SQLite-backed executor; also what the test suite runs against.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let conn = Connection::open(path)
            .map_err(|e| EngineError::DbError(format!("Open DB failed: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EngineError::DbError(format!("Open in-memory DB failed: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Apply a SQL schema (e.g. sql/schema.sql) in one batch.
    pub fn init_schema(&self, schema_sql: &str) -> Result<(), EngineError> {
        self.with_conn(|conn| conn.execute_batch(schema_sql))
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, EngineError> {
        let conn = match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&conn).map_err(|e| EngineError::DbError(e.to_string()))
    }
}

impl SqlExecutor for SqliteExecutor {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, EngineError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    values.push(row.get::<_, Value>(i)?);
                }
                out.push(Row {
                    columns: columns.clone(),
                    values,
                });
            }
            Ok(out)
        })
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, EngineError> {
        self.with_conn(|conn| conn.execute(sql, rusqlite::params_from_iter(params.iter())))
    }
}
