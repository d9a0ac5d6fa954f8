//! Transaction and prepared statement on one MySQL connection.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Statement, Value};

use crate::core::traits::InsertSession;
use crate::core::value::SqlValue;
use crate::error::{LoadError, Result};

pub struct MysqlSession {
    conn: Conn,
    statement: Option<Statement>,
}

impl MysqlSession {
    pub fn new(conn: Conn) -> Self {
        Self {
            conn,
            statement: None,
        }
    }
}

#[async_trait]
impl InsertSession for MysqlSession {
    async fn begin(&mut self) -> Result<()> {
        self.conn.query_drop("START TRANSACTION").await?;
        Ok(())
    }

    async fn prepare(&mut self, sql: &str) -> Result<()> {
        if let Some(previous) = self.statement.take() {
            self.conn.close(previous).await?;
        }
        self.statement = Some(self.conn.prep(sql).await?);
        Ok(())
    }

    async fn execute(&mut self, params: &[SqlValue]) -> Result<u64> {
        let statement = self
            .statement
            .clone()
            .ok_or_else(|| LoadError::Statement("execute called before prepare".to_string()))?;
        let values: Vec<Value> = params.iter().map(sql_value_to_mysql).collect();
        self.conn.exec_drop(statement, values).await?;
        Ok(self.conn.affected_rows())
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK").await?;
        Ok(())
    }
}

/// Convert SqlValue to mysql_async::Value.
pub(crate) fn sql_value_to_mysql(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null(_) => Value::NULL,
        SqlValue::Bool(b) => Value::from(*b),
        SqlValue::I8(i) => Value::from(*i),
        SqlValue::I16(i) => Value::from(*i),
        SqlValue::I32(i) => Value::from(*i),
        SqlValue::I64(i) => Value::from(*i),
        SqlValue::F32(f) => Value::from(*f),
        SqlValue::F64(f) => Value::from(*f),
        SqlValue::Text(s) => Value::from(s.as_str()),
    }
}
