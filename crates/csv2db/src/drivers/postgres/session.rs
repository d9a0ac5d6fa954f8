//! Transaction and prepared statement on one pooled PostgreSQL connection.

use std::error::Error as StdError;

use async_trait::async_trait;
use bytes::BytesMut;
use deadpool_postgres::Object;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type, WrongType};
use tokio_postgres::Statement;

use crate::core::traits::InsertSession;
use crate::core::value::SqlValue;
use crate::error::{LoadError, Result};

type BoxError = Box<dyn StdError + Sync + Send>;

/// Insert session holding a dedicated pooled connection.
pub struct PostgresSession {
    client: Object,
    statement: Option<Statement>,
}

impl PostgresSession {
    pub fn new(client: Object) -> Self {
        Self {
            client,
            statement: None,
        }
    }
}

#[async_trait]
impl InsertSession for PostgresSession {
    async fn begin(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn prepare(&mut self, sql: &str) -> Result<()> {
        // Dropping the previous statement closes it on the server.
        self.statement = Some(self.client.prepare(sql).await?);
        Ok(())
    }

    async fn execute(&mut self, params: &[SqlValue]) -> Result<u64> {
        let statement = self
            .statement
            .as_ref()
            .ok_or_else(|| LoadError::Statement("execute called before prepare".to_string()))?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        Ok(self.client.execute(statement, &refs).await?)
    }

    async fn commit(&mut self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }
}

/// Encode through `T`'s own implementation after checking it accepts `ty`.
fn encode<T: ToSql>(value: &T, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    if !T::accepts(ty) {
        return Err(Box::new(WrongType::new::<T>(ty.clone())));
    }
    value.to_sql(ty, out)
}

// Placeholders are cast to the column's semantic type (`$1::bigint`), so the
// server-inferred parameter type always matches the value variant.
impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            SqlValue::Null(_) => Ok(IsNull::Yes),
            SqlValue::Bool(v) => encode(v, ty, out),
            SqlValue::I8(v) => encode(&i16::from(*v), ty, out),
            SqlValue::I16(v) => encode(v, ty, out),
            SqlValue::I32(v) => encode(v, ty, out),
            SqlValue::I64(v) => encode(v, ty, out),
            SqlValue::F32(v) => encode(v, ty, out),
            SqlValue::F64(v) => encode(v, ty, out),
            SqlValue::Text(v) => encode(v, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SemanticType;

    #[test]
    fn test_to_sql_matching_types() {
        let mut buf = BytesMut::new();
        let is_null = SqlValue::I64(7).to_sql(&Type::INT8, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(&buf[..], &7i64.to_be_bytes());

        buf.clear();
        SqlValue::Text("hé".into()).to_sql(&Type::TEXT, &mut buf).unwrap();
        assert_eq!(&buf[..], "hé".as_bytes());
    }

    #[test]
    fn test_to_sql_null() {
        let mut buf = BytesMut::new();
        let is_null = SqlValue::Null(SemanticType::Float64)
            .to_sql(&Type::FLOAT8, &mut buf)
            .unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_to_sql_rejects_mismatched_type() {
        let mut buf = BytesMut::new();
        assert!(SqlValue::I64(1).to_sql(&Type::TEXT, &mut buf).is_err());
    }

    #[test]
    fn test_i8_widens_to_int2() {
        let mut buf = BytesMut::new();
        SqlValue::I8(-3).to_sql(&Type::INT2, &mut buf).unwrap();
        assert_eq!(&buf[..], &(-3i16).to_be_bytes());
    }
}
