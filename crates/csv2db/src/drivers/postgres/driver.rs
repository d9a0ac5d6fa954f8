//! PostgreSQL target driver.
//!
//! Uses deadpool-postgres for connection pooling. Catalog lookups go through
//! `information_schema`; the writer is either the generic batched writer over
//! a [`PostgresSession`] or the COPY writer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use crate::core::identifier::TableIdentity;
use crate::core::schema::{ColumnDefinition, InsertSchema, Schema};
use crate::core::traits::{Dialect, InsertMethod, RowWriter, TargetDriver, WriterOptions};
use crate::drivers::common::TlsBuilder;
use crate::drivers::{ConnectOptions, DialectImpl};
use crate::error::{LoadError, Result};
use crate::writer::BatchedWriter;

use super::{PostgresCopyWriter, PostgresDialect, PostgresSession};

/// Schema used when the table reference has none.
pub const DEFAULT_SCHEMA: &str = "public";

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Ordinary tables only; views and foreign tables do not count.
const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1 AND table_name = $2 AND table_type = 'BASE TABLE')";

pub struct PostgresDriver {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresDriver {
    /// Connect using a `postgres://` URL plus credential overrides.
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let mut pg_config: PgConfig = options
            .url
            .parse()
            .map_err(|e| LoadError::Config(format!("Invalid PostgreSQL URL: {}", e)))?;
        if let Some(user) = &options.user {
            pg_config.user(user);
        }
        if let Some(password) = &options.password {
            pg_config.password(password);
        }
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let database = pg_config.get_dbname().unwrap_or("<default>").to_string();
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match TlsBuilder::new(options.ssl_mode).build()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };
        let pool = Pool::builder(mgr)
            .max_size(options.max_connections)
            .build()
            .map_err(|e| LoadError::pool(e.to_string(), "creating PostgreSQL pool"))?;

        let driver = Self {
            pool,
            dialect: PostgresDialect::new(),
        };
        driver
            .client("testing PostgreSQL connection")
            .await?
            .simple_query("SELECT 1")
            .await?;

        info!("Connected to PostgreSQL database {}", database);
        Ok(driver)
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| LoadError::pool(e.to_string(), context))
    }
}

#[async_trait]
impl TargetDriver for PostgresDriver {
    fn name(&self) -> &str {
        "postgres"
    }

    fn table_identity(&self, schema: Option<&str>, table: &str) -> Result<TableIdentity> {
        self.dialect
            .table_identity(schema.unwrap_or(DEFAULT_SCHEMA), table)
    }

    async fn table_exists(&self, table: &TableIdentity) -> Result<bool> {
        let client = self.client("checking table existence").await?;
        let row = client
            .query_one(TABLE_EXISTS_SQL, &[&table.schema(), &table.table()])
            .await?;
        Ok(row.get(0))
    }

    async fn load_schema(&self, table: &TableIdentity) -> Result<Schema> {
        let client = self.client("loading table schema").await?;
        let rows = client
            .query(
                "SELECT column_name::text, data_type::text, udt_name::text, \
                        is_nullable = 'YES', ordinal_position::int4 \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY ordinal_position",
                &[&table.schema(), &table.table()],
            )
            .await?;

        let types = self.dialect.type_mapping();
        let mut schema = Schema::new();
        for row in rows {
            let name: String = row.get(0);
            let data_type: String = row.get(1);
            let udt_name: String = row.get(2);
            let nullable: bool = row.get(3);
            let ordinal: i32 = row.get(4);

            let Some(semantic_type) = types
                .semantic_type(&udt_name)
                .or_else(|| types.semantic_type(&data_type))
            else {
                warn!(
                    "Column {:?} of {} has unsupported type {}, it will not be loaded",
                    name, table, udt_name
                );
                continue;
            };
            let position = usize::try_from(ordinal - 1).map_err(|_| {
                LoadError::schema(table.to_string(), format!("bad ordinal position {}", ordinal))
            })?;
            schema.push(
                name,
                ColumnDefinition::new(semantic_type, nullable, position).with_native_type(udt_name),
            )?;
        }

        debug!("Schema of {}:\n{}", table, schema.render());
        Ok(schema)
    }

    async fn create_table(&self, table: &TableIdentity, schema: &Schema) -> Result<()> {
        let sql = self.dialect.build_create_table(table, schema)?;
        let client = self.client("creating table").await?;
        client.batch_execute(&sql).await?;
        info!("Created table {} with {} columns", table, schema.len());
        debug!("{}", sql);
        Ok(())
    }

    async fn drop_table(&self, table: &TableIdentity) -> Result<()> {
        let client = self.client("dropping table").await?;
        client
            .batch_execute(&self.dialect.build_drop_table(table))
            .await?;
        info!("Dropped table {}", table);
        Ok(())
    }

    async fn truncate_table(&self, table: &TableIdentity) -> Result<()> {
        let client = self.client("truncating table").await?;
        client.batch_execute(&self.dialect.build_truncate(table)).await?;
        info!("Truncated table {}", table);
        Ok(())
    }

    async fn delete_all_rows(&self, table: &TableIdentity) -> Result<()> {
        let client = self.client("deleting rows").await?;
        let deleted = client
            .execute(self.dialect.build_delete_all(table).as_str(), &[])
            .await?;
        info!("Deleted {} rows from {}", deleted, table);
        Ok(())
    }

    fn render_insert_statement(
        &self,
        table: &TableIdentity,
        schema: &InsertSchema,
        rows: usize,
    ) -> Result<String> {
        self.dialect.build_insert(table, schema, rows)
    }

    async fn create_writer(
        &self,
        table: &TableIdentity,
        schema: Arc<InsertSchema>,
        options: &WriterOptions,
    ) -> Result<Box<dyn RowWriter>> {
        let client = self.client("acquiring writer connection").await?;
        match options.insert_method {
            InsertMethod::Batch => Ok(Box::new(BatchedWriter::new(
                PostgresSession::new(client),
                DialectImpl::Postgres(self.dialect.clone()),
                table.clone(),
                schema,
                options,
            )?)),
            InsertMethod::Copy => Ok(Box::new(PostgresCopyWriter::new(
                client,
                &self.dialect,
                table.clone(),
                schema,
            )?)),
        }
    }

    async fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SemanticType;

    /// Driver over a pool that never connects; only SQL rendering is exercised.
    fn offline_driver() -> PostgresDriver {
        let config: PgConfig = "postgres://loader@localhost/warehouse".parse().unwrap();
        let mgr = Manager::from_config(
            config,
            tokio_postgres::NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        PostgresDriver {
            pool: Pool::builder(mgr).max_size(1).build().unwrap(),
            dialect: PostgresDialect::new(),
        }
    }

    fn people() -> InsertSchema {
        let mut schema = Schema::new();
        schema
            .push("id", ColumnDefinition::new(SemanticType::Int64, false, 0))
            .unwrap();
        schema
            .push("name", ColumnDefinition::new(SemanticType::Text, true, 1))
            .unwrap();
        schema.to_insert_schema()
    }

    #[test]
    fn test_table_exists_ignores_views() {
        assert!(TABLE_EXISTS_SQL.contains("table_type = 'BASE TABLE'"));
    }

    #[test]
    fn test_unqualified_table_uses_public() {
        let driver = offline_driver();
        let table = driver.table_identity(None, "people").unwrap();
        assert_eq!(table.qualified(), "\"public\".\"people\"");
        let table = driver.table_identity(Some("sales"), "people").unwrap();
        assert_eq!(table.schema(), "sales");
    }

    #[test]
    fn test_render_insert_statement() {
        let driver = offline_driver();
        let table = driver.table_identity(None, "people").unwrap();
        let schema = people();

        let sql = driver.render_insert_statement(&table, &schema, 2).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"people\" (\"id\", \"name\") VALUES \
             ($1::bigint, $2::text), ($3::bigint, $4::text)"
        );
        assert_eq!(driver.render_insert_statement(&table, &schema, 2).unwrap(), sql);
        assert!(driver.render_insert_statement(&table, &schema, 0).is_err());
    }
}
