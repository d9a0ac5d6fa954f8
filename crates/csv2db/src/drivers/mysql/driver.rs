//! MySQL/MariaDB target driver.

use std::sync::Arc;

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts};
use tracing::{debug, info, warn};

use crate::core::identifier::TableIdentity;
use crate::core::schema::{ColumnDefinition, InsertSchema, Schema};
use crate::core::traits::{Dialect, InsertMethod, RowWriter, TargetDriver, WriterOptions};
use crate::drivers::common::SslMode;
use crate::drivers::{ConnectOptions, DialectImpl};
use crate::error::{LoadError, Result};
use crate::writer::BatchedWriter;

use super::{MysqlDialect, MysqlSession};

/// Base tables only; views share `information_schema.TABLES`.
const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND TABLE_TYPE = 'BASE TABLE'";

pub struct MysqlDriver {
    pool: Pool,
    dialect: MysqlDialect,
    /// Database selected by the connection URL, used for unqualified tables.
    default_schema: Option<String>,
}

impl MysqlDriver {
    /// Connect using a `mysql://` URL plus credential overrides.
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let url_opts = Opts::from_url(&options.url)
            .map_err(|e| LoadError::Config(format!("Invalid MySQL URL: {}", e)))?;

        let mut builder = OptsBuilder::from_opts(url_opts).init(vec!["SET NAMES utf8mb4"]);
        if let Some(user) = &options.user {
            builder = builder.user(Some(user));
        }
        if let Some(password) = &options.password {
            builder = builder.pass(Some(password));
        }
        builder = match options.ssl_mode {
            SslMode::Disable => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                builder
            }
            SslMode::Require => {
                builder.ssl_opts(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
            SslMode::VerifyCa => {
                builder.ssl_opts(SslOpts::default().with_danger_skip_domain_validation(true))
            }
            SslMode::VerifyFull => builder.ssl_opts(SslOpts::default()),
        };

        let constraints = PoolConstraints::new(1, options.max_connections.max(1)).ok_or_else(|| {
            LoadError::Config(format!(
                "Invalid MySQL pool size {}",
                options.max_connections
            ))
        })?;
        let opts: Opts = builder
            .pool_opts(PoolOpts::new().with_constraints(constraints))
            .into();
        let pool = Pool::new(opts);

        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| LoadError::pool(e.to_string(), "connecting to MySQL"))?;
        let current: Option<Option<String>> = conn.query_first("SELECT DATABASE()").await?;
        let default_schema = current.flatten();
        drop(conn);

        info!(
            "Connected to MySQL database {}",
            default_schema.as_deref().unwrap_or("<none>")
        );

        Ok(Self {
            pool,
            dialect: MysqlDialect::new(),
            default_schema,
        })
    }

    async fn conn(&self, context: &str) -> Result<Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| LoadError::pool(e.to_string(), context))
    }
}

#[async_trait]
impl TargetDriver for MysqlDriver {
    fn name(&self) -> &str {
        "mysql"
    }

    fn table_identity(&self, schema: Option<&str>, table: &str) -> Result<TableIdentity> {
        let schema = schema.or(self.default_schema.as_deref()).ok_or_else(|| {
            LoadError::Config(
                "No MySQL database selected: add it to the URL or qualify the table as database.table"
                    .to_string(),
            )
        })?;
        self.dialect.table_identity(schema, table)
    }

    async fn table_exists(&self, table: &TableIdentity) -> Result<bool> {
        let mut conn = self.conn("checking table existence").await?;
        let count: Option<i64> = conn
            .exec_first(TABLE_EXISTS_SQL, (table.schema(), table.table()))
            .await?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn load_schema(&self, table: &TableIdentity) -> Result<Schema> {
        let mut conn = self.conn("loading table schema").await?;
        let rows: Vec<(String, String, String, u64)> = conn
            .exec(
                "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, ORDINAL_POSITION \
                 FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
                 ORDER BY ORDINAL_POSITION",
                (table.schema(), table.table()),
            )
            .await?;

        let types = self.dialect.type_mapping();
        let mut schema = Schema::new();
        for (name, data_type, is_nullable, ordinal) in rows {
            let Some(semantic_type) = types.semantic_type(&data_type) else {
                warn!(
                    "Column {:?} of {} has unsupported type {}, it will not be loaded",
                    name, table, data_type
                );
                continue;
            };
            let position = usize::try_from(ordinal.saturating_sub(1)).map_err(|_| {
                LoadError::schema(table.to_string(), format!("bad ordinal position {}", ordinal))
            })?;
            schema.push(
                name,
                ColumnDefinition::new(semantic_type, is_nullable == "YES", position)
                    .with_native_type(data_type),
            )?;
        }

        debug!("Schema of {}:\n{}", table, schema.render());
        Ok(schema)
    }

    async fn create_table(&self, table: &TableIdentity, schema: &Schema) -> Result<()> {
        let sql = self.dialect.build_create_table(table, schema)?;
        let mut conn = self.conn("creating table").await?;
        conn.query_drop(sql.as_str()).await?;
        info!("Created table {} with {} columns", table, schema.len());
        debug!("{}", sql);
        Ok(())
    }

    async fn drop_table(&self, table: &TableIdentity) -> Result<()> {
        let mut conn = self.conn("dropping table").await?;
        conn.query_drop(self.dialect.build_drop_table(table)).await?;
        info!("Dropped table {}", table);
        Ok(())
    }

    async fn truncate_table(&self, table: &TableIdentity) -> Result<()> {
        let mut conn = self.conn("truncating table").await?;
        conn.query_drop(self.dialect.build_truncate(table)).await?;
        info!("Truncated table {}", table);
        Ok(())
    }

    async fn delete_all_rows(&self, table: &TableIdentity) -> Result<()> {
        let mut conn = self.conn("deleting rows").await?;
        conn.query_drop(self.dialect.build_delete_all(table)).await?;
        info!("Deleted {} rows from {}", conn.affected_rows(), table);
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
        if options.insert_method == InsertMethod::Copy {
            warn!("MySQL has no COPY protocol, using batched INSERT");
        }
        let conn = self.conn("acquiring writer connection").await?;
        Ok(Box::new(BatchedWriter::new(
            MysqlSession::new(conn),
            DialectImpl::Mysql(self.dialect.clone()),
            table.clone(),
            schema,
            options,
        )?))
    }

    async fn close(&self) {
        self.pool.clone().disconnect().await.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SemanticType;

    /// Driver over a pool that never connects; only SQL rendering is exercised.
    fn offline_driver(default_schema: Option<&str>) -> MysqlDriver {
        let opts = Opts::from_url("mysql://loader@localhost/app").unwrap();
        MysqlDriver {
            pool: Pool::new(opts),
            dialect: MysqlDialect::new(),
            default_schema: default_schema.map(str::to_string),
        }
    }

    #[test]
    fn test_table_exists_ignores_views() {
        assert!(TABLE_EXISTS_SQL.contains("TABLE_TYPE = 'BASE TABLE'"));
    }

    #[tokio::test]
    async fn test_table_identity_needs_a_database() {
        let driver = offline_driver(None);
        assert!(matches!(
            driver.table_identity(None, "people"),
            Err(LoadError::Config(_))
        ));
        let table = driver.table_identity(Some("app"), "people").unwrap();
        assert_eq!(table.qualified(), "`app`.`people`");
    }

    #[tokio::test]
    async fn test_render_insert_statement() {
        let driver = offline_driver(Some("app"));
        let table = driver.table_identity(None, "people").unwrap();
        let mut schema = Schema::new();
        schema
            .push("id", ColumnDefinition::new(SemanticType::Int32, false, 0))
            .unwrap();
        schema
            .push("name", ColumnDefinition::new(SemanticType::Text, true, 1))
            .unwrap();
        let schema = schema.to_insert_schema();

        assert_eq!(
            driver.render_insert_statement(&table, &schema, 3).unwrap(),
            "INSERT INTO `app`.`people` (`id`, `name`) VALUES (?, ?), (?, ?), (?, ?)"
        );
    }
}
