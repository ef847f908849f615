use anyhow::{Context, Result};
use sqlx::{AnyConnection, Connection};
use tracing::{info, instrument};

use crate::loader::Layout;

const POSTGRES_SCHEMA: &str = include_str!("../../schema/postgres.sql");
const SQLITE_SCHEMA: &str = include_str!("../../schema/sqlite.sql");

/// The single connection a run holds open from the first window to the last.
pub struct Db {
    pub conn: AnyConnection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let conn = AnyConnection::connect(database_url)
            .await
            .context("failed to open database connection")?;
        info!(backend = conn.backend_name(), "connected to db");
        Ok(Self { conn })
    }

    pub fn backend(&self) -> Result<Backend> {
        match self.conn.backend_name() {
            "PostgreSQL" => Ok(Backend::Postgres),
            "SQLite" => Ok(Backend::Sqlite),
            other => Err(anyhow::anyhow!("unsupported database backend {other}")),
        }
    }

    /// Create the tables for `layout` if they are missing. Bootstrap only:
    /// existing tables are left untouched.
    pub async fn init_schema(&mut self, layout: Layout) -> Result<()> {
        let ddl = match self.backend()? {
            Backend::Postgres => POSTGRES_SCHEMA,
            Backend::Sqlite => SQLITE_SCHEMA,
        };
        let wanted = layout.tables();
        let mut created = 0usize;
        for stmt in statements(ddl) {
            let Some(table) = created_table(stmt) else {
                continue;
            };
            if !wanted.contains(&table) {
                continue;
            }
            sqlx::raw_sql(stmt)
                .execute(&mut self.conn)
                .await
                .with_context(|| format!("create table {table}"))?;
            created += 1;
        }
        info!(?layout, tables = created, "schema bootstrap complete");
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await.context("close database connection")
    }
}

fn statements(ddl: &str) -> impl Iterator<Item = &str> {
    ddl.split(';').map(str::trim).filter(|s| !s.is_empty())
}

/// Table name of a `CREATE TABLE IF NOT EXISTS <name> (` statement.
fn created_table(stmt: &str) -> Option<&str> {
    let body = stmt
        .lines()
        .filter(|l| !l.trim_start().starts_with("--"))
        .find(|l| !l.trim().is_empty())?;
    let rest = body.trim().strip_prefix("CREATE TABLE IF NOT EXISTS ")?;
    rest.split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .filter(|s| !s.is_empty())
}
