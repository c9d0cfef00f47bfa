use async_trait::async_trait;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    config::TableConfig,
    engine::{Engine, Transaction},
    error::{Result, StoreError},
    record::{AppliedMigration, InfoRow, MigrationInfo},
};

#[derive(Debug, Clone)]
pub struct SqliteEngine {
    pool: SqlitePool,
    config: TableConfig,
}

impl SqliteEngine {
    pub fn new(pool: &SqlitePool) -> Self {
        Self::with_config(pool, TableConfig::default())
    }

    pub fn with_config(pool: &SqlitePool, config: TableConfig) -> Self {
        Self {
            pool: pool.clone(),
            config,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Creates the audit tables when missing.
    pub async fn setup(&self) -> Result<()> {
        let TableConfig {
            applied_table,
            info_table,
        } = &self.config;

        tracing::debug!(%applied_table, %info_table, "creating audit tables");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {applied_table} (
                migration TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {info_table} (
                id TEXT NOT NULL PRIMARY KEY,
                migration TEXT NOT NULL,
                output TEXT NOT NULL,
                error TEXT NULL,
                created_at TEXT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{info_table}_migration ON {info_table} (migration)"
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Engine for SqliteEngine {
    type Transaction = SqliteTransaction;

    async fn begin(&self) -> Result<SqliteTransaction> {
        Ok(SqliteTransaction {
            tx: self.pool.begin().await?,
            config: self.config.clone(),
        })
    }

    async fn insert_info(&self, info: &MigrationInfo) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        insert_info(&mut conn, &self.config.info_table, info).await
    }

    async fn read_applied(&self) -> Result<Vec<AppliedMigration>> {
        let applied = sqlx::query_as::<_, AppliedMigration>(&format!(
            "SELECT migration, created_at FROM {} ORDER BY created_at ASC, migration ASC",
            self.config.applied_table
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(applied)
    }

    async fn read_info(&self, migration: Option<&str>) -> Result<Vec<MigrationInfo>> {
        let info_table = &self.config.info_table;

        let rows = match migration {
            Some(migration) => {
                sqlx::query_as::<_, InfoRow>(&format!(
                    "SELECT id, migration, output, error, created_at FROM {info_table} WHERE migration = ? ORDER BY created_at ASC, rowid ASC"
                ))
                .bind(migration)
                .fetch_all(&self.pool)
                .await?
            }
            _ => {
                sqlx::query_as::<_, InfoRow>(&format!(
                    "SELECT id, migration, output, error, created_at FROM {info_table} ORDER BY created_at ASC, rowid ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(MigrationInfo::try_from).collect()
    }
}

pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
    config: TableConfig,
}

impl SqliteTransaction {
    /// Connection bound to the open transaction, for commands running SQL
    /// as part of the migration.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn is_applied(&mut self, migration: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} WHERE migration = ?",
            self.config.applied_table
        ))
        .bind(migration)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count > 0)
    }

    async fn insert_applied(&mut self, applied: &AppliedMigration) -> Result<()> {
        let res = sqlx::query(&format!(
            "INSERT INTO {} (migration, created_at) VALUES (?, ?)",
            self.config.applied_table
        ))
        .bind(&applied.migration)
        .bind(applied.created_at)
        .execute(&mut *self.tx)
        .await;

        match res {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                StoreError::DuplicateMarker(applied.migration.to_owned()),
            ),
            Err(e) => Err(e.into()),
            Ok(_) => Ok(()),
        }
    }

    async fn insert_info(&mut self, info: &MigrationInfo) -> Result<()> {
        insert_info(&mut self.tx, &self.config.info_table, info).await
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;

        Ok(())
    }
}

async fn insert_info(
    conn: &mut SqliteConnection,
    info_table: &str,
    info: &MigrationInfo,
) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {info_table} (id, migration, output, error, created_at) VALUES (?, ?, ?, ?, ?)"
    ))
    .bind(info.id.to_string())
    .bind(&info.migration)
    .bind(info.output_json()?)
    .bind(info.error_json()?)
    .bind(info.created_at)
    .execute(conn)
    .await?;

    Ok(())
}
