use async_trait::async_trait;

use crate::{
    error::Result,
    record::{AppliedMigration, MigrationInfo},
};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "pg")]
mod pg;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "memory")]
pub use memory::*;
#[cfg(feature = "pg")]
pub use pg::*;
#[cfg(feature = "sqlite")]
pub use sqlite::*;

/// Backing store of the audit trail.
#[async_trait]
pub trait Engine: Clone + Send + Sync + 'static {
    type Transaction: Transaction;

    async fn begin(&self) -> Result<Self::Transaction>;

    /// Writes an info record outside of any open transaction, so it survives
    /// a rollback issued just before.
    async fn insert_info(&self, info: &MigrationInfo) -> Result<()>;

    async fn read_applied(&self) -> Result<Vec<AppliedMigration>>;

    async fn read_info(&self, migration: Option<&str>) -> Result<Vec<MigrationInfo>>;
}

/// A unit of work spanning one migration's side effects and its success
/// records.
#[async_trait]
pub trait Transaction: Send {
    async fn is_applied(&mut self, migration: &str) -> Result<bool>;

    /// Fails with [`StoreError::DuplicateMarker`](crate::StoreError::DuplicateMarker)
    /// when a marker already exists for the migration.
    async fn insert_applied(&mut self, applied: &AppliedMigration) -> Result<()>;

    async fn insert_info(&mut self, info: &MigrationInfo) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
