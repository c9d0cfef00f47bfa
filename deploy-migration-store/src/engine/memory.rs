use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

use crate::{
    engine::{Engine, Transaction},
    error::{Result, StoreError},
    record::{AppliedMigration, MigrationInfo},
};

#[derive(Debug, Default)]
struct State {
    applied: Vec<AppliedMigration>,
    infos: Vec<MigrationInfo>,
    rows: HashMap<String, Vec<Value>>,
}

impl State {
    fn has_marker(&self, migration: &str) -> bool {
        self.applied.iter().any(|a| a.migration == migration)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEngine(Arc<RwLock<State>>);

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of a table written through [`MemoryTransaction::insert_row`].
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.0.read().rows.get(table).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        Ok(MemoryTransaction {
            state: self.0.clone(),
            staged: State::default(),
        })
    }

    async fn insert_info(&self, info: &MigrationInfo) -> Result<()> {
        self.0.write().infos.push(info.clone());

        Ok(())
    }

    async fn read_applied(&self) -> Result<Vec<AppliedMigration>> {
        let mut applied = self.0.read().applied.clone();
        applied.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.migration.cmp(&b.migration))
        });

        Ok(applied)
    }

    async fn read_info(&self, migration: Option<&str>) -> Result<Vec<MigrationInfo>> {
        let infos = self
            .0
            .read()
            .infos
            .iter()
            .filter(|info| migration.map_or(true, |m| info.migration == m))
            .cloned()
            .collect();

        Ok(infos)
    }
}

/// Writes are staged locally and only become visible to the engine on commit.
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<RwLock<State>>,
    staged: State,
}

impl MemoryTransaction {
    pub fn insert_row(&mut self, table: impl Into<String>, row: Value) {
        self.staged.rows.entry(table.into()).or_default().push(row);
    }

    /// Committed rows followed by the rows staged in this transaction.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        let mut rows = self
            .state
            .read()
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default();

        if let Some(staged) = self.staged.rows.get(table) {
            rows.extend(staged.iter().cloned());
        }

        rows
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn is_applied(&mut self, migration: &str) -> Result<bool> {
        let applied = self.staged.has_marker(migration) || self.state.read().has_marker(migration);

        Ok(applied)
    }

    async fn insert_applied(&mut self, applied: &AppliedMigration) -> Result<()> {
        if self.is_applied(&applied.migration).await? {
            return Err(StoreError::DuplicateMarker(applied.migration.to_owned()));
        }

        self.staged.applied.push(applied.clone());

        Ok(())
    }

    async fn insert_info(&mut self, info: &MigrationInfo) -> Result<()> {
        self.staged.infos.push(info.clone());

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let Self { state, staged } = self;
        let mut state = state.write();

        if let Some(applied) = staged
            .applied
            .iter()
            .find(|applied| state.has_marker(&applied.migration))
        {
            return Err(StoreError::DuplicateMarker(applied.migration.to_owned()));
        }

        state.applied.extend(staged.applied);
        state.infos.extend(staged.infos);

        for (table, rows) in staged.rows {
            state.rows.entry(table).or_default().extend(rows);
        }

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
