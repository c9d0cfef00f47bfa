//! Table naming for the SQL engines.
//!
//! The audit trail lives in two tables: one holding a marker per applied
//! migration, one holding a detailed record per execution attempt. Both names
//! can be changed, or prefixed, when several deployments share a database.

use crate::error::{Result, StoreError};

/// Default name of the applied-migration marker table
pub const DEFAULT_APPLIED_TABLE: &str = "deploy_migrations";

/// Default name of the migration info table
pub const DEFAULT_INFO_TABLE: &str = "deploy_migrations_info";

/// Names of the two audit tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Table holding one row per applied migration
    pub applied_table: String,

    /// Table holding one row per execution attempt
    pub info_table: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            applied_table: DEFAULT_APPLIED_TABLE.to_owned(),
            info_table: DEFAULT_INFO_TABLE.to_owned(),
        }
    }
}

/// Configuration builder for customizing table names
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    prefix: Option<String>,
    applied_table: Option<String>,
    info_table: Option<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix both table names, `{prefix}_{table}`
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn applied_table(mut self, name: impl Into<String>) -> Self {
        self.applied_table = Some(name.into());
        self
    }

    pub fn info_table(mut self, name: impl Into<String>) -> Self {
        self.info_table = Some(name.into());
        self
    }

    /// Build the final configuration, rejecting names that are not plain
    /// SQL identifiers since they are interpolated into statements.
    pub fn build(self) -> Result<TableConfig> {
        let applied = self
            .applied_table
            .unwrap_or_else(|| DEFAULT_APPLIED_TABLE.to_owned());
        let info = self
            .info_table
            .unwrap_or_else(|| DEFAULT_INFO_TABLE.to_owned());

        let (applied_table, info_table) = match self.prefix {
            Some(prefix) => (format!("{prefix}_{applied}"), format!("{prefix}_{info}")),
            _ => (applied, info),
        };

        for name in [&applied_table, &info_table] {
            if !is_identifier(name) {
                return Err(StoreError::InvalidTableName(name.to_owned()));
            }
        }

        Ok(TableConfig {
            applied_table,
            info_table,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
