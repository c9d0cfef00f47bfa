use chrono::{DateTime, Utc};
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::fmt;
use uuid::Uuid;

use crate::error::Result;

/// Marker proving a migration ran to completion. At most one exists per
/// migration identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(any(feature = "pg", feature = "sqlite"), derive(sqlx::FromRow))]
pub struct AppliedMigration {
    pub migration: String,
    pub created_at: DateTime<Utc>,
}

impl AppliedMigration {
    pub fn new(migration: impl Into<String>) -> Self {
        Self {
            migration: migration.into(),
            created_at: Utc::now(),
        }
    }
}

/// Detailed record of one execution attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationInfo {
    pub id: Uuid,
    pub migration: String,
    pub output: Outputs,
    pub error: Option<ErrorDetail>,
    pub created_at: DateTime<Utc>,
}

impl MigrationInfo {
    pub fn succeeded(migration: impl Into<String>, output: Outputs) -> Self {
        Self {
            id: Uuid::new_v4(),
            migration: migration.into(),
            output,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn failed(migration: impl Into<String>, output: Outputs, error: ErrorDetail) -> Self {
        Self {
            error: Some(error),
            ..Self::succeeded(migration, output)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn output_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.output)?)
    }

    pub fn error_json(&self) -> Result<Option<String>> {
        match &self.error {
            Some(error) => Ok(Some(serde_json::to_string(error)?)),
            _ => Ok(None),
        }
    }
}

/// Failure details attached to a [`MigrationInfo`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub trace: String,
    pub message: String,
    pub code: i64,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub error_command: Option<String>,
}

/// Captured lines per command, in execution order.
///
/// Behaves like an ordered map: inserting a command that is already present
/// replaces its lines without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outputs(Vec<(String, Vec<String>)>);

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, command: impl Into<String>, lines: Vec<String>) {
        let command = command.into();

        match self.0.iter_mut().find(|(name, _)| *name == command) {
            Some((_, existing)) => *existing = lines,
            _ => self.0.push((command, lines)),
        }
    }

    pub fn get(&self, command: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(name, _)| name == command)
            .map(|(_, lines)| lines.as_slice())
    }

    pub fn contains(&self, command: &str) -> bool {
        self.get(command).is_some()
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, lines)| (name.as_str(), lines.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Outputs {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter().map(|(name, lines)| (name, lines)))
    }
}

impl<'de> Deserialize<'de> for Outputs {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OutputsVisitor;

        impl<'de> Visitor<'de> for OutputsVisitor {
            type Value = Outputs;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of command names to output lines")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut outputs = Outputs::new();

                while let Some((name, lines)) = map.next_entry::<String, Vec<String>>()? {
                    outputs.insert(name, lines);
                }

                Ok(outputs)
            }
        }

        deserializer.deserialize_map(OutputsVisitor)
    }
}

/// Raw row of the info table, output and error still JSON encoded.
#[cfg(any(feature = "pg", feature = "sqlite"))]
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct InfoRow {
    pub id: String,
    pub migration: String,
    pub output: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(any(feature = "pg", feature = "sqlite"))]
impl TryFrom<InfoRow> for MigrationInfo {
    type Error = crate::error::StoreError;

    fn try_from(row: InfoRow) -> Result<Self> {
        let error = match row.error {
            Some(error) => Some(serde_json::from_str(&error)?),
            _ => None,
        };

        Ok(Self {
            id: Uuid::parse_str(&row.id)?,
            migration: row.migration,
            output: serde_json::from_str(&row.output)?,
            error,
            created_at: row.created_at,
        })
    }
}
