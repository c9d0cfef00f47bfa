use chrono::{DateTime, Utc};
use deploy_migration_store::{
    AppliedMigration, Engine, MigrationInfo, Outputs, Transaction,
};
use std::collections::HashMap;

use crate::{
    command::{Executor, Registry},
    context::{Context, Extensions},
    error::{Error, Result},
    migration::Migration,
    progress::Progress,
};

/// Outcome of a [`Migrator::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStatus {
    pub migration: String,
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Applies migrations in order, each exactly once and inside its own
/// transaction, keeping an audit record of every attempt.
pub struct Migrator<E: Engine> {
    engine: E,
    registry: Registry<E>,
    extensions: Extensions,
}

/// State of the migration being applied, kept for failure reporting.
struct Attempt {
    migration: String,
    command: Option<String>,
    outputs: Outputs,
}

impl<E: Engine> Migrator<E> {
    pub fn new(engine: E, registry: Registry<E>) -> Self {
        Self {
            engine,
            registry,
            extensions: Extensions::new(),
        }
    }

    /// Shares a value with every command, see [`Context::get`].
    pub fn data<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn registry(&self) -> &Registry<E> {
        &self.registry
    }

    /// Applies `migrations` in order. Already applied ones are skipped; the
    /// first failure stops the run and is returned as [`Error::Execution`]
    /// once its audit record is written.
    pub async fn run<P: Progress + ?Sized>(
        &self,
        migrations: &[Box<dyn Migration>],
        progress: &mut P,
    ) -> Result<Report> {
        let mut report = Report::default();

        for migration in migrations {
            let name = migration.name();

            if self.apply(migration.as_ref(), &name, progress).await? {
                report.applied.push(name);
            } else {
                report.skipped.push(name);
            }
        }

        Ok(report)
    }

    pub async fn status(&self, migrations: &[Box<dyn Migration>]) -> Result<Vec<MigrationStatus>> {
        let applied = self
            .engine
            .read_applied()
            .await?
            .into_iter()
            .map(|a| (a.migration, a.created_at))
            .collect::<HashMap<_, _>>();

        Ok(migrations
            .iter()
            .map(|migration| {
                let migration = migration.name();
                let applied_at = applied.get(&migration).copied();

                MigrationStatus {
                    migration,
                    applied_at,
                }
            })
            .collect())
    }

    pub async fn pending(&self, migrations: &[Box<dyn Migration>]) -> Result<Vec<String>> {
        Ok(self
            .status(migrations)
            .await?
            .into_iter()
            .filter(|status| !status.is_applied())
            .map(|status| status.migration)
            .collect())
    }

    /// Every recorded attempt of `migration`, oldest first.
    pub async fn history(&self, migration: &str) -> Result<Vec<MigrationInfo>> {
        Ok(self.engine.read_info(Some(migration)).await?)
    }

    /// Returns `false` when the migration was already applied.
    async fn apply<P: Progress + ?Sized>(
        &self,
        migration: &dyn Migration,
        name: &str,
        progress: &mut P,
    ) -> Result<bool> {
        let mut tx = self.engine.begin().await?;
        let mut attempt = Attempt {
            migration: name.to_owned(),
            command: None,
            outputs: Outputs::new(),
        };

        match self.attempt(&mut tx, migration, &mut attempt, progress).await {
            Ok(false) => {
                tx.rollback().await?;
                tracing::debug!(migration = name, "already applied, skipping");

                Ok(false)
            }
            Ok(true) => match tx.commit().await {
                Ok(()) => {
                    tracing::info!(migration = name, "migration applied");

                    Ok(true)
                }
                Err(e) => Err(self.fail(attempt, e.into(), progress).await),
            },
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(migration = name, "rollback failed: {rollback}");
                }

                Err(self.fail(attempt, e, progress).await)
            }
        }
    }

    /// Everything of a migration that happens inside its transaction, up to
    /// the commit.
    async fn attempt<P: Progress + ?Sized>(
        &self,
        tx: &mut E::Transaction,
        migration: &dyn Migration,
        attempt: &mut Attempt,
        progress: &mut P,
    ) -> Result<bool> {
        if tx.is_applied(&attempt.migration).await? {
            return Ok(false);
        }

        let executor = Executor::new(&self.registry);

        for invocation in migration.commands().iter() {
            attempt.command = Some(invocation.command.to_owned());

            let mut ctx = Context::<E>::new(
                &attempt.migration,
                &invocation.command,
                tx,
                &self.extensions,
            );

            match executor.execute(&mut ctx, invocation).await {
                Ok(lines) => attempt.outputs.insert(&invocation.command, lines),
                Err(failure) => {
                    if let Some(lines) = failure.output {
                        attempt.outputs.insert(&invocation.command, lines);
                    }

                    return Err(failure.error);
                }
            }
        }

        progress.advance();

        tx.insert_applied(&AppliedMigration::new(&attempt.migration))
            .await?;
        tx.insert_info(&MigrationInfo::succeeded(
            &attempt.migration,
            attempt.outputs.clone(),
        ))
        .await?;

        Ok(true)
    }

    /// Reports a failed attempt and records it. Runs after the rollback so
    /// the info record is written outside the aborted transaction.
    async fn fail<P: Progress + ?Sized>(
        &self,
        attempt: Attempt,
        error: Error,
        progress: &mut P,
    ) -> Error {
        let Attempt {
            migration,
            command,
            outputs,
        } = attempt;

        let detail = error.detail(command.as_deref());

        progress.writeln("");
        progress.writeln(&format!(
            "Error during {migration} migration; {} command",
            command.as_deref().unwrap_or("no")
        ));
        progress.writeln(&detail.trace);

        tracing::error!(
            migration = %migration,
            command = command.as_deref().unwrap_or_default(),
            "migration failed: {error}"
        );

        let info = MigrationInfo::failed(&migration, outputs, detail);

        if let Err(e) = self.engine.insert_info(&info).await {
            tracing::error!(migration = %migration, "failed to record migration failure: {e}");
        }

        Error::Execution {
            migration,
            command,
            source: Box::new(error),
        }
    }
}
