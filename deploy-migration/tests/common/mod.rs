#![allow(dead_code)]

use async_trait::async_trait;
use deploy_migration::{
    Command, CommandError, Commands, Context, Engine, Input, MemoryEngine, Migration, Migrator,
    Output, Progress, Registry, Transaction,
};
use deploy_migration_store::{
    AppliedMigration, MigrationInfo, Result as StoreResult, SqliteEngine, StoreError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::{collections::HashSet, sync::Arc};

/// Every command execution, as `{migration}.{command}`.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record<E: Engine>(&self, ctx: &Context<'_, E>) {
        self.0
            .lock()
            .push(format!("{}.{}", ctx.migration(), ctx.command()));
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Table the widget commands write to.
#[derive(Debug, Clone)]
pub struct WidgetTable(pub String);

#[derive(Debug, Default)]
pub struct Ticks {
    pub advanced: usize,
    pub lines: Vec<String>,
}

impl Progress for Ticks {
    fn advance(&mut self) {
        self.advanced += 1;
    }

    fn writeln(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }
}

pub struct Plan {
    name: &'static str,
    commands: Commands,
}

impl Migration for Plan {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn commands(&self) -> Commands {
        self.commands.clone()
    }
}

pub fn plan(name: &'static str, commands: Commands) -> Box<dyn Migration> {
    Box::new(Plan { name, commands })
}

fn lines(input: &Input, output: &mut Output) {
    output.extend(
        input
            .positional()
            .map(|value| value.as_str().map(ToOwned::to_owned).unwrap_or_else(|| value.to_string())),
    );
}

/// Writes its positional arguments as output lines.
pub struct Echo;

#[async_trait]
impl<E: Engine> Command<E> for Echo {
    async fn run(
        &self,
        ctx: &mut Context<'_, E>,
        input: &Input,
        output: &mut Output,
    ) -> anyhow::Result<()> {
        ctx.extract::<Journal>()?.record(ctx);
        lines(input, output);

        Ok(())
    }
}

/// Writes its positional arguments, then fails with `--code` (default 1).
pub struct Fail;

#[async_trait]
impl<E: Engine> Command<E> for Fail {
    async fn run(
        &self,
        ctx: &mut Context<'_, E>,
        input: &Input,
        output: &mut Output,
    ) -> anyhow::Result<()> {
        ctx.extract::<Journal>()?.record(ctx);
        lines(input, output);

        let code = input.get_as::<i64>("code")?.unwrap_or(1);

        Err(CommandError::new("widget factory on fire").code(code).into())
    }
}

/// Writes the marker of its own migration, making the migrator's marker
/// insert fail.
pub struct MarkApplied;

#[async_trait]
impl<E: Engine> Command<E> for MarkApplied {
    async fn run(
        &self,
        ctx: &mut Context<'_, E>,
        _input: &Input,
        output: &mut Output,
    ) -> anyhow::Result<()> {
        ctx.extract::<Journal>()?.record(ctx);

        let applied = AppliedMigration::new(ctx.migration());
        ctx.tx().insert_applied(&applied).await?;
        output.writeln("marked");

        Ok(())
    }
}

/// Inserts a widget named after its first positional argument, inside the
/// migration's transaction.
pub struct InsertWidget;

fn widget_name(input: &Input) -> String {
    input
        .argument(0)
        .and_then(Value::as_str)
        .unwrap_or("widget")
        .to_owned()
}

#[async_trait]
impl Command<MemoryEngine> for InsertWidget {
    async fn run(
        &self,
        ctx: &mut Context<'_, MemoryEngine>,
        input: &Input,
        output: &mut Output,
    ) -> anyhow::Result<()> {
        ctx.extract::<Journal>()?.record(ctx);

        let table = ctx.extract::<WidgetTable>()?.0.to_owned();
        let name = widget_name(input);
        ctx.tx().insert_row(table, json!({ "name": name.as_str() }));
        output.writeln(format!("inserted {name}"));

        Ok(())
    }
}

#[async_trait]
impl Command<SqliteEngine> for InsertWidget {
    async fn run(
        &self,
        ctx: &mut Context<'_, SqliteEngine>,
        input: &Input,
        output: &mut Output,
    ) -> anyhow::Result<()> {
        ctx.extract::<Journal>()?.record(ctx);

        let table = ctx.extract::<WidgetTable>()?.0.to_owned();
        let name = widget_name(input);
        sqlx::query(&format!("INSERT INTO {table} (name) VALUES (?)"))
            .bind(&name)
            .execute(ctx.tx().connection())
            .await?;
        output.writeln(format!("inserted {name}"));

        Ok(())
    }
}

#[cfg(feature = "pg")]
#[async_trait]
impl Command<deploy_migration::PgEngine> for InsertWidget {
    async fn run(
        &self,
        ctx: &mut Context<'_, deploy_migration::PgEngine>,
        input: &Input,
        output: &mut Output,
    ) -> anyhow::Result<()> {
        ctx.extract::<Journal>()?.record(ctx);

        let table = ctx.extract::<WidgetTable>()?.0.to_owned();
        let name = widget_name(input);
        sqlx::query(&format!("INSERT INTO {table} (name) VALUES ($1)"))
            .bind(&name)
            .execute(ctx.tx().connection())
            .await?;
        output.writeln(format!("inserted {name}"));

        Ok(())
    }
}

/// Committed widgets, in insertion order.
#[async_trait]
pub trait WidgetStore {
    async fn widgets(&self, table: &str) -> Vec<String>;
}

#[async_trait]
impl WidgetStore for MemoryEngine {
    async fn widgets(&self, table: &str) -> Vec<String> {
        self.rows(table)
            .iter()
            .filter_map(|row| row["name"].as_str().map(ToOwned::to_owned))
            .collect()
    }
}

#[async_trait]
impl WidgetStore for SqliteEngine {
    async fn widgets(&self, table: &str) -> Vec<String> {
        sqlx::query_scalar::<_, String>(&format!("SELECT name FROM {table} ORDER BY rowid"))
            .fetch_all(self.pool())
            .await
            .unwrap()
    }
}

#[cfg(feature = "pg")]
#[async_trait]
impl WidgetStore for deploy_migration::PgEngine {
    async fn widgets(&self, table: &str) -> Vec<String> {
        sqlx::query_scalar::<_, String>(&format!("SELECT name FROM {table} ORDER BY id"))
            .fetch_all(self.pool())
            .await
            .unwrap()
    }
}

pub fn create_migrator<E>(engine: E, journal: &Journal, widgets: &str) -> Migrator<E>
where
    E: Engine,
    InsertWidget: Command<E>,
{
    let registry = Registry::new()
        .command("c1", Echo)
        .command("c2", Echo)
        .command("ok1", Echo)
        .command("ok3", Echo)
        .command("fail", Fail)
        .command("fails2", Fail)
        .command("mark_applied", MarkApplied)
        .command("insert_widget", InsertWidget);

    Migrator::new(engine, registry)
        .data(journal.clone())
        .data(WidgetTable(widgets.to_owned()))
}

// One connection keeps the in-memory database alive and is shared by the
// migration transaction and the failure path write, which runs after the
// rollback released it.
pub async fn create_sqlite_engine() -> SqliteEngine {
    let pool: SqlitePool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::query("CREATE TABLE widgets (name TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();

    let engine = SqliteEngine::new(&pool);
    engine.setup().await.unwrap();

    engine
}

/// Store operation a [`Flaky`] engine can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Begin,
    /// Info writes outside a transaction, i.e. the failure record.
    InsertInfo,
    /// Info writes inside a transaction, i.e. the success record.
    TxInsertInfo,
    Commit,
    Rollback,
}

/// Wraps an engine and fails the operations it is told to.
#[derive(Debug, Clone)]
pub struct Flaky<E> {
    inner: E,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

impl<E: Engine> Flaky<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    pub fn fail(self, fault: Fault) -> Self {
        self.faults.lock().insert(fault);
        self
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

fn check(faults: &Mutex<HashSet<Fault>>, fault: Fault) -> StoreResult<()> {
    if faults.lock().contains(&fault) {
        return Err(StoreError::InvalidTableName(format!("{fault:?}")));
    }

    Ok(())
}

#[async_trait]
impl<E: Engine> Engine for Flaky<E> {
    type Transaction = FlakyTransaction<E::Transaction>;

    async fn begin(&self) -> StoreResult<Self::Transaction> {
        check(&self.faults, Fault::Begin)?;

        Ok(FlakyTransaction {
            inner: self.inner.begin().await?,
            faults: self.faults.clone(),
        })
    }

    async fn insert_info(&self, info: &MigrationInfo) -> StoreResult<()> {
        check(&self.faults, Fault::InsertInfo)?;
        self.inner.insert_info(info).await
    }

    async fn read_applied(&self) -> StoreResult<Vec<AppliedMigration>> {
        self.inner.read_applied().await
    }

    async fn read_info(&self, migration: Option<&str>) -> StoreResult<Vec<MigrationInfo>> {
        self.inner.read_info(migration).await
    }
}

pub struct FlakyTransaction<T> {
    inner: T,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

#[async_trait]
impl<T: Transaction> Transaction for FlakyTransaction<T> {
    async fn is_applied(&mut self, migration: &str) -> StoreResult<bool> {
        self.inner.is_applied(migration).await
    }

    async fn insert_applied(&mut self, applied: &AppliedMigration) -> StoreResult<()> {
        self.inner.insert_applied(applied).await
    }

    async fn insert_info(&mut self, info: &MigrationInfo) -> StoreResult<()> {
        check(&self.faults, Fault::TxInsertInfo)?;
        self.inner.insert_info(info).await
    }

    // A failed commit or rollback still releases the inner transaction,
    // leaving nothing behind.
    async fn commit(self) -> StoreResult<()> {
        if check(&self.faults, Fault::Commit).is_err() {
            self.inner.rollback().await?;
            return check(&self.faults, Fault::Commit);
        }

        self.inner.commit().await
    }

    async fn rollback(self) -> StoreResult<()> {
        self.inner.rollback().await?;
        check(&self.faults, Fault::Rollback)
    }
}

pub fn create_flaky_migrator<E: Engine>(
    engine: Flaky<E>,
    journal: &Journal,
) -> Migrator<Flaky<E>> {
    let registry = Registry::new()
        .command("c1", Echo)
        .command("c2", Echo)
        .command("fail", Fail);

    Migrator::new(engine, registry).data(journal.clone())
}
