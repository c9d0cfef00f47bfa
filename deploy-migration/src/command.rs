use async_trait::async_trait;
use deploy_migration_store::Engine;
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    context::Context,
    error::{Error, Result},
    input::Input,
    migration::Invocation,
    output::Output,
};

/// An executable unit a migration refers to by name.
#[async_trait]
pub trait Command<E: Engine>: Send + Sync {
    async fn run(
        &self,
        ctx: &mut Context<'_, E>,
        input: &Input,
        output: &mut Output,
    ) -> anyhow::Result<()>;
}

/// Commands available to migrations, by name.
pub struct Registry<E: Engine> {
    commands: HashMap<String, Arc<dyn Command<E>>>,
}

impl<E: Engine> Registry<E> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers `command` under `name`, replacing any previous one.
    pub fn command<C: Command<E> + 'static>(mut self, name: impl Into<String>, command: C) -> Self {
        self.commands.insert(name.into(), Arc::new(command));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Command<E>>> {
        self.commands
            .get(name)
            .cloned()
            .ok_or_else(|| Error::CommandNotFound(name.to_owned()))
    }
}

impl<E: Engine> Default for Registry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> fmt::Debug for Registry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.commands.keys().collect::<Vec<_>>();
        names.sort();

        f.debug_struct("Registry").field("commands", &names).finish()
    }
}

/// A failed invocation, with whatever the command wrote before failing.
///
/// `output` is `None` when the command never ran, e.g. it is not registered.
#[derive(Debug)]
pub struct CommandFailure {
    pub output: Option<Vec<String>>,
    pub error: Error,
}

pub struct Executor<'a, E: Engine> {
    registry: &'a Registry<E>,
}

impl<'a, E: Engine> Executor<'a, E> {
    pub fn new(registry: &'a Registry<E>) -> Self {
        Self { registry }
    }

    /// Runs one invocation with a fresh [`Output`] and returns its lines.
    pub async fn execute(
        &self,
        ctx: &mut Context<'_, E>,
        invocation: &Invocation,
    ) -> std::result::Result<Vec<String>, CommandFailure> {
        let command = self
            .registry
            .resolve(&invocation.command)
            .map_err(|error| CommandFailure {
                output: None,
                error,
            })?;

        tracing::debug!(
            migration = ctx.migration(),
            command = %invocation.command,
            "running command"
        );

        let mut output = Output::new();

        match command.run(ctx, &invocation.input, &mut output).await {
            Ok(()) => Ok(output.into_lines()),
            Err(source) => Err(CommandFailure {
                output: Some(output.into_lines()),
                error: Error::Command {
                    command: invocation.command.to_owned(),
                    source,
                },
            }),
        }
    }
}
