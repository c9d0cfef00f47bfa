//! Applies deploy migrations: ordered bundles of named commands that must run
//! exactly once against a target system.
//!
//! Each migration runs inside one store transaction. On success an applied
//! marker and an info record holding every command's output are committed
//! with the migration's own writes. On failure the transaction is rolled
//! back, an info record carrying the partial output and the error is written
//! on its own, and the run stops.
//!
//! ```rust,ignore
//! let registry = Registry::new()
//!     .command("invoices:backfill", BackfillInvoices)
//!     .command("cache:clear", ClearCache);
//!
//! let migrator = Migrator::new(MemoryEngine::new(), registry);
//! let migrations: Vec<Box<dyn Migration>> = vec![Box::new(M0001), Box::new(M0002)];
//!
//! migrator.run(&migrations, &mut LogProgress::new()).await?;
//! ```

#![forbid(unsafe_code)]

mod command;
mod context;
mod error;
mod input;
mod migration;
mod migrator;
mod output;
mod progress;

pub use command::{Command, CommandFailure, Executor, Registry};
pub use context::{Context, Extensions};
pub use error::{CommandError, Error, Result};
pub use input::{Argument, Input};
pub use migration::{Commands, Invocation, Migration};
pub use migrator::{MigrationStatus, Migrator, Report};
pub use output::Output;
pub use progress::{LogProgress, NoProgress, Progress};

pub use deploy_migration_store::*;
