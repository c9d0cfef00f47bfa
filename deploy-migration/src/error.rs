use std::{fmt::Write, panic::Location};

use deploy_migration_store::{ErrorDetail, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("command `{0}` is not registered")]
    CommandNotFound(String),

    #[error("command `{command}` failed: {source}")]
    Command {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error(
        "error during `{migration}` migration, `{}` command: {source}",
        .command.as_deref().unwrap_or("no")
    )]
    Execution {
        migration: String,
        command: Option<String>,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error a command can return to attach a numeric code. The location of the
/// call creating it ends up in the audit record.
///
/// ```rust,ignore
/// return Err(CommandError::new("payment gateway unreachable").code(503).into());
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
    code: i64,
    location: &'static Location<'static>,
}

impl CommandError {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 0,
            location: Location::caller(),
        }
    }

    pub fn code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn get_code(&self) -> i64 {
        self.code
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl Error {
    /// Audit details of this error, attributed to `command`.
    pub fn detail(&self, command: Option<&str>) -> ErrorDetail {
        let mut detail = ErrorDetail {
            trace: self.trace(),
            message: self.to_string(),
            error_command: command.map(ToOwned::to_owned),
            ..ErrorDetail::default()
        };

        let command_error = match self.root() {
            Error::Command { source, .. } => source
                .chain()
                .find_map(|e| e.downcast_ref::<CommandError>()),
            _ => None,
        };

        if let Some(e) = command_error {
            detail.code = e.code;
            detail.file = Some(e.location.file().to_owned());
            detail.line = Some(e.location.line());
        }

        detail
    }

    /// Message, causes and backtrace when one was captured.
    pub fn trace(&self) -> String {
        if let Error::Command { command, source } = self.root() {
            return format!("command `{command}` failed: {source:?}");
        }

        let mut trace = self.to_string();
        let mut source = std::error::Error::source(self);

        if source.is_some() {
            trace.push_str("\n\nCaused by:");
        }

        while let Some(cause) = source {
            let _ = write!(trace, "\n    {cause}");
            source = cause.source();
        }

        trace
    }

    fn root(&self) -> &Error {
        match self {
            Error::Execution { source, .. } => source.root(),
            _ => self,
        }
    }
}
