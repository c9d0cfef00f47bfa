use crate::input::Input;

/// A unit of deployment work, applied at most once.
///
/// ```rust,ignore
/// struct BackfillInvoices;
///
/// impl Migration for BackfillInvoices {
///     fn commands(&self) -> Commands {
///         Commands::new()
///             .add("invoices:backfill", Input::new().option("chunk", 500))
///             .add("cache:clear", Input::new())
///     }
/// }
/// ```
pub trait Migration: Send + Sync {
    /// Identifier recorded in the audit tables, the implementing type's
    /// fully qualified name unless overridden.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_owned()
    }

    fn commands(&self) -> Commands;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub command: String,
    pub input: Input,
}

/// Commands of a migration keyed by command name, run in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commands(Vec<Invocation>);

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding a command a second time replaces its input and keeps its
    /// original position.
    pub fn add(mut self, command: impl Into<String>, input: Input) -> Self {
        let command = command.into();

        match self.0.iter_mut().find(|i| i.command == command) {
            Some(invocation) => invocation.input = input,
            _ => self.0.push(Invocation { command, input }),
        }

        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Invocation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Commands {
    type Item = &'a Invocation;
    type IntoIter = std::slice::Iter<'a, Invocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
