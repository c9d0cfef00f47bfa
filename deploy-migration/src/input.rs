use serde::de::DeserializeOwned;
use serde_json::Value;

/// One argument handed to a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Named { name: String, value: Value },
    Positional(Value),
}

/// Ordered argument list of a command invocation.
///
/// Named arguments are looked up without their leading dashes, `--force` and
/// `force` are the same option. A flag is a named argument set to `true`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Input {
    arguments: Vec<Argument>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses command line style arguments: `--name=value`, `--flag`, `-f`,
    /// everything else is positional. Negative numbers such as `-5` are
    /// positional, `true` and `false` option values become booleans. A lone
    /// `--` ends option parsing.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut input = Self::new();
        let mut options = true;

        for arg in args {
            let arg = arg.as_ref();

            if options && arg == "--" {
                options = false;
                continue;
            }

            if !options
                || !arg.starts_with('-')
                || arg.len() == 1
                || arg.parse::<f64>().is_ok()
            {
                input = input.arg(arg);
                continue;
            }

            input = match arg.split_once('=') {
                Some((name, "true")) => input.option(name, true),
                Some((name, "false")) => input.option(name, false),
                Some((name, value)) => input.option(name, value),
                _ => input.flag(arg),
            };
        }

        input
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.arguments.push(Argument::Positional(value.into()));
        self
    }

    pub fn option(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.arguments.push(Argument::Named {
            name: normalize(name.as_ref()).to_owned(),
            value: value.into(),
        });
        self
    }

    pub fn flag(self, name: impl AsRef<str>) -> Self {
        self.option(name, true)
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn positional(&self) -> impl Iterator<Item = &Value> {
        self.arguments.iter().filter_map(|arg| match arg {
            Argument::Positional(value) => Some(value),
            _ => None,
        })
    }

    /// Positional argument at `index`, named arguments are not counted.
    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.positional().nth(index)
    }

    /// Last value given for a named argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = normalize(name);

        self.arguments.iter().rev().find_map(|arg| match arg {
            Argument::Named { name: n, value } if n == name => Some(value),
            _ => None,
        })
    }

    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> serde_json::Result<Option<T>> {
        self.get(name)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    /// True when the named argument is present and not `false` or `null`.
    pub fn has(&self, name: &str) -> bool {
        !matches!(self.get(name), None | Some(Value::Bool(false)) | Some(Value::Null))
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

fn normalize(name: &str) -> &str {
    name.trim_start_matches('-')
}
