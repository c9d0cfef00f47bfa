/// Receives completion ticks and status text while migrations run. Usually
/// backed by the caller's terminal UI.
pub trait Progress {
    /// One migration was applied.
    fn advance(&mut self);

    fn writeln(&mut self, line: &str);
}

impl<P: Progress + ?Sized> Progress for &mut P {
    fn advance(&mut self) {
        (**self).advance()
    }

    fn writeln(&mut self, line: &str) {
        (**self).writeln(line)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn advance(&mut self) {}

    fn writeln(&mut self, _line: &str) {}
}

/// Forwards status text to `tracing`, for runs without a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress {
    applied: usize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> usize {
        self.applied
    }
}

impl Progress for LogProgress {
    fn advance(&mut self) {
        self.applied += 1;
        tracing::info!(applied = self.applied, "migration progress");
    }

    fn writeln(&mut self, line: &str) {
        if !line.is_empty() {
            tracing::info!("{line}");
        }
    }
}
