/// Lines written by a single command execution, kept verbatim and in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    lines: Vec<String>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writeln(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<S: Into<String>> Extend<S> for Output {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        self.lines.extend(iter.into_iter().map(Into::into));
    }
}
