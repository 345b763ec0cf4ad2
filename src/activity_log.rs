// Append-only log panel contents.
// - Lines come from the session (status messages) and from backend `log` frames.
// - A fetch replaces the whole panel; everything else appends.
// - Oldest lines are dropped past a fixed cap.

#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    lines: Vec<String>,
}

impl ActivityLog {
    const MAX_LINES: usize = 5_000;

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
        if self.lines.len() > Self::MAX_LINES {
            let overflow = self.lines.len() - Self::MAX_LINES;
            self.lines.drain(0..overflow);
        }
    }

    pub fn replace(&mut self, line: impl Into<String>) {
        self.lines.clear();
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}
