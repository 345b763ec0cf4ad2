use chrono::{DateTime, Local};

/// The most recent user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

/// Single-slot error recorder shown on the debug panel. Each record replaces the last.
#[derive(Debug, Default)]
pub struct Diagnostics {
    last: Option<LastError>,
}

impl Diagnostics {
    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{message}");
        self.last = Some(LastError {
            timestamp: Local::now(),
            message,
        });
    }

    pub fn read(&self) -> Option<&LastError> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        assert!(Diagnostics::default().read().is_none());
    }

    #[test]
    fn keeps_only_latest() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.record("first");
        let first_at = diagnostics.read().map(|e| e.timestamp);
        diagnostics.record("second");

        let last = diagnostics.read().unwrap();
        assert_eq!(last.message, "second");
        assert!(Some(last.timestamp) >= first_at);
    }
}
