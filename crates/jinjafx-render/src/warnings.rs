//! Warnings collected during a run.

use log::warn;

/// Ordered, deduplicated warning messages owned by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningLog {
    entries: Vec<String>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning. Unless `repeat` is set, a message already in the
    /// log is not added again.
    pub fn record(&mut self, message: impl Into<String>, repeat: bool) {
        let message = message.into();
        if !repeat && self.entries.contains(&message) {
            return;
        }
        warn!("{}", message);
        self.entries.push(message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<String> {
        self.entries
    }
}
