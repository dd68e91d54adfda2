//! Leveled log sink injected into the connector, copier and command runner.

use std::sync::Mutex;

/// Receiver for engine log messages.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Forwards to the process-wide logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Debug,
}

/// Keeps every message in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Whether any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|(_, m)| m.contains(needle))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Level, String)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, level: Level, message: &str) {
        self.lock().push((level, message.to_string()));
    }
}

impl LogSink for MemorySink {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_levels_in_order() {
        let sink = MemorySink::new();
        sink.info("first");
        sink.debug("second");
        assert_eq!(
            sink.entries(),
            vec![
                (Level::Info, "first".to_string()),
                (Level::Debug, "second".to_string())
            ]
        );
        assert!(sink.contains("sec"));
        assert!(!sink.contains("third"));
    }

    #[test]
    fn tracing_sink_accepts_messages_without_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
        TracingSink.info("info line");
        TracingSink.debug("debug line");
    }
}
