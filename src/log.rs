//! # Logging Collaborator
//!
//! Narrow interface to the injected logging sink.
//!
//! Sessions and the session manager report through a [`LogSink`] rather than
//! calling a logging framework directly, so embedders can route session
//! events wherever they need. The default sink forwards to `tracing`.

use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Severity accepted by the logging collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Message,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Message => write!(f, "message"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Destination for session lifecycle and error reports. Must not panic.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, severity: Severity, message: &str);
}

/// Shared handle to a logging sink.
pub type SharedLogSink = Arc<dyn LogSink>;

/// Default sink forwarding to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Message => info!("{message}"),
            Severity::Warning => warn!("{message}"),
            Severity::Error => error!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Test sink capturing everything it is given.
    #[derive(Default)]
    pub struct CapturingSink {
        pub entries: Mutex<Vec<(Severity, String)>>,
    }

    impl LogSink for CapturingSink {
        fn log(&self, severity: Severity, message: &str) {
            self.entries
                .lock()
                .expect("sink lock")
                .push((severity, message.to_string()));
        }
    }

    #[test]
    fn sink_receives_severity_and_message() {
        let sink = CapturingSink::default();
        sink.log(Severity::Warning, "cmd 0x2A unhandled");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, Severity::Warning);
        assert!(entries[0].1.contains("0x2A"));
    }

    #[test]
    fn severity_display() {
        assert_eq!(Severity::Message.to_string(), "message");
        assert_eq!(Severity::Error.to_string(), "error");
    }
}
