//! One-line status messages for the operator.
//!
//! Codec rejections, transport failures and successful actions are all
//! reported here rather than as errors: the console keeps running, and the
//! binary decides how to display the message (today: a log line).

use tokio::sync::mpsc;
use tracing::{info, warn};

/// Severity of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A single status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub severity: Severity,
    pub text: String,
}

/// Cloneable sender half of the status side channel.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: mpsc::UnboundedSender<StatusMessage>,
}

impl StatusReporter {
    /// Creates a reporter and the receiver the binary drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn info(&self, text: impl Into<String>) {
        let text = text.into();
        info!(status = %text);
        self.publish(Severity::Info, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        warn!(status = %text);
        self.publish(Severity::Error, text);
    }

    fn publish(&self, severity: Severity, text: String) {
        // The receiver is gone only during shutdown; dropping the line is fine then.
        let _ = self.tx.send(StatusMessage { severity, text });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_delivers_messages_in_order() {
        // Arrange
        let (status, mut rx) = StatusReporter::channel();

        // Act
        status.info("Cam On");
        status.error("Matrix request failed: timeout");

        // Assert
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusMessage {
                severity: Severity::Info,
                text: "Cam On".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap().severity, Severity::Error);
    }

    #[test]
    fn test_reporter_survives_dropped_receiver() {
        let (status, rx) = StatusReporter::channel();
        drop(rx);
        status.info("nobody listening");
    }
}
