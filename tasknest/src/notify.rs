//! Transient user-facing notifications ("toasts").
//!
//! The task collection reports the outcome of every mutation through a
//! [`Notifier`]. Delivery is best-effort: a full or closed channel drops the
//! notification rather than blocking or failing the operation.

use tokio::sync::mpsc;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Warning,
    Error,
}

/// A short message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Sending half of the notification channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Notification>>,
}

impl Notifier {
    /// Creates a notifier and the receiver the UI drains.
    #[must_use]
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that discards everything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emits a notification without waiting.
    pub fn notify(&self, notification: Notification) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(notification) {
            tracing::debug!(error = %e, "notification dropped");
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::disabled()
    }
}
