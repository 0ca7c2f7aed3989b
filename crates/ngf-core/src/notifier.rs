//! Outbound notification seam and an in-memory implementation.
//!
//! The dispatcher never talks to the message bus directly. When a timer
//! fires it hands a [`Notification`] to a [`Notifier`], which is
//! responsible for addressing and delivering it. Delivery is
//! fire-and-forget: implementations must not block the caller on a network
//! round trip. The NATS daemon provides the production implementation;
//! [`RecordingNotifier`] collects notifications in memory for tests and
//! dry runs.

use std::sync::Mutex;

use ngf_types::Notification;

/// Errors that can occur while handing a notification to the transport.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The notification could not be encoded.
    #[error("failed to encode {kind} notification: {message}")]
    Encode {
        /// Notification kind (`completed` / `failed`).
        kind: &'static str,
        /// Underlying encoder message.
        message: String,
    },

    /// The transport refused or failed to send the notification.
    #[error("failed to send notification on {subject}: {message}")]
    Send {
        /// Destination subject.
        subject: String,
        /// Underlying transport message.
        message: String,
    },
}

/// Delivers notifications to their requester.
///
/// Implementations of this trait are shared between the dispatcher and
/// every pending completion timer, hence the `Send + Sync + 'static`
/// bound.
pub trait Notifier: Send + Sync + 'static {
    /// Deliver `notification` to the requester it names.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the notification could not be handed to
    /// the transport. Failures that happen after hand-off are the
    /// implementation's to log.
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// A notifier that stores every notification it is given.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub const fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Return a copy of everything delivered so far, in delivery order.
    pub fn delivered(&self) -> Vec<Notification> {
        let Ok(delivered) = self.delivered.lock() else {
            return Vec::new();
        };
        delivered.clone()
    }

    /// Number of notifications delivered so far.
    pub fn len(&self) -> usize {
        self.delivered.lock().map_or(0, |d| d.len())
    }

    /// Whether nothing has been delivered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push(notification.clone());
        }
        Ok(())
    }
}
