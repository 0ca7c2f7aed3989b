//! NATS integration: connection, name claim and notification delivery.
//!
//! The daemon listens on `{prefix}.play` and `{prefix}.stop` and answers
//! ownership probes on `{prefix}.owner`. Notifications go out either on
//! `{prefix}.notify.{requester}` (directed) or on `{prefix}.signal`
//! (broadcast), depending on [`NotifyMode`].

use std::time::Duration;

use async_nats::client::RequestErrorKind;
use chrono::Utc;
use ngf_core::config::NotifyMode;
use ngf_core::notifier::{Notifier, NotifyError};
use ngf_types::messages::{self, OwnerInfo};
use ngf_types::{Notification, Subjects};
use serde_json::Error as SerdeError;
use tracing::{debug, info, warn};

use crate::error::DaemonError;

/// NATS client wrapper for the daemon.
pub struct NatsClient {
    client: async_nats::Client,
}

impl NatsClient {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Nats`] if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, DaemonError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| DaemonError::Nats(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// A clone of the underlying client, for components that publish on
    /// their own.
    pub fn client(&self) -> async_nats::Client {
        self.client.clone()
    }

    /// Claim the well-known service name.
    ///
    /// Sends an ownership probe on the owner subject. If another instance
    /// answers within `probe_timeout`, the name is taken. No responders or
    /// silence means the name is free; the caller must then answer probes
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::NameAcquisition`] if another instance holds
    /// the name or the probe could not be sent.
    pub async fn claim_name(
        &self,
        subjects: &Subjects,
        name: &str,
        probe_timeout: Duration,
    ) -> Result<OwnerInfo, DaemonError> {
        let subject = subjects.owner();
        debug!(subject = subject, name = name, "probing for existing owner");

        let probe = self.client.request(subject.clone(), Vec::new().into());
        match tokio::time::timeout(probe_timeout, probe).await {
            Ok(Ok(reply)) => {
                let holder = messages::decode::<OwnerInfo>(&reply.payload).map_or_else(
                    |_err| "an unidentified instance".to_owned(),
                    |owner| format!("an instance that claimed it at {}", owner.claimed_at),
                );
                return Err(DaemonError::NameAcquisition {
                    name: name.to_owned(),
                    reason: format!("already owned by {holder}"),
                });
            }
            Ok(Err(e))
                if matches!(
                    e.kind(),
                    RequestErrorKind::NoResponders | RequestErrorKind::TimedOut
                ) =>
            {
                debug!(subject = subject, "no current owner");
            }
            Ok(Err(e)) => {
                return Err(DaemonError::NameAcquisition {
                    name: name.to_owned(),
                    reason: format!("ownership probe on {subject} failed: {e}"),
                });
            }
            Err(_elapsed) => {
                debug!(subject = subject, "ownership probe timed out, name is free");
            }
        }

        info!(name = name, "service name acquired");
        Ok(OwnerInfo {
            service_name: name.to_owned(),
            claimed_at: Utc::now(),
        })
    }

    /// Subscribe to `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Nats`] if the subscription fails.
    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, DaemonError> {
        let subscriber = self
            .client
            .subscribe(subject.to_owned())
            .await
            .map_err(|e| DaemonError::Nats(format!("failed to subscribe to {subject}: {e}")))?;
        info!(subject = subject, "subscribed");
        Ok(subscriber)
    }

    /// Publish a raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Nats`] if publishing fails.
    pub async fn publish(&self, subject: String, payload: Vec<u8>) -> Result<(), DaemonError> {
        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| DaemonError::Nats(format!("failed to publish to {subject}: {e}")))
    }

    /// Flush all pending messages to the NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Nats`] if the flush operation fails.
    pub async fn flush(&self) -> Result<(), DaemonError> {
        self.client
            .flush()
            .await
            .map_err(|e| DaemonError::Nats(format!("flush failed: {e}")))
    }
}

impl std::fmt::Debug for NatsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsClient")
            .field("connected", &true)
            .finish()
    }
}

/// Subject a notification is published on for the given mode.
pub fn notification_subject(
    subjects: &Subjects,
    mode: NotifyMode,
    notification: &Notification,
) -> String {
    match mode {
        NotifyMode::Directed => subjects.notify(notification.requester()),
        NotifyMode::Broadcast => subjects.signal(),
    }
}

/// [`Notifier`] that publishes notifications on NATS.
///
/// Publishing is fire-and-forget: the payload is encoded synchronously and
/// the publish runs on a spawned task that logs failures. Must be used from
/// within a tokio runtime.
pub struct NatsNotifier {
    client: async_nats::Client,
    subjects: Subjects,
    mode: NotifyMode,
}

impl NatsNotifier {
    /// Create a notifier publishing through `client`.
    pub const fn new(client: async_nats::Client, subjects: Subjects, mode: NotifyMode) -> Self {
        Self {
            client,
            subjects,
            mode,
        }
    }
}

impl Notifier for NatsNotifier {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let subject = notification_subject(&self.subjects, self.mode, notification);
        let payload = messages::encode(notification).map_err(|e: SerdeError| {
            NotifyError::Encode {
                kind: notification.kind(),
                message: e.to_string(),
            }
        })?;

        debug!(
            subject = subject,
            event_id = %notification.id(),
            kind = notification.kind(),
            "publishing notification"
        );
        let client = self.client.clone();
        let event_id = notification.id();
        tokio::spawn(async move {
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(
                    subject = subject,
                    event_id = %event_id,
                    error = %e,
                    "failed to publish notification"
                );
            }
        });
        Ok(())
    }
}

impl std::fmt::Debug for NatsNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsNotifier")
            .field("prefix", &self.subjects.prefix())
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ngf_types::{EventId, RequesterId};

    use super::*;

    fn completed(requester: &str) -> Notification {
        Notification::Completed {
            id: EventId(1),
            requester: RequesterId::new(requester),
            event: "event.test".to_owned(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn directed_notifications_go_to_requester_subject() {
        let subjects = Subjects::default();
        let subject = notification_subject(&subjects, NotifyMode::Directed, &completed("c1"));
        assert_eq!(subject, "ngf.notify.c1");
    }

    #[test]
    fn broadcast_notifications_share_one_subject() {
        let subjects = Subjects::new("fb");
        assert_eq!(
            notification_subject(&subjects, NotifyMode::Broadcast, &completed("c1")),
            "fb.signal"
        );
        assert_eq!(
            notification_subject(&subjects, NotifyMode::Broadcast, &completed("c2")),
            "fb.signal"
        );
    }

    // Integration tests that require a live NATS server are marked #[ignore].
    #[tokio::test]
    #[ignore]
    async fn connect_and_claim_free_name() {
        let Ok(client) = NatsClient::connect("nats://localhost:4222").await else {
            return;
        };
        let subjects = Subjects::new("ngf-test-claim");
        let owner = client
            .claim_name(&subjects, "org.example.Test", Duration::from_millis(200))
            .await;
        assert!(owner.is_ok());
    }
}
