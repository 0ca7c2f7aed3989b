//! The feedback service: bus requests in, dispatcher calls out.
//!
//! [`RequestHandler`] turns raw request payloads into dispatcher calls and
//! replies without touching the network, so it can be tested with a
//! [`RecordingNotifier`](ngf_core::notifier::RecordingNotifier).
//! [`FeedbackService`] owns the subscriptions and drives the handler until
//! shutdown.

use std::future::Future;

use futures::StreamExt;
use ngf_core::config::NotifyMode;
use ngf_core::dispatcher::EventDispatcher;
use ngf_core::notifier::Notifier;
use ngf_types::messages::{self, OwnerInfo};
use ngf_types::{PlayReply, PlayRequest, StopRequest, Subjects};
use tracing::{debug, info, warn};

use crate::error::DaemonError;
use crate::nats::NatsClient;

/// Decodes requests and applies them to the dispatcher.
pub struct RequestHandler<N> {
    dispatcher: EventDispatcher<N>,
    notify_mode: NotifyMode,
}

impl<N: Notifier> RequestHandler<N> {
    /// Create a handler over `dispatcher`.
    pub const fn new(dispatcher: EventDispatcher<N>, notify_mode: NotifyMode) -> Self {
        Self {
            dispatcher,
            notify_mode,
        }
    }

    /// The dispatcher requests are applied to.
    pub const fn dispatcher(&self) -> &EventDispatcher<N> {
        &self.dispatcher
    }

    /// Handle a `Play` payload and build its reply.
    ///
    /// Malformed payloads are rejected. In directed mode a requester id that
    /// cannot be used as a subject token is rejected too, since its
    /// completion could never be delivered.
    pub fn handle_play(&self, payload: &[u8]) -> PlayReply {
        let request: PlayRequest = match messages::decode(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "malformed play request");
                return PlayReply::Rejected {
                    reason: format!("malformed play request: {e}"),
                };
            }
        };

        if self.notify_mode == NotifyMode::Directed && !request.requester.is_subject_safe() {
            warn!(requester = %request.requester, "requester id is not routable");
            return PlayReply::Rejected {
                reason: format!("requester id {:?} is not routable", request.requester.as_str()),
            };
        }

        match self
            .dispatcher
            .play(&request.event, &request.properties, request.requester)
        {
            Ok(id) => PlayReply::Accepted { id },
            Err(e) => {
                warn!(event = %request.event, error = %e, "play failed");
                PlayReply::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Handle a `Stop` payload. Returns whether a pending event was
    /// cancelled; malformed payloads are logged and ignored.
    pub fn handle_stop(&self, payload: &[u8]) -> bool {
        match messages::decode::<StopRequest>(payload) {
            Ok(request) => self.dispatcher.stop(request.id, &request.requester),
            Err(e) => {
                warn!(error = %e, "malformed stop request, ignoring");
                false
            }
        }
    }
}

/// Owns the bus subscriptions and serves requests until shutdown.
pub struct FeedbackService<N> {
    nats: NatsClient,
    subjects: Subjects,
    owner: OwnerInfo,
    handler: RequestHandler<N>,
}

impl<N: Notifier> FeedbackService<N> {
    /// Assemble a service from its parts. `owner` is the result of a
    /// successful name claim.
    pub const fn new(
        nats: NatsClient,
        subjects: Subjects,
        owner: OwnerInfo,
        handler: RequestHandler<N>,
    ) -> Self {
        Self {
            nats,
            subjects,
            owner,
            handler,
        }
    }

    /// Serve requests until `shutdown` resolves or a subscription ends.
    ///
    /// On exit every pending event is dropped without notification.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Nats`] if a subscription cannot be created.
    pub async fn run<F>(self, shutdown: F) -> Result<(), DaemonError>
    where
        F: Future<Output = ()>,
    {
        let mut play = self.nats.subscribe(&self.subjects.play()).await?;
        let mut stop = self.nats.subscribe(&self.subjects.stop()).await?;
        let mut owner = self.nats.subscribe(&self.subjects.owner()).await?;
        let owner_payload = messages::encode(&self.owner)
            .map_err(|e| DaemonError::Nats(format!("failed to encode owner info: {e}")))?;

        info!(
            service = self.owner.service_name,
            prefix = self.subjects.prefix(),
            "feedback service ready"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                message = play.next() => {
                    let Some(message) = message else {
                        warn!("play subscription ended");
                        break;
                    };
                    let reply = self.handler.handle_play(&message.payload);
                    match (message.reply, messages::encode(&reply)) {
                        (Some(inbox), Ok(payload)) => {
                            if let Err(e) = self.nats.publish(inbox.to_string(), payload).await {
                                warn!(error = %e, "failed to send play reply");
                            }
                        }
                        (None, _) => {
                            debug!(id = %reply.id(), "play request without reply subject");
                        }
                        (Some(_), Err(e)) => {
                            warn!(error = %e, "failed to encode play reply");
                        }
                    }
                }
                message = stop.next() => {
                    let Some(message) = message else {
                        warn!("stop subscription ended");
                        break;
                    };
                    self.handler.handle_stop(&message.payload);
                    if let Some(inbox) = message.reply {
                        // Stop has no result; an empty reply only acknowledges receipt.
                        if let Err(e) = self.nats.publish(inbox.to_string(), Vec::new()).await {
                            warn!(error = %e, "failed to acknowledge stop");
                        }
                    }
                }
                message = owner.next() => {
                    let Some(message) = message else {
                        warn!("owner subscription ended");
                        break;
                    };
                    if let Some(inbox) = message.reply {
                        debug!("answering ownership probe");
                        if let Err(e) = self.nats.publish(inbox.to_string(), owner_payload.clone()).await {
                            warn!(error = %e, "failed to answer ownership probe");
                        }
                    }
                }
            }
        }

        let dropped = self.handler.dispatcher().cancel_all();
        if let Err(e) = self.nats.flush().await {
            warn!(error = %e, "flush on shutdown failed");
        }
        let stats = self.handler.dispatcher().stats();
        info!(
            dropped = dropped,
            played = stats.played,
            completed = stats.completed,
            stopped = stats.stopped,
            "feedback service stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use ngf_core::dispatcher::DispatcherConfig;
    use ngf_core::notifier::RecordingNotifier;
    use ngf_types::{EventId, PropertyList, RequesterId};

    use super::*;

    fn handler(mode: NotifyMode) -> RequestHandler<RecordingNotifier> {
        let dispatcher = EventDispatcher::new(
            DispatcherConfig {
                completion_delay: Duration::from_secs(2),
            },
            RecordingNotifier::new(),
        );
        RequestHandler::new(dispatcher, mode)
    }

    fn play_payload(requester: &str, event: &str) -> Vec<u8> {
        messages::encode(&PlayRequest {
            requester: RequesterId::new(requester),
            event: event.to_owned(),
            properties: PropertyList::default(),
        })
        .unwrap()
    }

    fn stop_payload(requester: &str, id: EventId) -> Vec<u8> {
        messages::encode(&StopRequest {
            requester: RequesterId::new(requester),
            id,
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn play_is_accepted_and_completes() {
        let handler = handler(NotifyMode::Directed);
        let recorder = handler.dispatcher().notifier();

        let reply = handler.handle_play(&play_payload("client-a", "event.click"));
        let PlayReply::Accepted { id } = reply else {
            panic!("expected accepted reply, got {reply:?}");
        };
        assert_eq!(id, EventId(1));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        let delivered = recorder.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered.first().unwrap().id(), id);
        assert_eq!(delivered.first().unwrap().requester().as_str(), "client-a");
    }

    #[tokio::test(start_paused = true)]
    async fn play_without_properties_field_is_accepted() {
        let handler = handler(NotifyMode::Directed);
        let payload = br#"{"requester":"client-a","event":"event.ring"}"#;
        assert!(matches!(
            handler.handle_play(payload),
            PlayReply::Accepted { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_play_is_rejected() {
        let handler = handler(NotifyMode::Directed);
        let reply = handler.handle_play(b"not json");
        assert!(matches!(reply, PlayReply::Rejected { .. }));
        assert_eq!(reply.id(), EventId::NONE);
        assert_eq!(handler.dispatcher().pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unroutable_requester_rejected_only_in_directed_mode() {
        let directed = handler(NotifyMode::Directed);
        assert!(matches!(
            directed.handle_play(&play_payload("bad.id", "event.click")),
            PlayReply::Rejected { .. }
        ));

        let broadcast = handler(NotifyMode::Broadcast);
        assert!(matches!(
            broadcast.handle_play(&play_payload("bad.id", "event.click")),
            PlayReply::Accepted { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_completion_suppresses_notification() {
        let handler = handler(NotifyMode::Directed);
        let recorder = handler.dispatcher().notifier();
        let id = handler
            .handle_play(&play_payload("client-a", "event.click"))
            .id();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handler.handle_stop(&stop_payload("client-a", id)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(recorder.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_for_unknown_or_malformed_is_ignored() {
        let handler = handler(NotifyMode::Directed);
        let recorder = handler.dispatcher().notifier();
        assert!(!handler.handle_stop(&stop_payload("client-a", EventId(42))));
        assert!(!handler.handle_stop(b"{}"));
        assert!(recorder.is_empty());
    }
}
