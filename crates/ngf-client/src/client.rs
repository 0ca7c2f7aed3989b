//! NATS transport for the feedback client.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use ngf_types::messages;
use ngf_types::{
    EventId, Notification, PlayReply, PlayRequest, PropertyList, RequesterId, StopRequest,
    Subjects,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::state::{ClientEvent, ClientEventId, ClientState, ReplyAction, StopAction};

struct Inner {
    nats: async_nats::Client,
    subjects: Subjects,
    requester: RequesterId,
    state: Mutex<ClientState>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, event: ClientEvent) {
        debug!(client_event_id = %event.id, state = ?event.state, "client event");
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    async fn send_stop(&self, id: EventId) -> Result<(), ClientError> {
        let payload = messages::encode(&StopRequest {
            requester: self.requester.clone(),
            id,
        })?;
        let subject = self.subjects.stop();
        self.nats
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| ClientError::Nats(format!("failed to publish to {subject}: {e}")))
    }

    async fn complete_play(&self, id: ClientEventId, payload: Vec<u8>) {
        let subject = self.subjects.play();
        let reply = match self.nats.request(subject.clone(), payload.into()).await {
            Ok(message) => messages::decode::<PlayReply>(&message.payload),
            Err(e) => {
                warn!(client_event_id = %id, subject = subject, error = %e, "play request failed");
                let failed = self.lock().on_send_failure(id);
                if let Some(event) = failed {
                    self.report(event);
                }
                return;
            }
        };

        let reply = reply.unwrap_or_else(|e| PlayReply::Rejected {
            reason: format!("malformed play reply: {e}"),
        });
        if let PlayReply::Rejected { reason } = &reply {
            warn!(client_event_id = %id, reason = %reason, "play rejected");
        }

        let action = self.lock().on_reply(id, &reply);
        match action {
            ReplyAction::None => {
                debug!(client_event_id = %id, event_id = %reply.id(), "play accepted");
            }
            ReplyAction::SendStop(server_id) => {
                if let Err(e) = self.send_stop(server_id).await {
                    warn!(event_id = %server_id, error = %e, "deferred stop failed");
                }
            }
            ReplyAction::Report(event) => self.report(event),
        }
    }

    fn on_notification(&self, payload: &[u8]) {
        let notification: Notification = match messages::decode(payload) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "malformed notification, skipping");
                return;
            }
        };
        if notification.requester() != &self.requester {
            return;
        }
        let event = self.lock().on_notification(&notification);
        match event {
            Some(event) => self.report(event),
            None => debug!(event_id = %notification.id(), "notification for unknown event ignored"),
        }
    }
}

/// Client handle for the feedback service.
///
/// Dropping the handle stops notification processing but does not stop
/// active events; call [`FeedbackClient::close`] for that.
pub struct FeedbackClient {
    inner: Arc<Inner>,
    listener: JoinHandle<()>,
}

impl FeedbackClient {
    /// Connect to the service reachable through `url` under subject
    /// `prefix`.
    ///
    /// Returns the client and the channel on which event state changes are
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Nats`] if the connection or the notification
    /// subscriptions fail.
    pub async fn connect(
        url: &str,
        prefix: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientEvent>), ClientError> {
        let nats = async_nats::connect(url)
            .await
            .map_err(|e| ClientError::Nats(format!("failed to connect to {url}: {e}")))?;
        let subjects = Subjects::new(prefix);
        let requester = RequesterId::generate();

        // Directed and broadcast notifications; the service uses one of them.
        let directed = nats
            .subscribe(subjects.notify(&requester))
            .await
            .map_err(|e| ClientError::Nats(format!("failed to subscribe: {e}")))?;
        let broadcast = nats
            .subscribe(subjects.signal())
            .await
            .map_err(|e| ClientError::Nats(format!("failed to subscribe: {e}")))?;

        let (events, receiver) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            nats,
            subjects,
            requester,
            state: Mutex::new(ClientState::new()),
            events,
        });

        let listener_inner = Arc::clone(&inner);
        let listener = tokio::spawn(async move {
            let mut notifications = futures::stream::select(directed, broadcast);
            while let Some(message) = notifications.next().await {
                listener_inner.on_notification(&message.payload);
            }
            debug!("notification subscriptions ended");
        });

        info!(requester = %inner.requester, prefix = prefix, "feedback client connected");
        Ok((Self { inner, listener }, receiver))
    }

    /// Requester id this client sends with every request.
    pub fn requester(&self) -> &RequesterId {
        &self.inner.requester
    }

    /// Start `event` and return its client-local id at once.
    ///
    /// The request is sent in the background. If it fails or is refused, a
    /// [`ClientEventState::Failed`](crate::ClientEventState::Failed) event is
    /// reported for the returned id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serde`] if the request cannot be encoded.
    pub fn play(&self, event: &str, properties: PropertyList) -> Result<ClientEventId, ClientError> {
        let payload = messages::encode(&PlayRequest {
            requester: self.inner.requester.clone(),
            event: event.to_owned(),
            properties,
        })?;
        let id = self.inner.lock().begin_play();
        debug!(client_event_id = %id, event = event, "play");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.complete_play(id, payload).await });
        Ok(id)
    }

    /// Stop an event started with [`FeedbackClient::play`].
    ///
    /// If the service has not replied yet, the stop is sent as soon as it
    /// does and no event is reported for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the `Stop` request cannot be sent.
    pub async fn stop(&self, id: ClientEventId) -> Result<(), ClientError> {
        let action = self.inner.lock().request_stop(id);
        match action {
            StopAction::SendStop(server_id) => self.inner.send_stop(server_id).await,
            StopAction::Deferred => {
                debug!(client_event_id = %id, "stop deferred until reply");
                Ok(())
            }
            StopAction::Ignored => {
                debug!(client_event_id = %id, "stop for unknown event ignored");
                Ok(())
            }
        }
    }

    /// Stop every active event and shut the client down.
    ///
    /// # Errors
    ///
    /// Returns the first error met while sending `Stop` requests; the
    /// remaining stops are still attempted.
    pub async fn close(self) -> Result<(), ClientError> {
        let active = self.inner.lock().close();
        let mut first_error = None;
        for id in active {
            if let Err(e) = self.inner.send_stop(id).await {
                warn!(event_id = %id, error = %e, "stop on close failed");
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.inner.nats.flush().await {
            warn!(error = %e, "flush on close failed");
        }
        self.listener.abort();
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for FeedbackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackClient")
            .field("requester", &self.inner.requester)
            .field("prefix", &self.inner.subjects.prefix())
            .finish_non_exhaustive()
    }
}
