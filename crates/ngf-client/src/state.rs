//! Client-side bookkeeping for events in flight.
//!
//! A `Play` goes through two phases on the client. Until the service
//! replies, only a client-local [`ClientEventId`] exists and the play sits
//! in the pending table. Once an accepted reply carries the server
//! [`EventId`], the event moves to the active table until a terminal
//! notification arrives or the caller stops it.
//!
//! The reply and the notification travel on different subjects, so a fast
//! completion can overtake the reply. Terminal notifications for server ids
//! not yet known are held while any play is still awaiting its reply, and
//! the reply that names that id picks them up.
//!
//! [`ClientState`] performs no I/O. It tells the caller what to do next
//! (send a `Stop`, report an event) and the transport does it.

use std::collections::BTreeMap;
use std::fmt;

use ngf_types::{EventId, Notification, PlayReply};

/// Client-local event identifier, handed out by [`ClientState::begin_play`].
///
/// Unrelated to the server's [`EventId`]; it exists before the server has
/// answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientEventId(pub u32);

impl fmt::Display for ClientEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome reported to the client callback channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEventState {
    /// The event ran to completion.
    Completed,
    /// The play was refused, could not be sent, or the service reported a
    /// failure.
    Failed,
}

/// A state change of one client event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientEvent {
    /// Which play this concerns.
    pub id: ClientEventId,
    /// What happened to it.
    pub state: ClientEventState,
}

/// What the transport must do after a play reply was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyAction {
    /// Nothing; the event is now active.
    None,
    /// The caller stopped the play before the reply arrived. Send `Stop`
    /// for this server id and report nothing.
    SendStop(EventId),
    /// Report this event to the caller.
    Report(ClientEvent),
}

/// What the transport must do after a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAction {
    /// Send `Stop` for this server id now.
    SendStop(EventId),
    /// The reply is still outstanding; the stop is sent when it arrives.
    Deferred,
    /// The id is not known (never issued, finished or already stopped).
    Ignored,
}

#[derive(Debug, Clone, Copy, Default)]
struct PendingPlay {
    stop_requested: bool,
}

/// Pending and active events of one client connection.
#[derive(Debug, Default)]
pub struct ClientState {
    last_id: u32,
    pending: BTreeMap<ClientEventId, PendingPlay>,
    active: BTreeMap<EventId, ClientEventId>,
    early: BTreeMap<EventId, ClientEventState>,
}

impl ClientState {
    /// Empty state.
    pub const fn new() -> Self {
        Self {
            last_id: 0,
            pending: BTreeMap::new(),
            active: BTreeMap::new(),
            early: BTreeMap::new(),
        }
    }

    /// Register a new play and return its client-local id.
    ///
    /// Ids start at 1. After `u32::MAX` the counter wraps back to 1, skipping
    /// ids still pending or active.
    pub fn begin_play(&mut self) -> ClientEventId {
        loop {
            self.last_id = self.last_id.checked_add(1).unwrap_or(1);
            let id = ClientEventId(self.last_id);
            if !self.is_in_use(id) {
                self.pending.insert(id, PendingPlay::default());
                return id;
            }
        }
    }

    fn is_in_use(&self, id: ClientEventId) -> bool {
        self.pending.contains_key(&id) || self.active.values().any(|active| *active == id)
    }

    /// Remove a pending play. Held notifications are dropped once no play
    /// is left to claim them.
    fn take_pending(&mut self, id: ClientEventId) -> Option<PendingPlay> {
        let pending = self.pending.remove(&id);
        if self.pending.is_empty() {
            self.early.clear();
        }
        pending
    }

    /// Apply the service's reply to a pending play.
    ///
    /// A rejected reply or an accepted reply carrying id `0` fails the
    /// event. Replies for unknown client ids are dropped. If the event's
    /// terminal notification already arrived, it is reported now, unless
    /// the caller stopped the play in the meantime.
    pub fn on_reply(&mut self, id: ClientEventId, reply: &PlayReply) -> ReplyAction {
        let server_id = reply.id();
        let early = self.early.remove(&server_id);
        let Some(pending) = self.take_pending(id) else {
            return ReplyAction::None;
        };

        if !server_id.is_some() {
            return ReplyAction::Report(ClientEvent {
                id,
                state: ClientEventState::Failed,
            });
        }

        if let Some(state) = early {
            if pending.stop_requested {
                return ReplyAction::None;
            }
            return ReplyAction::Report(ClientEvent { id, state });
        }

        if pending.stop_requested {
            return ReplyAction::SendStop(server_id);
        }

        self.active.insert(server_id, id);
        ReplyAction::None
    }

    /// The play request could not be sent or no reply came back.
    pub fn on_send_failure(&mut self, id: ClientEventId) -> Option<ClientEvent> {
        self.take_pending(id).map(|_| ClientEvent {
            id,
            state: ClientEventState::Failed,
        })
    }

    /// Request that an event be stopped.
    ///
    /// An active event leaves the active table at once; the service sends
    /// nothing for a stopped event, so a late notification for it is
    /// ignored.
    pub fn request_stop(&mut self, id: ClientEventId) -> StopAction {
        if let Some(pending) = self.pending.get_mut(&id) {
            pending.stop_requested = true;
            return StopAction::Deferred;
        }

        let server_id = self
            .active
            .iter()
            .find_map(|(server_id, client_id)| (*client_id == id).then_some(*server_id));
        match server_id {
            Some(server_id) => {
                self.active.remove(&server_id);
                StopAction::SendStop(server_id)
            }
            None => StopAction::Ignored,
        }
    }

    /// Apply a notification from the service.
    ///
    /// Returns the event to report, or `None` if the server id is not
    /// active. While plays await their reply, a notification for an
    /// unknown id is held for [`ClientState::on_reply`].
    pub fn on_notification(&mut self, notification: &Notification) -> Option<ClientEvent> {
        let server_id = notification.id();
        let state = match notification {
            Notification::Completed { .. } => ClientEventState::Completed,
            Notification::Failed { .. } => ClientEventState::Failed,
        };
        match self.active.remove(&server_id) {
            Some(id) => Some(ClientEvent { id, state }),
            None => {
                if !self.pending.is_empty() && server_id.is_some() {
                    self.early.entry(server_id).or_insert(state);
                }
                None
            }
        }
    }

    /// Forget everything and return the server ids that still need a
    /// `Stop`. Plays awaiting a reply are marked so their reply triggers a
    /// stop.
    pub fn close(&mut self) -> Vec<EventId> {
        for pending in self.pending.values_mut() {
            pending.stop_requested = true;
        }
        std::mem::take(&mut self.active).into_keys().collect()
    }

    /// Number of plays still waiting for a reply.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of events the service is running for us.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Number of notifications held until their reply arrives.
    pub fn held_len(&self) -> usize {
        self.early.len()
    }
}
