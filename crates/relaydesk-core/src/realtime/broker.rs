//! Room-based fan-out with presence notifications.
//!
//! The broker owns room transitions (join/leave) and delivers events to every
//! live member of a room. Delivery is best-effort per recipient: a dead
//! session is skipped and never affects the other members.

use std::sync::Arc;

use chrono::Utc;
use relaydesk_types::conversation::ConversationId;
use relaydesk_types::event::ServerEvent;
use tracing::{debug, info};

use super::room::{Departure, JoinOutcome, RoomRegistry};
use super::session::{SessionHandle, SessionId};

/// Fan-out over an injected [`RoomRegistry`]. Cheap to clone.
#[derive(Clone, Debug)]
pub struct FanoutBroker {
    rooms: Arc<RoomRegistry>,
}

impl FanoutBroker {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self { rooms }
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    /// Make the broker responsible for the session's disconnect.
    ///
    /// When the session closes, it is dropped from its room and the remaining
    /// members get `user-left`. Runs exactly once per session.
    pub fn attach(&self, session: &SessionHandle) {
        let broker = self.clone();
        session.on_close(move |session| {
            broker.leave_room(session);
        });
    }

    /// Join `session` to the conversation's room.
    ///
    /// Other current members get `user-joined`; the joiner does not. If the
    /// session was in another room, that room's members get `user-left`.
    pub fn join_room(&self, session: &SessionHandle, conversation_id: ConversationId, viewer_id: &str) {
        match self.rooms.join(session, conversation_id, viewer_id) {
            JoinOutcome::AlreadyMember => {
                debug!(session_id = %session.id(), %conversation_id, "session already in room");
            }
            JoinOutcome::Joined { left } => {
                if let Some(departure) = left {
                    self.announce_departure(&departure);
                }
                info!(session_id = %session.id(), %conversation_id, viewer_id, "viewer joined room");
                self.publish_except(
                    conversation_id,
                    session.id(),
                    ServerEvent::UserJoined {
                        user_id: viewer_id.to_string(),
                        timestamp: Utc::now(),
                    },
                );
            }
        }
    }

    /// Drop `session` from its room (disconnect path) and notify the rest.
    ///
    /// Returns `false` when the session was in no room, which makes repeated
    /// calls harmless.
    pub fn leave_room(&self, session: &SessionHandle) -> bool {
        match self.rooms.drop_session(session.id()) {
            Some(departure) => {
                self.announce_departure(&departure);
                true
            }
            None => false,
        }
    }

    /// Deliver `event` to every current member of the room.
    ///
    /// Returns the number of sessions that accepted the frame.
    pub fn publish(&self, conversation_id: ConversationId, event: ServerEvent) -> usize {
        self.deliver(conversation_id, None, event)
    }

    /// Deliver `event` to every current member except `sender`.
    pub fn publish_except(
        &self,
        conversation_id: ConversationId,
        sender: SessionId,
        event: ServerEvent,
    ) -> usize {
        self.deliver(conversation_id, Some(sender), event)
    }

    /// Ephemeral typing indicator to the room minus the typist. Not persisted.
    pub fn typing(
        &self,
        session: &SessionHandle,
        conversation_id: ConversationId,
        viewer_id: &str,
        is_typing: bool,
    ) -> usize {
        self.publish_except(
            conversation_id,
            session.id(),
            ServerEvent::UserTyping {
                user_id: viewer_id.to_string(),
                is_typing,
            },
        )
    }

    fn announce_departure(&self, departure: &Departure) {
        info!(
            session_id = %departure.session_id,
            conversation_id = %departure.conversation_id,
            viewer_id = %departure.viewer_id,
            "viewer left room"
        );
        self.publish(
            departure.conversation_id,
            ServerEvent::UserLeft {
                user_id: departure.viewer_id.clone(),
            },
        );
    }

    fn deliver(
        &self,
        conversation_id: ConversationId,
        skip: Option<SessionId>,
        event: ServerEvent,
    ) -> usize {
        let members = self.rooms.members_of(conversation_id);
        let mut delivered = 0;
        for member in members.iter().filter(|m| Some(m.session.id()) != skip) {
            if member.session.send(event.clone()) {
                delivered += 1;
            }
        }
        debug!(%conversation_id, event = event.name(), recipients = members.len(), delivered, "published");
        delivered
    }
}
