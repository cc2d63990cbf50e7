//! Room membership bookkeeping.
//!
//! Maps each conversation to the sessions currently viewing it. A session is
//! in at most one room at a time: joining a room implicitly leaves the
//! previous one. Purely in memory; rebuilt from zero on restart.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use relaydesk_types::conversation::ConversationId;

use super::session::{SessionHandle, SessionId};

/// A session's membership in a room.
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub session: SessionHandle,
    /// Identity the viewer announced when joining.
    pub viewer_id: String,
}

/// A membership that ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub conversation_id: ConversationId,
    pub session_id: SessionId,
    pub viewer_id: String,
}

/// Result of [`RoomRegistry::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The session was already a member of the target room. Nothing changed.
    AlreadyMember,
    /// The session joined; `left` is the room it implicitly left, if any.
    Joined { left: Option<Departure> },
}

#[derive(Default)]
struct RoomState {
    rooms: HashMap<ConversationId, HashMap<SessionId, RoomMember>>,
    memberships: HashMap<SessionId, ConversationId>,
}

impl RoomState {
    fn remove(&mut self, session_id: SessionId, conversation_id: ConversationId) -> Option<Departure> {
        let room = self.rooms.get_mut(&conversation_id)?;
        let member = room.remove(&session_id)?;
        if room.is_empty() {
            self.rooms.remove(&conversation_id);
        }
        self.memberships.remove(&session_id);
        Some(Departure {
            conversation_id,
            session_id,
            viewer_id: member.viewer_id,
        })
    }
}

/// Conversation id to viewer-session set.
///
/// All mutations take a single write lock, so readers always observe a
/// consistent pair of room and membership maps.
#[derive(Default)]
pub struct RoomRegistry {
    state: RwLock<RoomState>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `session` to the room of `conversation_id`, leaving its previous room.
    ///
    /// Idempotent: joining the room the session is already in changes nothing.
    pub fn join(
        &self,
        session: &SessionHandle,
        conversation_id: ConversationId,
        viewer_id: &str,
    ) -> JoinOutcome {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let session_id = session.id();

        let left = match state.memberships.get(&session_id).copied() {
            Some(current) if current == conversation_id => return JoinOutcome::AlreadyMember,
            Some(previous) => state.remove(session_id, previous),
            None => None,
        };

        state.rooms.entry(conversation_id).or_default().insert(
            session_id,
            RoomMember {
                session: session.clone(),
                viewer_id: viewer_id.to_string(),
            },
        );
        state.memberships.insert(session_id, conversation_id);

        JoinOutcome::Joined { left }
    }

    /// Remove `session_id` from one room. No-op (returns `None`) if it is not a member.
    pub fn leave(&self, session_id: SessionId, conversation_id: ConversationId) -> Option<Departure> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id, conversation_id)
    }

    /// Remove `session_id` from whatever room it is in.
    ///
    /// Returns the departure only the first time; later calls return `None`.
    pub fn drop_session(&self, session_id: SessionId) -> Option<Departure> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let conversation_id = state.memberships.get(&session_id).copied()?;
        state.remove(session_id, conversation_id)
    }

    /// Snapshot of the room's current members (empty if none).
    ///
    /// The snapshot is detached from the registry, so callers may iterate it
    /// while other tasks join and leave.
    pub fn members_of(&self, conversation_id: ConversationId) -> Vec<RoomMember> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms
            .get(&conversation_id)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Room the session is currently in.
    pub fn room_of(&self, session_id: SessionId) -> Option<ConversationId> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .memberships
            .get(&session_id)
            .copied()
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).rooms.len()
    }

    /// Number of sessions in any room.
    pub fn session_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .memberships
            .len()
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("rooms", &self.room_count())
            .field("sessions", &self.session_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::session::TransportKind;

    fn session() -> SessionHandle {
        SessionHandle::new(TransportKind::Duplex).0
    }

    fn ids(members: &[RoomMember]) -> Vec<SessionId> {
        let mut ids: Vec<_> = members.iter().map(|m| m.session.id()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn join_adds_member() {
        let registry = RoomRegistry::new();
        let s = session();

        let outcome = registry.join(&s, ConversationId(1), "op-1");
        assert_eq!(outcome, JoinOutcome::Joined { left: None });

        let members = registry.members_of(ConversationId(1));
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].viewer_id, "op-1");
        assert_eq!(registry.room_of(s.id()), Some(ConversationId(1)));
    }

    #[test]
    fn join_is_idempotent() {
        let registry = RoomRegistry::new();
        let s = session();

        registry.join(&s, ConversationId(1), "op-1");
        assert_eq!(
            registry.join(&s, ConversationId(1), "op-1"),
            JoinOutcome::AlreadyMember
        );
        assert_eq!(registry.members_of(ConversationId(1)).len(), 1);
    }

    #[test]
    fn rejoin_leaves_previous_room() {
        let registry = RoomRegistry::new();
        let s = session();

        registry.join(&s, ConversationId(1), "op-1");
        let outcome = registry.join(&s, ConversationId(2), "op-1");

        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                left: Some(Departure {
                    conversation_id: ConversationId(1),
                    session_id: s.id(),
                    viewer_id: "op-1".to_string(),
                })
            }
        );
        assert!(registry.members_of(ConversationId(1)).is_empty());
        assert_eq!(registry.members_of(ConversationId(2)).len(), 1);
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn leave_absent_is_noop() {
        let registry = RoomRegistry::new();
        let s = session();

        assert!(registry.leave(s.id(), ConversationId(1)).is_none());

        registry.join(&s, ConversationId(1), "op-1");
        assert!(registry.leave(s.id(), ConversationId(2)).is_none());
        assert_eq!(registry.members_of(ConversationId(1)).len(), 1);

        assert!(registry.leave(s.id(), ConversationId(1)).is_some());
        assert!(registry.members_of(ConversationId(1)).is_empty());
        assert_eq!(registry.room_of(s.id()), None);
    }

    #[test]
    fn drop_session_reports_departure_once() {
        let registry = RoomRegistry::new();
        let a = session();
        let b = session();

        registry.join(&a, ConversationId(1), "op-a");
        registry.join(&b, ConversationId(1), "op-b");

        let departure = registry.drop_session(a.id()).unwrap();
        assert_eq!(departure.viewer_id, "op-a");
        assert!(registry.drop_session(a.id()).is_none());

        assert_eq!(ids(&registry.members_of(ConversationId(1))), vec![b.id()]);
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn members_snapshot_is_detached() {
        let registry = RoomRegistry::new();
        let a = session();
        let b = session();

        registry.join(&a, ConversationId(1), "op-a");
        let snapshot = registry.members_of(ConversationId(1));
        registry.join(&b, ConversationId(1), "op-b");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.members_of(ConversationId(1)).len(), 2);
    }

    #[test]
    fn members_of_unknown_room_is_empty() {
        let registry = RoomRegistry::new();
        assert!(registry.members_of(ConversationId(99)).is_empty());
    }
}
