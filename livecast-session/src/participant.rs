//! Participant roster management
//!
//! The roster is owned exclusively by the session actor; no locking is
//! needed because only that task touches it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{ParticipantId, ProducerId, UserId};

/// Role of a participant within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Host,
    CoHost,
    Viewer,
}

/// Connection state of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Active,
    Disconnected,
}

/// Producer ids of a publishing participant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerIds {
    pub video_producer_id: Option<ProducerId>,
    pub audio_producer_id: Option<ProducerId>,
}

/// A participant in a co-broadcast session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Connection-scoped identifier
    pub id: ParticipantId,
    /// Stable application identity
    pub user_id: UserId,
    pub role: Role,
    pub connection_state: ConnectionState,
    /// Producer ids, set once the participant's produce step completes
    pub producers: Option<ProducerIds>,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

impl Participant {
    pub fn new(id: ParticipantId, user_id: UserId, role: Role) -> Self {
        Self {
            id,
            user_id,
            role,
            connection_state: ConnectionState::Connecting,
            producers: None,
            joined_at: chrono::Utc::now(),
        }
    }

    /// Mark the participant active with the given producer ids.
    pub fn activate(&mut self, producers: ProducerIds) {
        self.connection_state = ConnectionState::Active;
        self.producers = Some(producers);
    }

    /// Whether this participant counts toward the co-host capacity.
    #[must_use]
    pub fn counts_toward_capacity(&self) -> bool {
        self.role == Role::CoHost
            && matches!(
                self.connection_state,
                ConnectionState::Connecting | ConnectionState::Active
            )
    }
}

/// Participant roster for one session
#[derive(Debug, Default)]
pub struct Roster {
    participants: HashMap<ParticipantId, Participant>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, participant: Participant) {
        self.participants.insert(participant.id.clone(), participant);
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        self.participants.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(id)
    }

    /// Look up an active or connecting co-host, or fail with `NotFound`.
    pub fn co_host(&self, id: &ParticipantId) -> Result<&Participant> {
        self.participants
            .get(id)
            .filter(|p| p.counts_toward_capacity())
            .ok_or_else(|| Error::NotFound(format!("co-host {id} not in roster")))
    }

    /// Number of co-hosts currently holding a capacity slot
    /// (connecting or active).
    #[must_use]
    pub fn co_host_count(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.counts_toward_capacity())
            .count()
    }

    #[must_use]
    pub fn host(&self) -> Option<&Participant> {
        self.participants.values().find(|p| p.role == Role::Host)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Participant> {
        self.participants.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn co_host(id: &str) -> Participant {
        Participant::new(
            ParticipantId::from(id),
            UserId::from(format!("user-{id}")),
            Role::CoHost,
        )
    }

    #[test]
    fn test_participant_starts_connecting() {
        let p = co_host("c1");
        assert_eq!(p.connection_state, ConnectionState::Connecting);
        assert!(p.producers.is_none());
        assert!(p.counts_toward_capacity());
    }

    #[test]
    fn test_activate_sets_producers() {
        let mut p = co_host("c1");
        p.activate(ProducerIds {
            video_producer_id: Some(ProducerId::from("v1")),
            audio_producer_id: Some(ProducerId::from("a1")),
        });
        assert_eq!(p.connection_state, ConnectionState::Active);
        let producers = p.producers.unwrap();
        assert_eq!(producers.video_producer_id, Some(ProducerId::from("v1")));
    }

    #[test]
    fn test_co_host_count_excludes_host_and_disconnected() {
        let mut roster = Roster::new();
        roster.insert(Participant::new(
            ParticipantId::from("h"),
            UserId::from("host"),
            Role::Host,
        ));
        roster.insert(co_host("c1"));

        let mut gone = co_host("c2");
        gone.connection_state = ConnectionState::Disconnected;
        roster.insert(gone);

        assert_eq!(roster.len(), 3);
        assert_eq!(roster.co_host_count(), 1);
    }

    #[test]
    fn test_co_host_lookup() {
        let mut roster = Roster::new();
        roster.insert(co_host("c1"));

        assert!(roster.co_host(&ParticipantId::from("c1")).is_ok());
        assert!(matches!(
            roster.co_host(&ParticipantId::from("missing")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_host_lookup() {
        let mut roster = Roster::new();
        assert!(roster.host().is_none());
        roster.insert(Participant::new(
            ParticipantId::from("h"),
            UserId::from("host"),
            Role::Host,
        ));
        assert_eq!(roster.host().unwrap().role, Role::Host);
    }
}
