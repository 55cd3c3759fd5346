//! Co-host invitation protocol
//!
//! Each invitation moves from `Pending` into exactly one terminal state:
//! `Accepted`, `Declined`, `Expired` or `Cancelled`. The registry keys
//! pending invitations by target connection id, so a second invite to the
//! same connection while one is pending is rejected outright. Timer firings
//! and responses race; whichever resolves first wins and the loser is a
//! no-op thanks to the terminal-state guard (a resolved invitation is no
//! longer in the pending map).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{InvitationId, ParticipantId, UserId};

/// Invitation status; terminal once non-`Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Cancelled,
}

impl InvitationStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

/// A single co-host invitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: InvitationId,
    pub host_participant_id: ParticipantId,
    pub target_user_id: UserId,
    pub target_connection_id: ParticipantId,
    pub status: InvitationStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Snapshot handed back to the caller of `invite_co_host` so the UI can
/// track the invitation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationHandle {
    pub invitation_id: InvitationId,
    pub target_user_id: UserId,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Registry of pending invitations for one session.
///
/// Owned by the session actor; resolved invitations leave the map, which is
/// what makes every resolution path (respond, expire, cancel) exclusive.
#[derive(Debug)]
pub struct InviteRegistry {
    pending: HashMap<ParticipantId, Invitation>,
    timeout: chrono::Duration,
}

impl InviteRegistry {
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            timeout: chrono::Duration::milliseconds(timeout_ms as i64),
        }
    }

    /// Register a new pending invitation.
    ///
    /// Rejects if one is already pending for the same target connection; the
    /// caller must wait for it to resolve or cancel it explicitly.
    pub fn create(
        &mut self,
        host_participant_id: ParticipantId,
        target_user_id: UserId,
        target_connection_id: ParticipantId,
    ) -> Result<Invitation> {
        if self.pending.contains_key(&target_connection_id) {
            return Err(Error::AlreadyExists(format!(
                "invitation already pending for connection {target_connection_id}"
            )));
        }

        let now = chrono::Utc::now();
        let invitation = Invitation {
            id: InvitationId::generate(),
            host_participant_id,
            target_user_id,
            target_connection_id: target_connection_id.clone(),
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: now + self.timeout,
        };
        self.pending
            .insert(target_connection_id, invitation.clone());
        Ok(invitation)
    }

    /// Resolve a pending invitation with the target's response.
    ///
    /// Fails with `NotFound` if nothing is pending for that connection
    /// (already expired, cancelled, or never invited), or if the pending
    /// entry belongs to a different invitation — a stale response for an
    /// expired invitation must never resolve a newer one.
    pub fn respond(
        &mut self,
        target_connection_id: &ParticipantId,
        invitation_id: &InvitationId,
        accepted: bool,
    ) -> Result<Invitation> {
        match self.pending.get(target_connection_id) {
            Some(pending) if pending.id == *invitation_id => {}
            _ => {
                return Err(Error::NotFound(format!(
                    "no pending invitation {invitation_id} for connection {target_connection_id}"
                )));
            }
        }
        let mut invitation = self.pending.remove(target_connection_id).ok_or_else(|| {
            Error::NotFound(format!(
                "no pending invitation for connection {target_connection_id}"
            ))
        })?;
        invitation.status = if accepted {
            InvitationStatus::Accepted
        } else {
            InvitationStatus::Declined
        };
        Ok(invitation)
    }

    /// Expire a pending invitation after its timer fired.
    ///
    /// Returns `None` if the invitation already resolved (response or cancel
    /// won the race) or if the pending entry belongs to a newer invitation.
    pub fn expire(
        &mut self,
        target_connection_id: &ParticipantId,
        invitation_id: &InvitationId,
    ) -> Option<Invitation> {
        match self.pending.get(target_connection_id) {
            Some(pending) if pending.id == *invitation_id => {
                let mut invitation = self.pending.remove(target_connection_id)?;
                invitation.status = InvitationStatus::Expired;
                Some(invitation)
            }
            _ => None,
        }
    }

    /// Cancel a pending invitation (host-initiated early termination).
    pub fn cancel(&mut self, target_connection_id: &ParticipantId) -> Option<Invitation> {
        let mut invitation = self.pending.remove(target_connection_id)?;
        invitation.status = InvitationStatus::Cancelled;
        Some(invitation)
    }

    /// Cancel every pending invitation (session ending).
    pub fn cancel_all(&mut self) -> Vec<Invitation> {
        self.pending
            .drain()
            .map(|(_, mut invitation)| {
                invitation.status = InvitationStatus::Cancelled;
                invitation
            })
            .collect()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InviteRegistry {
        InviteRegistry::new(30_000)
    }

    fn create(reg: &mut InviteRegistry, conn: &str) -> Invitation {
        reg.create(
            ParticipantId::from("host"),
            UserId::from(format!("user-{conn}")),
            ParticipantId::from(conn),
        )
        .unwrap()
    }

    #[test]
    fn test_create_sets_expiry_window() {
        let mut reg = registry();
        let invitation = create(&mut reg, "c1");
        assert_eq!(invitation.status, InvitationStatus::Pending);
        let window = invitation.expires_at - invitation.created_at;
        assert_eq!(window.num_milliseconds(), 30_000);
    }

    #[test]
    fn test_duplicate_pending_rejected() {
        let mut reg = registry();
        create(&mut reg, "c1");
        let err = reg
            .create(
                ParticipantId::from("host"),
                UserId::from("user-c1"),
                ParticipantId::from("c1"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(reg.pending_count(), 1);
    }

    #[test]
    fn test_respond_accept_and_decline() {
        let mut reg = registry();
        let first = create(&mut reg, "c1");
        let second = create(&mut reg, "c2");

        let accepted = reg
            .respond(&ParticipantId::from("c1"), &first.id, true)
            .unwrap();
        assert_eq!(accepted.status, InvitationStatus::Accepted);

        let declined = reg
            .respond(&ParticipantId::from("c2"), &second.id, false)
            .unwrap();
        assert_eq!(declined.status, InvitationStatus::Declined);

        assert_eq!(reg.pending_count(), 0);
    }

    #[test]
    fn test_respond_after_resolution_is_not_found() {
        let mut reg = registry();
        let invitation = create(&mut reg, "c1");
        reg.respond(&ParticipantId::from("c1"), &invitation.id, true)
            .unwrap();

        let err = reg
            .respond(&ParticipantId::from("c1"), &invitation.id, true)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_respond_ignores_stale_id_for_newer_invitation() {
        let mut reg = registry();
        let old = create(&mut reg, "c1");
        assert!(reg.expire(&ParticipantId::from("c1"), &old.id).is_some());
        let new = create(&mut reg, "c1");

        // A late accept for the expired invitation must not resolve the
        // new one.
        let err = reg
            .respond(&ParticipantId::from("c1"), &old.id, true)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(reg.pending_count(), 1);

        let accepted = reg
            .respond(&ParticipantId::from("c1"), &new.id, true)
            .unwrap();
        assert_eq!(accepted.status, InvitationStatus::Accepted);
    }

    #[test]
    fn test_expire_is_noop_after_response() {
        let mut reg = registry();
        let invitation = create(&mut reg, "c1");
        reg.respond(&ParticipantId::from("c1"), &invitation.id, false)
            .unwrap();

        // Timer fires late: the guard makes it a no-op.
        assert!(reg
            .expire(&ParticipantId::from("c1"), &invitation.id)
            .is_none());
    }

    #[test]
    fn test_expire_ignores_stale_timer_for_newer_invitation() {
        let mut reg = registry();
        let old = create(&mut reg, "c1");
        reg.cancel(&ParticipantId::from("c1")).unwrap();
        let new = create(&mut reg, "c1");

        // The old invitation's timer must not expire the new one.
        assert!(reg.expire(&ParticipantId::from("c1"), &old.id).is_none());
        let expired = reg.expire(&ParticipantId::from("c1"), &new.id).unwrap();
        assert_eq!(expired.status, InvitationStatus::Expired);
    }

    #[test]
    fn test_cancel_all() {
        let mut reg = registry();
        create(&mut reg, "c1");
        create(&mut reg, "c2");

        let cancelled = reg.cancel_all();
        assert_eq!(cancelled.len(), 2);
        assert!(cancelled
            .iter()
            .all(|i| i.status == InvitationStatus::Cancelled));
        assert_eq!(reg.pending_count(), 0);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!InvitationStatus::Pending.is_terminal());
        for status in [
            InvitationStatus::Accepted,
            InvitationStatus::Declined,
            InvitationStatus::Expired,
            InvitationStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
        }
    }
}
