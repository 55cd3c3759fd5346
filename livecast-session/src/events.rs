//! Observer events emitted by the session manager
//!
//! Every state transition is reported to the caller-supplied observer
//! channel; this is the only surface through which the UI layer learns of
//! session state. The manager never performs UI actions itself.

use serde::Serialize;

use crate::manager::SessionStatus;
use crate::participant::Role;
use crate::transport::TrackKind;
use crate::types::{InvitationId, ParticipantId, ProducerId, UserId};

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The host ended the session.
    HostEnded,
    /// Liveness probes exceeded the failure threshold.
    HeartbeatFailure,
    /// The local co-host left the session.
    Left,
    /// The host removed the local co-host.
    RemovedByHost,
}

/// Typed notification pushed to the session observer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Session status transitioned.
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// A co-host accepted an invitation and is connecting.
    CoHostConnecting {
        participant_id: ParticipantId,
        user_id: UserId,
    },
    /// A co-host's produce step completed; they are now publishing.
    CoHostConnected { participant_id: ParticipantId },
    /// A co-host disconnected or left on their own.
    CoHostDisconnected { participant_id: ParticipantId },
    /// The host removed a co-host.
    CoHostRemoved { participant_id: ParticipantId },
    /// An invitation was declined by its target.
    InviteDeclined {
        invitation_id: InvitationId,
        target_user_id: UserId,
    },
    /// An invitation expired without a response.
    InviteExpired {
        invitation_id: InvitationId,
        target_user_id: UserId,
    },
    /// A remote media track became available for rendering.
    TrackAdded {
        participant_id: ParticipantId,
        kind: TrackKind,
        producer_id: ProducerId,
    },
    /// A remote media track went away.
    TrackRemoved {
        participant_id: ParticipantId,
        kind: TrackKind,
        producer_id: ProducerId,
    },
    /// Viewer count update pushed by the backend.
    ViewerCount { count: u64 },
    /// The session reached its terminal state for the local participant.
    SessionEnded { role: Role, reason: EndReason },
}
