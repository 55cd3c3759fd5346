//! Signaling channel boundary
//!
//! Bidirectional request/response and event-push channel between a
//! participant's client and the coordination backend. The orchestrator owns
//! an injected channel instance whose lifetime is tied to the session, not
//! to the application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::participant::Role;
use crate::transport::{ProducerDescriptor, TrackKind};
use crate::types::{InvitationId, ParticipantId, ProducerId, UserId};

/// Wire event names exchanged with the coordination backend.
pub mod event {
    pub const JOIN_ROOM: &str = "joinRoom";
    pub const GET_ROUTER_RTP_CAPABILITIES: &str = "getRouterRtpCapabilities";
    pub const CREATE_PRODUCER_TRANSPORT: &str = "createProducerTransport";
    pub const CONNECT_PRODUCER_TRANSPORT: &str = "connectProducerTransport";
    pub const PRODUCE: &str = "produce";
    pub const CREATE_CONSUMER_TRANSPORT: &str = "createConsumerTransport";
    pub const CONNECT_CONSUMER_TRANSPORT: &str = "connectConsumerTransport";
    pub const CONSUME: &str = "consume";
    pub const NEW_PRODUCER: &str = "newProducer";
    pub const PRODUCER_CLOSED: &str = "producerClosed";
    pub const COHOST_SEND_INVITE: &str = "cohost:sendInvite";
    pub const COHOST_INVITE_RECEIVED: &str = "cohost:inviteReceived";
    pub const COHOST_INVITE_RESPONSE: &str = "cohost:inviteResponse";
    pub const COHOST_INVITE_EXPIRED: &str = "cohost:inviteExpired";
    pub const COHOST_CONNECTED: &str = "cohost:connected";
    pub const COHOST_DISCONNECTED: &str = "cohost:disconnected";
    pub const COHOST_REMOVED: &str = "cohost:removed";
    pub const STREAM_HEARTBEAT: &str = "stream:heartbeat";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const STREAM_END: &str = "stream:end";
    pub const VIEWER_COUNT_UPDATE: &str = "viewerCountUpdate";
}

/// Abstract signaling channel.
///
/// Failures are opaque at this boundary; the session manager converts them
/// to its own error taxonomy (`SignalingUnavailable` for channel loss).
#[async_trait]
pub trait SignalingChannel: Send + Sync + 'static {
    /// Emit an event and await the backend acknowledgement payload.
    async fn request(
        &self,
        event: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;

    /// Emit an event without waiting for an acknowledgement.
    async fn notify(&self, event: &str, payload: serde_json::Value) -> anyhow::Result<()>;

    /// Whether the underlying connection is currently up.
    fn is_connected(&self) -> bool;
}

/// A publishing participant as reported in the `joinRoom` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteParticipantInfo {
    pub participant_id: ParticipantId,
    pub user_id: UserId,
    pub role: Role,
    #[serde(default)]
    pub producers: Vec<ProducerDescriptor>,
}

/// Acknowledgement payload of `joinRoom`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomAck {
    #[serde(default)]
    pub participants: Vec<RemoteParticipantInfo>,
}

/// Inbound signaling pushes consumed by the session manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RemoteEvent {
    /// A remote participant published a new track.
    #[serde(rename_all = "camelCase")]
    NewProducer {
        participant_id: ParticipantId,
        producer_id: ProducerId,
        kind: TrackKind,
    },
    /// A remote producer was closed.
    #[serde(rename_all = "camelCase")]
    ProducerClosed {
        participant_id: ParticipantId,
        producer_id: ProducerId,
    },
    /// A participant's connection dropped or they left.
    #[serde(rename_all = "camelCase")]
    ParticipantDisconnected { participant_id: ParticipantId },
    /// The target of a pending invitation responded.
    #[serde(rename_all = "camelCase")]
    InviteResponse {
        invitation_id: InvitationId,
        target_connection_id: ParticipantId,
        target_user_id: UserId,
        accepted: bool,
    },
    /// A co-host's produce step completed on their side.
    #[serde(rename_all = "camelCase")]
    CoHostConnected {
        participant_id: ParticipantId,
        video_producer_id: Option<ProducerId>,
        audio_producer_id: Option<ProducerId>,
    },
    /// Inbound liveness probe from the backend; answered immediately.
    HeartbeatProbe,
    /// Viewer count push.
    ViewerCount { count: u64 },
    /// The host ended the stream (received by non-host participants).
    StreamEnded,
    /// The host removed the local participant; self-teardown follows.
    RemovedByHost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_event_wire_format() {
        let json = r#"{
            "type": "newProducer",
            "participantId": "p2",
            "producerId": "prod-9",
            "kind": "video"
        }"#;
        let event: RemoteEvent = serde_json::from_str(json).unwrap();
        match event {
            RemoteEvent::NewProducer {
                participant_id,
                producer_id,
                kind,
            } => {
                assert_eq!(participant_id.as_str(), "p2");
                assert_eq!(producer_id.as_str(), "prod-9");
                assert_eq!(kind, TrackKind::Video);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_join_room_ack_defaults_to_empty() {
        let ack: JoinRoomAck = serde_json::from_str("{}").unwrap();
        assert!(ack.participants.is_empty());
    }

    #[test]
    fn test_join_room_ack_with_publishers() {
        let json = r#"{
            "participants": [{
                "participantId": "p1",
                "userId": "u1",
                "role": "host",
                "producers": [
                    {"participantId": "p1", "producerId": "v1", "kind": "video"},
                    {"participantId": "p1", "producerId": "a1", "kind": "audio"}
                ]
            }]
        }"#;
        let ack: JoinRoomAck = serde_json::from_str(json).unwrap();
        assert_eq!(ack.participants.len(), 1);
        assert_eq!(ack.participants[0].producers.len(), 2);
        assert_eq!(ack.participants[0].role, Role::Host);
    }
}
