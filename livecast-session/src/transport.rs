//! Media transport negotiation boundary
//!
//! Adapter traits over the external media relay client. The orchestrator
//! never inspects relay-internal protocol fields (SDP/ICE); every failure
//! from the relay surfaces as `Error::Transport` tagged with the stage that
//! failed, so the session manager can decide whether to roll back or fail
//! the whole operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::types::{ParticipantId, ProducerId, SessionId};

/// Pipeline stage at which a relay operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStage {
    Negotiate,
    Connect,
    Produce,
    Consume,
}

impl fmt::Display for TransportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Negotiate => "negotiate",
            Self::Connect => "connect",
            Self::Produce => "produce",
            Self::Consume => "consume",
        };
        f.write_str(s)
    }
}

/// Kind of a media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// One simulcast encoding layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingLayer {
    /// Restriction identifier sent to the relay ("high", "medium", "low")
    pub rid: String,
    /// Maximum bitrate for this layer in kbps
    pub max_bitrate_kbps: u32,
    /// Resolution downscale factor relative to the captured track
    pub scale_resolution_down_by: f64,
}

/// Encoding profile for a produced track.
///
/// A simulcast profile carries multiple layers at descending
/// resolutions/bitrates; a single-layer profile carries exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub layers: Vec<EncodingLayer>,
}

impl EncodingProfile {
    /// Default three-layer simulcast profile for video.
    #[must_use]
    pub fn simulcast() -> Self {
        Self {
            layers: vec![
                EncodingLayer {
                    rid: "high".to_string(),
                    max_bitrate_kbps: 2500,
                    scale_resolution_down_by: 1.0,
                },
                EncodingLayer {
                    rid: "medium".to_string(),
                    max_bitrate_kbps: 1000,
                    scale_resolution_down_by: 2.0,
                },
                EncodingLayer {
                    rid: "low".to_string(),
                    max_bitrate_kbps: 300,
                    scale_resolution_down_by: 4.0,
                },
            ],
        }
    }

    /// Single-layer profile (audio, or video with simulcast disabled).
    #[must_use]
    pub fn single_layer(max_bitrate_kbps: u32) -> Self {
        Self {
            layers: vec![EncodingLayer {
                rid: "single".to_string(),
                max_bitrate_kbps,
                scale_resolution_down_by: 1.0,
            }],
        }
    }

    #[must_use]
    pub fn is_simulcast(&self) -> bool {
        self.layers.len() > 1
    }
}

/// Descriptor of a remote producer, as pushed over signaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerDescriptor {
    pub participant_id: ParticipantId,
    pub producer_id: ProducerId,
    pub kind: TrackKind,
}

/// A published media track owned by the local participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerHandle {
    pub id: ProducerId,
    pub kind: TrackKind,
}

/// A subscribed media track received from another participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerHandle {
    pub id: String,
    pub producer_id: ProducerId,
    pub kind: TrackKind,
}

/// Options for creating a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportOptions {
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
}

/// A connected media transport (send or receive direction).
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Publish a track of the given kind over this transport.
    async fn produce(&self, kind: TrackKind, profile: &EncodingProfile) -> Result<ProducerHandle>;

    /// Subscribe to a remote producer over this transport.
    async fn consume(&self, descriptor: &ProducerDescriptor) -> Result<ConsumerHandle>;

    /// Close the transport and release its tracks.
    async fn close(&self);
}

/// Abstraction over the media relay client library.
///
/// Implementations negotiate relay capabilities and build transports; the
/// orchestrator composes these calls into the host/co-host pipelines.
#[async_trait]
pub trait MediaTransportNegotiator: Send + Sync + 'static {
    /// Exchange router capabilities for the given session.
    async fn negotiate_capabilities(&self, session_id: &SessionId) -> Result<()>;

    /// Create a transport for publishing local tracks.
    async fn create_send_transport(
        &self,
        options: &TransportOptions,
    ) -> Result<Box<dyn MediaTransport>>;

    /// Create a transport for receiving remote tracks.
    async fn create_recv_transport(
        &self,
        options: &TransportOptions,
    ) -> Result<Box<dyn MediaTransport>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulcast_profile_descending_layers() {
        let profile = EncodingProfile::simulcast();
        assert!(profile.is_simulcast());
        assert_eq!(profile.layers.len(), 3);
        for pair in profile.layers.windows(2) {
            assert!(pair[0].max_bitrate_kbps > pair[1].max_bitrate_kbps);
            assert!(pair[0].scale_resolution_down_by < pair[1].scale_resolution_down_by);
        }
    }

    #[test]
    fn test_single_layer_profile() {
        let profile = EncodingProfile::single_layer(64);
        assert!(!profile.is_simulcast());
        assert_eq!(profile.layers[0].max_bitrate_kbps, 64);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(TransportStage::Negotiate.to_string(), "negotiate");
        assert_eq!(TransportStage::Consume.to_string(), "consume");
    }

    #[test]
    fn test_producer_descriptor_wire_format() {
        let desc = ProducerDescriptor {
            participant_id: ParticipantId::from("p1"),
            producer_id: ProducerId::from("prod1"),
            kind: TrackKind::Video,
        };
        let json = serde_json::to_string(&desc).unwrap();
        assert!(json.contains("\"participantId\""));
        assert!(json.contains("\"video\""));
        let back: ProducerDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, desc);
    }
}
