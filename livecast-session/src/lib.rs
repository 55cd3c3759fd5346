//! Multi-party co-broadcast session orchestration.
//!
//! A host starts a live broadcast, invites co-hosts over a signaling
//! channel, and every accepted co-host publishes audio/video alongside the
//! host. This crate owns the session state machine: the participant roster,
//! the invitation protocol with its expiry timers, the produce/consume
//! pipelines over an abstract media relay, heartbeat-based liveness
//! detection, and role-scoped teardown.
//!
//! The external world is reached through three injected boundaries:
//! [`SignalingChannel`] for the coordination backend,
//! [`MediaTransportNegotiator`] for the media relay client, and
//! [`StreamPersistence`] for the stream record backend. State changes are
//! reported through an observer channel of [`SessionEvent`]s; the manager
//! never performs UI actions itself.
//!
//! ```no_run
//! use std::sync::Arc;
//! use livecast_session::{
//!     CoBroadcastSessionManager, HostInitParams, SessionConfig, SessionId, UserId,
//! };
//!
//! # async fn run(
//! #     signaling: Arc<dyn livecast_session::SignalingChannel>,
//! #     negotiator: Arc<dyn livecast_session::MediaTransportNegotiator>,
//! #     persistence: Arc<dyn livecast_session::StreamPersistence>,
//! # ) -> livecast_session::Result<()> {
//! let (event_tx, mut events) = tokio::sync::mpsc::unbounded_channel();
//! let manager = CoBroadcastSessionManager::new(
//!     SessionId::generate(),
//!     SessionConfig::default(),
//!     signaling,
//!     negotiator,
//!     persistence,
//!     event_tx,
//! );
//! let _snapshot = manager
//!     .start_as_host(HostInitParams { user_id: UserId::from("alice") })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod invite;
pub mod manager;
pub mod participant;
pub mod persistence;
pub mod signaling;
pub mod test_support;
pub mod transport;
pub mod types;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use events::{EndReason, SessionEvent};
pub use invite::{Invitation, InvitationHandle, InvitationStatus};
pub use manager::{
    CoBroadcastSessionManager, CoHostJoinParams, HostInitParams, SessionSnapshot, SessionStats,
    SessionStatus,
};
pub use participant::{ConnectionState, Participant, ProducerIds, Role};
pub use persistence::{NoopStreamPersistence, ProducerRecord, StreamPersistence, StreamRef};
pub use signaling::{JoinRoomAck, RemoteEvent, RemoteParticipantInfo, SignalingChannel};
pub use transport::{
    ConsumerHandle, EncodingLayer, EncodingProfile, MediaTransport, MediaTransportNegotiator,
    ProducerDescriptor, ProducerHandle, TrackKind, TransportOptions, TransportStage,
};
pub use types::{InvitationId, ParticipantId, ProducerId, SessionId, UserId};
