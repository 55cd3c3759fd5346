//! Stream persistence boundary (REST backend collaborator)
//!
//! The orchestrator records stream lifecycle moments against a backend it
//! knows nothing about beyond success/failure. Persistence failures never
//! count toward heartbeat escalation.

use async_trait::async_trait;

use crate::types::{ParticipantId, ProducerId, SessionId};

/// Opaque reference to a persisted stream record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRef(pub String);

impl StreamRef {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Producer ids to persist for one participant.
#[derive(Debug, Clone)]
pub struct ProducerRecord {
    pub participant_id: ParticipantId,
    pub video_producer_id: Option<ProducerId>,
    pub audio_producer_id: Option<ProducerId>,
}

/// Backend persistence collaborator.
#[async_trait]
pub trait StreamPersistence: Send + Sync + 'static {
    /// Create the stream record; called before negotiation starts.
    async fn create_stream(&self, session_id: &SessionId) -> anyhow::Result<StreamRef>;

    /// Record a participant's producer ids once their produce step completes.
    async fn record_producer(
        &self,
        stream: &StreamRef,
        record: &ProducerRecord,
    ) -> anyhow::Result<()>;

    /// Mark the stream live.
    async fn start_stream(&self, stream: &StreamRef, session_id: &SessionId)
        -> anyhow::Result<()>;

    /// Mark the stream ended.
    async fn end_stream(&self, stream: &StreamRef) -> anyhow::Result<()>;
}

/// No-op persistence for embedders without a REST backend.
#[derive(Debug, Default)]
pub struct NoopStreamPersistence;

#[async_trait]
impl StreamPersistence for NoopStreamPersistence {
    async fn create_stream(&self, session_id: &SessionId) -> anyhow::Result<StreamRef> {
        Ok(StreamRef(session_id.as_str().to_string()))
    }

    async fn record_producer(
        &self,
        _stream: &StreamRef,
        _record: &ProducerRecord,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start_stream(
        &self,
        _stream: &StreamRef,
        _session_id: &SessionId,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn end_stream(&self, _stream: &StreamRef) -> anyhow::Result<()> {
        Ok(())
    }
}
