//! Mock collaborators for tests
//!
//! In-memory stand-ins for the signaling channel, the media relay and the
//! persistence backend. Compiled unconditionally so integration tests (and
//! embedders writing their own) can use them; not part of the stable API.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::SessionEvent;
use crate::manager::CoBroadcastSessionManager;
use crate::persistence::{ProducerRecord, StreamPersistence, StreamRef};
use crate::signaling::{event, SignalingChannel};
use crate::transport::{
    ConsumerHandle, EncodingProfile, MediaTransport, MediaTransportNegotiator, ProducerDescriptor,
    ProducerHandle, TrackKind, TransportOptions, TransportStage,
};
use crate::types::{ProducerId, SessionId};

/// In-memory signaling channel that acknowledges everything by default.
pub struct MockSignaling {
    connected: AtomicBool,
    fail_heartbeat: AtomicBool,
    fail_requests: AtomicBool,
    join_delay_ms: AtomicU64,
    join_ack: Mutex<serde_json::Value>,
    emitted: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockSignaling {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            fail_heartbeat: AtomicBool::new(false),
            fail_requests: AtomicBool::new(false),
            join_delay_ms: AtomicU64::new(0),
            join_ack: Mutex::new(serde_json::json!({ "participants": [] })),
            emitted: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make only heartbeat probes fail, leaving other traffic intact.
    pub fn set_fail_heartbeat(&self, fail: bool) {
        self.fail_heartbeat.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Delay `joinRoom` acknowledgements, holding pipelines mid-flight.
    pub fn set_join_delay(&self, delay: Duration) {
        self.join_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Override the `joinRoom` acknowledgement payload.
    pub fn set_join_ack(&self, ack: serde_json::Value) {
        *self.join_ack.lock() = ack;
    }

    /// Every event emitted so far (requests and notifies), in order.
    #[must_use]
    pub fn emitted(&self) -> Vec<(String, serde_json::Value)> {
        self.emitted.lock().clone()
    }

    /// How many times the given event was emitted.
    #[must_use]
    pub fn emit_count(&self, name: &str) -> usize {
        self.emitted.lock().iter().filter(|(e, _)| e == name).count()
    }
}

impl Default for MockSignaling {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingChannel for MockSignaling {
    async fn request(
        &self,
        event_name: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        self.emitted.lock().push((event_name.to_string(), payload));
        if !self.connected.load(Ordering::SeqCst) {
            anyhow::bail!("signaling channel disconnected");
        }
        if self.fail_requests.load(Ordering::SeqCst) {
            anyhow::bail!("request failed");
        }
        if event_name == event::STREAM_HEARTBEAT && self.fail_heartbeat.load(Ordering::SeqCst) {
            anyhow::bail!("heartbeat lost");
        }
        if event_name == event::JOIN_ROOM {
            let delay = self.join_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            return Ok(self.join_ack.lock().clone());
        }
        Ok(serde_json::json!({}))
    }

    async fn notify(&self, event_name: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        self.emitted.lock().push((event_name.to_string(), payload));
        if !self.connected.load(Ordering::SeqCst) {
            anyhow::bail!("signaling channel disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Observable state of one mock transport, shared with the test.
#[derive(Default)]
pub struct TransportProbe {
    pub closed: AtomicBool,
    pub produced: Mutex<Vec<ProducerHandle>>,
    pub consumed: Mutex<Vec<ConsumerHandle>>,
}

impl TransportProbe {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockTransport {
    probe: Arc<TransportProbe>,
    fail_produce: bool,
    fail_consume: bool,
    ids: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaTransport for MockTransport {
    async fn produce(&self, kind: TrackKind, _profile: &EncodingProfile) -> Result<ProducerHandle> {
        if self.fail_produce {
            return Err(Error::transport(
                TransportStage::Produce,
                "mock produce failure",
            ));
        }
        let n = self.ids.fetch_add(1, Ordering::SeqCst);
        let handle = ProducerHandle {
            id: ProducerId::from(format!("prod-{n}")),
            kind,
        };
        self.probe.produced.lock().push(handle.clone());
        Ok(handle)
    }

    async fn consume(&self, descriptor: &ProducerDescriptor) -> Result<ConsumerHandle> {
        if self.fail_consume {
            return Err(Error::transport(
                TransportStage::Consume,
                "mock consume failure",
            ));
        }
        let n = self.ids.fetch_add(1, Ordering::SeqCst);
        let handle = ConsumerHandle {
            id: format!("cons-{n}"),
            producer_id: descriptor.producer_id.clone(),
            kind: descriptor.kind,
        };
        self.probe.consumed.lock().push(handle.clone());
        Ok(handle)
    }

    async fn close(&self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

/// Mock relay negotiator; can be told to fail at a given pipeline stage.
pub struct MockNegotiator {
    fail_stage: Mutex<Option<TransportStage>>,
    probes: Mutex<Vec<Arc<TransportProbe>>>,
    ids: Arc<AtomicUsize>,
}

impl MockNegotiator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fail_stage: Mutex::new(None),
            probes: Mutex::new(Vec::new()),
            ids: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the given stage fail on every subsequent call.
    pub fn fail_at(&self, stage: TransportStage) {
        *self.fail_stage.lock() = Some(stage);
    }

    pub fn clear_failure(&self) {
        *self.fail_stage.lock() = None;
    }

    /// Probes for every transport created so far, in creation order.
    #[must_use]
    pub fn transports(&self) -> Vec<Arc<TransportProbe>> {
        self.probes.lock().clone()
    }

    /// Whether every transport created so far has been closed.
    #[must_use]
    pub fn all_closed(&self) -> bool {
        self.probes.lock().iter().all(|p| p.is_closed())
    }

    fn make_transport(&self) -> Box<dyn MediaTransport> {
        let fail = *self.fail_stage.lock();
        let probe = Arc::new(TransportProbe::default());
        self.probes.lock().push(Arc::clone(&probe));
        Box::new(MockTransport {
            probe,
            fail_produce: fail == Some(TransportStage::Produce),
            fail_consume: fail == Some(TransportStage::Consume),
            ids: Arc::clone(&self.ids),
        })
    }
}

impl Default for MockNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTransportNegotiator for MockNegotiator {
    async fn negotiate_capabilities(&self, _session_id: &SessionId) -> Result<()> {
        if *self.fail_stage.lock() == Some(TransportStage::Negotiate) {
            return Err(Error::transport(
                TransportStage::Negotiate,
                "mock negotiation failure",
            ));
        }
        Ok(())
    }

    async fn create_send_transport(
        &self,
        _options: &TransportOptions,
    ) -> Result<Box<dyn MediaTransport>> {
        if *self.fail_stage.lock() == Some(TransportStage::Connect) {
            return Err(Error::transport(
                TransportStage::Connect,
                "mock connect failure",
            ));
        }
        Ok(self.make_transport())
    }

    async fn create_recv_transport(
        &self,
        _options: &TransportOptions,
    ) -> Result<Box<dyn MediaTransport>> {
        if *self.fail_stage.lock() == Some(TransportStage::Connect) {
            return Err(Error::transport(
                TransportStage::Connect,
                "mock connect failure",
            ));
        }
        Ok(self.make_transport())
    }
}

/// Persistence backend that counts lifecycle calls.
#[derive(Default)]
pub struct RecordingPersistence {
    pub created: AtomicUsize,
    pub producers_recorded: AtomicUsize,
    pub started: AtomicUsize,
    pub ended: AtomicUsize,
    fail_create: AtomicBool,
    start_delay_ms: AtomicU64,
}

impl RecordingPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Delay `start_stream`, holding the host pipeline mid-flight after the
    /// producers exist.
    pub fn set_start_delay(&self, delay: Duration) {
        self.start_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl StreamPersistence for RecordingPersistence {
    async fn create_stream(&self, session_id: &SessionId) -> anyhow::Result<StreamRef> {
        if self.fail_create.load(Ordering::SeqCst) {
            anyhow::bail!("stream record creation rejected");
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(StreamRef(format!("stream-{session_id}")))
    }

    async fn record_producer(
        &self,
        _stream: &StreamRef,
        _record: &ProducerRecord,
    ) -> anyhow::Result<()> {
        self.producers_recorded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start_stream(
        &self,
        _stream: &StreamRef,
        _session_id: &SessionId,
    ) -> anyhow::Result<()> {
        let delay = self.start_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn end_stream(&self, _stream: &StreamRef) -> anyhow::Result<()> {
        self.ended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A fully wired manager plus handles to all of its mock collaborators.
pub struct TestHarness {
    pub manager: CoBroadcastSessionManager,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub signaling: Arc<MockSignaling>,
    pub negotiator: Arc<MockNegotiator>,
    pub persistence: Arc<RecordingPersistence>,
}

/// Build a manager wired to fresh mocks.
#[must_use]
pub fn harness(config: SessionConfig) -> TestHarness {
    let signaling = Arc::new(MockSignaling::new());
    let negotiator = Arc::new(MockNegotiator::new());
    let persistence = Arc::new(RecordingPersistence::new());
    let (event_tx, events) = mpsc::unbounded_channel();

    let manager = CoBroadcastSessionManager::new(
        SessionId::generate(),
        config,
        Arc::clone(&signaling) as Arc<dyn SignalingChannel>,
        Arc::clone(&negotiator) as Arc<dyn MediaTransportNegotiator>,
        Arc::clone(&persistence) as Arc<dyn StreamPersistence>,
        event_tx,
    );

    TestHarness {
        manager,
        events,
        signaling,
        negotiator,
        persistence,
    }
}

/// Receive the next observer event, failing the test after a generous wait.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    match tokio::time::timeout(std::time::Duration::from_secs(60), events.recv()).await {
        Ok(Some(event)) => event,
        Ok(None) => panic!("event channel closed"),
        Err(_) => panic!("timed out waiting for session event"),
    }
}

/// Skip events until one matches the predicate.
pub async fn wait_for_event<F>(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    mut matches: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if matches(&event) {
            return event;
        }
    }
}
