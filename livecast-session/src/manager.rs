//! Co-broadcast session orchestration
//!
//! `CoBroadcastSessionManager` is the top-level orchestrator: it owns the
//! session status, the participant roster, the invitation registry, the
//! heartbeat record and all media resources. State is held by a single actor
//! task; UI commands, timer firings and signaling pushes are funneled into
//! one sequential handling loop, so no two handlers for the same session
//! ever interleave and the roster needs no locks.
//!
//! Long pipelines (capability negotiation, produce/consume) run in spawned
//! tasks that never touch session state; they re-enter the loop with a
//! completion command and the actor re-validates the session status before
//! applying the result. A success that arrives after `end_session` is
//! unwound by closing the resources it built.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::{EndReason, SessionEvent};
use crate::heartbeat::{HeartbeatMonitor, HeartbeatRecord};
use crate::invite::{InvitationHandle, InviteRegistry};
use crate::participant::{Participant, ProducerIds, Role, Roster};
use crate::persistence::{ProducerRecord, StreamPersistence, StreamRef};
use crate::signaling::{event, JoinRoomAck, RemoteEvent, RemoteParticipantInfo, SignalingChannel};
use crate::transport::{
    ConsumerHandle, MediaTransport, MediaTransportNegotiator, ProducerDescriptor, ProducerHandle,
    TrackKind, TransportOptions,
};
use crate::types::{InvitationId, ParticipantId, ProducerId, SessionId, UserId};

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Negotiating,
    Publishing,
    Live,
    Ending,
    Ended,
}

/// Parameters for starting a session as host
#[derive(Debug, Clone)]
pub struct HostInitParams {
    pub user_id: UserId,
}

/// Parameters for joining an existing session as co-host
#[derive(Debug, Clone)]
pub struct CoHostJoinParams {
    pub user_id: UserId,
}

/// Point-in-time view of the session for the UI layer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub host_participant_id: Option<ParticipantId>,
    pub participants: Vec<Participant>,
}

/// Session statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub status: SessionStatus,
    pub participant_count: usize,
    pub co_host_count: usize,
    pub pending_invitations: usize,
    pub heartbeat_failures: u32,
}

/// Local send-side media resources
struct LocalMedia {
    send_transport: Arc<dyn MediaTransport>,
    producers: Vec<ProducerHandle>,
}

impl LocalMedia {
    fn producer_ids(&self) -> ProducerIds {
        let mut ids = ProducerIds::default();
        for producer in &self.producers {
            match producer.kind {
                TrackKind::Video => ids.video_producer_id = Some(producer.id.clone()),
                TrackKind::Audio => ids.audio_producer_id = Some(producer.id.clone()),
            }
        }
        ids
    }
}

/// Receive-side media resources for one remote participant
struct RemoteMedia {
    transport: Arc<dyn MediaTransport>,
    consumers: Vec<ConsumerHandle>,
}

/// Receive-side resources built by the join pipeline for one publisher
struct RemoteMediaEntry {
    info: RemoteParticipantInfo,
    transport: Arc<dyn MediaTransport>,
    consumers: Vec<ConsumerHandle>,
}

struct HostPipelineOutput {
    user_id: UserId,
    stream: StreamRef,
    send_transport: Arc<dyn MediaTransport>,
    producers: Vec<ProducerHandle>,
}

struct JoinPipelineOutput {
    user_id: UserId,
    send_transport: Arc<dyn MediaTransport>,
    producers: Vec<ProducerHandle>,
    remotes: Vec<RemoteMediaEntry>,
}

/// Commands funneled into the session loop
enum Command {
    StartAsHost {
        params: HostInitParams,
        reply: oneshot::Sender<Result<SessionSnapshot>>,
    },
    JoinAsCoHost {
        params: CoHostJoinParams,
        reply: oneshot::Sender<Result<Participant>>,
    },
    InviteCoHost {
        target_user_id: UserId,
        target_connection_id: ParticipantId,
        reply: oneshot::Sender<Result<InvitationHandle>>,
    },
    RemoveCoHost {
        participant_id: ParticipantId,
        reply: oneshot::Sender<Result<()>>,
    },
    LeaveAsCoHost {
        reply: oneshot::Sender<Result<()>>,
    },
    EndSession {
        reply: oneshot::Sender<Result<()>>,
    },
    Remote(RemoteEvent),
    Stats {
        reply: oneshot::Sender<SessionStats>,
    },
    // Internal re-entries from spawned tasks.
    HostPipelineFinished {
        result: Result<HostPipelineOutput>,
        reply: oneshot::Sender<Result<SessionSnapshot>>,
    },
    JoinPipelineFinished {
        result: Result<JoinPipelineOutput>,
        reply: oneshot::Sender<Result<Participant>>,
    },
    ConsumeFinished {
        participant_id: ParticipantId,
        result: Result<(Arc<dyn MediaTransport>, ConsumerHandle)>,
    },
    InviteTimedOut {
        invitation_id: InvitationId,
        target_connection_id: ParticipantId,
    },
    HeartbeatOutcome {
        acked: bool,
    },
}

/// Handle to a co-broadcast session.
///
/// Cloneable; all clones talk to the same session loop. Dropping every
/// handle lets the loop wind down once its timers finish.
#[derive(Clone)]
pub struct CoBroadcastSessionManager {
    session_id: SessionId,
    cmd_tx: mpsc::UnboundedSender<Command>,
    status: Arc<RwLock<SessionStatus>>,
}

impl CoBroadcastSessionManager {
    /// Create a manager for one session and spawn its handling loop.
    ///
    /// The signaling channel, transport negotiator and persistence backend
    /// are injected; their lifetime is tied to this session, not to the
    /// application. `observer` receives every state-change notification.
    pub fn new(
        session_id: SessionId,
        config: SessionConfig,
        signaling: Arc<dyn SignalingChannel>,
        negotiator: Arc<dyn MediaTransportNegotiator>,
        persistence: Arc<dyn StreamPersistence>,
        observer: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let status = Arc::new(RwLock::new(SessionStatus::Idle));
        let invite_timeout = config.invite_timeout_ms;

        let actor = SessionActor {
            session_id: session_id.clone(),
            config,
            signaling,
            negotiator,
            persistence,
            observer,
            cmd_tx: cmd_tx.downgrade(),
            shared_status: Arc::clone(&status),
            status: SessionStatus::Idle,
            local_participant_id: ParticipantId::generate(),
            local_role: None,
            roster: Roster::new(),
            local_media: None,
            remote_media: HashMap::new(),
            invites: InviteRegistry::new(invite_timeout),
            invite_timers: HashMap::new(),
            heartbeat_record: None,
            heartbeat_monitor: None,
            stream: None,
        };
        tokio::spawn(actor.run(cmd_rx));

        Self {
            session_id,
            cmd_tx,
            status,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Current session status (cheap snapshot, no loop round-trip).
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status.read()
    }

    /// Start the session as host: negotiate, publish audio+video
    /// (simulcast-capable), go live. On any pipeline failure the status
    /// reverts to idle and partial resources are closed before this returns.
    pub async fn start_as_host(&self, params: HostInitParams) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::StartAsHost { params, reply })?;
        Self::round_trip(rx).await
    }

    /// Join the session as a co-host: publish own tracks and consume every
    /// already-publishing participant. All partially-created resources are
    /// released on failure.
    pub async fn join_as_co_host(&self, params: CoHostJoinParams) -> Result<Participant> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::JoinAsCoHost { params, reply })?;
        Self::round_trip(rx).await
    }

    /// Invite a user to co-host. Host only; rejects when the co-host
    /// capacity is already held by connecting/active co-hosts, or when an
    /// invitation is already pending for the same connection.
    pub async fn invite_co_host(
        &self,
        target_user_id: UserId,
        target_connection_id: ParticipantId,
    ) -> Result<InvitationHandle> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::InviteCoHost {
            target_user_id,
            target_connection_id,
            reply,
        })?;
        Self::round_trip(rx).await
    }

    /// Remove an active co-host. Host only.
    pub async fn remove_co_host(&self, participant_id: ParticipantId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RemoveCoHost {
            participant_id,
            reply,
        })?;
        Self::round_trip(rx).await
    }

    /// Leave the session as a co-host; the session continues for everyone
    /// else. No-op when called by a non-co-host or repeated.
    pub async fn leave_as_co_host(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::LeaveAsCoHost { reply })?;
        Self::round_trip(rx).await
    }

    /// End the session for everyone. Host only. All further inbound
    /// signaling for this session is ignored afterwards.
    pub async fn end_session(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::EndSession { reply })?;
        Self::round_trip(rx).await
    }

    /// Enqueue an inbound signaling push for sequential processing.
    pub fn handle_remote_event(&self, event: RemoteEvent) {
        let _ = self.cmd_tx.send(Command::Remote(event));
    }

    /// Current session statistics.
    pub async fn stats(&self) -> Result<SessionStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply })?;
        rx.await
            .map_err(|_| Error::SignalingUnavailable("session loop terminated".to_string()))
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::SignalingUnavailable("session loop terminated".to_string()))
    }

    async fn round_trip<T>(rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        rx.await
            .map_err(|_| Error::SignalingUnavailable("session loop terminated".to_string()))?
    }
}

/// Shared context handed to pipeline tasks.
#[derive(Clone)]
struct PipelineCtx {
    session_id: SessionId,
    local_participant_id: ParticipantId,
    config: SessionConfig,
    signaling: Arc<dyn SignalingChannel>,
    negotiator: Arc<dyn MediaTransportNegotiator>,
    persistence: Arc<dyn StreamPersistence>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

struct SessionActor {
    session_id: SessionId,
    config: SessionConfig,
    signaling: Arc<dyn SignalingChannel>,
    negotiator: Arc<dyn MediaTransportNegotiator>,
    persistence: Arc<dyn StreamPersistence>,
    observer: mpsc::UnboundedSender<SessionEvent>,
    /// Weak so the loop can wind down when every handle is dropped.
    cmd_tx: mpsc::WeakUnboundedSender<Command>,
    shared_status: Arc<RwLock<SessionStatus>>,

    status: SessionStatus,
    local_participant_id: ParticipantId,
    local_role: Option<Role>,
    roster: Roster,
    local_media: Option<LocalMedia>,
    remote_media: HashMap<ParticipantId, RemoteMedia>,
    invites: InviteRegistry,
    invite_timers: HashMap<InvitationId, CancellationToken>,
    heartbeat_record: Option<HeartbeatRecord>,
    heartbeat_monitor: Option<HeartbeatMonitor>,
    stream: Option<StreamRef>,
}

impl SessionActor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(cmd) = cmd_rx.recv().await {
            self.handle(cmd).await;
        }
        debug!(session_id = %self.session_id, "session loop stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::StartAsHost { params, reply } => self.on_start_as_host(params, reply),
            Command::JoinAsCoHost { params, reply } => self.on_join_as_co_host(params, reply),
            Command::InviteCoHost {
                target_user_id,
                target_connection_id,
                reply,
            } => {
                let result = self.on_invite(target_user_id, target_connection_id);
                let _ = reply.send(result);
            }
            Command::RemoveCoHost {
                participant_id,
                reply,
            } => {
                let result = self.on_remove_co_host(participant_id).await;
                let _ = reply.send(result);
            }
            Command::LeaveAsCoHost { reply } => {
                let result = self.on_leave(EndReason::Left).await;
                let _ = reply.send(result);
            }
            Command::EndSession { reply } => {
                let result = self.on_end_session(EndReason::HostEnded).await;
                let _ = reply.send(result);
            }
            Command::Remote(event) => {
                if matches!(self.status, SessionStatus::Idle | SessionStatus::Ended) {
                    debug!(
                        session_id = %self.session_id,
                        status = ?self.status,
                        "ignoring inbound signaling event"
                    );
                    return;
                }
                self.on_remote(event).await;
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            Command::HostPipelineFinished { result, reply } => {
                self.on_host_pipeline_finished(result, reply);
            }
            Command::JoinPipelineFinished { result, reply } => {
                self.on_join_pipeline_finished(result, reply);
            }
            Command::ConsumeFinished {
                participant_id,
                result,
            } => self.on_consume_finished(participant_id, result),
            Command::InviteTimedOut {
                invitation_id,
                target_connection_id,
            } => self.on_invite_timed_out(invitation_id, target_connection_id),
            Command::HeartbeatOutcome { acked } => self.on_heartbeat_outcome(acked).await,
        }
    }

    // ---- session start / join -------------------------------------------

    fn on_start_as_host(
        &mut self,
        params: HostInitParams,
        reply: oneshot::Sender<Result<SessionSnapshot>>,
    ) {
        if self.status != SessionStatus::Idle {
            let _ = reply.send(Err(Error::SessionStartFailed(format!(
                "session status is {:?}, expected idle",
                self.status
            ))));
            return;
        }
        let Some(ctx) = self.pipeline_ctx() else {
            let _ = reply.send(Err(Error::SessionStartFailed(
                "session loop terminated".to_string(),
            )));
            return;
        };

        self.local_role = Some(Role::Host);
        self.set_status(SessionStatus::Negotiating);

        let cmd_tx = ctx.cmd_tx.clone();
        tokio::spawn(async move {
            let result = run_host_pipeline(&ctx, params).await;
            let _ = cmd_tx.send(Command::HostPipelineFinished { result, reply });
        });
    }

    fn on_host_pipeline_finished(
        &mut self,
        result: Result<HostPipelineOutput>,
        reply: oneshot::Sender<Result<SessionSnapshot>>,
    ) {
        // Re-validate: end_session may have run while the pipeline was in
        // flight. A late success is unwound, not applied.
        if self.status != SessionStatus::Negotiating {
            if let Ok(output) = result {
                close_transport_later(output.send_transport);
                let persistence = Arc::clone(&self.persistence);
                tokio::spawn(async move {
                    if let Err(e) = persistence.end_stream(&output.stream).await {
                        warn!(error = %e, "failed to mark unwound stream ended");
                    }
                });
            }
            let _ = reply.send(Err(Error::SessionStartFailed(
                "session ended during negotiation".to_string(),
            )));
            return;
        }

        match result {
            Ok(output) => {
                let local = LocalMedia {
                    send_transport: output.send_transport,
                    producers: output.producers,
                };
                let mut host = Participant::new(
                    self.local_participant_id.clone(),
                    output.user_id,
                    Role::Host,
                );
                host.activate(local.producer_ids());
                self.roster.insert(host);
                self.local_media = Some(local);
                self.stream = Some(output.stream);
                // Publishing is only reported once the host roster entry
                // exists.
                self.set_status(SessionStatus::Publishing);
                self.set_status(SessionStatus::Live);
                self.start_heartbeat();
                info!(session_id = %self.session_id, "session live");
                let _ = reply.send(Ok(self.snapshot()));
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "host pipeline failed");
                self.local_role = None;
                self.set_status(SessionStatus::Idle);
                let _ = reply.send(Err(e));
            }
        }
    }

    fn on_join_as_co_host(
        &mut self,
        params: CoHostJoinParams,
        reply: oneshot::Sender<Result<Participant>>,
    ) {
        if self.status != SessionStatus::Idle {
            let _ = reply.send(Err(Error::JoinFailed(format!(
                "session status is {:?}, expected idle",
                self.status
            ))));
            return;
        }
        let Some(ctx) = self.pipeline_ctx() else {
            let _ = reply.send(Err(Error::JoinFailed("session loop terminated".to_string())));
            return;
        };

        self.local_role = Some(Role::CoHost);
        self.set_status(SessionStatus::Negotiating);

        let cmd_tx = ctx.cmd_tx.clone();
        tokio::spawn(async move {
            let result = run_join_pipeline(&ctx, params).await;
            let _ = cmd_tx.send(Command::JoinPipelineFinished { result, reply });
        });
    }

    fn on_join_pipeline_finished(
        &mut self,
        result: Result<JoinPipelineOutput>,
        reply: oneshot::Sender<Result<Participant>>,
    ) {
        if self.status != SessionStatus::Negotiating {
            if let Ok(output) = result {
                close_transport_later(output.send_transport);
                for remote in output.remotes {
                    close_transport_later(remote.transport);
                }
            }
            let _ = reply.send(Err(Error::JoinFailed(
                "session ended during join".to_string(),
            )));
            return;
        }

        match result {
            Ok(output) => {
                let local = LocalMedia {
                    send_transport: output.send_transport,
                    producers: output.producers,
                };
                let mut me = Participant::new(
                    self.local_participant_id.clone(),
                    output.user_id,
                    Role::CoHost,
                );
                me.activate(local.producer_ids());
                self.roster.insert(me.clone());
                self.local_media = Some(local);

                // Fill the roster (publishers from the join ack, host
                // included) before any status is reported.
                for entry in &output.remotes {
                    let mut participant = Participant::new(
                        entry.info.participant_id.clone(),
                        entry.info.user_id.clone(),
                        entry.info.role,
                    );
                    participant.activate(producer_ids_from(&entry.info.producers));
                    self.roster.insert(participant);
                }
                self.set_status(SessionStatus::Publishing);

                for entry in output.remotes {
                    for consumer in &entry.consumers {
                        self.emit(SessionEvent::TrackAdded {
                            participant_id: entry.info.participant_id.clone(),
                            kind: consumer.kind,
                            producer_id: consumer.producer_id.clone(),
                        });
                    }
                    self.remote_media.insert(
                        entry.info.participant_id.clone(),
                        RemoteMedia {
                            transport: entry.transport,
                            consumers: entry.consumers,
                        },
                    );
                }

                self.set_status(SessionStatus::Live);
                self.start_heartbeat();
                info!(session_id = %self.session_id, "joined session as co-host");
                let _ = reply.send(Ok(me));
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "join pipeline failed");
                self.local_role = None;
                self.set_status(SessionStatus::Idle);
                let _ = reply.send(Err(e));
            }
        }
    }

    // ---- invitations ------------------------------------------------------

    fn on_invite(
        &mut self,
        target_user_id: UserId,
        target_connection_id: ParticipantId,
    ) -> Result<InvitationHandle> {
        if self.local_role != Some(Role::Host) {
            return Err(Error::NotAuthorized(
                "only the host can invite co-hosts".to_string(),
            ));
        }
        if self.status != SessionStatus::Live {
            return Err(Error::NotAuthorized(format!(
                "session status is {:?}, expected live",
                self.status
            )));
        }
        if self.roster.co_host_count() >= self.config.max_co_hosts {
            return Err(Error::CapacityExceeded {
                max: self.config.max_co_hosts,
            });
        }

        let invitation = self.invites.create(
            self.local_participant_id.clone(),
            target_user_id,
            target_connection_id.clone(),
        )?;

        // Arm the expiry timer; cancelled when the invitation resolves.
        let token = CancellationToken::new();
        self.invite_timers
            .insert(invitation.id.clone(), token.clone());
        if let Some(cmd_tx) = self.cmd_tx.upgrade() {
            let invitation_id = invitation.id.clone();
            let timeout = Duration::from_millis(self.config.invite_timeout_ms);
            tokio::spawn(async move {
                tokio::select! {
                    () = token.cancelled() => {}
                    () = tokio::time::sleep(timeout) => {
                        let _ = cmd_tx.send(Command::InviteTimedOut {
                            invitation_id,
                            target_connection_id,
                        });
                    }
                }
            });
        }

        // Deliver the invite; a delivery failure is logged and the
        // invitation simply expires.
        let signaling = Arc::clone(&self.signaling);
        let payload = serde_json::json!({
            "invitationId": invitation.id,
            "hostParticipantId": invitation.host_participant_id,
            "targetUserId": invitation.target_user_id,
            "targetConnectionId": invitation.target_connection_id,
            "expiresAt": invitation.expires_at,
        });
        tokio::spawn(async move {
            if let Err(e) = signaling.notify(event::COHOST_SEND_INVITE, payload).await {
                warn!(error = %e, "failed to deliver co-host invite");
            }
        });

        info!(
            session_id = %self.session_id,
            invitation_id = %invitation.id,
            target_user_id = %invitation.target_user_id,
            "co-host invitation sent"
        );

        Ok(InvitationHandle {
            invitation_id: invitation.id,
            target_user_id: invitation.target_user_id,
            expires_at: invitation.expires_at,
        })
    }

    fn on_invite_timed_out(
        &mut self,
        invitation_id: InvitationId,
        target_connection_id: ParticipantId,
    ) {
        self.invite_timers.remove(&invitation_id);
        let Some(invitation) = self.invites.expire(&target_connection_id, &invitation_id) else {
            // Response or cancellation won the race.
            return;
        };

        info!(
            session_id = %self.session_id,
            invitation_id = %invitation.id,
            "co-host invitation expired"
        );
        self.emit(SessionEvent::InviteExpired {
            invitation_id: invitation.id.clone(),
            target_user_id: invitation.target_user_id.clone(),
        });

        // Tell the target side to drop its pending prompt.
        let signaling = Arc::clone(&self.signaling);
        let payload = serde_json::json!({
            "invitationId": invitation.id,
            "targetConnectionId": invitation.target_connection_id,
        });
        tokio::spawn(async move {
            if let Err(e) = signaling.notify(event::COHOST_INVITE_EXPIRED, payload).await {
                warn!(error = %e, "failed to notify invite expiry");
            }
        });
    }

    fn on_invite_response(
        &mut self,
        invitation_id: InvitationId,
        target_connection_id: ParticipantId,
        target_user_id: UserId,
        accepted: bool,
    ) {
        if self.local_role != Some(Role::Host) {
            return;
        }
        let invitation = match self
            .invites
            .respond(&target_connection_id, &invitation_id, accepted)
        {
            Ok(invitation) => invitation,
            Err(_) => {
                debug!(
                    session_id = %self.session_id,
                    invitation_id = %invitation_id,
                    "stale invite response ignored"
                );
                return;
            }
        };
        if let Some(token) = self.invite_timers.remove(&invitation.id) {
            token.cancel();
        }

        if !accepted {
            info!(
                session_id = %self.session_id,
                invitation_id = %invitation.id,
                "co-host invitation declined"
            );
            self.emit(SessionEvent::InviteDeclined {
                invitation_id: invitation.id,
                target_user_id: invitation.target_user_id,
            });
            return;
        }

        // Acceptances race against each other; re-check capacity before
        // granting the roster slot.
        if self.roster.co_host_count() >= self.config.max_co_hosts {
            warn!(
                session_id = %self.session_id,
                invitation_id = %invitation.id,
                "invitation accepted but capacity is exhausted"
            );
            let signaling = Arc::clone(&self.signaling);
            let payload = serde_json::json!({ "participantId": target_connection_id });
            tokio::spawn(async move {
                if let Err(e) = signaling.notify(event::COHOST_REMOVED, payload).await {
                    warn!(error = %e, "failed to notify over-capacity co-host");
                }
            });
            return;
        }

        let participant = Participant::new(
            target_connection_id.clone(),
            target_user_id.clone(),
            Role::CoHost,
        );
        self.roster.insert(participant);
        info!(
            session_id = %self.session_id,
            participant_id = %target_connection_id,
            "co-host invitation accepted, participant connecting"
        );
        self.emit(SessionEvent::CoHostConnecting {
            participant_id: target_connection_id,
            user_id: target_user_id,
        });
    }

    // ---- roster mutation ---------------------------------------------------

    async fn on_remove_co_host(&mut self, participant_id: ParticipantId) -> Result<()> {
        if self.local_role != Some(Role::Host) {
            return Err(Error::NotAuthorized(
                "only the host can remove co-hosts".to_string(),
            ));
        }
        self.roster.co_host(&participant_id)?;
        self.roster.remove(&participant_id);
        self.drop_remote_media(&participant_id);

        // Close their transports on the SFU and tell them to tear down.
        let payload = serde_json::json!({ "participantId": participant_id });
        if let Err(e) = self.signaling.notify(event::COHOST_REMOVED, payload).await {
            warn!(
                session_id = %self.session_id,
                error = %e,
                "failed to notify removed co-host"
            );
        }

        info!(
            session_id = %self.session_id,
            participant_id = %participant_id,
            "co-host removed"
        );
        self.emit(SessionEvent::CoHostRemoved { participant_id });
        Ok(())
    }

    async fn on_leave(&mut self, reason: EndReason) -> Result<()> {
        // No-op for non-co-hosts and for repeated calls after teardown.
        if self.local_role != Some(Role::CoHost) || self.status == SessionStatus::Ended {
            return Ok(());
        }

        let payload = serde_json::json!({ "participantId": self.local_participant_id });
        if let Err(e) = self
            .signaling
            .notify(event::COHOST_DISCONNECTED, payload)
            .await
        {
            warn!(
                session_id = %self.session_id,
                error = %e,
                "failed to announce co-host departure"
            );
        }
        info!(session_id = %self.session_id, "leaving session as co-host");
        self.teardown_local(reason).await;
        Ok(())
    }

    async fn on_end_session(&mut self, reason: EndReason) -> Result<()> {
        if self.local_role != Some(Role::Host) {
            return Err(Error::NotAuthorized(
                "only the host can end the session".to_string(),
            ));
        }
        if self.status == SessionStatus::Ended {
            return Ok(());
        }
        self.set_status(SessionStatus::Ending);

        // Terminal broadcast; every participant tears down on receipt.
        let payload = serde_json::json!({ "sessionId": self.session_id });
        if let Err(e) = self.signaling.notify(event::STREAM_END, payload).await {
            warn!(
                session_id = %self.session_id,
                error = %e,
                "failed to broadcast stream end"
            );
        }
        if let Some(stream) = self.stream.take() {
            if let Err(e) = self.persistence.end_stream(&stream).await {
                warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "failed to mark stream ended"
                );
            }
        }

        info!(session_id = %self.session_id, "session ended by host");
        self.teardown_local(reason).await;
        Ok(())
    }

    /// Close every locally-held resource and reach the terminal state.
    async fn teardown_local(&mut self, reason: EndReason) {
        if self.status == SessionStatus::Ended {
            return;
        }
        self.set_status(SessionStatus::Ending);

        for (_, token) in self.invite_timers.drain() {
            token.cancel();
        }
        let cancelled = self.invites.cancel_all();
        if !cancelled.is_empty() {
            debug!(
                session_id = %self.session_id,
                count = cancelled.len(),
                "pending invitations cancelled"
            );
        }

        if let Some(monitor) = self.heartbeat_monitor.take() {
            monitor.stop();
        }
        self.heartbeat_record = None;

        if let Some(local) = self.local_media.take() {
            local.send_transport.close().await;
        }
        let remotes: Vec<RemoteMedia> = self.remote_media.drain().map(|(_, m)| m).collect();
        for media in remotes {
            media.transport.close().await;
        }
        self.roster.clear();

        self.set_status(SessionStatus::Ended);
        let role = self.local_role.unwrap_or(Role::Viewer);
        self.emit(SessionEvent::SessionEnded { role, reason });
    }

    // ---- inbound signaling --------------------------------------------------

    async fn on_remote(&mut self, event: RemoteEvent) {
        match event {
            RemoteEvent::NewProducer {
                participant_id,
                producer_id,
                kind,
            } => self.on_new_producer(participant_id, producer_id, kind),
            RemoteEvent::ProducerClosed {
                participant_id,
                producer_id,
            } => self.on_producer_closed(&participant_id, &producer_id),
            RemoteEvent::ParticipantDisconnected { participant_id } => {
                self.on_participant_disconnected(participant_id).await;
            }
            RemoteEvent::InviteResponse {
                invitation_id,
                target_connection_id,
                target_user_id,
                accepted,
            } => self.on_invite_response(
                invitation_id,
                target_connection_id,
                target_user_id,
                accepted,
            ),
            RemoteEvent::CoHostConnected {
                participant_id,
                video_producer_id,
                audio_producer_id,
            } => {
                let Some(participant) = self.roster.get_mut(&participant_id) else {
                    debug!(
                        session_id = %self.session_id,
                        participant_id = %participant_id,
                        "cohost:connected for unknown participant"
                    );
                    return;
                };
                participant.activate(ProducerIds {
                    video_producer_id,
                    audio_producer_id,
                });
                info!(
                    session_id = %self.session_id,
                    participant_id = %participant_id,
                    "co-host connected"
                );
                self.emit(SessionEvent::CoHostConnected { participant_id });
            }
            RemoteEvent::HeartbeatProbe => {
                // Inbound and outbound probes are decoupled channels of the
                // same liveness signal: answer immediately, reset the streak.
                if let Some(record) = self.heartbeat_record.as_mut() {
                    record.record_success();
                }
                let signaling = Arc::clone(&self.signaling);
                let payload = serde_json::json!({ "sessionId": self.session_id });
                tokio::spawn(async move {
                    if let Err(e) = signaling.notify(event::HEARTBEAT, payload).await {
                        warn!(error = %e, "failed to answer inbound heartbeat probe");
                    }
                });
            }
            RemoteEvent::ViewerCount { count } => {
                self.emit(SessionEvent::ViewerCount { count });
            }
            RemoteEvent::StreamEnded => {
                if self.local_role == Some(Role::Host) {
                    return;
                }
                info!(session_id = %self.session_id, "stream ended by host");
                self.teardown_local(EndReason::HostEnded).await;
            }
            RemoteEvent::RemovedByHost => {
                if self.local_role != Some(Role::CoHost) {
                    return;
                }
                info!(session_id = %self.session_id, "removed from session by host");
                self.teardown_local(EndReason::RemovedByHost).await;
            }
        }
    }

    fn on_new_producer(
        &mut self,
        participant_id: ParticipantId,
        producer_id: ProducerId,
        kind: TrackKind,
    ) {
        if self.status != SessionStatus::Live {
            return;
        }
        if self.roster.get(&participant_id).is_none() {
            debug!(
                session_id = %self.session_id,
                participant_id = %participant_id,
                "new producer from unknown participant"
            );
            return;
        }
        let Some(cmd_tx) = self.cmd_tx.upgrade() else {
            return;
        };

        let descriptor = ProducerDescriptor {
            participant_id: participant_id.clone(),
            producer_id,
            kind,
        };
        let existing = self
            .remote_media
            .get(&participant_id)
            .map(|m| Arc::clone(&m.transport));
        let negotiator = Arc::clone(&self.negotiator);
        let options = TransportOptions {
            session_id: self.session_id.clone(),
            participant_id: self.local_participant_id.clone(),
        };
        tokio::spawn(async move {
            let result = async {
                let transport: Arc<dyn MediaTransport> = match existing {
                    Some(transport) => transport,
                    None => Arc::from(negotiator.create_recv_transport(&options).await?),
                };
                let consumer = transport.consume(&descriptor).await?;
                Ok((transport, consumer))
            }
            .await;
            let _ = cmd_tx.send(Command::ConsumeFinished {
                participant_id,
                result,
            });
        });
    }

    fn on_consume_finished(
        &mut self,
        participant_id: ParticipantId,
        result: Result<(Arc<dyn MediaTransport>, ConsumerHandle)>,
    ) {
        let (transport, consumer) = match result {
            Ok(built) => built,
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    participant_id = %participant_id,
                    error = %e,
                    "failed to consume remote producer"
                );
                return;
            }
        };

        // Re-validate before applying: the participant may have left or the
        // session may have ended while the consume was in flight.
        if self.status != SessionStatus::Live || self.roster.get(&participant_id).is_none() {
            if !self.remote_media.contains_key(&participant_id) {
                close_transport_later(transport);
            }
            return;
        }

        if let Some(participant) = self.roster.get_mut(&participant_id) {
            let ids = participant.producers.get_or_insert_with(ProducerIds::default);
            match consumer.kind {
                TrackKind::Video => ids.video_producer_id = Some(consumer.producer_id.clone()),
                TrackKind::Audio => ids.audio_producer_id = Some(consumer.producer_id.clone()),
            }
        }

        let kind = consumer.kind;
        let producer_id = consumer.producer_id.clone();
        match self.remote_media.entry(participant_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(RemoteMedia {
                    transport,
                    consumers: vec![consumer],
                });
            }
            Entry::Occupied(mut slot) => {
                if Arc::ptr_eq(&slot.get().transport, &transport) {
                    slot.get_mut().consumers.push(consumer);
                } else {
                    // Two concurrent pushes each built a receive transport
                    // for this participant. Keep the stored one, close the
                    // loser, and redo the consume on the survivor.
                    close_transport_later(transport);
                    let Some(cmd_tx) = self.cmd_tx.upgrade() else {
                        return;
                    };
                    let survivor = Arc::clone(&slot.get().transport);
                    let descriptor = ProducerDescriptor {
                        participant_id: participant_id.clone(),
                        producer_id,
                        kind,
                    };
                    tokio::spawn(async move {
                        let result = match survivor.consume(&descriptor).await {
                            Ok(consumer) => Ok((survivor, consumer)),
                            Err(e) => Err(e),
                        };
                        let _ = cmd_tx.send(Command::ConsumeFinished {
                            participant_id,
                            result,
                        });
                    });
                    return;
                }
            }
        }

        self.emit(SessionEvent::TrackAdded {
            participant_id,
            kind,
            producer_id,
        });
    }

    fn on_producer_closed(&mut self, participant_id: &ParticipantId, producer_id: &ProducerId) {
        let Some(media) = self.remote_media.get_mut(participant_id) else {
            return;
        };
        let Some(position) = media
            .consumers
            .iter()
            .position(|c| c.producer_id == *producer_id)
        else {
            return;
        };
        let consumer = media.consumers.remove(position);
        self.emit(SessionEvent::TrackRemoved {
            participant_id: participant_id.clone(),
            kind: consumer.kind,
            producer_id: consumer.producer_id,
        });
    }

    async fn on_participant_disconnected(&mut self, participant_id: ParticipantId) {
        let Some(removed) = self.roster.remove(&participant_id) else {
            return;
        };

        if removed.role == Role::Host && self.local_role == Some(Role::CoHost) {
            // The host is gone; the broadcast cannot continue for us.
            info!(session_id = %self.session_id, "host disconnected");
            self.teardown_local(EndReason::HostEnded).await;
            return;
        }

        self.drop_remote_media(&participant_id);
        info!(
            session_id = %self.session_id,
            participant_id = %participant_id,
            "participant disconnected"
        );
        self.emit(SessionEvent::CoHostDisconnected { participant_id });
    }

    // ---- heartbeat ----------------------------------------------------------

    fn start_heartbeat(&mut self) {
        self.heartbeat_record = Some(HeartbeatRecord::new(self.config.heartbeat_failure_threshold));
        let Some(cmd_tx) = self.cmd_tx.upgrade() else {
            return;
        };
        let monitor = HeartbeatMonitor::spawn(
            Arc::clone(&self.signaling),
            Duration::from_millis(self.config.heartbeat_interval_ms),
            move |acked| {
                let _ = cmd_tx.send(Command::HeartbeatOutcome { acked });
            },
        );
        self.heartbeat_monitor = Some(monitor);
    }

    async fn on_heartbeat_outcome(&mut self, acked: bool) {
        if self.status != SessionStatus::Live {
            return;
        }
        let Some(record) = self.heartbeat_record.as_mut() else {
            return;
        };

        if acked {
            record.record_success();
            return;
        }

        let failures = record.record_failure();
        warn!(
            session_id = %self.session_id,
            consecutive_failures = failures,
            "heartbeat probe failed"
        );
        if !record.is_exhausted() {
            return;
        }

        warn!(
            session_id = %self.session_id,
            "heartbeat failure threshold reached, tearing down"
        );
        match self.local_role {
            Some(Role::Host) => {
                let _ = self.on_end_session(EndReason::HeartbeatFailure).await;
            }
            Some(Role::CoHost) => {
                // Self-initiated departure, not a host-side removal.
                let _ = self.on_leave(EndReason::HeartbeatFailure).await;
            }
            _ => {}
        }
    }

    // ---- helpers --------------------------------------------------------------

    fn pipeline_ctx(&self) -> Option<PipelineCtx> {
        let cmd_tx = self.cmd_tx.upgrade()?;
        Some(PipelineCtx {
            session_id: self.session_id.clone(),
            local_participant_id: self.local_participant_id.clone(),
            config: self.config.clone(),
            signaling: Arc::clone(&self.signaling),
            negotiator: Arc::clone(&self.negotiator),
            persistence: Arc::clone(&self.persistence),
            cmd_tx,
        })
    }

    fn drop_remote_media(&mut self, participant_id: &ParticipantId) {
        if let Some(media) = self.remote_media.remove(participant_id) {
            for consumer in &media.consumers {
                self.emit(SessionEvent::TrackRemoved {
                    participant_id: participant_id.clone(),
                    kind: consumer.kind,
                    producer_id: consumer.producer_id.clone(),
                });
            }
            close_transport_later(media.transport);
        }
    }

    fn set_status(&mut self, to: SessionStatus) {
        let from = self.status;
        if from == to {
            return;
        }
        self.status = to;
        *self.shared_status.write() = to;
        info!(
            session_id = %self.session_id,
            from = ?from,
            to = ?to,
            "session status changed"
        );
        self.emit(SessionEvent::StatusChanged { from, to });
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.observer.send(event);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            status: self.status,
            host_participant_id: self.roster.host().map(|p| p.id.clone()),
            participants: self.roster.snapshot(),
        }
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            status: self.status,
            participant_count: self.roster.len(),
            co_host_count: self.roster.co_host_count(),
            pending_invitations: self.invites.pending_count(),
            heartbeat_failures: self
                .heartbeat_record
                .as_ref()
                .map_or(0, HeartbeatRecord::consecutive_failures),
        }
    }
}

// ---- pipelines ----------------------------------------------------------

fn close_transport_later(transport: Arc<dyn MediaTransport>) {
    tokio::spawn(async move {
        transport.close().await;
    });
}

fn producer_ids_from(descriptors: &[ProducerDescriptor]) -> ProducerIds {
    let mut ids = ProducerIds::default();
    for descriptor in descriptors {
        match descriptor.kind {
            TrackKind::Video => ids.video_producer_id = Some(descriptor.producer_id.clone()),
            TrackKind::Audio => ids.audio_producer_id = Some(descriptor.producer_id.clone()),
        }
    }
    ids
}

async fn run_host_pipeline(ctx: &PipelineCtx, params: HostInitParams) -> Result<HostPipelineOutput> {
    let stream = ctx
        .persistence
        .create_stream(&ctx.session_id)
        .await
        .map_err(|e| Error::SessionStartFailed(format!("stream record creation failed: {e}")))?;

    ctx.signaling
        .request(
            event::JOIN_ROOM,
            serde_json::json!({
                "sessionId": ctx.session_id,
                "participantId": ctx.local_participant_id,
                "userId": params.user_id,
                "role": "host",
            }),
        )
        .await
        .map_err(|e| Error::SignalingUnavailable(e.to_string()))?;

    ctx.negotiator
        .negotiate_capabilities(&ctx.session_id)
        .await
        .map_err(|e| Error::SessionStartFailed(e.to_string()))?;

    let options = TransportOptions {
        session_id: ctx.session_id.clone(),
        participant_id: ctx.local_participant_id.clone(),
    };
    let send_transport: Arc<dyn MediaTransport> = Arc::from(
        ctx.negotiator
            .create_send_transport(&options)
            .await
            .map_err(|e| Error::SessionStartFailed(e.to_string()))?,
    );

    let producers =
        match produce_local_tracks(&send_transport, ctx).await {
            Ok(producers) => producers,
            Err(e) => {
                // Roll back before surfacing: the session is never left in a
                // half-initialized state.
                send_transport.close().await;
                return Err(Error::SessionStartFailed(e.to_string()));
            }
        };

    let record = ProducerRecord {
        participant_id: ctx.local_participant_id.clone(),
        video_producer_id: producers
            .iter()
            .find(|p| p.kind == TrackKind::Video)
            .map(|p| p.id.clone()),
        audio_producer_id: producers
            .iter()
            .find(|p| p.kind == TrackKind::Audio)
            .map(|p| p.id.clone()),
    };
    if let Err(e) = ctx.persistence.record_producer(&stream, &record).await {
        warn!(error = %e, "failed to persist producer ids");
    }
    if let Err(e) = ctx.persistence.start_stream(&stream, &ctx.session_id).await {
        warn!(error = %e, "failed to mark stream live");
    }

    Ok(HostPipelineOutput {
        user_id: params.user_id,
        stream,
        send_transport,
        producers,
    })
}

async fn run_join_pipeline(ctx: &PipelineCtx, params: CoHostJoinParams) -> Result<JoinPipelineOutput> {
    let ack = ctx
        .signaling
        .request(
            event::JOIN_ROOM,
            serde_json::json!({
                "sessionId": ctx.session_id,
                "participantId": ctx.local_participant_id,
                "userId": params.user_id,
                "role": "cohost",
            }),
        )
        .await
        .map_err(|e| Error::SignalingUnavailable(e.to_string()))?;
    let ack: JoinRoomAck = serde_json::from_value(ack)?;

    ctx.negotiator
        .negotiate_capabilities(&ctx.session_id)
        .await
        .map_err(|e| Error::JoinFailed(e.to_string()))?;

    let options = TransportOptions {
        session_id: ctx.session_id.clone(),
        participant_id: ctx.local_participant_id.clone(),
    };
    let send_transport: Arc<dyn MediaTransport> = Arc::from(
        ctx.negotiator
            .create_send_transport(&options)
            .await
            .map_err(|e| Error::JoinFailed(e.to_string()))?,
    );

    let producers = match produce_local_tracks(&send_transport, ctx).await {
        Ok(producers) => producers,
        Err(e) => {
            send_transport.close().await;
            return Err(Error::JoinFailed(e.to_string()));
        }
    };

    // Consume every participant that already publishes.
    let mut remotes: Vec<RemoteMediaEntry> = Vec::new();
    for info in ack.participants {
        if info.participant_id == ctx.local_participant_id || info.producers.is_empty() {
            continue;
        }
        let built = async {
            let transport: Arc<dyn MediaTransport> =
                Arc::from(ctx.negotiator.create_recv_transport(&options).await?);
            let mut consumers = Vec::new();
            for descriptor in &info.producers {
                match transport.consume(descriptor).await {
                    Ok(consumer) => consumers.push(consumer),
                    Err(e) => {
                        transport.close().await;
                        return Err(e);
                    }
                }
            }
            Ok((transport, consumers))
        }
        .await;

        match built {
            Ok((transport, consumers)) => remotes.push(RemoteMediaEntry {
                info,
                transport,
                consumers,
            }),
            Err(e) => {
                // Release everything created so far.
                send_transport.close().await;
                for remote in remotes {
                    remote.transport.close().await;
                }
                return Err(Error::JoinFailed(e.to_string()));
            }
        }
    }

    // Announce producers so the host flips our roster entry to active.
    let payload = serde_json::json!({
        "participantId": ctx.local_participant_id,
        "videoProducerId": producers.iter().find(|p| p.kind == TrackKind::Video).map(|p| p.id.clone()),
        "audioProducerId": producers.iter().find(|p| p.kind == TrackKind::Audio).map(|p| p.id.clone()),
    });
    if let Err(e) = ctx.signaling.notify(event::COHOST_CONNECTED, payload).await {
        warn!(error = %e, "failed to announce co-host producers");
    }

    Ok(JoinPipelineOutput {
        user_id: params.user_id,
        send_transport,
        producers,
        remotes,
    })
}

/// Produce video then audio on the given send transport, closing nothing;
/// the caller owns rollback.
async fn produce_local_tracks(
    transport: &Arc<dyn MediaTransport>,
    ctx: &PipelineCtx,
) -> Result<Vec<ProducerHandle>> {
    let video = transport
        .produce(TrackKind::Video, &ctx.config.video_profile())
        .await?;
    let audio = transport
        .produce(TrackKind::Audio, &ctx.config.audio_profile())
        .await?;
    Ok(vec![video, audio])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::harness;
    use crate::transport::TransportStage;

    fn host_params() -> HostInitParams {
        HostInitParams {
            user_id: UserId::from("host-user"),
        }
    }

    #[tokio::test]
    async fn test_start_as_host_goes_live() {
        let h = harness(SessionConfig::default());
        let snapshot = h.manager.start_as_host(host_params()).await.unwrap();

        assert_eq!(snapshot.status, SessionStatus::Live);
        assert_eq!(h.manager.status(), SessionStatus::Live);
        assert!(snapshot.host_participant_id.is_some());
        assert_eq!(snapshot.participants.len(), 1);

        // Stream record created and marked live, producer ids persisted.
        assert_eq!(h.persistence.created.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(h.persistence.started.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(
            h.persistence
                .producers_recorded
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let h = harness(SessionConfig::default());
        h.manager.start_as_host(host_params()).await.unwrap();

        let err = h.manager.start_as_host(host_params()).await.unwrap_err();
        assert!(matches!(err, Error::SessionStartFailed(_)));
        assert_eq!(h.manager.status(), SessionStatus::Live);
    }

    #[tokio::test]
    async fn test_start_rolls_back_on_produce_failure() {
        let h = harness(SessionConfig::default());
        h.negotiator.fail_at(TransportStage::Produce);

        let err = h.manager.start_as_host(host_params()).await.unwrap_err();
        assert!(matches!(err, Error::SessionStartFailed(_)));
        assert_eq!(h.manager.status(), SessionStatus::Idle);
        assert!(h.negotiator.all_closed());
    }

    #[tokio::test]
    async fn test_start_fails_when_stream_record_rejected() {
        let h = harness(SessionConfig::default());
        h.persistence.set_fail_create(true);

        let err = h.manager.start_as_host(host_params()).await.unwrap_err();
        assert!(matches!(err, Error::SessionStartFailed(_)));
        assert_eq!(h.manager.status(), SessionStatus::Idle);
        assert!(h.negotiator.transports().is_empty());
    }

    #[tokio::test]
    async fn test_invite_requires_host() {
        let h = harness(SessionConfig::default());

        let err = h
            .manager
            .invite_co_host(UserId::from("u2"), ParticipantId::from("c2"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn test_remove_unknown_co_host_is_not_found() {
        let h = harness(SessionConfig::default());
        h.manager.start_as_host(host_params()).await.unwrap();

        let err = h
            .manager
            .remove_co_host(ParticipantId::from("nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_leave_is_noop_for_host() {
        let h = harness(SessionConfig::default());
        h.manager.start_as_host(host_params()).await.unwrap();

        h.manager.leave_as_co_host().await.unwrap();
        assert_eq!(h.manager.status(), SessionStatus::Live);
    }

    #[tokio::test]
    async fn test_end_session_requires_host() {
        let h = harness(SessionConfig::default());
        let err = h.manager.end_session().await.unwrap_err();
        assert!(matches!(err, Error::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn test_stats_reflect_roster() {
        let h = harness(SessionConfig::default());
        h.manager.start_as_host(host_params()).await.unwrap();

        let stats = h.manager.stats().await.unwrap();
        assert_eq!(stats.status, SessionStatus::Live);
        assert_eq!(stats.participant_count, 1);
        assert_eq!(stats.co_host_count, 0);
        assert_eq!(stats.pending_invitations, 0);
        assert_eq!(stats.heartbeat_failures, 0);
    }
}
