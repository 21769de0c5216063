//! The hub: connection registry, membership, and fan-out.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use slipstream_credential::{Claims, CredentialService};
use slipstream_protocol::{
    CloseCode, Inbound, RecordKind, SessionEvent, decode_inbound,
};
use slipstream_store::{
    KeyedStore, OwnershipPolicy, StateRepository, StoreError, StoredRecord,
};
use slipstream_transport::ConnectionId;
use tokio::sync::{Mutex, mpsc};

use crate::connection::{OutboundFrame, OutboundReceiver, OutboundSender, Phase};
use crate::HubConfig;

/// What became of one inbound message.
#[derive(Debug)]
pub enum Outcome {
    /// Processed (possibly deliberately ignored). Keep reading.
    Continue,

    /// The operation was refused but the connection stays open.
    Rejected(StoreError),

    /// The connection was force-closed, or was already gone. Stop
    /// reading; no further message from it will be processed.
    Closed,
}

/// One registered connection: its protocol phase and its outbound queue.
struct ConnEntry {
    phase: Phase,
    outbound: OutboundSender,
}

/// The maps the hub's mutex guards: connection table plus room
/// membership. Invariants:
/// - a connection id appears in at most one room's member set;
/// - membership always agrees with the bound claims' `room`;
/// - only `Authenticated` connections appear in any member set.
#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, ConnEntry>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
    next_id: u64,
}

impl Registry {
    fn allocate_id(&mut self) -> ConnectionId {
        self.next_id += 1;
        ConnectionId::new(self.next_id)
    }

    /// Snapshots every authenticated member of `room` except `exclude`.
    /// Called with the lock held; the returned senders are used after
    /// it is released.
    fn others_in_room(
        &self,
        room: &str,
        exclude: ConnectionId,
    ) -> Vec<(ConnectionId, OutboundSender)> {
        let Some(members) = self.rooms.get(room) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|id| **id != exclude)
            .filter_map(|id| {
                let entry = self.connections.get(id)?;
                entry
                    .phase
                    .is_authenticated()
                    .then(|| (*id, entry.outbound.clone()))
            })
            .collect()
    }
}

/// The authenticated real-time session hub.
///
/// Wire a [`CredentialService`], a [`StateRepository`], and an
/// [`OwnershipPolicy`] in at construction; all three are explicit
/// collaborators, not globals. The hub is shared across connection
/// tasks behind an `Arc`.
pub struct Hub<S: KeyedStore> {
    registry: Mutex<Registry>,
    credentials: CredentialService,
    repository: StateRepository<S>,
    policy: OwnershipPolicy,
    config: HubConfig,
}

impl<S: KeyedStore> Hub<S> {
    /// Creates a hub over the given collaborators.
    pub fn new(
        credentials: CredentialService,
        repository: StateRepository<S>,
        policy: OwnershipPolicy,
        config: HubConfig,
    ) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            credentials,
            repository,
            policy,
            config,
        }
    }

    /// Creates the bounded outbound queue for one connection. The
    /// receiving half goes to the connection's writer task; the sending
    /// half is handed to [`register`](Self::register).
    pub fn outbound_channel(&self) -> (OutboundSender, OutboundReceiver) {
        mpsc::channel(self.config.outbound_queue)
    }

    /// Registers a new, unauthenticated connection.
    ///
    /// The connection has no room membership until its hello verifies.
    pub async fn register(&self, outbound: OutboundSender) -> ConnectionId {
        let mut registry = self.registry.lock().await;
        let id = registry.allocate_id();
        registry.connections.insert(
            id,
            ConnEntry {
                phase: Phase::Unauthenticated,
                outbound,
            },
        );
        tracing::debug!(%id, "connection registered");
        id
    }

    /// Processes one raw inbound frame from a connection.
    pub async fn handle_message(
        &self,
        id: ConnectionId,
        raw: &[u8],
    ) -> Outcome {
        let inbound = match decode_inbound(raw) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(%id, error = %e, "malformed frame");
                self.force_close(id, CloseCode::ProtocolError, "malformed message")
                    .await;
                return Outcome::Closed;
            }
        };

        match inbound {
            Inbound::Hello { token } => self.handle_hello(id, token).await,
            Inbound::Update { kind, body } => {
                self.handle_update(id, kind, body, raw).await
            }
            Inbound::ServerEvent { tag } => {
                // Server-emitted events are never accepted from clients.
                self.handle_ignorable(id, &tag).await
            }
            Inbound::Unknown { tag } => self.handle_ignorable(id, &tag).await,
        }
    }

    /// Removes a connection, cleaning up membership, records, and the
    /// room's session record, and announcing the leave. Idempotent.
    pub async fn unregister(&self, id: ConnectionId) {
        let dead = self.remove_connection(id, None).await;
        self.reap(dead).await;
    }

    /// Unregisters first, then asks the connection's writer to close the
    /// transport with the given code and reason. A close that cannot be
    /// delivered is swallowed; the connection is already gone.
    pub async fn force_close(
        &self,
        id: ConnectionId,
        code: CloseCode,
        reason: &str,
    ) {
        tracing::debug!(%id, %code, reason, "forcing close");
        let dead = self
            .remove_connection(id, Some((code, reason.to_owned())))
            .await;
        self.reap(dead).await;
    }

    /// The repository this hub persists into.
    pub fn repository(&self) -> &StateRepository<S> {
        &self.repository
    }

    /// Number of live connections, in any phase.
    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.connections.len()
    }

    /// The member connections of a room, unordered.
    pub async fn room_members(&self, room: &str) -> Vec<ConnectionId> {
        let registry = self.registry.lock().await;
        registry
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The claims bound to a connection, if it is authenticated.
    pub async fn claims_of(&self, id: ConnectionId) -> Option<Claims> {
        let registry = self.registry.lock().await;
        registry
            .connections
            .get(&id)
            .and_then(|entry| entry.phase.claims().cloned())
    }

    // -----------------------------------------------------------------
    // Message handling
    // -----------------------------------------------------------------

    async fn handle_hello(
        &self,
        id: ConnectionId,
        token: Option<String>,
    ) -> Outcome {
        let claims = match token
            .ok_or(slipstream_credential::CredentialError::Malformed)
            .and_then(|t| self.credentials.verify(&t))
        {
            Ok(claims) => claims,
            Err(e) => {
                // Log the precise failure; the peer only learns that it
                // was not accepted.
                tracing::warn!(%id, error = %e, "credential rejected");
                self.force_close(id, CloseCode::CannotAccept, "not authorized")
                    .await;
                return Outcome::Closed;
            }
        };

        // Membership mutation and recipient snapshot under one lock.
        let mut registry = self.registry.lock().await;
        let bound = match registry.connections.get_mut(&id) {
            None => return Outcome::Closed,
            Some(entry) => entry.phase.authenticate(claims.clone()),
        };
        if !bound {
            drop(registry);
            tracing::debug!(%id, "hello on authenticated connection");
            self.force_close(id, CloseCode::ProtocolError, "unexpected hello")
                .await;
            return Outcome::Closed;
        }
        let members = registry.rooms.entry(claims.room.clone()).or_default();
        let first_member = members.is_empty();
        members.insert(id);
        let others = registry.others_in_room(&claims.room, id);
        drop(registry);

        tracing::info!(
            %id,
            username = %claims.username,
            room = %claims.room,
            callsign = %claims.callsign,
            "connection authenticated"
        );

        // Store work happens outside the registry lock.
        if first_member {
            if let Err(e) = self.repository.open_session(&claims.room).await {
                tracing::error!(room = %claims.room, error = %e, "failed to open session record");
            }
        }

        let event = SessionEvent::Add {
            room: claims.room.clone(),
            callsign: claims.callsign.clone(),
        };
        self.announce(event, others).await;
        Outcome::Continue
    }

    async fn handle_update(
        &self,
        id: ConnectionId,
        kind: RecordKind,
        body: Value,
        raw: &[u8],
    ) -> Outcome {
        // Claims lookup and recipient snapshot under one lock.
        let registry = self.registry.lock().await;
        let claims = match registry.connections.get(&id) {
            None => return Outcome::Closed,
            Some(entry) => entry.phase.claims().cloned(),
        };
        let Some(claims) = claims else {
            drop(registry);
            tracing::debug!(%id, %kind, "domain message before hello");
            self.force_close(
                id,
                CloseCode::ProtocolError,
                "authentication required",
            )
            .await;
            return Outcome::Closed;
        };
        let others = registry.others_in_room(&claims.room, id);
        drop(registry);

        if let Err(e) = self.persist_update(&claims, kind, body).await {
            if e.is_rejection() {
                tracing::warn!(%id, %kind, error = %e, "update rejected");
            } else {
                tracing::error!(%id, %kind, error = %e, "store failure, update dropped");
            }
            return Outcome::Rejected(e);
        }

        // Fan the raw frame out verbatim; the sender never sees its own
        // echo.
        let dead = deliver(&others, raw);
        self.reap(dead).await;
        Outcome::Continue
    }

    /// Ignorable tags: server-event copies and unknown types. Ignored
    /// once authenticated; before authentication anything that is not a
    /// hello is a protocol violation.
    async fn handle_ignorable(&self, id: ConnectionId, tag: &str) -> Outcome {
        let authenticated = {
            let registry = self.registry.lock().await;
            match registry.connections.get(&id) {
                None => return Outcome::Closed,
                Some(entry) => entry.phase.is_authenticated(),
            }
        };

        if authenticated {
            tracing::debug!(%id, tag, "ignoring message");
            Outcome::Continue
        } else {
            tracing::debug!(%id, tag, "non-hello message before hello");
            self.force_close(id, CloseCode::ProtocolError, "authentication required")
                .await;
            Outcome::Closed
        }
    }

    // -----------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------

    /// Persists one domain update under the ownership rules.
    ///
    /// The record's key comes from the bound claims, never from the
    /// body: a client writes only under its own room and callsign. The
    /// Aircraft record is the ownership root; subsystem updates against
    /// an entity whose root is owned by someone else are refused.
    /// Without a root the entity is unclaimed and the update is a plain
    /// create.
    async fn persist_update(
        &self,
        identity: &Claims,
        kind: RecordKind,
        body: Value,
    ) -> Result<(), StoreError> {
        let room = identity.room.as_str();
        let callsign = identity.callsign.as_str();

        let root = self
            .repository
            .get(RecordKind::Aircraft, room, callsign)
            .await?;

        // Mutating an owned entity: immutable fields first, then the
        // ownership decision.
        if let Some(root) = &root {
            self.policy.check_immutable_fields(root, &body)?;
            if !self.policy.can_mutate(identity, root) {
                return Err(StoreError::NotAuthorized(format!(
                    "{} does not own {}",
                    identity.username, root.entity
                )));
            }
        }

        // On an Aircraft create the owner is forced to the creating
        // identity, overriding any client-supplied value; on an update
        // the stored owner is carried forward untouched.
        let owner = if kind == RecordKind::Aircraft {
            match &root {
                Some(existing) => existing.owner.clone(),
                None => Some(identity.username.clone()),
            }
        } else {
            None
        };

        let record = StoredRecord {
            kind,
            room: room.to_owned(),
            entity: callsign.to_owned(),
            owner,
            body,
        };
        if root.is_none() && !self.policy.can_create(identity, &record) {
            return Err(StoreError::BadRequest("malformed record".into()));
        }
        self.repository.put(&record).await
    }

    // -----------------------------------------------------------------
    // Removal and fan-out
    // -----------------------------------------------------------------

    /// Removes one connection from the registry, performs its store
    /// cleanup, announces the leave, and returns any recipients found
    /// dead while announcing. The caller reaps those.
    async fn remove_connection(
        &self,
        id: ConnectionId,
        close: Option<(CloseCode, String)>,
    ) -> Vec<ConnectionId> {
        let (entry, departure) = {
            let mut registry = self.registry.lock().await;
            let Some(mut entry) = registry.connections.remove(&id) else {
                return Vec::new();
            };
            let departure = match entry.phase.claims().cloned() {
                Some(claims) => {
                    let emptied = match registry.rooms.get_mut(&claims.room) {
                        Some(members) => {
                            members.remove(&id);
                            members.is_empty()
                        }
                        None => false,
                    };
                    if emptied {
                        registry.rooms.remove(&claims.room);
                    }
                    let others = registry.others_in_room(&claims.room, id);
                    Some((claims, others, emptied))
                }
                None => None,
            };
            entry.phase.close();
            (entry, departure)
        };

        // Hand the close frame to the writer task, best effort. A full
        // queue means the writer is gone or hopeless; dropping the
        // sender ends it either way.
        if let Some((code, reason)) = close {
            let _ = entry
                .outbound
                .try_send(OutboundFrame::Close { code, reason });
        }

        let Some((claims, others, emptied)) = departure else {
            tracing::debug!(%id, "connection unregistered");
            return Vec::new();
        };

        tracing::info!(
            %id,
            room = %claims.room,
            callsign = %claims.callsign,
            "connection left room"
        );

        // Store cleanup outside the registry lock. The per-kind deletes
        // are idempotent, so a partial failure here leaves a state that
        // a later cleanup converges on.
        if let Err(e) = self
            .repository
            .delete_entity(&claims.room, &claims.callsign)
            .await
        {
            tracing::error!(
                room = %claims.room,
                callsign = %claims.callsign,
                error = %e,
                "failed to delete entity records"
            );
        }
        if emptied {
            if let Err(e) = self.repository.close_session(&claims.room).await {
                tracing::error!(room = %claims.room, error = %e, "failed to close session record");
            }
        }

        let event = SessionEvent::Remove {
            room: claims.room,
            callsign: claims.callsign,
        };
        match event.to_bytes() {
            Ok(bytes) => deliver(&others, &bytes),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode remove event");
                Vec::new()
            }
        }
    }

    /// Encodes and fans out a membership event, then reaps any
    /// recipients whose queues turned out dead.
    async fn announce(
        &self,
        event: SessionEvent,
        others: Vec<(ConnectionId, OutboundSender)>,
    ) {
        match event.to_bytes() {
            Ok(bytes) => {
                let dead = deliver(&others, &bytes);
                self.reap(dead).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to encode session event");
            }
        }
    }

    /// Unregisters dead recipients until none remain. Each removal may
    /// discover more dead queues while announcing the leave; the loop
    /// runs the cascade to quiescence without recursion.
    async fn reap(&self, mut dead: Vec<ConnectionId>) {
        while let Some(id) = dead.pop() {
            tracing::debug!(%id, "reaping dead recipient");
            let more = self.remove_connection(id, None).await;
            dead.extend(more);
        }
    }
}

/// Enqueues `bytes` to every recipient, without blocking. Returns the
/// connections whose queues were full or closed; a failed enqueue is
/// that recipient's disconnect, never an error for the sender.
fn deliver(
    others: &[(ConnectionId, OutboundSender)],
    bytes: &[u8],
) -> Vec<ConnectionId> {
    let mut dead = Vec::new();
    for (id, sender) in others {
        if sender
            .try_send(OutboundFrame::Data(bytes.to_vec()))
            .is_err()
        {
            tracing::debug!(%id, "outbound queue unavailable");
            dead.push(*id);
        }
    }
    dead
}
