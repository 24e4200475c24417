//! The connection orchestrator.
//!
//! A [`NetworkConnection`] is one peer's view of a session. The host owns
//! a room on the rendezvous server and a table of client slots; clients
//! punch through to the host by room id and talk only to it. Every
//! application frame a client sends is relayed by the host to the other
//! clients, so the topology is a star.
//!
//! Nothing happens in the background. The owner calls
//! [`receive`](NetworkConnection::receive) once per tick; that drains the
//! transport, advances the handshake and hands application payloads to the
//! caller's dispatcher in arrival order.

use std::time::Instant;

use relaynet_transport::{
    ControlPacketKind, Packet, PeerAddress, PunchFailure, Transport, TransportError,
    TransportEvent,
};

use crate::control::{ControlMessage, Direction};
use crate::role::{ClientPeer, HostPeers, ReconnectAttempt, Role};
use crate::{NetStatus, PlayerId, PlayerSet, RoomId, SessionConfig, SessionError};

/// One peer's connection to a session, as host or client.
///
/// Dropping it shuts the transport down: hosted rooms are unregistered and
/// every linked peer is told we left.
pub struct NetworkConnection<T: Transport> {
    config: SessionConfig,
    transport: T,
    rendezvous: PeerAddress,
    status: NetStatus,
    role: Role,
    player_id: Option<PlayerId>,
    /// Host: assigned by the rendezvous server. Clients keep theirs in
    /// [`ClientPeer`].
    assigned_room: Option<RoomId>,
    connected: PlayerSet,
    /// Frozen player count, set when the game starts.
    total_players: Option<u32>,
}

impl<T: Transport> NetworkConnection<T> {
    /// Starts hosting: registers with the rendezvous server and waits for
    /// a room id.
    ///
    /// # Errors
    /// [`SessionError::InvalidConfig`] if the config fails validation, or
    /// [`SessionError::Transport`] if the transport refuses the connect.
    pub fn host(config: SessionConfig, transport: T) -> Result<Self, SessionError> {
        config.validate()?;
        let role = Role::Host(HostPeers::new(config.max_num_players));
        let mut conn = Self::build(config, transport, role, Some(PlayerId::HOST));
        conn.transport.connect(&conn.rendezvous, conn.config.api_version)?;
        tracing::info!(
            max_players = conn.config.max_num_players,
            rendezvous = %conn.rendezvous,
            "hosting session"
        );
        Ok(conn)
    }

    /// Starts joining `room`: registers with the rendezvous server, then
    /// punches through to the room's host.
    ///
    /// # Errors
    /// Same as [`host`](Self::host).
    pub fn client(
        config: SessionConfig,
        room: impl Into<RoomId>,
        transport: T,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let room = room.into();
        tracing::info!(%room, "joining session");
        let role = Role::Client(ClientPeer::new(room));
        let mut conn = Self::build(config, transport, role, None);
        conn.transport.connect(&conn.rendezvous, conn.config.api_version)?;
        Ok(conn)
    }

    // The connection exists before the first transport call so that `Drop`
    // shuts the transport down if construction fails part way.
    fn build(
        config: SessionConfig,
        transport: T,
        role: Role,
        player_id: Option<PlayerId>,
    ) -> Self {
        Self {
            rendezvous: config.rendezvous_address(),
            config,
            transport,
            status: NetStatus::Pending,
            role,
            player_id,
            assigned_room: None,
            connected: PlayerSet::new(),
            total_players: None,
        }
    }

    // -----------------------------------------------------------------------
    // Public surface
    // -----------------------------------------------------------------------

    /// Sends an application payload to everyone else in the session.
    ///
    /// A host sends to every client; a client sends to the host, which
    /// relays to the other clients. Does nothing unless `Connected`.
    pub fn send(&mut self, data: &[u8]) {
        if self.status != NetStatus::Connected {
            tracing::trace!(status = %self.status, "send dropped while not connected");
            return;
        }
        match &self.role {
            Role::Host(peers) => {
                peers.broadcast(&mut self.transport, None, ControlPacketKind::Standard, data);
            }
            Role::Client(client) => {
                let Some(host) = &client.host else { return };
                if let Err(error) = self.transport.send_to(host, ControlPacketKind::Standard, data)
                {
                    tracing::debug!(%error, "send to host failed");
                }
            }
        }
    }

    /// Drives the connection. Call once per tick, even before connecting.
    ///
    /// Drains every packet the transport has buffered. Application payloads
    /// go to `dispatcher` in arrival order; control packets update the
    /// session and are never surfaced. Returns immediately when nothing is
    /// pending.
    pub fn receive(&mut self, mut dispatcher: impl FnMut(&[u8])) {
        self.check_timers();
        for packet in self.transport.poll() {
            if self.status.is_terminal() {
                tracing::trace!(from = %packet.from, status = %self.status, "dropping packet");
                continue;
            }
            if self.role.is_host() {
                self.host_packet(packet, &mut dispatcher);
            } else {
                self.client_packet(packet, &mut dispatcher);
            }
        }
    }

    /// Starts the game. Host only, once, after reaching `Connected`.
    ///
    /// Freezes [`total_players`](Self::total_players) at the host plus
    /// every occupied or reserved slot, and tells every
    /// client. From here on new players are turned away; only reconnects
    /// into reserved slots are accepted.
    ///
    /// # Errors
    /// [`SessionError::NotHost`], [`SessionError::NotConnected`] or
    /// [`SessionError::AlreadyStarted`]. Nothing changes on error.
    pub fn start_game(&mut self) -> Result<(), SessionError> {
        let Role::Host(peers) = &mut self.role else {
            return Err(SessionError::NotHost);
        };
        if self.status != NetStatus::Connected {
            return Err(SessionError::NotConnected);
        }
        if peers.started {
            return Err(SessionError::AlreadyStarted);
        }
        peers.started = true;
        // Reserved slots count: those players may still come back.
        let total_players = 1 + peers.filled();
        self.total_players = Some(total_players);
        let msg = ControlMessage::StartGame { total_players };
        peers.broadcast(&mut self.transport, None, msg.kind(), &msg.encode());
        tracing::info!(total_players, "game started");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn status(&self) -> NetStatus {
        self.status
    }

    /// `Some(P-0)` for a host from the start; `None` for a client until the
    /// host assigns an id.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    /// The room this connection belongs to. A host has none until the
    /// rendezvous server assigns one.
    pub fn room_id(&self) -> Option<&RoomId> {
        match &self.role {
            Role::Host(_) => self.assigned_room.as_ref(),
            Role::Client(client) => Some(&client.room),
        }
    }

    /// Players currently connected, host included.
    pub fn num_players(&self) -> u32 {
        self.connected.len()
    }

    /// Players present when the game started; equals
    /// [`num_players`](Self::num_players) before that.
    pub fn total_players(&self) -> u32 {
        self.total_players.unwrap_or_else(|| self.num_players())
    }

    pub fn is_player_connected(&self, id: PlayerId) -> bool {
        self.connected.contains(id)
    }

    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }

    /// Whether the host has started the game.
    pub fn game_started(&self) -> bool {
        self.total_players.is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// This endpoint's own transport address.
    pub fn local_address(&self) -> PeerAddress {
        self.transport.local_address()
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    fn set_status(&mut self, next: NetStatus) {
        if self.status == next {
            return;
        }
        tracing::info!(from = %self.status, to = %next, "status changed");
        self.status = next;
    }

    fn send_control(&mut self, to: &PeerAddress, msg: &ControlMessage) {
        if let Err(error) = self.transport.send_to(to, msg.kind(), &msg.encode()) {
            tracing::debug!(peer = %to, kind = %msg.kind(), %error, "control send failed");
        }
    }

    /// Expires host reservations and enforces the client's reconnect
    /// deadline.
    fn check_timers(&mut self) {
        let grace = self.config.reconnect_grace();
        match &mut self.role {
            Role::Host(peers) => {
                for player_id in peers.expire_reservations(grace) {
                    tracing::info!(%player_id, "reconnect grace elapsed, slot released");
                }
            }
            Role::Client(client) => {
                let expired = self.status == NetStatus::Reconnecting
                    && client
                        .reconnect
                        .is_some_and(|attempt| attempt.since.elapsed() >= grace);
                if expired {
                    tracing::info!("reconnect grace elapsed");
                    self.give_up_reconnecting();
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Host
    // -----------------------------------------------------------------------

    fn host_packet<F: FnMut(&[u8])>(&mut self, packet: Packet, dispatcher: &mut F) {
        let Packet { from, event } = packet;
        if from == self.rendezvous {
            self.host_rendezvous_event(event);
            return;
        }
        match event {
            TransportEvent::Frame {
                kind: ControlPacketKind::Standard,
                payload,
            } => self.host_relay(&from, &payload, dispatcher),
            TransportEvent::Frame { kind, payload } => {
                match ControlMessage::decode(kind, &payload, Direction::ToHost) {
                    Ok(ControlMessage::JoinRequest(room)) => self.host_join(from, &room),
                    Ok(ControlMessage::ReconnectRequest { player_id, room }) => {
                        self.host_reconnect(from, player_id, &room);
                    }
                    Ok(other) => {
                        tracing::debug!(peer = %from, ?other, "ignoring control packet");
                    }
                    Err(error) => tracing::warn!(peer = %from, %error, "bad control packet"),
                }
            }
            TransportEvent::IncomingConnection => {
                tracing::debug!(peer = %from, "peer connected, awaiting join");
            }
            TransportEvent::Disconnected => self.host_peer_gone(&from, false),
            TransportEvent::ConnectionLost => self.host_peer_gone(&from, true),
            other => tracing::trace!(peer = %from, ?other, "ignoring peer event"),
        }
    }

    fn host_rendezvous_event(&mut self, event: TransportEvent) {
        let pending = self.status == NetStatus::Pending;
        match event {
            TransportEvent::ConnectionAccepted if pending => {
                let result = self.transport.send_to(
                    &self.rendezvous,
                    ControlPacketKind::AssignedRoom,
                    &[],
                );
                if let Err(error) = result {
                    tracing::warn!(%error, "room request failed");
                    self.set_status(NetStatus::GenericError);
                }
            }
            TransportEvent::Frame {
                kind: ControlPacketKind::AssignedRoom,
                payload,
            } => {
                let kind = ControlPacketKind::AssignedRoom;
                match ControlMessage::decode(kind, &payload, Direction::ToHost) {
                    Ok(ControlMessage::AssignedRoom(room)) if self.assigned_room.is_none() => {
                        tracing::info!(%room, "room assigned");
                        self.assigned_room = Some(room);
                        self.connected.insert(PlayerId::HOST);
                        self.set_status(NetStatus::Connected);
                    }
                    Ok(_) => tracing::warn!("ignoring second room assignment"),
                    Err(error) => {
                        tracing::warn!(%error, "bad room assignment");
                        self.set_status(NetStatus::GenericError);
                    }
                }
            }
            TransportEvent::IncompatibleVersion => {
                tracing::warn!(
                    api_version = self.config.api_version,
                    "rendezvous rejected api version"
                );
                self.set_status(NetStatus::ApiMismatch);
            }
            TransportEvent::ConnectionFailed
            | TransportEvent::Disconnected
            | TransportEvent::ConnectionLost
                if pending =>
            {
                tracing::warn!("rendezvous registration failed");
                self.set_status(NetStatus::GenericError);
            }
            TransportEvent::Disconnected | TransportEvent::ConnectionLost => {
                tracing::warn!("lost rendezvous server, room no longer discoverable");
            }
            other => tracing::trace!(?other, "ignoring rendezvous event"),
        }
    }

    /// Hands a client's payload to the host application, then forwards it
    /// to every other client.
    fn host_relay<F: FnMut(&[u8])>(
        &mut self,
        from: &PeerAddress,
        payload: &[u8],
        dispatcher: &mut F,
    ) {
        let Role::Host(peers) = &self.role else { return };
        let Some(sender) = peers.player_at(from) else {
            tracing::debug!(peer = %from, "dropping frame from peer without a slot");
            return;
        };
        dispatcher(payload);
        peers.broadcast(
            &mut self.transport,
            Some(sender),
            ControlPacketKind::Standard,
            payload,
        );
    }

    fn host_join(&mut self, from: PeerAddress, room: &RoomId) {
        let Role::Host(peers) = &mut self.role else { return };
        if let Some(player_id) = peers.player_at(&from) {
            tracing::debug!(%player_id, "duplicate join ignored");
            return;
        }
        let right_room = self.assigned_room.as_ref() == Some(room);
        let slot = if peers.started || !right_room {
            None
        } else {
            peers.first_open()
        };
        let Some(player_id) = slot else {
            tracing::info!(
                peer = %from,
                started = peers.started,
                right_room,
                "join rejected"
            );
            self.reject(&from);
            return;
        };

        peers.occupy(player_id, from.clone());
        self.connected.insert(player_id);
        let accept = ControlMessage::JoinAccepted {
            player_id,
            connected: self.connected,
        };
        self.send_control(&from, &accept);
        self.announce(player_id, ControlMessage::PlayerJoined(player_id));
        tracing::info!(%player_id, peer = %from, "player joined");
    }

    fn host_reconnect(&mut self, from: PeerAddress, player_id: PlayerId, room: &RoomId) {
        let Role::Host(peers) = &mut self.role else { return };
        if let Some(current) = peers.player_at(&from) {
            tracing::debug!(%player_id, %current, "reconnect from seated peer ignored");
            return;
        }
        let right_room = self.assigned_room.as_ref() == Some(room);
        if !right_room || !peers.is_reserved(player_id) {
            tracing::info!(%player_id, peer = %from, right_room, "reconnect rejected");
            self.reject(&from);
            return;
        }

        peers.occupy(player_id, from.clone());
        self.connected.insert(player_id);
        let accept = ControlMessage::ReconnectAccepted {
            player_id,
            connected: self.connected,
        };
        self.send_control(&from, &accept);
        if let Some(total_players) = self.total_players {
            self.send_control(&from, &ControlMessage::StartGame { total_players });
        }
        self.announce(player_id, ControlMessage::PlayerJoined(player_id));
        tracing::info!(%player_id, peer = %from, "player reconnected");
    }

    /// A client's link closed. A lost link keeps the slot reserved for the
    /// grace period; a deliberate disconnect frees it.
    fn host_peer_gone(&mut self, from: &PeerAddress, lost: bool) {
        let Role::Host(peers) = &mut self.role else { return };
        let Some(player_id) = peers.player_at(from) else { return };
        if lost {
            peers.reserve(player_id, Instant::now());
            tracing::info!(%player_id, "player link lost, slot reserved");
        } else {
            peers.release(player_id);
            tracing::info!(%player_id, "player left");
        }
        self.connected.remove(player_id);
        self.announce(player_id, ControlMessage::PlayerLeft(player_id));
    }

    /// Broadcasts `msg` to every client except `about`.
    fn announce(&mut self, about: PlayerId, msg: ControlMessage) {
        if let Role::Host(peers) = &self.role {
            peers.broadcast(&mut self.transport, Some(about), msg.kind(), &msg.encode());
        }
    }

    fn reject(&mut self, peer: &PeerAddress) {
        self.send_control(peer, &ControlMessage::JoinRoomFail);
        self.transport.disconnect(peer);
    }

    // -----------------------------------------------------------------------
    // Client
    // -----------------------------------------------------------------------

    fn client_packet<F: FnMut(&[u8])>(&mut self, packet: Packet, dispatcher: &mut F) {
        let Packet { from, event } = packet;
        let Role::Client(client) = &self.role else { return };
        let from_host = client.is_host(&from);
        let from_rendezvous = from == self.rendezvous;

        match event {
            TransportEvent::PunchSucceeded => self.client_punched(from),
            TransportEvent::PunchFailed(reason) => self.client_punch_failed(reason),
            TransportEvent::IncompatibleVersion => {
                tracing::warn!(
                    peer = %from,
                    api_version = self.config.api_version,
                    "api version mismatch"
                );
                self.set_status(NetStatus::ApiMismatch);
            }
            TransportEvent::ConnectionAccepted if from_rendezvous => self.client_punch(),
            TransportEvent::ConnectionAccepted if from_host => self.client_greet_host(from),
            TransportEvent::ConnectionFailed => {
                tracing::debug!(peer = %from, "connection attempt failed");
                self.client_attempt_failed();
            }
            TransportEvent::Frame {
                kind: ControlPacketKind::Standard,
                payload,
            } if from_host => {
                if self.status == NetStatus::Connected {
                    dispatcher(&payload);
                }
            }
            TransportEvent::Frame { kind, payload } if from_host => {
                match ControlMessage::decode(kind, &payload, Direction::ToClient) {
                    Ok(msg) => self.client_control(msg),
                    Err(error) => tracing::warn!(%error, "bad control packet from host"),
                }
            }
            TransportEvent::Disconnected if from_host => {
                tracing::info!("host closed the session");
                self.set_status(NetStatus::GenericError);
            }
            TransportEvent::ConnectionLost if from_host => self.client_host_lost(),
            TransportEvent::Disconnected | TransportEvent::ConnectionLost if from_rendezvous => {
                if self.status == NetStatus::Pending {
                    tracing::warn!("lost rendezvous server while joining");
                    self.set_status(NetStatus::GenericError);
                }
            }
            other => tracing::trace!(peer = %from, ?other, "ignoring event"),
        }
    }

    fn client_room(&self) -> Option<&RoomId> {
        match &self.role {
            Role::Client(client) => Some(&client.room),
            Role::Host(_) => None,
        }
    }

    /// Asks the rendezvous server to punch through to our room's host.
    ///
    /// If the rendezvous link is gone, registers again instead; the punch
    /// follows once the server accepts.
    fn client_punch(&mut self) {
        let Role::Client(client) = &self.role else { return };
        let result = self
            .transport
            .resolve_and_punch(&self.rendezvous, client.room.as_str());
        let result = match result {
            Err(TransportError::NotConnected(_)) => {
                tracing::debug!("not registered with rendezvous, reconnecting to it");
                self.transport.connect(&self.rendezvous, self.config.api_version)
            }
            other => other,
        };
        if let Err(error) = result {
            tracing::warn!(%error, "punchthrough request failed");
            self.client_attempt_failed();
        }
    }

    fn client_punched(&mut self, host: PeerAddress) {
        let Role::Client(client) = &mut self.role else { return };
        tracing::debug!(%host, "punchthrough succeeded");
        client.host = Some(host.clone());
        if let Err(error) = self.transport.connect(&host, self.config.api_version) {
            tracing::warn!(%error, "connect to host failed");
            self.client_attempt_failed();
        }
    }

    fn client_punch_failed(&mut self, reason: PunchFailure) {
        tracing::info!(?reason, status = %self.status, "punchthrough failed");
        match (self.status, reason) {
            (NetStatus::Pending, PunchFailure::TargetNotConnected) => {
                self.set_status(NetStatus::RoomNotFound);
            }
            (NetStatus::Reconnecting, PunchFailure::TargetNotConnected) => {
                self.give_up_reconnecting();
            }
            _ => self.client_attempt_failed(),
        }
    }

    /// Link to the host is up; ask for a slot.
    fn client_greet_host(&mut self, host: PeerAddress) {
        let Some(room) = self.client_room().cloned() else { return };
        let msg = match (self.status, self.player_id) {
            (NetStatus::Reconnecting, Some(player_id)) => {
                ControlMessage::ReconnectRequest { player_id, room }
            }
            _ => ControlMessage::JoinRequest(room),
        };
        self.send_control(&host, &msg);
    }

    fn client_control(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::JoinAccepted {
                player_id,
                connected,
            } if self.status == NetStatus::Pending => {
                tracing::info!(%player_id, "joined room");
                self.player_id = Some(player_id);
                self.connected = connected;
                self.set_status(NetStatus::Connected);
            }
            ControlMessage::ReconnectAccepted {
                player_id,
                connected,
            } if self.status == NetStatus::Reconnecting => {
                if self.player_id != Some(player_id) {
                    tracing::warn!(%player_id, "host restored a different player id");
                    self.give_up_reconnecting();
                    return;
                }
                if let Role::Client(client) = &mut self.role {
                    client.reconnect = None;
                }
                tracing::info!(%player_id, "reconnected");
                self.connected = connected;
                self.set_status(NetStatus::Connected);
            }
            ControlMessage::JoinRoomFail => match self.status {
                NetStatus::Reconnecting => {
                    tracing::info!("host refused reconnect");
                    self.give_up_reconnecting();
                }
                NetStatus::Pending => self.set_status(NetStatus::RoomFull),
                status => tracing::debug!(%status, "ignoring join refusal"),
            },
            ControlMessage::PlayerJoined(player_id) => {
                tracing::debug!(%player_id, "player joined");
                self.connected.insert(player_id);
            }
            ControlMessage::PlayerLeft(player_id) => {
                tracing::debug!(%player_id, "player left");
                self.connected.remove(player_id);
            }
            ControlMessage::StartGame { total_players } => {
                tracing::info!(total_players, "game started");
                self.total_players = Some(total_players);
            }
            other => tracing::debug!(?other, status = %self.status, "ignoring control packet"),
        }
    }

    /// The host link dropped without a goodbye.
    fn client_host_lost(&mut self) {
        match self.status {
            NetStatus::Connected => {
                tracing::info!("lost host, reconnecting");
                if let Role::Client(client) = &mut self.role {
                    client.reconnect = Some(ReconnectAttempt {
                        since: Instant::now(),
                        attempts: 0,
                    });
                }
                self.connected.clear();
                self.set_status(NetStatus::Reconnecting);
                self.client_retry();
            }
            NetStatus::Reconnecting => self.client_attempt_failed(),
            _ => self.set_status(NetStatus::GenericError),
        }
    }

    /// A step of the handshake failed. Fatal while joining; costs one
    /// attempt while reconnecting.
    fn client_attempt_failed(&mut self) {
        match self.status {
            NetStatus::Pending => self.set_status(NetStatus::GenericError),
            NetStatus::Reconnecting => self.client_retry(),
            _ => {}
        }
    }

    /// Starts the next reconnect attempt, or gives up once the attempts
    /// run out.
    fn client_retry(&mut self) {
        let max = self.config.max_reconnect_attempts;
        let Role::Client(client) = &mut self.role else { return };
        let Some(attempt) = client.reconnect.as_mut() else { return };
        if attempt.attempts >= max {
            tracing::info!(attempts = attempt.attempts, "reconnect attempts exhausted");
            self.give_up_reconnecting();
            return;
        }
        attempt.attempts += 1;
        tracing::debug!(attempt = attempt.attempts, max, "reconnect attempt");

        self.client_punch();
    }

    fn give_up_reconnecting(&mut self) {
        if let Role::Client(client) = &mut self.role {
            client.reconnect = None;
            if let Some(host) = client.host.take() {
                self.transport.disconnect(&host);
            }
        }
        self.connected.clear();
        self.set_status(NetStatus::Disconnected);
    }
}

impl<T: Transport> Drop for NetworkConnection<T> {
    fn drop(&mut self) {
        tracing::debug!(status = %self.status, "shutting down connection");
        self.transport.shutdown();
    }
}

// =========================================================================
// Tests
// =========================================================================
