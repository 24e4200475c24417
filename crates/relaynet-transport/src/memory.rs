//! In-process network: a simulated rendezvous server plus any number of
//! peer endpoints, all sharing one piece of state.
//!
//! Nothing here touches a socket. Every operation completes immediately and
//! queues its outcome in the target endpoint's inbox, which is drained by
//! [`Transport::poll`]. That keeps the asynchronous shape of a real NAT
//! punchthrough stack (results show up on a later poll) while staying fully
//! deterministic for tests.
//!
//! The network is single-threaded (`Rc<RefCell<_>>`), matching the
//! cooperative polling model of the session layer.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use rand::Rng;

use crate::{
    ControlPacketKind, Packet, PeerAddress, PunchFailure, Transport,
    TransportError, TransportEvent,
};

/// Port the public punchthrough servers listen on.
pub const DEFAULT_RENDEZVOUS_PORT: u16 = 61111;

/// Port every simulated peer endpoint reports.
const PEER_PORT: u16 = 7777;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Endpoint {
    /// Set by the endpoint's most recent `connect` call.
    api_version: Option<u8>,
    inbox: VecDeque<Packet>,
    links: BTreeSet<PeerAddress>,
    /// Punch attempts targeting this endpoint time out.
    unresponsive: bool,
    closed: bool,
}

#[derive(Debug)]
struct NetworkState {
    rendezvous: PeerAddress,
    min_api_version: u8,
    next_endpoint: u32,
    /// Endpoints with an open link to the rendezvous server.
    registered: HashSet<PeerAddress>,
    /// Room id → hosting endpoint.
    rooms: HashMap<String, PeerAddress>,
    endpoints: HashMap<PeerAddress, Endpoint>,
}

impl NetworkState {
    /// Queues `event` for `to`. Closed or unknown endpoints drop it.
    fn deliver(&mut self, to: &PeerAddress, from: &PeerAddress, event: TransportEvent) {
        match self.endpoints.get_mut(to) {
            Some(ep) if !ep.closed => ep.inbox.push_back(Packet {
                from: from.clone(),
                event,
            }),
            _ => tracing::trace!(%to, %from, "dropping event for closed endpoint"),
        }
    }

    fn is_open(&self, addr: &PeerAddress) -> bool {
        self.endpoints.get(addr).is_some_and(|ep| !ep.closed)
    }

    fn ensure_open(&self, addr: &PeerAddress) -> Result<(), TransportError> {
        if self.is_open(addr) {
            Ok(())
        } else {
            Err(TransportError::Shutdown)
        }
    }

    fn linked(&self, a: &PeerAddress, b: &PeerAddress) -> bool {
        self.endpoints.get(a).is_some_and(|ep| ep.links.contains(b))
    }

    fn link(&mut self, a: &PeerAddress, b: &PeerAddress) {
        if let Some(ep) = self.endpoints.get_mut(a) {
            ep.links.insert(b.clone());
        }
        if let Some(ep) = self.endpoints.get_mut(b) {
            ep.links.insert(a.clone());
        }
    }

    /// Removes the link in both directions. Returns whether it existed.
    fn unlink(&mut self, a: &PeerAddress, b: &PeerAddress) -> bool {
        let mut existed = false;
        if let Some(ep) = self.endpoints.get_mut(a) {
            existed |= ep.links.remove(b);
        }
        if let Some(ep) = self.endpoints.get_mut(b) {
            existed |= ep.links.remove(a);
        }
        existed
    }

    /// Drops `addr`'s registration and every room it hosts.
    fn unregister(&mut self, addr: &PeerAddress) -> bool {
        self.rooms.retain(|_, host| host != addr);
        self.registered.remove(addr)
    }
}

// ---------------------------------------------------------------------------
// MemoryNetwork
// ---------------------------------------------------------------------------

/// Handle to a simulated network. Cloning it shares the same network.
///
/// ```
/// use relaynet_transport::{MemoryNetwork, Transport};
///
/// let net = MemoryNetwork::new();
/// let mut host = net.endpoint();
/// host.connect(&net.rendezvous_address(), 0).unwrap();
/// assert_eq!(host.poll().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl MemoryNetwork {
    /// A network whose rendezvous server is `127.0.0.1:61111` and accepts
    /// every api version.
    pub fn new() -> Self {
        Self::with_rendezvous("127.0.0.1", DEFAULT_RENDEZVOUS_PORT)
    }

    /// A network whose rendezvous server lives at `host:port`.
    pub fn with_rendezvous(host: &str, port: u16) -> Self {
        let state = NetworkState {
            rendezvous: PeerAddress::new(host, port),
            min_api_version: 0,
            next_endpoint: 1,
            registered: HashSet::new(),
            rooms: HashMap::new(),
            endpoints: HashMap::new(),
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Makes the rendezvous server reject api versions below `version`.
    pub fn with_min_api_version(self, version: u8) -> Self {
        self.state.borrow_mut().min_api_version = version;
        self
    }

    /// Address of the simulated rendezvous server.
    pub fn rendezvous_address(&self) -> PeerAddress {
        self.state.borrow().rendezvous.clone()
    }

    /// Creates a new endpoint with a fresh address.
    pub fn endpoint(&self) -> MemoryTransport {
        let mut state = self.state.borrow_mut();
        let n = state.next_endpoint;
        state.next_endpoint += 1;
        let address = PeerAddress::new(&format!("10.0.{}.{}", n / 256, n % 256), PEER_PORT);
        state.endpoints.insert(address.clone(), Endpoint::default());
        MemoryTransport {
            address,
            state: Rc::clone(&self.state),
        }
    }

    /// Severs the link between `a` and `b` without a goodbye. Both sides
    /// see `ConnectionLost`.
    ///
    /// Passing the rendezvous address for `b` drops `a`'s registration
    /// (and any room it hosts) instead.
    pub fn drop_link(&self, a: &PeerAddress, b: &PeerAddress) {
        let mut state = self.state.borrow_mut();
        let rendezvous = state.rendezvous.clone();
        let existed = if *b == rendezvous {
            state.unregister(a)
        } else {
            state.unlink(a, b)
        };
        if !existed {
            return;
        }
        tracing::debug!(%a, %b, "link dropped");
        state.deliver(a, b, TransportEvent::ConnectionLost);
        if *b != rendezvous {
            state.deliver(b, a, TransportEvent::ConnectionLost);
        }
    }

    /// Makes punch attempts toward `addr` fail with `TargetUnresponsive`.
    pub fn set_unresponsive(&self, addr: &PeerAddress, unresponsive: bool) {
        if let Some(ep) = self.state.borrow_mut().endpoints.get_mut(addr) {
            ep.unresponsive = unresponsive;
        }
    }

    /// Endpoint currently hosting `room`, if any.
    pub fn room_host(&self, room: &str) -> Option<PeerAddress> {
        self.state.borrow().rooms.get(room).cloned()
    }

    /// Whether `a` and `b` share an open link.
    pub fn is_linked(&self, a: &PeerAddress, b: &PeerAddress) -> bool {
        self.state.borrow().linked(a, b)
    }

    /// Whether `addr` is registered with the rendezvous server.
    pub fn is_registered(&self, addr: &PeerAddress) -> bool {
        self.state.borrow().registered.contains(addr)
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// One endpoint on a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryTransport {
    address: PeerAddress,
    state: Rc<RefCell<NetworkState>>,
}

impl Transport for MemoryTransport {
    fn local_address(&self) -> PeerAddress {
        self.address.clone()
    }

    fn connect(
        &mut self,
        address: &PeerAddress,
        api_version: u8,
    ) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open(&self.address)?;
        if let Some(ep) = state.endpoints.get_mut(&self.address) {
            ep.api_version = Some(api_version);
        }

        if *address == state.rendezvous {
            let event = if api_version < state.min_api_version {
                tracing::debug!(
                    peer = %self.address,
                    api_version,
                    min = state.min_api_version,
                    "rendezvous rejected api version"
                );
                TransportEvent::IncompatibleVersion
            } else {
                state.registered.insert(self.address.clone());
                TransportEvent::ConnectionAccepted
            };
            state.deliver(&self.address, address, event);
            return Ok(());
        }

        let target_version = match state.endpoints.get(address) {
            Some(ep) if !ep.closed => ep.api_version,
            _ => {
                state.deliver(&self.address, address, TransportEvent::ConnectionFailed);
                return Ok(());
            }
        };
        if target_version.is_some_and(|v| v != api_version) {
            state.deliver(&self.address, address, TransportEvent::IncompatibleVersion);
            return Ok(());
        }

        state.link(&self.address, address);
        state.deliver(&self.address, address, TransportEvent::ConnectionAccepted);
        state.deliver(address, &self.address, TransportEvent::IncomingConnection);
        Ok(())
    }

    fn poll(&mut self) -> Vec<Packet> {
        self.state
            .borrow_mut()
            .endpoints
            .get_mut(&self.address)
            .map(|ep| ep.inbox.drain(..).collect())
            .unwrap_or_default()
    }

    fn send_to(
        &mut self,
        to: &PeerAddress,
        kind: ControlPacketKind,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open(&self.address)?;

        if *to == state.rendezvous {
            if !state.registered.contains(&self.address) {
                return Err(TransportError::NotConnected(to.clone()));
            }
            if kind == ControlPacketKind::AssignedRoom {
                // Room ids are the decimal form of a random 64-bit id.
                let room = rand::rng().random::<u64>().to_string();
                state.rooms.insert(room.clone(), self.address.clone());
                tracing::debug!(host = %self.address, %room, "rendezvous assigned room");
                state.deliver(
                    &self.address,
                    to,
                    TransportEvent::Frame {
                        kind,
                        payload: room.into_bytes(),
                    },
                );
            } else {
                tracing::debug!(%kind, "rendezvous ignored frame");
            }
            return Ok(());
        }

        if !state.linked(&self.address, to) {
            return Err(TransportError::NotConnected(to.clone()));
        }
        state.deliver(
            to,
            &self.address,
            TransportEvent::Frame {
                kind,
                payload: payload.to_vec(),
            },
        );
        Ok(())
    }

    fn resolve_and_punch(
        &mut self,
        rendezvous: &PeerAddress,
        room: &str,
    ) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open(&self.address)?;
        if *rendezvous != state.rendezvous {
            return Err(TransportError::UnknownPeer(rendezvous.clone()));
        }
        if !state.registered.contains(&self.address) {
            return Err(TransportError::NotConnected(rendezvous.clone()));
        }

        let (from, event) = match state.rooms.get(room).cloned() {
            Some(host) => {
                let responsive = state
                    .endpoints
                    .get(&host)
                    .is_some_and(|ep| !ep.closed && !ep.unresponsive);
                let event = if responsive {
                    TransportEvent::PunchSucceeded
                } else {
                    TransportEvent::PunchFailed(PunchFailure::TargetUnresponsive)
                };
                (host, event)
            }
            None => (
                rendezvous.clone(),
                TransportEvent::PunchFailed(PunchFailure::TargetNotConnected),
            ),
        };
        tracing::debug!(peer = %self.address, %room, ?event, "punchthrough");
        state.deliver(&self.address, &from, event);
        Ok(())
    }

    fn disconnect(&mut self, peer: &PeerAddress) {
        let mut state = self.state.borrow_mut();
        if *peer == state.rendezvous {
            state.unregister(&self.address);
            return;
        }
        if state.unlink(&self.address, peer) {
            state.deliver(peer, &self.address, TransportEvent::Disconnected);
        }
    }

    fn shutdown(&mut self) {
        let mut state = self.state.borrow_mut();
        if !state.is_open(&self.address) {
            return;
        }
        state.unregister(&self.address);

        let links: Vec<PeerAddress> = state
            .endpoints
            .get(&self.address)
            .map(|ep| ep.links.iter().cloned().collect())
            .unwrap_or_default();
        for peer in &links {
            state.unlink(&self.address, peer);
            state.deliver(peer, &self.address, TransportEvent::Disconnected);
        }

        if let Some(ep) = state.endpoints.get_mut(&self.address) {
            ep.closed = true;
            ep.inbox.clear();
        }
        tracing::debug!(peer = %self.address, links = links.len(), "endpoint shut down");
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn events(t: &mut MemoryTransport) -> Vec<TransportEvent> {
        t.poll().into_iter().map(|p| p.event).collect()
    }

    /// Registers `t` with the rendezvous server and drains the accept.
    fn register(net: &MemoryNetwork, t: &mut MemoryTransport, api: u8) {
        t.connect(&net.rendezvous_address(), api).unwrap();
        assert_eq!(events(t), vec![TransportEvent::ConnectionAccepted]);
    }

    /// Registers `t` and has it request a room. Returns the room id.
    fn host_room(net: &MemoryNetwork, t: &mut MemoryTransport) -> String {
        register(net, t, 0);
        t.send_to(&net.rendezvous_address(), ControlPacketKind::AssignedRoom, &[])
            .unwrap();
        match t.poll().pop().map(|p| p.event) {
            Some(TransportEvent::Frame { payload, .. }) => String::from_utf8(payload).unwrap(),
            other => panic!("expected room frame, got {other:?}"),
        }
    }

    // -- endpoints --------------------------------------------------------

    #[test]
    fn test_endpoint_addresses_are_distinct() {
        let net = MemoryNetwork::new();
        let a = net.endpoint();
        let b = net.endpoint();
        assert_ne!(a.local_address(), b.local_address());
    }

    #[test]
    fn test_poll_empty_inbox_returns_nothing() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        assert!(a.poll().is_empty());
    }

    // -- rendezvous -------------------------------------------------------

    #[test]
    fn test_connect_rendezvous_registers() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        register(&net, &mut a, 0);
        assert!(net.is_registered(&a.local_address()));
    }

    #[test]
    fn test_connect_rendezvous_below_min_version_rejected() {
        let net = MemoryNetwork::new().with_min_api_version(3);
        let mut a = net.endpoint();
        a.connect(&net.rendezvous_address(), 2).unwrap();
        assert_eq!(events(&mut a), vec![TransportEvent::IncompatibleVersion]);
        assert!(!net.is_registered(&a.local_address()));
    }

    #[test]
    fn test_assigned_room_request_returns_numeric_room() {
        let net = MemoryNetwork::new();
        let mut host = net.endpoint();
        let room = host_room(&net, &mut host);
        assert!(room.parse::<u64>().is_ok());
        assert_eq!(net.room_host(&room), Some(host.local_address()));
    }

    #[test]
    fn test_send_to_rendezvous_unregistered_fails() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        let result = a.send_to(&net.rendezvous_address(), ControlPacketKind::AssignedRoom, &[]);
        assert!(matches!(result, Err(TransportError::NotConnected(_))));
    }

    // -- punchthrough -----------------------------------------------------

    #[test]
    fn test_punch_known_room_succeeds_from_host() {
        let net = MemoryNetwork::new();
        let mut host = net.endpoint();
        let room = host_room(&net, &mut host);
        let mut client = net.endpoint();
        register(&net, &mut client, 0);

        client.resolve_and_punch(&net.rendezvous_address(), &room).unwrap();
        let packets = client.poll();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].from, host.local_address());
        assert_eq!(packets[0].event, TransportEvent::PunchSucceeded);
    }

    #[test]
    fn test_punch_unknown_room_target_not_connected() {
        let net = MemoryNetwork::new();
        let mut client = net.endpoint();
        register(&net, &mut client, 0);
        client.resolve_and_punch(&net.rendezvous_address(), "12345").unwrap();
        assert_eq!(
            events(&mut client),
            vec![TransportEvent::PunchFailed(PunchFailure::TargetNotConnected)]
        );
    }

    #[test]
    fn test_punch_unresponsive_host_fails() {
        let net = MemoryNetwork::new();
        let mut host = net.endpoint();
        let room = host_room(&net, &mut host);
        net.set_unresponsive(&host.local_address(), true);
        let mut client = net.endpoint();
        register(&net, &mut client, 0);

        client.resolve_and_punch(&net.rendezvous_address(), &room).unwrap();
        assert_eq!(
            events(&mut client),
            vec![TransportEvent::PunchFailed(PunchFailure::TargetUnresponsive)]
        );
    }

    #[test]
    fn test_punch_without_registration_errors() {
        let net = MemoryNetwork::new();
        let mut client = net.endpoint();
        let result = client.resolve_and_punch(&net.rendezvous_address(), "1");
        assert!(matches!(result, Err(TransportError::NotConnected(_))));
    }

    // -- peer links -------------------------------------------------------

    #[test]
    fn test_connect_peer_notifies_both_sides() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        let mut b = net.endpoint();
        a.connect(&b.local_address(), 0).unwrap();

        assert_eq!(events(&mut a), vec![TransportEvent::ConnectionAccepted]);
        let incoming = b.poll();
        assert_eq!(incoming[0].from, a.local_address());
        assert_eq!(incoming[0].event, TransportEvent::IncomingConnection);
        assert!(net.is_linked(&a.local_address(), &b.local_address()));
    }

    #[test]
    fn test_connect_peer_version_mismatch() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        let mut b = net.endpoint();
        b.connect(&net.rendezvous_address(), 2).unwrap();
        a.connect(&b.local_address(), 1).unwrap();
        assert_eq!(events(&mut a), vec![TransportEvent::IncompatibleVersion]);
        assert!(!net.is_linked(&a.local_address(), &b.local_address()));
    }

    #[test]
    fn test_connect_closed_peer_fails() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        let mut b = net.endpoint();
        b.shutdown();
        a.connect(&b.local_address(), 0).unwrap();
        assert_eq!(events(&mut a), vec![TransportEvent::ConnectionFailed]);
    }

    #[test]
    fn test_send_to_linked_peer_preserves_order() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        let mut b = net.endpoint();
        a.connect(&b.local_address(), 0).unwrap();
        b.poll();

        a.send_to(&b.local_address(), ControlPacketKind::Standard, b"one").unwrap();
        a.send_to(&b.local_address(), ControlPacketKind::StartGame, &[2]).unwrap();
        assert_eq!(
            events(&mut b),
            vec![
                TransportEvent::Frame {
                    kind: ControlPacketKind::Standard,
                    payload: b"one".to_vec(),
                },
                TransportEvent::Frame {
                    kind: ControlPacketKind::StartGame,
                    payload: vec![2],
                },
            ]
        );
    }

    #[test]
    fn test_send_to_unlinked_peer_fails() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        let b = net.endpoint();
        let result = a.send_to(&b.local_address(), ControlPacketKind::Standard, b"x");
        assert!(matches!(result, Err(TransportError::NotConnected(_))));
    }

    #[test]
    fn test_disconnect_notifies_peer() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        let mut b = net.endpoint();
        a.connect(&b.local_address(), 0).unwrap();
        b.poll();

        a.disconnect(&b.local_address());
        assert_eq!(events(&mut b), vec![TransportEvent::Disconnected]);
        assert!(!net.is_linked(&a.local_address(), &b.local_address()));
    }

    #[test]
    fn test_drop_link_reports_lost_to_both() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        let mut b = net.endpoint();
        a.connect(&b.local_address(), 0).unwrap();
        a.poll();
        b.poll();

        net.drop_link(&a.local_address(), &b.local_address());
        assert_eq!(events(&mut a), vec![TransportEvent::ConnectionLost]);
        assert_eq!(events(&mut b), vec![TransportEvent::ConnectionLost]);
    }

    #[test]
    fn test_drop_link_unlinked_is_noop() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        let b = net.endpoint();
        net.drop_link(&a.local_address(), &b.local_address());
        assert!(a.poll().is_empty());
    }

    // -- shutdown ---------------------------------------------------------

    #[test]
    fn test_shutdown_releases_room_and_notifies_links() {
        let net = MemoryNetwork::new();
        let mut host = net.endpoint();
        let room = host_room(&net, &mut host);
        let mut client = net.endpoint();
        client.connect(&host.local_address(), 0).unwrap();
        client.poll();

        host.shutdown();
        assert_eq!(net.room_host(&room), None);
        assert!(!net.is_registered(&host.local_address()));
        assert_eq!(events(&mut client), vec![TransportEvent::Disconnected]);
    }

    #[test]
    fn test_shutdown_twice_is_noop() {
        let net = MemoryNetwork::new();
        let mut a = net.endpoint();
        a.shutdown();
        a.shutdown();
        let result = a.connect(&net.rendezvous_address(), 0);
        assert!(matches!(result, Err(TransportError::Shutdown)));
    }
}
