//! Role state: what a host or a client needs to remember about its peers.

use std::time::{Duration, Instant};

use relaynet_transport::{ControlPacketKind, PeerAddress, Transport};

use crate::{PlayerId, RoomId};

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// One client position in the host's peer table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Free for a new player.
    Open,
    /// Held by a connected client.
    Occupied(PeerAddress),
    /// The client's link dropped at `since`; only a reconnect with this
    /// slot's player id may take it until the grace period runs out.
    Reserved { since: Instant },
}

// ---------------------------------------------------------------------------
// HostPeers
// ---------------------------------------------------------------------------

/// Host-side bookkeeping.
///
/// Slot `i` belongs to player `i + 1`; player 0 is the host itself, so
/// there are `max_players - 1` slots.
#[derive(Debug, Clone)]
pub struct HostPeers {
    pub started: bool,
    pub max_players: u32,
    slots: Vec<Slot>,
}

impl HostPeers {
    pub fn new(max_players: u32) -> Self {
        let clients = max_players.saturating_sub(1) as usize;
        Self {
            started: false,
            max_players,
            slots: vec![Slot::Open; clients],
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    // `max_players <= 256` keeps every slot index below 255.
    fn id_for(index: usize) -> PlayerId {
        PlayerId((index + 1) as u8)
    }

    fn slot_mut(&mut self, id: PlayerId) -> Option<&mut Slot> {
        let index = usize::from(id.0).checked_sub(1)?;
        self.slots.get_mut(index)
    }

    /// The player occupying a slot from `peer`, if any.
    pub fn player_at(&self, peer: &PeerAddress) -> Option<PlayerId> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Slot::Occupied(addr) if addr == peer))
            .map(Self::id_for)
    }

    /// Lowest-numbered open slot. Reserved slots are never offered.
    pub fn first_open(&self) -> Option<PlayerId> {
        self.slots
            .iter()
            .position(|slot| *slot == Slot::Open)
            .map(Self::id_for)
    }

    pub fn is_reserved(&self, id: PlayerId) -> bool {
        let index = usize::from(id.0).wrapping_sub(1);
        matches!(self.slots.get(index), Some(Slot::Reserved { .. }))
    }

    pub fn occupy(&mut self, id: PlayerId, peer: PeerAddress) {
        if let Some(slot) = self.slot_mut(id) {
            *slot = Slot::Occupied(peer);
        }
    }

    pub fn reserve(&mut self, id: PlayerId, since: Instant) {
        if let Some(slot) = self.slot_mut(id) {
            *slot = Slot::Reserved { since };
        }
    }

    pub fn release(&mut self, id: PlayerId) {
        if let Some(slot) = self.slot_mut(id) {
            *slot = Slot::Open;
        }
    }

    /// Opens every reservation at least `grace` old. Returns the ids freed.
    pub fn expire_reservations(&mut self, grace: Duration) -> Vec<PlayerId> {
        let mut expired = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Slot::Reserved { since } = slot {
                if since.elapsed() >= grace {
                    *slot = Slot::Open;
                    expired.push(Self::id_for(index));
                }
            }
        }
        expired
    }

    /// Slots that are occupied or reserved.
    pub fn filled(&self) -> u32 {
        let filled = self.slots.iter().filter(|slot| **slot != Slot::Open).count();
        filled as u32
    }

    /// Occupied slots as `(player, address)` pairs, in id order.
    pub fn occupied(&self) -> impl Iterator<Item = (PlayerId, &PeerAddress)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(addr) => Some((Self::id_for(index), addr)),
                _ => None,
            })
    }

    /// Sends a frame to every occupied slot except `except`.
    ///
    /// Send failures are logged and skipped; a dead link shows up as a
    /// transport event on a later poll.
    pub fn broadcast<T: Transport>(
        &self,
        transport: &mut T,
        except: Option<PlayerId>,
        kind: ControlPacketKind,
        payload: &[u8],
    ) {
        for (player_id, addr) in self.occupied() {
            if Some(player_id) == except {
                continue;
            }
            if let Err(error) = transport.send_to(addr, kind, payload) {
                tracing::debug!(%player_id, %kind, %error, "broadcast send failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ClientPeer
// ---------------------------------------------------------------------------

/// Progress of a client trying to get back into its room.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectAttempt {
    /// When the host link dropped.
    pub since: Instant,
    /// Punchthrough attempts started so far.
    pub attempts: u32,
}

/// Client-side bookkeeping.
#[derive(Debug, Clone)]
pub struct ClientPeer {
    /// Set once punchthrough reaches the host.
    pub host: Option<PeerAddress>,
    pub room: RoomId,
    pub reconnect: Option<ReconnectAttempt>,
}

impl ClientPeer {
    pub fn new(room: RoomId) -> Self {
        Self {
            host: None,
            room,
            reconnect: None,
        }
    }

    pub fn is_host(&self, peer: &PeerAddress) -> bool {
        self.host.as_ref() == Some(peer)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Exactly one of host or client bookkeeping.
#[derive(Debug, Clone)]
pub enum Role {
    Host(HostPeers),
    Client(ClientPeer),
}

impl Role {
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host(_))
    }
}
