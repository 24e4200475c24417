//! Player and room identity.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// Identifies one participant in a session.
///
/// The host is always `P-0`. Clients receive `1..=255` from the host when
/// their join is accepted; the id matches their slot index plus one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// The host's id.
    pub const HOST: Self = Self(0);

    /// Whether this is the host's id.
    pub fn is_host(self) -> bool {
        self == Self::HOST
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// Identifier the rendezvous server uses to find a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

// ---------------------------------------------------------------------------
// PlayerSet
// ---------------------------------------------------------------------------

/// Fixed-capacity membership set over all 256 possible player ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerSet {
    bits: [u64; 4],
}

impl PlayerSet {
    pub const fn new() -> Self {
        Self { bits: [0; 4] }
    }

    fn locate(id: PlayerId) -> (usize, u64) {
        (usize::from(id.0 / 64), 1 << (id.0 % 64))
    }

    /// Adds `id`. Returns `true` if it was not already present.
    pub fn insert(&mut self, id: PlayerId) -> bool {
        let (word, mask) = Self::locate(id);
        let added = self.bits[word] & mask == 0;
        self.bits[word] |= mask;
        added
    }

    /// Removes `id`. Returns `true` if it was present.
    pub fn remove(&mut self, id: PlayerId) -> bool {
        let (word, mask) = Self::locate(id);
        let present = self.bits[word] & mask != 0;
        self.bits[word] &= !mask;
        present
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        let (word, mask) = Self::locate(id);
        self.bits[word] & mask != 0
    }

    /// Number of members.
    pub fn len(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    pub fn clear(&mut self) {
        self.bits = [0; 4];
    }

    /// Members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = PlayerId> + '_ {
        (0..=u8::MAX)
            .map(PlayerId)
            .filter(|id| self.contains(*id))
    }
}

impl FromIterator<PlayerId> for PlayerSet {
    fn from_iter<I: IntoIterator<Item = PlayerId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
        assert!(PlayerId::HOST.is_host());
        assert!(!PlayerId(1).is_host());
    }

    #[test]
    fn test_player_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&PlayerId(3)).unwrap();
        assert_eq!(json, "3");
    }

    #[test]
    fn test_room_id_from_str_and_display() {
        let room = RoomId::from("1234567890");
        assert_eq!(room.as_str(), "1234567890");
        assert_eq!(room.to_string(), "1234567890");
    }

    #[test]
    fn test_player_set_insert_and_remove() {
        let mut set = PlayerSet::new();
        assert!(set.insert(PlayerId(0)));
        assert!(!set.insert(PlayerId(0)));
        assert!(set.contains(PlayerId(0)));
        assert!(set.remove(PlayerId(0)));
        assert!(!set.remove(PlayerId(0)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_player_set_covers_all_word_boundaries() {
        let ids = [0u8, 63, 64, 127, 128, 191, 192, 255];
        let set: PlayerSet = ids.iter().map(|&i| PlayerId(i)).collect();
        assert_eq!(set.len(), ids.len() as u32);
        let back: Vec<u8> = set.iter().map(|id| id.0).collect();
        assert_eq!(back, ids);
    }

    #[test]
    fn test_player_set_clear_empties() {
        let mut set: PlayerSet = [PlayerId(1), PlayerId(200)].into_iter().collect();
        set.clear();
        assert_eq!(set.len(), 0);
        assert_eq!(set.iter().count(), 0);
    }
}
