//! Session control messages and their payload encoding.
//!
//! The message type travels as the transport's [`ControlPacketKind`]; the
//! payload bytes carry only the fields:
//!
//! | Message              | Kind           | Payload                        |
//! |----------------------|----------------|--------------------------------|
//! | `AssignedRoom`       | `AssignedRoom` | room id (UTF-8)                |
//! | `JoinRequest`        | `JoinRoom`     | room id (UTF-8)                |
//! | `JoinAccepted`       | `JoinRoom`     | player id, then connected ids  |
//! | `JoinRoomFail`       | `JoinRoomFail` | empty                          |
//! | `ReconnectRequest`   | `Reconnect`    | player id, then room id        |
//! | `ReconnectAccepted`  | `Reconnect`    | player id, then connected ids  |
//! | `PlayerJoined`       | `PlayerJoined` | player id                      |
//! | `PlayerLeft`         | `PlayerLeft`   | player id                      |
//! | `StartGame`          | `StartGame`    | total players, u32 big-endian  |
//!
//! `JoinRoom` and `Reconnect` mean different things depending on who sent
//! them, so decoding needs the [`Direction`].

use relaynet_transport::ControlPacketKind;

use crate::{PlayerId, PlayerSet, RoomId, SessionError};

/// Which way a control packet is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client (or rendezvous server) to host.
    ToHost,
    /// Host (or rendezvous server) to client.
    ToClient,
}

/// A decoded control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    AssignedRoom(RoomId),
    JoinRequest(RoomId),
    JoinAccepted {
        player_id: PlayerId,
        connected: PlayerSet,
    },
    JoinRoomFail,
    ReconnectRequest {
        player_id: PlayerId,
        room: RoomId,
    },
    ReconnectAccepted {
        player_id: PlayerId,
        connected: PlayerSet,
    },
    PlayerJoined(PlayerId),
    PlayerLeft(PlayerId),
    StartGame {
        total_players: u32,
    },
}

impl ControlMessage {
    pub fn kind(&self) -> ControlPacketKind {
        match self {
            Self::AssignedRoom(_) => ControlPacketKind::AssignedRoom,
            Self::JoinRequest(_) | Self::JoinAccepted { .. } => ControlPacketKind::JoinRoom,
            Self::JoinRoomFail => ControlPacketKind::JoinRoomFail,
            Self::ReconnectRequest { .. } | Self::ReconnectAccepted { .. } => {
                ControlPacketKind::Reconnect
            }
            Self::PlayerJoined(_) => ControlPacketKind::PlayerJoined,
            Self::PlayerLeft(_) => ControlPacketKind::PlayerLeft,
            Self::StartGame { .. } => ControlPacketKind::StartGame,
        }
    }

    /// Payload bytes for this message.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::AssignedRoom(room) | Self::JoinRequest(room) => room.as_str().as_bytes().to_vec(),
            Self::JoinAccepted {
                player_id,
                connected,
            }
            | Self::ReconnectAccepted {
                player_id,
                connected,
            } => {
                let mut out = vec![player_id.0];
                out.extend(connected.iter().map(|id| id.0));
                out
            }
            Self::JoinRoomFail => Vec::new(),
            Self::ReconnectRequest { player_id, room } => {
                let mut out = vec![player_id.0];
                out.extend_from_slice(room.as_str().as_bytes());
                out
            }
            Self::PlayerJoined(id) | Self::PlayerLeft(id) => vec![id.0],
            Self::StartGame { total_players } => total_players.to_be_bytes().to_vec(),
        }
    }

    /// Parses a control packet.
    ///
    /// # Errors
    /// Returns [`SessionError::MalformedControl`] for `Standard` frames,
    /// payloads of the wrong size, and room ids that are not UTF-8.
    pub fn decode(
        kind: ControlPacketKind,
        payload: &[u8],
        direction: Direction,
    ) -> Result<Self, SessionError> {
        let malformed = |reason| SessionError::MalformedControl { kind, reason };
        let room = |bytes: &[u8]| {
            std::str::from_utf8(bytes)
                .map(RoomId::from)
                .map_err(|_| malformed("room id is not utf-8"))
        };
        let player_and_set = |bytes: &[u8]| match bytes.split_first() {
            Some((&id, rest)) => Ok((
                PlayerId(id),
                rest.iter().map(|&b| PlayerId(b)).collect::<PlayerSet>(),
            )),
            None => Err(malformed("missing player id")),
        };
        let single_player = |bytes: &[u8]| match bytes {
            [id] => Ok(PlayerId(*id)),
            _ => Err(malformed("expected exactly one player id")),
        };

        match (kind, direction) {
            (ControlPacketKind::Standard, _) => Err(malformed("not a control packet")),
            (ControlPacketKind::AssignedRoom, _) => Ok(Self::AssignedRoom(room(payload)?)),
            (ControlPacketKind::JoinRoom, Direction::ToHost) => {
                Ok(Self::JoinRequest(room(payload)?))
            }
            (ControlPacketKind::JoinRoom, Direction::ToClient) => {
                let (player_id, connected) = player_and_set(payload)?;
                Ok(Self::JoinAccepted {
                    player_id,
                    connected,
                })
            }
            (ControlPacketKind::JoinRoomFail, _) => Ok(Self::JoinRoomFail),
            (ControlPacketKind::Reconnect, Direction::ToHost) => match payload.split_first() {
                Some((&id, rest)) => Ok(Self::ReconnectRequest {
                    player_id: PlayerId(id),
                    room: room(rest)?,
                }),
                None => Err(malformed("missing player id")),
            },
            (ControlPacketKind::Reconnect, Direction::ToClient) => {
                let (player_id, connected) = player_and_set(payload)?;
                Ok(Self::ReconnectAccepted {
                    player_id,
                    connected,
                })
            }
            (ControlPacketKind::PlayerJoined, _) => Ok(Self::PlayerJoined(single_player(payload)?)),
            (ControlPacketKind::PlayerLeft, _) => Ok(Self::PlayerLeft(single_player(payload)?)),
            (ControlPacketKind::StartGame, _) => {
                let bytes: [u8; 4] = payload
                    .try_into()
                    .map_err(|_| malformed("expected a 4-byte player count"))?;
                Ok(Self::StartGame {
                    total_players: u32::from_be_bytes(bytes),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: ControlMessage, direction: Direction) -> ControlMessage {
        ControlMessage::decode(msg.kind(), &msg.encode(), direction).unwrap()
    }

    #[test]
    fn test_join_request_payload_is_room_bytes() {
        let msg = ControlMessage::JoinRequest(RoomId::from("987"));
        assert_eq!(msg.kind(), ControlPacketKind::JoinRoom);
        assert_eq!(msg.encode(), b"987");
        assert_eq!(round_trip(msg.clone(), Direction::ToHost), msg);
    }

    #[test]
    fn test_join_accepted_payload_lists_connected_ids() {
        let connected: PlayerSet = [PlayerId(0), PlayerId(2)].into_iter().collect();
        let msg = ControlMessage::JoinAccepted {
            player_id: PlayerId(2),
            connected,
        };
        assert_eq!(msg.encode(), vec![2, 0, 2]);
        assert_eq!(round_trip(msg.clone(), Direction::ToClient), msg);
    }

    #[test]
    fn test_join_room_kind_depends_on_direction() {
        let payload = [1u8, 0, 1];
        let to_host =
            ControlMessage::decode(ControlPacketKind::JoinRoom, &payload, Direction::ToHost)
                .unwrap();
        let to_client =
            ControlMessage::decode(ControlPacketKind::JoinRoom, &payload, Direction::ToClient)
                .unwrap();
        assert!(matches!(to_host, ControlMessage::JoinRequest(_)));
        assert!(matches!(to_client, ControlMessage::JoinAccepted { .. }));
    }

    #[test]
    fn test_reconnect_request_carries_id_and_room() {
        let msg = ControlMessage::ReconnectRequest {
            player_id: PlayerId(4),
            room: RoomId::from("55"),
        };
        assert_eq!(msg.encode(), vec![4, b'5', b'5']);
        assert_eq!(round_trip(msg.clone(), Direction::ToHost), msg);
    }

    #[test]
    fn test_start_game_total_fits_256() {
        let msg = ControlMessage::StartGame { total_players: 256 };
        assert_eq!(msg.encode(), vec![0, 0, 1, 0]);
        assert_eq!(round_trip(msg.clone(), Direction::ToClient), msg);
    }

    #[test]
    fn test_player_left_round_trip() {
        let msg = ControlMessage::PlayerLeft(PlayerId(9));
        assert_eq!(round_trip(msg.clone(), Direction::ToClient), msg);
    }

    #[test]
    fn test_decode_standard_is_rejected() {
        let err = ControlMessage::decode(ControlPacketKind::Standard, b"x", Direction::ToHost)
            .unwrap_err();
        assert!(matches!(err, SessionError::MalformedControl { .. }));
    }

    #[test]
    fn test_decode_empty_join_accept_fails() {
        let result = ControlMessage::decode(ControlPacketKind::JoinRoom, &[], Direction::ToClient);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_player_joined_wrong_size_fails() {
        let result =
            ControlMessage::decode(ControlPacketKind::PlayerJoined, &[1, 2], Direction::ToClient);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_start_game_short_payload_fails() {
        let err = ControlMessage::decode(ControlPacketKind::StartGame, &[3], Direction::ToClient)
            .unwrap_err();
        assert!(err.to_string().contains("start-game"));
    }

    #[test]
    fn test_decode_invalid_utf8_room_fails() {
        let result = ControlMessage::decode(
            ControlPacketKind::AssignedRoom,
            &[0xff, 0xfe],
            Direction::ToHost,
        );
        assert!(result.is_err());
    }
}
