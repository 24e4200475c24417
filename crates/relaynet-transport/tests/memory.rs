//! Integration tests for the in-memory network.
//!
//! These walk the same sequence a real host and client go through
//! against a punchthrough server: register, get a room, resolve it,
//! punch, connect, exchange frames, hang up.

#[cfg(feature = "memory")]
mod memory {
    use relaynet_transport::{
        ControlPacketKind, MemoryNetwork, PeerAddress, Transport, TransportEvent,
    };

    fn only_event(packets: Vec<relaynet_transport::Packet>) -> (PeerAddress, TransportEvent) {
        assert_eq!(packets.len(), 1, "expected exactly one packet: {packets:?}");
        let packet = packets.into_iter().next().expect("one packet");
        (packet.from, packet.event)
    }

    #[test]
    fn test_full_rendezvous_handshake() {
        let net = MemoryNetwork::with_rendezvous("34.74.68.73", 61111);
        let rendezvous = net.rendezvous_address();
        assert_eq!(rendezvous.as_str(), "34.74.68.73:61111");

        // Host registers and asks for a room.
        let mut host = net.endpoint();
        host.connect(&rendezvous, 0).expect("connect");
        let (from, event) = only_event(host.poll());
        assert_eq!(from, rendezvous);
        assert_eq!(event, TransportEvent::ConnectionAccepted);

        host.send_to(&rendezvous, ControlPacketKind::AssignedRoom, &[])
            .expect("room request");
        let room = match only_event(host.poll()).1 {
            TransportEvent::Frame {
                kind: ControlPacketKind::AssignedRoom,
                payload,
            } => String::from_utf8(payload).expect("utf-8 room"),
            other => panic!("unexpected {other:?}"),
        };

        // Client registers, resolves the room and punches through.
        let mut client = net.endpoint();
        client.connect(&rendezvous, 0).expect("connect");
        client.poll();
        client.resolve_and_punch(&rendezvous, &room).expect("punch");
        let (punched, event) = only_event(client.poll());
        assert_eq!(event, TransportEvent::PunchSucceeded);
        assert_eq!(punched, host.local_address());

        // Client connects to the host directly.
        client.connect(&punched, 0).expect("connect host");
        assert_eq!(only_event(client.poll()).1, TransportEvent::ConnectionAccepted);
        assert_eq!(
            only_event(host.poll()),
            (client.local_address(), TransportEvent::IncomingConnection)
        );

        // Frames flow both ways.
        client
            .send_to(&punched, ControlPacketKind::JoinRoom, room.as_bytes())
            .expect("send");
        let (_, event) = only_event(host.poll());
        assert_eq!(
            event,
            TransportEvent::Frame {
                kind: ControlPacketKind::JoinRoom,
                payload: room.clone().into_bytes(),
            }
        );

        // Host leaves; the client hears about it and the room is gone.
        host.shutdown();
        assert_eq!(only_event(client.poll()).1, TransportEvent::Disconnected);
        assert_eq!(net.room_host(&room), None);
    }

    #[test]
    fn test_cloned_network_handles_share_state() {
        let net = MemoryNetwork::new();
        let other = net.clone();
        let mut a = net.endpoint();
        a.connect(&other.rendezvous_address(), 0).expect("connect");
        assert!(other.is_registered(&a.local_address()));
    }
}
