//! Cookie clicker over Relaynet.
//!
//! A host and two clients share an in-memory network. Every tick each
//! player clicks a few times and announces its running total as a JSON
//! tree; everyone else keeps a scoreboard from what arrives.
//!
//! Run with `RUST_LOG=debug` to watch the session layer work.

use std::collections::BTreeMap;
use std::time::Duration;

use relaynet::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::time::{MissedTickBehavior, interval};

const MAX_PLAYERS: u32 = 3;
const ROUNDS: u32 = 20;
const TICK: Duration = Duration::from_millis(50);

type Conn = NetworkConnection<MemoryTransport>;

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

/// What goes on the wire after every click. Tree numbers are doubles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Click {
    player: f64,
    amount: f64,
}

impl Click {
    fn new(player: PlayerId, amount: u64) -> Self {
        Self {
            player: f64::from(player.0),
            amount: amount as f64,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let tree = serde_json::to_value(self)?;
        let mut enc = Encoder::new();
        enc.write(&tree);
        Ok(enc.serialize().to_vec())
    }

    /// `None` for anything that is not a well-formed click.
    fn decode(bytes: &[u8]) -> Option<Self> {
        let mut dec: Decoder<serde_json::Value> = Decoder::new();
        dec.receive(bytes);
        let tree = dec.read().ok()?.into_tree().ok()?;
        let click: Self = serde_json::from_value(tree).ok()?;
        let in_range = (0.0..f64::from(u8::MAX) + 1.0).contains(&click.player);
        (in_range && click.amount >= 0.0).then_some(click)
    }

    fn player_id(&self) -> PlayerId {
        PlayerId(self.player as u8)
    }
}

/// One player's view of everyone's clicks.
#[derive(Debug, Default, Serialize)]
struct Scoreboard {
    scores: BTreeMap<u8, u64>,
}

impl Scoreboard {
    /// Clicks arrive as running totals, so the latest one wins.
    fn apply(&mut self, click: Click) {
        self.scores.insert(click.player_id().0, click.amount as u64);
    }

    fn click(&mut self, player: PlayerId) -> u64 {
        let score = self.scores.entry(player.0).or_default();
        *score += 1;
        *score
    }

    fn score(&self, player: PlayerId) -> u64 {
        self.scores.get(&player.0).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

struct Player {
    conn: Conn,
    board: Scoreboard,
}

impl Player {
    fn new(conn: Conn) -> Self {
        Self {
            conn,
            board: Scoreboard::default(),
        }
    }

    fn poll(&mut self) {
        let board = &mut self.board;
        self.conn.receive(|bytes| match Click::decode(bytes) {
            Some(click) => board.apply(click),
            None => tracing::warn!(len = bytes.len(), "ignoring malformed click"),
        });
    }

    /// Clicks `times` times, announcing the total after each click.
    fn click(&mut self, times: u32) -> Result<(), serde_json::Error> {
        let Some(me) = self.conn.player_id() else {
            return Ok(());
        };
        for _ in 0..times {
            let amount = self.board.click(me);
            self.conn.send(&Click::new(me, amount).encode()?);
        }
        Ok(())
    }
}

fn poll_all(players: &mut [Player]) {
    for player in players.iter_mut() {
        player.poll();
    }
}

/// Polls until every player leaves `Pending`, or `ticks` run out.
async fn settle(players: &mut [Player], ticks: u32) {
    let mut tick = interval(TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    for _ in 0..ticks {
        tick.tick().await;
        poll_all(players);
        if players.iter().all(|p| p.conn.status() != NetStatus::Pending) {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let net = MemoryNetwork::new();
    let config = SessionConfig::new("127.0.0.1", 61111, MAX_PLAYERS, 0);

    let mut players = vec![Player::new(Conn::host(config.clone(), net.endpoint())?)];
    settle(&mut players, 20).await;
    let room = players[0]
        .conn
        .room_id()
        .cloned()
        .ok_or("host never got a room")?;
    tracing::info!(%room, "hosting");

    for _ in 1..MAX_PLAYERS {
        let conn = Conn::client(config.clone(), room.clone(), net.endpoint())?;
        players.push(Player::new(conn));
        settle(&mut players, 20).await;
    }
    for player in &players {
        tracing::info!(
            player_id = ?player.conn.player_id(),
            status = %player.conn.status(),
            "joined"
        );
    }

    players[0].conn.start_game()?;
    poll_all(&mut players);
    tracing::info!(total = players[0].conn.total_players(), "game started");

    let mut tick = interval(TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    for round in 0..ROUNDS {
        tick.tick().await;
        for (i, player) in players.iter_mut().enumerate() {
            // Players click at different rates so the scores diverge.
            player.click((round % (i as u32 + 2)) + 1)?;
        }
        poll_all(&mut players);
    }
    poll_all(&mut players);

    for player in &players {
        if let Some(me) = player.conn.player_id() {
            tracing::info!(
                %me,
                own = player.board.score(me),
                board = %serde_json::to_string(&player.board)?,
                "final scores"
            );
        }
    }
    Ok(())
}
