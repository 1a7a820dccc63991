// Test-only lockstep harness for multi-peer determinism tests.
//
// Wraps real `SimulationWorld`s (from `packhunt_sim::sim`) behind an
// in-process relay built on `std::sync::mpsc`, to exercise the path a
// networked session would take:
// host → relay → start → turn (serialized `TickInput`) → world.tick() →
// checksum comparison.
//
// The relay only sequences and fans out messages; every peer decodes the
// same JSON turn payload and ticks its own world, exactly as a remote peer
// would. Peers may run on their own threads. A peer that joins mid-run
// receives a snapshot (`SimulationWorld::to_bytes`) from the relay instead
// of the start message, then follows the same turn stream.
//
// See also: `tests/peer_sync.rs` for the scenarios.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use packhunt_sim::config::SimConfig;
use packhunt_sim::event::SimEvent;
use packhunt_sim::input::TickInput;
use packhunt_sim::sim::SimulationWorld;
use packhunt_sim::types::Loadout;

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed step every peer ticks with.
pub const TICK_DT: f32 = 1.0 / 60.0;

/// Messages fanned out by the relay.
#[derive(Clone, Debug)]
pub enum RelayMessage {
    Start {
        seed: u64,
        loadout: Loadout,
        config_json: String,
    },
    /// A flat snapshot for a late joiner; the turn stream resumes at
    /// `next_turn`.
    Snapshot { bytes: Vec<u8>, next_turn: u64 },
    Turn { number: u64, payload: Vec<u8> },
    Goodbye,
}

/// In-process relay: sequences turns and broadcasts them to every peer.
#[derive(Default)]
pub struct LocalRelay {
    peers: Vec<Sender<RelayMessage>>,
    next_turn: u64,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new peer. It sees only messages sent after this call.
    pub fn connect(&mut self, name: &str) -> TestPeer {
        let (tx, rx) = mpsc::channel();
        self.peers.push(tx);
        TestPeer {
            name: name.to_string(),
            rx,
            world: None,
            next_turn: 0,
            checksums: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn next_turn(&self) -> u64 {
        self.next_turn
    }

    fn broadcast(&mut self, msg: RelayMessage) {
        // A peer that hung up is dropped from the session.
        self.peers.retain(|tx| tx.send(msg.clone()).is_ok());
    }

    pub fn start_game(&mut self, seed: u64, loadout: Loadout, config: &SimConfig) {
        let config_json = config.to_json().expect("serialize SimConfig failed");
        self.broadcast(RelayMessage::Start {
            seed,
            loadout,
            config_json,
        });
    }

    /// Serialize `input` and broadcast it as the next turn.
    pub fn send_turn(&mut self, input: &TickInput) -> u64 {
        let payload = serde_json::to_vec(input).expect("serialize TickInput failed");
        let number = self.next_turn;
        self.next_turn += 1;
        self.broadcast(RelayMessage::Turn { number, payload });
        number
    }

    /// Hand `bytes` (a host snapshot) to the most recently connected peer.
    pub fn send_snapshot_to_last(&mut self, bytes: Vec<u8>) {
        let msg = RelayMessage::Snapshot {
            bytes,
            next_turn: self.next_turn,
        };
        if let Some(tx) = self.peers.last() {
            tx.send(msg).expect("late joiner hung up");
        }
    }

    pub fn shutdown(&mut self) {
        self.broadcast(RelayMessage::Goodbye);
        self.peers.clear();
    }
}

/// A test peer holding its own world and the checksum after every turn.
pub struct TestPeer {
    pub name: String,
    rx: Receiver<RelayMessage>,
    pub world: Option<SimulationWorld>,
    pub next_turn: u64,
    /// `(turn, checksum)` after each applied turn.
    pub checksums: Vec<(u64, u64)>,
    pub events: Vec<SimEvent>,
}

impl TestPeer {
    fn recv(&self) -> Option<RelayMessage> {
        match self.rx.recv_timeout(POLL_TIMEOUT) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) => panic!("{}: timed out waiting for relay", self.name),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Blocking poll until the world exists, from either a Start or a
    /// Snapshot message.
    pub fn poll_until_started(&mut self) {
        let start = Instant::now();
        while self.world.is_none() {
            assert!(start.elapsed() < POLL_TIMEOUT, "{}: no start", self.name);
            match self.recv() {
                Some(RelayMessage::Start {
                    seed,
                    loadout,
                    config_json,
                }) => {
                    let config = SimConfig::from_json(&config_json).expect("bad config json");
                    self.world = Some(SimulationWorld::with_config(seed, loadout, config));
                }
                Some(RelayMessage::Snapshot { bytes, next_turn }) => {
                    self.world = Some(SimulationWorld::from_bytes(&bytes).expect("bad snapshot"));
                    self.next_turn = next_turn;
                }
                Some(RelayMessage::Turn { .. }) => {}
                Some(RelayMessage::Goodbye) | None => {
                    panic!("{}: session ended before start", self.name)
                }
            }
        }
    }

    /// Blocking poll until `count` turns have been applied. Turns numbered
    /// before the peer's join point are skipped.
    pub fn poll_turns(&mut self, count: usize) {
        let mut applied = 0;
        while applied < count {
            match self.recv() {
                Some(RelayMessage::Turn { number, payload }) => {
                    if number < self.next_turn {
                        continue;
                    }
                    assert_eq!(number, self.next_turn, "{}: turn gap", self.name);
                    self.apply_turn(number, &payload);
                    applied += 1;
                }
                Some(RelayMessage::Goodbye) | None => return,
                Some(_) => {}
            }
        }
    }

    /// Apply every turn until the relay says goodbye.
    pub fn run_to_end(&mut self) {
        self.poll_turns(usize::MAX);
    }

    fn apply_turn(&mut self, number: u64, payload: &[u8]) {
        let input: TickInput = serde_json::from_slice(payload).expect("bad turn payload");
        let world = self.world.as_mut().expect("world not started");
        self.events.extend(world.tick(TICK_DT, &input));
        let sum = world.checksum().expect("checksum failed");
        self.checksums.push((number, sum));
        self.next_turn = number + 1;
    }

    pub fn world(&self) -> &SimulationWorld {
        self.world.as_ref().expect("world not started")
    }

    pub fn last_checksum(&self) -> Option<u64> {
        self.checksums.last().map(|(_, sum)| *sum)
    }
}

/// First turn at which two peers' checksums disagree, if any. Only turns
/// both peers applied are compared.
pub fn first_desync(a: &TestPeer, b: &TestPeer) -> Option<u64> {
    a.checksums
        .iter()
        .filter_map(|(turn, sum)| {
            b.checksums
                .iter()
                .find(|(t, _)| t == turn)
                .filter(|(_, other)| other != sum)
                .map(|_| *turn)
        })
        .next()
}
