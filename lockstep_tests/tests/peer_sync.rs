// End-to-end determinism tests across lockstep peers.
//
// Each test starts a `LocalRelay`, connects `TestPeer`s, and verifies the
// full path: start → serialized turns → world.tick() → identical
// checksums. Peers that run on their own threads receive the same message
// stream as peers polled inline.

use std::thread;

use lockstep_tests::{LocalRelay, TestPeer, first_desync};
use packhunt_sim::config::SimConfig;
use packhunt_sim::input::{PlayerInput, TickInput, WorldPosting};
use packhunt_sim::types::{Biome, Character, Loadout};

const TURNS: u64 = 600;

/// Scripted input for turn `n`: circling movement with periodic attacks,
/// blocks and rolls, plus occasional world postings.
fn scripted_input(n: u64) -> TickInput {
    let phase = (n % 240) as f32 / 240.0;
    let mut player = PlayerInput::moving(1.0 - 2.0 * phase, (phase - 0.5) * 1.5);
    player.light = n % 25 == 0;
    player.heavy = n % 140 == 70;
    player.block = (n % 180) > 150;
    player.roll = n % 200 == 199;
    player.jump = n % 310 == 5;

    let mut postings = Vec::new();
    if n % 120 == 0 {
        postings.push(WorldPosting::Wind {
            x: 0.02 * phase,
            y: -0.01,
        });
    }
    if n % 90 == 30 {
        postings.push(WorldPosting::Sound {
            x: phase,
            y: 0.5,
            intensity: 0.8,
        });
    }
    if n == 10 {
        postings.push(WorldPosting::Den {
            x: 0.8,
            y: 0.2,
            radius: 0.08,
        });
    }
    TickInput { player, postings }
}

/// Route sim logs through the test writer. `RUST_LOG=packhunt_sim=debug`
/// shows plan changes, lineage deaths and resets.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start(relay: &mut LocalRelay, peers: &mut [&mut TestPeer], seed: u64, loadout: Loadout) {
    init_logging();
    relay.start_game(seed, loadout, &SimConfig::default());
    for peer in peers.iter_mut() {
        peer.poll_until_started();
    }
}

#[test]
fn two_peers_start_identically() {
    let mut relay = LocalRelay::new();
    let mut host = relay.connect("host");
    let mut joiner = relay.connect("joiner");
    start(&mut relay, &mut [&mut host, &mut joiner], 42, Loadout::default());

    assert_eq!(host.world().clock.tick, 0);
    assert_eq!(
        host.world().pool.active_count(),
        joiner.world().pool.active_count()
    );
    assert_eq!(
        host.world().checksum().unwrap(),
        joiner.world().checksum().unwrap()
    );
}

#[test]
fn inline_peers_stay_in_lockstep() {
    let loadout = Loadout {
        character: Character::Raider,
        biome: Biome::Swamp,
    };
    let mut relay = LocalRelay::new();
    let mut a = relay.connect("a");
    let mut b = relay.connect("b");
    start(&mut relay, &mut [&mut a, &mut b], 7, loadout);

    for n in 0..TURNS {
        relay.send_turn(&scripted_input(n));
        a.poll_turns(1);
        b.poll_turns(1);
    }

    assert_eq!(a.checksums.len(), TURNS as usize);
    assert_eq!(first_desync(&a, &b), None);
    assert_eq!(a.events, b.events);
    assert_eq!(a.world().clock.tick, TURNS);
}

#[test]
fn threaded_peers_agree_with_inline_peer() {
    let mut relay = LocalRelay::new();
    let mut inline = relay.connect("inline");
    let mut remote_a = relay.connect("remote-a");
    let mut remote_b = relay.connect("remote-b");
    start(
        &mut relay,
        &mut [&mut inline, &mut remote_a, &mut remote_b],
        99,
        Loadout::default(),
    );

    let handles: Vec<_> = [remote_a, remote_b]
        .into_iter()
        .map(|mut peer| {
            thread::spawn(move || {
                peer.run_to_end();
                peer
            })
        })
        .collect();

    for n in 0..TURNS {
        relay.send_turn(&scripted_input(n));
    }
    inline.poll_turns(TURNS as usize);
    relay.shutdown();

    for handle in handles {
        let peer = handle.join().expect("peer thread panicked");
        assert_eq!(peer.checksums.len(), TURNS as usize, "{}", peer.name);
        assert_eq!(first_desync(&inline, &peer), None, "{}", peer.name);
        assert_eq!(peer.last_checksum(), inline.last_checksum());
    }
}

#[test]
fn late_joiner_catches_up_from_snapshot() {
    let mut relay = LocalRelay::new();
    let mut host = relay.connect("host");
    start(&mut relay, &mut [&mut host], 1234, Loadout::default());

    for n in 0..300 {
        relay.send_turn(&scripted_input(n));
    }
    host.poll_turns(300);

    let mut late = relay.connect("late");
    relay.send_snapshot_to_last(host.world().to_bytes().unwrap());
    late.poll_until_started();
    assert_eq!(late.next_turn, 300);
    assert_eq!(
        late.world().checksum().unwrap(),
        host.world().checksum().unwrap()
    );

    for n in 300..TURNS {
        relay.send_turn(&scripted_input(n));
    }
    host.poll_turns((TURNS - 300) as usize);
    late.poll_turns((TURNS - 300) as usize);

    assert_eq!(late.checksums.first().map(|(t, _)| *t), Some(300));
    assert_eq!(first_desync(&host, &late), None);
    assert_eq!(late.world().clock.tick, host.world().clock.tick);
}

#[test]
fn diverged_input_is_detected() {
    let mut relay = LocalRelay::new();
    let mut a = relay.connect("a");
    start(&mut relay, &mut [&mut a], 5, Loadout::default());
    let mut b_relay = LocalRelay::new();
    let mut b = b_relay.connect("b");
    b_relay.start_game(5, Loadout::default(), &SimConfig::default());
    b.poll_until_started();

    for n in 0..120 {
        relay.send_turn(&scripted_input(n));
        let mut input = scripted_input(n);
        if n == 60 {
            input.player.move_x = -input.player.move_x;
            input.player.move_y = 1.0;
        }
        b_relay.send_turn(&input);
    }
    a.poll_turns(120);
    b.poll_turns(120);

    assert_eq!(first_desync(&a, &b), Some(60));
}
