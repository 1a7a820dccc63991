// Tick throughput benchmarks.
//
// Measures a full `SimulationWorld::tick` at 60 Hz with a busy scripted
// player, plus the snapshot and checksum paths a lockstep peer runs every
// turn. Worlds are warmed up for a few seconds first so the pack is
// engaged rather than still spawning in.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use packhunt_sim::input::{PlayerInput, TickInput};
use packhunt_sim::sim::SimulationWorld;
use packhunt_sim::types::Loadout;

const DT: f32 = 1.0 / 60.0;

fn busy_input(n: u32) -> TickInput {
    let mut player = PlayerInput::moving(if n % 120 < 60 { 1.0 } else { -1.0 }, 0.3);
    player.light = n % 20 == 0;
    player.block = n % 90 > 70;
    TickInput::from(player)
}

fn warmed_world() -> SimulationWorld {
    let mut world = SimulationWorld::initialize(42, Loadout::default());
    for n in 0..300 {
        world.tick(DT, &busy_input(n));
    }
    world
}

fn bench_tick(c: &mut Criterion) {
    let base = warmed_world();
    c.bench_function("tick_60hz", |b| {
        b.iter_batched(
            || base.clone(),
            |mut world| {
                for n in 0..60 {
                    black_box(world.tick(DT, &busy_input(n)));
                }
                world
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_persistence(c: &mut Criterion) {
    let world = warmed_world();
    c.bench_function("checksum", |b| {
        b.iter(|| black_box(world.checksum().unwrap_or_default()))
    });
    let bytes = world.to_bytes().unwrap_or_default();
    c.bench_function("snapshot_encode", |b| b.iter(|| black_box(world.to_bytes())));
    c.bench_function("snapshot_decode", |b| {
        b.iter(|| black_box(SimulationWorld::from_bytes(&bytes).is_ok()))
    });
}

criterion_group!(benches, bench_tick, bench_persistence);
criterion_main!(benches);
