//! Тесты детерминизма
//!
//! Одинаковый seed → одинаковые vehicle ids, массы и разделения

use bevy::prelude::*;
use ballistic_simulation::*;

const TICK_COUNT: usize = 240;
const DECOUPLE_TICK: usize = 60;

fn missile() -> Blueprint {
    Blueprint::new("Missile")
        .with_part(PartEntry::root("tank_small"))
        .with_part(PartEntry::child("warhead", 0, "top", "bottom"))
        .with_part(PartEntry::child("decoupler", 0, "bottom", "top"))
        .with_part(PartEntry::child("engine_small", 2, "bottom", "top"))
}

/// Запускает симуляцию и возвращает snapshot мира
fn run_simulation(seed: u64) -> Vec<u8> {
    let mut app = create_headless_app(seed);
    app.add_plugins(SimulationPlugin);

    for i in 0..3 {
        build_vehicle(app.world_mut(), &missile(), Vec3::new(i as f32 * 10.0, 0.0, 0.0), Quat::IDENTITY).unwrap();
    }

    let world = app.world_mut();
    let mut decouplers = world.query_filtered::<Entity, With<Decoupler>>();
    let mut decouplers: Vec<Entity> = decouplers.iter(world).collect();
    decouplers.sort_by_key(|entity| entity.index());

    let mut tanks = world.query::<(Entity, &mut PropellantTank)>();
    let mut tanks: Vec<(Entity, Mut<PropellantTank>)> = tanks.iter_mut(world).collect();
    tanks.sort_by_key(|(entity, _)| entity.index());
    for (i, (_, tank)) in tanks.iter_mut().enumerate() {
        tank.drain(50.0 * i as f32);
    }

    for tick in 0..TICK_COUNT {
        if tick == DECOUPLE_TICK {
            for &decoupler in &decouplers {
                app.world_mut().send_event(DecoupleRequest { decoupler });
            }
        }
        app.world_mut().run_schedule(FixedUpdate);
    }

    world_snapshot::<VehicleAssembly>(app.world_mut())
}

#[test]
fn test_determinism_same_seed() {
    const SEED: u64 = 12345;

    let snapshot1 = run_simulation(SEED);
    let snapshot2 = run_simulation(SEED);

    assert!(!snapshot1.is_empty());
    assert_eq!(
        snapshot1, snapshot2,
        "Симуляция с одинаковым seed ({}) дала разные результаты!",
        SEED
    );
}

#[test]
fn test_determinism_multiple_runs() {
    const SEED: u64 = 42;

    // Запускаем 5 раз — все должны быть идентичны
    let snapshots: Vec<_> = (0..5).map(|_| run_simulation(SEED)).collect();

    for (i, snapshot) in snapshots.iter().enumerate().skip(1) {
        assert_eq!(snapshots[0], *snapshot, "Прогон {} дал результат отличный от прогона 0", i);
    }
}

#[test]
fn test_vehicle_ids_follow_seed() {
    let ids = |seed: u64| {
        let mut app = create_headless_app(seed);
        app.add_plugins(SimulationPlugin);
        let vehicle = build_vehicle(app.world_mut(), &missile(), Vec3::ZERO, Quat::IDENTITY).unwrap();
        app.world().get::<VehicleAssembly>(vehicle).unwrap().id()
    };

    assert_eq!(ids(7), ids(7));
    assert_ne!(ids(7), ids(8));
}
