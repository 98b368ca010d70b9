//! Headless симуляция: сборка ракеты из blueprint + отделение ступени
//!
//! Запуск: `ballistic_simulation [blueprint.ron]` (без аргумента — встроенный stack)

use bevy::prelude::*;
use ballistic_simulation::{
    build_vehicle, create_headless_app, log_error, log_info, Blueprint, DecoupleRequest, Decoupler, Engine,
    PartEntry, SimulationPlugin, VehicleAssembly,
};

const SEED: u64 = 42;
const TICK_COUNT: usize = 300;
const DECOUPLE_TICK: usize = 120;

fn default_blueprint() -> Blueprint {
    Blueprint::new("Sounding Rocket")
        .with_part(PartEntry::root("tank_small"))
        .with_part(PartEntry::child("warhead", 0, "top", "bottom"))
        .with_part(PartEntry::child("decoupler", 0, "bottom", "top"))
        .with_part(PartEntry::child("engine_small", 2, "bottom", "top"))
}

fn load_blueprint() -> Result<Blueprint, String> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).map_err(|error| format!("{}: {}", path, error))?;
            Blueprint::from_ron(&text).map_err(|error| format!("{}: {}", path, error))
        }
        None => Ok(default_blueprint()),
    }
}

fn print_vehicles(world: &mut World, tick: usize) {
    let mut query = world.query::<(Entity, &VehicleAssembly)>();
    for (entity, vehicle) in query.iter(world) {
        println!(
            "Tick {}: vehicle {} {:?} — {} parts, {:.1} kg, CoM {:?}",
            tick,
            vehicle.id(),
            entity,
            vehicle.parts().len(),
            vehicle.total_mass(),
            vehicle.world_center_of_mass()
        );
    }
}

fn main() {
    println!("Starting ballistic headless simulation (seed: {})", SEED);

    let blueprint = match load_blueprint() {
        Ok(blueprint) => blueprint,
        Err(error) => {
            log_error(&format!("Failed to load blueprint: {}", error));
            std::process::exit(1);
        }
    };

    let mut app = create_headless_app(SEED);
    app.add_plugins(SimulationPlugin);

    let vehicle = match build_vehicle(app.world_mut(), &blueprint, Vec3::ZERO, Quat::IDENTITY) {
        Ok(vehicle) => vehicle,
        Err(error) => {
            log_error(&format!("Failed to build '{}': {}", blueprint.display_name, error));
            std::process::exit(1);
        }
    };

    // Полный газ на всех двигателях
    let mut engines = app.world_mut().query::<&mut Engine>();
    for mut engine in engines.iter_mut(app.world_mut()) {
        engine.set_throttle(1.0);
    }

    let mut decouplers = app.world_mut().query_filtered::<Entity, With<Decoupler>>();
    let decouplers: Vec<Entity> = decouplers.iter(app.world()).collect();

    for tick in 0..TICK_COUNT {
        if tick == DECOUPLE_TICK {
            for &decoupler in &decouplers {
                log_info(&format!("Staging: decoupler {:?}", decoupler));
                app.world_mut().send_event(DecoupleRequest { decoupler });
            }
        }

        app.world_mut().run_schedule(FixedUpdate);

        if tick % 60 == 0 || tick == DECOUPLE_TICK {
            print_vehicles(app.world_mut(), tick);
        }
    }

    print_vehicles(app.world_mut(), TICK_COUNT);
    println!("Simulation complete! (initial vehicle {:?})", vehicle);
}
