//! Ballistic Simulation Core
//!
//! ECS-симуляция сборок из деталей на Bevy 0.16 (headless)
//!
//! Разделение ответственности:
//! - ECS = дерево деталей, membership, масса/CoM/инерция, разделение сборок
//! - Rapier = интеграция и коллизии (мы пишем только mass properties, силы, импульсы)
//! - Рендер, ввод, UI — снаружи (читают Transform/ChildOf и события)

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod behaviours;
pub mod config;
pub mod logger;
pub mod parts;
pub mod vehicle;

// Re-export основных типов
pub use behaviours::{BehavioursPlugin, Decoupler, Engine, Explosive, PropellantTank};
pub use config::{ConfigError, VehicleConfig};
pub use logger::{init_logger, log, log_error, log_info, log_warning, set_log_level, LogLevel};
pub use parts::{
    attach_to, detach, AttachNode, AttachNodeDef, MassProvider, MassProviderAppExt, PartCatalog, PartCategory,
    PartDefinition, PartId, PartNode,
};
pub use vehicle::{
    build_vehicle, decouple, explode, AssemblyDestroyed, Blueprint, BlueprintError, DecoupleRequest, PartEntry,
    PartImpact, SeparationCause, VehicleAssembly, VehicleId, VehiclePlugin, VehicleSeparated, VehicleSet,
};

/// Главный plugin симуляции (объединяет все подсистемы)
///
/// Ресурсы, уже вставленные в App (seed, config, catalog), не перетираются.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<VehicleConfig>()
            .cloned()
            .unwrap_or_default();

        app
            // Fixed timestep для simulation tick
            .insert_resource(Time::<Fixed>::from_hz(config.tick_hz))
            .init_resource::<VehicleConfig>();

        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(42));
        }
        if !app.world().contains_resource::<PartCatalog>() {
            app.insert_resource(PartCatalog::stock());
        }

        app.add_plugins((VehiclePlugin, BehavioursPlugin));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(60.0)); // 60Hz FixedUpdate

    app
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
