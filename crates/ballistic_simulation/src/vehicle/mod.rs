//! Vehicle module — сборки деталей (одна сборка = одно rigid body)
//!
//! ECS ответственность:
//! - VehicleAssembly: part set, масса, CoM, инерция
//! - Builder: Blueprint → сборка
//! - Separation: decouple / overstress → новые сборки
//!
//! Rapier ответственность:
//! - Интеграция, коллизии (мы только пишем mass properties, силы и импульсы)
//!
//! Порядок за FixedUpdate тик (все сеты до rapier backend sync):
//! 1. Forces — сброс сил, gimbal, тяга
//! 2. Triggers — decouple requests, удары → разделение (exclusive)
//! 3. PartMassFlag / PartMassCollect / PartMass — mass providers → масса деталей
//! 4. AssemblyMass — adopt, rebuild, recompute, teardown (один раз за тик)

use bevy::prelude::*;
use bevy_rapier3d::plugin::PhysicsSet;

pub mod assembly;
pub mod blueprint;
pub mod builder;
pub mod events;
pub mod separation;


pub use assembly::{
    adopt_loose_parts, rebuild_part_set, recalculate_mass, refresh_assembly, refresh_dirty_assemblies,
    spawn_assembly_for, teardown_empty_assemblies, MassSummary, PrincipalInertia, VehicleAssembly, VehicleId,
};
pub use blueprint::{Blueprint, BlueprintError, PartEntry};
pub use builder::build_vehicle;
pub use events::{AssemblyDestroyed, DecoupleRequest, PartImpact, SeparationCause, VehicleSeparated};
pub use separation::{
    decouple, despawn_expired_effects, explode, owning_assembly, separate_subtree, DespawnAfter,
    SeparationEffect, SeparationReport,
};

use crate::parts::mass::recalculate_part_masses;

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleSet {
    Forces,
    Triggers,
    PartMassFlag,
    PartMassCollect,
    PartMass,
    AssemblyMass,
}

pub struct VehiclePlugin;

impl Plugin for VehiclePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<DecoupleRequest>()
            .add_event::<PartImpact>()
            .add_event::<VehicleSeparated>()
            .add_event::<AssemblyDestroyed>();

        app.configure_sets(
            FixedUpdate,
            (
                VehicleSet::Forces,
                VehicleSet::Triggers,
                VehicleSet::PartMassFlag,
                VehicleSet::PartMassCollect,
                VehicleSet::PartMass,
                VehicleSet::AssemblyMass,
            )
                .chain()
                .before(PhysicsSet::SyncBackend),
        );

        app.add_systems(
            FixedUpdate,
            (
                recalculate_part_masses.in_set(VehicleSet::PartMass),
                (
                    adopt_loose_parts,
                    refresh_dirty_assemblies,
                    teardown_empty_assemblies,
                    despawn_expired_effects,
                )
                    .chain()
                    .in_set(VehicleSet::AssemblyMass),
            ),
        );
    }
}
