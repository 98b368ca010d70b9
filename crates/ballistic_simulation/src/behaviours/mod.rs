//! Part behaviours — компоненты, которые деталь получает из `PartBehaviourDef`
//!
//! - PropellantTank: mass provider
//! - Engine: тяга + gimbal (VehicleSet::Forces)
//! - Decoupler: DecoupleRequest → separation (VehicleSet::Triggers)
//! - Explosive: PartImpact → overstress separation (VehicleSet::Triggers)

use bevy::prelude::*;

pub mod decoupler;
pub mod engine;
pub mod explosive;
pub mod tank;

pub use decoupler::{process_decouple_requests, Decoupler};
pub use engine::{apply_engine_thrust, reset_assembly_forces, update_engine_gimbals, Engine};
pub use explosive::{process_part_impacts, Explosive};
pub use tank::PropellantTank;

use crate::config::VehicleConfig;
use crate::parts::{MassProviderAppExt, PartBehaviourDef, PartDefinition};
use crate::vehicle::VehicleSet;

pub struct BehavioursPlugin;

impl Plugin for BehavioursPlugin {
    fn build(&self, app: &mut App) {
        app.register_mass_provider::<PropellantTank>();

        app.add_systems(
            FixedUpdate,
            (
                (reset_assembly_forces, update_engine_gimbals, apply_engine_thrust)
                    .chain()
                    .in_set(VehicleSet::Forces),
                (process_decouple_requests, process_part_impacts)
                    .chain()
                    .in_set(VehicleSet::Triggers),
            ),
        );
    }
}

/// Behaviour компоненты по definition (при spawn детали)
pub fn insert_behaviours(entity: &mut EntityWorldMut, definition: &PartDefinition, config: &VehicleConfig) {
    for behaviour in &definition.behaviours {
        match behaviour {
            PartBehaviourDef::Tank { propellant_mass_kg } => {
                entity.insert(PropellantTank::new(*propellant_mass_kg));
            }
            PartBehaviourDef::Engine {
                max_thrust_newtons,
                max_gimbal_degrees,
                gimbal_rate_degrees,
            } => {
                entity.insert(Engine::new(
                    *max_thrust_newtons,
                    Vec2::from_array(*max_gimbal_degrees),
                    *gimbal_rate_degrees,
                ));
            }
            PartBehaviourDef::Decoupler { decouple_impulse } => {
                entity.insert(Decoupler::new(*decouple_impulse));
            }
            PartBehaviourDef::Explosive {
                explosion_velocity,
                effects,
                effect_lifetime_secs,
            } => {
                entity.insert(Explosive {
                    explosion_velocity: *explosion_velocity,
                    effects: effects.clone(),
                    effect_lifetime_secs: effect_lifetime_secs.unwrap_or(config.default_effect_lifetime_secs),
                });
            }
        }
    }
}
