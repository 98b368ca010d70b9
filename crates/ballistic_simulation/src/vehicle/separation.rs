//! SeparationOperator — раскол сборки на несколько rigid bodies
//!
//! Общий протокол (`separate_subtree`): detach → новая сборка в world pose детали →
//! перенос поддерева → копия linear velocity донора.
//!
//! Триггеры:
//! - decouple: все child-side поддеревья decoupler'а уходят в новые сборки, decoupler остаётся
//! - explode (overstress): деталь отрывается, каждый занятый node → отдельный фрагмент,
//!   сама деталь удаляется, на её месте — effect entities с таймером
//!
//! Нет владельца → warning, ничего не мутируем.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use super::assembly::{despawn_if_empty, recalculate_mass, refresh_assembly, spawn_assembly_for, VehicleAssembly};
use super::events::{emit, SeparationCause, VehicleSeparated};
use crate::logger::{log, log_info, log_warning};
use crate::parts::{detach, world_pose, PartNode};

/// Результат одной операции разделения
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationReport {
    pub donor: Entity,
    /// Новые сборки (по одной на отделённое поддерево)
    pub fragments: Vec<Entity>,
    /// Точка разделения (world)
    pub point: Vec3,
}

/// Transient visual effect после взрыва (рендер — снаружи)
#[derive(Component, Debug, Clone)]
pub struct SeparationEffect {
    pub effect: String,
}

/// Компонент: деспавн entity после указанного времени
#[derive(Component, Debug)]
pub struct DespawnAfter {
    /// Время деспавна (секунды от старта симуляции)
    pub despawn_time: f32,
}

/// Живая сборка-владелец детали
pub fn owning_assembly(world: &World, part: Entity) -> Option<Entity> {
    world
        .get::<PartNode>(part)?
        .assembly()
        .filter(|assembly| world.get::<VehicleAssembly>(*assembly).is_some())
}

fn linear_velocity(world: &World, assembly: Entity) -> Vec3 {
    world.get::<Velocity>(assembly).map_or(Vec3::ZERO, |velocity| velocity.linvel)
}

fn elapsed_secs(world: &World) -> f32 {
    world.get_resource::<Time>().map_or(0.0, |time| time.elapsed_secs())
}

/// Импульс в world-точке → ExternalImpulse сборки (накопительно за тик)
pub fn apply_impulse_at_point(world: &mut World, assembly: Entity, impulse: Vec3, point: Vec3) {
    let Some(center_of_mass) = world
        .get::<VehicleAssembly>(assembly)
        .map(|vehicle| vehicle.world_center_of_mass())
    else {
        return;
    };

    if let Some(mut external) = world.get_mut::<ExternalImpulse>(assembly) {
        external.impulse += impulse;
        external.torque_impulse += (point - center_of_mass).cross(impulse);
    }
}

/// Отделить поддерево `part` в новую сборку со скоростью `linear_velocity`
///
/// Root живой сборки не отделяется (это и есть сборка).
pub fn separate_subtree(world: &mut World, part: Entity, linear_velocity: Vec3) -> Option<Entity> {
    let Some(node) = world.get::<PartNode>(part) else {
        log_warning(&format!("separate_subtree: {:?} is not a part", part));
        return None;
    };
    if node.is_root() && owning_assembly(world, part).is_some() {
        log_warning(&format!("separate_subtree: {:?} is already the root of its vehicle", part));
        return None;
    }

    detach(world, part);

    let fragment = spawn_assembly_for(world, part, linear_velocity)?;
    recalculate_mass(world, fragment);
    Some(fragment)
}

/// Planned decouple
///
/// Каждое поддерево под decoupler'ом → отдельная сборка. Пара импульсов
/// ±`impulse` вдоль локальной +Y decoupler'а в его world позиции
/// (фрагмент отталкивается от decoupler'а, донор — в обратную сторону).
pub fn decouple(world: &mut World, decoupler: Entity, impulse: f32) -> Option<SeparationReport> {
    let Some(donor) = owning_assembly(world, decoupler) else {
        log_warning(&format!("Decoupler {:?} has no vehicle, decouple aborted", decoupler));
        return None;
    };
    let pose = world_pose(world, decoupler)?;
    let children = world.get::<PartNode>(decoupler)?.children().to_vec();
    if children.is_empty() {
        log(&format!("Decoupler {:?} has nothing attached below, nothing to separate", decoupler));
        return None;
    }

    let velocity = linear_velocity(world, donor);
    let fragments: Vec<Entity> = children
        .into_iter()
        .filter_map(|child| separate_subtree(world, child, velocity))
        .collect();

    refresh_assembly(world, donor);

    let point = pose.translation;
    if impulse > 0.0 {
        let axis = pose.rotation * Vec3::Y;
        for &fragment in &fragments {
            let fragment_com = world
                .get::<VehicleAssembly>(fragment)
                .map_or(point, |vehicle| vehicle.world_center_of_mass());
            let away = if (fragment_com - point).dot(axis) >= 0.0 { axis } else { -axis };

            apply_impulse_at_point(world, fragment, away * impulse, point);
            apply_impulse_at_point(world, donor, -away * impulse, point);
        }
    }

    for &fragment in &fragments {
        emit(
            world,
            VehicleSeparated {
                donor,
                fragment,
                cause: SeparationCause::Decouple,
            },
        );
    }

    log_info(&format!(
        "💥 Decoupler {:?} fired: vehicle {:?} → {} new vehicle(s)",
        decoupler,
        donor,
        fragments.len()
    ));

    Some(SeparationReport {
        donor,
        fragments,
        point,
    })
}

/// Overstress separation: деталь взрывается, соседи разлетаются отдельными сборками
///
/// Все фрагменты получают скорость донора до столкновения.
pub fn explode(world: &mut World, part: Entity, effects: &[String], effect_lifetime_secs: f32) -> Option<SeparationReport> {
    let Some(donor) = owning_assembly(world, part) else {
        log_warning(&format!("Part {:?} has no vehicle, explosion aborted", part));
        return None;
    };
    let pose = world_pose(world, part)?;
    let velocity = linear_velocity(world, donor);

    detach(world, part);

    // Сначала собираем соседей, потом мутируем
    let mut targets: Vec<Entity> = Vec::new();
    if let Some(node) = world.get::<PartNode>(part) {
        for (_, occupant) in node.occupied_nodes() {
            if !targets.contains(&occupant) {
                targets.push(occupant);
            }
        }
        for &child in node.children() {
            if !targets.contains(&child) {
                targets.push(child);
            }
        }
    }

    targets.retain(|target| world.get::<PartNode>(*target).and_then(|node| node.parent()) == Some(part));
    let fragments: Vec<Entity> = targets
        .into_iter()
        .filter_map(|target| separate_subtree(world, target, velocity))
        .collect();

    let despawn_time = elapsed_secs(world) + effect_lifetime_secs;
    for effect in effects {
        world.spawn((
            Name::new(format!("Effect {}", effect)),
            SeparationEffect { effect: effect.clone() },
            DespawnAfter { despawn_time },
            Transform::from_translation(pose.translation),
        ));
    }

    world.despawn(part);

    if world.get::<VehicleAssembly>(donor).is_some() {
        refresh_assembly(world, donor);
        despawn_if_empty(world, donor);
    }

    for &fragment in &fragments {
        emit(
            world,
            VehicleSeparated {
                donor,
                fragment,
                cause: SeparationCause::Overstress,
            },
        );
    }

    log_info(&format!(
        "💥 Part {:?} exploded: {} fragment(s), {} effect(s)",
        part,
        fragments.len(),
        effects.len()
    ));

    Some(SeparationReport {
        donor,
        fragments,
        point: pose.translation,
    })
}

/// Система: деспавн entities с истёкшим DespawnAfter
pub fn despawn_expired_effects(mut commands: Commands, query: Query<(Entity, &DespawnAfter)>, time: Res<Time>) {
    let current_time = time.elapsed_secs();

    for (entity, despawn_after) in query.iter() {
        if current_time >= despawn_after.despawn_time {
            log(&format!("Despawning effect {:?} (timeout)", entity));
            commands.entity(entity).despawn();
        }
    }
}
