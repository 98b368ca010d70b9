//! AssemblyBuilder — Blueprint → VehicleAssembly + дерево деталей
//!
//! # Flow
//! 1. `Blueprint::validate()` (структура) + резолв деталей в PartCatalog
//! 2. Spawn сборки (rigid body) в `position`/`rotation`
//! 3. Pass 1: одна деталь на entry (в порядке blueprint), все в origin сборки
//! 4. Pass 2: `attach_to` для каждой не-root детали (резолв node ids)
//! 5. Rebuild + recompute один раз

use bevy::prelude::*;
use bevy_rapier3d::prelude::ColliderMassProperties;
use std::sync::Arc;

use super::assembly::{refresh_assembly, spawn_assembly, VehicleAssembly};
use super::blueprint::{Blueprint, BlueprintError};
use crate::behaviours::insert_behaviours;
use crate::config::VehicleConfig;
use crate::logger::{log_info, log_warning};
use crate::parts::hierarchy::place_part;
use crate::parts::{attach_to, world_pose, PartCatalog, PartDefinition, PartNode};

/// Собирает сборку по blueprint
///
/// Ошибки — только структурные (см. `BlueprintError`). Неизвестные детали
/// (кроме root) и дети деталей без attach nodes пропускаются вместе с потомками, с warning.
pub fn build_vehicle(
    world: &mut World,
    blueprint: &Blueprint,
    position: Vec3,
    rotation: Quat,
) -> Result<Entity, BlueprintError> {
    let root_index = blueprint.validate()?;

    let catalog = world
        .get_resource::<PartCatalog>()
        .ok_or(BlueprintError::MissingCatalog)?;
    let definitions: Vec<Option<Arc<PartDefinition>>> = blueprint
        .parts
        .iter()
        .map(|entry| catalog.get(&entry.part).cloned())
        .collect();

    if definitions[root_index].is_none() {
        return Err(BlueprintError::UnknownPart {
            entry: root_index,
            part: blueprint.parts[root_index].part.clone(),
        });
    }

    let usable = usable_entries(blueprint, &definitions);
    for (index, entry) in blueprint.parts.iter().enumerate() {
        if usable[index] {
            continue;
        }
        let parent_has_no_nodes = entry
            .parent()
            .and_then(|parent| definitions[parent].as_ref())
            .is_some_and(|parent| parent.attach_nodes.is_empty());

        if definitions[index].is_none() {
            log_warning(&format!(
                "Blueprint '{}' entry #{}: unknown part '{}', skipped with its descendants",
                blueprint.display_name, index, entry.part
            ));
        } else if parent_has_no_nodes {
            log_warning(&format!(
                "Blueprint '{}' entry #{}: parent part has no attach nodes, '{}' skipped with its descendants",
                blueprint.display_name, index, entry.part
            ));
        } else {
            log_warning(&format!(
                "Blueprint '{}' entry #{} '{}' skipped: ancestor part is missing",
                blueprint.display_name, index, entry.part
            ));
        }
    }

    let config = world.get_resource::<VehicleConfig>().cloned().unwrap_or_default();
    let pose = Transform::from_translation(position).with_rotation(rotation);
    let assembly = spawn_assembly(world, pose, Vec3::ZERO, Entity::PLACEHOLDER);

    // Pass 1: spawn
    let spawned: Vec<Option<Entity>> = definitions
        .iter()
        .enumerate()
        .map(|(index, definition)| match definition {
            Some(definition) if usable[index] => Some(spawn_part(world, definition, assembly, &config, index)),
            _ => None,
        })
        .collect();

    let Some(root) = spawned[root_index] else {
        return Err(BlueprintError::UnknownPart {
            entry: root_index,
            part: blueprint.parts[root_index].part.clone(),
        });
    };
    if let Some(mut vehicle) = world.get_mut::<VehicleAssembly>(assembly) {
        vehicle.set_root_part(root);
    }

    // Pass 2: attach
    for (index, entry) in blueprint.parts.iter().enumerate() {
        let (Some(child), Some(parent_index)) = (spawned[index], entry.parent()) else {
            continue;
        };
        let Some(parent) = spawned[parent_index] else {
            continue;
        };

        let attached = match resolve_parent_node(world, parent, &entry.parent_attach_node) {
            Some(parent_node) => {
                let own_node = resolve_child_node(world, child, &entry.child_attach_node);
                attach_to(world, child, parent, parent_node, own_node)
            }
            None => false,
        };

        // Неприсоединённая деталь не должна числиться за сборкой: отпускаем, её подберёт adopt
        if !attached {
            log_warning(&format!(
                "Blueprint '{}' entry #{}: could not attach '{}', left loose",
                blueprint.display_name, index, entry.part
            ));
            if let Some(pose) = world_pose(world, child) {
                place_part(world, child, None, pose);
            }
        }
    }

    let summary = refresh_assembly(world, assembly);
    let part_count = world.get::<VehicleAssembly>(assembly).map_or(0, |vehicle| vehicle.parts().len());

    log_info(&format!(
        "🚀 Built vehicle '{}' {:?}: {} parts, {:.1} kg",
        blueprint.display_name,
        assembly,
        part_count,
        summary.map_or(0.0, |summary| summary.total_mass)
    ));

    Ok(assembly)
}

/// Entry пригоден, если известны его деталь и все предки, и у каждого предка
/// есть хотя бы один attach node (blueprint уже без циклов)
fn usable_entries(blueprint: &Blueprint, definitions: &[Option<Arc<PartDefinition>>]) -> Vec<bool> {
    (0..blueprint.parts.len())
        .map(|index| {
            let mut current = Some(index);
            while let Some(entry) = current {
                if definitions[entry].is_none() {
                    return false;
                }
                current = blueprint.parts[entry].parent();
                let parent_has_nodes = current
                    .and_then(|parent| definitions[parent].as_ref())
                    .map_or(true, |parent| !parent.attach_nodes.is_empty());
                if !parent_has_nodes {
                    return false;
                }
            }
            true
        })
        .collect()
}

fn spawn_part(
    world: &mut World,
    definition: &Arc<PartDefinition>,
    assembly: Entity,
    config: &VehicleConfig,
    index: usize,
) -> Entity {
    let mut node = PartNode::new(definition.clone());
    node.assembly = Some(assembly);

    let mut entity = world.spawn((
        Name::new(format!("{} #{}", definition.display_name, index)),
        node,
        Transform::IDENTITY,
        ChildOf(assembly),
        ColliderMassProperties::Density(0.0),
    ));
    insert_behaviours(&mut entity, definition, config);
    entity.id()
}

/// Node родителя по id; не найден → warning + node #0
fn resolve_parent_node(world: &World, parent: Entity, id: &str) -> Option<usize> {
    let node = world.get::<PartNode>(parent)?;
    if node.attach_nodes().is_empty() {
        return None;
    }

    match node.find_attach_node(id) {
        Some(index) => Some(index),
        None => {
            log_warning(&format!(
                "Could not find attach node '{}' on '{}', using node #0",
                id,
                node.definition().id
            ));
            Some(0)
        }
    }
}

/// Собственный node; пустой id — стыковка по origin
fn resolve_child_node(world: &World, child: Entity, id: &str) -> Option<usize> {
    if id.is_empty() {
        return None;
    }

    let node = world.get::<PartNode>(child)?;
    match node.find_attach_node(id) {
        Some(index) => Some(index),
        None if node.attach_nodes().is_empty() => None,
        None => {
            log_warning(&format!(
                "Could not find attach node '{}' on '{}', using node #0",
                id,
                node.definition().id
            ));
            Some(0)
        }
    }
}
