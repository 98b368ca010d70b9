//! Attach / detach — мутации логического дерева деталей
//!
//! # Frames
//! - Деталь в сборке: `Transform` во фрейме сборки + `ChildOf(assembly)` (spatial mirror, плоский)
//! - "Свободная" деталь (между detach и новой сборкой): `Transform` = world pose, без `ChildOf`
//! - Деталь в сборке несёт `ColliderMassProperties::Density(0.0)`: коллайдеры внешнего glue
//!   не добавляют массу поверх `AdditionalMassProperties` тела
//!
//! # Flow attach
//! 1. Проверки (индексы nodes, цикл, категория, занятость — warning, не блок)
//! 2. Detach ребёнка, если он уже к кому-то пристыкован
//! 3. Links с обеих сторон
//! 4. Поддерево ребёнка двигается жёстко: own node садится на snap pose родительского node
//! 5. Membership → сборка родителя; donor и recipient пересобираются сразу

use bevy::prelude::*;
use bevy_rapier3d::prelude::ColliderMassProperties;
use std::collections::HashSet;

use super::part_node::{PartLink, PartNode};
use crate::logger::{log, log_warning};
use crate::vehicle::assembly::{rebuild_part_set, VehicleAssembly};

/// Transform сборки (только если entity — живая сборка)
pub fn assembly_transform(world: &World, assembly: Entity) -> Option<Transform> {
    world.get::<VehicleAssembly>(assembly)?;
    world.get::<Transform>(assembly).copied()
}

/// Мировая поза детали
pub fn world_pose(world: &World, part: Entity) -> Option<Transform> {
    let node = world.get::<PartNode>(part)?;
    let local = *world.get::<Transform>(part)?;
    match node.assembly.and_then(|assembly| assembly_transform(world, assembly)) {
        Some(frame) => Some(frame.mul_transform(local)),
        None => Some(local),
    }
}

/// Поза `pose`, выраженная во фрейме `frame` (scale считаем единичным)
pub fn relative_pose(frame: &Transform, pose: &Transform) -> Transform {
    let inverse = frame.rotation.inverse();
    Transform {
        translation: inverse * (pose.translation - frame.translation),
        rotation: (inverse * pose.rotation).normalize(),
        scale: Vec3::ONE,
    }
}

/// Поддерево в pre-order (root первым, children в порядке стыковки)
pub fn subtree(world: &World, root: Entity) -> Vec<Entity> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root];

    while let Some(entity) = stack.pop() {
        let Some(node) = world.get::<PartNode>(entity) else {
            continue;
        };
        if !visited.insert(entity) {
            continue;
        }
        order.push(entity);
        stack.extend(node.children.iter().rev().copied());
    }

    order
}

/// Ставит деталь в мировую позу `pose` и переносит её в `assembly` (None — свободная деталь)
pub(crate) fn place_part(world: &mut World, part: Entity, assembly: Option<Entity>, pose: Transform) {
    let frame = assembly.and_then(|assembly| assembly_transform(world, assembly).map(|frame| (assembly, frame)));

    let Ok(mut entity) = world.get_entity_mut(part) else {
        return;
    };

    match frame {
        Some((assembly, frame)) => {
            // Масса тела целиком из AdditionalMassProperties: коллайдеры деталей без плотности
            entity.insert((
                relative_pose(&frame, &pose),
                ChildOf(assembly),
                ColliderMassProperties::Density(0.0),
            ));
            if let Some(mut node) = entity.get_mut::<PartNode>() {
                node.assembly = Some(assembly);
            }
        }
        None => {
            entity.insert(pose);
            entity.remove::<ChildOf>();
            if let Some(mut node) = entity.get_mut::<PartNode>() {
                node.assembly = None;
            }
        }
    }
}

/// Пристыковать `child` к node `parent_node` детали `parent`
///
/// Возвращает false, если стыковка невозможна (нет деталей, нет node, цикл).
/// Занятый node и несовместимая категория — только warning (last writer wins,
/// прежний occupant отстыковывается вместе с поддеревом).
pub fn attach_to(
    world: &mut World,
    child: Entity,
    parent: Entity,
    parent_node: usize,
    own_node: Option<usize>,
) -> bool {
    if child == parent {
        log_warning(&format!("Part {:?} cannot attach to itself", child));
        return false;
    }

    let (Some(child_part), Some(parent_part)) = (world.get::<PartNode>(child), world.get::<PartNode>(parent)) else {
        log_warning(&format!("attach_to: {:?} or {:?} is not a part", child, parent));
        return false;
    };

    let Some(target_node) = parent_part.attach_node(parent_node).cloned() else {
        log_warning(&format!(
            "Part '{}' has no attach node #{}",
            parent_part.definition().id,
            parent_node
        ));
        return false;
    };

    let own_node = match own_node {
        Some(index) if child_part.attach_node(index).is_none() => {
            log_warning(&format!(
                "Part '{}' has no attach node #{}, attaching by origin",
                child_part.definition().id,
                index
            ));
            None
        }
        other => other,
    };
    let own = own_node.and_then(|index| child_part.attach_node(index).cloned());
    let child_category = child_part.category();
    let child_name = child_part.definition().id.clone();
    let child_has_parent = !child_part.is_root();
    let donor = child_part.assembly;

    if subtree(world, child).contains(&parent) {
        log_warning(&format!(
            "Attaching '{}' under its own descendant would create a cycle, ignored",
            child_name
        ));
        return false;
    }

    if !target_node.accepts(child_category) {
        log_warning(&format!(
            "Attach node '{}' does not accept category {:?} of '{}' (attaching anyway)",
            target_node.id(),
            child_category,
            child_name
        ));
    }

    if let Some(previous) = target_node.occupant {
        if previous != child {
            log_warning(&format!(
                "Attach node '{}' already occupied by {:?}, overwritten by '{}'",
                target_node.id(),
                previous,
                child_name
            ));

            // Вытесненный occupant отстыковывается целиком (обе стороны связи), дальше он свободен
            let displaced = world.get::<PartNode>(previous).and_then(|node| node.parent_link);
            if displaced.is_some_and(|link| link.parent == parent && link.parent_node == parent_node) {
                detach(world, previous);
            }
        }
    }

    if child_has_parent {
        detach(world, child);
    }

    let recipient = world
        .get::<PartNode>(parent)
        .and_then(|node| node.assembly)
        .filter(|assembly| world.get::<VehicleAssembly>(*assembly).is_some());

    // Позы до мутации
    let (Some(parent_world), Some(child_world)) = (world_pose(world, parent), world_pose(world, child)) else {
        return false;
    };
    let target = target_node.occupant_pose(&parent_world, own.as_ref());
    let members: Vec<(Entity, Transform)> = subtree(world, child)
        .into_iter()
        .filter_map(|entity| world_pose(world, entity).map(|pose| (entity, pose)))
        .collect();

    if let Some(mut parent_part) = world.get_mut::<PartNode>(parent) {
        if let Some(node) = parent_part.attach_node_mut(parent_node) {
            node.occupant = Some(child);
        }
        if !parent_part.children.contains(&child) {
            parent_part.children.push(child);
        }
    }

    if let Some(mut child_part) = world.get_mut::<PartNode>(child) {
        if let Some(node) = own_node.and_then(|index| child_part.attach_node_mut(index)) {
            node.occupant = Some(parent);
        }
        child_part.parent_link = Some(PartLink {
            parent,
            parent_node,
            own_node,
        });
    }

    // Жёсткий перенос поддерева: относительные позы внутри поддерева сохраняются
    for (entity, pose) in members {
        let relative = relative_pose(&child_world, &pose);
        place_part(world, entity, recipient, target.mul_transform(relative));
    }

    if donor != recipient {
        if let Some(donor) = donor {
            rebuild_part_set(world, donor);
        }
    }
    if let Some(recipient) = recipient {
        rebuild_part_set(world, recipient);
    }

    log(&format!(
        "🔩 Attached '{}' {:?} → {:?} node '{}'",
        child_name,
        child,
        parent,
        target_node.id()
    ));
    true
}

/// Отстыковать деталь от родителя (вместе с поддеревом)
///
/// На root — no-op (false). Новую сборку НЕ создаёт: это делает вызывающий
/// (`vehicle::separation`), иначе деталь подберёт `adopt_loose_parts` в конце тика.
pub fn detach(world: &mut World, part: Entity) -> bool {
    let Some(node) = world.get::<PartNode>(part) else {
        log_warning(&format!("detach: {:?} is not a part", part));
        return false;
    };
    let Some(link) = node.parent_link else {
        return false;
    };
    let donor = node.assembly;

    let members: Vec<(Entity, Transform)> = subtree(world, part)
        .into_iter()
        .filter_map(|entity| world_pose(world, entity).map(|pose| (entity, pose)))
        .collect();

    if let Some(mut parent) = world.get_mut::<PartNode>(link.parent) {
        if let Some(node) = parent.attach_node_mut(link.parent_node) {
            if node.occupant == Some(part) {
                node.occupant = None;
            }
        }
        parent.children.retain(|child| *child != part);
    }

    if let Some(mut node) = world.get_mut::<PartNode>(part) {
        if let Some(own) = link.own_node.and_then(|index| node.attach_node_mut(index)) {
            if own.occupant == Some(link.parent) {
                own.occupant = None;
            }
        }
        node.parent_link = None;
    }

    for (entity, pose) in members {
        place_part(world, entity, None, pose);
    }

    if let Some(mut assembly) = donor.and_then(|donor| world.get_mut::<VehicleAssembly>(donor)) {
        assembly.mark_structure_dirty();
        assembly.mark_mass_dirty();
    }

    log(&format!("🔓 Detached {:?} from {:?}", part, link.parent));
    true
}
