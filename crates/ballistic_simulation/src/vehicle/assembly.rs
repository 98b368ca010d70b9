//! VehicleAssembly — одна связная сборка деталей = одно rigid body
//!
//! Инварианты (после каждого AssemblyMass прохода):
//! - `parts` — ровно одно дерево с корнем `root_part`, без циклов
//! - каждая деталь принадлежит ровно одной сборке (`PartNode::assembly` совпадает)
//! - масса/CoM/инерция записаны в `AdditionalMassProperties` rigid body
//!
//! Пересчёт массы отложенный: `mark_mass_dirty()` несколько раз за тик → один recompute.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use bevy_rapier3d::rapier::na;
use rand::RngCore;

use super::events::{emit, AssemblyDestroyed};
use crate::config::VehicleConfig;
use crate::logger::{log, log_info, log_warning};
use crate::parts::hierarchy::{place_part, subtree, world_pose};
use crate::parts::PartNode;
use crate::DeterministicRng;

/// Нижняя граница главных моментов инерции (нулевая инерция лочит вращение в rapier)
const MIN_PRINCIPAL_INERTIA: f32 = 1e-4;

/// Vehicle GUID (из DeterministicRng — воспроизводимо между прогонами)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VehicleId(pub u64);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Главные моменты инерции + ориентация главных осей (во фрейме сборки)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrincipalInertia {
    pub values: Vec3,
    pub frame: Quat,
}

impl Default for PrincipalInertia {
    fn default() -> Self {
        Self {
            values: Vec3::splat(MIN_PRINCIPAL_INERTIA),
            frame: Quat::IDENTITY,
        }
    }
}

#[derive(Component, Debug, Clone)]
pub struct VehicleAssembly {
    id: VehicleId,
    root_part: Entity,
    parts: Vec<Entity>,
    total_mass: f32,
    world_center_of_mass: Vec3,
    local_center_of_mass: Vec3,
    inertia: PrincipalInertia,
    mass_dirty: bool,
    structure_dirty: bool,
}

impl VehicleAssembly {
    pub fn new(id: VehicleId, root_part: Entity) -> Self {
        Self {
            id,
            root_part,
            parts: Vec::new(),
            total_mass: 0.0,
            world_center_of_mass: Vec3::ZERO,
            local_center_of_mass: Vec3::ZERO,
            inertia: PrincipalInertia::default(),
            mass_dirty: true,
            structure_dirty: true,
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn root_part(&self) -> Entity {
        self.root_part
    }

    /// Детали в pre-order от корня
    pub fn parts(&self) -> &[Entity] {
        &self.parts
    }

    pub fn contains(&self, part: Entity) -> bool {
        self.parts.contains(&part)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn total_mass(&self) -> f32 {
        self.total_mass
    }

    pub fn world_center_of_mass(&self) -> Vec3 {
        self.world_center_of_mass
    }

    pub fn local_center_of_mass(&self) -> Vec3 {
        self.local_center_of_mass
    }

    pub fn inertia(&self) -> PrincipalInertia {
        self.inertia
    }

    pub fn is_mass_dirty(&self) -> bool {
        self.mass_dirty
    }

    pub fn is_structure_dirty(&self) -> bool {
        self.structure_dirty
    }

    /// Идемпотентно; пересчёт в AssemblyMass set текущего тика
    pub fn mark_mass_dirty(&mut self) {
        self.mass_dirty = true;
    }

    pub fn mark_structure_dirty(&mut self) {
        self.structure_dirty = true;
    }

    /// Builder: корень известен только после spawn деталей
    pub(crate) fn set_root_part(&mut self, root_part: Entity) {
        self.root_part = root_part;
        self.structure_dirty = true;
    }
}

// ============================================================================
// Mass aggregation (чистая математика, без World)
// ============================================================================

/// Вклад одной детали: масса, позиция во фрейме сборки, радиус собственной инерции
#[derive(Clone, Copy, Debug)]
pub struct MassSample {
    pub mass: f32,
    pub position: Vec3,
    pub inertia_radius: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MassSummary {
    pub total_mass: f32,
    pub center_of_mass: Vec3,
    pub inertia: PrincipalInertia,
    /// true — сработал mass floor (сумма ≤ 0)
    pub floored: bool,
}

impl MassSummary {
    /// Сумма масс, mass-weighted CoM, тензор инерции относительно CoM
    ///
    /// Сумма ≤ 0 → масса = `mass_floor` (иначе NaN в физике), CoM делится на floor.
    pub fn from_samples(samples: &[MassSample], mass_floor: f32, fallback_radius: f32) -> Self {
        let mut total_mass = 0.0;
        let mut weighted = Vec3::ZERO;
        for sample in samples {
            total_mass += sample.mass;
            weighted += sample.position * sample.mass;
        }

        let floored = total_mass <= 0.0;
        if floored {
            total_mass = mass_floor;
        }
        let center_of_mass = weighted / total_mass;

        let inertia = if floored {
            PrincipalInertia {
                values: Vec3::splat((0.4 * mass_floor * fallback_radius * fallback_radius).max(MIN_PRINCIPAL_INERTIA)),
                frame: Quat::IDENTITY,
            }
        } else {
            principal_axes(inertia_tensor(samples, center_of_mass))
        };

        Self {
            total_mass,
            center_of_mass,
            inertia,
            floored,
        }
    }
}

/// Точечные массы (parallel axis) + каждая деталь как сплошная сфера
fn inertia_tensor(samples: &[MassSample], center_of_mass: Vec3) -> Mat3 {
    let mut tensor = Mat3::ZERO;
    for sample in samples {
        let mass = sample.mass.max(0.0);
        let r = sample.position - center_of_mass;
        let outer = Mat3::from_cols(r * r.x, r * r.y, r * r.z);
        let own = 0.4 * mass * sample.inertia_radius * sample.inertia_radius;

        tensor += (Mat3::IDENTITY * r.length_squared() - outer) * mass;
        tensor += Mat3::IDENTITY * own;
    }
    tensor
}

/// Диагонализация симметричного тензора (nalgebra из rapier)
fn principal_axes(tensor: Mat3) -> PrincipalInertia {
    let matrix = na::Matrix3::new(
        tensor.x_axis.x,
        tensor.y_axis.x,
        tensor.z_axis.x,
        tensor.x_axis.y,
        tensor.y_axis.y,
        tensor.z_axis.y,
        tensor.x_axis.z,
        tensor.y_axis.z,
        tensor.z_axis.z,
    );
    let eigen = matrix.symmetric_eigen();

    let axis = |i: usize| {
        let column = eigen.eigenvectors.column(i);
        Vec3::new(column[0], column[1], column[2]).normalize_or_zero()
    };
    let (x, y, mut z) = (axis(0), axis(1), axis(2));

    // Правая тройка, иначе кватернион не получится
    if x.cross(y).dot(z) < 0.0 {
        z = -z;
    }

    let frame = Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize();
    let frame = if frame.is_finite() { frame } else { Quat::IDENTITY };

    PrincipalInertia {
        values: Vec3::new(eigen.eigenvalues[0], eigen.eigenvalues[1], eigen.eigenvalues[2])
            .max(Vec3::splat(MIN_PRINCIPAL_INERTIA)),
        frame,
    }
}

// ============================================================================
// World operations
// ============================================================================

fn next_vehicle_id(world: &mut World) -> VehicleId {
    match world.get_resource_mut::<DeterministicRng>() {
        Some(mut rng) => VehicleId(rng.rng.next_u64()),
        None => VehicleId(rand::random()),
    }
}

/// Spawn пустой сборки (rigid body) в позе `pose`
pub fn spawn_assembly(world: &mut World, pose: Transform, linear_velocity: Vec3, root_part: Entity) -> Entity {
    let id = next_vehicle_id(world);

    world
        .spawn((
            Name::new(format!("Vehicle {}", id)),
            VehicleAssembly::new(id, root_part),
            pose,
            RigidBody::Dynamic,
            Velocity::linear(linear_velocity),
            ExternalForce::default(),
            ExternalImpulse::default(),
            AdditionalMassProperties::Mass(0.0),
        ))
        .id()
}

/// Новая сборка для свободного поддерева с корнем `root_part` (origin = поза корня)
pub fn spawn_assembly_for(world: &mut World, root_part: Entity, linear_velocity: Vec3) -> Option<Entity> {
    let Some(mut pose) = world_pose(world, root_part) else {
        log_warning(&format!("spawn_assembly_for: {:?} is not a part", root_part));
        return None;
    };
    pose.scale = Vec3::ONE;

    let members: Vec<(Entity, Transform)> = subtree(world, root_part)
        .into_iter()
        .filter_map(|entity| world_pose(world, entity).map(|pose| (entity, pose)))
        .collect();

    let assembly = spawn_assembly(world, pose, linear_velocity, root_part);
    for (entity, pose) in members {
        place_part(world, entity, Some(assembly), pose);
    }

    rebuild_part_set(world, assembly);
    Some(assembly)
}

/// Полный re-scan дерева от `root_part` → `parts`
///
/// Если корень больше не корень (пристыкован к другой сборке) или исчез — сборка пустеет
/// и будет снесена в teardown. Детали, выпавшие из дерева, освобождаются (world pose).
pub fn rebuild_part_set(world: &mut World, assembly: Entity) -> usize {
    let Some(current) = world.get::<VehicleAssembly>(assembly) else {
        return 0;
    };
    let root = current.root_part;
    let previous = current.parts.clone();

    let root_valid = world
        .get::<PartNode>(root)
        .is_some_and(|node| node.is_root() && node.assembly.map_or(true, |owner| owner == assembly));
    let parts = if root_valid { subtree(world, root) } else { Vec::new() };

    // Детали дерева, которые ещё не числятся за этой сборкой
    for &part in &parts {
        let owner = world.get::<PartNode>(part).and_then(|node| node.assembly);
        if owner != Some(assembly) {
            if let Some(pose) = world_pose(world, part) {
                place_part(world, part, Some(assembly), pose);
            }
        }
    }

    // Выпавшие детали, которые всё ещё ссылаются на нас
    for stray in previous.into_iter().filter(|part| !parts.contains(part)) {
        let still_ours = world
            .get::<PartNode>(stray)
            .is_some_and(|node| node.assembly == Some(assembly));
        if still_ours {
            log_warning(&format!("Part {:?} fell out of vehicle tree {:?}, released", stray, assembly));
            if let Some(pose) = world_pose(world, stray) {
                place_part(world, stray, None, pose);
            }
        }
    }

    let count = parts.len();
    if let Some(mut assembly) = world.get_mut::<VehicleAssembly>(assembly) {
        assembly.parts = parts;
        assembly.structure_dirty = false;
        assembly.mass_dirty = true;
    }
    count
}

/// Масса / CoM / инерция → VehicleAssembly + rigid body
pub fn recalculate_mass(world: &mut World, assembly: Entity) -> Option<MassSummary> {
    let config = world.get_resource::<VehicleConfig>().cloned().unwrap_or_default();
    let frame = *world.get::<Transform>(assembly)?;
    let current = world.get::<VehicleAssembly>(assembly)?;

    let samples: Vec<MassSample> = current
        .parts
        .iter()
        .filter_map(|&part| {
            let node = world.get::<PartNode>(part)?;
            let local = world.get::<Transform>(part)?;
            Some(MassSample {
                mass: node.mass_contribution(),
                position: local.translation,
                inertia_radius: node.definition().inertia_radius.unwrap_or(config.default_inertia_radius),
            })
        })
        .collect();

    let summary = MassSummary::from_samples(&samples, config.mass_floor, config.default_inertia_radius);
    if summary.floored {
        log(&format!(
            "Vehicle {:?} has no positive mass, using floor {} kg",
            assembly, summary.total_mass
        ));
    }

    let mut entity = world.entity_mut(assembly);
    if let Some(mut vehicle) = entity.get_mut::<VehicleAssembly>() {
        vehicle.total_mass = summary.total_mass;
        vehicle.local_center_of_mass = summary.center_of_mass;
        vehicle.world_center_of_mass = frame.transform_point(summary.center_of_mass);
        vehicle.inertia = summary.inertia;
        vehicle.mass_dirty = false;
    }
    entity.insert(AdditionalMassProperties::MassProperties(MassProperties {
        local_center_of_mass: summary.center_of_mass,
        mass: summary.total_mass,
        principal_inertia_local_frame: summary.inertia.frame,
        principal_inertia: summary.inertia.values,
    }));

    Some(summary)
}

// ============================================================================
// Systems (VehicleSet::AssemblyMass)
// ============================================================================

/// Система: свободные root-детали (без живой сборки или не её root) → новая сборка
pub fn adopt_loose_parts(world: &mut World) {
    let enabled = world
        .get_resource::<VehicleConfig>()
        .map_or(true, |config| config.adopt_loose_parts);
    if !enabled {
        return;
    }

    let mut query = world.query::<(Entity, &PartNode)>();
    let candidates: Vec<(Entity, Option<Entity>)> = query
        .iter(world)
        .filter(|(_, node)| node.is_root())
        .map(|(entity, node)| (entity, node.assembly))
        .collect();

    // Root-деталь принадлежит сборке, только если она и есть её root_part
    for (part, owner) in candidates {
        let owned = owner.is_some_and(|owner| {
            world
                .get::<VehicleAssembly>(owner)
                .is_some_and(|vehicle| vehicle.root_part == part)
        });
        if owned {
            continue;
        }

        log_warning(&format!("Loose part {:?} has no vehicle, adopting into a new one", part));
        if let Some(assembly) = spawn_assembly_for(world, part, Vec3::ZERO) {
            recalculate_mass(world, assembly);
        }
    }
}

/// Система: rebuild + recompute для dirty сборок (один раз за тик)
pub fn refresh_dirty_assemblies(world: &mut World) {
    let mut query = world.query::<(Entity, &VehicleAssembly)>();
    let dirty: Vec<(Entity, bool)> = query
        .iter(world)
        .filter(|(_, assembly)| assembly.structure_dirty || assembly.mass_dirty)
        .map(|(entity, assembly)| (entity, assembly.structure_dirty))
        .collect();

    for (assembly, structure_dirty) in dirty {
        if structure_dirty {
            rebuild_part_set(world, assembly);
        }
        recalculate_mass(world, assembly);
    }
}

/// Система: сборка без деталей сносится
pub fn teardown_empty_assemblies(
    mut commands: Commands,
    assemblies: Query<(Entity, &VehicleAssembly)>,
    mut destroyed: EventWriter<AssemblyDestroyed>,
) {
    for (entity, assembly) in assemblies.iter() {
        if !assembly.is_empty() || assembly.structure_dirty {
            continue;
        }

        log_info(&format!("🗑️ Vehicle {} {:?} has no parts, despawning", assembly.id, entity));
        commands.entity(entity).despawn();
        destroyed.write(AssemblyDestroyed {
            assembly: entity,
            id: assembly.id,
        });
    }
}

/// Немедленный rebuild + recompute (после структурной мутации)
pub fn refresh_assembly(world: &mut World, assembly: Entity) -> Option<MassSummary> {
    rebuild_part_set(world, assembly);
    recalculate_mass(world, assembly)
}

/// Снести пустую сборку прямо сейчас (вне системы teardown)
pub(crate) fn despawn_if_empty(world: &mut World, assembly: Entity) -> bool {
    let Some(vehicle) = world.get::<VehicleAssembly>(assembly) else {
        return false;
    };
    if !vehicle.is_empty() {
        return false;
    }

    let id = vehicle.id;
    world.despawn(assembly);
    emit(world, AssemblyDestroyed { assembly, id });
    true
}
