//! Runtime attach node: сокет конкретной детали + текущий occupant
//!
//! Стыковка симметричная (dual-slot): parent node хранит child entity,
//! node ребёнка хранит parent entity. Occupant — слабая ссылка, ownership через `PartNode`.

use bevy::prelude::*;
use std::f32::consts::PI;
use std::sync::Arc;

use super::definition::{AttachNodeDef, PartCategory};

#[derive(Clone, Debug)]
pub struct AttachNode {
    def: Arc<AttachNodeDef>,
    /// Кто сейчас пристыкован (None — свободен)
    pub occupant: Option<Entity>,
}

impl AttachNode {
    pub fn new(def: Arc<AttachNodeDef>) -> Self {
        Self { def, occupant: None }
    }

    pub fn def(&self) -> &AttachNodeDef {
        &self.def
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    /// Проверка совместимости категории (не enforce — только для warning)
    pub fn accepts(&self, candidate: PartCategory) -> bool {
        self.def.accepts_mask.intersects(candidate)
    }

    pub fn world_position(&self, owner_world: &Transform) -> Vec3 {
        owner_world.transform_point(self.def.local_position)
    }

    pub fn world_direction(&self, owner_world: &Transform) -> Vec3 {
        owner_world.rotation * self.def.local_direction
    }

    /// Ориентация сокета в фрейме детали: -Z смотрит вдоль direction
    pub fn local_frame(&self) -> Quat {
        let direction = self.def.local_direction;
        look_rotation(direction, up_hint(direction))
    }

    /// Поза, которую должен принять node стыкуемой детали
    pub fn snap_pose(&self, owner_world: &Transform) -> Transform {
        Transform {
            translation: self.world_position(owner_world),
            rotation: (owner_world.rotation * self.local_frame()).normalize(),
            scale: Vec3::ONE,
        }
    }

    /// Мировая поза стыкуемой детали (nose-to-tail)
    ///
    /// С `own` — own node садится на snap point, его direction противоположен нашему.
    /// Без `own` — origin детали принимает snap pose.
    pub fn occupant_pose(&self, owner_world: &Transform, own: Option<&AttachNode>) -> Transform {
        let snap = self.snap_pose(owner_world);
        let Some(own) = own else {
            return snap;
        };

        // Разворот на 180° вокруг up: -Z → +Z, up остаётся
        let rotation = (snap.rotation * Quat::from_rotation_y(PI) * own.local_frame().inverse()).normalize();
        Transform {
            translation: snap.translation - rotation * own.def.local_position,
            rotation,
            scale: Vec3::ONE,
        }
    }
}

/// "Up" фрейма сокета: +Y детали, либо +Z если direction почти параллелен Y
fn up_hint(direction: Vec3) -> Vec3 {
    if direction.dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// Rotation, при которой -Z смотрит вдоль `direction`, +Y ближе всего к `up`
fn look_rotation(direction: Vec3, up: Vec3) -> Quat {
    let back = -direction.normalize();
    let right = up.cross(back).normalize();
    let up = back.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, back))
}
