//! Vehicle events
//!
//! Входящие (от игрока / collision layer): DecoupleRequest, PartImpact
//! Исходящие: VehicleSeparated, AssemblyDestroyed

use bevy::prelude::*;

use super::assembly::VehicleId;

/// Запрос: сработать decoupler
#[derive(Event, Debug, Clone)]
pub struct DecoupleRequest {
    pub decoupler: Entity,
}

/// Удар детали (от внешнего collision слоя)
///
/// `relative_speed` — скорость сближения в момент контакта (м/с).
#[derive(Event, Debug, Clone)]
pub struct PartImpact {
    pub part: Entity,
    /// Вторая сторона контакта (None — земля / не-деталь)
    pub other: Option<Entity>,
    pub relative_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationCause {
    Decouple,
    Overstress,
}

/// Сборка раскололась: `fragment` — новая сборка, отколовшаяся от `donor`
#[derive(Event, Debug, Clone)]
pub struct VehicleSeparated {
    pub donor: Entity,
    pub fragment: Entity,
    pub cause: SeparationCause,
}

/// Сборка удалена (не осталось деталей)
#[derive(Event, Debug, Clone)]
pub struct AssemblyDestroyed {
    pub assembly: Entity,
    pub id: VehicleId,
}

/// Отправка события из exclusive контекста (без plugin'а Events ресурса может не быть)
pub(crate) fn emit<E: Event>(world: &mut World, event: E) {
    if world.contains_resource::<Events<E>>() {
        world.send_event(event);
    }
}
