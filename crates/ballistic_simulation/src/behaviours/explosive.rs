//! Explosive — разрушение детали при ударе сильнее порога

use bevy::prelude::*;

use crate::parts::PartNode;
use crate::vehicle::{explode, PartImpact};

#[derive(Component, Debug, Clone, PartialEq)]
pub struct Explosive {
    /// Порог скорости сближения (м/с), строго больше — взрыв
    pub explosion_velocity: f32,
    /// Effect ids для spawn'а на месте взрыва
    pub effects: Vec<String>,
    pub effect_lifetime_secs: f32,
}

impl Explosive {
    pub fn should_explode(&self, relative_speed: f32) -> bool {
        relative_speed > self.explosion_velocity
    }
}

/// Система (exclusive): PartImpact → explode
///
/// Удары внутри одной сборки игнорируются. Цели собираются до мутаций,
/// одна деталь взрывается максимум один раз за тик.
pub fn process_part_impacts(world: &mut World) {
    let impacts: Vec<PartImpact> = world
        .get_resource_mut::<Events<PartImpact>>()
        .map(|mut events| events.drain().collect())
        .unwrap_or_default();

    let mut targets: Vec<(Entity, Vec<String>, f32)> = Vec::new();
    for impact in impacts {
        let Some(explosive) = world.get::<Explosive>(impact.part) else {
            continue;
        };
        if !explosive.should_explode(impact.relative_speed) {
            continue;
        }

        let owner = world.get::<PartNode>(impact.part).and_then(|node| node.assembly());
        let other_owner = impact
            .other
            .and_then(|other| world.get::<PartNode>(other))
            .and_then(|node| node.assembly());
        if owner.is_some() && owner == other_owner {
            continue;
        }

        if targets.iter().all(|(part, _, _)| *part != impact.part) {
            targets.push((impact.part, explosive.effects.clone(), explosive.effect_lifetime_secs));
        }
    }

    for (part, effects, lifetime) in targets {
        if world.get::<PartNode>(part).is_some() {
            explode(world, part, &effects, lifetime);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        let explosive = Explosive {
            explosion_velocity: 15.0,
            effects: Vec::new(),
            effect_lifetime_secs: 10.0,
        };
        assert!(!explosive.should_explode(15.0));
        assert!(explosive.should_explode(15.1));
    }
}
