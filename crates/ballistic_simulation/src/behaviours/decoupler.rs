//! Decoupler — одноразовое разделение по DecoupleRequest

use bevy::prelude::*;

use crate::logger::{log, log_warning};
use crate::vehicle::{decouple, DecoupleRequest};

#[derive(Component, Debug, Clone, PartialEq)]
pub struct Decoupler {
    /// Импульс пары (Н·с); 0 — без толчка
    pub impulse: f32,
    fired: bool,
}

impl Decoupler {
    pub fn new(impulse: f32) -> Self {
        Self {
            impulse: impulse.max(0.0),
            fired: false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired
    }
}

/// Система (exclusive): DecoupleRequest → decouple
///
/// Decoupler срабатывает один раз. Если разделять нечего (или нет владельца),
/// decoupler остаётся взведённым.
pub fn process_decouple_requests(world: &mut World) {
    let requests: Vec<DecoupleRequest> = world
        .get_resource_mut::<Events<DecoupleRequest>>()
        .map(|mut events| events.drain().collect())
        .unwrap_or_default();

    for request in requests {
        let Some(mut decoupler) = world.get_mut::<Decoupler>(request.decoupler) else {
            log_warning(&format!("DecoupleRequest for {:?}: not a decoupler", request.decoupler));
            continue;
        };
        if decoupler.fired {
            log(&format!("Decoupler {:?} already fired, request ignored", request.decoupler));
            continue;
        }
        decoupler.fired = true;
        let impulse = decoupler.impulse;

        if decouple(world, request.decoupler, impulse).is_none() {
            if let Some(mut decoupler) = world.get_mut::<Decoupler>(request.decoupler) {
                decoupler.fired = false;
            }
        }
    }
}
