//! Mass providers — behaviour-компоненты с переменной массой (баки)
//!
//! Контракт:
//! - Provider — обычный Component + `MassProvider::current_mass()`
//! - Подписка один раз: `app.register_mass_provider::<T>()`
//! - Изменение компонента (Changed<T>) = "mark dirty", масса читается только в recompute set

use bevy::prelude::*;
use std::any::TypeId;

use super::part_node::PartNode;
use crate::vehicle::{VehicleAssembly, VehicleSet};

pub trait MassProvider: Component {
    /// Текущая масса, которую добавляет provider (кг)
    fn current_mass(&self) -> f32;
}

pub trait MassProviderAppExt {
    fn register_mass_provider<T: MassProvider>(&mut self) -> &mut Self;
}

impl MassProviderAppExt for App {
    fn register_mass_provider<T: MassProvider>(&mut self) -> &mut Self {
        self.add_systems(
            FixedUpdate,
            (
                flag_changed_mass_providers::<T>.in_set(VehicleSet::PartMassFlag),
                collect_provider_mass::<T>.in_set(VehicleSet::PartMassCollect),
            ),
        )
    }
}

/// Система: provider изменился → деталь dirty (Changed срабатывает и на первое добавление)
pub fn flag_changed_mass_providers<T: MassProvider>(mut parts: Query<&mut PartNode, Changed<T>>) {
    for mut part in parts.iter_mut() {
        part.mark_mass_dirty();
    }
}

/// Система: для dirty деталей читает provider mass
pub fn collect_provider_mass<T: MassProvider>(mut parts: Query<(&T, &mut PartNode)>) {
    for (provider, mut part) in parts.iter_mut() {
        if part.is_mass_dirty() {
            part.set_provided_mass(TypeId::of::<T>(), provider.current_mass());
        }
    }
}

/// Система: пересчёт массы dirty деталей → сборка-владелец dirty
pub fn recalculate_part_masses(mut parts: Query<&mut PartNode>, mut assemblies: Query<&mut VehicleAssembly>) {
    for mut part in parts.iter_mut() {
        if !part.is_mass_dirty() {
            continue;
        }

        part.recalculate_mass();

        if let Some(mut assembly) = part.assembly().and_then(|a| assemblies.get_mut(a).ok()) {
            assembly.mark_mass_dirty();
        }
    }
}
