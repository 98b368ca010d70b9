//! PropellantTank — переменная масса топлива (mass provider)

use bevy::prelude::*;

use crate::parts::MassProvider;

#[derive(Component, Debug, Clone, PartialEq)]
pub struct PropellantTank {
    propellant_mass_kg: f32,
    capacity_kg: f32,
}

impl PropellantTank {
    /// Полный бак
    pub fn new(capacity_kg: f32) -> Self {
        let capacity_kg = capacity_kg.max(0.0);
        Self {
            propellant_mass_kg: capacity_kg,
            capacity_kg,
        }
    }

    pub fn propellant_mass_kg(&self) -> f32 {
        self.propellant_mass_kg
    }

    pub fn capacity_kg(&self) -> f32 {
        self.capacity_kg
    }

    pub fn fill_fraction(&self) -> f32 {
        if self.capacity_kg > 0.0 {
            self.propellant_mass_kg / self.capacity_kg
        } else {
            0.0
        }
    }

    /// Clamp в [0, capacity]
    pub fn set_propellant(&mut self, mass_kg: f32) {
        self.propellant_mass_kg = mass_kg.clamp(0.0, self.capacity_kg);
    }

    /// Слить до `amount_kg`, возвращает реально слитое
    pub fn drain(&mut self, amount_kg: f32) -> f32 {
        let drained = amount_kg.clamp(0.0, self.propellant_mass_kg);
        self.propellant_mass_kg -= drained;
        drained
    }

    pub fn refill(&mut self) {
        self.propellant_mass_kg = self.capacity_kg;
    }
}

impl MassProvider for PropellantTank {
    fn current_mass(&self) -> f32 {
        self.propellant_mass_kg
    }
}
