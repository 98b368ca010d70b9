//! Конфигурация симуляции сборок
//!
//! `VehicleConfig` — resource с константами, которые в прототипе были зашиты в код
//! (mass floor, lifetime эффектов взрыва, tick rate). Defaults hardcoded, можно грузить из RON.

use bevy::prelude::*;
use serde::Deserialize;
use thiserror::Error;

/// Ошибки загрузки конфигурации
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse vehicle config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("invalid vehicle config: {0}")]
    Invalid(String),
}

/// Vehicle simulation config
#[derive(Resource, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Fixed tick rate (Hz)
    pub tick_hz: f64,
    /// Масса, подставляемая когда сумма масс деталей ≤ 0 (иначе NaN в физике)
    pub mass_floor: f32,
    /// Радиус сферы для собственной инерции детали, если в definition не задан
    pub default_inertia_radius: f32,
    /// Время жизни visual-effect entity после взрыва (сек), если в definition не задано
    pub default_effect_lifetime_secs: f32,
    /// Подхватывать "потерянные" root-детали в новую сборку на этапе пересчёта
    pub adopt_loose_parts: bool,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60.0,
            mass_floor: 1.0,
            default_inertia_radius: 0.5,
            default_effect_lifetime_secs: 10.0,
            adopt_loose_parts: true,
        }
    }
}

impl VehicleConfig {
    /// Парсит RON; отсутствующие поля берутся из `Default`
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_hz > 0.0) {
            return Err(ConfigError::Invalid(format!("tick_hz must be > 0, got {}", self.tick_hz)));
        }
        if !(self.mass_floor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "mass_floor must be > 0, got {}",
                self.mass_floor
            )));
        }
        if self.default_inertia_radius < 0.0 {
            return Err(ConfigError::Invalid("default_inertia_radius must be >= 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_ron_partial() {
        let config = VehicleConfig::from_ron("(mass_floor: 2.5)").unwrap();
        assert_eq!(config.mass_floor, 2.5);
        assert_eq!(config.tick_hz, 60.0);
        assert!(config.adopt_loose_parts);
    }

    #[test]
    fn test_config_rejects_zero_floor() {
        let err = VehicleConfig::from_ron("(mass_floor: 0.0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_config_parse_error() {
        let err = VehicleConfig::from_ron("(mass_floor: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
