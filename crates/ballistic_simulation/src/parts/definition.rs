//! Part definitions — статические данные деталей
//!
//! # Архитектура
//!
//! **PartDefinition** — immutable blueprint одного типа детали (id + category + mass + attach nodes):
//! - Хранится в `PartCatalog` resource (HashMap lookup)
//! - Runtime `PartNode` держит `Arc<PartDefinition>`, копий нет
//! - Hardcoded stock детали в `PartCatalog::stock()`, остальное из RON
//!
//! **AttachNodeDef** — сокет на детали: id, маска допустимых категорий, позиция и направление
//! в локальном фрейме детали.

use bevy::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::ops::{BitAnd, BitOr};
use std::sync::Arc;

use crate::config::ConfigError;

// ============================================================================
// PartCategory
// ============================================================================

/// Битовая маска категорий деталей (комбинируется через `|`)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct PartCategory(pub u32);

impl PartCategory {
    pub const NONE: Self = Self(0);
    pub const ENGINE: Self = Self(1 << 0);
    pub const TANK: Self = Self(1 << 1);
    pub const DECOUPLER: Self = Self(1 << 2);
    pub const STRUCTURAL: Self = Self(1 << 3);
    pub const EXPLOSIVE: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);

    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PartCategory {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for PartCategory {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

// ============================================================================
// PartId
// ============================================================================

/// Part type identifier (unique string ID)
///
/// # Examples
/// - "tank_small"
/// - "decoupler_radial"
/// - "engine_small"
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct PartId(pub String);

impl From<&str> for PartId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for PartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// AttachNodeDef
// ============================================================================

/// Описание attach node (design-time, read-only)
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "AttachNodeDefData")]
pub struct AttachNodeDef {
    /// Уникальный id внутри типа детали (например "bottom", "engine_mount_1")
    pub id: String,
    /// Какие категории могут пристыковаться сюда
    pub accepts_mask: PartCategory,
    /// Позиция сокета в фрейме детали
    pub local_position: Vec3,
    /// Направление сокета (unit vector) в фрейме детали
    pub local_direction: Vec3,
}

impl AttachNodeDef {
    /// Нулевое направление заменяется на forward (-Z), остальное нормализуется
    pub fn new(id: impl Into<String>, accepts_mask: PartCategory, local_position: Vec3, local_direction: Vec3) -> Self {
        Self {
            id: id.into(),
            accepts_mask,
            local_position,
            local_direction: local_direction.try_normalize().unwrap_or(Vec3::NEG_Z),
        }
    }
}

/// Формат в RON: векторы как массивы, без зависимости от serde-фичи glam
#[derive(Deserialize)]
struct AttachNodeDefData {
    id: String,
    accepts_mask: PartCategory,
    #[serde(default)]
    local_position: [f32; 3],
    #[serde(default)]
    local_direction: [f32; 3],
}

impl From<AttachNodeDefData> for AttachNodeDef {
    fn from(data: AttachNodeDefData) -> Self {
        Self::new(
            data.id,
            data.accepts_mask,
            Vec3::from_array(data.local_position),
            Vec3::from_array(data.local_direction),
        )
    }
}

// ============================================================================
// PartBehaviourDef
// ============================================================================

/// Behaviour modules детали (превращаются в компоненты при спавне)
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub enum PartBehaviourDef {
    /// Бак: variable mass provider
    Tank { propellant_mass_kg: f32 },
    /// Двигатель: continuous thrust + gimbal с ограничением скорости
    Engine {
        max_thrust_newtons: f32,
        /// Max gimbal (x, y) в градусах
        max_gimbal_degrees: [f32; 2],
        /// Скорость поворота gimbal (град/сек)
        gimbal_rate_degrees: f32,
    },
    /// Декаплер: planned separation + impulse pair
    Decoupler { decouple_impulse: f32 },
    /// Взрывается при столкновении быстрее порога
    Explosive {
        explosion_velocity: f32,
        #[serde(default)]
        effects: Vec<String>,
        #[serde(default)]
        effect_lifetime_secs: Option<f32>,
    },
}

impl PartBehaviourDef {
    /// Design-time вклад в массу (для summary в каталоге)
    pub fn mass_contribution(&self) -> f32 {
        match self {
            PartBehaviourDef::Tank { propellant_mass_kg } => *propellant_mass_kg,
            _ => 0.0,
        }
    }
}

// ============================================================================
// PartDefinition
// ============================================================================

/// Static part definition
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PartDefinition {
    pub id: PartId,
    pub display_name: String,
    pub category: PartCategory,
    pub dry_mass_kg: f32,
    #[serde(default)]
    pub attach_nodes: Vec<Arc<AttachNodeDef>>,
    #[serde(default)]
    pub behaviours: Vec<PartBehaviourDef>,
    /// Радиус сферы для собственной инерции (None → `VehicleConfig::default_inertia_radius`)
    #[serde(default)]
    pub inertia_radius: Option<f32>,
}

impl PartDefinition {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, category: PartCategory, dry_mass_kg: f32) -> Self {
        Self {
            id: PartId(id.into()),
            display_name: display_name.into(),
            category,
            dry_mass_kg,
            attach_nodes: Vec::new(),
            behaviours: Vec::new(),
            inertia_radius: None,
        }
    }

    pub fn with_node(mut self, node: AttachNodeDef) -> Self {
        self.attach_nodes.push(Arc::new(node));
        self
    }

    pub fn with_behaviour(mut self, behaviour: PartBehaviourDef) -> Self {
        self.behaviours.push(behaviour);
        self
    }

    pub fn with_inertia_radius(mut self, radius: f32) -> Self {
        self.inertia_radius = Some(radius);
        self
    }

    /// Dry mass + design-time масса behaviour modules (propellant)
    pub fn total_mass_kg(&self) -> f32 {
        self.dry_mass_kg
            + self
                .behaviours
                .iter()
                .map(PartBehaviourDef::mass_contribution)
                .sum::<f32>()
    }

    /// Индекс первого node с таким id
    pub fn attach_node_index(&self, id: &str) -> Option<usize> {
        self.attach_nodes.iter().position(|node| node.id == id)
    }

    /// Id, которые встречаются больше одного раза (lookup берёт первый)
    pub fn duplicate_attach_node_ids(&self) -> Vec<String> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for node in &self.attach_nodes {
            *seen.entry(node.id.as_str()).or_default() += 1;
        }
        let mut duplicates: Vec<String> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id.to_string())
            .collect();
        duplicates.sort();
        duplicates
    }
}

// ============================================================================
// PartCatalog
// ============================================================================

/// Registry всех part definitions (resource)
#[derive(Resource, Debug, Clone, Default)]
pub struct PartCatalog {
    definitions: HashMap<PartId, Arc<PartDefinition>>,
}

#[derive(Deserialize)]
struct CatalogFile {
    parts: Vec<PartDefinition>,
}

impl PartCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stock детали прототипа
    pub fn stock() -> Self {
        let mut catalog = Self::empty();
        for definition in stock_parts() {
            catalog.insert(definition);
        }
        catalog
    }

    /// Парсит RON `(parts: [...])`
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = ron::from_str(text)?;
        let mut catalog = Self::empty();
        for definition in file.parts {
            catalog.insert(definition);
        }
        Ok(catalog)
    }

    /// Повторный insert с тем же id заменяет definition
    pub fn insert(&mut self, definition: PartDefinition) -> Arc<PartDefinition> {
        let duplicates = definition.duplicate_attach_node_ids();
        if !duplicates.is_empty() {
            crate::logger::log_warning(&format!(
                "Part '{}' has duplicate attach node ids {:?}, lookup uses the first match",
                definition.id, duplicates
            ));
        }

        let definition = Arc::new(definition);
        self.definitions.insert(definition.id.clone(), definition.clone());
        definition
    }

    pub fn get(&self, id: &PartId) -> Option<&Arc<PartDefinition>> {
        self.definitions.get(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn stock_parts() -> Vec<PartDefinition> {
    let stackable = PartCategory::TANK | PartCategory::DECOUPLER | PartCategory::STRUCTURAL | PartCategory::EXPLOSIVE;
    let below = PartCategory::ENGINE | PartCategory::TANK | PartCategory::DECOUPLER;

    vec![
        PartDefinition::new("tank_small", "Small Propellant Tank", PartCategory::TANK, 100.0)
            .with_node(AttachNodeDef::new("top", stackable, Vec3::new(0.0, 1.0, 0.0), Vec3::Y))
            .with_node(AttachNodeDef::new("bottom", below, Vec3::new(0.0, -1.0, 0.0), Vec3::NEG_Y))
            .with_behaviour(PartBehaviourDef::Tank { propellant_mass_kg: 400.0 })
            .with_inertia_radius(0.6),
        PartDefinition::new("decoupler", "Stack Decoupler", PartCategory::DECOUPLER, 20.0)
            .with_node(AttachNodeDef::new("top", stackable | PartCategory::ENGINE, Vec3::new(0.0, 0.1, 0.0), Vec3::Y))
            .with_node(AttachNodeDef::new("bottom", below, Vec3::new(0.0, -0.1, 0.0), Vec3::NEG_Y))
            .with_behaviour(PartBehaviourDef::Decoupler { decouple_impulse: 50.0 })
            .with_inertia_radius(0.5),
        PartDefinition::new("engine_small", "Small Liquid Engine", PartCategory::ENGINE, 150.0)
            .with_node(AttachNodeDef::new("top", stackable, Vec3::new(0.0, 0.5, 0.0), Vec3::Y))
            .with_behaviour(PartBehaviourDef::Engine {
                max_thrust_newtons: 20_000.0,
                max_gimbal_degrees: [5.0, 5.0],
                gimbal_rate_degrees: 10.0,
            })
            .with_inertia_radius(0.4),
        PartDefinition::new(
            "warhead",
            "Warhead",
            PartCategory::EXPLOSIVE | PartCategory::STRUCTURAL,
            50.0,
        )
        .with_node(AttachNodeDef::new("bottom", stackable | below, Vec3::new(0.0, -0.5, 0.0), Vec3::NEG_Y))
        .with_behaviour(PartBehaviourDef::Explosive {
            explosion_velocity: 15.0,
            effects: vec!["explosion_fireball".into(), "explosion_smoke".into()],
            effect_lifetime_secs: Some(10.0),
        })
        .with_inertia_radius(0.3),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mask() {
        let mask = PartCategory::ENGINE | PartCategory::TANK;
        assert!(mask.intersects(PartCategory::TANK));
        assert!(!mask.intersects(PartCategory::DECOUPLER));
        assert!(mask.contains(PartCategory::ENGINE));
        assert!(PartCategory::NONE.is_empty());
    }

    #[test]
    fn test_attach_node_direction_normalized() {
        let node = AttachNodeDef::new("a", PartCategory::ALL, Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(node.local_direction, Vec3::Y);

        let fallback = AttachNodeDef::new("b", PartCategory::ALL, Vec3::ZERO, Vec3::ZERO);
        assert_eq!(fallback.local_direction, Vec3::NEG_Z);
    }

    #[test]
    fn test_total_mass_includes_propellant() {
        let catalog = PartCatalog::stock();
        let tank = catalog.get(&"tank_small".into()).unwrap();
        assert_eq!(tank.dry_mass_kg, 100.0);
        assert_eq!(tank.total_mass_kg(), 500.0);
    }

    #[test]
    fn test_duplicate_attach_node_ids() {
        let def = PartDefinition::new("dup", "Dup", PartCategory::STRUCTURAL, 1.0)
            .with_node(AttachNodeDef::new("a", PartCategory::ALL, Vec3::ZERO, Vec3::Y))
            .with_node(AttachNodeDef::new("a", PartCategory::ALL, Vec3::ONE, Vec3::Y))
            .with_node(AttachNodeDef::new("b", PartCategory::ALL, Vec3::ZERO, Vec3::Y));

        assert_eq!(def.duplicate_attach_node_ids(), vec!["a".to_string()]);
        assert_eq!(def.attach_node_index("a"), Some(0));
        assert_eq!(def.attach_node_index("missing"), None);
    }

    #[test]
    fn test_catalog_from_ron() {
        let text = r#"(
            parts: [
                (
                    id: "fin",
                    display_name: "Fin",
                    category: 8,
                    dry_mass_kg: 5.0,
                    attach_nodes: [
                        (id: "root", accepts_mask: 31, local_position: (0.0, 0.0, 0.0), local_direction: (1.0, 0.0, 0.0)),
                    ],
                ),
                (
                    id: "tank_tiny",
                    display_name: "Tiny Tank",
                    category: 2,
                    dry_mass_kg: 10.0,
                    behaviours: [Tank(propellant_mass_kg: 40.0)],
                ),
            ],
        )"#;

        let catalog = PartCatalog::from_ron(text).unwrap();
        assert_eq!(catalog.len(), 2);

        let fin = catalog.get(&"fin".into()).unwrap();
        assert_eq!(fin.category, PartCategory::STRUCTURAL);
        assert_eq!(fin.attach_nodes[0].local_direction, Vec3::X);

        let tank = catalog.get(&"tank_tiny".into()).unwrap();
        assert_eq!(tank.total_mass_kg(), 50.0);
    }
}
