//! Blueprint — design-time рецепт сборки
//!
//! Плоский список `PartEntry`; дерево задаётся через `parent_index` (-1 = root).
//! Формат RON:
//! ```ron
//! (
//!     display_name: "Sounding Rocket",
//!     parts: [
//!         (part: "tank_small"),
//!         (part: "decoupler", parent_index: 0, parent_attach_node: "bottom", child_attach_node: "top"),
//!     ],
//! )
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::parts::{PartCatalog, PartId};

#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error("blueprint has no parts")]
    Empty,

    #[error("blueprint has no root part (parent_index = -1)")]
    NoRoot,

    #[error("blueprint has multiple root parts: {0:?}")]
    MultipleRoots(Vec<usize>),

    #[error("entry #{entry}: parent index {parent} out of range")]
    ParentOutOfRange { entry: usize, parent: i32 },

    #[error("entry #{entry} is its own parent")]
    SelfParent { entry: usize },

    #[error("entry #{entry} does not reach the root (parent cycle)")]
    Cycle { entry: usize },

    #[error("root entry #{entry}: unknown part '{part}'")]
    UnknownPart { entry: usize, part: PartId },

    #[error("no PartCatalog resource in world")]
    MissingCatalog,

    #[error("failed to parse blueprint: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

fn root_index() -> i32 {
    -1
}

/// Одна деталь в blueprint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PartEntry {
    pub part: PartId,
    /// Индекс родителя в `Blueprint::parts` (-1 — root)
    #[serde(default = "root_index")]
    pub parent_index: i32,
    /// Node на родителе
    #[serde(default)]
    pub parent_attach_node: String,
    /// Node на этой детали (пусто — стыковка по origin)
    #[serde(default)]
    pub child_attach_node: String,
}

impl PartEntry {
    pub fn root(part: impl Into<PartId>) -> Self {
        Self {
            part: part.into(),
            parent_index: root_index(),
            parent_attach_node: String::new(),
            child_attach_node: String::new(),
        }
    }

    pub fn child(
        part: impl Into<PartId>,
        parent_index: i32,
        parent_attach_node: impl Into<String>,
        child_attach_node: impl Into<String>,
    ) -> Self {
        Self {
            part: part.into(),
            parent_index,
            parent_attach_node: parent_attach_node.into(),
            child_attach_node: child_attach_node.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// Индекс родителя (None для root)
    pub fn parent(&self) -> Option<usize> {
        usize::try_from(self.parent_index).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parts: Vec<PartEntry>,
}

impl Blueprint {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            description: String::new(),
            parts: Vec::new(),
        }
    }

    pub fn with_part(mut self, entry: PartEntry) -> Self {
        self.parts.push(entry);
        self
    }

    pub fn from_ron(text: &str) -> Result<Self, BlueprintError> {
        Ok(ron::from_str(text)?)
    }

    /// Структурная проверка; возвращает индекс root entry
    pub fn validate(&self) -> Result<usize, BlueprintError> {
        if self.parts.is_empty() {
            return Err(BlueprintError::Empty);
        }

        let roots: Vec<usize> = self
            .parts
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_root())
            .map(|(index, _)| index)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(BlueprintError::NoRoot),
            [root] => *root,
            _ => return Err(BlueprintError::MultipleRoots(roots)),
        };

        for (index, entry) in self.parts.iter().enumerate() {
            let Some(parent) = entry.parent() else {
                continue;
            };
            if parent >= self.parts.len() {
                return Err(BlueprintError::ParentOutOfRange {
                    entry: index,
                    parent: entry.parent_index,
                });
            }
            if parent == index {
                return Err(BlueprintError::SelfParent { entry: index });
            }
        }

        // Каждая цепочка родителей должна дойти до root не более чем за len шагов
        for index in 0..self.parts.len() {
            let mut current = index;
            let mut steps = 0;
            while let Some(parent) = self.parts[current].parent() {
                current = parent;
                steps += 1;
                if steps > self.parts.len() {
                    return Err(BlueprintError::Cycle { entry: index });
                }
            }
        }

        Ok(root)
    }

    /// Σ dry mass известных деталей (без топлива)
    pub fn dry_mass_kg(&self, catalog: &PartCatalog) -> f32 {
        self.parts
            .iter()
            .filter_map(|entry| catalog.get(&entry.part))
            .map(|definition| definition.dry_mass_kg)
            .sum()
    }
}
