//! PartNode — runtime компонент одной физической детали
//!
//! Логическое дерево живёт здесь (parent_link + children), а не в transform hierarchy движка.
//! Transform детали выражен во фрейме её сборки (`VehicleAssembly` entity).

use bevy::prelude::*;
use std::any::TypeId;
use std::sync::Arc;

use super::attach_node::AttachNode;
use super::definition::{PartCategory, PartDefinition};

/// Связь с родителем: какой node родителя занят и каким node детали
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartLink {
    pub parent: Entity,
    /// Индекс attach node на родителе
    pub parent_node: usize,
    /// Индекс собственного attach node (None — стыковка по origin)
    pub own_node: Option<usize>,
}

/// Деталь в дереве сборки
///
/// Инвариант: `children` содержит ровно те entity, чей `parent_link.parent` == self.
#[derive(Component, Debug, Clone)]
pub struct PartNode {
    definition: Arc<PartDefinition>,
    attach_nodes: Vec<AttachNode>,
    pub(crate) parent_link: Option<PartLink>,
    pub(crate) children: Vec<Entity>,
    /// Владелец (явная ссылка вместо поиска по иерархии)
    pub(crate) assembly: Option<Entity>,
    mass_contribution: f32,
    mass_dirty: bool,
    /// Последние значения от mass providers (по типу компонента)
    provided_mass: Vec<(TypeId, f32)>,
}

impl PartNode {
    /// Attach nodes создаются один раз из definition
    pub fn new(definition: Arc<PartDefinition>) -> Self {
        let attach_nodes = definition
            .attach_nodes
            .iter()
            .cloned()
            .map(AttachNode::new)
            .collect();
        let mass_contribution = definition.total_mass_kg();

        Self {
            definition,
            attach_nodes,
            parent_link: None,
            children: Vec::new(),
            assembly: None,
            mass_contribution,
            mass_dirty: true,
            provided_mass: Vec::new(),
        }
    }

    pub fn definition(&self) -> &Arc<PartDefinition> {
        &self.definition
    }

    pub fn category(&self) -> PartCategory {
        self.definition.category
    }

    pub fn attach_nodes(&self) -> &[AttachNode] {
        &self.attach_nodes
    }

    pub fn attach_node(&self, index: usize) -> Option<&AttachNode> {
        self.attach_nodes.get(index)
    }

    pub(crate) fn attach_node_mut(&mut self, index: usize) -> Option<&mut AttachNode> {
        self.attach_nodes.get_mut(index)
    }

    /// Первый node с таким id
    pub fn find_attach_node(&self, id: &str) -> Option<usize> {
        self.attach_nodes.iter().position(|node| node.id() == id)
    }

    /// (индекс node, occupant) для всех занятых nodes
    pub fn occupied_nodes(&self) -> Vec<(usize, Entity)> {
        self.attach_nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.occupant.map(|occupant| (index, occupant)))
            .collect()
    }

    pub fn parent_link(&self) -> Option<PartLink> {
        self.parent_link
    }

    pub fn parent(&self) -> Option<Entity> {
        self.parent_link.map(|link| link.parent)
    }

    pub fn is_root(&self) -> bool {
        self.parent_link.is_none()
    }

    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    pub fn assembly(&self) -> Option<Entity> {
        self.assembly
    }

    pub fn mass_contribution(&self) -> f32 {
        self.mass_contribution
    }

    pub fn is_mass_dirty(&self) -> bool {
        self.mass_dirty
    }

    pub fn mark_mass_dirty(&mut self) {
        self.mass_dirty = true;
    }

    /// Записывает значение provider'а; пересчёт — в `recalculate_mass`
    pub fn set_provided_mass(&mut self, provider: TypeId, mass: f32) {
        match self.provided_mass.iter_mut().find(|(id, _)| *id == provider) {
            Some(slot) => slot.1 = mass,
            None => self.provided_mass.push((provider, mass)),
        }
        self.mass_dirty = true;
    }

    /// dry mass + Σ provider mass
    ///
    /// Пока ни один provider не отчитался, используется design-time масса из definition.
    pub fn recalculate_mass(&mut self) -> f32 {
        self.mass_contribution = if self.provided_mass.is_empty() {
            self.definition.total_mass_kg()
        } else {
            self.definition.dry_mass_kg + self.provided_mass.iter().map(|(_, mass)| *mass).sum::<f32>()
        };
        self.mass_dirty = false;
        self.mass_contribution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::definition::{AttachNodeDef, PartBehaviourDef};

    struct FuelA;
    struct FuelB;

    fn definition() -> Arc<PartDefinition> {
        Arc::new(
            PartDefinition::new("tank", "Tank", PartCategory::TANK, 100.0)
                .with_node(AttachNodeDef::new("top", PartCategory::ALL, Vec3::Y, Vec3::Y))
                .with_node(AttachNodeDef::new("bottom", PartCategory::ALL, Vec3::NEG_Y, Vec3::NEG_Y))
                .with_behaviour(PartBehaviourDef::Tank { propellant_mass_kg: 50.0 }),
        )
    }

    #[test]
    fn test_new_part_nodes_from_definition() {
        let part = PartNode::new(definition());
        assert_eq!(part.attach_nodes().len(), 2);
        assert_eq!(part.find_attach_node("bottom"), Some(1));
        assert!(part.is_root());
        assert!(part.occupied_nodes().is_empty());
        assert!(part.is_mass_dirty());
        assert_eq!(part.mass_contribution(), 150.0);
    }

    #[test]
    fn test_recalculate_mass_from_providers() {
        let mut part = PartNode::new(definition());

        part.set_provided_mass(TypeId::of::<FuelA>(), 20.0);
        part.set_provided_mass(TypeId::of::<FuelB>(), 5.0);
        assert_eq!(part.recalculate_mass(), 125.0);
        assert!(!part.is_mass_dirty());

        // Тот же provider перезаписывает своё значение
        part.set_provided_mass(TypeId::of::<FuelA>(), 0.0);
        assert!(part.is_mass_dirty());
        assert_eq!(part.recalculate_mass(), 105.0);
    }
}
