//! Parts — модель детали и её attach nodes
//!
//! Организация:
//! - definition: статические данные (PartDefinition, AttachNodeDef, PartCatalog)
//! - attach_node: runtime сокет (occupant, snap pose)
//! - part_node: ECS компонент детали (parent link, children, mass contribution)
//! - hierarchy: attach_to / detach над World
//! - mass: MassProvider контракт + системы пересчёта массы деталей

pub mod attach_node;
pub mod definition;
pub mod hierarchy;
pub mod mass;
pub mod part_node;

#[cfg(test)]
mod hierarchy_tests;

pub use attach_node::AttachNode;
pub use definition::{AttachNodeDef, PartBehaviourDef, PartCatalog, PartCategory, PartDefinition, PartId};
pub use hierarchy::{attach_to, detach, subtree, world_pose};
pub use mass::{MassProvider, MassProviderAppExt};
pub use part_node::{PartLink, PartNode};
