//! Tests for attach / detach.

#[cfg(test)]
mod tests {
    use bevy::prelude::*;

    use crate::config::VehicleConfig;
    use crate::parts::{attach_to, detach, world_pose, PartCatalog, PartNode};
    use crate::vehicle::{build_vehicle, Blueprint, PartEntry, VehicleAssembly};

    const TANK_TOP: usize = 0;
    const TANK_BOTTOM: usize = 1;
    const ENGINE_TOP: usize = 0;

    fn setup_world() -> World {
        let mut world = World::new();
        world.insert_resource(PartCatalog::stock());
        world.insert_resource(VehicleConfig::default());
        world
    }

    fn build(world: &mut World, blueprint: Blueprint, position: Vec3) -> (Entity, Vec<Entity>) {
        let vehicle = build_vehicle(world, &blueprint, position, Quat::IDENTITY).unwrap();
        let parts = world.get::<VehicleAssembly>(vehicle).unwrap().parts().to_vec();
        (vehicle, parts)
    }

    fn single_tank(world: &mut World) -> (Entity, Entity) {
        let (vehicle, parts) = build(world, Blueprint::new("Tank").with_part(PartEntry::root("tank_small")), Vec3::ZERO);
        (vehicle, parts[0])
    }

    /// Свободная деталь (не в сборке)
    fn spawn_loose(world: &mut World, part: &str, position: Vec3) -> Entity {
        let definition = world.resource::<PartCatalog>().get(&part.into()).unwrap().clone();
        world
            .spawn((PartNode::new(definition), Transform::from_translation(position)))
            .id()
    }

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_attach_snaps_and_occupies_both_sides() {
        let mut world = setup_world();
        let (vehicle, tank) = single_tank(&mut world);
        let engine = spawn_loose(&mut world, "engine_small", Vec3::new(5.0, 5.0, 5.0));

        assert!(attach_to(&mut world, engine, tank, TANK_BOTTOM, Some(ENGINE_TOP)));

        let tank_node = world.get::<PartNode>(tank).unwrap();
        assert_eq!(tank_node.attach_node(TANK_BOTTOM).unwrap().occupant, Some(engine));
        assert_eq!(tank_node.children(), &[engine]);

        let engine_node = world.get::<PartNode>(engine).unwrap();
        assert_eq!(engine_node.attach_node(ENGINE_TOP).unwrap().occupant, Some(tank));
        assert_eq!(engine_node.parent(), Some(tank));
        assert_eq!(engine_node.assembly(), Some(vehicle));

        // Engine top (0, 0.5) садится на tank bottom (0, -1)
        let pose = world_pose(&world, engine).unwrap();
        assert_vec_eq(pose.translation, Vec3::new(0.0, -1.5, 0.0));
        assert!(pose.rotation.angle_between(Quat::IDENTITY) < 1e-4);

        assert_eq!(world.get::<ChildOf>(engine).map(|child_of| child_of.parent()), Some(vehicle));
        assert!(world.get::<VehicleAssembly>(vehicle).unwrap().contains(engine));
    }

    #[test]
    fn test_detach_root_is_noop() {
        let mut world = setup_world();
        let (vehicle, tank) = single_tank(&mut world);
        let before = world_pose(&world, tank).unwrap();

        assert!(!detach(&mut world, tank));
        assert!(!detach(&mut world, tank));

        let node = world.get::<PartNode>(tank).unwrap();
        assert!(node.is_root());
        assert_eq!(node.assembly(), Some(vehicle));
        assert_eq!(world_pose(&world, tank).unwrap(), before);
        assert!(!world.get::<VehicleAssembly>(vehicle).unwrap().is_structure_dirty());
    }

    #[test]
    fn test_detach_clears_link_and_keeps_world_pose() {
        let mut world = setup_world();
        let (vehicle, tank) = single_tank(&mut world);
        world.get_mut::<Transform>(vehicle).unwrap().translation = Vec3::new(0.0, 100.0, 0.0);

        let engine = spawn_loose(&mut world, "engine_small", Vec3::ZERO);
        attach_to(&mut world, engine, tank, TANK_BOTTOM, Some(ENGINE_TOP));
        let attached_pose = world_pose(&world, engine).unwrap();

        assert!(detach(&mut world, engine));

        let tank_node = world.get::<PartNode>(tank).unwrap();
        assert!(tank_node.attach_node(TANK_BOTTOM).unwrap().occupant.is_none());
        assert!(tank_node.children().is_empty());

        let engine_node = world.get::<PartNode>(engine).unwrap();
        assert!(engine_node.is_root());
        assert!(engine_node.assembly().is_none());
        assert!(engine_node.attach_node(ENGINE_TOP).unwrap().occupant.is_none());
        assert!(world.get::<ChildOf>(engine).is_none());

        // Transform теперь world pose
        assert_vec_eq(world.get::<Transform>(engine).unwrap().translation, attached_pose.translation);
        assert_vec_eq(attached_pose.translation, Vec3::new(0.0, 98.5, 0.0));

        assert!(world.get::<VehicleAssembly>(vehicle).unwrap().is_structure_dirty());

        // Повторный detach — no-op
        assert!(!detach(&mut world, engine));
    }

    #[test]
    fn test_occupied_node_last_writer_wins() {
        let mut world = setup_world();
        let (vehicle, tank) = single_tank(&mut world);
        let first = spawn_loose(&mut world, "engine_small", Vec3::ZERO);
        let second = spawn_loose(&mut world, "engine_small", Vec3::ZERO);

        assert!(attach_to(&mut world, first, tank, TANK_BOTTOM, Some(ENGINE_TOP)));
        assert!(attach_to(&mut world, second, tank, TANK_BOTTOM, Some(ENGINE_TOP)));

        let tank_node = world.get::<PartNode>(tank).unwrap();
        assert_eq!(tank_node.attach_node(TANK_BOTTOM).unwrap().occupant, Some(second));
        assert_eq!(tank_node.children(), &[second]);

        // Вытесненный occupant отстыкован с обеих сторон и свободен
        let first_node = world.get::<PartNode>(first).unwrap();
        assert!(first_node.is_root());
        assert!(first_node.attach_node(ENGINE_TOP).unwrap().occupant.is_none());
        assert_eq!(first_node.assembly(), None);
        assert!(world.get::<ChildOf>(first).is_none());
        assert_vec_eq(world_pose(&world, first).unwrap().translation, Vec3::new(0.0, -1.5, 0.0));

        let second_node = world.get::<PartNode>(second).unwrap();
        assert_eq!(second_node.attach_node(ENGINE_TOP).unwrap().occupant, Some(tank));
        assert_eq!(world.get::<VehicleAssembly>(vehicle).unwrap().parts(), &[tank, second]);

        // Повторный detach вытесненного — no-op, новый occupant на месте
        assert!(!detach(&mut world, first));
        let tank_node = world.get::<PartNode>(tank).unwrap();
        assert_eq!(tank_node.attach_node(TANK_BOTTOM).unwrap().occupant, Some(second));
    }

    #[test]
    fn test_attach_refuses_self_and_cycles() {
        let mut world = setup_world();
        let (_, tank) = single_tank(&mut world);
        let engine = spawn_loose(&mut world, "engine_small", Vec3::ZERO);
        attach_to(&mut world, engine, tank, TANK_BOTTOM, Some(ENGINE_TOP));

        assert!(!attach_to(&mut world, tank, tank, TANK_BOTTOM, None));
        assert!(!attach_to(&mut world, tank, engine, ENGINE_TOP, Some(TANK_TOP)));
        assert!(!attach_to(&mut world, engine, tank, 99, None));

        // Дерево не изменилось
        assert!(world.get::<PartNode>(tank).unwrap().is_root());
        assert_eq!(world.get::<PartNode>(engine).unwrap().parent(), Some(tank));
    }

    #[test]
    fn test_attach_moves_subtree_between_vehicles() {
        let mut world = setup_world();
        let (vehicle_a, tank_a) = single_tank(&mut world);
        let stack = Blueprint::new("Stage")
            .with_part(PartEntry::root("tank_small"))
            .with_part(PartEntry::child("engine_small", 0, "bottom", "top"));
        let (vehicle_b, parts_b) = build(&mut world, stack, Vec3::new(10.0, 0.0, 0.0));
        let (tank_b, engine_b) = (parts_b[0], parts_b[1]);

        assert!(attach_to(&mut world, tank_b, tank_a, TANK_BOTTOM, Some(TANK_TOP)));

        // Поддерево двигается жёстко
        assert_vec_eq(world_pose(&world, tank_b).unwrap().translation, Vec3::new(0.0, -2.0, 0.0));
        assert_vec_eq(world_pose(&world, engine_b).unwrap().translation, Vec3::new(0.0, -3.5, 0.0));

        // Обе сборки пересобраны в том же вызове
        let a = world.get::<VehicleAssembly>(vehicle_a).unwrap();
        assert_eq!(a.parts(), &[tank_a, tank_b, engine_b]);
        assert!(world.get::<VehicleAssembly>(vehicle_b).unwrap().is_empty());
        assert_eq!(world.get::<PartNode>(engine_b).unwrap().assembly(), Some(vehicle_a));
    }
}
