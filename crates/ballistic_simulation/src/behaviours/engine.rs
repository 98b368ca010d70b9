//! Engine — тяга + gimbal с ограничением скорости поворота
//!
//! Тяга = throttle × max_thrust вдоль +Y сопла (сопло = +Y детали, повёрнутая gimbal'ом).
//! Сила пишется в ExternalForce сборки-владельца в world позиции двигателя,
//! момент — относительно текущего CoM сборки.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::parts::PartNode;
use crate::vehicle::VehicleAssembly;

#[derive(Component, Debug, Clone, PartialEq)]
pub struct Engine {
    pub max_thrust: f32,
    /// Предел отклонения сопла по осям (градусы)
    pub max_gimbal: Vec2,
    /// Градусы в секунду
    pub gimbal_rate: f32,
    throttle: f32,
    target_gimbal: Vec2,
    current_gimbal: Vec2,
}

impl Engine {
    pub fn new(max_thrust: f32, max_gimbal: Vec2, gimbal_rate: f32) -> Self {
        Self {
            max_thrust,
            max_gimbal: max_gimbal.abs(),
            gimbal_rate: gimbal_rate.max(0.0),
            throttle: 0.0,
            target_gimbal: Vec2::ZERO,
            current_gimbal: Vec2::ZERO,
        }
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    /// Clamp [0, 1]
    pub fn set_throttle(&mut self, throttle: f32) {
        self.throttle = throttle.clamp(0.0, 1.0);
    }

    pub fn target_gimbal(&self) -> Vec2 {
        self.target_gimbal
    }

    pub fn set_target_gimbal(&mut self, target: Vec2) {
        self.target_gimbal = target;
    }

    pub fn current_gimbal(&self) -> Vec2 {
        self.current_gimbal
    }

    /// Один шаг gimbal к (clamped) target, не быстрее gimbal_rate
    pub fn step_gimbal(&mut self, delta_secs: f32) {
        let target = self.target_gimbal.clamp(-self.max_gimbal, self.max_gimbal);
        let step = self.gimbal_rate * delta_secs;

        self.current_gimbal = Vec2::new(
            move_towards(self.current_gimbal.x, target.x, step),
            move_towards(self.current_gimbal.y, target.y, step),
        );
    }

    pub fn thrust(&self) -> f32 {
        self.throttle * self.max_thrust
    }

    /// Поворот сопла относительно детали (x → вокруг Z, y → вокруг X)
    pub fn nozzle_rotation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.current_gimbal.y.to_radians(),
            0.0,
            -self.current_gimbal.x.to_radians(),
        )
    }
}

fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

/// Система: силы сборок живут один тик
pub fn reset_assembly_forces(mut assemblies: Query<&mut ExternalForce, With<VehicleAssembly>>) {
    for mut force in assemblies.iter_mut() {
        *force = ExternalForce::default();
    }
}

/// Система: gimbal → target (rate limited)
pub fn update_engine_gimbals(time: Res<Time>, mut engines: Query<&mut Engine>) {
    let delta = time.delta_secs();
    for mut engine in engines.iter_mut() {
        engine.step_gimbal(delta);
    }
}

/// Система: тяга → ExternalForce сборки-владельца
pub fn apply_engine_thrust(
    engines: Query<(&Engine, &PartNode, &Transform)>,
    mut assemblies: Query<(&Transform, &VehicleAssembly, &mut ExternalForce)>,
) {
    for (engine, part, local) in engines.iter() {
        let thrust = engine.thrust();
        if thrust <= 0.0 {
            continue;
        }
        let Some(assembly) = part.assembly() else {
            continue;
        };
        let Ok((frame, vehicle, mut external)) = assemblies.get_mut(assembly) else {
            continue;
        };

        let pose = frame.mul_transform(*local);
        let direction = pose.rotation * engine.nozzle_rotation() * Vec3::Y;
        let force = direction * thrust;
        let center_of_mass = frame.transform_point(vehicle.local_center_of_mass());

        external.force += force;
        external.torque += (pose.translation - center_of_mass).cross(force);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_clamped() {
        let mut engine = Engine::new(1000.0, Vec2::splat(5.0), 10.0);
        engine.set_throttle(1.5);
        assert_eq!(engine.throttle(), 1.0);
        assert_eq!(engine.thrust(), 1000.0);

        engine.set_throttle(-1.0);
        assert_eq!(engine.thrust(), 0.0);
    }

    #[test]
    fn test_gimbal_rate_limited_and_clamped() {
        let mut engine = Engine::new(1000.0, Vec2::new(5.0, 2.0), 10.0);
        engine.set_target_gimbal(Vec2::new(20.0, -20.0));

        // 10°/s × 0.1s = 1° за шаг
        engine.step_gimbal(0.1);
        assert!((engine.current_gimbal() - Vec2::new(1.0, -1.0)).length() < 1e-5);

        for _ in 0..100 {
            engine.step_gimbal(0.1);
        }
        // Упирается в max_gimbal, а не в target
        assert!((engine.current_gimbal() - Vec2::new(5.0, -2.0)).length() < 1e-5);
    }

    #[test]
    fn test_nozzle_neutral() {
        let engine = Engine::new(1000.0, Vec2::splat(5.0), 10.0);
        let direction = engine.nozzle_rotation() * Vec3::Y;
        assert!((direction - Vec3::Y).length() < 1e-6);
    }
}
