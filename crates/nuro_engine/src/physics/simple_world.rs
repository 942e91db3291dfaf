//! Built-in rigid body world
//!
//! Semi-implicit Euler integration with gravity and damping, plus a
//! positional push-out of dynamic bodies from static geometry using
//! world-space bounding boxes. Good enough for editor previews and tests;
//! swap in a full solver through [`PhysicsWorld`] for anything serious.

use slotmap::SlotMap;

use super::world::{
    ActorDesc, ActorHandle, ActorKind, PhysicsError, PhysicsWorld, Pose, ShapeDesc, ShapeGeometry,
    ShapeHandle, Velocity,
};
use crate::core::config::PhysicsConfig;
use crate::foundation::math::{Quat, Vec3};

#[derive(Debug, Clone, Copy)]
struct BodyState {
    pose: Pose,
    velocity: Velocity,
}

#[derive(Debug)]
struct Actor {
    desc: ActorDesc,
    simulated: BodyState,
    published: BodyState,
    shapes: Vec<ShapeHandle>,
}

#[derive(Debug)]
struct Shape {
    desc: ShapeDesc,
    owner: Option<ActorHandle>,
}

/// World-space axis aligned box
#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    fn penetration(&self, other: &Self) -> Option<Vec3> {
        let overlap = Vec3::new(
            self.max.x.min(other.max.x) - self.min.x.max(other.min.x),
            self.max.y.min(other.max.y) - self.min.y.max(other.min.y),
            self.max.z.min(other.max.z) - self.min.z.max(other.min.z),
        );
        if overlap.iter().any(|o| *o <= 0.0) {
            return None;
        }
        // Push along the axis of least overlap, away from `other`.
        let axis = overlap.imin();
        let self_center = (self.min + self.max) * 0.5;
        let other_center = (other.min + other.max) * 0.5;
        let sign = if self_center[axis] >= other_center[axis] { 1.0 } else { -1.0 };
        let mut push = Vec3::zeros();
        push[axis] = overlap[axis] * sign;
        Some(push)
    }
}

/// Pure-Rust physics world
pub struct SimplePhysicsWorld {
    gravity: Vec3,
    actors: SlotMap<ActorHandle, Actor>,
    shapes: SlotMap<ShapeHandle, Shape>,
}

impl SimplePhysicsWorld {
    /// Create a world from validated settings
    pub fn new(config: &PhysicsConfig) -> Result<Self, PhysicsError> {
        if config.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InitializationFailed(format!(
                "gravity must be finite, got {:?}",
                config.gravity
            )));
        }
        if !(config.fixed_time_step.is_finite() && config.fixed_time_step > 0.0) {
            return Err(PhysicsError::InitializationFailed(format!(
                "fixed time step must be positive, got {}",
                config.fixed_time_step
            )));
        }
        log::info!("Simple physics world created (gravity {:?})", config.gravity);
        Ok(Self {
            gravity: config.gravity,
            actors: SlotMap::with_key(),
            shapes: SlotMap::with_key(),
        })
    }

    fn shape_bounds(&self, actor: &Actor, shape: ShapeHandle) -> Option<Aabb> {
        let shape = self.shapes.get(shape)?;
        let pose = &actor.simulated.pose;
        let center = pose.position + pose.rotation * shape.desc.offset;
        let half = match shape.desc.geometry {
            ShapeGeometry::Sphere { radius } => Vec3::new(radius, radius, radius),
            ShapeGeometry::Box { half_extents } => {
                let r = pose.rotation.to_rotation_matrix();
                r.matrix().abs() * half_extents
            }
        };
        Some(Aabb {
            min: center - half,
            max: center + half,
        })
    }

    fn integrate(&mut self, step: f32) {
        let gravity = self.gravity;
        for actor in self.actors.values_mut() {
            if actor.desc.kind == ActorKind::Static || actor.desc.kinematic {
                continue;
            }
            let state = &mut actor.simulated;
            if actor.desc.gravity {
                state.velocity.linear += gravity * step;
            }
            state.velocity.linear /= 1.0 + actor.desc.linear_damping * step;
            state.velocity.angular /= 1.0 + actor.desc.angular_damping * step;

            state.pose.position += state.velocity.linear * step;
            let spin = Quat::from_scaled_axis(state.velocity.angular * step);
            state.pose.rotation = spin * state.pose.rotation;
        }
    }

    fn resolve_static_contacts(&mut self) {
        let static_bounds: Vec<Aabb> = self
            .actors
            .values()
            .filter(|a| a.desc.kind == ActorKind::Static)
            .flat_map(|a| a.shapes.iter().filter_map(|s| self.shape_bounds(a, *s)))
            .collect();
        if static_bounds.is_empty() {
            return;
        }

        let dynamic: Vec<ActorHandle> = self
            .actors
            .iter()
            .filter(|(_, a)| a.desc.kind == ActorKind::Dynamic && !a.desc.kinematic)
            .map(|(h, _)| h)
            .collect();

        for handle in dynamic {
            let Some(actor) = self.actors.get(handle) else { continue };
            let bounds: Vec<Aabb> = actor
                .shapes
                .iter()
                .filter_map(|s| self.shape_bounds(actor, *s))
                .collect();

            let mut correction = Vec3::zeros();
            for body in &bounds {
                for fixed in &static_bounds {
                    if let Some(push) = body.penetration(fixed) {
                        if push.norm() > correction.norm() {
                            correction = push;
                        }
                    }
                }
            }
            if correction == Vec3::zeros() {
                continue;
            }

            if let Some(actor) = self.actors.get_mut(handle) {
                let state = &mut actor.simulated;
                state.pose.position += correction;
                // Cancel the velocity component driving into the contact.
                let normal = correction.normalize();
                let into = state.velocity.linear.dot(&normal);
                if into < 0.0 {
                    state.velocity.linear -= normal * into;
                }
            }
        }
    }
}

impl PhysicsWorld for SimplePhysicsWorld {
    fn create_actor(&mut self, desc: &ActorDesc) -> Result<ActorHandle, PhysicsError> {
        if desc.kind == ActorKind::Dynamic && !(desc.mass.is_finite() && desc.mass > 0.0) {
            return Err(PhysicsError::InvalidDescriptor(format!(
                "dynamic actor mass must be positive, got {}",
                desc.mass
            )));
        }
        let state = BodyState {
            pose: desc.pose,
            velocity: Velocity::default(),
        };
        Ok(self.actors.insert(Actor {
            desc: desc.clone(),
            simulated: state,
            published: state,
            shapes: Vec::new(),
        }))
    }

    fn destroy_actor(&mut self, actor: ActorHandle) -> Result<(), PhysicsError> {
        let removed = self
            .actors
            .remove(actor)
            .ok_or_else(|| PhysicsError::InvalidHandle(format!("actor {actor:?}")))?;
        for shape in removed.shapes {
            if let Some(shape) = self.shapes.get_mut(shape) {
                shape.owner = None;
            }
        }
        Ok(())
    }

    fn create_shape(&mut self, desc: &ShapeDesc) -> Result<ShapeHandle, PhysicsError> {
        let valid = match desc.geometry {
            ShapeGeometry::Box { half_extents } => half_extents.iter().all(|h| h.is_finite() && *h > 0.0),
            ShapeGeometry::Sphere { radius } => radius.is_finite() && radius > 0.0,
        };
        if !valid {
            return Err(PhysicsError::InvalidDescriptor(format!("{:?}", desc.geometry)));
        }
        Ok(self.shapes.insert(Shape {
            desc: *desc,
            owner: None,
        }))
    }

    fn attach_shape(&mut self, actor: ActorHandle, shape: ShapeHandle) -> Result<(), PhysicsError> {
        let entry = self
            .shapes
            .get_mut(shape)
            .ok_or_else(|| PhysicsError::InvalidHandle(format!("shape {shape:?}")))?;
        let target = self
            .actors
            .get_mut(actor)
            .ok_or_else(|| PhysicsError::InvalidHandle(format!("actor {actor:?}")))?;
        if entry.owner.is_some() {
            return Err(PhysicsError::InvalidDescriptor(format!("shape {shape:?} already attached")));
        }
        entry.owner = Some(actor);
        target.shapes.push(shape);
        Ok(())
    }

    fn detach_shape(&mut self, actor: ActorHandle, shape: ShapeHandle) -> Result<(), PhysicsError> {
        let entry = self
            .shapes
            .get_mut(shape)
            .ok_or_else(|| PhysicsError::InvalidHandle(format!("shape {shape:?}")))?;
        if entry.owner != Some(actor) {
            return Err(PhysicsError::InvalidHandle(format!("shape {shape:?} not attached to {actor:?}")));
        }
        entry.owner = None;
        if let Some(owner) = self.actors.get_mut(actor) {
            owner.shapes.retain(|s| *s != shape);
        }
        Ok(())
    }

    fn destroy_shape(&mut self, shape: ShapeHandle) -> Result<(), PhysicsError> {
        let removed = self
            .shapes
            .remove(shape)
            .ok_or_else(|| PhysicsError::InvalidHandle(format!("shape {shape:?}")))?;
        if let Some(owner) = removed.owner.and_then(|a| self.actors.get_mut(a)) {
            owner.shapes.retain(|s| *s != shape);
        }
        Ok(())
    }

    fn simulate(&mut self, step: f32) {
        self.integrate(step);
        self.resolve_static_contacts();
    }

    fn fetch_results(&mut self) {
        for actor in self.actors.values_mut() {
            actor.published = actor.simulated;
        }
    }

    fn pose(&self, actor: ActorHandle) -> Option<Pose> {
        self.actors.get(actor).map(|a| a.published.pose)
    }

    fn velocity(&self, actor: ActorHandle) -> Option<Velocity> {
        self.actors.get(actor).map(|a| a.published.velocity)
    }

    fn set_pose(&mut self, actor: ActorHandle, pose: Pose) -> Result<(), PhysicsError> {
        let target = self
            .actors
            .get_mut(actor)
            .ok_or_else(|| PhysicsError::InvalidHandle(format!("actor {actor:?}")))?;
        target.simulated.pose = pose;
        target.published.pose = pose;
        Ok(())
    }

    fn actor_count(&self) -> usize {
        self.actors.len()
    }

    fn shape_count(&self) -> usize {
        self.shapes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::CollisionDetection;
    use approx::assert_relative_eq;

    fn dynamic_at(position: Vec3) -> ActorDesc {
        ActorDesc {
            kind: ActorKind::Dynamic,
            pose: Pose {
                position,
                rotation: Quat::identity(),
            },
            mass: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity: true,
            kinematic: false,
            collision_detection: CollisionDetection::Discrete,
        }
    }

    #[test]
    fn test_gravity_integration() {
        let mut world = SimplePhysicsWorld::new(&PhysicsConfig::default()).unwrap();
        let body = world.create_actor(&dynamic_at(Vec3::zeros())).unwrap();

        world.simulate(0.5);
        // Not yet published.
        assert_relative_eq!(world.pose(body).unwrap().position, Vec3::zeros());
        world.fetch_results();

        let velocity = world.velocity(body).unwrap();
        assert_relative_eq!(velocity.linear.y, -9.81 * 0.5, epsilon = 1e-5);
        assert_relative_eq!(world.pose(body).unwrap().position.y, -9.81 * 0.25, epsilon = 1e-5);
    }

    #[test]
    fn test_static_floor_stops_body() {
        let mut world = SimplePhysicsWorld::new(&PhysicsConfig::default()).unwrap();
        let floor = world.create_actor(&ActorDesc::fixed(Pose::default())).unwrap();
        let floor_shape = world
            .create_shape(&ShapeDesc {
                geometry: ShapeGeometry::Box { half_extents: Vec3::new(10.0, 0.5, 10.0) },
                offset: Vec3::zeros(),
            })
            .unwrap();
        world.attach_shape(floor, floor_shape).unwrap();

        let ball = world.create_actor(&dynamic_at(Vec3::new(0.0, 2.0, 0.0))).unwrap();
        let ball_shape = world
            .create_shape(&ShapeDesc {
                geometry: ShapeGeometry::Sphere { radius: 0.5 },
                offset: Vec3::zeros(),
            })
            .unwrap();
        world.attach_shape(ball, ball_shape).unwrap();

        for _ in 0..240 {
            world.simulate(1.0 / 60.0);
        }
        world.fetch_results();
        let y = world.pose(ball).unwrap().position.y;
        assert!((0.9..=1.05).contains(&y), "ball rests on floor, got y = {y}");
    }

    #[test]
    fn test_destroy_actor_detaches_shapes() {
        let mut world = SimplePhysicsWorld::new(&PhysicsConfig::default()).unwrap();
        let actor = world.create_actor(&ActorDesc::fixed(Pose::default())).unwrap();
        let shape = world
            .create_shape(&ShapeDesc {
                geometry: ShapeGeometry::Sphere { radius: 1.0 },
                offset: Vec3::zeros(),
            })
            .unwrap();
        world.attach_shape(actor, shape).unwrap();
        world.destroy_actor(actor).unwrap();

        assert_eq!(world.actor_count(), 0);
        assert_eq!(world.shape_count(), 1);
        assert!(world.destroy_shape(shape).is_ok());
        assert!(matches!(world.destroy_actor(actor), Err(PhysicsError::InvalidHandle(_))));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = PhysicsConfig {
            gravity: Vec3::new(0.0, f32::NAN, 0.0),
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            SimplePhysicsWorld::new(&config),
            Err(PhysicsError::InitializationFailed(_))
        ));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let mut world = SimplePhysicsWorld::new(&PhysicsConfig::default()).unwrap();
        let bad = ShapeDesc {
            geometry: ShapeGeometry::Sphere { radius: 0.0 },
            offset: Vec3::zeros(),
        };
        assert!(world.create_shape(&bad).is_err());
    }
}
