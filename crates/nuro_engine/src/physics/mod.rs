//! Physics integration
//!
//! [`PhysicsBridge`] steps a [`PhysicsWorld`] on a fixed timestep and keeps
//! rigidbody and transform components in sync with it. The world itself is
//! an injected capability; [`SimplePhysicsWorld`] is the built-in one.

pub mod bridge;
pub mod simple_world;
pub mod world;

#[cfg(test)]
pub(crate) mod mock;

pub use bridge::{interpolation_factor, sync_transform, PhysicsBridge};
pub use simple_world::SimplePhysicsWorld;
pub use world::{
    ActorDesc, ActorHandle, ActorKind, PhysicsError, PhysicsWorld, Pose, ShapeDesc, ShapeGeometry,
    ShapeHandle, Velocity,
};
