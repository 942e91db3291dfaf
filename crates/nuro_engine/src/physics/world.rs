//! Physics world capability interface
//!
//! The bridge talks to the simulation only through [`PhysicsWorld`]. Handles
//! are opaque slotmap keys; nothing outside the implementation can inspect
//! or forge them.

use slotmap::new_key_type;

use crate::ecs::components::CollisionDetection;
use crate::foundation::math::{Quat, Vec3};

new_key_type! {
    /// Opaque handle to a simulated actor
    pub struct ActorHandle;
    /// Opaque handle to a collision shape
    pub struct ShapeHandle;
}

/// Physics errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// The world could not be created; simulation must not start
    #[error("physics world initialization failed: {0}")]
    InitializationFailed(String),

    /// A handle did not resolve (already released or never issued)
    #[error("invalid physics handle: {0}")]
    InvalidHandle(String),

    /// Descriptor values the simulation cannot accept
    #[error("invalid physics descriptor: {0}")]
    InvalidDescriptor(String),

    /// The entity is dead or lacks a required component
    #[error("entity unavailable: {0}")]
    EntityUnavailable(String),
}

/// Whether an actor is moved by the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    /// Simulated body (or kinematic when flagged)
    Dynamic,
    /// Immovable collision host
    Static,
}

/// World-space position and rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position
    pub position: Vec3,
    /// Rotation
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

/// Linear and angular velocity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    /// Linear velocity
    pub linear: Vec3,
    /// Angular velocity (axis times radians per second)
    pub angular: Vec3,
}

/// Parameters for a new actor
#[derive(Debug, Clone, PartialEq)]
pub struct ActorDesc {
    /// Dynamic or static
    pub kind: ActorKind,
    /// Initial pose
    pub pose: Pose,
    /// Mass (dynamic only)
    pub mass: f32,
    /// Linear damping
    pub linear_damping: f32,
    /// Angular damping
    pub angular_damping: f32,
    /// Affected by gravity
    pub gravity: bool,
    /// Pose driven externally
    pub kinematic: bool,
    /// Collision detection mode
    pub collision_detection: CollisionDetection,
}

impl ActorDesc {
    /// Static host at `pose`
    pub fn fixed(pose: Pose) -> Self {
        Self {
            kind: ActorKind::Static,
            pose,
            mass: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity: false,
            kinematic: false,
            collision_detection: CollisionDetection::Discrete,
        }
    }
}

/// Collision geometry, already scaled into world units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeGeometry {
    /// Box with half extents
    Box {
        /// Half size along each axis
        half_extents: Vec3,
    },
    /// Sphere
    Sphere {
        /// Radius
        radius: f32,
    },
}

/// Parameters for a new shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeDesc {
    /// Geometry
    pub geometry: ShapeGeometry,
    /// Offset from the owning actor's origin
    pub offset: Vec3,
}

/// Simulation capability consumed by the physics bridge
pub trait PhysicsWorld {
    /// Create an actor
    fn create_actor(&mut self, desc: &ActorDesc) -> Result<ActorHandle, PhysicsError>;

    /// Release an actor; attached shapes are detached, not destroyed
    fn destroy_actor(&mut self, actor: ActorHandle) -> Result<(), PhysicsError>;

    /// Create a free-standing shape
    fn create_shape(&mut self, desc: &ShapeDesc) -> Result<ShapeHandle, PhysicsError>;

    /// Attach a shape to an actor
    fn attach_shape(&mut self, actor: ActorHandle, shape: ShapeHandle) -> Result<(), PhysicsError>;

    /// Detach a shape from an actor
    fn detach_shape(&mut self, actor: ActorHandle, shape: ShapeHandle) -> Result<(), PhysicsError>;

    /// Release a shape
    fn destroy_shape(&mut self, shape: ShapeHandle) -> Result<(), PhysicsError>;

    /// Advance the simulation by exactly `step` seconds
    fn simulate(&mut self, step: f32);

    /// Publish the results of the last `simulate`
    fn fetch_results(&mut self);

    /// Published pose of an actor
    fn pose(&self, actor: ActorHandle) -> Option<Pose>;

    /// Published velocity of an actor
    fn velocity(&self, actor: ActorHandle) -> Option<Velocity>;

    /// Teleport an actor (kinematic targets, editor moves)
    fn set_pose(&mut self, actor: ActorHandle, pose: Pose) -> Result<(), PhysicsError>;

    /// Live actor count
    fn actor_count(&self) -> usize;

    /// Live shape count
    fn shape_count(&self) -> usize;
}
