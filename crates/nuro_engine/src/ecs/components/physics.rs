//! Physics components
//!
//! The simulation handles stored here are opaque keys into the physics
//! world. Only the physics bridge writes them; everything else treats them
//! as read-only.

use crate::ecs::Component;
use crate::foundation::math::{Quat, Vec3};
use crate::physics::world::{ActorHandle, ShapeHandle};

/// How a rigidbody's simulated pose is applied to its transform each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Snap to the simulated pose
    None,
    /// Blend from the current pose toward the simulated pose
    #[default]
    Interpolate,
    /// Project the current pose forward with the simulated velocity
    Extrapolate,
}

/// Collision detection mode forwarded to the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionDetection {
    /// Test at step boundaries only
    #[default]
    Discrete,
    /// Swept collision detection
    Continuous,
    /// Speculative contacts
    ContinuousSpeculative,
}

/// Dynamic (or kinematic) body
#[derive(Debug, Clone, PartialEq)]
pub struct RigidbodyComponent {
    /// Frame sync policy
    pub interpolation: Interpolation,
    /// Collision detection mode
    pub collision_detection: CollisionDetection,
    /// Mass in kilograms
    pub mass: f32,
    /// Linear damping coefficient
    pub resistance: f32,
    /// Angular damping coefficient
    pub angular_resistance: f32,
    /// Affected by world gravity
    pub gravity: bool,
    /// Moved only by its transform, never by the simulation
    pub kinematic: bool,

    /// Simulated linear velocity
    pub velocity: Vec3,
    /// Simulated angular velocity
    pub angular_velocity: Vec3,
    /// Simulated position
    pub position: Vec3,
    /// Simulated rotation
    pub rotation: Quat,

    pub(crate) actor: Option<ActorHandle>,
}

impl Component for RigidbodyComponent {}

impl Default for RigidbodyComponent {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::default(),
            collision_detection: CollisionDetection::default(),
            mass: 1.0,
            resistance: 0.0,
            angular_resistance: 0.05,
            gravity: true,
            kinematic: false,
            velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            actor: None,
        }
    }
}

impl RigidbodyComponent {
    /// Builder pattern: Set interpolation mode
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Builder pattern: Set mass
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Builder pattern: Toggle gravity
    pub fn with_gravity(mut self, gravity: bool) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder pattern: Toggle kinematic
    pub fn with_kinematic(mut self, kinematic: bool) -> Self {
        self.kinematic = kinematic;
        self
    }

    /// Physics actor backing this body, once attached by the bridge
    pub const fn actor(&self) -> Option<ActorHandle> {
        self.actor
    }
}

/// Axis-aligned box collider
#[derive(Debug, Clone, PartialEq)]
pub struct BoxColliderComponent {
    /// Offset relative to the transform origin
    pub center: Vec3,
    /// Extent, multiplied by the transform's scale
    pub size: Vec3,
    pub(crate) shape: Option<ShapeHandle>,
}

impl Component for BoxColliderComponent {}

impl Default for BoxColliderComponent {
    fn default() -> Self {
        Self {
            center: Vec3::zeros(),
            size: Vec3::new(1.0, 1.0, 1.0),
            shape: None,
        }
    }
}

impl BoxColliderComponent {
    /// Box of the given size centered on the transform
    pub fn new(size: Vec3) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Physics shape backing this collider, once attached by the bridge
    pub const fn shape(&self) -> Option<ShapeHandle> {
        self.shape
    }
}

/// Sphere collider
#[derive(Debug, Clone, PartialEq)]
pub struct SphereColliderComponent {
    /// Offset relative to the transform origin
    pub center: Vec3,
    /// Radius, multiplied by the largest transform scale axis
    pub radius: f32,
    pub(crate) shape: Option<ShapeHandle>,
}

impl Component for SphereColliderComponent {}

impl Default for SphereColliderComponent {
    fn default() -> Self {
        Self {
            center: Vec3::zeros(),
            radius: 1.0,
            shape: None,
        }
    }
}

impl SphereColliderComponent {
    /// Sphere of the given radius centered on the transform
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            ..Default::default()
        }
    }

    /// Physics shape backing this collider, once attached by the bridge
    pub const fn shape(&self) -> Option<ShapeHandle> {
        self.shape
    }
}
