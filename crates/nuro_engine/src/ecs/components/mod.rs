//! Built-in components
//!
//! Pure data. Behaviour lives in the transform evaluator, the physics
//! bridge and the render passes.

pub mod camera;
pub mod lighting;
pub mod mesh_renderer;
pub mod physics;
pub mod transform;
pub mod velocity;

pub use camera::CameraComponent;
pub use lighting::{LightComponent, LightFactory, LightType};
pub use mesh_renderer::MeshRendererComponent;
pub use physics::{
    BoxColliderComponent, CollisionDetection, Interpolation, RigidbodyComponent,
    SphereColliderComponent,
};
pub use transform::TransformComponent;
pub use velocity::VelocityComponent;
