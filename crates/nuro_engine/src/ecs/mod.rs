//! Entity-Component-System implementation
//!
//! A sparse-set registry: one densely packed storage per component type,
//! addressed through generational entity handles.

pub mod component;
pub mod components;
pub mod entity;
pub mod storage;
pub mod world;

pub use component::Component;
pub use entity::Entity;
pub use world::World;
