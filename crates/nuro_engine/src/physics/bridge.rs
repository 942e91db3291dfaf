//! # Physics Bridge
//!
//! Keeps a [`PhysicsWorld`] and the registry's transforms consistent under a
//! fixed timestep while frames arrive at a variable rate.
//!
//! ## Architecture
//!
//! - **Fixed-step accumulation**: `step` adds the frame delta to an
//!   accumulator and runs one simulation tick per whole fixed step it holds.
//! - **Rigidbody sync**: after every tick the published pose and velocity of
//!   each actor is copied into its `RigidbodyComponent`.
//! - **Frame sync**: once per frame every transform with a rigidbody is
//!   moved toward the simulated pose according to its interpolation mode.
//!   Simulated poses are world-space; for parented entities they are
//!   brought into the parent's space first.
//! - **Lifecycle**: physics objects are created and released by the
//!   `add_*`/`remove_*`/`despawn` methods. `reconcile` runs at the start of
//!   every `step` and catches everything that bypassed them: entities
//!   destroyed directly on the registry, components removed or added
//!   without the bridge. No native handle outlives its component by more
//!   than one frame, and none is ever leaked.
//!
//! ## Design Notes
//!
//! Colliders on an entity without a rigidbody are hosted by a static actor
//! owned by that entity. Adding a rigidbody later moves the shapes onto the
//! new dynamic actor and releases the static host; removing the rigidbody
//! moves them back.

use std::collections::HashMap;

use super::world::{ActorDesc, ActorHandle, ActorKind, PhysicsError, PhysicsWorld, Pose, ShapeDesc, ShapeGeometry, ShapeHandle};
use crate::core::config::PhysicsConfig;
use crate::ecs::components::{
    BoxColliderComponent, Interpolation, RigidbodyComponent, SphereColliderComponent, TransformComponent,
};
use crate::ecs::{Entity, World};
use crate::foundation::math::{blend_rotation, Mat4, Point3, Quat, Quaternion, Vec3};
use crate::render::transformation;

/// Native objects owned on behalf of one entity
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct BodyRecord {
    rigid_actor: Option<ActorHandle>,
    static_host: Option<ActorHandle>,
    box_shape: Option<ShapeHandle>,
    sphere_shape: Option<ShapeHandle>,
}

impl BodyRecord {
    fn host(&self) -> Option<ActorHandle> {
        self.rigid_actor.or(self.static_host)
    }

    fn shapes(&self) -> impl Iterator<Item = ShapeHandle> {
        self.box_shape.into_iter().chain(self.sphere_shape)
    }

    const fn is_empty(&self) -> bool {
        self.rigid_actor.is_none()
            && self.static_host.is_none()
            && self.box_shape.is_none()
            && self.sphere_shape.is_none()
    }
}

/// Which collider slot an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColliderSlot {
    Box,
    Sphere,
}

/// Fraction of a fixed step covered by `delta`, clamped to `[0, 1]`
pub fn interpolation_factor(delta: f32, fixed_time_step: f32) -> f32 {
    if fixed_time_step <= 0.0 {
        return 1.0;
    }
    (delta / fixed_time_step).clamp(0.0, 1.0)
}

/// Move a transform toward its rigidbody's simulated pose
pub fn sync_transform(
    transform: &mut TransformComponent,
    rigidbody: &RigidbodyComponent,
    delta: f32,
    fixed_time_step: f32,
) {
    match rigidbody.interpolation {
        Interpolation::None => {
            transform.position = rigidbody.position;
            transform.rotation = rigidbody.rotation;
        }
        Interpolation::Interpolate => {
            let factor = interpolation_factor(delta, fixed_time_step);
            if factor >= 1.0 {
                transform.position = rigidbody.position;
                transform.rotation = rigidbody.rotation;
            } else if factor > 0.0 {
                transform.position = transform.position.lerp(&rigidbody.position, factor);
                transform.rotation = blend_rotation(&transform.rotation, &rigidbody.rotation, factor);
            }
        }
        Interpolation::Extrapolate => {
            transform.position += rigidbody.velocity * delta;
            let spin = rigidbody.angular_velocity * delta;
            let step = Quat::new_normalize(Quaternion::new(1.0, spin.x, spin.y, spin.z));
            transform.rotation *= step;
        }
    }
}

/// Maps simulated world-space state into a parent's local space
#[derive(Debug, Clone, Copy)]
struct ParentSpace {
    inverse_model: Mat4,
    inverse_rotation: Quat,
}

impl ParentSpace {
    /// `None` for roots, dead parents and parents with a singular matrix
    fn of(world: &World, entity: Entity) -> Option<Self> {
        let parent = world.get_component::<TransformComponent>(entity)?.parent?;
        let inverse_model = transformation::model(world, parent)?.try_inverse()?;
        let (_, rotation) = transformation::world_pose(world, parent)?;
        Some(Self {
            inverse_model,
            inverse_rotation: rotation.inverse(),
        })
    }

    fn to_local(self, rigidbody: &RigidbodyComponent) -> RigidbodyComponent {
        RigidbodyComponent {
            position: self
                .inverse_model
                .transform_point(&Point3::from(rigidbody.position))
                .coords,
            rotation: self.inverse_rotation * rigidbody.rotation,
            velocity: self.inverse_model.transform_vector(&rigidbody.velocity),
            ..rigidbody.clone()
        }
    }
}

/// Fixed-step driver and lifecycle manager for a physics world
pub struct PhysicsBridge {
    physics: Box<dyn PhysicsWorld>,
    fixed_time_step: f32,
    accumulated_time: f32,
    total_steps: u64,
    records: HashMap<Entity, BodyRecord>,
}

impl PhysicsBridge {
    /// Wrap an initialized physics world
    pub fn new(physics: Box<dyn PhysicsWorld>, config: &PhysicsConfig) -> Result<Self, PhysicsError> {
        let step = config.fixed_time_step;
        if !(step.is_finite() && step > 0.0) {
            return Err(PhysicsError::InitializationFailed(format!(
                "fixed time step must be positive, got {step}"
            )));
        }
        log::info!("Physics bridge ready (fixed step {step:.5}s)");
        Ok(Self {
            physics,
            fixed_time_step: step,
            accumulated_time: 0.0,
            total_steps: 0,
            records: HashMap::new(),
        })
    }

    /// Length of one simulation tick
    pub const fn fixed_time_step(&self) -> f32 {
        self.fixed_time_step
    }

    /// Time carried over to the next frame; always below one fixed step
    pub const fn accumulated_time(&self) -> f32 {
        self.accumulated_time
    }

    /// Ticks simulated since creation
    pub const fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// The wrapped physics world
    pub fn physics(&self) -> &dyn PhysicsWorld {
        self.physics.as_ref()
    }

    /// Entities currently owning native physics objects
    pub fn tracked_entities(&self) -> usize {
        self.records.len()
    }

    /// Advance by one frame of `delta` seconds
    ///
    /// Returns how many fixed ticks ran. Negative or non-finite deltas are
    /// ignored.
    pub fn step(&mut self, world: &mut World, delta: f32) -> u32 {
        if !delta.is_finite() || delta < 0.0 {
            log::warn!("physics step ignored invalid delta {delta}");
            return 0;
        }

        self.reconcile(world);

        self.accumulated_time += delta;
        let mut steps = 0;
        while self.accumulated_time >= self.fixed_time_step {
            self.simulate(world);
            self.accumulated_time -= self.fixed_time_step;
            steps += 1;
        }

        let fixed = self.fixed_time_step;
        let parent_spaces: HashMap<Entity, ParentSpace> = world
            .view2::<TransformComponent, RigidbodyComponent>()
            .into_iter()
            .filter_map(|entity| Some((entity, ParentSpace::of(world, entity)?)))
            .collect();
        world.each2_mut::<TransformComponent, RigidbodyComponent>(|entity, transform, rigidbody| {
            match parent_spaces.get(&entity) {
                Some(space) => sync_transform(transform, &space.to_local(rigidbody), delta, fixed),
                None => sync_transform(transform, rigidbody, delta, fixed),
            }
        });

        log::trace!("physics: {steps} step(s), carry {:.5}s", self.accumulated_time);
        steps
    }

    fn simulate(&mut self, world: &mut World) {
        for entity in world.view2::<TransformComponent, RigidbodyComponent>() {
            let Some(rigidbody) = world.get_component::<RigidbodyComponent>(entity) else {
                continue;
            };
            if let (true, Some(actor)) = (rigidbody.kinematic, rigidbody.actor) {
                let pose = Self::entity_pose(world, entity);
                if let Err(e) = self.physics.set_pose(actor, pose) {
                    log::warn!("kinematic target for {entity} rejected: {e}");
                }
            }
        }

        self.physics.simulate(self.fixed_time_step);
        self.physics.fetch_results();
        self.total_steps += 1;

        let physics = self.physics.as_ref();
        world.each_mut::<RigidbodyComponent>(|_, rigidbody| {
            let Some(actor) = rigidbody.actor else { return };
            if let Some(velocity) = physics.velocity(actor) {
                rigidbody.velocity = velocity.linear;
                rigidbody.angular_velocity = velocity.angular;
            }
            if let Some(pose) = physics.pose(actor) {
                rigidbody.position = pose.position;
                rigidbody.rotation = pose.rotation;
            }
        });
    }

    fn entity_pose(world: &World, entity: Entity) -> Pose {
        transformation::world_pose(world, entity)
            .map(|(position, rotation)| Pose { position, rotation })
            .unwrap_or_default()
    }

    fn entity_scale(world: &World, entity: Entity) -> Vec3 {
        world
            .get_component::<TransformComponent>(entity)
            .map_or_else(|| Vec3::new(1.0, 1.0, 1.0), |t| t.scale.abs())
    }

    fn require_alive(world: &World, entity: Entity) -> Result<(), PhysicsError> {
        if world.is_alive(entity) {
            Ok(())
        } else {
            Err(PhysicsError::EntityUnavailable(format!("{entity} is not alive")))
        }
    }

    /// Move every shape of `record` from its current host to `target`
    fn rehome_shapes(&mut self, record: &BodyRecord, target: ActorHandle) -> Result<(), PhysicsError> {
        let source = record.host();
        for shape in record.shapes() {
            if let Some(source) = source {
                self.physics.detach_shape(source, shape)?;
            }
            self.physics.attach_shape(target, shape)?;
        }
        Ok(())
    }

    /// Attach a rigidbody, creating its dynamic actor
    pub fn add_rigidbody(
        &mut self,
        world: &mut World,
        entity: Entity,
        mut rigidbody: RigidbodyComponent,
    ) -> Result<(), PhysicsError> {
        Self::require_alive(world, entity)?;

        let pose = Self::entity_pose(world, entity);
        let actor = self.physics.create_actor(&ActorDesc {
            kind: ActorKind::Dynamic,
            pose,
            mass: rigidbody.mass,
            linear_damping: rigidbody.resistance,
            angular_damping: rigidbody.angular_resistance,
            gravity: rigidbody.gravity,
            kinematic: rigidbody.kinematic,
            collision_detection: rigidbody.collision_detection,
        })?;

        let mut record = self.records.get(&entity).cloned().unwrap_or_default();
        if let Err(e) = self.rehome_shapes(&record, actor) {
            log::warn!("moving colliders of {entity} onto its rigidbody failed: {e}");
        }
        for previous in [record.rigid_actor.take(), record.static_host.take()].into_iter().flatten() {
            if let Err(e) = self.physics.destroy_actor(previous) {
                log::warn!("releasing previous actor of {entity} failed: {e}");
            }
        }
        record.rigid_actor = Some(actor);
        self.records.insert(entity, record);

        rigidbody.actor = Some(actor);
        rigidbody.position = pose.position;
        rigidbody.rotation = pose.rotation;
        world.add_component(entity, rigidbody);
        log::debug!("rigidbody attached to {entity}");
        Ok(())
    }

    /// Attach a box collider, creating its shape
    pub fn add_box_collider(
        &mut self,
        world: &mut World,
        entity: Entity,
        mut collider: BoxColliderComponent,
    ) -> Result<(), PhysicsError> {
        Self::require_alive(world, entity)?;
        let scale = Self::entity_scale(world, entity);
        let desc = ShapeDesc {
            geometry: ShapeGeometry::Box {
                half_extents: collider.size.component_mul(&scale).abs() * 0.5,
            },
            offset: collider.center.component_mul(&scale),
        };
        let shape = self.insert_shape(world, entity, ColliderSlot::Box, &desc)?;
        collider.shape = Some(shape);
        world.add_component(entity, collider);
        Ok(())
    }

    /// Attach a sphere collider, creating its shape
    pub fn add_sphere_collider(
        &mut self,
        world: &mut World,
        entity: Entity,
        mut collider: SphereColliderComponent,
    ) -> Result<(), PhysicsError> {
        Self::require_alive(world, entity)?;
        let scale = Self::entity_scale(world, entity);
        let desc = ShapeDesc {
            geometry: ShapeGeometry::Sphere {
                radius: collider.radius.abs() * scale.max(),
            },
            offset: collider.center.component_mul(&scale),
        };
        let shape = self.insert_shape(world, entity, ColliderSlot::Sphere, &desc)?;
        collider.shape = Some(shape);
        world.add_component(entity, collider);
        Ok(())
    }

    fn insert_shape(
        &mut self,
        world: &World,
        entity: Entity,
        slot: ColliderSlot,
        desc: &ShapeDesc,
    ) -> Result<ShapeHandle, PhysicsError> {
        // A replaced collider releases its old shape first.
        self.release_collider(entity, slot);

        let shape = self.physics.create_shape(desc)?;
        let mut record = self.records.remove(&entity).unwrap_or_default();

        let host = match record.host() {
            Some(host) => host,
            None => match self.physics.create_actor(&ActorDesc::fixed(Self::entity_pose(world, entity))) {
                Ok(host) => {
                    record.static_host = Some(host);
                    host
                }
                Err(e) => {
                    self.physics.destroy_shape(shape).ok();
                    self.store_record(entity, record);
                    return Err(e);
                }
            },
        };

        if let Err(e) = self.physics.attach_shape(host, shape) {
            self.physics.destroy_shape(shape).ok();
            self.store_record(entity, record);
            self.release_empty_host(entity);
            return Err(e);
        }

        match slot {
            ColliderSlot::Box => record.box_shape = Some(shape),
            ColliderSlot::Sphere => record.sphere_shape = Some(shape),
        }
        self.store_record(entity, record);
        Ok(shape)
    }

    fn store_record(&mut self, entity: Entity, record: BodyRecord) {
        if record.is_empty() {
            self.records.remove(&entity);
        } else {
            self.records.insert(entity, record);
        }
    }

    fn release_collider(&mut self, entity: Entity, slot: ColliderSlot) {
        let Some(record) = self.records.get_mut(&entity) else { return };
        let shape = match slot {
            ColliderSlot::Box => record.box_shape.take(),
            ColliderSlot::Sphere => record.sphere_shape.take(),
        };
        let host = record.host();
        if let Some(shape) = shape {
            if let Some(host) = host {
                if let Err(e) = self.physics.detach_shape(host, shape) {
                    log::warn!("detaching shape of {entity} failed: {e}");
                }
            }
            if let Err(e) = self.physics.destroy_shape(shape) {
                log::warn!("releasing shape of {entity} failed: {e}");
            }
        }
    }

    /// Drop a static host that no longer carries any shape
    fn release_empty_host(&mut self, entity: Entity) {
        let Some(record) = self.records.get_mut(&entity) else { return };
        if record.rigid_actor.is_none() && record.box_shape.is_none() && record.sphere_shape.is_none() {
            if let Some(host) = record.static_host.take() {
                if let Err(e) = self.physics.destroy_actor(host) {
                    log::warn!("releasing static host of {entity} failed: {e}");
                }
            }
        }
        if record.is_empty() {
            self.records.remove(&entity);
        }
    }

    fn release_rigid_actor(&mut self, world: &World, entity: Entity) {
        let Some(mut record) = self.records.remove(&entity) else { return };
        let Some(actor) = record.rigid_actor else {
            self.store_record(entity, record);
            return;
        };

        if record.shapes().next().is_some() && world.is_alive(entity) {
            match self.physics.create_actor(&ActorDesc::fixed(Self::entity_pose(world, entity))) {
                Ok(host) => {
                    if let Err(e) = self.rehome_shapes(&record, host) {
                        log::warn!("moving colliders of {entity} to a static host failed: {e}");
                    }
                    record.static_host = Some(host);
                }
                Err(e) => log::warn!("static host for {entity} unavailable: {e}"),
            }
        }

        record.rigid_actor = None;
        if let Err(e) = self.physics.destroy_actor(actor) {
            log::warn!("releasing rigidbody actor of {entity} failed: {e}");
        }
        self.store_record(entity, record);
        self.release_empty_host(entity);
    }

    /// Remove the rigidbody of `entity` and release its actor
    pub fn remove_rigidbody(&mut self, world: &mut World, entity: Entity) -> Option<RigidbodyComponent> {
        let mut removed = world.remove_component::<RigidbodyComponent>(entity);
        self.release_rigid_actor(world, entity);
        if let Some(rigidbody) = removed.as_mut() {
            rigidbody.actor = None;
        }
        removed
    }

    /// Remove the box collider of `entity` and release its shape
    pub fn remove_box_collider(&mut self, world: &mut World, entity: Entity) -> Option<BoxColliderComponent> {
        let mut removed = world.remove_component::<BoxColliderComponent>(entity);
        self.release_collider(entity, ColliderSlot::Box);
        self.release_empty_host(entity);
        if let Some(collider) = removed.as_mut() {
            collider.shape = None;
        }
        removed
    }

    /// Remove the sphere collider of `entity` and release its shape
    pub fn remove_sphere_collider(&mut self, world: &mut World, entity: Entity) -> Option<SphereColliderComponent> {
        let mut removed = world.remove_component::<SphereColliderComponent>(entity);
        self.release_collider(entity, ColliderSlot::Sphere);
        self.release_empty_host(entity);
        if let Some(collider) = removed.as_mut() {
            collider.shape = None;
        }
        removed
    }

    fn release_all(&mut self, entity: Entity) {
        self.release_collider(entity, ColliderSlot::Box);
        self.release_collider(entity, ColliderSlot::Sphere);
        if let Some(record) = self.records.remove(&entity) {
            for actor in [record.rigid_actor, record.static_host].into_iter().flatten() {
                if let Err(e) = self.physics.destroy_actor(actor) {
                    log::warn!("releasing actor of {entity} failed: {e}");
                }
            }
        }
    }

    /// Release every physics object of `entity`, then destroy it
    pub fn despawn(&mut self, world: &mut World, entity: Entity) -> bool {
        self.release_all(entity);
        world.destroy_entity(entity)
    }

    /// Bring native objects back in line with the registry
    ///
    /// Releases objects whose entity or component is gone and creates
    /// objects for components that were added without the bridge.
    pub fn reconcile(&mut self, world: &mut World) {
        let tracked: Vec<(Entity, BodyRecord)> = self.records.iter().map(|(e, r)| (*e, r.clone())).collect();
        for (entity, record) in tracked {
            if !world.is_alive(entity) {
                log::debug!("releasing physics objects of destroyed {entity}");
                self.release_all(entity);
                continue;
            }
            if record.rigid_actor.is_some()
                && world.get_component::<RigidbodyComponent>(entity).map(|r| r.actor) != Some(record.rigid_actor)
            {
                self.release_rigid_actor(world, entity);
            }
            if record.box_shape.is_some()
                && world.get_component::<BoxColliderComponent>(entity).map(|c| c.shape) != Some(record.box_shape)
            {
                self.release_collider(entity, ColliderSlot::Box);
                self.release_empty_host(entity);
            }
            if record.sphere_shape.is_some()
                && world.get_component::<SphereColliderComponent>(entity).map(|c| c.shape) != Some(record.sphere_shape)
            {
                self.release_collider(entity, ColliderSlot::Sphere);
                self.release_empty_host(entity);
            }
        }

        self.adopt(world);
    }

    fn adopt(&mut self, world: &mut World) {
        let unmanaged: Vec<Entity> = world
            .query::<RigidbodyComponent>()
            .filter(|(e, r)| r.actor.is_none() || self.records.get(e).and_then(|rec| rec.rigid_actor) != r.actor)
            .map(|(e, _)| e)
            .collect();
        for entity in unmanaged {
            if let Some(rigidbody) = world.remove_component::<RigidbodyComponent>(entity) {
                if let Err(e) = self.add_rigidbody(world, entity, rigidbody) {
                    log::warn!("rigidbody of {entity} could not be created: {e}");
                }
            }
        }

        let unmanaged: Vec<Entity> = world
            .query::<BoxColliderComponent>()
            .filter(|(e, c)| c.shape.is_none() || self.records.get(e).and_then(|rec| rec.box_shape) != c.shape)
            .map(|(e, _)| e)
            .collect();
        for entity in unmanaged {
            if let Some(collider) = world.remove_component::<BoxColliderComponent>(entity) {
                if let Err(e) = self.add_box_collider(world, entity, collider) {
                    log::warn!("box collider of {entity} could not be created: {e}");
                }
            }
        }

        let unmanaged: Vec<Entity> = world
            .query::<SphereColliderComponent>()
            .filter(|(e, c)| c.shape.is_none() || self.records.get(e).and_then(|rec| rec.sphere_shape) != c.shape)
            .map(|(e, _)| e)
            .collect();
        for entity in unmanaged {
            if let Some(collider) = world.remove_component::<SphereColliderComponent>(entity) {
                if let Err(e) = self.add_sphere_collider(world, entity, collider) {
                    log::warn!("sphere collider of {entity} could not be created: {e}");
                }
            }
        }
    }
}

impl Drop for PhysicsBridge {
    fn drop(&mut self) {
        let entities: Vec<Entity> = self.records.keys().copied().collect();
        for entity in entities {
            self.release_all(entity);
        }
    }
}
