//! Counting physics world used by unit tests

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::SlotMap;

use super::world::{
    ActorDesc, ActorHandle, ActorKind, PhysicsError, PhysicsWorld, Pose, ShapeDesc, ShapeHandle,
    Velocity,
};
use crate::foundation::math::Vec3;

/// Call counters shared with the test that created the world
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MockStats {
    pub actors_created: usize,
    pub actors_destroyed: usize,
    pub shapes_created: usize,
    pub shapes_destroyed: usize,
    pub attaches: usize,
    pub detaches: usize,
    pub simulate_calls: usize,
    pub fetch_calls: usize,
}

struct MockActor {
    desc: ActorDesc,
    pose: Pose,
    shapes: Vec<ShapeHandle>,
}

/// Moves every non-kinematic dynamic actor at a constant velocity
pub struct MockPhysicsWorld {
    stats: Rc<RefCell<MockStats>>,
    actors: SlotMap<ActorHandle, MockActor>,
    shapes: SlotMap<ShapeHandle, Option<ActorHandle>>,
    drift: Vec3,
}

impl MockPhysicsWorld {
    pub fn new() -> (Self, Rc<RefCell<MockStats>>) {
        Self::with_drift(Vec3::zeros())
    }

    pub fn with_drift(drift: Vec3) -> (Self, Rc<RefCell<MockStats>>) {
        let stats = Rc::new(RefCell::new(MockStats::default()));
        (
            Self {
                stats: Rc::clone(&stats),
                actors: SlotMap::with_key(),
                shapes: SlotMap::with_key(),
                drift,
            },
            stats,
        )
    }

    fn moves(actor: &MockActor) -> bool {
        actor.desc.kind == ActorKind::Dynamic && !actor.desc.kinematic
    }
}

impl PhysicsWorld for MockPhysicsWorld {
    fn create_actor(&mut self, desc: &ActorDesc) -> Result<ActorHandle, PhysicsError> {
        self.stats.borrow_mut().actors_created += 1;
        Ok(self.actors.insert(MockActor {
            desc: desc.clone(),
            pose: desc.pose,
            shapes: Vec::new(),
        }))
    }

    fn destroy_actor(&mut self, actor: ActorHandle) -> Result<(), PhysicsError> {
        let removed = self
            .actors
            .remove(actor)
            .ok_or_else(|| PhysicsError::InvalidHandle("actor".into()))?;
        for shape in removed.shapes {
            if let Some(owner) = self.shapes.get_mut(shape) {
                *owner = None;
            }
        }
        self.stats.borrow_mut().actors_destroyed += 1;
        Ok(())
    }

    fn create_shape(&mut self, _desc: &ShapeDesc) -> Result<ShapeHandle, PhysicsError> {
        self.stats.borrow_mut().shapes_created += 1;
        Ok(self.shapes.insert(None))
    }

    fn attach_shape(&mut self, actor: ActorHandle, shape: ShapeHandle) -> Result<(), PhysicsError> {
        let owner = self
            .shapes
            .get_mut(shape)
            .ok_or_else(|| PhysicsError::InvalidHandle("shape".into()))?;
        let target = self
            .actors
            .get_mut(actor)
            .ok_or_else(|| PhysicsError::InvalidHandle("actor".into()))?;
        *owner = Some(actor);
        target.shapes.push(shape);
        self.stats.borrow_mut().attaches += 1;
        Ok(())
    }

    fn detach_shape(&mut self, actor: ActorHandle, shape: ShapeHandle) -> Result<(), PhysicsError> {
        let owner = self
            .shapes
            .get_mut(shape)
            .ok_or_else(|| PhysicsError::InvalidHandle("shape".into()))?;
        *owner = None;
        if let Some(target) = self.actors.get_mut(actor) {
            target.shapes.retain(|s| *s != shape);
        }
        self.stats.borrow_mut().detaches += 1;
        Ok(())
    }

    fn destroy_shape(&mut self, shape: ShapeHandle) -> Result<(), PhysicsError> {
        let owner = self
            .shapes
            .remove(shape)
            .ok_or_else(|| PhysicsError::InvalidHandle("shape".into()))?;
        if let Some(target) = owner.and_then(|a| self.actors.get_mut(a)) {
            target.shapes.retain(|s| *s != shape);
        }
        self.stats.borrow_mut().shapes_destroyed += 1;
        Ok(())
    }

    fn simulate(&mut self, step: f32) {
        let drift = self.drift;
        for actor in self.actors.values_mut().filter(|a| Self::moves(a)) {
            actor.pose.position += drift * step;
        }
        self.stats.borrow_mut().simulate_calls += 1;
    }

    fn fetch_results(&mut self) {
        self.stats.borrow_mut().fetch_calls += 1;
    }

    fn pose(&self, actor: ActorHandle) -> Option<Pose> {
        self.actors.get(actor).map(|a| a.pose)
    }

    fn velocity(&self, actor: ActorHandle) -> Option<Velocity> {
        self.actors.get(actor).map(|a| Velocity {
            linear: if Self::moves(a) { self.drift } else { Vec3::zeros() },
            angular: Vec3::zeros(),
        })
    }

    fn set_pose(&mut self, actor: ActorHandle, pose: Pose) -> Result<(), PhysicsError> {
        let target = self
            .actors
            .get_mut(actor)
            .ok_or_else(|| PhysicsError::InvalidHandle("actor".into()))?;
        target.pose = pose;
        Ok(())
    }

    fn actor_count(&self) -> usize {
        self.actors.len()
    }

    fn shape_count(&self) -> usize {
        self.shapes.len()
    }
}
