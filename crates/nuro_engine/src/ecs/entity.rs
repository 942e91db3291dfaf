//! Entity implementation

use std::fmt;

/// Entity identifier
///
/// A slot index plus the generation the slot had when the handle was issued.
/// Destroying an entity bumps the slot generation, so every outstanding copy
/// of the old handle stops resolving. Ordering is by index first, which is
/// what the render queue uses to break ties deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub(super) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index of this entity
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was created
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}
