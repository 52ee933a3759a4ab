mod builder;
mod store;

use core::fmt;

pub use builder::*;
pub(crate) use store::*;

/// Represents an entity.
///
/// An entity is only an identifier, its meaning comes from the components
/// attached to it in a pool.
///
/// # Structure
///
/// An Entity is 64 bits in size.
///
/// | 32         | 32    |
/// | Generation | Index |
///
/// The index is the slot in the entity arena and starts at 1. The generation
/// is bumped every time the slot is freed, which lets stale ids be detected
/// once the index is handed out again.
///
/// [`Entity::NULL`] has every bit set and is never produced by allocation.
#[derive(PartialOrd, Clone, Copy, PartialEq, Eq, Ord, Hash)]
#[repr(transparent)]
pub struct Entity(u64);

/// The index of the entity in the entity store
pub type EntityIndex = u32;
/// The entity id version
pub type EntityGen = u32;

impl Entity {
    /// The permanent null entity. Never alive in any pool.
    pub const NULL: Entity = Entity(u64::MAX);

    /// Create an entity id from parts
    pub fn from_parts(index: EntityIndex, gen: EntityGen) -> Self {
        Self(((gen as u64) << 32) | index as u64)
    }

    #[inline]
    /// Returns the entity index
    pub fn index(self) -> EntityIndex {
        self.0 as u32
    }

    #[inline]
    /// Extract the generation from the entity
    pub fn gen(self) -> EntityGen {
        (self.0 >> 32) as u32
    }

    #[inline]
    /// Creates an entity id from raw bits
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    /// Returns the raw bits of an entity id
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Returns true if this is [`Entity::NULL`]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}v{}", self.index(), self.gen())
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
