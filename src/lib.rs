//! Entity component storage and query engine for a frame driven simulation
//! loop.
//!
//! Entities are opaque generational ids. Components are plain values keyed
//! by their concrete type and optionally grouped in a family, which allows a
//! query to ask for a base kind of component without enumerating every
//! member type.
//!
//! Storage is shared behind locks, so a second thread may read components
//! and iterate queries while the logic thread mutates.
//!
//! # Features
//! - Handles which safely invalidate once their entity is destroyed
//! - Declarative all/one/exclude queries, evaluated lazily
//! - Singleton entities addressed by [`Urn`]
//! - Prioritized systems with a typed [`Context`](system::Context)
//!
//! ```
//! use strata::{Component, EntityBuilder, EntityManager, key};
//!
//! #[derive(Debug, PartialEq)]
//! struct Position(f32, f32);
//! impl Component for Position {}
//!
//! let manager = EntityManager::new();
//! let entity = manager.build(EntityBuilder::new().set(Position(1.0, 2.0)));
//!
//! let found: Vec<_> = manager.entities_with_all([key::<Position>()]).collect();
//! assert_eq!(found, [entity.clone()]);
//!
//! entity.dispose();
//! assert!(!entity.exists());
//! assert!(manager.get_entity(entity.id()).is_null());
//! ```

mod component;
pub mod components;
mod entity;
mod entity_ref;
pub mod error;
pub mod events;
pub mod filter;
mod manager;
mod pool;
pub mod query;
pub mod schedule;
pub mod system;
mod table;
mod urn;
mod world;

pub use component::{boxed, downcast, key, Component, ComponentBox, ComponentKey, ComponentValue};
pub use components::SingleComponent;
pub use entity::{Entity, EntityBuilder, EntityGen, EntityIndex};
pub use entity_ref::EntityRef;
pub use error::{Error, Result};
pub use events::{EntityEvent, EventSubscriber};
pub use filter::Filter;
pub use manager::EntityManager;
pub use pool::EntityPool;
pub use query::{EntityIter, Group, GroupBuilder};
pub use schedule::EntitySystemManager;
pub use system::{BoxedSystem, Context, System};
pub use table::{ComponentIter, ComponentTable};
pub use urn::Urn;
pub use world::World;
