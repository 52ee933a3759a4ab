use thiserror::Error;

use crate::{Entity, Urn};

/// Conflicts and misuse reported by the storage layer.
///
/// Plain misses (absent component, unknown id) are never errors; they are
/// returned as `None` or the null handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The entity {0} does not exist or has been destroyed.")]
    NoSuchEntity(Entity),
    #[error("The handle for {0} is not active in any pool.")]
    Inactive(Entity),
    #[error("The id {0} can not be registered: it was never allocated or is in use.")]
    IdUnavailable(Entity),
    #[error("The entity slot for {0} is already occupied.")]
    EntityOccupied(Entity),
    #[error("The entity {0} is not loaded in this pool.")]
    NotLoaded(Entity),
    #[error("The singleton {urn} is already claimed by {owner}.")]
    UrnClaimed { urn: Urn, owner: Entity },
    #[error("No resource of type {0} was registered in the context.")]
    MissingResource(&'static str),
    #[error("Invalid urn {0:?}: {1}")]
    InvalidUrn(String, &'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
