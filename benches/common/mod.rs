#![allow(clippy::new_without_default)]

pub mod add_remove;
pub mod query;
pub mod simple_insert;
