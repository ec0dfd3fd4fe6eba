//! Query and mutation handlers.
//!
//! Each handler validates its input before touching a store, then issues its
//! store calls in a fixed order. The GraphQL layer is a thin shell over these.

mod cosmonaut;
mod superpower;

pub use cosmonaut::{create_cosmonaut, list_cosmonauts, modify_cosmonaut, remove_cosmonaut};
pub use superpower::{create_superpower, list_superpowers, modify_superpower, remove_superpower};
