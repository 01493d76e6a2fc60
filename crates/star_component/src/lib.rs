//! # star_component
//!
//! The data side of the scheduler: what a system may touch and where it
//! lives.
//!
//! This crate provides:
//!
//! - [`Accessor`]: a declared `(resource name, mode)` pair.
//! - [`AccessSet`]: a system's merged accessors, used for conflict tests.
//! - [`World`]: the shared, name-keyed resource container.
//! - [`ResourceRef`] / [`ResourceMut`]: scoped read and write handles.

pub mod accessor;
pub mod error;
pub mod world;

pub use accessor::{AccessMode, AccessSet, Accessor};
pub use error::{AccessorError, WorldError};
pub use world::{ResourceMut, ResourceRef, World};
