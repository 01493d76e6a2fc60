//! # star_system
//!
//! The "S" in ECS: what a system is and what it sees while it runs.
//!
//! A system declares a fixed list of [`Accessor`](star_component::Accessor)s
//! through [`System::data`] and receives a [`SystemContext`] holding the
//! resolved World handles when the scheduler runs it.
//!
//! ## Usage
//!
//! ```rust
//! use star_component::World;
//! use star_system::{SystemConfig, SystemContext, System};
//!
//! let regen = SystemConfig::new("regen")
//!     .write("health")
//!     .build(|ctx: &mut SystemContext| {
//!         *ctx.write::<u32>("health")? += 1;
//!         Ok(())
//!     });
//!
//! let world = World::new();
//! world.insert("health", 10_u32);
//!
//! let mut ctx = SystemContext::acquire(&world, &regen.access(), 1, 0.016).unwrap();
//! regen.run(&mut ctx).unwrap();
//! assert_eq!(*ctx.read::<u32>("health").unwrap(), 11);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod system;

pub use config::{FnSystem, SystemConfig};
pub use context::SystemContext;
pub use error::SystemError;
pub use system::{ExecutionPolicy, System};
