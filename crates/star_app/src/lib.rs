//! # star_app
//!
//! Runs systems against a shared [`World`](star_component::World), in
//! parallel wherever their declared accesses allow it.
//!
//! ## Pieces
//!
//! - [`SystemRegistry`]: the ordered, validated set of active systems.
//! - [`ExecutionPlan`]: the conflict graph and wave selection.
//! - [`Scheduler`]: runs one tick over the registry on a bounded worker
//!   pool and reports per-system outcomes in a [`TickResult`].
//! - [`TickLoop`]: drives a scheduler at a fixed rate.
//!
//! ## Example
//!
//! ```rust,no_run
//! use star_app::{Scheduler, SchedulerConfig};
//! use star_component::World;
//! use star_system::SystemConfig;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let world = World::new();
//! world.insert("velocity", 1.5_f64);
//! world.insert("position", 0.0_f64);
//!
//! let mut scheduler = Scheduler::new(world, SchedulerConfig::from_env());
//! scheduler.register(vec![Box::new(
//!     SystemConfig::new("movement")
//!         .read("velocity")
//!         .write("position")
//!         .build(|ctx| {
//!             let v = *ctx.read::<f64>("velocity")?;
//!             *ctx.write::<f64>("position")? += v * ctx.dt;
//!             Ok(())
//!         }),
//! )])?;
//!
//! let result = scheduler.tick().await;
//! assert!(result.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod registry;
pub mod result;
pub mod scheduler;
pub mod tick;

pub use config::{SchedulerConfig, TickConfig};
pub use error::RegistrationError;
pub use graph::ExecutionPlan;
pub use registry::{RegisteredSystem, SystemRegistry};
pub use result::TickResult;
pub use scheduler::{Scheduler, SchedulerState, TickCancel};
pub use tick::{RunSummary, TickLoop};
