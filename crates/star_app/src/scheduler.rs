//! Scheduler: runs the registered systems once per tick.
//!
//! Each tick walks the state machine
//!
//! ```text
//! Idle -> Dispatching -> Running -> Joined -+-> Idle
//!              ^                            |
//!              +----------------------------+  (systems still pending)
//! ```
//!
//! 1. Select the systems due on this tick and reject those whose declared
//!    resources are missing from the World.
//! 2. `Dispatching`: take the next conflict-free wave from the execution
//!    plan.
//! 3. `Running`: run every system of the wave on the blocking worker pool.
//!    A worker resolves the system's World handles, calls `run`, and drops
//!    the handles when `run` returns or unwinds.
//! 4. `Joined`: wait for the whole wave and record each outcome, then go
//!    back to step 2 until no system is pending.
//!
//! A failing system never stops its siblings. Its error lands in the
//! [`TickResult`] and it is attempted again on the next tick.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures::future::join_all;
use star_component::{AccessSet, World};
use star_system::{System, SystemContext, SystemError};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::RegistrationError;
use crate::graph::ExecutionPlan;
use crate::registry::SystemRegistry;
use crate::result::TickResult;

/// Where the scheduler is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No tick in progress.
    Idle,
    /// Selecting the next wave.
    Dispatching,
    /// A wave is executing.
    Running,
    /// The current wave has finished.
    Joined,
}

/// A handle for cancelling a tick from another task.
///
/// A request is honoured before the next wave is dispatched. Systems that
/// are already running finish normally. Each request cancels at most one
/// tick: a request still pending when a tick ends (because no wave was left
/// to dispatch) is dropped.
#[derive(Debug, Clone, Default)]
pub struct TickCancel {
    requested: Arc<AtomicBool>,
}

impl TickCancel {
    /// Request cancellation of the current (or next) tick.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if a cancellation is pending.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Consume a pending request.
    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }

    /// Drop a pending request without acting on it.
    pub(crate) fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// Runs registered systems over a shared [`World`].
#[derive(Debug)]
pub struct Scheduler {
    /// Scheduler configuration.
    config: SchedulerConfig,
    /// The shared resource container.
    world: World,
    /// The active registration.
    registry: SystemRegistry,
    /// Cached plan; `None` when the registration changed since it was built.
    plan: Option<Arc<ExecutionPlan>>,
    /// Id of the most recent tick.
    tick_id: u64,
    /// Current position in the tick state machine.
    state: SchedulerState,
    /// Cancellation flag shared with [`TickCancel`] handles.
    cancel: TickCancel,
    /// Bounds the number of systems running at once.
    workers: Arc<Semaphore>,
    /// Start of the previous tick, for `dt`.
    last_tick: Option<Instant>,
    /// Workers of the wave being joined, with their slot in the wave. Still
    /// populated if a tick future was dropped mid-wave.
    in_flight: Vec<(usize, JoinHandle<Result<(), SystemError>>)>,
}

impl Scheduler {
    /// Create a scheduler over `world`.
    #[must_use]
    pub fn new(world: World, config: SchedulerConfig) -> Self {
        let workers = Arc::new(Semaphore::new(config.max_workers));
        Self {
            config,
            world,
            registry: SystemRegistry::new(),
            plan: None,
            tick_id: 0,
            state: SchedulerState::Idle,
            cancel: TickCancel::default(),
            workers,
            last_tick: None,
            in_flight: Vec::new(),
        }
    }

    /// Returns the scheduler configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Returns the World the scheduler runs against.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns the id of the most recent tick (0 before the first tick).
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Returns the active registration.
    #[must_use]
    pub fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    /// Returns a handle that cancels ticks of this scheduler.
    #[must_use]
    pub fn cancel_handle(&self) -> TickCancel {
        self.cancel.clone()
    }

    /// Replace the active registration with `systems`, in order.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] if any system is malformed or two
    /// share a name. The previous registration then stays active.
    pub fn register(&mut self, systems: Vec<Box<dyn System>>) -> Result<(), RegistrationError> {
        self.registry.replace_all(systems)?;
        self.invalidate_plan();
        info!(
            system_count = self.registry.len(),
            "registered systems"
        );
        Ok(())
    }

    /// Append one system to the active registration.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] if the system is malformed or its name
    /// is taken.
    pub fn add_system(&mut self, system: Box<dyn System>) -> Result<(), RegistrationError> {
        self.registry.register(system)?;
        self.invalidate_plan();
        Ok(())
    }

    /// Remove a system by name. Returns `true` if it was registered.
    pub fn remove_system(&mut self, name: &str) -> bool {
        let removed = self.registry.unregister(name);
        if removed {
            self.invalidate_plan();
        }
        removed
    }

    /// Returns the execution plan, rebuilding it if the registration changed.
    pub fn plan(&mut self) -> Arc<ExecutionPlan> {
        if let Some(plan) = &self.plan {
            return Arc::clone(plan);
        }
        let plan = Arc::new(ExecutionPlan::build(self.registry.as_slice()));
        info!(
            tick_id = self.tick_id,
            system_count = plan.len(),
            conflict_count = plan.edges().len(),
            wave_count = plan.waves().len(),
            "recomputed execution plan"
        );
        self.plan = Some(Arc::clone(&plan));
        plan
    }

    fn invalidate_plan(&mut self) {
        self.plan = None;
    }

    /// Run one tick.
    ///
    /// Every due system is attempted (or reported as cancelled) before this
    /// returns. Failures are reported per system in the result.
    ///
    /// Dropping the returned future mid-wave is safe: the abandoned workers
    /// keep their resources until they finish, and the next call waits for
    /// them before dispatching anything. Their outcomes are not reported.
    pub async fn tick(&mut self) -> TickResult {
        self.settle_abandoned().await;

        self.tick_id += 1;
        let tick_id = self.tick_id;
        let started = Instant::now();
        let dt = self
            .last_tick
            .map_or(0.0, |last| started.duration_since(last).as_secs_f64());
        self.last_tick = Some(started);

        let plan = self.plan();
        let mut result = TickResult::new(tick_id);

        let mut pending: Vec<usize> = Vec::with_capacity(self.registry.len());
        for (index, entry) in self.registry.iter().enumerate() {
            if entry.is_due(tick_id) {
                pending.push(index);
            } else {
                result.skipped.push(entry.name.clone());
            }
        }

        // Systems whose resources are missing would fail on acquisition
        // anyway; reject them up front so they do not occupy a wave.
        for (index, resource) in plan.missing_resources(&self.world) {
            if !pending.contains(&index) {
                continue;
            }
            pending.retain(|&i| i != index);
            let name = self.system_name(index);
            warn!(tick_id, system = %name, %resource, "system declares unknown resource");
            result
                .per_system
                .insert(name, Err(SystemError::UnknownResource(resource)));
        }

        debug!(tick_id, dt, pending = pending.len(), "tick start");

        while !pending.is_empty() {
            if self.cancel.take() {
                result.cancelled = pending.iter().map(|&i| self.system_name(i)).collect();
                warn!(
                    tick_id,
                    cancelled = result.cancelled.len(),
                    "tick cancelled before next wave"
                );
                break;
            }

            self.state = SchedulerState::Dispatching;
            let wave = plan.next_wave(&pending);
            pending.retain(|i| !wave.contains(i));
            let wave_names: Vec<String> = wave.iter().map(|&i| self.system_name(i)).collect();
            debug!(
                tick_id,
                wave = result.waves.len(),
                systems = ?wave_names,
                "dispatching wave"
            );

            self.state = SchedulerState::Running;
            let outcomes = self.run_wave(&wave, tick_id, dt).await;

            self.state = SchedulerState::Joined;
            for (index, outcome) in wave.iter().copied().zip(outcomes) {
                let name = self.system_name(index);
                match &outcome {
                    Ok(()) => self.registry.mark_succeeded(index),
                    Err(SystemError::AccessConflict(resource)) => {
                        error!(tick_id, system = %name, %resource, "resource access conflict");
                        debug_assert!(
                            false,
                            "'{name}' could not acquire '{resource}': conflicting access overlapped"
                        );
                    }
                    Err(err) => warn!(tick_id, system = %name, %err, "system failed"),
                }
                result.per_system.insert(name, outcome);
            }
            result.waves.push(wave_names);
        }

        self.cancel.clear();
        self.state = SchedulerState::Idle;
        result.elapsed = started.elapsed();
        debug!(
            tick_id,
            waves = result.waves.len(),
            failures = result.failure_count(),
            skipped = result.skipped.len(),
            elapsed_us = u64::try_from(result.elapsed.as_micros()).unwrap_or(u64::MAX),
            "tick complete"
        );
        result
    }

    /// Wait for workers left behind by a tick whose future was dropped.
    async fn settle_abandoned(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        warn!(
            tick_id = self.tick_id,
            workers = self.in_flight.len(),
            "waiting for workers of an abandoned tick"
        );
        for (_, handle) in &mut self.in_flight {
            // A finished handle may already have been consumed by the
            // abandoned join and must not be polled again.
            if !handle.is_finished() {
                let _ = handle.await;
            }
        }
        self.in_flight.clear();
        self.state = SchedulerState::Idle;
    }

    /// Run one wave on the worker pool and collect outcomes in wave order.
    async fn run_wave(
        &mut self,
        wave: &[usize],
        tick_id: u64,
        dt: f64,
    ) -> Vec<Result<(), SystemError>> {
        let mut outcomes: Vec<Option<Result<(), SystemError>>> = Vec::with_capacity(wave.len());

        for &index in wave {
            let Some(entry) = self.registry.get_index(index) else {
                outcomes.push(Some(Err(SystemError::Run(anyhow::anyhow!(
                    "system {index} vanished from the registry"
                )))));
                continue;
            };
            let system = Arc::clone(&entry.system);
            let access = entry.access.clone();

            let permit = match Arc::clone(&self.workers).acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    outcomes.push(Some(Err(SystemError::Run(err.into()))));
                    continue;
                }
            };

            let world = self.world.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                run_system(system.as_ref(), &world, &access, tick_id, dt)
            });
            self.in_flight.push((outcomes.len(), handle));
            outcomes.push(None);
        }

        // Joined through `&mut` so the handles stay on the scheduler if this
        // future is dropped.
        let joined = join_all(self.in_flight.iter_mut().map(|(_, handle)| handle)).await;
        let slots: Vec<usize> = self.in_flight.drain(..).map(|(slot, _)| slot).collect();
        for (slot, joined) in slots.into_iter().zip(joined) {
            outcomes[slot] = Some(joined.unwrap_or_else(|err| Err(join_failure(err))));
        }

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| {
                    Err(SystemError::Run(anyhow::anyhow!("worker produced no outcome")))
                })
            })
            .collect()
    }

    fn system_name(&self, index: usize) -> String {
        self.registry
            .get_index(index)
            .map_or_else(|| format!("#{index}"), |entry| entry.name.clone())
    }
}

/// Resolve handles, run the system, release handles.
fn run_system(
    system: &dyn System,
    world: &World,
    access: &AccessSet,
    tick_id: u64,
    dt: f64,
) -> Result<(), SystemError> {
    let mut ctx = SystemContext::acquire(world, access, tick_id, dt)?;
    system.run(&mut ctx)?;
    Ok(())
}

fn join_failure(err: JoinError) -> SystemError {
    if err.is_panic() {
        SystemError::Panicked(panic_message(err.into_panic().as_ref()))
    } else {
        SystemError::Run(anyhow::anyhow!("worker task cancelled"))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
