//! # star_app: demo runner
//!
//! Builds a small World, registers a handful of systems with overlapping
//! accesses, and drives them with the tick loop until the tick limit is hit
//! or Ctrl-C is pressed.

use anyhow::Result;
use clap::Parser;
use star_app::{Scheduler, SchedulerConfig, TickConfig, TickLoop};
use star_component::World;
use star_system::{ExecutionPolicy, System, SystemConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "star_app", about = "Conflict-aware parallel system scheduler")]
struct Args {
    /// Number of ticks to run (0 = until Ctrl-C). Overrides STAR_MAX_TICKS.
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Target ticks per second. Overrides STAR_TICK_RATE.
    #[arg(short = 'r', long)]
    tick_rate: Option<f64>,

    /// Maximum systems running at once. Overrides STAR_MAX_WORKERS.
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Vec2 {
    x: f64,
    y: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("star_app=info".parse()?))
        .init();

    let args = Args::parse();

    let mut scheduler_config = SchedulerConfig::from_env();
    if let Some(workers) = args.workers {
        scheduler_config = scheduler_config.with_max_workers(workers);
    }
    let mut tick_config = TickConfig::from_env();
    if let Some(rate) = args.tick_rate {
        tick_config = tick_config.with_tick_rate(rate);
    }
    if let Some(ticks) = args.ticks {
        tick_config = tick_config.with_max_ticks(ticks);
    } else if tick_config.max_ticks == 0 {
        tick_config = tick_config.with_max_ticks(120);
    }

    let world = demo_world();
    let mut scheduler = Scheduler::new(world.clone(), scheduler_config);
    scheduler.register(demo_systems())?;

    let plan = scheduler.plan();
    for (i, wave) in plan.waves().iter().enumerate() {
        let names: Vec<_> = wave.iter().filter_map(|&s| plan.system_name(s)).collect();
        info!(wave = i, systems = ?names, "planned wave");
    }

    let mut tick_loop = TickLoop::new(scheduler, tick_config);
    let summary = tick_loop
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, stopping");
            }
        })
        .await;

    let health = *world.get("health")?.downcast::<u32>()?;
    let position = *world.get("position")?.downcast::<Vec2>()?;
    info!(
        ticks = summary.ticks,
        failures = summary.failures,
        health,
        x = position.x,
        y = position.y,
        "final state"
    );
    Ok(())
}

fn demo_world() -> World {
    let world = World::new();
    world.insert("health", 50_u32);
    world.insert("position", Vec2::default());
    world.insert("velocity", Vec2 { x: 1.0, y: 0.5 });
    world.insert("gravity", -9.81_f64);
    world.insert("spawned", 0_u32);
    world
}

fn demo_systems() -> Vec<Box<dyn System>> {
    vec![
        Box::new(
            SystemConfig::new("spawn")
                .write("spawned")
                .with_policy(ExecutionPolicy::OnInitOnly)
                .build(|ctx| {
                    *ctx.write::<u32>("spawned")? += 10;
                    Ok(())
                }),
        ),
        Box::new(
            SystemConfig::new("gravity")
                .read("gravity")
                .write("velocity")
                .build(|ctx| {
                    let g = *ctx.read::<f64>("gravity")?;
                    let dt = ctx.dt;
                    ctx.write::<Vec2>("velocity")?.y += g * dt;
                    Ok(())
                }),
        ),
        Box::new(
            SystemConfig::new("regen")
                .write("health")
                .with_policy(ExecutionPolicy::EveryNTicks(10))
                .build(|ctx| {
                    let health = ctx.write::<u32>("health")?;
                    *health = (*health + 1).min(100);
                    Ok(())
                }),
        ),
        Box::new(
            SystemConfig::new("movement")
                .read("velocity")
                .write("position")
                .build(|ctx| {
                    let v = *ctx.read::<Vec2>("velocity")?;
                    let dt = ctx.dt;
                    let p = ctx.write::<Vec2>("position")?;
                    p.x += v.x * dt;
                    p.y += v.y * dt;
                    Ok(())
                }),
        ),
        Box::new(
            SystemConfig::new("hud")
                .read("health")
                .read("position")
                .with_policy(ExecutionPolicy::EveryNTicks(30))
                .build(|ctx| {
                    let health = *ctx.read::<u32>("health")?;
                    let p = *ctx.read::<Vec2>("position")?;
                    info!(tick_id = ctx.tick_id, health, x = p.x, y = p.y, "hud");
                    Ok(())
                }),
        ),
    ]
}
