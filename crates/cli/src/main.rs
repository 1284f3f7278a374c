//! fauxbar CLI - simulated progress for multi-step jobs.

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fauxbar_core::{EstimateStrategy, LifecycleState};
use fauxbar_progress::{AnimatorConfig, FakeProgressProvider};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const BAR_WIDTH: usize = 40;

#[derive(Parser)]
#[command(name = "fauxbar")]
#[command(about = "Simulated progress for multi-step jobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter, e.g. "fauxbar_progress=debug" (defaults to RUST_LOG or "warn")
    #[arg(long, global = true)]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated job and render its progress
    Run {
        #[command(flatten)]
        plan: PlanArgs,
        /// Real duration of each step in milliseconds; the last value repeats
        #[arg(long, value_delimiter = ',', default_value = "800")]
        durations_ms: Vec<u64>,
        /// Estimate for the first step in milliseconds
        #[arg(long, default_value = "1000")]
        initial_estimate_ms: u64,
        /// How later steps are estimated (recent, average)
        #[arg(long, default_value = "recent")]
        strategy: EstimateStrategy,
        /// Animation tick interval in milliseconds
        #[arg(long, default_value = "50")]
        tick_ms: u64,
        /// Steps to append once the first step completes
        #[arg(long, default_value = "0")]
        extra_steps: usize,
        /// Number of runs; the provider is reset between runs
        #[arg(long, default_value = "1")]
        runs: usize,
        /// Print JSON snapshots instead of a bar
        #[arg(long)]
        json: bool,
    },
    /// Show the plan a step configuration produces
    Plan {
        #[command(flatten)]
        plan: PlanArgs,
    },
}

#[derive(Args)]
struct PlanArgs {
    /// Number of steps
    #[arg(long, default_value = "3")]
    steps: usize,
    /// Accumulated weight per step, comma separated (default: even split)
    #[arg(long, value_delimiter = ',')]
    weights: Vec<f64>,
    /// Completion signals per step, comma separated (default: 1 each)
    #[arg(long, value_delimiter = ',')]
    concurrency: Vec<u32>,
}

impl PlanArgs {
    fn apply(&self, provider: &FakeProgressProvider) -> Result<()> {
        let weights = (!self.weights.is_empty()).then_some(self.weights.as_slice());
        let concurrency = (!self.concurrency.is_empty()).then_some(self.concurrency.as_slice());
        provider
            .setup(self.steps, concurrency, weights)
            .context("invalid step plan")
    }
}

#[derive(Debug)]
enum Event {
    Progress(f64),
    Completed,
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    match cli.command {
        Commands::Plan { plan } => {
            let provider = FakeProgressProvider::default();
            plan.apply(&provider)?;

            println!("Plan ({} steps)", provider.steps());
            let weights = provider.accumulated_weights();
            for (i, (weight, concurrency)) in weights
                .iter()
                .zip(provider.step_concurrencies())
                .enumerate()
            {
                println!("  step {} | weight {:.3} | signals {}", i + 1, weight, concurrency);
            }
        }
        Commands::Run {
            plan,
            durations_ms,
            initial_estimate_ms,
            strategy,
            tick_ms,
            extra_steps,
            runs,
            json,
        } => {
            let provider = FakeProgressProvider::builder()
                .strategy(strategy)
                .config(AnimatorConfig::new().with_tick_interval(Duration::from_millis(tick_ms)))
                .build()?;
            plan.apply(&provider)?;

            let (tx, mut rx) = mpsc::unbounded_channel();
            let done = tx.clone();
            provider.register_listener(
                move |value| {
                    let _ = tx.send(Event::Progress(value));
                },
                move || {
                    let _ = done.send(Event::Completed);
                },
            )?;

            let durations: Vec<Duration> =
                durations_ms.iter().map(|&ms| Duration::from_millis(ms)).collect();

            for run in 1..=runs.max(1) {
                if run > 1 {
                    provider.reset();
                }
                info!("Starting run {}", run);
                provider.start(Duration::from_millis(initial_estimate_ms))?;
                let worker = tokio::spawn(simulate(provider.clone(), durations.clone(), extra_steps));
                wait_for_run(&provider, &mut rx, worker, json).await?;

                if json {
                    println!("{}", serde_json::to_string(&provider.snapshot())?);
                } else {
                    render(provider.progress(), &provider)?;
                    println!();
                }
                info!("Run {} finished", run);
            }
        }
    }

    Ok(())
}

/// Render events until the run completes or the worker fails.
async fn wait_for_run(
    provider: &FakeProgressProvider,
    rx: &mut mpsc::UnboundedReceiver<Event>,
    mut worker: JoinHandle<Result<()>>,
    json: bool,
) -> Result<()> {
    let mut worker_done = false;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(Event::Progress(_)) if json => {
                    println!("{}", serde_json::to_string(&provider.snapshot())?);
                }
                Some(Event::Progress(value)) => render(value, provider)?,
                Some(Event::Completed) | None => break,
            },
            result = &mut worker, if !worker_done => {
                worker_done = true;
                result.context("simulated worker panicked")??;
                if provider.state() != LifecycleState::Finished {
                    bail!("simulation stopped before the last step");
                }
            }
        }
    }
    if !worker_done {
        worker.await.context("simulated worker panicked")??;
    }
    Ok(())
}

/// Stand-in for real work: each step spawns one task per completion signal.
async fn simulate(
    provider: FakeProgressProvider,
    durations: Vec<Duration>,
    extra_steps: usize,
) -> Result<()> {
    let mut step = 0;
    while provider.state().is_running() {
        let Some(&signals) = provider.step_concurrencies().get(step) else {
            break;
        };
        let duration = durations
            .get(step)
            .or_else(|| durations.last())
            .copied()
            .unwrap_or(Duration::from_millis(800));
        debug!("Simulating step {} for {:?}", step, duration);

        let workers: Vec<_> = (1..=signals)
            .map(|k| {
                let provider = provider.clone();
                let delay = duration * k / signals;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    provider.finish_step()
                })
            })
            .collect();
        for worker in workers {
            worker.await??;
        }

        if step == 0 && extra_steps > 0 && provider.state() == LifecycleState::Resumed {
            provider.dynamic_add(extra_steps, None, None)?;
            info!("Added {} steps", extra_steps);
        }
        step += 1;
    }
    Ok(())
}

fn render(value: f64, provider: &FakeProgressProvider) -> Result<()> {
    let filled = (value.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    let mut out = std::io::stdout().lock();
    write!(
        out,
        "\r[{}{}] {:5.1}%  step {}/{}",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        value * 100.0,
        (provider.current_step() + 1).min(provider.steps()),
        provider.steps(),
    )?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fauxbar_progress::VirtualTime;

    #[tokio::test]
    async fn test_failed_worker_ends_run() {
        let provider = FakeProgressProvider::default();
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(async { Err::<(), _>(anyhow::anyhow!("worker failed")) });

        let err = wait_for_run(&provider, &mut rx, worker, false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "worker failed");
    }

    #[tokio::test]
    async fn test_worker_stopping_early_ends_run() {
        let provider = FakeProgressProvider::default();
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(async { Ok::<(), anyhow::Error>(()) });

        let err = wait_for_run(&provider, &mut rx, worker, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("before the last step"));
    }

    #[tokio::test]
    async fn test_completed_run() {
        let time = VirtualTime::new();
        let provider = FakeProgressProvider::builder()
            .virtual_time(&time)
            .build()
            .unwrap();
        provider.setup(1, None, None).unwrap();
        provider.start(Duration::from_secs(1)).unwrap();
        provider.finish_step().unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Event::Completed).unwrap();
        let worker = tokio::spawn(async { Ok::<(), anyhow::Error>(()) });

        wait_for_run(&provider, &mut rx, worker, true).await.unwrap();
    }
}
