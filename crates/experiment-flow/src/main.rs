//! Experiment flow CLI.
//!
//! Commands:
//! - square: print the balanced square for a trial count
//! - order: print the assigned trial order for a counterbalancing set
//! - check-config: load and validate a deployment config
//! - simulate: run a synthetic participant session end to end

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use counterbalance::BalancedLatinSquare;
use experiment_flow::config::ExperimentConfig;
use experiment_flow::service::{ExperimentService, Registration, TrialPage};
use experiment_flow::store::MemoryStore;
use experiment_flow::survey::NUMERACY_ITEMS;

#[derive(Parser)]
#[command(name = "experiment-flow")]
#[command(version)]
#[command(about = "Counterbalanced experiment session tooling")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the balanced Latin square for a trial count
    Square {
        /// Number of trials (conditions) to counterbalance
        #[arg(long, default_value = "20")]
        n: usize,
    },

    /// Print the trial order assigned to a counterbalancing set
    Order {
        /// Number of trials (conditions) to counterbalance
        #[arg(long, default_value = "20")]
        n: usize,

        /// Row of the square to assign
        #[arg(long, default_value = "0")]
        set_index: usize,
    },

    /// Load and validate a deployment configuration
    CheckConfig {
        /// Path to the TOML config file
        #[arg(long, env = "EXPERIMENT_CONFIG", default_value = "experiment.toml")]
        path: PathBuf,
    },

    /// Run a synthetic participant session against the in-memory store
    Simulate {
        /// Number of main trials
        #[arg(long, default_value = "20")]
        trials: usize,

        /// Counterbalancing set index
        #[arg(long, default_value = "0")]
        set_index: usize,

        /// Per-trial budget in dollars
        #[arg(long, default_value = "1.0")]
        budget: f64,

        /// Visualization condition
        #[arg(long, default_value = "HOPs")]
        condition: String,

        /// Worker id for the synthetic participant
        #[arg(long, default_value = "sim-worker")]
        worker: String,

        /// Random seed for reproducible sessions
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Square { n } => {
            let square = BalancedLatinSquare::generate(n)?;
            println!(
                "Balanced square for {} conditions ({} rows):",
                square.order(),
                square.row_count()
            );
            for (i, row) in square.rows().enumerate() {
                println!("  set {:>2}: {}", i, row);
            }
        }

        Commands::Order { n, set_index } => {
            let order = counterbalance::trial_order(n, set_index)?;
            println!("{order}");
        }

        Commands::CheckConfig { path } => {
            let config = ExperimentConfig::load(&path)
                .with_context(|| format!("invalid config at {}", path.display()))?;
            let order = config.assigned_order()?;
            println!("Configuration OK: {}", path.display());
            println!("  run: {}", config.run.as_str());
            println!("  trials: {}", config.max_trials);
            println!("  trial set: {}", config.trial_set_index);
            println!("  budget: ${:.2}", config.budget);
            println!("  database: {}", config.database.url);
            println!("  assigned order: {}", order);
        }

        Commands::Simulate {
            trials,
            set_index,
            budget,
            condition,
            worker,
            seed,
        } => {
            let config = ExperimentConfig {
                max_trials: trials,
                trial_set_index: set_index,
                budget,
                ..Default::default()
            };
            let service = ExperimentService::new(config, MemoryStore::new())?;

            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };

            run_simulation(&service, &worker, &condition, budget, &mut rng).await?;
        }
    }

    Ok(())
}

/// Walk one synthetic participant through the whole session.
async fn run_simulation(
    service: &ExperimentService<MemoryStore>,
    worker: &str,
    condition: &str,
    budget: f64,
    rng: &mut impl Rng,
) -> Result<()> {
    let registration = service.register(worker, "sim-assignment", condition, rng).await?;
    let record = match registration {
        Registration::Accepted { record, .. } => record,
        Registration::Repeat { redirect_url } => {
            bail!("worker already registered, would redirect to {redirect_url}")
        }
    };

    let practice = service.practice_page(worker, condition);
    info!(stimulus = %practice.stimulus_path, "practice page");

    let max_trials = service.config().max_trials;
    let mut total_won = 0usize;
    for trial in 1..=max_trials {
        let page = service.trial_page(worker, condition, trial).await?;
        let ctx = match page {
            TrialPage::Present(ctx) => ctx,
            TrialPage::Redirect { next_url } => {
                bail!("trial {trial} unexpectedly settled, would redirect to {next_url}")
            }
        };

        // Synthetic estimates: noisy probability guess, bet scaled to it.
        let cles = (ctx.stimulus.odds * 100.0 + rng.random_range(-10.0..10.0)).clamp(0.0, 100.0);
        let bet = (budget * rng.random_range(0.1..0.9) * 100.0).round() / 100.0;

        let settled = service
            .settle_trial(worker, condition, trial, cles, bet, rng)
            .await?;
        if settled.settlement.won {
            total_won += 1;
        }
        println!(
            "  trial {:>2}  cond {:>2}  odds {:<5}  bet ${:<4}  {}  pay ${:.2}",
            trial,
            ctx.condition_index,
            ctx.stimulus.odds,
            bet,
            if settled.settlement.won { "won " } else { "lost" },
            settled.response.pay
        );
    }

    service
        .submit_strategy(worker, condition, "simulated strategy response")
        .await?;
    for item in 1..=NUMERACY_ITEMS {
        let max = experiment_flow::survey::item_maximum(item)
            .expect("item numbers 1..=11 exist");
        service
            .submit_numeracy_item(worker, item, (max / 2.0).round())
            .await?;
    }

    let strategy_status = service.strategy_status(worker).await?;
    let numeracy_status = service.numeracy_status(worker).await?;
    if !strategy_status.is_complete() || !numeracy_status.is_complete() {
        bail!("survey incomplete: strategy={strategy_status}, numeracy={numeracy_status}");
    }

    let summary = service.final_summary(worker).await?;

    println!("\n=== Simulated Session ===");
    println!("Worker: {}", worker);
    println!("Condition: {}", condition);
    println!("Trial set: {}", record.trial_set);
    println!("Trials won: {}/{}", total_won, max_trials);
    println!("Total bonus: ${:.2}", summary.total_bonus);
    println!("Completion token: {}", summary.token);

    Ok(())
}
