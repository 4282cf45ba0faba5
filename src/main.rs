// Tue Jan 13 2026 - Alex

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use frame_jobs::{
    config::{Config, FrameBudget},
    demo::DemoWorld,
    engine::JobScheduler,
    orchestration::PhaseOrchestrator,
    utils::{self, logging, LoggingUtils},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Runs simulated agent update ticks on a background job scheduler", long_about = None)]
struct Args {
    #[arg(short, long)]
    threads: Option<usize>,

    #[arg(long, default_value_t = 100)]
    ticks: u64,

    #[arg(short, long, default_value_t = 64)]
    agents: usize,

    #[arg(short, long, default_value_t = 16)]
    groups: usize,

    #[arg(long, default_value_t = 8)]
    probe: usize,

    /// Pickups offered by each group
    #[arg(long, default_value_t = 4)]
    items: u32,

    /// CPU time burned per work item, in microseconds
    #[arg(long, default_value_t = 50)]
    work_us: u64,

    /// Simulated owner-thread frame work between start and end of a tick
    #[arg(long, default_value_t = 2)]
    frame_ms: u64,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(long)]
    no_progress: bool,

    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Default)]
struct RunTotals {
    updates: usize,
    discarded: usize,
    timed_out: u64,
    pickups: usize,
    errands: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::new(),
    };
    if let Some(threads) = args.threads {
        config = config.with_thread_count(threads);
    }
    if let Some(ms) = args.timeout_ms {
        config = config.with_max_timeout(Duration::from_millis(ms));
    }
    config.validate()?;

    println!("{}", "Frame Job Scheduler".cyan().bold());
    println!("{}", "=".repeat(50).cyan());
    println!(
        "{} {} on {}, {} frame budget",
        "[*]".blue(),
        utils::pluralize(args.agents, "agent", "agents"),
        utils::pluralize(config.effective_threads(), "worker", "workers"),
        utils::format_duration(config.max_timeout())
    );
    println!();

    let scheduler = Arc::new(JobScheduler::new(&config).context("starting workers")?);
    let world = Arc::new(
        DemoWorld::new(args.agents, args.groups)
            .with_probe_count(args.probe)
            .with_items_per_group(args.items)
            .with_work(Duration::from_micros(args.work_us)),
    );
    let mut orchestrator = PhaseOrchestrator::new(world.clone(), scheduler.clone(), Box::new(config.clone()));

    let pb = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.ticks);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ticks {msg}")?
                .progress_chars("█▓▒░ "),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };

    let frame = Duration::from_millis(args.frame_ms);
    let mut totals = RunTotals::default();
    let start_time = Instant::now();

    for _ in 0..args.ticks {
        orchestrator.start_update()?;
        orchestrator.release_fetches()?;

        if !frame.is_zero() {
            thread::sleep(frame);
        }

        let report = orchestrator.end_update();
        totals.updates += report.updates.len();
        totals.discarded += report.discarded;
        if report.timed_out {
            totals.timed_out += 1;
        }
        for update in &report.updates {
            totals.pickups += update.pickups.len();
            totals.errands += update.errands.len();
        }

        pb.set_message(format!("{} updated", totals.updates));
        pb.inc(1);
    }

    pb.finish_with_message("Complete!");
    let elapsed = start_time.elapsed();

    orchestrator.dispose();
    drop(orchestrator);
    scheduler.dispose();

    print_summary(&args, &totals, elapsed, world.table_updates());
    Ok(())
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    if let Some(path) = &args.log_file {
        let level = LoggingUtils::level_from_verbosity(args.verbose.max(1));
        LoggingUtils::init_logger_with_file(level, path)
            .with_context(|| format!("opening log file {}", path.display()))?;
    } else if std::env::var_os("RUST_LOG").is_some() {
        logging::init_from_env();
    } else {
        logging::init_logger(args.verbose);
    }
    Ok(())
}

fn per_tick(elapsed: Duration, ticks: u64) -> Duration {
    if ticks == 0 {
        Duration::ZERO
    } else {
        elapsed.div_f64(ticks as f64)
    }
}

fn print_summary(args: &Args, totals: &RunTotals, elapsed: Duration, table_updates: u64) {
    let attempted = totals.updates + totals.discarded;
    let per_tick = per_tick(elapsed, args.ticks);

    println!();
    println!("{}", "Run Summary".cyan().bold());
    println!("{}", "-".repeat(40).cyan());
    println!("  Ticks: {} in {} ({} per tick)", args.ticks, utils::format_duration(elapsed), utils::format_duration(per_tick));
    println!(
        "  Agent updates: {} ({:.1}%)",
        totals.updates.to_string().green(),
        utils::percentage(totals.updates as u64, attempted as u64)
    );

    let discarded = totals.discarded.to_string();
    if totals.discarded > 0 {
        println!("  Discarded: {}", discarded.red());
    } else {
        println!("  Discarded: {}", discarded.green());
    }

    let timed_out = utils::pluralize(totals.timed_out as usize, "tick", "ticks");
    if totals.timed_out > 0 {
        println!("  Over budget: {}", timed_out.yellow());
    } else {
        println!("  Over budget: {}", timed_out.green());
    }

    println!("  Pickups merged: {}", totals.pickups);
    println!("  Errands collected: {}", totals.errands);
    println!("  Offset table refreshes: {}", table_updates);
    println!();
}
