use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use orderbot::config::mask_card;
use orderbot::runner;
use orderbot::selectors::POPUP_CLOSE;
use orderbot::{
    Outcome, RunConfig, RunReport, ScriptedDocument, Sequencer, Step,
};

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = "orderbot.yaml";

/// Delays in a dry run are this fraction of the configured ones
const DRY_RUN_SCALE: f64 = 0.01;

#[derive(Parser)]
#[command(name = "orderbot")]
#[command(about = "Polling checkout sequencer over Chrome DevTools")]
#[command(version)]
struct Cli {
    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the checkout
    Run(RunArgs),
    /// Validate a config and print what a run would use
    Check {
        /// Config file (defaults to ./orderbot.yaml, then built-in defaults)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the step table in dispatch order
    Steps,
}

#[derive(Args)]
struct RunArgs {
    /// Config file (defaults to ./orderbot.yaml, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Product page to start from (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// Write the JSON run report here
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Drive the scripted checkout instead of launching Chrome
    #[arg(long)]
    dry_run: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    // RUST_LOG wins over -v/-q
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> orderbot::Result<RunConfig> {
    match path {
        Some(path) => RunConfig::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => RunConfig::load(DEFAULT_CONFIG),
        None => Ok(RunConfig::default()),
    }
}

#[tokio::main]
async fn main() -> orderbot::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Check { config } => check(config.as_deref()).map(|()| true),
        Command::Steps => {
            print_steps();
            Ok(true)
        }
    };

    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(kind = e.kind(), "{}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the checkout completed
async fn run(args: RunArgs) -> orderbot::Result<bool> {
    let mut config = load_config(args.config.as_deref())?;
    if args.headless {
        config.browser.headless = true;
    }
    if let Some(url) = args.url {
        config.product_url = url;
    }
    config.validate()?;

    let report = if args.dry_run {
        dry_run(config).await
    } else {
        println!("Running: {}", config.product_url);
        runner::live_run(&config, interrupted()).await
    };

    print_report(&report);
    if let Some(path) = &args.report {
        report.save(path)?;
        println!("  Report: {}", path.display());
    }
    Ok(report.is_success())
}

async fn dry_run(mut config: RunConfig) -> RunReport {
    let quote = match &config.delivery {
        Some(target) => format!("Delivers {}", target),
        None => "Delivers today".to_string(),
    };
    config.timing.time_scale *= DRY_RUN_SCALE;

    println!("Dry run: {}", config.product_url);
    let doc = ScriptedDocument::checkout(&quote);
    let mut sequencer = match Sequencer::new(&doc, &config) {
        Ok(sequencer) => sequencer,
        Err(e) => {
            let mut report = RunReport::new(config.product_url.clone());
            report.fail(&e, Default::default());
            return report;
        }
    };

    if let Err(e) = sequencer.run().await {
        tracing::error!(kind = e.kind(), stage = %doc.stage_name(), "{}", e);
    }
    sequencer.into_report()
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_report(report: &RunReport) {
    println!();
    match &report.outcome {
        Outcome::Completed => println!("✓ Completed"),
        Outcome::Failed { kind, message } => {
            println!("✗ Failed ({})", kind);
            println!("  Error: {}", message);
        }
        Outcome::Cancelled => println!("✗ Cancelled"),
        Outcome::Incomplete => println!("✗ Incomplete"),
    }
    println!("  Steps: {}/{}", report.steps.len(), Step::ALL.len());
    if let Some(last) = report.steps.last() {
        println!("  Last step: {}", last.step);
    }
    println!("  Duration: {}ms", report.elapsed_ms);
    if let Some(path) = &report.screenshot {
        println!("  Screenshot: {}", path.display());
    }
}

fn check(path: Option<&Path>) -> orderbot::Result<()> {
    let config = load_config(path)?;
    config.validate()?;

    let p = &config.profile;
    println!("Config valid");
    println!("  Product: {}", config.product_url);
    println!("  Ship to: {} {}, {} {}", p.first_name, p.last_name, p.street_address, p.postal_code);
    println!("  Contact: {} / {}", p.email, p.phone);
    println!("  Card: {} exp {}", mask_card(&p.card_number), p.expiration);
    match &config.delivery {
        Some(target) => println!("  Delivery: {}", target),
        None => println!("  Delivery: any date"),
    }
    println!(
        "  Browser: {}, {}x{}",
        if config.browser.headless { "headless" } else { "headed" },
        config.browser.viewport_width,
        config.browser.viewport_height
    );
    let t = &config.timing;
    println!(
        "  Timing: tick {}ms, idle limit {}, poll budget {}, scale {}",
        t.dispatch_interval_ms, t.max_idle_ticks, t.max_poll_attempts, t.time_scale
    );
    Ok(())
}

fn print_steps() {
    println!("{:<4} {:<20} {:<10} TARGET", "#", "STEP", "ENTRY");
    for step in Step::ALL {
        let priority = step
            .priority()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".into());
        let entry = if step.is_chained() { "chained" } else { "dispatched" };
        println!("{:<4} {:<20} {:<10} {}", priority, step.name(), entry, step.target());
    }
    println!("{:<4} {:<20} {:<10} {}", "-", "close-popup", "idle", POPUP_CLOSE);
}
