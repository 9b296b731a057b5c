//! tickwork - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tickwork::demo::{run_scenario, Scenario};
use tickwork::util::config::{load_config, TickworkConfig};
use tickwork::util::logger::{self, LogLevel};
use tickwork::{NAME, VERSION};

/// Cooperative, tick-driven task scheduler
#[derive(Parser, Debug)]
#[command(name = "tickwork")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.config/tickwork/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a built-in scenario on a simulated host
    Demo {
        /// Scenario to run
        #[arg(value_enum, default_value_t = DemoScenario::Timed)]
        scenario: DemoScenario,

        /// Seconds per simulated frame
        #[arg(long, value_name = "SECONDS")]
        dt: Option<f64>,

        /// Frame budget
        #[arg(long, value_name = "N")]
        frames: Option<u64>,
    },

    /// Print the effective configuration
    Config,

    /// Print version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DemoScenario {
    Timed,
    Nested,
    Owned,
    Fault,
    All,
}

impl DemoScenario {
    fn scenarios(self) -> Vec<Scenario> {
        match self {
            DemoScenario::Timed => vec![Scenario::Timed],
            DemoScenario::Nested => vec![Scenario::Nested],
            DemoScenario::Owned => vec![Scenario::Owned],
            DemoScenario::Fault => vec![Scenario::Fault],
            DemoScenario::All => Scenario::ALL.to_vec(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.log.level.or_env()
    };
    logger::init_with_level(level);

    match args.command {
        Commands::Demo {
            scenario,
            dt,
            frames,
        } => {
            if let Some(dt) = dt {
                config.host.frame_dt = dt;
            }
            if let Some(frames) = frames {
                config.host.max_frames = frames;
            }
            for scenario in scenario.scenarios() {
                demo(scenario, &config)?;
            }
        }
        Commands::Config => {
            let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{}", text);
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}

fn demo(
    scenario: Scenario,
    config: &TickworkConfig,
) -> Result<()> {
    println!("{} {}", "==>".bold(), scenario.bold());
    let summary = run_scenario(scenario, config)
        .with_context(|| format!("Scenario '{}' did not settle", scenario))?;

    for event in &summary.events {
        println!("    {}", event);
    }
    for fault in &summary.faults {
        println!("    {} {}", "fault:".red(), fault);
    }
    println!(
        "    {} frames, {:.2}s simulated: {} finished, {} cancelled, {} orphaned, {} failed",
        summary.frames,
        summary.elapsed,
        summary.finished.green(),
        summary.cancelled,
        summary.orphaned.yellow(),
        summary.failed.red()
    );
    Ok(())
}
