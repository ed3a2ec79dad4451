//! CLI entry point for the KIS rebalancer.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use kis_rebalancer::config::Config;
use kis_rebalancer::error::Error;
use kis_rebalancer::execution::{ExecMode, ExecOptions};
use kis_rebalancer::run::{self, RunOptions};
use kis_rebalancer::target::PortfolioSpec;

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Rebalance a KIS brokerage account toward target weights")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the plan, confirm, and execute orders
    Run {
        /// Path to portfolio.json
        portfolio: PathBuf,

        /// Tranche strategy: split (3-tier ladder) or market
        #[arg(long, default_value = "split")]
        mode: ExecMode,

        /// Enable buy orders
        #[arg(long)]
        buy: bool,

        /// Enable sell orders
        #[arg(long)]
        sell: bool,

        /// Show plan without executing
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt (for automation/cron)
        #[arg(long)]
        force: bool,
    },

    /// Compute and display the plan only
    Plan {
        /// Path to portfolio.json
        portfolio: PathBuf,
    },

    /// Show account summary and holdings
    Balance,

    /// Show unexecuted orders
    Orders,

    /// Cancel the remaining quantity of every open order
    CancelAll,

    /// Check connectivity and credentials
    Status,
}

fn load_portfolio(path: &PathBuf) -> PortfolioSpec {
    match PortfolioSpec::load(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading portfolio: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Run {
            portfolio,
            mode,
            buy,
            sell,
            dry_run,
            force,
        } => {
            let spec = load_portfolio(&portfolio);
            let opts = RunOptions {
                dry_run,
                force,
                portfolio_file: portfolio.display().to_string(),
                exec: ExecOptions {
                    mode,
                    buy_enabled: buy,
                    sell_enabled: sell,
                    order_interval_ms: config.execution.order_interval_ms,
                },
            };
            run::run(&config, &spec, &opts)
        }
        Command::Plan { portfolio } => {
            let spec = load_portfolio(&portfolio);
            let opts = RunOptions {
                dry_run: true,
                force: false,
                portfolio_file: portfolio.display().to_string(),
                exec: ExecOptions {
                    mode: ExecMode::Split,
                    buy_enabled: false,
                    sell_enabled: false,
                    order_interval_ms: 0,
                },
            };
            run::run(&config, &spec, &opts)
        }
        Command::Balance => run::show_balance(&config),
        Command::Orders => run::show_open_orders(&config),
        Command::CancelAll => run::cancel_all(&config),
        Command::Status => run::check_status(&config),
    };

    if let Err(e) = result {
        match &e {
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}
