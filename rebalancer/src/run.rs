//! Run orchestration: fetch → plan → confirm → execute → report.
//!
//! All console output lives here; the planner and the execution engine only
//! return data.

use std::time::Duration;

use kis_broker::{FileTokenStore, Holding, KisClient, QuoteSnapshot};
use log::info;
use rustc_hash::FxHashMap;

use crate::audit::{self, AuditLog};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::execution::{self, ExecOptions, ExecutionReport, OrderStatus};
use crate::planner::{self, Action, PlanItem};
use crate::target::PortfolioSpec;

/// Options for a rebalance run.
pub struct RunOptions {
    pub dry_run: bool,
    pub force: bool,
    pub portfolio_file: String,
    pub exec: ExecOptions,
}

/// Build an authenticated client from config.
fn connect(config: &Config) -> Result<KisClient> {
    let store = FileTokenStore::new(&config.logging.token_cache_dir);
    let mut client = KisClient::new(
        config.broker_credentials(),
        Box::new(store),
        Duration::from_secs(config.connection.timeout_secs),
    )?;
    client.authenticate(false)?;
    Ok(client)
}

/// Fetch quotes for the union of held and targeted codes, preserving the
/// target ordering first.
fn fetch_quotes(
    client: &mut KisClient,
    holdings: &[Holding],
    spec: &PortfolioSpec,
) -> Result<FxHashMap<String, QuoteSnapshot>> {
    let mut codes: Vec<&str> = spec.codes();
    for h in holdings {
        if !codes.contains(&h.code.as_str()) {
            codes.push(&h.code);
        }
    }

    let mut quotes = FxHashMap::default();
    for code in codes {
        let quote = client.fetch_quote(code)?;
        quotes.insert(code.to_string(), quote);
    }
    Ok(quotes)
}

/// Execute a full rebalance run.
pub fn run(config: &Config, spec: &PortfolioSpec, opts: &RunOptions) -> Result<()> {
    let mut client = connect(config)?;

    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(&mut audit, &opts.portfolio_file, client.account_number())?;

    let (summary, holdings, total_asset) = client.fetch_balance()?;
    audit::log_balance(&mut audit, total_asset, &holdings)?;
    display_summary(client.account_number(), &summary);
    display_holdings(&holdings, total_asset);

    let quotes = fetch_quotes(&mut client, &holdings, spec)?;
    let items = planner::plan(total_asset, &holdings, &spec.portfolio, &quotes);
    audit::log_plan(&mut audit, &items)?;
    display_plan(&items);

    let actionable = items
        .iter()
        .any(|i| i.action != Action::Hold && i.quantity > 0);
    if !actionable {
        println!("\nNo rebalancing needed — portfolio matches target.");
        audit.log_simple("no_rebalance_needed")?;
        return Ok(());
    }

    if opts.dry_run {
        println!("\n[DRY RUN] No orders submitted.");
        return Ok(());
    }

    if !opts.exec.buy_enabled && !opts.exec.sell_enabled {
        return Err(Error::Aborted(
            "neither buys nor sells are enabled; pass --buy and/or --sell".into(),
        ));
    }

    if !opts.force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Execute?")
            .default(false)
            .interact()
            .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;

        if !confirmed {
            println!("Aborted.");
            audit.log("user_confirmed", serde_json::json!({"approved": false}))?;
            return Ok(());
        }
        audit.log("user_confirmed", serde_json::json!({"approved": true}))?;
    }

    info!(
        "executing plan: mode={:?} buy={} sell={}",
        opts.exec.mode, opts.exec.buy_enabled, opts.exec.sell_enabled
    );
    let report = execution::execute(&mut client, &items, &opts.exec)?;
    audit::log_execution(&mut audit, &report)?;
    display_report(&report);

    Ok(())
}

/// Show the account summary and holdings.
pub fn show_balance(config: &Config) -> Result<()> {
    let mut client = connect(config)?;
    let (summary, holdings, total_asset) = client.fetch_balance()?;
    display_summary(client.account_number(), &summary);
    display_holdings(&holdings, total_asset);
    Ok(())
}

/// Show unexecuted orders.
pub fn show_open_orders(config: &Config) -> Result<()> {
    let mut client = connect(config)?;
    let orders = client.fetch_open_orders()?;

    if orders.is_empty() {
        println!("No open orders.");
        return Ok(());
    }

    println!(
        "  {:10} {:20} {:>5} {:>6}/{:<6} {:>10}  {}",
        "Order", "Name", "Side", "Rem", "Qty", "Price", "Time"
    );
    for o in &orders {
        println!(
            "  {:10} {:20} {:>5} {:>6}/{:<6} {:>10}  {}",
            o.order_no, o.name, o.side_name, o.remaining_qty, o.order_qty, o.price, o.time
        );
    }
    Ok(())
}

/// Cancel the remaining quantity of every open order.
pub fn cancel_all(config: &Config) -> Result<()> {
    let mut client = connect(config)?;
    let orders = client.fetch_open_orders()?;

    if orders.is_empty() {
        println!("No open orders to cancel.");
        return Ok(());
    }

    for o in &orders {
        let outcome = client.cancel_order(&o.branch_no, &o.order_no)?;
        if outcome.accepted {
            println!("cancelled {} ({} {})", o.order_no, o.name, o.remaining_qty);
        } else {
            println!(
                "cancel of {} rejected [{}]: {}",
                o.order_no, outcome.code, outcome.message
            );
        }
    }
    Ok(())
}

/// Check connectivity and token validity.
pub fn check_status(config: &Config) -> Result<()> {
    print!("Connecting to {} ... ", config.credentials.base_url);
    let mut client = connect(config)?;
    println!("OK");

    let (summary, _, _) = client.fetch_balance()?;
    println!(
        "Account {}: {} KRW total asset",
        client.account_number(),
        summary.total_asset
    );
    Ok(())
}

// === Display helpers ===

fn display_summary(account: &str, summary: &kis_broker::AccountSummary) {
    let rate = if summary.purchase_total > 0 {
        summary.profit_loss as f64 / summary.purchase_total as f64 * 100.0
    } else {
        0.0
    };
    println!("Account {account}");
    println!(
        "  Total {} KRW | Deposit {} KRW | Purchased {} KRW | P/L {} KRW ({rate:.2}%)",
        summary.total_asset, summary.deposit, summary.purchase_total, summary.profit_loss,
    );
}

fn display_holdings(holdings: &[Holding], total_asset: i64) {
    if holdings.is_empty() {
        println!("No holdings.");
        return;
    }

    println!("\nCURRENT HOLDINGS:");
    println!(
        "  {:8} {:20} {:>6} {:>10} {:>10} {:>12} {:>8}",
        "Code", "Name", "Qty", "Avg", "Price", "Value", "Portion"
    );
    for h in holdings {
        let portion = if total_asset > 0 {
            h.market_value as f64 / total_asset as f64 * 100.0
        } else {
            0.0
        };
        println!(
            "  {:8} {:20} {:>6} {:>10} {:>10} {:>12} {:>7.2}%",
            h.code, h.name, h.quantity, h.average_price, h.current_price, h.market_value, portion,
        );
    }
}

fn display_plan(items: &[PlanItem]) {
    println!("\nREBALANCE PLAN:");
    println!(
        "  {:8} {:20} {:>8} {:>12} {:>12} {:>12} {:6} {:>6} {:>10}",
        "Code", "Name", "Target%", "Target", "Current", "Diff", "Action", "Qty", "Ref"
    );
    for i in items {
        println!(
            "  {:8} {:20} {:>7.1}% {:>12.0} {:>12.0} {:>+12.0} {:6} {:>6} {:>10}",
            i.code,
            i.name,
            i.target_weight * 100.0,
            i.target_amount,
            i.current_amount,
            i.delta,
            format!("{}", i.action),
            i.quantity,
            i.reference_price,
        );
    }
}

fn display_report(report: &ExecutionReport) {
    println!("\nORDERS:");
    for r in &report.orders {
        let status = match &r.status {
            OrderStatus::Accepted { order_no } => format!(
                "accepted ({})",
                order_no.as_deref().unwrap_or("no order id")
            ),
            OrderStatus::Rejected { code, message } => format!("rejected [{code}]: {message}"),
            OrderStatus::Failed { error } => format!("failed: {error}"),
        };
        let tier = if r.tier > 0 {
            format!("tier {}", r.tier)
        } else {
            "market".to_string()
        };
        println!(
            "  {} {:>6} {} @ {:>10} ({tier}) ... {status}",
            r.side, r.quantity, r.code, r.price
        );
    }
    println!(
        "\n{} submitted, {} accepted, {} rejected, {} failed, {} skipped.",
        report.submitted(),
        report.accepted,
        report.rejected,
        report.failed,
        report.skipped,
    );
}
