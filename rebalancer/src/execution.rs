//! Tiered order execution.
//!
//! Consumes a plan and drives order placement: sells strictly before buys,
//! quantities split into priced tranches, and buy quantities clamped to the
//! brokerage-reported buyable cash. Each submission is independent; a
//! rejection is recorded and the batch continues. The engine performs no
//! console output — it returns an `ExecutionReport` for the caller to
//! render.

use kis_broker::{BrokerError, KisClient, OrderOutcome, OrderSide, QuoteSnapshot};
use log::{info, warn};

use crate::error::Result;
use crate::planner::{Action, PlanItem};

/// Tranche strategy for one execution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Three tranches routed to ladder tiers 1/2/3.
    Split,
    /// One tranche at the last traded price.
    Market,
}

impl std::str::FromStr for ExecMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "split" => Ok(ExecMode::Split),
            "market" => Ok(ExecMode::Market),
            other => Err(format!("unknown execution mode '{other}'")),
        }
    }
}

/// Options for one execution pass.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub mode: ExecMode,
    pub buy_enabled: bool,
    pub sell_enabled: bool,
    /// Delay between consecutive order submissions.
    pub order_interval_ms: u64,
}

/// The broker surface the engine needs. `KisClient` implements it; tests
/// substitute a recording mock.
pub trait BrokerGateway {
    fn fetch_buyable_cash(&mut self) -> std::result::Result<i64, BrokerError>;
    fn place_order(
        &mut self,
        code: &str,
        qty: u32,
        price: i64,
        side: OrderSide,
    ) -> std::result::Result<OrderOutcome, BrokerError>;
}

impl BrokerGateway for KisClient {
    fn fetch_buyable_cash(&mut self) -> std::result::Result<i64, BrokerError> {
        KisClient::fetch_buyable_cash(self)
    }

    fn place_order(
        &mut self,
        code: &str,
        qty: u32,
        price: i64,
        side: OrderSide,
    ) -> std::result::Result<OrderOutcome, BrokerError> {
        KisClient::place_order(self, code, qty, price, side)
    }
}

/// Terminal state of one submitted (or attempted) tranche.
#[derive(Debug, Clone)]
pub enum OrderStatus {
    Accepted { order_no: Option<String> },
    Rejected { code: String, message: String },
    Failed { error: String },
}

/// One tranche's submission record.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub code: String,
    pub name: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub price: i64,
    /// Ladder tier the tranche was routed to (1-based; 0 = market-mode
    /// single tranche).
    pub tier: u8,
    pub status: OrderStatus,
}

/// Outcome of one execution pass.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub orders: Vec<OrderRecord>,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Tranches dropped before submission (zero price/quantity, or clamped
    /// to zero by the cash check).
    pub skipped: usize,
}

impl ExecutionReport {
    pub fn submitted(&self) -> usize {
        self.accepted + self.rejected + self.failed
    }
}

/// Split a quantity into three tranches. The third absorbs the rounding
/// remainder so the tranches always sum to the input.
pub fn split_quantity(qty: u32) -> (u32, u32, u32) {
    let q1 = (0.33 * qty as f64).floor() as u32;
    let q2 = q1;
    let q3 = qty - q1 - q2;
    (q1, q2, q3)
}

/// Price used for cash-affordability checks: last traded price, else best
/// bid, floored to 1 so a missing quote can never divide by zero.
pub fn cash_check_price(quote: &QuoteSnapshot) -> i64 {
    let price = if quote.last_price > 0 {
        quote.last_price
    } else {
        quote.best_bid
    };
    price.max(1)
}

/// (quantity, price, tier) tranches for one plan item under `mode`.
///
/// Tranches with zero price or zero quantity are omitted entirely: they are
/// not submitted and not counted as failures.
fn tranches(item: &PlanItem, side: OrderSide, mode: ExecMode) -> Vec<(u32, i64, u8)> {
    match mode {
        ExecMode::Market => {
            let price = match side {
                OrderSide::Sell => {
                    if item.quote.last_price > 0 {
                        item.quote.last_price
                    } else {
                        item.quote.best_ask
                    }
                }
                OrderSide::Buy => {
                    if item.quote.last_price > 0 {
                        item.quote.last_price
                    } else {
                        item.quote.best_bid
                    }
                }
            };
            // Planner-supplied reference covers quotes with no ladder at all
            // (forced liquidations priced from the balance row).
            let price = if price > 0 { price } else { item.reference_price };
            if price > 0 && item.quantity > 0 {
                vec![(item.quantity, price, 0)]
            } else {
                vec![]
            }
        }
        ExecMode::Split => {
            let ladder = match side {
                OrderSide::Buy => &item.quote.bid_ladder,
                OrderSide::Sell => &item.quote.ask_ladder,
            };
            let (q1, q2, q3) = split_quantity(item.quantity);
            [(q1, 1u8), (q2, 2u8), (q3, 3u8)]
                .into_iter()
                .filter_map(|(qty, tier)| {
                    let price = ladder[(tier - 1) as usize];
                    (qty > 0 && price > 0).then_some((qty, price, tier))
                })
                .collect()
        }
    }
}

/// Execute a plan.
///
/// Sells run first to free cash; if any sell tranche was submitted the
/// buyable-cash figure naturally reflects it when queried at the start of
/// the buy phase (same-day settlement is assumed, a documented limitation).
/// Only authentication failures abort the pass; per-order errors are
/// recorded and the batch continues.
pub fn execute(
    gateway: &mut dyn BrokerGateway,
    plan: &[PlanItem],
    opts: &ExecOptions,
) -> Result<ExecutionReport> {
    let mut report = ExecutionReport::default();

    if opts.sell_enabled {
        for item in plan
            .iter()
            .filter(|i| i.action == Action::Sell && i.quantity > 0)
        {
            submit_tranches(gateway, item, OrderSide::Sell, opts, None, &mut report)?;
        }
    }

    if opts.buy_enabled {
        let buy_items: Vec<&PlanItem> = plan
            .iter()
            .filter(|i| i.action == Action::Buy && i.quantity > 0)
            .collect();

        if !buy_items.is_empty() {
            // Re-queried after the sell phase so freed cash is visible.
            let mut remaining_cash = gateway.fetch_buyable_cash()?;
            info!("buyable cash: {remaining_cash}");

            for item in buy_items {
                let check_price = cash_check_price(&item.quote);
                let max_affordable = (remaining_cash / check_price).max(0) as u32;
                let quantity = item.quantity.min(max_affordable);

                if quantity == 0 {
                    warn!(
                        "skipping buy of {}: planned {} but only {} affordable",
                        item.code, item.quantity, max_affordable
                    );
                    report.skipped += 1;
                    continue;
                }
                if quantity < item.quantity {
                    warn!(
                        "clamping buy of {} from {} to {} for cash {}",
                        item.code, item.quantity, quantity, remaining_cash
                    );
                }

                // Optimistic decrement: the clamp sizes with the aggregate
                // check price even in split mode, which biases conservative.
                remaining_cash -= quantity as i64 * check_price;

                submit_tranches(
                    gateway,
                    item,
                    OrderSide::Buy,
                    opts,
                    Some(quantity),
                    &mut report,
                )?;
            }
        }
    }

    Ok(report)
}

/// Submit all tranches for one item. `quantity_override` carries the
/// cash-clamped quantity for buys.
fn submit_tranches(
    gateway: &mut dyn BrokerGateway,
    item: &PlanItem,
    side: OrderSide,
    opts: &ExecOptions,
    quantity_override: Option<u32>,
    report: &mut ExecutionReport,
) -> Result<()> {
    let sized: PlanItem = match quantity_override {
        Some(quantity) => PlanItem {
            quantity,
            ..item.clone()
        },
        None => item.clone(),
    };

    let planned = tranches(&sized, side, opts.mode);
    if planned.is_empty() {
        warn!("no routable tranche for {} {} — skipping", side, item.code);
        report.skipped += 1;
        return Ok(());
    }

    for (qty, price, tier) in planned {
        if report.submitted() > 0 && opts.order_interval_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(opts.order_interval_ms));
        }

        let status = match gateway.place_order(&item.code, qty, price, side) {
            Ok(outcome) if outcome.accepted => {
                info!("{side} {qty} {} @ {price} accepted", item.code);
                report.accepted += 1;
                OrderStatus::Accepted {
                    order_no: outcome.order_no,
                }
            }
            Ok(outcome) => {
                warn!(
                    "{side} {qty} {} @ {price} rejected [{}]: {}",
                    item.code, outcome.code, outcome.message
                );
                report.rejected += 1;
                OrderStatus::Rejected {
                    code: outcome.code,
                    message: outcome.message,
                }
            }
            // Auth failure is fatal for the whole pass; anything else is
            // one order's problem.
            Err(e @ BrokerError::Auth(_)) => return Err(e.into()),
            Err(e) => {
                warn!("{side} {qty} {} @ {price} failed: {e}", item.code);
                report.failed += 1;
                OrderStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        report.orders.push(OrderRecord {
            code: item.code.clone(),
            name: item.name.clone(),
            side,
            quantity: qty,
            price,
            tier,
            status,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_20_is_6_6_8() {
        assert_eq!(split_quantity(20), (6, 6, 8));
    }

    #[test]
    fn split_sums_to_input() {
        for qty in 0..500 {
            let (q1, q2, q3) = split_quantity(qty);
            assert_eq!(q1 + q2 + q3, qty, "qty {qty}");
        }
    }

    #[test]
    fn split_small_quantities() {
        assert_eq!(split_quantity(0), (0, 0, 0));
        assert_eq!(split_quantity(1), (0, 0, 1));
        assert_eq!(split_quantity(2), (0, 0, 2));
        assert_eq!(split_quantity(3), (0, 0, 3));
        assert_eq!(split_quantity(4), (1, 1, 2));
    }

    #[test]
    fn check_price_prefers_last() {
        let quote = QuoteSnapshot {
            last_price: 10_000,
            best_bid: 9_900,
            ..QuoteSnapshot::default()
        };
        assert_eq!(cash_check_price(&quote), 10_000);
    }

    #[test]
    fn check_price_falls_back_to_bid() {
        let quote = QuoteSnapshot {
            best_bid: 9_900,
            ..QuoteSnapshot::default()
        };
        assert_eq!(cash_check_price(&quote), 9_900);
    }

    #[test]
    fn check_price_never_zero() {
        assert_eq!(cash_check_price(&QuoteSnapshot::default()), 1);
    }
}
