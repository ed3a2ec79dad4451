//! CURRENT→TARGET rebalance planner.
//!
//! Pure computation: holdings, quotes, and the total asset value come in,
//! a list of `PlanItem`s comes out. No I/O happens here; the orchestrator
//! fetches quotes for the union of held and target codes and passes them in.

use kis_broker::{Holding, QuoteSnapshot};
use log::warn;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::target::TargetAllocation;

/// Trade direction for one plan item. Deterministic in the sign of `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// One instrument's rebalance decision. Created fresh per planning run,
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PlanItem {
    pub code: String,
    pub name: String,
    pub target_weight: f64,
    /// `total_asset * weight`, exact (no rounding before quantity sizing).
    pub target_amount: f64,
    pub current_amount: f64,
    pub delta: f64,
    pub action: Action,
    /// Always a non-negative whole number of shares.
    pub quantity: u32,
    /// Price the quantity was sized from (best bid for buys, last/ask for
    /// sells). Zero when no usable price existed; such items are skipped at
    /// execution.
    pub reference_price: i64,
    pub quote: QuoteSnapshot,
}

/// Reference price for sizing a buy: best bid, else last traded price.
fn buy_reference(quote: &QuoteSnapshot) -> i64 {
    if quote.best_bid > 0 {
        quote.best_bid
    } else {
        quote.last_price
    }
}

/// Reference price for sizing a sell: last traded price, else best ask.
fn sell_reference(quote: &QuoteSnapshot) -> i64 {
    if quote.last_price > 0 {
        quote.last_price
    } else {
        quote.best_ask
    }
}

fn sized_quantity(amount: f64, reference_price: i64) -> u32 {
    if reference_price <= 0 {
        return 0;
    }
    (amount / reference_price as f64).floor() as u32
}

/// Compute the rebalance plan.
///
/// Each target becomes one item whose action follows the sign of
/// `target_amount - current_amount`. Every held instrument absent from the
/// target set is appended as a forced full-liquidation sell, so repeated
/// runs converge the account to exactly the target code set.
///
/// No tolerance band is applied: any nonzero delta produces a Buy/Sell,
/// however small.
pub fn plan(
    total_asset: i64,
    holdings: &[Holding],
    targets: &[TargetAllocation],
    quotes: &FxHashMap<String, QuoteSnapshot>,
) -> Vec<PlanItem> {
    let held: FxHashMap<&str, &Holding> =
        holdings.iter().map(|h| (h.code.as_str(), h)).collect();
    let empty_quote = QuoteSnapshot::default();

    let mut items = Vec::with_capacity(targets.len());

    for target in targets {
        let quote = quotes.get(&target.code).unwrap_or(&empty_quote);
        let target_amount = total_asset as f64 * target.weight;
        let current_amount = held
            .get(target.code.as_str())
            .map(|h| h.market_value as f64)
            .unwrap_or(0.0);
        let delta = target_amount - current_amount;

        let (action, reference_price, quantity) = if delta > 0.0 {
            let price = buy_reference(quote);
            if price == 0 {
                warn!("no usable buy price for {}; planning zero quantity", target.code);
            }
            (Action::Buy, price, sized_quantity(delta, price))
        } else if delta < 0.0 {
            let price = sell_reference(quote);
            if price == 0 {
                warn!("no usable sell price for {}; planning zero quantity", target.code);
            }
            (Action::Sell, price, sized_quantity(-delta, price))
        } else {
            (Action::Hold, 0, 0)
        };

        items.push(PlanItem {
            code: target.code.clone(),
            name: target.name.clone(),
            target_weight: target.weight,
            target_amount,
            current_amount,
            delta,
            action,
            quantity,
            reference_price,
            quote: quote.clone(),
        });
    }

    // Orphan holdings: anything held but not targeted is liquidated in full.
    let targeted: FxHashMap<&str, ()> = targets.iter().map(|t| (t.code.as_str(), ())).collect();
    for holding in holdings {
        if targeted.contains_key(holding.code.as_str()) {
            continue;
        }
        let quote = quotes.get(&holding.code).unwrap_or(&empty_quote);
        let mut reference_price = sell_reference(quote);
        if reference_price == 0 {
            // Quote unavailable; the balance row's own price still lets the
            // market-mode tranche go out.
            reference_price = holding.current_price;
        }
        let current_amount = holding.market_value as f64;

        items.push(PlanItem {
            code: holding.code.clone(),
            name: holding.name.clone(),
            target_weight: 0.0,
            target_amount: 0.0,
            current_amount,
            delta: -current_amount,
            action: Action::Sell,
            quantity: holding.quantity,
            reference_price,
            quote: quote.clone(),
        });
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(code: &str, qty: u32, price: i64, market_value: i64) -> Holding {
        Holding {
            code: code.into(),
            name: format!("name-{code}"),
            quantity: qty,
            current_price: price,
            average_price: price,
            market_value,
        }
    }

    fn target(code: &str, weight: f64) -> TargetAllocation {
        TargetAllocation {
            code: code.into(),
            name: format!("name-{code}"),
            weight,
        }
    }

    fn quote(code: &str, bid: i64, ask: i64, last: i64) -> (String, QuoteSnapshot) {
        (
            code.to_string(),
            QuoteSnapshot {
                code: code.into(),
                best_bid: bid,
                best_ask: ask,
                last_price: last,
                bid_ladder: [bid, bid - 100, bid - 200],
                ask_ladder: [ask, ask + 100, ask + 200],
            },
        )
    }

    #[test]
    fn buy_sized_from_best_bid() {
        // 1,000,000 total, 50% target, 300,000 held → delta 200,000;
        // best bid 10,000 → 20 shares.
        let holdings = vec![holding("005930", 30, 10_000, 300_000)];
        let quotes: FxHashMap<_, _> = [quote("005930", 10_000, 10_100, 10_050)].into_iter().collect();

        let items = plan(1_000_000, &holdings, &[target("005930", 0.5)], &quotes);

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.target_amount, 500_000.0);
        assert_eq!(item.current_amount, 300_000.0);
        assert_eq!(item.delta, 200_000.0);
        assert_eq!(item.action, Action::Buy);
        assert_eq!(item.reference_price, 10_000);
        assert_eq!(item.quantity, 20);
    }

    #[test]
    fn target_amount_is_exact_product() {
        let quotes: FxHashMap<_, _> = [quote("005930", 71_000, 71_100, 71_050)].into_iter().collect();
        let items = plan(1_234_567, &[], &[target("005930", 0.3)], &quotes);
        assert_eq!(items[0].target_amount, 1_234_567.0 * 0.3);
    }

    #[test]
    fn sell_sized_from_last_price() {
        // Held 800,000, target 40% of 1,000,000 = 400,000 → sell 400,000
        // at last 20,000 → 20 shares.
        let holdings = vec![holding("035420", 40, 20_000, 800_000)];
        let quotes: FxHashMap<_, _> = [quote("035420", 19_900, 20_100, 20_000)].into_iter().collect();

        let items = plan(1_000_000, &holdings, &[target("035420", 0.4)], &quotes);

        let item = &items[0];
        assert_eq!(item.action, Action::Sell);
        assert_eq!(item.reference_price, 20_000);
        assert_eq!(item.quantity, 20);
    }

    #[test]
    fn action_follows_delta_sign() {
        let holdings = vec![holding("035420", 10, 50_000, 500_000)];
        let quotes: FxHashMap<_, _> = [
            quote("005930", 10_000, 10_100, 10_050),
            quote("035420", 49_900, 50_100, 50_000),
        ]
        .into_iter()
        .collect();

        // 005930: delta > 0 → Buy. 035420: held 500,000 == target 0.5 → Hold.
        let items = plan(
            1_000_000,
            &holdings,
            &[target("005930", 0.3), target("035420", 0.5)],
            &quotes,
        );

        assert_eq!(items[0].action, Action::Buy);
        assert_eq!(items[1].action, Action::Hold);
        assert_eq!(items[1].quantity, 0);
    }

    #[test]
    fn buy_falls_back_to_last_price_when_no_bid() {
        let quotes: FxHashMap<_, _> = [quote("005930", 0, 0, 10_000)].into_iter().collect();
        let items = plan(100_000, &[], &[target("005930", 0.5)], &quotes);
        assert_eq!(items[0].reference_price, 10_000);
        assert_eq!(items[0].quantity, 5);
    }

    #[test]
    fn sell_falls_back_to_best_ask_when_no_last() {
        let holdings = vec![holding("005930", 50, 10_000, 500_000)];
        let quotes: FxHashMap<_, _> = [quote("005930", 9_900, 10_100, 0)].into_iter().collect();
        let items = plan(100_000, &holdings, &[target("005930", 0.5)], &quotes);
        // delta = 50,000 - 500,000 = -450,000; ask 10,100 → 44 shares
        assert_eq!(items[0].action, Action::Sell);
        assert_eq!(items[0].reference_price, 10_100);
        assert_eq!(items[0].quantity, 44);
    }

    #[test]
    fn zero_price_plans_zero_quantity() {
        let quotes: FxHashMap<_, _> = FxHashMap::default();
        let items = plan(1_000_000, &[], &[target("005930", 0.5)], &quotes);
        assert_eq!(items[0].action, Action::Buy);
        assert_eq!(items[0].reference_price, 0);
        assert_eq!(items[0].quantity, 0);
    }

    #[test]
    fn quantity_floors_not_rounds() {
        // delta 199,999 at price 10,000 → 19 shares, never 20.
        let holdings = vec![holding("005930", 30, 10_000, 300_001)];
        let quotes: FxHashMap<_, _> = [quote("005930", 10_000, 10_100, 10_050)].into_iter().collect();
        let items = plan(1_000_000, &holdings, &[target("005930", 0.5)], &quotes);
        assert_eq!(items[0].quantity, 19);
    }

    #[test]
    fn orphan_holding_liquidated_in_full() {
        // Held but not targeted: one forced SELL for the entire quantity.
        let holdings = vec![holding("000660", 10, 10_000, 100_000)];
        let quotes: FxHashMap<_, _> = [
            quote("005930", 10_000, 10_100, 10_050),
            quote("000660", 9_900, 10_100, 10_000),
        ]
        .into_iter()
        .collect();

        let items = plan(1_000_000, &holdings, &[target("005930", 0.5)], &quotes);

        assert_eq!(items.len(), 2);
        let orphan = &items[1];
        assert_eq!(orphan.code, "000660");
        assert_eq!(orphan.action, Action::Sell);
        assert_eq!(orphan.quantity, 10);
        assert_eq!(orphan.target_amount, 0.0);
        assert_eq!(orphan.delta, -100_000.0);
    }

    #[test]
    fn orphan_without_quote_uses_holding_price() {
        let holdings = vec![holding("000660", 10, 12_345, 123_450)];
        let quotes: FxHashMap<_, _> = FxHashMap::default();
        let items = plan(1_000_000, &holdings, &[target("005930", 0.5)], &quotes);
        let orphan = items.iter().find(|i| i.code == "000660").unwrap();
        assert_eq!(orphan.reference_price, 12_345);
        assert_eq!(orphan.quantity, 10);
    }

    #[test]
    fn targeted_holding_is_not_orphaned() {
        let holdings = vec![holding("005930", 10, 10_000, 100_000)];
        let quotes: FxHashMap<_, _> = [quote("005930", 10_000, 10_100, 10_050)].into_iter().collect();
        let items = plan(1_000_000, &holdings, &[target("005930", 0.1)], &quotes);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn tiny_delta_still_produces_order() {
        // No epsilon band: a 1-won surplus is a SELL (quantity may be 0).
        let holdings = vec![holding("005930", 10, 10_000, 100_001)];
        let quotes: FxHashMap<_, _> = [quote("005930", 10_000, 10_100, 10_050)].into_iter().collect();
        let items = plan(1_000_000, &holdings, &[target("005930", 0.1)], &quotes);
        assert_eq!(items[0].action, Action::Sell);
        assert_eq!(items[0].quantity, 0);
    }
}
