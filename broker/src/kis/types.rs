//! KIS wire types and the domain snapshots built from them.
//!
//! KIS encodes every number as a string; the raw serde structs keep the
//! strings and the conversion helpers parse them, logging a warning when a
//! price field that should be present parses to zero.

use log::warn;
use serde::Deserialize;

/// Common response envelope: `rt_cd == "0"` means success.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub rt_cd: String,
    #[serde(default)]
    pub msg_cd: String,
    #[serde(default)]
    pub msg1: String,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.rt_cd == "0"
    }
}

/// `POST /oauth2/tokenP` response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds of validity. KIS usually sends 86400 (24h); default to that
    /// when absent.
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    86_400
}

/// One holding row from `inquire-balance` output1.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceRow {
    /// Instrument code (6-digit).
    pub pdno: String,
    /// Instrument name.
    pub prdt_name: String,
    /// Held quantity.
    pub hldg_qty: String,
    /// Current price.
    pub prpr: String,
    /// Purchase average price.
    pub pchs_avg_pric: String,
    /// Evaluated amount (market value).
    pub evlu_amt: String,
    /// Return rate, percent.
    #[serde(default)]
    pub evlu_pfls_rt: String,
}

/// Summary row from `inquire-balance` output2.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceSummaryRow {
    /// Total evaluated amount (total asset).
    pub tot_evlu_amt: String,
    /// Deposit (cash).
    #[serde(default)]
    pub dnca_tot_amt: String,
    /// Purchase amount total.
    #[serde(default)]
    pub pchs_amt_smtl_amt: String,
    /// Evaluation amount total.
    #[serde(default)]
    pub evlu_amt_smtl_amt: String,
    /// Profit/loss total.
    #[serde(default)]
    pub evlu_pfls_smtl_amt: String,
}

/// `inquire-balance` response.
#[derive(Debug, Deserialize)]
pub struct BalanceResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub output1: Vec<BalanceRow>,
    #[serde(default)]
    pub output2: Vec<BalanceSummaryRow>,
}

/// `inquire-asking-price-exp-ccn` output1: three-tier bid/ask ladders and
/// the last traded price.
#[derive(Debug, Clone, Deserialize)]
pub struct AskingPriceRow {
    #[serde(default)]
    pub bidp1: String,
    #[serde(default)]
    pub bidp2: String,
    #[serde(default)]
    pub bidp3: String,
    #[serde(default)]
    pub askp1: String,
    #[serde(default)]
    pub askp2: String,
    #[serde(default)]
    pub askp3: String,
    /// Expected/last traded price.
    #[serde(default)]
    pub stck_prpr: String,
}

/// `inquire-asking-price-exp-ccn` response.
#[derive(Debug, Deserialize)]
pub struct AskingPriceResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub output1: Option<AskingPriceRow>,
}

/// `inquire-psbl-order` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuyableRow {
    /// Cash-only buyable amount.
    #[serde(default)]
    pub ord_psbl_cash: String,
    /// Margin-inclusive buyable amount, used as a fallback when the
    /// cash-only field is absent.
    #[serde(default)]
    pub nrcvb_buy_amt: String,
}

/// `inquire-psbl-order` response.
#[derive(Debug, Deserialize)]
pub struct BuyableResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub output: Option<BuyableRow>,
}

/// `order-cash` / `order-rvsecncl` output.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRow {
    /// Order number assigned by the brokerage.
    #[serde(default, alias = "ODNO")]
    pub odno: String,
    /// Branch number of the processing office, needed to cancel.
    #[serde(default, alias = "KRX_FWDG_ORD_ORGNO")]
    pub krx_fwdg_ord_orgno: String,
}

/// `order-cash` response.
#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub output: Option<OrderRow>,
}

/// One unexecuted-order row. The three open-order endpoints use slightly
/// different field names; aliases cover the daily-history variants.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrderRow {
    #[serde(default)]
    pub pdno: String,
    #[serde(default)]
    pub prdt_name: String,
    #[serde(default)]
    pub odno: String,
    /// Sell/buy division name ("매수"/"매도" or localized equivalent).
    #[serde(default)]
    pub sll_buy_dvsn_cd_name: String,
    /// Total ordered quantity.
    #[serde(default)]
    pub ord_qty: String,
    /// Remaining (unexecuted) quantity.
    #[serde(default, alias = "rmn_qty")]
    pub psbl_qty: String,
    /// Order price.
    #[serde(default)]
    pub ord_unpr: String,
    /// Order time (HHMMSS).
    #[serde(default)]
    pub ord_tmd: String,
    #[serde(default, alias = "ord_gno_brno")]
    pub krx_fwdg_ord_orgno: String,
}

/// Response shape shared by all three open-order endpoints.
#[derive(Debug, Deserialize)]
pub struct OpenOrdersResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default, alias = "output1")]
    pub output: Vec<OpenOrderRow>,
}

// === Domain snapshots ===

/// An immutable holding snapshot from one balance inquiry.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub code: String,
    pub name: String,
    pub quantity: u32,
    pub current_price: i64,
    pub average_price: i64,
    pub market_value: i64,
}

/// Account-level totals from one balance inquiry.
#[derive(Debug, Clone, Default)]
pub struct AccountSummary {
    pub total_asset: i64,
    pub deposit: i64,
    pub purchase_total: i64,
    pub eval_total: i64,
    pub profit_loss: i64,
}

/// Best three bid/ask levels plus last price for one instrument.
/// A zero ladder entry means depth is unavailable at that tier; no tranche
/// is routed there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteSnapshot {
    pub code: String,
    pub best_bid: i64,
    pub best_ask: i64,
    pub last_price: i64,
    pub bid_ladder: [i64; 3],
    pub ask_ladder: [i64; 3],
}

/// An unexecuted order as reported by the brokerage.
#[derive(Debug, Clone)]
pub struct OpenOrder {
    pub order_no: String,
    pub branch_no: String,
    pub code: String,
    pub name: String,
    pub side_name: String,
    pub order_qty: u32,
    pub remaining_qty: u32,
    pub price: i64,
    pub time: String,
}

/// Outcome of one order submission. A rejection is data, not an error:
/// the batch continues.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub accepted: bool,
    pub code: String,
    pub message: String,
    pub order_no: Option<String>,
}

// === Conversions ===

/// Parse a KIS string-number into i64, truncating any decimal part.
/// Missing/empty fields become 0.
pub(crate) fn parse_amount(s: &str) -> i64 {
    if s.is_empty() {
        return 0;
    }
    s.parse::<i64>()
        .or_else(|_| s.parse::<f64>().map(|f| f as i64))
        .unwrap_or(0)
}

pub(crate) fn parse_qty(s: &str) -> u32 {
    parse_amount(s).max(0) as u32
}

impl BalanceRow {
    pub fn to_holding(&self) -> Holding {
        Holding {
            code: self.pdno.clone(),
            name: self.prdt_name.clone(),
            quantity: parse_qty(&self.hldg_qty),
            current_price: parse_amount(&self.prpr),
            average_price: parse_amount(&self.pchs_avg_pric),
            market_value: parse_amount(&self.evlu_amt),
        }
    }
}

impl BalanceSummaryRow {
    pub fn to_summary(&self) -> AccountSummary {
        AccountSummary {
            total_asset: parse_amount(&self.tot_evlu_amt),
            deposit: parse_amount(&self.dnca_tot_amt),
            purchase_total: parse_amount(&self.pchs_amt_smtl_amt),
            eval_total: parse_amount(&self.evlu_amt_smtl_amt),
            profit_loss: parse_amount(&self.evlu_pfls_smtl_amt),
        }
    }
}

impl AskingPriceRow {
    pub fn to_snapshot(&self, code: &str) -> QuoteSnapshot {
        let snapshot = QuoteSnapshot {
            code: code.to_string(),
            best_bid: parse_amount(&self.bidp1),
            best_ask: parse_amount(&self.askp1),
            last_price: parse_amount(&self.stck_prpr),
            bid_ladder: [
                parse_amount(&self.bidp1),
                parse_amount(&self.bidp2),
                parse_amount(&self.bidp3),
            ],
            ask_ladder: [
                parse_amount(&self.askp1),
                parse_amount(&self.askp2),
                parse_amount(&self.askp3),
            ],
        };
        if snapshot.best_bid == 0 && snapshot.last_price == 0 {
            warn!("quote for {code} has no usable price; orders will be skipped");
        }
        snapshot
    }
}

impl OpenOrderRow {
    pub fn to_open_order(&self) -> OpenOrder {
        OpenOrder {
            order_no: self.odno.clone(),
            branch_no: self.krx_fwdg_ord_orgno.clone(),
            code: self.pdno.clone(),
            name: self.prdt_name.clone(),
            side_name: self.sll_buy_dvsn_cd_name.clone(),
            order_qty: parse_qty(&self.ord_qty),
            remaining_qty: parse_qty(&self.psbl_qty),
            price: parse_amount(&self.ord_unpr),
            time: self.ord_tmd.clone(),
        }
    }

    /// Daily-history rows include executed orders; only rows with quantity
    /// remaining are open.
    pub fn is_unexecuted(&self) -> bool {
        parse_qty(&self.psbl_qty) > 0
    }
}
