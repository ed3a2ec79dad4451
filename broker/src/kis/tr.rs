//! KIS transaction identifiers (TR ids).
//!
//! Every KIS call carries a `tr_id` header selecting the operation variant.
//! The ids differ by venue (live vs paper) and, for orders, by account
//! class (standard cash account vs retirement/pension account). This table
//! is configuration data and must match the vendor exactly.

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Live trading vs the paper-trading (VTS) venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    Live,
    Paper,
}

/// Account class selecting the order TR-id pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountClass {
    Standard,
    Pension,
}

/// `msg_cd` KIS returns when an endpoint is not serviced for the account's
/// class (observed on pension accounts). Triggers the fallback chain.
pub const MSG_CD_ACCOUNT_TYPE_MISMATCH: &str = "OPSQ0002";

/// `msg_cd` KIS returns when the bearer token has expired mid-session.
pub const MSG_CD_TOKEN_EXPIRED: &str = "EGW00123";

/// TR id for a cash order, by (side, venue, account class).
///
/// Pension order ids exist only on the live venue; the paper venue has no
/// pension account simulation, so pension falls back to the paper standard
/// pair there.
pub fn order_tr_id(side: OrderSide, venue: Venue, class: AccountClass) -> &'static str {
    match (side, venue, class) {
        (OrderSide::Buy, Venue::Live, AccountClass::Standard) => "TTTC0802U",
        (OrderSide::Sell, Venue::Live, AccountClass::Standard) => "TTTC0801U",
        (OrderSide::Buy, Venue::Paper, _) => "VTTC0802U",
        (OrderSide::Sell, Venue::Paper, _) => "VTTC0801U",
        (OrderSide::Buy, Venue::Live, AccountClass::Pension) => "TTTC0602U",
        (OrderSide::Sell, Venue::Live, AccountClass::Pension) => "TTTC0601U",
    }
}

/// TR id for the balance inquiry (`inquire-balance`).
pub fn balance_tr_id(venue: Venue) -> &'static str {
    match venue {
        Venue::Live => "TTTC8434R",
        Venue::Paper => "VTTC8434R",
    }
}

/// TR id for the buyable-amount inquiry (`inquire-psbl-order`).
pub fn buyable_tr_id(venue: Venue) -> &'static str {
    match venue {
        Venue::Live => "TTTC8908R",
        Venue::Paper => "VTTC8908R",
    }
}

/// TR id for the revocable-orders inquiry (`inquire-psbl-rvsecncl`).
pub fn revocable_tr_id(venue: Venue) -> &'static str {
    match venue {
        Venue::Live => "TTTC8436R",
        Venue::Paper => "VTTC8436R",
    }
}

/// TR id for the daily execution history (`inquire-daily-ccld`).
pub fn daily_history_tr_id(venue: Venue) -> &'static str {
    match venue {
        Venue::Live => "TTTC8001R",
        Venue::Paper => "VTTC8001R",
    }
}

/// TR id for the pension daily execution history
/// (`pension/inquire-daily-ccld`).
pub fn pension_daily_tr_id(venue: Venue) -> &'static str {
    match venue {
        Venue::Live => "TTTC2201R",
        Venue::Paper => "VTTC2201R",
    }
}

/// TR id for order cancel/revise (`order-rvsecncl`).
pub fn cancel_tr_id(venue: Venue) -> &'static str {
    match venue {
        Venue::Live => "TTTC0803U",
        Venue::Paper => "VTTC0803U",
    }
}

/// TR id for the asking-price quotation. Venue-independent.
pub const ASKING_PRICE_TR_ID: &str = "FHKST01010200";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_order_ids() {
        assert_eq!(
            order_tr_id(OrderSide::Buy, Venue::Live, AccountClass::Standard),
            "TTTC0802U"
        );
        assert_eq!(
            order_tr_id(OrderSide::Sell, Venue::Live, AccountClass::Standard),
            "TTTC0801U"
        );
        assert_eq!(
            order_tr_id(OrderSide::Buy, Venue::Paper, AccountClass::Standard),
            "VTTC0802U"
        );
        assert_eq!(
            order_tr_id(OrderSide::Sell, Venue::Paper, AccountClass::Standard),
            "VTTC0801U"
        );
    }

    #[test]
    fn pension_order_ids() {
        assert_eq!(
            order_tr_id(OrderSide::Buy, Venue::Live, AccountClass::Pension),
            "TTTC0602U"
        );
        assert_eq!(
            order_tr_id(OrderSide::Sell, Venue::Live, AccountClass::Pension),
            "TTTC0601U"
        );
        // Paper venue has no pension variant
        assert_eq!(
            order_tr_id(OrderSide::Buy, Venue::Paper, AccountClass::Pension),
            "VTTC0802U"
        );
    }

    #[test]
    fn inquiry_ids_by_venue() {
        assert_eq!(balance_tr_id(Venue::Live), "TTTC8434R");
        assert_eq!(balance_tr_id(Venue::Paper), "VTTC8434R");
        assert_eq!(buyable_tr_id(Venue::Live), "TTTC8908R");
        assert_eq!(revocable_tr_id(Venue::Paper), "VTTC8436R");
        assert_eq!(daily_history_tr_id(Venue::Live), "TTTC8001R");
        assert_eq!(pension_daily_tr_id(Venue::Live), "TTTC2201R");
        assert_eq!(cancel_tr_id(Venue::Live), "TTTC0803U");
    }
}
