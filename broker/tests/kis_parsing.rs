//! Tests for KIS API response parsing — no live connection needed.

use kis_broker::kis::types::{
    AskingPriceResponse, BalanceResponse, BuyableResponse, OpenOrdersResponse, OrderResponse,
    TokenResponse,
};

// ============================================================================
// Token issuance
// ============================================================================

#[test]
fn parse_token_response() {
    let json = r#"{
        "access_token": "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.abc",
        "token_type": "Bearer",
        "expires_in": 86400
    }"#;

    let resp: TokenResponse = serde_json::from_str(json).unwrap();
    assert!(resp.access_token.starts_with("eyJ"));
    assert_eq!(resp.expires_in, 86_400);
}

#[test]
fn token_expires_in_defaults_to_24h() {
    let json = r#"{ "access_token": "tok" }"#;
    let resp: TokenResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.expires_in, 86_400);
}

#[test]
fn reject_token_response_without_token() {
    assert!(serde_json::from_str::<TokenResponse>(r#"{ "expires_in": 100 }"#).is_err());
}

// ============================================================================
// Balance inquiry
// ============================================================================

fn balance_json() -> &'static str {
    r#"{
        "rt_cd": "0",
        "msg_cd": "KIOK0510",
        "msg1": "ok",
        "output1": [
            {
                "pdno": "005930",
                "prdt_name": "Samsung Electronics",
                "hldg_qty": "10",
                "prpr": "71200",
                "pchs_avg_pric": "68300.00",
                "evlu_amt": "712000",
                "evlu_pfls_rt": "4.25"
            },
            {
                "pdno": "035420",
                "prdt_name": "NAVER",
                "hldg_qty": "0",
                "prpr": "190000",
                "pchs_avg_pric": "0.00",
                "evlu_amt": "0",
                "evlu_pfls_rt": "0.00"
            }
        ],
        "output2": [
            {
                "tot_evlu_amt": "1000000",
                "dnca_tot_amt": "288000",
                "pchs_amt_smtl_amt": "683000",
                "evlu_amt_smtl_amt": "712000",
                "evlu_pfls_smtl_amt": "29000"
            }
        ]
    }"#
}

#[test]
fn parse_balance_response() {
    let resp: BalanceResponse = serde_json::from_str(balance_json()).unwrap();
    assert!(resp.envelope.is_success());
    assert_eq!(resp.output1.len(), 2);
    assert_eq!(resp.output2.len(), 1);

    let summary = resp.output2[0].to_summary();
    assert_eq!(summary.total_asset, 1_000_000);
    assert_eq!(summary.deposit, 288_000);
    assert_eq!(summary.profit_loss, 29_000);
}

#[test]
fn balance_response_tolerates_missing_outputs() {
    let resp: BalanceResponse =
        serde_json::from_str(r#"{"rt_cd": "0", "msg_cd": "", "msg1": ""}"#).unwrap();
    assert!(resp.output1.is_empty());
    assert!(resp.output2.is_empty());
}

// ============================================================================
// Asking price
// ============================================================================

#[test]
fn parse_asking_price_response() {
    let json = r#"{
        "rt_cd": "0",
        "msg_cd": "MCA00000",
        "msg1": "ok",
        "output1": {
            "askp1": "71300", "askp2": "71400", "askp3": "71500",
            "bidp1": "71200", "bidp2": "71100", "bidp3": "71000",
            "stck_prpr": "71250"
        }
    }"#;

    let resp: AskingPriceResponse = serde_json::from_str(json).unwrap();
    let quote = resp.output1.unwrap().to_snapshot("005930");
    assert_eq!(quote.code, "005930");
    assert_eq!(quote.best_bid, 71_200);
    assert_eq!(quote.best_ask, 71_300);
    assert_eq!(quote.last_price, 71_250);
}

#[test]
fn asking_price_without_output_is_none() {
    let resp: AskingPriceResponse =
        serde_json::from_str(r#"{"rt_cd": "1", "msg_cd": "EGW00121", "msg1": "bad"}"#).unwrap();
    assert!(resp.output1.is_none());
    assert!(!resp.envelope.is_success());
}

// ============================================================================
// Buyable cash
// ============================================================================

#[test]
fn parse_buyable_response_cash_field() {
    let json = r#"{
        "rt_cd": "0", "msg_cd": "", "msg1": "",
        "output": { "ord_psbl_cash": "288000", "nrcvb_buy_amt": "576000" }
    }"#;
    let resp: BuyableResponse = serde_json::from_str(json).unwrap();
    let row = resp.output.unwrap();
    assert_eq!(row.ord_psbl_cash, "288000");
    assert_eq!(row.nrcvb_buy_amt, "576000");
}

// ============================================================================
// Order placement
// ============================================================================

#[test]
fn parse_order_accepted() {
    let json = r#"{
        "rt_cd": "0",
        "msg_cd": "APBK0013",
        "msg1": "order accepted",
        "output": { "KRX_FWDG_ORD_ORGNO": "06010", "ODNO": "0000117057", "ORD_TMD": "121052" }
    }"#;

    let resp: OrderResponse = serde_json::from_str(json).unwrap();
    assert!(resp.envelope.is_success());
    let out = resp.output.unwrap();
    assert_eq!(out.odno, "0000117057");
    assert_eq!(out.krx_fwdg_ord_orgno, "06010");
}

#[test]
fn parse_order_rejected() {
    let json = r#"{
        "rt_cd": "1",
        "msg_cd": "APBK0919",
        "msg1": "insufficient deposit"
    }"#;

    let resp: OrderResponse = serde_json::from_str(json).unwrap();
    assert!(!resp.envelope.is_success());
    assert_eq!(resp.envelope.msg_cd, "APBK0919");
    assert!(resp.output.is_none());
}

// ============================================================================
// Open orders (all three endpoint shapes)
// ============================================================================

#[test]
fn parse_revocable_open_orders() {
    let json = r#"{
        "rt_cd": "0", "msg_cd": "", "msg1": "",
        "output": [
            {
                "pdno": "005930",
                "prdt_name": "Samsung Electronics",
                "odno": "0000117057",
                "sll_buy_dvsn_cd_name": "BUY",
                "ord_qty": "10",
                "psbl_qty": "10",
                "ord_unpr": "71000",
                "ord_tmd": "101512",
                "krx_fwdg_ord_orgno": "06010"
            }
        ]
    }"#;

    let resp: OpenOrdersResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.output.len(), 1);
    let order = resp.output[0].to_open_order();
    assert_eq!(order.order_no, "0000117057");
    assert_eq!(order.remaining_qty, 10);
    assert_eq!(order.price, 71_000);
}

#[test]
fn parse_daily_history_shape_with_aliases() {
    // The daily-history endpoints use output1 and rmn_qty.
    let json = r#"{
        "rt_cd": "0", "msg_cd": "", "msg1": "",
        "output1": [
            {
                "pdno": "035420",
                "prdt_name": "NAVER",
                "odno": "0000201135",
                "ord_qty": "5",
                "rmn_qty": "2",
                "ord_unpr": "190000",
                "ord_gno_brno": "06010"
            },
            {
                "pdno": "005930",
                "prdt_name": "Samsung Electronics",
                "odno": "0000201136",
                "ord_qty": "3",
                "rmn_qty": "0",
                "ord_unpr": "71200"
            }
        ]
    }"#;

    let resp: OpenOrdersResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.output.len(), 2);
    assert!(resp.output[0].is_unexecuted());
    assert!(!resp.output[1].is_unexecuted());
    assert_eq!(resp.output[0].to_open_order().branch_no, "06010");
}

#[test]
fn parse_account_mismatch_envelope() {
    let json = r#"{
        "rt_cd": "1",
        "msg_cd": "OPSQ0002",
        "msg1": "not serviced for this account"
    }"#;
    let resp: OpenOrdersResponse = serde_json::from_str(json).unwrap();
    assert!(!resp.envelope.is_success());
    assert_eq!(resp.envelope.msg_cd, "OPSQ0002");
    assert!(resp.output.is_empty());
}
