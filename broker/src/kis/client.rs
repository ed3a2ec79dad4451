//! Blocking KIS REST client.
//!
//! All calls are synchronous and carry an explicit transport timeout. Every
//! authenticated call recovers once from a vendor-signalled expired token
//! (forced refresh + single retry); account-type quirks are handled by the
//! fallback chains in `fetch_open_orders` and `place_order`.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

use super::tr::{
    self, AccountClass, OrderSide, Venue, MSG_CD_ACCOUNT_TYPE_MISMATCH, MSG_CD_TOKEN_EXPIRED,
};
use super::types::{
    parse_amount, AccountSummary, AskingPriceResponse, BalanceResponse, BuyableResponse, Envelope,
    Holding, OpenOrder, OpenOrdersResponse, OrderOutcome, OrderResponse, QuoteSnapshot,
    TokenResponse,
};
use crate::error::{BrokerError, Result};
use crate::token::{AccessToken, TokenStore};
use crate::Credentials;

const TOKEN_PATH: &str = "/oauth2/tokenP";
const BALANCE_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-balance";
const ASKING_PRICE_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-asking-price-exp-ccn";
const BUYABLE_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-psbl-order";
const ORDER_PATH: &str = "/uapi/domestic-stock/v1/trading/order-cash";
const CANCEL_PATH: &str = "/uapi/domestic-stock/v1/trading/order-rvsecncl";
const REVOCABLE_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-psbl-rvsecncl";
const DAILY_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-daily-ccld";
const PENSION_DAILY_PATH: &str = "/uapi/domestic-stock/v1/trading/pension/inquire-daily-ccld";

/// Ordered fallback strategies for the open-order inquiry (account-type
/// heterogeneity: pension accounts reject the revocable-orders endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOrderStrategy {
    /// General revocable-orders inquiry; unexecuted orders only.
    Revocable,
    /// General daily execution history, filtered to unexecuted rows.
    DailyHistory,
    /// Pension-account daily execution history.
    PensionDaily,
}

const OPEN_ORDER_STRATEGIES: [OpenOrderStrategy; 3] = [
    OpenOrderStrategy::Revocable,
    OpenOrderStrategy::DailyHistory,
    OpenOrderStrategy::PensionDaily,
];

/// What to do with one strategy's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FallbackDecision {
    /// Use this strategy's rows.
    Accept,
    /// Try the next strategy.
    Fallback,
    /// Hard error unrelated to account class; surface it.
    Fail,
}

/// Decide whether a strategy's response warrants falling through the chain.
/// Fallback on the account-type-mismatch code or on a successful but empty
/// result; any other rejection is a real error.
pub(crate) fn open_order_fallback(envelope: &Envelope, rows_empty: bool) -> FallbackDecision {
    if envelope.is_success() {
        if rows_empty {
            FallbackDecision::Fallback
        } else {
            FallbackDecision::Accept
        }
    } else if envelope.msg_cd == MSG_CD_ACCOUNT_TYPE_MISMATCH {
        FallbackDecision::Fallback
    } else {
        FallbackDecision::Fail
    }
}

/// Vendor-signalled expired-token condition.
pub(crate) fn token_expired(envelope: &Envelope) -> bool {
    !envelope.is_success() && envelope.msg_cd == MSG_CD_TOKEN_EXPIRED
}

/// Authenticated client over the KIS domestic-stock REST surface.
pub struct KisClient {
    http: Client,
    creds: Credentials,
    venue: Venue,
    token_store: Box<dyn TokenStore>,
    token: Option<AccessToken>,
}

impl KisClient {
    /// Build a client with an explicit transport timeout.
    pub fn new(
        creds: Credentials,
        token_store: Box<dyn TokenStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::Connection(format!("failed to build HTTP client: {e}")))?;
        let venue = creds.venue();
        Ok(Self {
            http,
            creds,
            venue,
            token_store,
            token: None,
        })
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    pub fn account_number(&self) -> &str {
        &self.creds.account_number
    }

    // === Authentication ===

    /// Get a usable access token, reusing the in-memory or cached one
    /// unless `force_refresh` is set or it is inside the expiry buffer.
    pub fn authenticate(&mut self, force_refresh: bool) -> Result<AccessToken> {
        let now = Utc::now();

        if !force_refresh {
            if let Some(token) = &self.token {
                if token.usable_at(now) {
                    return Ok(token.clone());
                }
            }
            if let Some(token) = self.token_store.load(&self.creds.app_key) {
                if token.usable_at(now) {
                    debug!("reusing cached token (expires {})", token.expires_at);
                    self.token = Some(token.clone());
                    return Ok(token);
                }
            }
        }

        info!("requesting new access token");
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "appkey": self.creds.app_key,
            "appsecret": self.creds.app_secret,
        });

        let resp = self
            .http
            .post(format!("{}{TOKEN_PATH}", self.creds.base_url))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| BrokerError::Auth(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            return Err(BrokerError::Auth(format!(
                "token issuance returned {status}: {text}"
            )));
        }

        let issued: TokenResponse = resp
            .json()
            .map_err(|e| BrokerError::Auth(format!("failed to parse token response: {e}")))?;

        let token = AccessToken {
            value: issued.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(issued.expires_in),
        };
        self.token_store.store(&self.creds.app_key, &token)?;
        self.token = Some(token.clone());
        Ok(token)
    }

    /// Run `call` with a valid token; on the vendor expired-token code,
    /// force-refresh exactly once and retry the same request once.
    fn with_token<T>(
        &mut self,
        call: impl Fn(&Self, &str) -> Result<T>,
        expired: impl Fn(&T) -> bool,
    ) -> Result<T> {
        let token = self.authenticate(false)?;
        let first = call(self, &token.value)?;
        if !expired(&first) {
            return Ok(first);
        }

        warn!("token expired mid-session; forcing refresh and retrying once");
        let token = self.authenticate(true)?;
        let second = call(self, &token.value)?;
        if expired(&second) {
            return Err(BrokerError::Auth(
                "token rejected again after forced refresh".into(),
            ));
        }
        Ok(second)
    }

    // === Account state ===

    /// Balance inquiry: account totals, holdings, and total asset value.
    /// Rows with zero held quantity are dropped.
    pub fn fetch_balance(&mut self) -> Result<(AccountSummary, Vec<Holding>, i64)> {
        let resp: BalanceResponse = self.with_token(
            |c, tok| {
                c.get_json(
                    BALANCE_PATH,
                    tr::balance_tr_id(c.venue),
                    tok,
                    &[
                        ("CANO", c.creds.account_number.as_str()),
                        ("ACNT_PRDT_CD", c.creds.account_product_code.as_str()),
                        ("AFHR_FLPR_YN", "N"),
                        ("OFL_YN", "N"),
                        ("INQR_DVSN", "02"),
                        ("UNPR_DVSN", "01"),
                        ("FUND_STTL_ICLD_YN", "N"),
                        ("FNCG_AMT_AUTO_RDPT_YN", "N"),
                        ("PRCS_DVSN", "01"),
                        ("CTX_AREA_FK100", ""),
                        ("CTX_AREA_NK100", ""),
                    ],
                )
            },
            |r: &BalanceResponse| token_expired(&r.envelope),
        )?;

        if !resp.envelope.is_success() {
            return Err(api_error(&resp.envelope));
        }

        let summary = resp
            .output2
            .first()
            .map(|row| row.to_summary())
            .unwrap_or_default();
        let holdings: Vec<Holding> = resp
            .output1
            .iter()
            .map(|row| row.to_holding())
            .filter(|h| h.quantity > 0)
            .collect();
        let total_asset = summary.total_asset;

        Ok((summary, holdings, total_asset))
    }

    /// Asking-price inquiry: three-tier bid/ask ladders plus last price.
    /// A missing quote degrades to a zero snapshot (orders sized from it
    /// come out zero and are skipped), not an error.
    pub fn fetch_quote(&mut self, code: &str) -> Result<QuoteSnapshot> {
        let resp: AskingPriceResponse = self.with_token(
            |c, tok| {
                c.get_json(
                    ASKING_PRICE_PATH,
                    tr::ASKING_PRICE_TR_ID,
                    tok,
                    &[("FID_COND_MRKT_DIV_CODE", "J"), ("FID_INPUT_ISCD", code)],
                )
            },
            |r: &AskingPriceResponse| token_expired(&r.envelope),
        )?;

        if !resp.envelope.is_success() {
            return Err(api_error(&resp.envelope));
        }

        match resp.output1 {
            Some(row) => Ok(row.to_snapshot(code)),
            None => {
                warn!("no asking-price data for {code}");
                Ok(QuoteSnapshot {
                    code: code.to_string(),
                    ..QuoteSnapshot::default()
                })
            }
        }
    }

    /// Cash-only buyable amount, falling back to the margin-inclusive
    /// field when the cash field is absent.
    pub fn fetch_buyable_cash(&mut self) -> Result<i64> {
        let resp: BuyableResponse = self.with_token(
            |c, tok| {
                c.get_json(
                    BUYABLE_PATH,
                    tr::buyable_tr_id(c.venue),
                    tok,
                    &[
                        ("CANO", c.creds.account_number.as_str()),
                        ("ACNT_PRDT_CD", c.creds.account_product_code.as_str()),
                        // The endpoint demands a product code even for an
                        // account-level inquiry; any liquid code works.
                        ("PDNO", "005930"),
                        ("ORD_UNPR", "0"),
                        ("ORD_DVSN", "02"),
                        ("CMA_EVLU_AMT_ICLD_YN", "Y"),
                        ("OVRS_ICLD_YN", "N"),
                    ],
                )
            },
            |r: &BuyableResponse| token_expired(&r.envelope),
        )?;

        if !resp.envelope.is_success() {
            return Err(api_error(&resp.envelope));
        }

        let row = resp.output.unwrap_or_else(|| {
            warn!("buyable inquiry returned no output; assuming zero cash");
            Default::default()
        });
        let cash = parse_amount(&row.ord_psbl_cash);
        if cash > 0 {
            Ok(cash)
        } else {
            Ok(parse_amount(&row.nrcvb_buy_amt))
        }
    }

    // === Orders ===

    /// Place a limit cash order. Submitted with the standard transaction
    /// code for the side/venue; on the account-type-mismatch code the
    /// identical body is resubmitted once with the pension code pair.
    ///
    /// A brokerage rejection comes back as `OrderOutcome { accepted: false }`,
    /// not as an error: the caller's batch continues.
    pub fn place_order(
        &mut self,
        code: &str,
        qty: u32,
        price: i64,
        side: OrderSide,
    ) -> Result<OrderOutcome> {
        let body = serde_json::json!({
            "CANO": self.creds.account_number,
            "ACNT_PRDT_CD": self.creds.account_product_code,
            "PDNO": code,
            "ORD_DVSN": "00",
            "ORD_QTY": qty.to_string(),
            "ORD_UNPR": price.to_string(),
        });

        let resp: OrderResponse = self.with_token(
            |c, tok| {
                c.post_json(
                    ORDER_PATH,
                    tr::order_tr_id(side, c.venue, AccountClass::Standard),
                    tok,
                    &body,
                )
            },
            |r: &OrderResponse| token_expired(&r.envelope),
        )?;

        let resp = if !resp.envelope.is_success()
            && resp.envelope.msg_cd == MSG_CD_ACCOUNT_TYPE_MISMATCH
        {
            info!("standard order code rejected for account class; retrying with pension codes");
            self.with_token(
                |c, tok| {
                    c.post_json(
                        ORDER_PATH,
                        tr::order_tr_id(side, c.venue, AccountClass::Pension),
                        tok,
                        &body,
                    )
                },
                |r: &OrderResponse| token_expired(&r.envelope),
            )?
        } else {
            resp
        };

        Ok(OrderOutcome {
            accepted: resp.envelope.is_success(),
            code: resp.envelope.msg_cd,
            message: resp.envelope.msg1,
            order_no: resp.output.map(|o| o.odno),
        })
    }

    /// Cancel the full remaining quantity of an order.
    pub fn cancel_order(&mut self, branch_no: &str, order_no: &str) -> Result<OrderOutcome> {
        let body = serde_json::json!({
            "CANO": self.creds.account_number,
            "ACNT_PRDT_CD": self.creds.account_product_code,
            "KRX_FWDG_ORD_ORGNO": branch_no,
            "ORGN_ODNO": order_no,
            "ORD_DVSN": "00",
            "RVSE_CNCL_DVSN_CD": "02",
            "ORD_QTY": "0",
            "ORD_UNPR": "0",
            "QTY_ALL_ORD_YN": "Y",
        });

        let resp: OrderResponse = self.with_token(
            |c, tok| c.post_json(CANCEL_PATH, tr::cancel_tr_id(c.venue), tok, &body),
            |r: &OrderResponse| token_expired(&r.envelope),
        )?;

        Ok(OrderOutcome {
            accepted: resp.envelope.is_success(),
            code: resp.envelope.msg_cd,
            message: resp.envelope.msg1,
            order_no: resp.output.map(|o| o.odno),
        })
    }

    /// Unexecuted orders, via the strategy chain: revocable-orders inquiry,
    /// then the general daily history filtered to unexecuted rows, then the
    /// pension daily history. The first strategy that succeeds with
    /// non-empty data wins; the last one's result stands regardless.
    pub fn fetch_open_orders(&mut self) -> Result<Vec<OpenOrder>> {
        let mut last: Vec<OpenOrder> = Vec::new();

        for (i, strategy) in OPEN_ORDER_STRATEGIES.iter().enumerate() {
            let is_last = i + 1 == OPEN_ORDER_STRATEGIES.len();
            debug!("open-order inquiry via {strategy:?}");

            let resp: OpenOrdersResponse = self.with_token(
                |c, tok| c.open_orders_request(*strategy, tok),
                |r: &OpenOrdersResponse| token_expired(&r.envelope),
            )?;

            let rows: Vec<OpenOrder> = resp
                .output
                .iter()
                .filter(|row| match strategy {
                    // The history endpoints return executed rows too.
                    OpenOrderStrategy::Revocable => true,
                    _ => row.is_unexecuted(),
                })
                .map(|row| row.to_open_order())
                .collect();

            match open_order_fallback(&resp.envelope, rows.is_empty()) {
                FallbackDecision::Accept => return Ok(rows),
                FallbackDecision::Fallback if !is_last => {
                    debug!(
                        "{strategy:?} yielded nothing usable ({}): falling back",
                        resp.envelope.msg_cd
                    );
                    last = rows;
                }
                FallbackDecision::Fallback => return Ok(rows),
                FallbackDecision::Fail => return Err(api_error(&resp.envelope)),
            }
        }

        Ok(last)
    }

    fn open_orders_request(&self, strategy: OpenOrderStrategy, token: &str) -> Result<OpenOrdersResponse> {
        let today = Utc::now().format("%Y%m%d").to_string();
        let start = (Utc::now() - ChronoDuration::days(30))
            .format("%Y%m%d")
            .to_string();
        let cano = self.creds.account_number.as_str();
        let prdt = self.creds.account_product_code.as_str();

        match strategy {
            OpenOrderStrategy::Revocable => self.get_json(
                REVOCABLE_PATH,
                tr::revocable_tr_id(self.venue),
                token,
                &[
                    ("CANO", cano),
                    ("ACNT_PRDT_CD", prdt),
                    ("CTX_AREA_FK100", ""),
                    ("CTX_AREA_NK100", ""),
                    ("INQR_DVSN_1", "0"),
                    ("INQR_DVSN_2", "0"),
                ],
            ),
            OpenOrderStrategy::DailyHistory => self.get_json(
                DAILY_PATH,
                tr::daily_history_tr_id(self.venue),
                token,
                &[
                    ("CANO", cano),
                    ("ACNT_PRDT_CD", prdt),
                    ("INQR_STRT_DT", start.as_str()),
                    ("INQR_END_DT", today.as_str()),
                    ("SLL_BUY_DVSN_CD", "00"),
                    ("INQR_DVSN", "00"),
                    ("PDNO", ""),
                    ("CCLD_DVSN", "02"),
                    ("ORD_GNO_BRNO", ""),
                    ("ODNO", ""),
                    ("INQR_DVSN_3", "00"),
                    ("INQR_DVSN_1", ""),
                    ("CTX_AREA_FK100", ""),
                    ("CTX_AREA_NK100", ""),
                ],
            ),
            OpenOrderStrategy::PensionDaily => self.get_json(
                PENSION_DAILY_PATH,
                tr::pension_daily_tr_id(self.venue),
                token,
                &[
                    ("CANO", cano),
                    ("ACNT_PRDT_CD", prdt),
                    ("INQR_STRT_DT", start.as_str()),
                    ("INQR_END_DT", today.as_str()),
                    ("SLL_BUY_DVSN_CD", "00"),
                    ("INQR_DVSN", "00"),
                    ("PDNO", ""),
                    ("ORD_GNO_BRNO", ""),
                    ("PCOD", ""),
                    ("INQR_DVSN_3", "00"),
                    ("INQR_DVSN_1", ""),
                    ("CTX_AREA_FK100", ""),
                    ("CTX_AREA_NK100", ""),
                    ("USER_DVSN_CD", "01"),
                    ("CCLD_NCCS_DVSN", "02"),
                ],
            ),
        }
    }

    // === Transport helpers ===

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        tr_id: &str,
        token: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}{path}", self.creds.base_url))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .header("appkey", &self.creds.app_key)
            .header("appsecret", &self.creds.app_secret)
            .header("tr_id", tr_id)
            .header("custtype", "P")
            .query(params)
            .send()
            .map_err(|e| BrokerError::Connection(format!("GET {path} failed: {e}")))?;

        parse_body(path, resp)
    }

    fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        tr_id: &str,
        token: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let resp = self
            .http
            .post(format!("{}{path}", self.creds.base_url))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .header("appkey", &self.creds.app_key)
            .header("appsecret", &self.creds.app_secret)
            .header("tr_id", tr_id)
            .header("custtype", "P")
            .json(body)
            .send()
            .map_err(|e| BrokerError::Order(format!("POST {path} failed: {e}")))?;

        parse_body(path, resp)
    }
}

/// Parse a response body into `T`. KIS delivers business errors (including
/// the expired-token code) as JSON envelopes on non-2xx statuses, so the
/// body is parsed first and the HTTP status only matters when the body is
/// not the expected shape.
fn parse_body<T: DeserializeOwned>(path: &str, resp: reqwest::blocking::Response) -> Result<T> {
    let status = resp.status();
    let text = resp
        .text()
        .map_err(|e| BrokerError::Connection(format!("failed to read {path} body: {e}")))?;

    match serde_json::from_str::<T>(&text) {
        Ok(value) => Ok(value),
        Err(e) if status.is_success() => {
            Err(BrokerError::Parse(format!("{path} body mismatch: {e}")))
        }
        Err(_) => Err(BrokerError::Connection(format!(
            "{path} returned {status}: {text}"
        ))),
    }
}

fn api_error(envelope: &Envelope) -> BrokerError {
    BrokerError::Api {
        code: envelope.msg_cd.clone(),
        message: envelope.msg1.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(rt_cd: &str, msg_cd: &str) -> Envelope {
        serde_json::from_str(&format!(
            r#"{{"rt_cd": "{rt_cd}", "msg_cd": "{msg_cd}", "msg1": ""}}"#
        ))
        .unwrap()
    }

    #[test]
    fn success_with_rows_is_accepted() {
        let env = envelope("0", "KIOK0000");
        assert_eq!(open_order_fallback(&env, false), FallbackDecision::Accept);
    }

    #[test]
    fn success_with_no_rows_falls_back() {
        let env = envelope("0", "KIOK0000");
        assert_eq!(open_order_fallback(&env, true), FallbackDecision::Fallback);
    }

    #[test]
    fn account_mismatch_falls_back() {
        let env = envelope("1", MSG_CD_ACCOUNT_TYPE_MISMATCH);
        assert_eq!(open_order_fallback(&env, true), FallbackDecision::Fallback);
    }

    #[test]
    fn unrelated_rejection_fails() {
        let env = envelope("1", "EGW00121");
        assert_eq!(open_order_fallback(&env, true), FallbackDecision::Fail);
    }

    #[test]
    fn expired_token_is_detected() {
        assert!(token_expired(&envelope("1", MSG_CD_TOKEN_EXPIRED)));
        assert!(!token_expired(&envelope("0", MSG_CD_TOKEN_EXPIRED)));
        assert!(!token_expired(&envelope("1", "OPSQ0002")));
    }
}
