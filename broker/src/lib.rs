//! Korea Investment & Securities (KIS) OpenAPI client.
//!
//! Provides a blocking REST client over the KIS domestic-stock surface:
//! OAuth token issuance with an on-disk cache, balance and quote inquiry,
//! buyable-cash inquiry, cash order placement, and open-order inquiry with
//! account-type fallback chains for pension accounts.

pub mod error;
pub mod kis;
pub mod token;

pub use error::BrokerError;
pub use kis::client::KisClient;
pub use kis::tr::{AccountClass, OrderSide, Venue};
pub use kis::types::{AccountSummary, Holding, OpenOrder, OrderOutcome, QuoteSnapshot};
pub use token::{AccessToken, FileTokenStore, TokenStore};

/// Credentials for one KIS app / account pair.
///
/// The secret is wiped from memory when the value is dropped.
#[derive(Clone)]
pub struct Credentials {
    pub app_key: String,
    pub app_secret: String,
    pub account_number: String,
    pub account_product_code: String,
    pub base_url: String,
}

impl Drop for Credentials {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.app_secret.zeroize();
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field(
                "app_key",
                &format!("{}…", &self.app_key[..self.app_key.len().min(4)]),
            )
            .field("account_number", &self.account_number)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Venue implied by the base URL: KIS paper-trading hosts contain `openapivts`.
    pub fn venue(&self) -> Venue {
        if self.base_url.contains("openapivts") {
            Venue::Paper
        } else {
            Venue::Live
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(base_url: &str) -> Credentials {
        Credentials {
            app_key: "PSabcdef123456".into(),
            app_secret: "secret".into(),
            account_number: "12345678".into(),
            account_product_code: "01".into(),
            base_url: base_url.into(),
        }
    }

    #[test]
    fn live_venue_from_base_url() {
        let c = creds("https://openapi.koreainvestment.com:9443");
        assert_eq!(c.venue(), Venue::Live);
    }

    #[test]
    fn paper_venue_from_base_url() {
        let c = creds("https://openapivts.koreainvestment.com:29443");
        assert_eq!(c.venue(), Venue::Paper);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let c = creds("https://openapi.koreainvestment.com:9443");
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret"));
    }
}
