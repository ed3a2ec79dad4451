//! Target portfolio (portfolio.json) loading and validation.
//!
//! Weights are taken as-is: they are not renormalized and are not required
//! to sum to 1. A set summing below 1 deliberately leaves the remainder in
//! cash.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// The target allocation set.
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioSpec {
    pub portfolio: Vec<TargetAllocation>,
}

/// One target: instrument code, display name, and the fraction of total
/// account value it should occupy.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetAllocation {
    pub code: String,
    pub name: String,
    pub weight: f64,
}

impl PortfolioSpec {
    /// Load and validate a portfolio.json file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::PortfolioRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let spec: PortfolioSpec = serde_json::from_str(&contents)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: PortfolioSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        if self.portfolio.is_empty() {
            return Err(Error::Portfolio("portfolio list is empty".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for t in &self.portfolio {
            if !seen.insert(&t.code) {
                return Err(Error::Portfolio(format!("duplicate code: {}", t.code)));
            }
        }

        for t in &self.portfolio {
            if t.code.len() != 6 || !t.code.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::Portfolio(format!(
                    "code '{}' is not a 6-digit instrument code",
                    t.code
                )));
            }
            if !(t.weight > 0.0 && t.weight <= 1.0) {
                return Err(Error::Portfolio(format!(
                    "weight for {} ({}) must be in (0, 1]",
                    t.code, t.weight
                )));
            }
        }

        // Weights are NOT renormalized; only a sum above 1 is impossible to
        // fund and rejected.
        let sum: f64 = self.portfolio.iter().map(|t| t.weight).sum();
        if sum > 1.0 + 1e-9 {
            return Err(Error::Portfolio(format!(
                "weights sum to {sum:.4} (> 1.0)"
            )));
        }

        Ok(())
    }

    /// Codes in file order.
    pub fn codes(&self) -> Vec<&str> {
        self.portfolio.iter().map(|t| t.code.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_json() -> &'static str {
        r#"{
            "portfolio": [
                { "code": "005930", "name": "Samsung Electronics", "weight": 0.40 },
                { "code": "035420", "name": "NAVER", "weight": 0.30 },
                { "code": "373220", "name": "LG Energy Solution", "weight": 0.20 }
            ]
        }"#
    }

    #[test]
    fn parse_valid_portfolio() {
        let spec = PortfolioSpec::from_json(valid_json()).unwrap();
        assert_eq!(spec.portfolio.len(), 3);
        assert_eq!(spec.portfolio[0].code, "005930");
        assert_eq!(spec.portfolio[0].weight, 0.40);
    }

    #[test]
    fn under_allocation_is_allowed() {
        // 0.9 total: the remaining 10% stays in cash, deliberately.
        let spec = PortfolioSpec::from_json(valid_json()).unwrap();
        let sum: f64 = spec.portfolio.iter().map(|t| t.weight).sum();
        assert!(sum < 1.0);
    }

    #[test]
    fn reject_empty_portfolio() {
        assert!(PortfolioSpec::from_json(r#"{"portfolio": []}"#).is_err());
    }

    #[test]
    fn reject_duplicate_codes() {
        let json = r#"{
            "portfolio": [
                { "code": "005930", "name": "a", "weight": 0.5 },
                { "code": "005930", "name": "b", "weight": 0.3 }
            ]
        }"#;
        assert!(PortfolioSpec::from_json(json).is_err());
    }

    #[test]
    fn reject_non_numeric_code() {
        let json = r#"{
            "portfolio": [ { "code": "AAPL", "name": "x", "weight": 0.5 } ]
        }"#;
        assert!(PortfolioSpec::from_json(json).is_err());
    }

    #[test]
    fn reject_zero_weight() {
        let json = r#"{
            "portfolio": [ { "code": "005930", "name": "x", "weight": 0.0 } ]
        }"#;
        assert!(PortfolioSpec::from_json(json).is_err());
    }

    #[test]
    fn reject_weight_over_one() {
        let json = r#"{
            "portfolio": [ { "code": "005930", "name": "x", "weight": 1.5 } ]
        }"#;
        assert!(PortfolioSpec::from_json(json).is_err());
    }

    #[test]
    fn reject_sum_over_one() {
        let json = r#"{
            "portfolio": [
                { "code": "005930", "name": "a", "weight": 0.6 },
                { "code": "035420", "name": "b", "weight": 0.5 }
            ]
        }"#;
        assert!(PortfolioSpec::from_json(json).is_err());
    }

    #[test]
    fn codes_preserve_order() {
        let spec = PortfolioSpec::from_json(valid_json()).unwrap();
        assert_eq!(spec.codes(), vec!["005930", "035420", "373220"]);
    }
}
