//! kis-rebalancer: drives a KIS brokerage account toward target allocation
//! weights.
//!
//! Reads target weights from a portfolio JSON file, fetches live balance and
//! asking prices through `kis-broker`, computes a per-instrument plan, and
//! executes it with sells before buys, tiered limit tranches, and a
//! cash-aware clamp on the buy phase.

pub mod audit;
pub mod config;
pub mod error;
pub mod execution;
pub mod planner;
pub mod run;
pub mod target;
