//! KIS domestic-stock API: client, wire types, transaction-id table.

pub mod client;
pub mod tr;
pub mod types;
