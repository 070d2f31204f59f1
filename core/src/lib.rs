//! credit-features-core: batch feature engineering over credit-bureau history.
//!
//! Three source tables go in (`bureau_balance`, `bureau`, `previous_application`),
//! four keyed feature tables come out. See `pipeline` for the stage order.

pub mod balance;
pub mod bureau;
pub mod client_level;
pub mod config;
pub mod error;
pub mod feature;
pub mod join;
pub mod manifest;
pub mod pipeline;
pub mod previous_application;
pub mod ratio;
pub mod record;
pub mod rng;
pub mod status;
pub mod store;
pub mod synthetic;
pub mod types;
