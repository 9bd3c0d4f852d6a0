//! ChainLag Core — fetcher, data source adapters, alignment and correlation.
//!
//! This crate contains the reusable core of the analysis:
//! - Daily time series domain types
//! - Rate-limited, retrying HTTP fetcher behind injectable clock and transport seams
//! - Etherscan (transaction count, supply) and CoinGecko (price) adapters
//! - Inner-join alignment, return derivation, same-day and lag-1 Pearson correlation

pub mod data;
pub mod domain;
pub mod pipeline;
