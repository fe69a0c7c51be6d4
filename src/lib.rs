//! Collects event signatures for DeFi protocol contracts.
//!
//! A work item names a protocol and a network. The [`collector::Collector`]
//! resolves candidate contract addresses, fetches each contract's ABI from a
//! block explorer (falling back to sample ABIs) and records the ABI's event
//! signatures.

pub mod collector;
pub mod config;
pub mod error;
pub mod ethereum;
pub mod output;
