// ABOUTME: Library root for catapult - exposes the ledger and its adapters.
// ABOUTME: The main binary is in main.rs.

pub mod aws;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod git;
pub mod ledger;
pub mod output;
pub mod resource;
pub mod store;
pub mod types;
