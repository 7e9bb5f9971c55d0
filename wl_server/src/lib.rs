//! HTTP server for the wager ledger.
//!
//! Wires a [`wager_ledger::Ledger`] behind an axum router with bearer-token
//! authentication, request correlation, structured logging and Prometheus
//! metrics.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
