//! LedgerSeal CLI - operator tooling over the ledger services

pub mod commands;
pub mod config;

pub use config::AppConfig;
