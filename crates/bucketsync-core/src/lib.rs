//! bucketsync-core — domain types, ports, and configuration
//!
//! Hexagonal core for the upload coordinator: domain entities and newtypes
//! with no external dependencies beyond validation, port traits that adapter
//! crates (`bucketsync-ledger`, `bucketsync-remote`, `bucketsync-watch`)
//! implement, and the CLI-flag-backed configuration.

pub mod config;
pub mod domain;
pub mod ports;
