//! Core business logic for Ledgerline.
//!
//! This crate contains pure ledger logic with ZERO web or database dependencies.
//! Validation rules, balance derivation and reconciliation math live here.
//!
//! # Modules
//!
//! - `ledger` - Double-entry journal rules, derivation and reversal
//! - `reconciliation` - Drift, integrity, hierarchy and equation checks
//! - `audit` - Append-only sync log records

pub mod audit;
pub mod ledger;
pub mod reconciliation;
