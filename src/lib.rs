//! Ledger View
//!
//! This crate keeps cached, grouped and searchable views of a personal
//! finance database and refreshes exactly the parts a single-record change
//! invalidates.

pub mod config;
pub mod core;
pub mod store;
pub mod view_model;
