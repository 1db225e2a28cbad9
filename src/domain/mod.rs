//! Core domain types and logic.

pub mod error;
pub mod parse;
pub mod bar;
pub mod bar_store;
pub mod order;
pub mod position;
pub mod reconstruct;
pub mod peak_tracker;
pub mod scenario;
pub mod simulate;
pub mod summary;
pub mod run_config;
pub mod config_validation;
