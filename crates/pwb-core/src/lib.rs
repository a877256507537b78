//! Core domain + application logic for the gold price watch bot.
//!
//! This crate is framework-agnostic. Telegram and the upstream price API live
//! behind ports (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod price;
pub mod scheduler;
pub mod store;
pub mod watcher;

pub use errors::{Error, Result};
