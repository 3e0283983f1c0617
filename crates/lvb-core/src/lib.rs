//! Core domain + application logic for the link validator bot.
//!
//! This crate is framework-agnostic. Telegram and the upstream validation API
//! live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod links;
pub mod logging;
pub mod messaging;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod security;
pub mod settings;
pub mod validation;

pub use errors::{Error, Result};
