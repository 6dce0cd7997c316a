//! Core domain + application logic for the Telegram relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! messaging port (trait) implemented in the adapter crate.

pub mod access_store;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod relay;
pub mod reply_router;
pub mod roles;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
