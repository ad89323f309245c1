//! # cardscan common library
//!
//! Shared code for the card scanner crates:
//! - Error and result types
//! - TOML configuration loading and API key resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
