//! # VineDine Common Library
//!
//! Shared code for the VineDine services:
//! - Error type used for configuration and database plumbing
//! - Bootstrap TOML configuration and root folder resolution
//! - SQLite connection setup

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
