//! Core types, errors, and configuration shared by the dispatch crates.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod result;

pub use config::{BrokerConfig, DispatchConfig, EngineConfig, ServerConfig};
pub use error::Error;
pub use result::{Result, ResultExt};
