#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # dispatch
//!
//! Command line front end: runs the service, talks to a running one over
//! HTTP, and carries the bundled demo scenarios.

pub mod cli;
pub mod client;
pub mod commands;
pub mod demos;
pub mod fixtures;
pub mod service;

pub use client::DispatchClient;
