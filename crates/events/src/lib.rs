//! Message model and topic transport for dispatch.
//!
//! This crate provides the wire shapes exchanged over topics and the transport
//! seam the engine consumes them through. Key features:
//!
//! - **Resources**: ids and sorted label maps
//! - **Messages**: inbound messages tagged by `messageType`, outbound action messages
//! - **Transport**: bounded poll and fire-and-forget publish, with an in-memory broker
//!
//! # Example
//!
//! ```ignore
//! use dispatch_events::{InMemoryBroker, Message, Resource, Transport};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> dispatch_core::Result<()> {
//!     let broker = InMemoryBroker::new();
//!     let agv = Resource::new("agv_1").with_label("resource_type", "agv");
//!     broker.send("resources-topic-1", Message::register(agv).to_value()?).await?;
//!
//!     let batch = broker.poll("resources-topic-1", Duration::from_secs(1)).await?;
//!     println!("received {} envelopes", batch.len());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod message;
pub mod transport;
pub mod types;

pub use dispatch_core::{Error, Result};
pub use message::{ActionMessage, Message, MessageKind};
pub use transport::{DEFAULT_MAX_BATCH, Envelope, InMemoryBroker, TracingTransport, Transport};
pub use types::{Labels, Resource, ResourceId};
