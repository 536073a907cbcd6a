//! Wireline client library.
//!
//! Collaborator-facing surface over the relay protocol: external components
//! (a GUI, a detection pipeline, tests) consume decoded [`ClientEvent`]s
//! from a channel and produce outbound requests through [`RelayClient`]'s
//! send primitives. Wire framing, keepalive discarding, and image
//! persistence all happen inside the connection task.

mod client;
mod event;

pub use client::{ClientConfig, ClientError, RelayClient};
pub use event::ClientEvent;
