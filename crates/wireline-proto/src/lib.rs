//! Wireline wire protocol.
//!
//! One frame per line, UTF-8 text with binary payloads carried as base64.
//! This crate is pure data plumbing: frame classification, payload helpers,
//! and the incremental receive-buffer codec. No I/O, no runtime dependency.
//!
//! # Components
//!
//! - [`Frame`]: tagged message unit, decided once at parse time
//! - [`FrameCodec`]: reassembles frames across arbitrary TCP segment splits
//! - [`ChatPayload`] / [`ImagePayload`]: payload field helpers

mod codec;
mod errors;
mod frame;
mod payload;

pub use codec::{CodecConfig, DEFAULT_KEEP_SUFFIX, DEFAULT_MAX_BUFFER, FrameCodec};
pub use errors::{ProtocolError, Result};
pub use frame::{Frame, KNOWN_TAG_PREFIXES};
pub use payload::{ChatPayload, ImagePayload};
