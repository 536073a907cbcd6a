//! Fuzz target for frame classification and payload decoding
//!
//! # Strategy
//!
//! - Arbitrary lines through `Frame::parse` (classification is total)
//! - Decoded image payloads through base64 validation
//! - Re-encoding whatever parsed, to exercise the serializer
//!
//! # Invariants
//!
//! - Parsing NEVER panics; unknown tags become the plain variant
//! - Payload decode failures are errors, not panics
//! - Encoded output always ends with exactly one newline

#![no_main]

use libfuzzer_sys::fuzz_target;
use wireline_proto::Frame;

fuzz_target!(|line: &str| {
    let frame = Frame::parse(line);

    if let Frame::Image(payload) | Frame::ServerImage(payload) = &frame {
        let _ = payload.decode();
    }

    if let Ok(wire) = frame.encode() {
        assert_eq!(wire.last(), Some(&b'\n'));
    }
});
