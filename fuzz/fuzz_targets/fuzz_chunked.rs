#![no_main]

use arbitrary::Arbitrary;
use keepalive_http11::{BodyProgress, ChunkedDecoder, encode_chunk};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzChunked {
    chunks: Vec<Vec<u8>>,
    trailing: Vec<u8>,
    split_hint: u8,
}

fuzz_target!(|input: FuzzChunked| {
    let mut chunks = input.chunks;
    chunks.retain(|chunk| !chunk.is_empty());
    chunks.truncate(64);

    let mut expected = Vec::new();
    let mut encoded = Vec::new();
    for chunk in &chunks {
        expected.extend_from_slice(chunk);
        encoded.extend_from_slice(&encode_chunk(chunk));
    }
    encoded.extend_from_slice(&encode_chunk(&[]));
    encoded.extend_from_slice(&input.trailing);

    let split_size = (input.split_hint as usize % 32) + 1;
    let mut decoder = ChunkedDecoder::new();
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut progress = BodyProgress::Continue;
    for part in encoded.chunks(split_size) {
        buf.extend_from_slice(part);
        progress = decoder.decode(&mut buf, &mut out).expect("valid chunked body");
    }
    assert_eq!(progress, BodyProgress::Complete);
    assert_eq!(out, expected);
    assert_eq!(buf, input.trailing);
});
