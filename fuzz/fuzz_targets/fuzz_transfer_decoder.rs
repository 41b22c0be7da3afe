#![no_main]

use arbitrary::Arbitrary;
use keepalive_http11::{BodyFraming, BodyProgress, TransferDecoder};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzTransfer {
    chunked: bool,
    length: u16,
    data: Vec<u8>,
    split_hint: u8,
}

fuzz_target!(|input: FuzzTransfer| {
    let framing = if input.chunked {
        BodyFraming::Chunked
    } else {
        BodyFraming::ContentLength(u64::from(input.length))
    };
    let split_size = (input.split_hint as usize % 32) + 1;

    let mut decoder = TransferDecoder::new(framing);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut consumed = 0;
    for part in input.data.chunks(split_size) {
        buf.extend_from_slice(part);
        consumed += part.len();
        match decoder.decode(&mut buf, &mut out) {
            Ok(BodyProgress::Complete) => {
                // 完了後のバイトはバッファに残る
                assert!(decoder.is_complete());
                break;
            }
            Ok(BodyProgress::Continue) => {}
            Err(_) => return,
        }
    }
    // ペイロードが入力を超えることはない
    assert!(out.len() <= consumed);
    if !input.chunked {
        assert!(out.len() <= usize::from(input.length));
    }
});
