#![no_main]

use keepalive_http11::{BodyFraming, DecoderLimits, ResponseHeadDecoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 一括でデコード
    let mut buf = data.to_vec();
    let mut decoder = ResponseHeadDecoder::new();
    let whole = decoder.decode(&mut buf);
    if let Ok(Some(head)) = &whole {
        let _ = BodyFraming::from_headers(&head.headers);
        let _ = head.is_keep_alive();
        let _ = head.status_has_body();
        assert!(buf.len() < data.len());
    }

    // 1 バイトずつでも同じ結果になる (エラーでない場合)
    let mut decoder = ResponseHeadDecoder::new();
    let mut split_buf = Vec::new();
    let mut split = Ok(None);
    for byte in data {
        split_buf.push(*byte);
        split = decoder.decode(&mut split_buf);
        if !matches!(split, Ok(None)) {
            break;
        }
    }
    if let (Ok(Some(a)), Ok(Some(b))) = (&whole, &split) {
        assert_eq!(a, b);
    }

    // 厳しい制限でも panic しない
    let limits = DecoderLimits {
        max_headers_count: 2,
        max_header_line_size: 32,
        max_chunk_line_size: 8,
    };
    let mut buf = data.to_vec();
    let _ = ResponseHeadDecoder::with_limits(limits).decode(&mut buf);
});
