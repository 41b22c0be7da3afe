#![no_main]

use keepalive_http11::uri::Url;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(url) = Url::parse(input) else {
        return;
    };

    assert!(url.target().starts_with('/'));
    assert!(url.endpoint().port() != 0);
    let _ = url.endpoint().host_header_value();

    // 表示形式は再パースしても同じ URL になる
    let reparsed = Url::parse(&url.to_string()).expect("display form must parse");
    assert_eq!(reparsed, url);
});
