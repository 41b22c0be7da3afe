//! # keepalive_http11
//!
//! 依存なしの HTTP/1.1 クライアント向けワイヤーレイヤー (Sans I/O)
//!
//! ## 特徴
//!
//! - **依存なし**: 標準ライブラリのみ使用
//! - **Sans I/O**: I/O を完全に分離した設計
//! - **キープアライブ向け**: 受信バッファは接続側が所有し、
//!   デコーダーはメッセージに属するバイトだけを消費する
//!
//! ## 使い方
//!
//! ```rust
//! use keepalive_http11::uri::Url;
//! use keepalive_http11::{BodyFraming, RequestHead, ResponseHeadDecoder, TransferDecoder};
//!
//! // リクエストを作成してエンコード
//! let url = Url::parse("http://example.com/items?page=1").unwrap();
//! let request = RequestHead::new("GET", url.target())
//!     .header("Host", &url.endpoint().host_header_value())
//!     .header("Connection", "keep-alive");
//! let bytes = request.encode();
//! assert!(bytes.starts_with(b"GET /items?page=1 HTTP/1.1\r\n"));
//!
//! // レスポンスをデコード
//! let mut buf = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec();
//! let head = ResponseHeadDecoder::new().decode(&mut buf).unwrap().unwrap();
//! let mut body = Vec::new();
//! let mut decoder = TransferDecoder::new(BodyFraming::from_headers(&head.headers).unwrap());
//! decoder.decode(&mut buf, &mut body).unwrap();
//! assert_eq!(body, b"ok");
//! ```

pub mod content_encoding;
mod decoder;
mod encoder;
mod error;
mod headers;
mod limits;
mod request;
pub mod uri;

pub use decoder::{
    BodyFraming, BodyProgress, ChunkedDecoder, ResponseHead, ResponseHeadDecoder,
    TransferDecoder, Version,
};
pub use encoder::{LAST_CHUNK, encode_chunk, encode_request_head};
pub use error::Error;
pub use headers::Headers;
pub use limits::DecoderLimits;
pub use request::RequestHead;
