//! HTTP/1.1 レスポンスデコーダーモジュール
//!
//! Sans I/O 設計に基づくストリーミングデコーダーを提供。
//! 受信バッファは呼び出し側 (接続) が所有し、デコーダーは必要なバイトだけを消費する。
//!
//! ## 使い方
//!
//! ```rust
//! use keepalive_http11::{BodyFraming, BodyProgress, ResponseHeadDecoder, TransferDecoder};
//!
//! let mut buf = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n".to_vec();
//!
//! let head = ResponseHeadDecoder::new().decode(&mut buf).unwrap().unwrap();
//! let framing = BodyFraming::from_headers(&head.headers).unwrap();
//! assert_eq!(framing, BodyFraming::Chunked);
//!
//! let mut decoder = TransferDecoder::new(framing);
//! let mut body = Vec::new();
//! let progress = decoder.decode(&mut buf, &mut body).unwrap();
//! assert_eq!(progress, BodyProgress::Complete);
//! assert_eq!(body, b"hello");
//! assert!(buf.is_empty());
//! ```

mod body;
mod head;
mod phase;
mod response;

// 公開 API
pub use body::{BodyFraming, BodyProgress, ChunkedDecoder, TransferDecoder};
pub use head::{ResponseHead, Version};
pub use response::ResponseHeadDecoder;
pub(crate) use body::{is_valid_field_value, is_valid_header_name};
