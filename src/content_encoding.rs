//! Content-Encoding の選択 (RFC 9110 Section 8.4)
//!
//! レスポンスボディに適用するコンテントデコーダーを決定する。
//!
//! ## 使い方
//!
//! ```rust
//! use keepalive_http11::Headers;
//! use keepalive_http11::content_encoding::ContentCoding;
//!
//! let mut headers = Headers::new();
//! headers.append("Content-Encoding", "x-gzip");
//! assert_eq!(ContentCoding::from_headers(&headers).unwrap(), ContentCoding::Gzip);
//! ```

use crate::error::Error;
use crate::headers::Headers;

/// デコード可能なコンテントコーディング
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    /// 変換なし
    Identity,
    /// gzip (x-gzip を含む)
    Gzip,
    /// deflate (zlib ラッパー付き、なしの場合は raw deflate)
    Deflate,
}

impl ContentCoding {
    /// 正規化したトークン値
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCoding::Identity => "identity",
            ContentCoding::Gzip => "gzip",
            ContentCoding::Deflate => "deflate",
        }
    }

    /// レスポンスヘッダーからコンテントコーディングを決定
    ///
    /// - Content-Encoding なし、または identity のみ → `Identity`
    /// - `gzip` / `x-gzip` → `Gzip`
    /// - `deflate` → `Deflate`
    /// - それ以外 (多重コーディングを含む) → `UnsupportedContentEncoding`
    pub fn from_headers(headers: &Headers) -> Result<Self, Error> {
        let values = headers.get_all("Content-Encoding");
        if values.is_empty() {
            return Ok(ContentCoding::Identity);
        }
        let joined = values.join(", ");

        let mut selected = ContentCoding::Identity;
        for token in joined.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let coding = match token.to_ascii_lowercase().as_str() {
                "identity" => continue,
                "gzip" | "x-gzip" => ContentCoding::Gzip,
                "deflate" => ContentCoding::Deflate,
                _ => return Err(Error::UnsupportedContentEncoding(joined.clone())),
            };
            if selected != ContentCoding::Identity {
                // 多重コーディングは未対応
                return Err(Error::UnsupportedContentEncoding(joined.clone()));
            }
            selected = coding;
        }
        Ok(selected)
    }
}
