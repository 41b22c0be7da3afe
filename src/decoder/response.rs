//! HTTP レスポンスヘッダーデコーダー

use crate::error::Error;
use crate::headers::Headers;
use crate::limits::DecoderLimits;

use super::body::{check_partial_line, find_line, line_to_string, parse_header_line};
use super::head::{ResponseHead, Version};
use super::phase::HeadPhase;

/// HTTP レスポンスヘッダーデコーダー (Sans I/O)
///
/// 接続側が所有する受信バッファからステータス行とヘッダーブロックを読み取る。
/// ヘッダーブロックの直後のバイト (ボディ) はバッファに残す。
///
/// ```rust
/// use keepalive_http11::ResponseHeadDecoder;
///
/// let mut decoder = ResponseHeadDecoder::new();
/// let mut buf = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec();
/// let head = decoder.decode(&mut buf).unwrap().unwrap();
/// assert_eq!(head.status_code, 200);
/// assert_eq!(head.headers.get("content-length"), Some("5"));
/// assert_eq!(buf, b"hello");
/// ```
#[derive(Debug)]
pub struct ResponseHeadDecoder {
    phase: HeadPhase,
    status: Option<(Version, u16, Option<String>)>,
    headers: Headers,
    limits: DecoderLimits,
}

impl Default for ResponseHeadDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseHeadDecoder {
    /// 新しいデコーダーを作成
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    /// 制限付きでデコーダーを作成
    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            phase: HeadPhase::StatusLine,
            status: None,
            headers: Headers::new(),
            limits,
        }
    }

    /// 制限設定を取得
    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    /// デコーダーをリセット
    pub fn reset(&mut self) {
        self.phase = HeadPhase::StatusLine;
        self.status = None;
        self.headers = Headers::new();
    }

    /// ヘッダーをデコード
    ///
    /// ヘッダーブロックが完了したら `Some(ResponseHead)` を返す。
    /// データ不足の場合は `None` を返す。`buf` に追記して再度呼ぶ。
    pub fn decode(&mut self, buf: &mut Vec<u8>) -> Result<Option<ResponseHead>, Error> {
        loop {
            if self.phase == HeadPhase::Complete {
                // 前のレスポンスのヘッダーは返却済み、次のメッセージへ
                self.reset();
            }

            let limit = self.limits.max_header_line_size;
            let Some(pos) = find_line(buf) else {
                check_partial_line(buf, limit, |size, limit| Error::HeaderLineTooLong {
                    size,
                    limit,
                })?;
                return Ok(None);
            };
            if pos > limit {
                return Err(Error::HeaderLineTooLong { size: pos, limit });
            }

            match self.phase {
                HeadPhase::StatusLine => {
                    let line = String::from_utf8_lossy(&buf[..pos]).into_owned();
                    buf.drain(..pos + 2);

                    // RFC 9112 Section 2.2: ステータス行の前の空行は無視する
                    if line.is_empty() {
                        continue;
                    }
                    self.status = Some(ResponseHead::parse_status_line(&line)?);
                    self.phase = HeadPhase::Headers;
                }
                HeadPhase::Headers | HeadPhase::Complete => {
                    let line = line_to_string(&buf[..pos])?;
                    buf.drain(..pos + 2);

                    if line.is_empty() {
                        return self.finish().map(Some);
                    }

                    if line.starts_with([' ', '\t']) {
                        // obs-fold: 直前のヘッダー値に SP 1 つで連結する
                        let continuation = line.trim_matches([' ', '\t']);
                        if !self.headers.extend_last_value(continuation) {
                            return Err(Error::InvalidData(
                                "invalid header line: obs-fold without preceding header"
                                    .to_string(),
                            ));
                        }
                        let size = self.headers.last_line_len();
                        if size > limit {
                            return Err(Error::HeaderLineTooLong { size, limit });
                        }
                        continue;
                    }

                    if self.headers.len() >= self.limits.max_headers_count {
                        return Err(Error::TooManyHeaders {
                            count: self.headers.len() + 1,
                            limit: self.limits.max_headers_count,
                        });
                    }
                    let (name, value) = parse_header_line(&line)?;
                    self.headers.append(&name, &value);
                }
            }
        }
    }

    fn finish(&mut self) -> Result<ResponseHead, Error> {
        let (version, status_code, reason_phrase) = self
            .status
            .take()
            .ok_or_else(|| Error::InvalidData("missing status line".to_string()))?;
        self.phase = HeadPhase::Complete;
        Ok(ResponseHead {
            version,
            status_code,
            reason_phrase,
            headers: std::mem::take(&mut self.headers),
        })
    }
}
