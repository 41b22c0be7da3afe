//! ボディの転送フレーミングとデコーダー
//!
//! デコーダーは接続側が所有する受信バッファを直接読み進める。
//! ボディに属するバイトだけを消費し、それ以降のデータはバッファに残す。

use crate::error::Error;
use crate::headers::Headers;
use crate::limits::DecoderLimits;

use super::phase::ChunkedPhase;

/// ボディの転送フレーミング
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// ボディなし
    Empty,
    /// Content-Length で指定された固定長
    ContentLength(u64),
    /// Transfer-Encoding: chunked
    Chunked,
}

impl BodyFraming {
    /// レスポンスヘッダーからフレーミングを決定
    ///
    /// 1. Transfer-Encoding がある場合は chunked のみ受け付ける
    /// 2. Content-Length がある場合は固定長
    /// 3. どちらもない場合はボディなし
    pub fn from_headers(headers: &Headers) -> Result<Self, Error> {
        if parse_transfer_encoding_chunked(headers)? {
            return Ok(BodyFraming::Chunked);
        }
        match parse_content_length(headers)? {
            Some(0) | None => Ok(BodyFraming::Empty),
            Some(len) => Ok(BodyFraming::ContentLength(len)),
        }
    }
}

/// ボディデコードの進捗
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyProgress {
    /// まだデータがある (追加の入力が必要)
    Continue,
    /// 完了
    Complete,
}

/// 転送デコーダー
///
/// フレーミングごとに閉じた列挙型で表現する。
#[derive(Debug)]
pub enum TransferDecoder {
    /// ボディなし
    Empty,
    /// 指定バイト数で打ち切る
    LengthLimited { remaining: u64 },
    /// chunked
    Chunked(ChunkedDecoder),
}

impl TransferDecoder {
    /// フレーミングからデコーダーを作成
    pub fn new(framing: BodyFraming) -> Self {
        Self::with_limits(framing, DecoderLimits::default())
    }

    /// 制限付きでデコーダーを作成
    pub fn with_limits(framing: BodyFraming, limits: DecoderLimits) -> Self {
        match framing {
            BodyFraming::Empty => TransferDecoder::Empty,
            BodyFraming::ContentLength(len) => TransferDecoder::LengthLimited { remaining: len },
            BodyFraming::Chunked => TransferDecoder::Chunked(ChunkedDecoder::with_limits(limits)),
        }
    }

    /// `buf` からボディを読み進め、ペイロードを `out` に追記する
    ///
    /// `Continue` の場合は `buf` にデータを追加して再度呼ぶ。
    pub fn decode(&mut self, buf: &mut Vec<u8>, out: &mut Vec<u8>) -> Result<BodyProgress, Error> {
        match self {
            TransferDecoder::Empty => Ok(BodyProgress::Complete),
            TransferDecoder::LengthLimited { remaining } => {
                let n = take_up_to(buf, out, *remaining);
                *remaining -= n;
                if *remaining == 0 {
                    Ok(BodyProgress::Complete)
                } else {
                    Ok(BodyProgress::Continue)
                }
            }
            TransferDecoder::Chunked(decoder) => decoder.decode(buf, out),
        }
    }

    /// ボディをすべて読み終えたかどうか
    pub fn is_complete(&self) -> bool {
        match self {
            TransferDecoder::Empty => true,
            TransferDecoder::LengthLimited { remaining } => *remaining == 0,
            TransferDecoder::Chunked(decoder) => decoder.is_complete(),
        }
    }

    /// トレーラーを取り出す (chunked 以外は常に空)
    pub fn take_trailers(&mut self) -> Headers {
        match self {
            TransferDecoder::Chunked(decoder) => std::mem::take(&mut decoder.trailers),
            _ => Headers::new(),
        }
    }
}

/// chunked デコーダー
#[derive(Debug)]
pub struct ChunkedDecoder {
    phase: ChunkedPhase,
    trailers: Headers,
    limits: DecoderLimits,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    /// 新しいデコーダーを作成
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    /// 制限付きでデコーダーを作成
    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            phase: ChunkedPhase::Size,
            trailers: Headers::new(),
            limits,
        }
    }

    /// 終端チャンクとトレーラーまで読み終えたかどうか
    pub fn is_complete(&self) -> bool {
        matches!(self.phase, ChunkedPhase::Complete)
    }

    /// 受信したトレーラー
    pub fn trailers(&self) -> &Headers {
        &self.trailers
    }

    /// `buf` からチャンクを読み進め、チャンクデータを `out` に追記する
    pub fn decode(&mut self, buf: &mut Vec<u8>, out: &mut Vec<u8>) -> Result<BodyProgress, Error> {
        loop {
            match &mut self.phase {
                ChunkedPhase::Size => {
                    let Some(pos) = find_line(buf) else {
                        check_partial_line(buf, self.limits.max_chunk_line_size, |size, limit| {
                            Error::ChunkLineTooLong { size, limit }
                        })?;
                        return Ok(BodyProgress::Continue);
                    };
                    if pos > self.limits.max_chunk_line_size {
                        return Err(Error::ChunkLineTooLong {
                            size: pos,
                            limit: self.limits.max_chunk_line_size,
                        });
                    }
                    let size = parse_chunk_size(&buf[..pos])?;
                    buf.drain(..pos + 2);
                    self.phase = if size == 0 {
                        ChunkedPhase::Trailer
                    } else {
                        ChunkedPhase::Data { remaining: size }
                    };
                }
                ChunkedPhase::Data { remaining } => {
                    let n = take_up_to(buf, out, *remaining);
                    *remaining -= n;
                    if *remaining > 0 {
                        return Ok(BodyProgress::Continue);
                    }
                    self.phase = ChunkedPhase::DataCrlf;
                }
                ChunkedPhase::DataCrlf => {
                    if buf.len() < 2 {
                        return Ok(BodyProgress::Continue);
                    }
                    if buf[..2] != *b"\r\n" {
                        return Err(Error::InvalidData(
                            "invalid chunked encoding: expected CRLF after chunk data".to_string(),
                        ));
                    }
                    buf.drain(..2);
                    self.phase = ChunkedPhase::Size;
                }
                ChunkedPhase::Trailer => {
                    let Some(pos) = find_line(buf) else {
                        check_partial_line(buf, self.limits.max_header_line_size, |size, limit| {
                            Error::HeaderLineTooLong { size, limit }
                        })?;
                        return Ok(BodyProgress::Continue);
                    };
                    if pos == 0 {
                        buf.drain(..2);
                        self.phase = ChunkedPhase::Complete;
                        continue;
                    }
                    if pos > self.limits.max_header_line_size {
                        return Err(Error::HeaderLineTooLong {
                            size: pos,
                            limit: self.limits.max_header_line_size,
                        });
                    }
                    if self.trailers.len() >= self.limits.max_headers_count {
                        return Err(Error::TooManyHeaders {
                            count: self.trailers.len() + 1,
                            limit: self.limits.max_headers_count,
                        });
                    }
                    let line = line_to_string(&buf[..pos])?;
                    buf.drain(..pos + 2);
                    let (name, value) = parse_header_line(&line)?;
                    self.trailers.append(&name, &value);
                }
                ChunkedPhase::Complete => return Ok(BodyProgress::Complete),
            }
        }
    }
}

/// `buf` の先頭から最大 `limit` バイトを `out` に移す
fn take_up_to(buf: &mut Vec<u8>, out: &mut Vec<u8>, limit: u64) -> u64 {
    let n = usize::try_from(limit).map_or(buf.len(), |limit| buf.len().min(limit));
    out.extend(buf.drain(..n));
    n as u64
}

/// チャンクサイズ行をパース (拡張は無視)
fn parse_chunk_size(line: &[u8]) -> Result<u64, Error> {
    let line = line_to_string(line)?;
    let size_str = line.split(';').next().unwrap_or(&line).trim();
    if size_str.is_empty() || !size_str.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidData(format!("invalid chunk size: {}", size_str)));
    }
    u64::from_str_radix(size_str, 16)
        .map_err(|_| Error::InvalidData(format!("chunk size overflow: {}", size_str)))
}

/// CRLF がまだ届いていない行の長さを検査する
pub(crate) fn check_partial_line(
    buf: &[u8],
    limit: usize,
    too_long: impl FnOnce(usize, usize) -> Error,
) -> Result<(), Error> {
    // 末尾の CR は CRLF の前半の可能性がある
    let size = buf.len() - usize::from(buf.last() == Some(&b'\r'));
    if size > limit {
        return Err(too_long(size, limit));
    }
    Ok(())
}

/// CRLF で終わる行を探す
pub(crate) fn find_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// 行を UTF-8 文字列に変換
pub(crate) fn line_to_string(line: &[u8]) -> Result<String, Error> {
    String::from_utf8(line.to_vec()).map_err(|e| Error::InvalidData(format!("invalid UTF-8: {e}")))
}

/// ヘッダー行をパース
///
/// obs-fold の継続行は呼び出し側で処理する。
pub(crate) fn parse_header_line(line: &str) -> Result<(String, String), Error> {
    if line.contains('\r') || line.contains('\n') {
        return Err(Error::InvalidData(
            "invalid header line: contains CR/LF".to_string(),
        ));
    }

    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| Error::InvalidData("invalid header line: missing colon".to_string()))?;
    if name.is_empty() {
        return Err(Error::InvalidData(
            "invalid header line: empty name".to_string(),
        ));
    }
    if !is_valid_header_name(name) {
        return Err(Error::InvalidData(
            "invalid header line: invalid name".to_string(),
        ));
    }

    let value = value.trim_matches([' ', '\t']);
    if !is_valid_field_value(value) {
        return Err(Error::InvalidData(
            "invalid header line: invalid value (contains control characters)".to_string(),
        ));
    }

    Ok((name.to_string(), value.to_string()))
}

/// ヘッダー名が有効か確認
pub(crate) fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_token_char)
}

/// トークン文字か確認
pub(crate) fn is_token_char(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'0'..=b'9' | b'A'..=b'Z' | b'^' | b'_' | b'`' | b'a'..=b'z' | b'|' | b'~'
    )
}

/// ヘッダー値が有効か確認 (RFC 9110 Section 5.5)
///
/// 制御文字 (0x00-0x08, 0x0A-0x1F, 0x7F) を含む場合は無効
pub(crate) fn is_valid_field_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| matches!(b, 0x09 | 0x20..=0x7E | 0x80..=0xFF))
}

/// Transfer-Encoding ヘッダーを解析
///
/// chunked 単独のみ受け付け、それ以外は値を添えてエラーにする。
/// 複数の Transfer-Encoding ヘッダーは連結して単一のリストとして扱う。
pub(crate) fn parse_transfer_encoding_chunked(headers: &Headers) -> Result<bool, Error> {
    let values = headers.get_all("Transfer-Encoding");
    if values.is_empty() {
        return Ok(false);
    }

    let joined = values.join(", ");
    let tokens: Vec<&str> = joined.split(',').map(str::trim).collect();
    match tokens.as_slice() {
        [token] if token.eq_ignore_ascii_case("chunked") => Ok(true),
        _ => Err(Error::UnsupportedTransferEncoding(joined.trim().to_string())),
    }
}

/// Content-Length ヘッダーを解析
///
/// 同じ値の重複は許容し、異なる値が並ぶ場合はエラーにする。
pub(crate) fn parse_content_length(headers: &Headers) -> Result<Option<u64>, Error> {
    let mut value: Option<u64> = None;
    for raw_value in headers.get_all("Content-Length") {
        for part in raw_value.split(',') {
            let parsed = parse_content_length_value(part)?;
            match value {
                Some(prev) if prev != parsed => {
                    return Err(Error::InvalidData(
                        "invalid Content-Length: mismatched values".to_string(),
                    ));
                }
                _ => value = Some(parsed),
            }
        }
    }
    Ok(value)
}

/// Content-Length 値をパース
fn parse_content_length_value(input: &str) -> Result<u64, Error> {
    let input = input.trim();
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidData(
            "invalid Content-Length: not a number".to_string(),
        ));
    }
    input
        .parse::<u64>()
        .map_err(|_| Error::InvalidData("invalid Content-Length: overflow".to_string()))
}
