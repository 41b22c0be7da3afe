//! tokio-keepalive-http11 エラー型

use std::fmt;

/// API の誤用
///
/// 状態を変更せずに返す。呼び出し側のバグとして扱う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// 前のリクエスト/レスポンスが終わっていない
    RequestInFlight,
    /// ヘッダーは送信済み
    HeadersAlreadySent,
    /// ヘッダーを二重に書き込もうとした
    HeadAlreadyWritten,
    /// 書き込んだボディ長が Content-Length と一致しない
    BodyLengthMismatch { expected: u64, written: u64 },
    /// 不正なヘッダー名または値
    InvalidHeader(String),
    /// 不正なメソッドまたはリクエストターゲット
    InvalidRequestLine(String),
    /// デコード済みボディと生ボディを混在して読もうとした
    MixedBodyAccess,
    /// finalize 後にボディを読もうとした
    BodyAfterFinalize,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::RequestInFlight => write!(f, "another request is in flight on this client"),
            UsageError::HeadersAlreadySent => write!(f, "headers have already been sent"),
            UsageError::HeadAlreadyWritten => write!(f, "request head has already been written"),
            UsageError::BodyLengthMismatch { expected, written } => write!(
                f,
                "body length mismatch: expected {} bytes, written {}",
                expected, written
            ),
            UsageError::InvalidHeader(name) => write!(f, "invalid header: {}", name),
            UsageError::InvalidRequestLine(line) => write!(f, "invalid request line: {:?}", line),
            UsageError::MixedBodyAccess => {
                write!(f, "decoded body and raw body cannot be mixed")
            }
            UsageError::BodyAfterFinalize => write!(f, "body read after response was finalized"),
        }
    }
}

impl std::error::Error for UsageError {}

/// JSON パースエラー
#[derive(Debug)]
pub enum JsonError {
    /// UTF-8 デコードエラー
    Utf8(std::str::Utf8Error),
    /// JSON パースエラー
    Parse(nojson::JsonParseError),
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonError::Utf8(e) => write!(f, "UTF-8 decode error: {}", e),
            JsonError::Parse(e) => write!(f, "JSON parse error: {}", e),
        }
    }
}

impl std::error::Error for JsonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JsonError::Utf8(e) => Some(e),
            JsonError::Parse(e) => Some(e),
        }
    }
}

/// tokio-keepalive-http11 エラー
#[derive(Debug)]
pub enum Error {
    /// I/O エラー
    Io(std::io::Error),
    /// HTTP パースエラー (サポート外のエンコーディングを含む)
    Http(keepalive_http11::Error),
    /// TLS エラー
    Tls(String),
    /// 接続または読み取りのタイムアウト
    Timeout,
    /// プールからクライアントを取得できなかった
    PoolTimeout,
    /// 接続が閉じられた
    ConnectionClosed,
    /// 不正な URL
    InvalidUrl(String),
    /// gzip / deflate の展開エラー
    Decompression(std::io::Error),
    /// ボディが UTF-8 ではない
    Utf8(std::string::FromUtf8Error),
    /// JSON エラー
    Json(JsonError),
    /// API の誤用
    Usage(UsageError),
}

impl Error {
    /// API の誤用によるエラーかどうか
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }

    /// タイムアウトによるエラーかどうか
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout | Error::PoolTimeout)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Tls(e) => write!(f, "TLS error: {}", e),
            Error::Timeout => write!(f, "timeout"),
            Error::PoolTimeout => write!(f, "timed out waiting for a pooled connection"),
            Error::ConnectionClosed => write!(f, "connection closed"),
            Error::InvalidUrl(msg) => write!(f, "invalid URL: {}", msg),
            Error::Decompression(e) => write!(f, "decompression error: {}", e),
            Error::Utf8(e) => write!(f, "UTF-8 decode error: {}", e),
            Error::Json(e) => write!(f, "{}", e),
            Error::Usage(e) => write!(f, "usage error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Decompression(e) => Some(e),
            Error::Utf8(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Usage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<keepalive_http11::Error> for Error {
    fn from(e: keepalive_http11::Error) -> Self {
        Error::Http(e)
    }
}

impl From<keepalive_http11::uri::UriError> for Error {
    fn from(e: keepalive_http11::uri::UriError) -> Self {
        Error::InvalidUrl(e.to_string())
    }
}

impl From<UsageError> for Error {
    fn from(e: UsageError) -> Self {
        Error::Usage(e)
    }
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Self {
        Error::Json(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Error::Tls(e.to_string())
    }
}

impl From<rustls_pki_types::InvalidDnsNameError> for Error {
    fn from(e: rustls_pki_types::InvalidDnsNameError) -> Self {
        Error::Tls(e.to_string())
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
