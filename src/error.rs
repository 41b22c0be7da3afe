use std::fmt;

/// HTTP パースエラー
///
/// ピアから受信したデータが不正な場合や、サポートしていない
/// エンコーディングが指定された場合に返す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 不正なデータ
    InvalidData(String),
    /// 不正なステータス行
    InvalidStatusLine(String),
    /// ヘッダー数超過
    TooManyHeaders { count: usize, limit: usize },
    /// ヘッダー行が長すぎる
    HeaderLineTooLong { size: usize, limit: usize },
    /// チャンクサイズ行が長すぎる
    ChunkLineTooLong { size: usize, limit: usize },
    /// chunked 以外の Transfer-Encoding
    UnsupportedTransferEncoding(String),
    /// gzip / deflate 以外の Content-Encoding
    UnsupportedContentEncoding(String),
}

impl Error {
    /// サポート外のエンコーディングによるエラーかどうか
    pub fn is_unsupported_encoding(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedTransferEncoding(_) | Error::UnsupportedContentEncoding(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            Error::InvalidStatusLine(line) => write!(f, "invalid status line: {:?}", line),
            Error::TooManyHeaders { count, limit } => {
                write!(f, "too many headers: {} > {}", count, limit)
            }
            Error::HeaderLineTooLong { size, limit } => {
                write!(f, "header line too long: {} > {}", size, limit)
            }
            Error::ChunkLineTooLong { size, limit } => {
                write!(f, "chunk line too long: {} > {}", size, limit)
            }
            Error::UnsupportedTransferEncoding(value) => {
                write!(f, "unsupported Transfer-Encoding: {}", value)
            }
            Error::UnsupportedContentEncoding(value) => {
                write!(f, "unsupported Content-Encoding: {}", value)
            }
        }
    }
}

impl std::error::Error for Error {}
