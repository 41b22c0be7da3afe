//! デコード状態の定義

/// ヘッダーデコード状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HeadPhase {
    /// ステータス行待ち
    StatusLine,
    /// ヘッダー待ち
    Headers,
    /// 完了
    Complete,
}

/// chunked ボディのデコード状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChunkedPhase {
    /// チャンクサイズ行待ち
    Size,
    /// チャンクデータ待ち
    Data { remaining: u64 },
    /// チャンクデータ後の CRLF 待ち
    DataCrlf,
    /// トレーラーヘッダー待ち
    Trailer,
    /// 完了
    Complete,
}
