//! リクエストヘッダー

use crate::encoder::encode_request_head;
use crate::headers::Headers;

/// HTTP リクエストヘッダー (ボディなし)
///
/// バージョンは常に `HTTP/1.1`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// メソッド (GET, POST, etc.)
    pub method: String,
    /// リクエストターゲット (origin-form)
    pub target: String,
    /// ヘッダー
    pub headers: Headers,
}

impl RequestHead {
    /// 新しいリクエストヘッダーを作成
    ///
    /// 空のターゲットは `/` として扱う。
    pub fn new(method: &str, target: &str) -> Self {
        let target = if target.is_empty() { "/" } else { target };
        Self {
            method: method.to_string(),
            target: target.to_string(),
            headers: Headers::new(),
        }
    }

    /// リクエスト行として送信可能か確認
    ///
    /// メソッドは token、ターゲットは空白と制御文字を含まないこと。
    pub fn is_valid_request_line(method: &str, target: &str) -> bool {
        crate::decoder::is_valid_header_name(method)
            && !target
                .bytes()
                .any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
    }

    /// ヘッダーを設定 (ビルダーパターン)
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.set(name, value);
        self
    }

    /// ターゲットにクエリパラメーターを追加
    ///
    /// 名前と値はパーセントエンコードされる。
    pub fn append_query(&mut self, name: &str, value: &str) {
        let separator = if self.target.contains('?') { '&' } else { '?' };
        self.target.push(separator);
        self.target.push_str(&crate::uri::percent_encode(name));
        self.target.push('=');
        self.target.push_str(&crate::uri::percent_encode(value));
    }

    /// HEAD リクエストか確認
    pub fn is_head(&self) -> bool {
        self.method.eq_ignore_ascii_case("HEAD")
    }

    /// リクエストヘッダーをバイト列にエンコード
    pub fn encode(&self) -> Vec<u8> {
        encode_request_head(self)
    }
}
