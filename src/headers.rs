//! ヘッダーリスト
//!
//! 挿入順を保持し、名前は大文字小文字を区別せずに扱う。

/// HTTP ヘッダーリスト
///
/// - `set`: 同名ヘッダーを置き換える (最後の書き込みが勝つ)。位置は最初のエントリを保持する
/// - `append`: 同名ヘッダーを残したまま追加する (受信ヘッダー用)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// 空のヘッダーリストを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ヘッダーを設定
    ///
    /// 既存の同名ヘッダーがあれば最初のエントリの値を置き換え、
    /// 残りの同名エントリは削除する。
    pub fn set(&mut self, name: &str, value: &str) {
        let mut replaced = false;
        self.entries.retain_mut(|(n, v)| {
            if !n.eq_ignore_ascii_case(name) {
                return true;
            }
            if replaced {
                return false;
            }
            replaced = true;
            *n = name.to_string();
            *v = value.to_string();
            true
        });
        if !replaced {
            self.append(name, value);
        }
    }

    /// ヘッダーを追加 (同名ヘッダーを置き換えない)
    pub fn append(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// 指定した名前のヘッダーをすべて削除
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    /// ヘッダーを取得 (大文字小文字を区別しない)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 指定した名前のヘッダーをすべて取得
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// ヘッダーが存在するか確認
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// ヘッダー名と値が送信可能か確認
    ///
    /// 名前は token、値は制御文字 (CR / LF を含む) を含まないこと。
    pub fn is_valid_field(name: &str, value: &str) -> bool {
        crate::decoder::is_valid_header_name(name) && crate::decoder::is_valid_field_value(value)
    }

    /// 最後に追加したヘッダーの値に追記する (obs-fold 用)
    pub(crate) fn extend_last_value(&mut self, continuation: &str) -> bool {
        match self.entries.last_mut() {
            Some((_, value)) => {
                if !value.is_empty() && !continuation.is_empty() {
                    value.push(' ');
                }
                value.push_str(continuation);
                true
            }
            None => false,
        }
    }

    /// 最後に追加したヘッダーの名前と値の合計長
    pub(crate) fn last_line_len(&self) -> usize {
        self.entries
            .last()
            .map(|(n, v)| n.len() + 2 + v.len())
            .unwrap_or(0)
    }

    /// エントリ数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 挿入順にイテレート
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}
