//! PBT テスト共通ユーティリティ

use proptest::prelude::*;

// ========================================
// HTTP 要素の生成
// ========================================

/// token 文字
pub fn token_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('A', 'Z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('.'),
    ]
}

/// token (1 文字以上)
pub fn token_string(max_len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(token_char(), 1..=max_len)
        .prop_map(|chars| chars.into_iter().collect())
}

/// ヘッダー値 (前後の空白なし)
pub fn header_value() -> impl Strategy<Value = String> {
    "[!-~]([ -~]{0,30}[!-~])?".prop_map(|s| s)
}

/// ヘッダーリスト
pub fn header_list() -> impl Strategy<Value = Vec<(String, String)>> {
    proptest::collection::vec((token_string(24), header_value()), 0..8)
}

/// ボディ
pub fn body_bytes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..512)
}

/// ホスト名
pub fn hostname() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}(\\.[a-z][a-z0-9-]{0,15}){0,3}".prop_map(|s| s)
}

/// origin-form のリクエストターゲット
pub fn target() -> impl Strategy<Value = String> {
    (
        proptest::collection::vec("[a-zA-Z0-9._~-]{1,12}", 0..4),
        proptest::option::of("[a-zA-Z0-9=&]{1,24}"),
    )
        .prop_map(|(segments, query)| {
            let mut target = format!("/{}", segments.join("/"));
            if let Some(query) = query {
                target.push('?');
                target.push_str(&query);
            }
            target
        })
}

// ========================================
// 入力の分割
// ========================================

/// `data` を `cuts` の位置で分割する
pub fn split_at_cuts(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts
        .iter()
        .map(|c| if data.is_empty() { 0 } else { c % data.len() })
        .collect();
    points.sort_unstable();
    points.dedup();

    let mut pieces = Vec::new();
    let mut start = 0;
    for point in points {
        if point > start {
            pieces.push(data[start..point].to_vec());
            start = point;
        }
    }
    pieces.push(data[start..].to_vec());
    pieces
}

/// 任意の分割位置
pub fn cuts() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(any::<usize>(), 0..8)
}
