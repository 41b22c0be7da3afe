//! URL パースとパーセントエンコーディング (RFC 3986)
//!
//! ## 概要
//!
//! `http` / `https` の絶対 URL を接続先 ([`Endpoint`]) と
//! origin-form のリクエストターゲットに分解する。
//!
//! ## 使い方
//!
//! ```rust
//! use keepalive_http11::uri::{Url, percent_encode};
//!
//! let url = Url::parse("https://example.com/path?query=value#fragment").unwrap();
//! assert_eq!(url.endpoint().host(), "example.com");
//! assert_eq!(url.endpoint().port(), 443);
//! assert!(url.endpoint().is_tls());
//! assert_eq!(url.target(), "/path?query=value");
//!
//! assert_eq!(percent_encode("hello world"), "hello%20world");
//! ```

use core::fmt;

/// URL パースエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// 空の URL
    Empty,
    /// 不正なポート番号
    InvalidPort,
    /// 不正な文字
    InvalidCharacter(char),
    /// 不正なスキーム (http / https 以外を含む)
    InvalidScheme,
    /// 不正なホスト
    InvalidHost,
}

impl fmt::Display for UriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriError::Empty => write!(f, "empty URL"),
            UriError::InvalidPort => write!(f, "invalid port"),
            UriError::InvalidCharacter(c) => write!(f, "invalid character: {:?}", c),
            UriError::InvalidScheme => write!(f, "invalid scheme (expected http or https)"),
            UriError::InvalidHost => write!(f, "invalid host"),
        }
    }
}

impl std::error::Error for UriError {}

/// 接続先 (ホスト, ポート, TLS)
///
/// コネクションプールのキーになる。ホスト名は小文字に正規化する。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
    tls: bool,
}

impl Endpoint {
    /// 新しい接続先を作成
    ///
    /// IPv6 アドレスは角括弧なしで渡す。
    pub fn new(host: &str, port: u16, tls: bool) -> Self {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        Self {
            host: host.to_ascii_lowercase(),
            port,
            tls,
        }
    }

    /// ホスト名
    pub fn host(&self) -> &str {
        &self.host
    }

    /// ポート番号
    pub fn port(&self) -> u16 {
        self.port
    }

    /// TLS を使うかどうか
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// スキーム
    pub fn scheme(&self) -> &'static str {
        if self.tls { "https" } else { "http" }
    }

    /// スキームのデフォルトポート
    pub fn default_port(&self) -> u16 {
        if self.tls { 443 } else { 80 }
    }

    /// Host ヘッダーの値
    ///
    /// RFC 9110 Section 7.2: デフォルトポートの場合はポートを省略する
    pub fn host_header_value(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme(), self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme(), self.host, self.port)
        }
    }
}

/// パース済み URL
///
/// ```text
///   https://example.com:8443/over/there?name=ferret#nose
///   \___/   \______________/\_____________________/
///     |            |                  |
///   scheme     authority     target (fragment は除去)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    endpoint: Endpoint,
    target: String,
}

impl Url {
    /// 絶対 URL をパース
    pub fn parse(input: &str) -> Result<Self, UriError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(UriError::Empty);
        }

        let (scheme, rest) = input.split_once("://").ok_or(UriError::InvalidScheme)?;
        let tls = if scheme.eq_ignore_ascii_case("https") {
            true
        } else if scheme.eq_ignore_ascii_case("http") {
            false
        } else {
            return Err(UriError::InvalidScheme);
        };

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, remainder) = rest.split_at(authority_end);
        let (host, port) = parse_authority(authority)?;
        let port = port.unwrap_or(if tls { 443 } else { 80 });

        // フラグメントはサーバーに送らない
        let remainder = remainder
            .split_once('#')
            .map_or(remainder, |(before, _)| before);
        if let Some(c) = remainder.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(UriError::InvalidCharacter(c));
        }
        let target = if remainder.starts_with('/') {
            remainder.to_string()
        } else {
            format!("/{}", remainder)
        };

        Ok(Url {
            endpoint: Endpoint::new(host, port, tls),
            target,
        })
    }

    /// 接続先
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// origin-form のリクエストターゲット (path + query)
    pub fn target(&self) -> &str {
        &self.target
    }

    /// 接続先とターゲットに分解
    pub fn into_parts(self) -> (Endpoint, String) {
        (self.endpoint, self.target)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.endpoint, self.target)
    }
}

/// authority をパース
/// 戻り値: (host, port)
fn parse_authority(authority: &str) -> Result<(&str, Option<u16>), UriError> {
    if authority.contains('@') {
        // userinfo は受け付けない
        return Err(UriError::InvalidHost);
    }

    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        // IPv6 アドレス
        let (host, after) = bracketed.split_once(']').ok_or(UriError::InvalidHost)?;
        if host.is_empty() || !host.bytes().all(|b| b.is_ascii_hexdigit() || b == b':' || b == b'.') {
            return Err(UriError::InvalidHost);
        }
        let port = match after {
            "" => None,
            _ => Some(after.strip_prefix(':').ok_or(UriError::InvalidHost)?),
        };
        (host, port)
    } else {
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        };
        if host.is_empty() {
            return Err(UriError::InvalidHost);
        }
        if let Some(c) = host
            .chars()
            .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')))
        {
            return Err(UriError::InvalidCharacter(c));
        }
        (host, port)
    };

    let port = match port {
        // "host:" はデフォルトポート
        None | Some("") => None,
        Some(port) => {
            if !port.bytes().all(|b| b.is_ascii_digit()) {
                return Err(UriError::InvalidPort);
            }
            match port.parse::<u16>() {
                Ok(0) | Err(_) => return Err(UriError::InvalidPort),
                Ok(port) => Some(port),
            }
        }
    };

    Ok((host, port))
}

/// パーセントエンコーディング対象外の文字 (unreserved characters)
/// RFC 3986 Section 2.3
fn is_unreserved(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'.' || c == b'_' || c == b'~'
}

/// パーセントエンコーディング
///
/// RFC 3986 Section 2.1 に基づき、unreserved 文字以外をパーセントエンコードします。
///
/// ```rust
/// use keepalive_http11::uri::percent_encode;
///
/// assert_eq!(percent_encode("foo=bar&baz=qux"), "foo%3Dbar%26baz%3Dqux");
/// assert_eq!(percent_encode("日本語"), "%E6%97%A5%E6%9C%AC%E8%AA%9E");
/// ```
pub fn percent_encode(input: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut result = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        if is_unreserved(byte) {
            result.push(byte as char);
        } else {
            result.push('%');
            result.push(HEX[usize::from(byte >> 4)] as char);
            result.push(HEX[usize::from(byte & 0x0F)] as char);
        }
    }
    result
}
