//! HTTP レスポンスヘッダー型の定義

use std::fmt;

use crate::error::Error;
use crate::headers::Headers;

/// HTTP バージョン
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const HTTP_10: Version = Version { major: 1, minor: 0 };
    pub const HTTP_11: Version = Version { major: 1, minor: 1 };

    /// `HTTP/<major>.<minor>` をパース
    ///
    /// RFC 9112 Section 2.3: HTTP-version = HTTP-name "/" DIGIT "." DIGIT
    pub fn parse(input: &str) -> Option<Self> {
        let digits = input.strip_prefix("HTTP/")?;
        let (major, minor) = digits.split_once('.')?;
        if major.len() != 1 || minor.len() != 1 {
            return None;
        }
        let major = major.bytes().next().filter(u8::is_ascii_digit)? - b'0';
        let minor = minor.bytes().next().filter(u8::is_ascii_digit)? - b'0';
        Some(Version { major, minor })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// レスポンスヘッダー (ボディなし)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP バージョン
    pub version: Version,
    /// ステータスコード (200, 404, etc.)
    pub status_code: u16,
    /// ステータスフレーズ (OK, Not Found, etc.)
    ///
    /// ステータス行にフレーズがない場合は `None`
    pub reason_phrase: Option<String>,
    /// ヘッダー
    pub headers: Headers,
}

impl ResponseHead {
    /// ステータス行をパース
    ///
    /// `HTTP/<major>.<minor> SP <status-code> [SP <reason-phrase>]`
    pub(crate) fn parse_status_line(line: &str) -> Result<(Version, u16, Option<String>), Error> {
        let invalid = || Error::InvalidStatusLine(line.to_string());

        let (version, rest) = line.split_once(' ').ok_or_else(invalid)?;
        let version = Version::parse(version).ok_or_else(invalid)?;

        let (code, phrase) = match rest.split_once(' ') {
            Some((code, phrase)) => (code, Some(phrase)),
            None => (rest, None),
        };
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let status_code: u16 = code.parse().map_err(|_| invalid())?;
        if !(100..=999).contains(&status_code) {
            return Err(invalid());
        }

        let phrase = phrase
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Ok((version, status_code, phrase))
    }

    /// ステータスコードからボディがあるかどうかを判定
    ///
    /// 1xx, 204, 304 はボディなし
    pub fn status_has_body(&self) -> bool {
        !(self.is_informational() || self.status_code == 204 || self.status_code == 304)
    }

    /// キープアライブ接続かどうかを判定
    ///
    /// RFC 9110 Section 9.1: 複数の Connection ヘッダーはリストとして結合して処理する。
    /// close トークンがいずれかのヘッダーに存在すれば false を返す。
    pub fn is_keep_alive(&self) -> bool {
        let mut has_keep_alive = false;

        for conn in self.headers.get_all("Connection") {
            for token in conn.split(',') {
                let token = token.trim();
                if token.eq_ignore_ascii_case("close") {
                    return false;
                }
                if token.eq_ignore_ascii_case("keep-alive") {
                    has_keep_alive = true;
                }
            }
        }

        has_keep_alive || self.version >= Version::HTTP_11
    }

    /// ステータスコードが成功 (2xx) か確認
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// ステータスコードが情報レスポンス (1xx) か確認
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.status_code)
    }
}
