//! tokio_keepalive_http11 - Tokio integration for keepalive_http11
//!
//! tokio と tokio-rustls を使用した、キープアライブ接続を再利用する非同期 HTTP/1.1 クライアント。
//!
//! ## 特徴
//!
//! - **keepalive_http11 ベース**: Sans I/O ライブラリをベースにした設計
//! - **コネクションプール**: 接続先 (ホスト, ポート, TLS) ごとにクライアントを再利用
//! - **状態機械**: 1 つのクライアントで同時に 1 つのリクエストだけを扱い、誤用はエラーで返す
//! - **遅延デコード**: chunked / Content-Length と gzip / deflate をボディ読み取り時に展開
//! - **TLS 対応**: tokio-rustls による HTTPS 対応 (OS のルート証明書を使用)
//!
//! ## プール
//!
//! ```ignore
//! use tokio_keepalive_http11::Pool;
//!
//! let pool = Pool::default();
//! let mut response = pool
//!     .perform_request("GET", "https://example.com/search", |writer| {
//!         writer.append_query("q", "rust")?;
//!         writer.set_header("Accept", "application/json")
//!     })
//!     .await?;
//! let body = response.text().await?;
//! ```
//!
//! ## クライアント
//!
//! ```ignore
//! use tokio_keepalive_http11::Client;
//!
//! let mut client = Client::open("example.com", 443, true);
//! let mut writer = client.request("POST", "/upload").await?;
//! writer.write_chunk(b"hello ").await?;
//! writer.write_chunk(b"world").await?;
//! let mut response = writer.send().await?;
//! response.drop_body().await?;
//! ```

pub mod client;
mod decode;
pub mod error;
pub mod options;
pub mod pool;
pub mod request;
pub mod response;
mod transport;

pub use client::{Client, ClientState};
pub use error::{Error, JsonError, Result, UsageError};
pub use options::{ClientOptions, DEFAULT_USER_AGENT, PoolOptions};
pub use pool::{Pool, PooledClient};
pub use request::RequestWriter;
pub use response::{BodyReader, RawBody, Response};

// keepalive_http11 の型を re-export
pub use keepalive_http11::uri::{Endpoint, Url};
pub use keepalive_http11::{DecoderLimits, Headers, ResponseHead, Version};
