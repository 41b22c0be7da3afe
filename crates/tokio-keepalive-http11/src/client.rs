//! 接続先ごとのクライアント状態機械
//!
//! 1 つのクライアントは同時に 1 つのリクエスト/レスポンスだけを扱う。
//! 接続は遅延して確立し、キープアライブで再利用する。
//!
//! ```text
//! Disconnected --request()--> Requesting --send()--> AwaitingResponse
//!       ^                         |                         |
//!       |                   (drop: 未送信)            finalize()
//!       |                         v                         v
//!       +------ 障害 / close --- Connected <-------- (再利用可能)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use keepalive_http11::uri::Endpoint;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result, UsageError};
use crate::options::ClientOptions;
use crate::request::RequestWriter;
use crate::transport::Transport;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// 受信時の読み取り単位
const READ_CHUNK_SIZE: usize = 8192;

/// クライアントの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// 接続なし (次のリクエストで接続する)
    Disconnected,
    /// 接続済み、アイドル
    Connected,
    /// リクエスト書き込み中
    Requesting,
    /// レスポンス待ち、またはレスポンスボディ読み取り中
    AwaitingResponse,
}

/// キープアライブ接続
pub(crate) struct Connection {
    id: u64,
    pub(crate) transport: Transport,
    /// 受信済みで未消費のバイト
    pub(crate) read_buf: Vec<u8>,
    last_used: Instant,
}

impl Connection {
    fn new(transport: Transport) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            transport,
            read_buf: Vec::new(),
            last_used: Instant::now(),
        }
    }

    /// 再利用できない理由を返す
    async fn stale_reason(&mut self, idle_timeout: Option<Duration>) -> Option<&'static str> {
        if idle_timeout.is_some_and(|timeout| self.last_used.elapsed() > timeout) {
            return Some("idle timeout");
        }
        if !self.read_buf.is_empty() {
            return Some("unread bytes");
        }

        // 待たずに読んでみて、ピアが閉じていないか確認する
        let mut probe = [0u8; 1];
        match tokio::time::timeout(Duration::ZERO, self.transport.read(&mut probe)).await {
            Err(_) => None,
            Ok(Ok(0)) => Some("closed by peer"),
            Ok(Ok(_)) => Some("unexpected data"),
            Ok(Err(_)) => Some("transport error"),
        }
    }
}

/// HTTP/1.1 クライアント
///
/// 接続先 ([`Endpoint`]) ごとに 1 つのキープアライブ接続を管理する。
/// 直接使う場合は `&mut Client` を、プール経由の場合は [`crate::PooledClient`] を使う。
pub struct Client {
    endpoint: Endpoint,
    options: Arc<ClientOptions>,
    connection: Option<Connection>,
    state: ClientState,
    connect_count: u64,
}

impl Client {
    /// 新しいクライアントを作成
    ///
    /// 接続は最初のリクエストまで確立しない。
    pub fn new(endpoint: Endpoint, options: Arc<ClientOptions>) -> Self {
        Self {
            endpoint,
            options,
            connection: None,
            state: ClientState::Disconnected,
            connect_count: 0,
        }
    }

    /// ホストとポートを指定してクライアントを作成
    ///
    /// `use_tls` が true の場合は HTTPS で接続する。I/O は行わない。
    pub fn open(host: &str, port: u16, use_tls: bool) -> Self {
        Self::new(
            Endpoint::new(host, port, use_tls),
            Arc::new(ClientOptions::default()),
        )
    }

    /// 設定を差し替える (ビルダーパターン)
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    /// リクエストを開始する
    ///
    /// 前のリクエスト/レスポンスが終わっていない場合は
    /// `UsageError::RequestInFlight` を返す。
    /// 接続がない、または再利用できない場合は接続し直す。
    pub async fn request(
        &mut self,
        method: &str,
        target: &str,
    ) -> Result<RequestWriter<&mut Client>> {
        RequestWriter::start(self, method, target).await
    }

    /// 接続を閉じる
    pub async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            tracing::debug!(
                endpoint = %self.endpoint,
                connection_id = connection.id,
                "disconnect"
            );
            if let Err(e) = connection.transport.shutdown().await {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    connection_id = connection.id,
                    error = %e,
                    "shutdown failed"
                );
            }
        }
        self.state = ClientState::Disconnected;
    }

    /// 接続先
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// 現在の状態
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// 現在の接続の ID (接続がない場合は `None`)
    ///
    /// 同じ ID であれば同じトランスポートを再利用している。
    pub fn connection_id(&self) -> Option<u64> {
        self.connection.as_ref().map(|c| c.id)
    }

    /// これまでに接続した回数
    pub fn connect_count(&self) -> u64 {
        self.connect_count
    }

    /// 設定
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// リクエスト開始前の状態確認と接続確保
    pub(crate) async fn begin_request(&mut self) -> Result<()> {
        match self.state {
            ClientState::Requesting | ClientState::AwaitingResponse => {
                return Err(UsageError::RequestInFlight.into());
            }
            ClientState::Disconnected | ClientState::Connected => {}
        }

        self.ensure_connected().await?;
        self.state = ClientState::Requesting;
        Ok(())
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.as_mut() {
            match connection.stale_reason(self.options.idle_timeout).await {
                None => return Ok(()),
                Some(reason) => {
                    tracing::debug!(
                        endpoint = %self.endpoint,
                        connection_id = connection.id,
                        reason,
                        "evicting stale connection"
                    );
                    self.connection = None;
                    self.state = ClientState::Disconnected;
                }
            }
        }

        let transport = Transport::connect(&self.endpoint, &self.options).await?;
        let connection = Connection::new(transport);
        self.connect_count += 1;
        tracing::debug!(
            endpoint = %self.endpoint,
            connection_id = connection.id,
            tls = connection.transport.is_tls(),
            connect_count = self.connect_count,
            "connected"
        );
        self.connection = Some(connection);
        self.state = ClientState::Connected;
        Ok(())
    }

    pub(crate) fn set_state(&mut self, state: ClientState) {
        self.state = state;
    }

    /// 接続を即座に閉じる (障害時、途中で放棄されたとき)
    pub(crate) fn abort(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::debug!(
                endpoint = %self.endpoint,
                connection_id = connection.id,
                "connection aborted"
            );
        }
        self.state = ClientState::Disconnected;
    }

    /// レスポンス完了時に呼ぶ
    ///
    /// 再利用可能ならアイドル状態に戻し、そうでなければ接続を閉じる。
    pub(crate) fn release(&mut self, reusable: bool) {
        match self.connection.as_mut() {
            Some(connection) if reusable => {
                connection.last_used = Instant::now();
                self.state = ClientState::Connected;
            }
            _ => self.abort(),
        }
    }

    pub(crate) fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.connection.as_mut().ok_or(Error::ConnectionClosed)
    }

    /// 受信バッファ
    pub(crate) fn read_buf_mut(&mut self) -> Result<&mut Vec<u8>> {
        Ok(&mut self.connection_mut()?.read_buf)
    }

    /// 送信する。失敗したら接続を閉じる
    pub(crate) async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let connection = self.connection_mut()?;
        let result = connection.transport.write_all(bytes).await;
        result.map_err(|e| {
            self.abort();
            Error::Io(e)
        })
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        let connection = self.connection_mut()?;
        let result = connection.transport.flush().await;
        result.map_err(|e| {
            self.abort();
            Error::Io(e)
        })
    }

    /// 受信バッファに追加で読み込む
    ///
    /// ピアが閉じた場合は `ConnectionClosed`。失敗したら接続を閉じる。
    pub(crate) async fn fill_buf(&mut self) -> Result<()> {
        let read_timeout = self.options.read_timeout;
        let connection = self.connection_mut()?;
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = connection.transport.read(&mut chunk);
        let result = match tokio::time::timeout(read_timeout, read).await {
            Ok(Ok(0)) => Err(Error::ConnectionClosed),
            Ok(Ok(n)) => {
                connection.read_buf.extend_from_slice(&chunk[..n]);
                return Ok(());
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(elapsed) => Err(elapsed.into()),
        };
        self.abort();
        result
    }
}
