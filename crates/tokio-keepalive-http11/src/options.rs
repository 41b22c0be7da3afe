//! クライアントとプールの設定

use std::sync::Arc;
use std::time::Duration;

use keepalive_http11::DecoderLimits;
use rustls::ClientConfig;

/// デフォルトの User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("tokio_keepalive_http11/", env!("CARGO_PKG_VERSION"));

/// クライアント設定
#[derive(Clone)]
pub struct ClientOptions {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) tls_config: Option<Arc<ClientConfig>>,
    pub(crate) user_agent: String,
    pub(crate) limits: DecoderLimits,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientOptions {
    /// デフォルト設定を作成
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            idle_timeout: Some(Duration::from_secs(90)),
            tls_config: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            limits: DecoderLimits::default(),
        }
    }

    /// 接続タイムアウトを設定 (TCP 接続と TLS ハンドシェイクを含む)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 読み取りタイムアウトを設定
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// アイドル接続を破棄するまでの時間を設定
    ///
    /// `None` の場合はアイドル時間で破棄しない。
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// TLS 設定を指定 (HTTPS 用)
    ///
    /// 指定しない場合は OS のルート証明書ストアを使用する。
    pub fn tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// User-Agent を設定
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// レスポンスデコーダーの制限を設定
    pub fn limits(mut self, limits: DecoderLimits) -> Self {
        self.limits = limits;
        self
    }

    /// 接続タイムアウト
    pub fn get_connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// 読み取りタイムアウト
    pub fn get_read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// アイドルタイムアウト
    pub fn get_idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// User-Agent
    pub fn get_user_agent(&self) -> &str {
        &self.user_agent
    }

    /// デコーダーの制限
    pub fn get_limits(&self) -> &DecoderLimits {
        &self.limits
    }
}

/// コネクションプール設定
#[derive(Clone)]
pub struct PoolOptions {
    pub(crate) max_connections_per_endpoint: Option<usize>,
    pub(crate) acquire_timeout: Duration,
    pub(crate) client: ClientOptions,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolOptions {
    /// デフォルト設定を作成
    pub fn new() -> Self {
        Self {
            max_connections_per_endpoint: Some(8),
            acquire_timeout: Duration::from_secs(30),
            client: ClientOptions::new(),
        }
    }

    /// 接続先ごとの最大同時クライアント数を設定
    ///
    /// `None` の場合は無制限。
    pub fn max_connections_per_endpoint(mut self, max: Option<usize>) -> Self {
        self.max_connections_per_endpoint = max;
        self
    }

    /// プールからクライアントを取得するまでの最大待ち時間を設定
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// プールが作成するクライアントの設定
    pub fn client_options(mut self, options: ClientOptions) -> Self {
        self.client = options;
        self
    }
}
