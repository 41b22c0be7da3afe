//! 接続先ごとのコネクションプール
//!
//! ```ignore
//! use tokio_keepalive_http11::{Pool, PoolOptions};
//!
//! let pool = Pool::new(PoolOptions::default());
//!
//! // GET
//! let mut response = pool.get("http://example.com/items").await?;
//! let body = response.text().await?;
//!
//! // ヘッダーを設定して POST
//! let mut writer = pool.request("POST", "http://example.com/items").await?;
//! writer.set_header("Content-Type", "application/json")?;
//! writer.write_bytes(b"{\"name\":\"a\"}", None).await?;
//! let mut response = writer.send().await?;
//! response.drop_body().await?;
//! ```

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use keepalive_http11::uri::{Endpoint, Url};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::client::{Client, ClientState};
use crate::error::{Error, Result};
use crate::options::{ClientOptions, PoolOptions};
use crate::request::RequestWriter;
use crate::response::Response;

/// 接続先ごとのアイドルクライアントと同時利用数の上限
struct EndpointSlots {
    idle: Mutex<Vec<Client>>,
    permits: Option<Arc<Semaphore>>,
}

impl EndpointSlots {
    fn new(max_connections: Option<usize>) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            permits: max_connections.map(|max| Arc::new(Semaphore::new(max))),
        }
    }

    /// 最後に返却されたクライアントを取り出す
    fn pop_idle(&self) -> Option<Client> {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    fn push_idle(&self, client: Client) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(client);
    }

    fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct PoolInner {
    options: PoolOptions,
    client_options: Arc<ClientOptions>,
    endpoints: Mutex<HashMap<Endpoint, Arc<EndpointSlots>>>,
}

/// コネクションプール
///
/// 複製しても同じプールを共有する。
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new(PoolOptions::default())
    }
}

impl Pool {
    /// 新しいプールを作成
    pub fn new(options: PoolOptions) -> Self {
        let client_options = Arc::new(options.client.clone());
        Self {
            inner: Arc::new(PoolInner {
                options,
                client_options,
                endpoints: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// 接続先のクライアントを取得
    ///
    /// アイドルクライアントがあれば最後に返却されたものを再利用し、なければ新しく作る。
    /// 同時利用数の上限に達している場合は `acquire_timeout` まで待ち、
    /// 超えたら `Error::PoolTimeout` を返す。
    pub async fn acquire(&self, endpoint: &Endpoint) -> Result<PooledClient> {
        let slots = self.slots(endpoint);

        let permit = match &slots.permits {
            Some(permits) => {
                let acquire = permits.clone().acquire_owned();
                let permit = tokio::time::timeout(self.inner.options.acquire_timeout, acquire)
                    .await
                    .map_err(|_| Error::PoolTimeout)?
                    .map_err(|_| Error::ConnectionClosed)?;
                Some(permit)
            }
            None => None,
        };

        let (client, reused) = match slots.pop_idle() {
            Some(client) => (client, true),
            None => (
                Client::new(endpoint.clone(), self.inner.client_options.clone()),
                false,
            ),
        };
        tracing::trace!(endpoint = %endpoint, reused, "checkout");

        Ok(PooledClient {
            client: Some(client),
            slots,
            _permit: permit,
        })
    }

    /// URL に対するリクエストを開始
    pub async fn request(&self, method: &str, url: &str) -> Result<RequestWriter<PooledClient>> {
        let (endpoint, target) = Url::parse(url)?.into_parts();
        let client = self.acquire(&endpoint).await?;
        RequestWriter::start(client, method, &target).await
    }

    /// リクエストを設定して送信し、レスポンスを受け取る
    ///
    /// `configure` でヘッダーやクエリを設定する。
    pub async fn perform_request<F>(
        &self,
        method: &str,
        url: &str,
        configure: F,
    ) -> Result<Response<PooledClient>>
    where
        F: FnOnce(&mut RequestWriter<PooledClient>) -> Result<()>,
    {
        let mut writer = self.request(method, url).await?;
        configure(&mut writer)?;
        writer.send().await
    }

    /// GET リクエストを送信
    pub async fn get(&self, url: &str) -> Result<Response<PooledClient>> {
        self.request("GET", url).await?.send().await
    }

    /// 接続先のアイドルクライアント数
    pub fn idle_count(&self, endpoint: &Endpoint) -> usize {
        self.endpoints()
            .get(endpoint)
            .map_or(0, |slots| slots.idle_count())
    }

    /// 登録済みの接続先数
    pub fn endpoint_count(&self) -> usize {
        self.endpoints().len()
    }

    /// すべてのアイドルクライアントを破棄する
    ///
    /// 貸し出し中のクライアントは返却時に破棄される接続先の一覧から外れる。
    pub fn clear(&self) {
        let drained: Vec<_> = self.endpoints().drain().collect();
        for (endpoint, slots) in drained {
            let mut guard = slots.idle.lock().unwrap_or_else(PoisonError::into_inner);
            let idle = std::mem::take(&mut *guard);
            drop(guard);
            tracing::debug!(endpoint = %endpoint, idle = idle.len(), "pool cleared");
        }
    }

    fn endpoints(&self) -> std::sync::MutexGuard<'_, HashMap<Endpoint, Arc<EndpointSlots>>> {
        self.inner
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn slots(&self, endpoint: &Endpoint) -> Arc<EndpointSlots> {
        let max = self.inner.options.max_connections_per_endpoint;
        self.endpoints()
            .entry(endpoint.clone())
            .or_insert_with(|| Arc::new(EndpointSlots::new(max)))
            .clone()
    }
}

/// プールから取り出したクライアント
///
/// 破棄時にプールへ返却する。リクエストの途中で破棄された場合は接続を閉じてから返却する。
pub struct PooledClient {
    client: Option<Client>,
    slots: Arc<EndpointSlots>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Deref for PooledClient {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client.as_ref().expect("client taken")
    }
}

impl DerefMut for PooledClient {
    fn deref_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("client taken")
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        let Some(mut client) = self.client.take() else {
            return;
        };
        if matches!(
            client.state(),
            ClientState::Requesting | ClientState::AwaitingResponse
        ) {
            client.abort();
        }
        tracing::trace!(
            endpoint = %client.endpoint(),
            connection_id = ?client.connection_id(),
            "checkin"
        );
        self.slots.push_idle(client);
    }
}
