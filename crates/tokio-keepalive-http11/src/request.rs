//! リクエストライター
//!
//! リクエスト行とヘッダーを組み立て、ボディのフレーミングを選んで送信する。

use std::ops::DerefMut;

use keepalive_http11::{Headers, LAST_CHUNK, RequestHead, encode_chunk};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::client::{Client, ClientState};
use crate::error::{Error, Result, UsageError};
use crate::response::Response;

/// ストリーム送信時の読み取り単位
const STREAM_CHUNK_SIZE: usize = 8192;

/// 送信中のボディのフレーミング
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutgoingBody {
    /// ボディなし
    None,
    /// Content-Length
    Fixed { expected: u64, written: u64 },
    /// Transfer-Encoding: chunked
    Chunked,
}

impl OutgoingBody {
    fn from_headers(headers: &Headers) -> Self {
        let chunked = headers
            .get_all("Transfer-Encoding")
            .iter()
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case("chunked"));
        if chunked {
            return OutgoingBody::Chunked;
        }
        match headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            Some(expected) => OutgoingBody::Fixed {
                expected,
                written: 0,
            },
            None => OutgoingBody::None,
        }
    }
}

/// ボディを伴うのが普通のメソッド
///
/// ヘッダーだけで送信する場合は `Content-Length: 0` を付ける。
fn expects_body(method: &str) -> bool {
    ["POST", "PUT", "PATCH"]
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method))
}

/// リクエストライター
///
/// [`Client::request`] または [`crate::Pool::request`] から取得する。
/// ヘッダーを編集し、ボディを書き込んでから [`RequestWriter::send`] でレスポンスを受け取る。
///
/// 何も書き込まずに破棄した場合はクライアントをアイドル状態に戻す。
/// 途中まで書き込んで破棄した場合は接続を閉じる。
pub struct RequestWriter<H>
where
    H: DerefMut<Target = Client>,
{
    client: Option<H>,
    head: RequestHead,
    body: OutgoingBody,
    head_written: bool,
    finalized: bool,
}

impl<H> RequestWriter<H>
where
    H: DerefMut<Target = Client>,
{
    /// リクエストを開始する
    ///
    /// デフォルトヘッダー (Host, User-Agent, Connection, Accept-Encoding) を設定する。
    pub(crate) async fn start(mut client: H, method: &str, target: &str) -> Result<Self> {
        if !RequestHead::is_valid_request_line(method, target) {
            return Err(UsageError::InvalidRequestLine(format!("{} {}", method, target)).into());
        }
        client.begin_request().await?;

        let head = RequestHead::new(method, target)
            .header("Host", &client.endpoint().host_header_value())
            .header("User-Agent", client.options().get_user_agent())
            .header("Connection", "keep-alive")
            .header("Accept-Encoding", "gzip, deflate");

        Ok(Self {
            client: Some(client),
            head,
            body: OutgoingBody::None,
            head_written: false,
            finalized: false,
        })
    }

    /// リクエストヘッダー
    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// ヘッダー
    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    /// ヘッダーを設定 (同名ヘッダーは置き換える)
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.ensure_head_pending(UsageError::HeadersAlreadySent)?;
        if !Headers::is_valid_field(name, value) {
            return Err(UsageError::InvalidHeader(name.to_string()).into());
        }
        self.head.headers.set(name, value);
        Ok(())
    }

    /// ヘッダーを削除
    pub fn remove_header(&mut self, name: &str) -> Result<bool> {
        self.ensure_head_pending(UsageError::HeadersAlreadySent)?;
        Ok(self.head.headers.remove(name))
    }

    /// クエリパラメーターを追加
    pub fn append_query(&mut self, name: &str, value: &str) -> Result<()> {
        self.ensure_head_pending(UsageError::HeadersAlreadySent)?;
        self.head.append_query(name, value);
        Ok(())
    }

    /// リクエストヘッダーを送信
    ///
    /// ボディのフレーミングは設定済みの Content-Length / Transfer-Encoding ヘッダーから決める。
    pub async fn write_head(&mut self) -> Result<()> {
        self.ensure_head_pending(UsageError::HeadAlreadyWritten)?;
        self.body = OutgoingBody::from_headers(&self.head.headers);
        let bytes = self.head.encode();
        self.head_written = true;
        self.client_mut()?.write_all(&bytes).await
    }

    /// ボディ全体を送信 (Content-Length)
    pub async fn write_bytes(&mut self, bytes: &[u8], content_type: Option<&str>) -> Result<()> {
        self.ensure_head_pending(UsageError::HeadAlreadyWritten)?;
        if let Some(content_type) = content_type {
            self.set_header("Content-Type", content_type)?;
        }
        self.head.headers.remove("Transfer-Encoding");
        self.head
            .headers
            .set("Content-Length", &bytes.len().to_string());
        self.write_head().await?;
        self.write_body(bytes).await
    }

    /// `len` バイトをストリームから送信 (Content-Length)
    ///
    /// ストリームが `len` バイトより短い場合は `UnexpectedEof` の I/O エラーになり、接続を閉じる。
    pub async fn write_stream<R>(&mut self, reader: R, len: u64) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.ensure_head_pending(UsageError::HeadAlreadyWritten)?;
        self.head.headers.remove("Transfer-Encoding");
        self.head.headers.set("Content-Length", &len.to_string());
        self.write_head().await?;

        let mut reader = reader.take(len);
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let mut remaining = len;
        while remaining > 0 {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                self.abort();
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("body stream ended {} bytes short", remaining),
                )));
            }
            self.write_body(&buf[..n]).await?;
            remaining -= n as u64;
        }
        Ok(())
    }

    /// ストリームが終わるまで chunked で送信
    pub async fn write_chunked<R>(&mut self, mut reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.ensure_head_pending(UsageError::HeadAlreadyWritten)?;
        self.start_chunked().await?;

        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            self.write_body(&buf[..n]).await?;
        }
    }

    /// チャンクを 1 つ送信
    ///
    /// 最初の呼び出しで `Transfer-Encoding: chunked` のヘッダーを送信する。
    /// 終端チャンクは [`RequestWriter::finalize`] が送信する。
    pub async fn write_chunk(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.head_written {
            self.start_chunked().await?;
        }
        if self.body != OutgoingBody::Chunked {
            return Err(UsageError::HeadAlreadyWritten.into());
        }
        self.write_body(bytes).await
    }

    /// ヘッダー送信後のボディを送信
    ///
    /// ヘッダーで選んだフレーミングに従う。Content-Length を超える場合は
    /// `UsageError::BodyLengthMismatch` を返す。
    pub async fn write_body(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.head_written {
            self.write_head().await?;
        }
        if self.finalized {
            return Err(UsageError::HeadAlreadyWritten.into());
        }
        if bytes.is_empty() {
            return Ok(());
        }

        match self.body {
            OutgoingBody::None => Err(UsageError::BodyLengthMismatch {
                expected: 0,
                written: bytes.len() as u64,
            }
            .into()),
            OutgoingBody::Fixed { expected, written } => {
                let total = written + bytes.len() as u64;
                if total > expected {
                    return Err(UsageError::BodyLengthMismatch {
                        expected,
                        written: total,
                    }
                    .into());
                }
                self.body = OutgoingBody::Fixed {
                    expected,
                    written: total,
                };
                self.client_mut()?.write_all(bytes).await
            }
            OutgoingBody::Chunked => {
                let chunk = encode_chunk(bytes);
                self.client_mut()?.write_all(&chunk).await
            }
        }
    }

    /// リクエストを完了する (冪等)
    ///
    /// - ヘッダー未送信なら送信する
    /// - chunked なら終端チャンクを送信する
    /// - Content-Length 分のボディが書き込まれていなければ `UsageError::BodyLengthMismatch`
    pub async fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }

        if !self.head_written {
            if self.body == OutgoingBody::None
                && OutgoingBody::from_headers(&self.head.headers) == OutgoingBody::None
                && expects_body(&self.head.method)
            {
                self.head.headers.set("Content-Length", "0");
            }
            self.write_head().await?;
        }

        match self.body {
            OutgoingBody::Fixed { expected, written } if written != expected => {
                return Err(UsageError::BodyLengthMismatch { expected, written }.into());
            }
            OutgoingBody::Chunked => {
                self.client_mut()?.write_all(LAST_CHUNK).await?;
            }
            OutgoingBody::Fixed { .. } | OutgoingBody::None => {}
        }

        self.client_mut()?.flush().await?;
        self.finalized = true;
        Ok(())
    }

    /// リクエストを完了してレスポンスを受信する
    pub async fn send(mut self) -> Result<Response<H>> {
        self.finalize().await?;
        let is_head = self.head.is_head();
        let mut client = self.client.take().ok_or(Error::ConnectionClosed)?;
        client.set_state(ClientState::AwaitingResponse);
        Response::receive(client, is_head).await
    }

    async fn start_chunked(&mut self) -> Result<()> {
        self.head.headers.remove("Content-Length");
        self.head.headers.set("Transfer-Encoding", "chunked");
        self.write_head().await
    }

    fn ensure_head_pending(&self, error: UsageError) -> Result<()> {
        if self.head_written {
            return Err(error.into());
        }
        Ok(())
    }

    fn client_mut(&mut self) -> Result<&mut Client> {
        self.client
            .as_deref_mut()
            .ok_or(Error::ConnectionClosed)
    }

    fn abort(&mut self) {
        if let Some(client) = self.client.as_deref_mut() {
            client.abort();
        }
    }
}

impl<H> Drop for RequestWriter<H>
where
    H: DerefMut<Target = Client>,
{
    fn drop(&mut self) {
        let head_written = self.head_written;
        let Some(client) = self.client.as_deref_mut() else {
            return;
        };
        if head_written {
            // 途中まで送信したリクエストは取り消せない
            client.abort();
        } else if client.state() == ClientState::Requesting {
            client.set_state(ClientState::Connected);
        }
    }
}
