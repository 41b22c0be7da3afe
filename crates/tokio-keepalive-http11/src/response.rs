//! レスポンスとボディの読み取り
//!
//! ボディは遅延してデコードする。最初に [`Response::body_reader`] を呼んだときに
//! 転送デコード (chunked / Content-Length) とコンテントデコード (gzip / deflate) を組み立て、
//! ボディを読み終えた時点でレスポンスを自動的に finalize する。

use std::io;
use std::ops::DerefMut;
use std::pin::Pin;
use std::task::{Context, Poll};

use keepalive_http11::content_encoding::ContentCoding;
use keepalive_http11::{
    BodyFraming, BodyProgress, Headers, ResponseHead, ResponseHeadDecoder, TransferDecoder,
    Version,
};
use tokio::io::{AsyncRead, ReadBuf};

use crate::client::{Client, Connection};
use crate::decode::ContentDecoder;
use crate::error::{Error, JsonError, Result, UsageError};

/// デコードパイプライン
struct Pipeline {
    transfer: TransferDecoder,
    content: ContentDecoder,
}

enum BodyState {
    /// まだ読み始めていない
    Unread,
    /// デコード中
    Decoding(Box<Pipeline>),
    /// 生ボディとして渡した
    Raw,
    /// 終了 (読み終えた、または finalize した)
    Done,
}

/// デコードの 1 ステップの結果
enum Step {
    Output(Vec<u8>),
    NeedMore,
    End,
}

/// HTTP レスポンス
///
/// ボディを読み終えるか [`Response::finalize`] を呼ぶとクライアントを解放する。
/// ボディを読み終えており、サーバーがキープアライブを許可していれば接続を再利用する。
pub struct Response<H>
where
    H: DerefMut<Target = Client>,
{
    head: ResponseHead,
    keep_alive: bool,
    client: Option<H>,
    body: BodyState,
    body_complete: bool,
    trailers: Headers,
}

async fn read_head(client: &mut Client) -> Result<ResponseHead> {
    let mut decoder = ResponseHeadDecoder::with_limits(client.options().get_limits().clone());
    loop {
        match decoder.decode(client.read_buf_mut()?)? {
            Some(head) if head.is_informational() && head.status_code != 101 => {
                tracing::trace!(status = head.status_code, "skipping interim response");
            }
            Some(head) => return Ok(head),
            None => client.fill_buf().await?,
        }
    }
}

impl<H> Response<H>
where
    H: DerefMut<Target = Client>,
{
    /// レスポンスヘッダーを受信する
    ///
    /// HEAD リクエストへの応答、および 1xx / 204 / 304 はボディなしとしてその場で finalize する。
    pub(crate) async fn receive(mut client: H, is_head: bool) -> Result<Self> {
        let head = match read_head(&mut client).await {
            Ok(head) => head,
            Err(e) => {
                client.abort();
                return Err(e);
            }
        };

        // 101 Switching Protocols の後は HTTP/1.1 として再利用できない
        let keep_alive = head.is_keep_alive() && head.status_code != 101;
        let has_body = !is_head && head.status_has_body();

        let mut response = Self {
            head,
            keep_alive,
            client: Some(client),
            body: BodyState::Unread,
            body_complete: false,
            trailers: Headers::new(),
        };
        if !has_body {
            response.body = BodyState::Done;
            response.body_complete = true;
            response.finalize();
        }
        Ok(response)
    }

    /// レスポンスヘッダー
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// ステータスコード
    pub fn status_code(&self) -> u16 {
        self.head.status_code
    }

    /// ステータスフレーズ
    pub fn reason_phrase(&self) -> Option<&str> {
        self.head.reason_phrase.as_deref()
    }

    /// HTTP バージョン
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// ヘッダー
    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    /// サーバーがキープアライブを許可しているか
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// chunked ボディのトレーラー
    ///
    /// ボディを読み終えるまでは空。
    pub fn trailers(&self) -> &Headers {
        &self.trailers
    }

    /// finalize 済みか (クライアントを解放したか)
    pub fn is_finalized(&self) -> bool {
        self.client.is_none()
    }

    /// ボディリーダーを取得
    ///
    /// 最初の呼び出しでデコードパイプラインを組み立てる。以降の呼び出しは同じパイプラインを使う。
    /// サポート外の Transfer-Encoding / Content-Encoding の場合は接続を閉じて finalize し、
    /// エラーを返す。
    pub fn body_reader(&mut self) -> Result<BodyReader<'_, H>> {
        self.ensure_pipeline()?;
        Ok(BodyReader {
            response: self,
            pending: Vec::new(),
            offset: 0,
        })
    }

    /// ボディをすべて読み取る
    pub async fn bytes(&mut self) -> Result<Vec<u8>> {
        self.body_reader()?.read_to_end().await
    }

    /// ボディを UTF-8 文字列として読み取る
    pub async fn text(&mut self) -> Result<String> {
        String::from_utf8(self.bytes().await?).map_err(Error::Utf8)
    }

    /// ボディを JSON としてパースして型 T に変換
    pub async fn read_json<T>(&mut self) -> Result<T>
    where
        for<'text, 'raw> T:
            TryFrom<nojson::RawJsonValue<'text, 'raw>, Error = nojson::JsonParseError>,
    {
        let body = self.bytes().await?;
        let text = std::str::from_utf8(&body).map_err(JsonError::Utf8)?;
        let raw = nojson::RawJson::parse(text).map_err(JsonError::Parse)?;
        let value: T = raw.value().try_into().map_err(JsonError::Parse)?;
        Ok(value)
    }

    /// 残りのボディを読み捨てて finalize する
    ///
    /// 転送デコードだけを行うため、サポート外の Content-Encoding でも接続を再利用できる。
    pub async fn drop_body(&mut self) -> Result<()> {
        if self.client.is_none() {
            return Ok(());
        }
        match self.body {
            BodyState::Raw | BodyState::Done => {
                self.finalize();
                return Ok(());
            }
            BodyState::Unread => {
                let framing = match BodyFraming::from_headers(&self.head.headers) {
                    Ok(framing) => framing,
                    Err(e) => {
                        self.abort();
                        return Err(e.into());
                    }
                };
                self.body = BodyState::Decoding(Box::new(Pipeline {
                    transfer: self.transfer_decoder(framing),
                    content: ContentDecoder::new(ContentCoding::Identity),
                }));
            }
            BodyState::Decoding(_) => {}
        }

        loop {
            match self.discard_step() {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            }
            self.fill_buf().await?;
        }
    }

    /// 生ボディを取得
    ///
    /// 受信済みのバイトに続けて接続から直接読む。デコードは行わない。
    /// 呼び出し側はボディをちょうど読み切ってから [`Response::finalize`] を呼ぶこと。
    pub fn raw_body(&mut self) -> Result<RawBody<'_>> {
        match self.body {
            BodyState::Decoding(_) => return Err(UsageError::MixedBodyAccess.into()),
            BodyState::Done => return Err(UsageError::BodyAfterFinalize.into()),
            BodyState::Unread | BodyState::Raw => {}
        }
        let client = self
            .client
            .as_deref_mut()
            .ok_or(Error::Usage(UsageError::BodyAfterFinalize))?;
        let connection = client.connection_mut()?;
        self.body = BodyState::Raw;
        // 読み切るのは呼び出し側の責任
        self.body_complete = true;
        Ok(RawBody { connection })
    }

    /// レスポンスを完了してクライアントを解放する (冪等)
    ///
    /// ボディを読み終えていて、サーバーがキープアライブを許可している場合だけ接続を再利用する。
    /// それ以外は接続を閉じる。
    pub fn finalize(&mut self) {
        let Some(mut client) = self.client.take() else {
            return;
        };
        if !self.body_complete {
            self.body = BodyState::Done;
        }
        let reusable = self.body_complete && self.keep_alive;
        tracing::debug!(
            endpoint = %client.endpoint(),
            status = self.head.status_code,
            reusable,
            "response finalized"
        );
        client.release(reusable);
    }

    /// 接続を閉じて finalize する
    fn abort(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.abort();
        }
        if !self.body_complete {
            self.body = BodyState::Done;
        }
    }

    fn transfer_decoder(&self, framing: BodyFraming) -> TransferDecoder {
        let limits = match self.client.as_deref() {
            Some(client) => client.options().get_limits().clone(),
            None => Default::default(),
        };
        TransferDecoder::with_limits(framing, limits)
    }

    fn ensure_pipeline(&mut self) -> Result<()> {
        match self.body {
            BodyState::Raw => Err(UsageError::MixedBodyAccess.into()),
            BodyState::Done if !self.body_complete => Err(UsageError::BodyAfterFinalize.into()),
            BodyState::Decoding(_) | BodyState::Done => Ok(()),
            BodyState::Unread => {
                if self.client.is_none() {
                    return Err(UsageError::BodyAfterFinalize.into());
                }
                match self.build_pipeline() {
                    Ok(pipeline) => {
                        self.body = BodyState::Decoding(Box::new(pipeline));
                        Ok(())
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "failed to build body pipeline");
                        self.abort();
                        Err(e)
                    }
                }
            }
        }
    }

    fn build_pipeline(&self) -> Result<Pipeline> {
        let framing = BodyFraming::from_headers(&self.head.headers)?;
        let coding = ContentCoding::from_headers(&self.head.headers)?;
        Ok(Pipeline {
            transfer: self.transfer_decoder(framing),
            content: ContentDecoder::new(coding),
        })
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        self.ensure_pipeline()?;
        loop {
            match self.decode_step() {
                Ok(Step::Output(data)) => return Ok(Some(data)),
                Ok(Step::End) => return Ok(None),
                Ok(Step::NeedMore) => {}
                Err(e @ Error::Usage(_)) => return Err(e),
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            }
            self.fill_buf().await?;
        }
    }

    /// 受信済みのバイトをデコードする
    fn decode_step(&mut self) -> Result<Step> {
        let pipeline = match &mut self.body {
            BodyState::Decoding(pipeline) => pipeline,
            BodyState::Done if self.body_complete => return Ok(Step::End),
            BodyState::Done | BodyState::Unread => {
                return Err(UsageError::BodyAfterFinalize.into());
            }
            BodyState::Raw => return Err(UsageError::MixedBodyAccess.into()),
        };
        let client = self.client.as_deref_mut().ok_or(Error::ConnectionClosed)?;

        let mut raw = Vec::new();
        let progress = pipeline.transfer.decode(client.read_buf_mut()?, &mut raw)?;

        let mut out = Vec::new();
        if !raw.is_empty() {
            pipeline
                .content
                .push(&raw, &mut out)
                .map_err(Error::Decompression)?;
        }

        if progress == BodyProgress::Complete {
            pipeline
                .content
                .finish(&mut out)
                .map_err(Error::Decompression)?;
            self.trailers = pipeline.transfer.take_trailers();
            self.body = BodyState::Done;
            self.body_complete = true;
            self.finalize();
            return Ok(if out.is_empty() {
                Step::End
            } else {
                Step::Output(out)
            });
        }

        if out.is_empty() {
            return Ok(Step::NeedMore);
        }
        Ok(Step::Output(out))
    }

    /// 受信済みのバイトを転送デコードして捨てる。完了したら true
    fn discard_step(&mut self) -> Result<bool> {
        let BodyState::Decoding(pipeline) = &mut self.body else {
            return Ok(true);
        };
        let client = self.client.as_deref_mut().ok_or(Error::ConnectionClosed)?;

        let mut sink = Vec::new();
        let progress = pipeline.transfer.decode(client.read_buf_mut()?, &mut sink)?;
        if progress == BodyProgress::Complete {
            self.trailers = pipeline.transfer.take_trailers();
            self.body = BodyState::Done;
            self.body_complete = true;
            self.finalize();
            return Ok(true);
        }
        Ok(false)
    }

    async fn fill_buf(&mut self) -> Result<()> {
        let result = match self.client.as_deref_mut() {
            Some(client) => client.fill_buf().await,
            None => Err(Error::ConnectionClosed),
        };
        if result.is_err() {
            self.abort();
        }
        result
    }
}

impl<H> Drop for Response<H>
where
    H: DerefMut<Target = Client>,
{
    fn drop(&mut self) {
        if let Some(mut client) = self.client.take() {
            tracing::warn!(
                endpoint = %client.endpoint(),
                status = self.head.status_code,
                "response dropped without finalize, closing connection"
            );
            client.abort();
        }
    }
}

/// デコード済みボディのリーダー
pub struct BodyReader<'a, H>
where
    H: DerefMut<Target = Client>,
{
    response: &'a mut Response<H>,
    pending: Vec<u8>,
    offset: usize,
}

impl<H> BodyReader<'_, H>
where
    H: DerefMut<Target = Client>,
{
    /// `buf` に読み込む。ボディの終わりでは 0 を返す
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.offset >= self.pending.len() {
            match self.response.next_chunk().await? {
                Some(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }

    /// デコード済みのチャンクを 1 つ読む。ボディの終わりでは `None` を返す
    pub async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.offset < self.pending.len() {
            let rest = self.pending.split_off(self.offset);
            self.pending.clear();
            self.offset = 0;
            return Ok(Some(rest));
        }
        self.response.next_chunk().await
    }

    /// 残りのボディをすべて読む
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        while let Some(chunk) = self.read_chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// 生ボディ
///
/// 受信バッファに残っているバイトを先に返し、その後は接続から直接読む。
pub struct RawBody<'a> {
    connection: &'a mut Connection,
}

impl AsyncRead for RawBody<'_> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let connection = &mut *self.get_mut().connection;
        if !connection.read_buf.is_empty() {
            let n = buf.remaining().min(connection.read_buf.len());
            buf.put_slice(&connection.read_buf[..n]);
            connection.read_buf.drain(..n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut connection.transport).poll_read(cx, buf)
    }
}
