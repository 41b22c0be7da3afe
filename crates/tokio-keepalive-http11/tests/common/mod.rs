//! ループバックのテストサーバー
//!
//! リクエストを 1 つ読むごとに、用意したレスポンスを順番に返す。

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_keepalive_http11::Endpoint;

/// 返すレスポンス
pub struct Scripted {
    bytes: Vec<u8>,
    close: bool,
    respond: bool,
}

impl Scripted {
    /// レスポンスを返して接続を維持する
    pub fn reply(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            close: false,
            respond: true,
        }
    }

    /// レスポンスを返して接続を閉じる
    pub fn reply_and_close(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            close: true,
            respond: true,
        }
    }

    /// 何も返さずに待ち続ける
    pub fn silence() -> Self {
        Self {
            bytes: Vec::new(),
            close: false,
            respond: false,
        }
    }
}

/// `Content-Length` 付きの 200 レスポンス
pub fn ok(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

pub struct TestServer {
    addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TestServer {
    pub async fn start(script: Vec<Scripted>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(VecDeque::from(script)));

        let server_accepts = accepts.clone();
        let server_requests = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                server_accepts.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, script.clone(), server_requests.clone()));
            }
        });

        Self {
            addr,
            accepts,
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.addr.port(), path)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port(), false)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// 受け付けた接続数
    pub fn accept_count(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    /// 受信したリクエスト (ヘッダーとボディ)
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .collect()
    }
}

async fn serve(
    mut stream: TcpStream,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
) {
    let mut buf = Vec::new();
    loop {
        let Some(request) = read_request(&mut stream, &mut buf).await else {
            return;
        };
        requests.lock().unwrap().push(request);

        let Some(next) = script.lock().unwrap().pop_front() else {
            return;
        };
        if !next.respond {
            // 読み取りタイムアウトの確認用
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            return;
        }
        if stream.write_all(&next.bytes).await.is_err() {
            return;
        }
        if next.close {
            let _ = stream.shutdown().await;
            return;
        }
    }
}

/// リクエストを 1 つ読む (Content-Length または chunked)
async fn read_request(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let head_end = loop {
        if let Some(pos) = find(buf, b"\r\n\r\n") {
            break pos + 4;
        }
        fill(stream, buf).await?;
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());
    let chunked = head
        .lines()
        .any(|line| line.starts_with("transfer-encoding:") && line.contains("chunked"));

    let end = if chunked {
        loop {
            if let Some(pos) = find(&buf[head_end..], b"0\r\n\r\n") {
                let end = head_end + pos + 5;
                let at_chunk_start = pos == 0 || buf[head_end + pos - 1] == b'\n';
                if at_chunk_start {
                    break end;
                }
            }
            fill(stream, buf).await?;
        }
    } else {
        let end = head_end + content_length.unwrap_or(0);
        while buf.len() < end {
            fill(stream, buf).await?;
        }
        end
    };

    Some(buf.drain(..end).collect())
}

async fn fill(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<()> {
    let mut chunk = [0u8; 4096];
    match stream.read(&mut chunk).await {
        Ok(0) | Err(_) => None,
        Ok(n) => {
            buf.extend_from_slice(&chunk[..n]);
            Some(())
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
