mod common;

use std::io::Write;

use common::{Scripted, TestServer, ok};
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::io::AsyncReadExt;
use tokio_keepalive_http11::{Client, ClientState, Error, UsageError};

fn client_for(server: &TestServer) -> Client {
    Client::open("127.0.0.1", server.port(), false)
}

#[tokio::test]
async fn length_framing_stops_at_content_length() {
    let mut first = ok("hello");
    first.extend_from_slice(b"EXTRA");
    let server = TestServer::start(vec![Scripted::reply(first), Scripted::reply(ok("again"))]).await;
    let mut client = client_for(&server);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.bytes().await.unwrap(), b"hello");
    assert!(response.is_finalized());
    drop(response);
    assert_eq!(client.state(), ClientState::Connected);

    // 余分なバイトが残った接続は再利用しない
    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "again");
    drop(response);
    assert_eq!(client.connect_count(), 2);
    assert_eq!(server.accept_count(), 2);
}

#[tokio::test]
async fn chunked_round_trip() {
    let server = TestServer::start(vec![
        Scripted::reply(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n3\r\nabc\r\n0\r\n\r\n",
        ),
        Scripted::reply(ok("next")),
    ])
    .await;
    let mut client = client_for(&server);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    let mut reader = response.body_reader().unwrap();
    let mut body = Vec::new();
    let mut buf = [0u8; 3];
    loop {
        let n = reader.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    assert_eq!(body, b"helloabc");
    // 終端チャンクの後は何度読んでも終わり
    assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    assert_eq!(reader.read_chunk().await.unwrap(), None);
    assert!(response.is_finalized());
    drop(response);

    let connection_id = client.connection_id();
    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "next");
    drop(response);
    assert_eq!(client.connection_id(), connection_id);
    assert_eq!(server.accept_count(), 1);
}

#[tokio::test]
async fn gzip_over_chunked() {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut reply =
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Encoding: gzip\r\n\r\n".to_vec();
    for chunk in compressed.chunks(7) {
        reply.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        reply.extend_from_slice(chunk);
        reply.extend_from_slice(b"\r\n");
    }
    reply.extend_from_slice(b"0\r\n\r\n");

    let server = TestServer::start(vec![Scripted::reply(reply)]).await;
    let mut client = client_for(&server);
    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), text);
    assert!(response.is_finalized());
    drop(response);
    assert_eq!(client.state(), ClientState::Connected);
}

#[tokio::test]
async fn empty_gzip_body_is_reusable() {
    let empty = "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: 0\r\n\r\n";
    let server = TestServer::start(vec![Scripted::reply(empty), Scripted::reply(ok("next"))]).await;
    let mut client = client_for(&server);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.bytes().await.unwrap(), b"");
    assert!(response.is_finalized());
    drop(response);
    assert_eq!(client.state(), ClientState::Connected);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "next");
    drop(response);
    assert_eq!(client.connect_count(), 1);
}

#[tokio::test]
async fn head_response_has_no_body() {
    let server = TestServer::start(vec![
        Scripted::reply("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n"),
        Scripted::reply(ok("after head")),
    ])
    .await;
    let mut client = client_for(&server);

    let mut response = client.request("HEAD", "/").await.unwrap().send().await.unwrap();
    assert!(response.is_finalized());
    assert_eq!(response.headers().get("content-length"), Some("10"));
    assert_eq!(response.bytes().await.unwrap(), b"");
    drop(response);
    assert_eq!(client.state(), ClientState::Connected);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "after head");
    drop(response);
    assert_eq!(server.accept_count(), 1);
}

#[tokio::test]
async fn no_content_and_not_modified_have_no_body() {
    let server = TestServer::start(vec![
        Scripted::reply("HTTP/1.1 204 No Content\r\n\r\n"),
        Scripted::reply("HTTP/1.1 304 Not Modified\r\nContent-Length: 42\r\n\r\n"),
    ])
    .await;
    let mut client = client_for(&server);

    for expected in [204, 304] {
        let response = client.request("GET", "/").await.unwrap().send().await.unwrap();
        assert_eq!(response.status_code(), expected);
        assert!(response.is_finalized());
    }
    assert_eq!(server.accept_count(), 1);
}

#[tokio::test]
async fn interim_responses_are_skipped() {
    let server = TestServer::start(vec![Scripted::reply(
        "HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 103 Early Hints\r\nLink: </a.css>\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok",
    )])
    .await;
    let mut client = client_for(&server);
    let mut response = client.request("POST", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.status_code(), 201);
    assert_eq!(response.reason_phrase(), Some("Created"));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn unsupported_content_encoding_finalizes() {
    let server = TestServer::start(vec![
        Scripted::reply("HTTP/1.1 200 OK\r\nContent-Encoding: br\r\nContent-Length: 3\r\n\r\nabc"),
        Scripted::reply(ok("fresh")),
    ])
    .await;
    let mut client = client_for(&server);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    match response.body_reader() {
        Err(Error::Http(keepalive_http11::Error::UnsupportedContentEncoding(value))) => {
            assert_eq!(value, "br")
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("br must be rejected"),
    }
    assert!(response.is_finalized());
    drop(response);
    assert_eq!(client.state(), ClientState::Disconnected);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "fresh");
    drop(response);
    assert_eq!(server.accept_count(), 2);
}

#[tokio::test]
async fn unsupported_transfer_encoding_finalizes() {
    let server = TestServer::start(vec![Scripted::reply(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip, chunked\r\n\r\n",
    )])
    .await;
    let mut client = client_for(&server);
    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert!(matches!(
        response.bytes().await,
        Err(Error::Http(keepalive_http11::Error::UnsupportedTransferEncoding(_)))
    ));
    assert!(response.is_finalized());
}

#[tokio::test]
async fn drop_body_drains_and_reuses() {
    let server = TestServer::start(vec![
        Scripted::reply(ok("0123456789")),
        Scripted::reply(ok("second")),
    ])
    .await;
    let mut client = client_for(&server);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    response.drop_body().await.unwrap();
    assert!(response.is_finalized());
    drop(response);
    assert_eq!(client.state(), ClientState::Connected);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "second");
    drop(response);
    assert_eq!(server.accept_count(), 1);
}

#[tokio::test]
async fn drop_body_ignores_content_encoding() {
    let server = TestServer::start(vec![
        Scripted::reply("HTTP/1.1 200 OK\r\nContent-Encoding: br\r\nContent-Length: 4\r\n\r\nxxxx"),
        Scripted::reply(ok("second")),
    ])
    .await;
    let mut client = client_for(&server);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    response.drop_body().await.unwrap();
    drop(response);
    assert_eq!(client.state(), ClientState::Connected);
    assert_eq!(client.connect_count(), 1);
}

#[tokio::test]
async fn finalize_early_closes_connection() {
    let server = TestServer::start(vec![Scripted::reply(ok("unread body"))]).await;
    let mut client = client_for(&server);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    response.finalize();
    response.finalize();
    assert!(matches!(
        response.body_reader(),
        Err(Error::Usage(UsageError::BodyAfterFinalize))
    ));
    drop(response);
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn connection_close_is_honored() {
    let server = TestServer::start(vec![Scripted::reply(
        "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok",
    )])
    .await;
    let mut client = client_for(&server);
    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert!(!response.is_keep_alive());
    assert_eq!(response.text().await.unwrap(), "ok");
    drop(response);
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn trailers_are_exposed() {
    let server = TestServer::start(vec![Scripted::reply(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\ndata\r\n0\r\nX-Checksum: 42\r\n\r\n",
    )])
    .await;
    let mut client = client_for(&server);
    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert!(response.trailers().is_empty());
    assert_eq!(response.text().await.unwrap(), "data");
    assert_eq!(response.trailers().get("x-checksum"), Some("42"));
}

#[tokio::test]
async fn raw_body_is_undecoded() {
    let server = TestServer::start(vec![
        Scripted::reply(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nabcd\r\n0\r\n\r\n",
        ),
        Scripted::reply(ok("next")),
    ])
    .await;
    let mut client = client_for(&server);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    let mut raw = vec![0u8; 14];
    response
        .raw_body()
        .unwrap()
        .read_exact(&mut raw)
        .await
        .unwrap();
    assert_eq!(raw, b"4\r\nabcd\r\n0\r\n\r\n");
    assert!(matches!(
        response.body_reader(),
        Err(Error::Usage(UsageError::MixedBodyAccess))
    ));
    response.finalize();
    drop(response);

    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "next");
    drop(response);
    assert_eq!(server.accept_count(), 1);
}

#[tokio::test]
async fn raw_body_after_decoding_is_rejected() {
    // ボディの途中までしか届かない
    let server = TestServer::start(vec![Scripted::reply(
        "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabcdef",
    )])
    .await;
    let mut client = client_for(&server);
    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    let mut reader = response.body_reader().unwrap();
    let mut buf = [0u8; 2];
    reader.read(&mut buf).await.unwrap();
    assert!(matches!(
        response.raw_body(),
        Err(Error::Usage(UsageError::MixedBodyAccess))
    ));
    response.finalize();
    drop(response);
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn read_json() {
    let server = TestServer::start(vec![Scripted::reply(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 9\r\n\r\n[1, 2, 3]",
    )])
    .await;
    let mut client = client_for(&server);
    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    let values: Vec<u32> = response.read_json().await.unwrap();
    assert_eq!(values, [1, 2, 3]);
    assert!(response.is_finalized());
}

#[tokio::test]
async fn invalid_status_line_disconnects() {
    let server = TestServer::start(vec![Scripted::reply("HTTP/1.1 OK\r\n\r\n")]).await;
    let mut client = client_for(&server);
    let writer = client.request("GET", "/").await.unwrap();
    assert!(matches!(
        writer.send().await,
        Err(Error::Http(keepalive_http11::Error::InvalidStatusLine(_)))
    ));
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn truncated_body_is_connection_closed() {
    let server = TestServer::start(vec![Scripted::reply_and_close(
        "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort",
    )])
    .await;
    let mut client = client_for(&server);
    let mut response = client.request("GET", "/").await.unwrap().send().await.unwrap();
    assert!(matches!(response.bytes().await, Err(Error::ConnectionClosed)));
    assert!(response.is_finalized());
    drop(response);
    assert_eq!(client.state(), ClientState::Disconnected);
}
