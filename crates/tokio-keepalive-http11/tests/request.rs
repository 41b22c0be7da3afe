mod common;

use common::{Scripted, TestServer, ok};
use tokio_keepalive_http11::{Client, ClientState, Error, UsageError};

fn client_for(server: &TestServer) -> Client {
    Client::open("127.0.0.1", server.port(), false)
}

#[tokio::test]
async fn post_without_body_sends_zero_length() {
    let server = TestServer::start(vec![Scripted::reply(ok("created"))]).await;
    let mut client = client_for(&server);
    let mut response = client.request("POST", "/items").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "created");

    let request = &server.requests()[0];
    assert!(request.starts_with("POST /items HTTP/1.1\r\n"));
    assert!(request.contains("Content-Length: 0\r\n"));
}

#[tokio::test]
async fn write_bytes_with_content_type() {
    let server = TestServer::start(vec![Scripted::reply(ok(""))]).await;
    let mut client = client_for(&server);

    let mut writer = client.request("PUT", "/doc").await.unwrap();
    writer
        .write_bytes(b"{\"a\":1}", Some("application/json"))
        .await
        .unwrap();
    let response = writer.send().await.unwrap();
    assert_eq!(response.status_code(), 200);

    let request = &server.requests()[0];
    assert!(request.contains("Content-Type: application/json\r\n"));
    assert!(request.contains("Content-Length: 7\r\n"));
    assert!(request.ends_with("\r\n\r\n{\"a\":1}"));
}

#[tokio::test]
async fn chunked_request_body() {
    let server = TestServer::start(vec![Scripted::reply(ok("done"))]).await;
    let mut client = client_for(&server);

    let mut writer = client.request("POST", "/upload").await.unwrap();
    writer.write_chunk(b"hello").await.unwrap();
    writer.write_chunk(b" world").await.unwrap();
    let mut response = writer.send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "done");

    let request = &server.requests()[0];
    assert!(request.contains("Transfer-Encoding: chunked\r\n"));
    assert!(!request.contains("Content-Length"));
    assert!(request.ends_with("\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n"));
}

#[tokio::test]
async fn write_chunked_from_reader() {
    let server = TestServer::start(vec![Scripted::reply(ok(""))]).await;
    let mut client = client_for(&server);

    let mut writer = client.request("POST", "/").await.unwrap();
    writer.write_chunked(&b"streamed body"[..]).await.unwrap();
    writer.send().await.unwrap();

    let request = &server.requests()[0];
    assert!(request.ends_with("d\r\nstreamed body\r\n0\r\n\r\n"));
}

#[tokio::test]
async fn write_stream_with_length() {
    let server = TestServer::start(vec![Scripted::reply(ok(""))]).await;
    let mut client = client_for(&server);

    let mut writer = client.request("POST", "/").await.unwrap();
    writer.write_stream(&b"0123456789extra"[..], 10).await.unwrap();
    writer.send().await.unwrap();

    let request = &server.requests()[0];
    assert!(request.contains("Content-Length: 10\r\n"));
    assert!(request.ends_with("\r\n\r\n0123456789"));
}

#[tokio::test]
async fn write_stream_short_source_aborts() {
    let server = TestServer::start(vec![]).await;
    let mut client = client_for(&server);

    let mut writer = client.request("POST", "/").await.unwrap();
    match writer.write_stream(&b"short"[..], 10).await {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("unexpected: {:?}", other.err()),
    }
    drop(writer);
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn body_length_mismatch() {
    let server = TestServer::start(vec![]).await;
    let mut client = client_for(&server);

    let mut writer = client.request("POST", "/").await.unwrap();
    writer.set_header("Content-Length", "4").unwrap();
    writer.write_body(b"ab").await.unwrap();
    assert!(matches!(
        writer.write_body(b"cde").await,
        Err(Error::Usage(UsageError::BodyLengthMismatch {
            expected: 4,
            written: 5
        }))
    ));
    assert!(matches!(
        writer.finalize().await,
        Err(Error::Usage(UsageError::BodyLengthMismatch {
            expected: 4,
            written: 2
        }))
    ));
}

#[tokio::test]
async fn header_changes_after_head_are_rejected() {
    let server = TestServer::start(vec![Scripted::reply(ok(""))]).await;
    let mut client = client_for(&server);

    let mut writer = client.request("GET", "/").await.unwrap();
    writer.set_header("X-Trace", "1").unwrap();
    writer.write_head().await.unwrap();

    assert!(matches!(
        writer.set_header("X-Late", "1"),
        Err(Error::Usage(UsageError::HeadersAlreadySent))
    ));
    assert!(matches!(
        writer.append_query("late", "1"),
        Err(Error::Usage(UsageError::HeadersAlreadySent))
    ));
    assert!(matches!(
        writer.write_head().await,
        Err(Error::Usage(UsageError::HeadAlreadyWritten))
    ));
    assert!(matches!(
        writer.write_bytes(b"x", None).await,
        Err(Error::Usage(UsageError::HeadAlreadyWritten))
    ));

    // 利用者の誤りでは接続を閉じない
    let response = writer.send().await.unwrap();
    assert_eq!(response.status_code(), 200);
    assert!(server.requests()[0].contains("X-Trace: 1\r\n"));
}

#[tokio::test]
async fn request_line_injection_is_rejected() {
    let server = TestServer::start(vec![Scripted::reply(ok("safe"))]).await;
    let mut client = client_for(&server);

    for (method, target) in [
        ("GET", "/a HTTP/1.1\r\nX-Injected: yes\r\nX-Pad:"),
        ("GET", "/with space"),
        ("GET\r\nX-Injected: yes", "/"),
        ("", "/"),
    ] {
        match client.request(method, target).await {
            Err(Error::Usage(UsageError::InvalidRequestLine(_))) => {}
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("{:?} {:?} must be rejected", method, target),
        }
        // 接続も状態も変えない
        assert_eq!(client.state(), ClientState::Disconnected);
    }
    assert_eq!(server.accept_count(), 0);

    let mut response = client.request("GET", "/a").await.unwrap().send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "safe");
    let request = &server.requests()[0];
    assert!(request.starts_with("GET /a HTTP/1.1\r\n"));
    assert!(!request.contains("X-Injected"));
}

#[tokio::test]
async fn invalid_header_is_rejected() {
    let server = TestServer::start(vec![]).await;
    let mut client = client_for(&server);
    let mut writer = client.request("GET", "/").await.unwrap();
    assert!(matches!(
        writer.set_header("X-Bad", "a\r\nInjected: 1"),
        Err(Error::Usage(UsageError::InvalidHeader(_)))
    ));
    assert!(!writer.headers().contains("x-bad"));
}

#[tokio::test]
async fn headers_can_be_overridden_and_removed() {
    let server = TestServer::start(vec![Scripted::reply(ok(""))]).await;
    let mut client = client_for(&server);

    let mut writer = client.request("GET", "/").await.unwrap();
    writer.set_header("user-agent", "custom/1.0").unwrap();
    assert!(writer.remove_header("Accept-Encoding").unwrap());
    writer.append_query("q", "a b").unwrap();
    assert_eq!(writer.head().target, "/?q=a%20b");
    writer.send().await.unwrap();

    let request = &server.requests()[0];
    assert!(request.starts_with("GET /?q=a%20b HTTP/1.1\r\n"));
    assert!(request.contains("user-agent: custom/1.0\r\n"));
    assert!(!request.contains("User-Agent"));
    assert!(!request.contains("Accept-Encoding"));
}
