use crate::request::RequestHead;

/// 終端チャンク
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// リクエストヘッダーをエンコード (ボディなし)
///
/// ボディのフレーミング (Content-Length / Transfer-Encoding) は呼び出し側がヘッダーに設定する。
pub fn encode_request_head(head: &RequestHead) -> Vec<u8> {
    let mut buf = Vec::new();

    // Request line: METHOD SP target SP HTTP/1.1 CRLF
    buf.extend_from_slice(head.method.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(head.target.as_bytes());
    buf.extend_from_slice(b" HTTP/1.1\r\n");

    // Headers
    for (name, value) in head.headers.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // End of headers
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Chunked Transfer Encoding 用のチャンクをエンコード
///
/// 空のデータを渡すと終端チャンク (0\r\n\r\n) を生成します。
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return LAST_CHUNK.to_vec();
    }

    let mut buf = Vec::with_capacity(data.len() + 12);
    // チャンクサイズ (16進数)
    buf.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_head_wire_format() {
        let head = RequestHead::new("POST", "/upload?x=1")
            .header("Host", "example.com")
            .header("Content-Length", "3");
        assert_eq!(
            encode_request_head(&head),
            b"POST /upload?x=1 HTTP/1.1\r\nHost: example.com\r\nContent-Length: 3\r\n\r\n"
        );
    }

    #[test]
    fn chunk_encoding() {
        assert_eq!(encode_chunk(b"hello"), b"5\r\nhello\r\n");
        assert_eq!(encode_chunk(&[0u8; 26])[..4], *b"1a\r\n");
        assert_eq!(encode_chunk(b""), LAST_CHUNK);
    }
}
