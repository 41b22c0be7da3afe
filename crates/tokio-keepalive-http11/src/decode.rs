//! コンテントデコーダー (gzip / deflate)
//!
//! 転送デコード済みのバイトを順次投入し、展開済みのバイトを取り出す。

use std::io::{self, Write};

use flate2::write::{DeflateDecoder, GzDecoder, ZlibDecoder};
use keepalive_http11::content_encoding::ContentCoding;

/// deflate の中身
///
/// `Content-Encoding: deflate` は本来 zlib 形式だが、raw deflate を送るサーバーもある。
/// 先頭 2 バイトで判定する。
pub(crate) enum DeflateStream {
    Detect(Vec<u8>),
    Zlib(ZlibDecoder<Vec<u8>>),
    Raw(DeflateDecoder<Vec<u8>>),
}

/// RFC 1950 の zlib ヘッダーか確認
fn is_zlib_header(cmf: u8, flg: u8) -> bool {
    (cmf & 0x0F) == 8 && ((u16::from(cmf) << 8) | u16::from(flg)) % 31 == 0
}

/// コンテントデコーダー
pub(crate) enum ContentDecoder {
    Identity,
    Gzip {
        decoder: GzDecoder<Vec<u8>>,
        /// 1 バイトでも入力があったか
        received: bool,
    },
    Deflate(DeflateStream),
}

impl ContentDecoder {
    pub(crate) fn new(coding: ContentCoding) -> Self {
        match coding {
            ContentCoding::Identity => ContentDecoder::Identity,
            ContentCoding::Gzip => ContentDecoder::Gzip {
                decoder: GzDecoder::new(Vec::new()),
                received: false,
            },
            ContentCoding::Deflate => ContentDecoder::Deflate(DeflateStream::Detect(Vec::new())),
        }
    }

    /// 入力を投入し、展開済みのバイトを `out` に追加する
    pub(crate) fn push(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        match self {
            ContentDecoder::Identity => {
                out.extend_from_slice(input);
                Ok(())
            }
            ContentDecoder::Gzip { decoder, received } => {
                *received |= !input.is_empty();
                decoder.write_all(input)?;
                out.append(decoder.get_mut());
                Ok(())
            }
            ContentDecoder::Deflate(stream) => {
                if let DeflateStream::Detect(head) = stream {
                    head.extend_from_slice(input);
                    if head.len() < 2 {
                        return Ok(());
                    }
                    let buffered = std::mem::take(head);
                    *stream = select_deflate(&buffered[..2]);
                    return push_deflate(stream, &buffered, out);
                }
                push_deflate(stream, input, out)
            }
        }
    }

    /// 入力の終わり。残りの展開済みバイトを `out` に追加する
    pub(crate) fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        match self {
            ContentDecoder::Identity => Ok(()),
            // 空のボディは空のまま (gzip ヘッダーもない)
            ContentDecoder::Gzip {
                received: false, ..
            } => Ok(()),
            ContentDecoder::Gzip { decoder, .. } => {
                decoder.try_finish()?;
                out.append(decoder.get_mut());
                Ok(())
            }
            ContentDecoder::Deflate(stream) => {
                if let DeflateStream::Detect(head) = stream {
                    if head.is_empty() {
                        return Ok(());
                    }
                    // 2 バイト未満は zlib ではありえない
                    let buffered = std::mem::take(head);
                    *stream = DeflateStream::Raw(DeflateDecoder::new(Vec::new()));
                    push_deflate(stream, &buffered, out)?;
                }
                match stream {
                    DeflateStream::Zlib(decoder) => {
                        decoder.try_finish()?;
                        out.append(decoder.get_mut());
                    }
                    DeflateStream::Raw(decoder) => {
                        decoder.try_finish()?;
                        out.append(decoder.get_mut());
                    }
                    DeflateStream::Detect(_) => {}
                }
                Ok(())
            }
        }
    }
}

fn select_deflate(head: &[u8]) -> DeflateStream {
    if is_zlib_header(head[0], head[1]) {
        DeflateStream::Zlib(ZlibDecoder::new(Vec::new()))
    } else {
        DeflateStream::Raw(DeflateDecoder::new(Vec::new()))
    }
}

fn push_deflate(stream: &mut DeflateStream, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
    match stream {
        DeflateStream::Zlib(decoder) => {
            decoder.write_all(input)?;
            out.append(decoder.get_mut());
        }
        DeflateStream::Raw(decoder) => {
            decoder.write_all(input)?;
            out.append(decoder.get_mut());
        }
        DeflateStream::Detect(head) => head.extend_from_slice(input),
    }
    Ok(())
}
