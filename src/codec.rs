//! Wire codecs for the length-prefixed text protocol
//!
//! Client → server frames start with a one-byte type tag followed by
//! zero-padded ASCII decimal length headers and the raw payload bytes:
//!
//! | Tag | Headers           | Payload     |
//! |-----|-------------------|-------------|
//! | `b` | 5 digits          | text        |
//! | `d` | 2 digits, 5 digits| name, text  |
//! | `n` | 2 digits          | name        |
//! | `u` | none              | none        |
//! | `h` | none              | none        |
//!
//! Server → client notices carry no tag: `5 digits + text`.
//!
//! Both codecs keep partial frames in the `BytesMut` buffer owned by
//! `FramedRead`, so a frame split across many reads is assembled without
//! ever blocking on a single connection.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{AppError, ProtocolError};
use crate::message::{Frame, Notice};

/// Digits in a name length header
pub const NAME_HEADER_LEN: usize = 2;

/// Digits in a text length header
pub const TEXT_HEADER_LEN: usize = 5;

/// Largest payload a 5-digit header can describe
pub const MAX_TEXT_BYTES: usize = 99_999;

/// Largest payload a 2-digit header can describe
pub const MAX_NAME_BYTES: usize = 99;

const TAG_LEN: usize = 1;

/// Decoded client input
///
/// The outer `Result` of the decoder is reserved for errors that lose
/// framing sync; an unrecognized tag is yielded in-band so the connection
/// can keep going.
pub type Inbound = Result<Frame, ProtocolError>;

/// Codec for client → server frames
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientFrameCodec;

impl Decoder for ClientFrameCodec {
    type Item = Inbound;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(&tag) = src.first() else {
            return Ok(None);
        };

        match tag {
            b'b' => {
                let Some(len) = header(src, TAG_LEN, TEXT_HEADER_LEN)? else {
                    return Ok(None);
                };
                let start = TAG_LEN + TEXT_HEADER_LEN;
                if src.len() < start + len {
                    src.reserve(start + len - src.len());
                    return Ok(None);
                }
                let text = utf8(&src[start..start + len])?;
                src.advance(start + len);
                Ok(Some(Ok(Frame::Broadcast { text })))
            }
            b'd' => {
                let Some(name_len) = header(src, TAG_LEN, NAME_HEADER_LEN)? else {
                    return Ok(None);
                };
                let Some(text_len) = header(src, TAG_LEN + NAME_HEADER_LEN, TEXT_HEADER_LEN)?
                else {
                    return Ok(None);
                };
                let start = TAG_LEN + NAME_HEADER_LEN + TEXT_HEADER_LEN;
                let end = start + name_len + text_len;
                if src.len() < end {
                    src.reserve(end - src.len());
                    return Ok(None);
                }
                let recipient = utf8(&src[start..start + name_len])?;
                let text = utf8(&src[start + name_len..end])?;
                src.advance(end);
                Ok(Some(Ok(Frame::Direct { recipient, text })))
            }
            b'n' => {
                let Some(len) = header(src, TAG_LEN, NAME_HEADER_LEN)? else {
                    return Ok(None);
                };
                let start = TAG_LEN + NAME_HEADER_LEN;
                if src.len() < start + len {
                    src.reserve(start + len - src.len());
                    return Ok(None);
                }
                let name = utf8(&src[start..start + len])?;
                src.advance(start + len);
                Ok(Some(Ok(Frame::Rename { name })))
            }
            b'u' => {
                src.advance(TAG_LEN);
                Ok(Some(Ok(Frame::ListUsers)))
            }
            b'h' => {
                src.advance(TAG_LEN);
                Ok(Some(Ok(Frame::Help)))
            }
            other => {
                src.advance(TAG_LEN);
                Ok(Some(Err(ProtocolError::UnknownTag(char::from(other)))))
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(ProtocolError::Truncated(buf.len()).into()),
        }
    }
}

impl Encoder<Frame> for ClientFrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let tag = item.tag();
        match item {
            Frame::Broadcast { text } => {
                let header = length_header(text.len(), TEXT_HEADER_LEN)?;
                dst.reserve(TAG_LEN + header.len() + text.len());
                dst.extend_from_slice(&[tag]);
                dst.extend_from_slice(header.as_bytes());
                dst.extend_from_slice(text.as_bytes());
            }
            Frame::Direct { recipient, text } => {
                let name_header = length_header(recipient.len(), NAME_HEADER_LEN)?;
                let text_header = length_header(text.len(), TEXT_HEADER_LEN)?;
                dst.extend_from_slice(&[tag]);
                dst.extend_from_slice(name_header.as_bytes());
                dst.extend_from_slice(text_header.as_bytes());
                dst.extend_from_slice(recipient.as_bytes());
                dst.extend_from_slice(text.as_bytes());
            }
            Frame::Rename { name } => {
                let header = length_header(name.len(), NAME_HEADER_LEN)?;
                dst.extend_from_slice(&[tag]);
                dst.extend_from_slice(header.as_bytes());
                dst.extend_from_slice(name.as_bytes());
            }
            Frame::ListUsers | Frame::Help => {
                dst.extend_from_slice(&[tag]);
            }
        }
        Ok(())
    }
}

/// Codec for server → client notices
#[derive(Debug, Default, Clone, Copy)]
pub struct NoticeCodec;

impl Encoder<Notice> for NoticeCodec {
    type Error = AppError;

    fn encode(&mut self, item: Notice, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let header = length_header(item.0.len(), TEXT_HEADER_LEN)?;
        dst.reserve(header.len() + item.0.len());
        dst.extend_from_slice(header.as_bytes());
        dst.extend_from_slice(item.0.as_bytes());
        Ok(())
    }
}

impl Decoder for NoticeCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(len) = header(src, 0, TEXT_HEADER_LEN)? else {
            return Ok(None);
        };
        if src.len() < TEXT_HEADER_LEN + len {
            src.reserve(TEXT_HEADER_LEN + len - src.len());
            return Ok(None);
        }
        let text = utf8(&src[TEXT_HEADER_LEN..TEXT_HEADER_LEN + len])?;
        src.advance(TEXT_HEADER_LEN + len);
        Ok(Some(text))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(text) => Ok(Some(text)),
            None if buf.is_empty() => Ok(None),
            None => Err(ProtocolError::Truncated(buf.len()).into()),
        }
    }
}

/// Parse a fixed-width decimal header at `offset`, or `None` if not all
/// of its digits have arrived yet
fn header(src: &[u8], offset: usize, width: usize) -> Result<Option<usize>, ProtocolError> {
    let Some(digits) = src.get(offset..offset + width) else {
        return Ok(None);
    };
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::NonNumericHeader(
            String::from_utf8_lossy(digits).into_owned(),
        ));
    }
    let len = digits
        .iter()
        .fold(0usize, |acc, d| acc * 10 + usize::from(d - b'0'));
    Ok(Some(len))
}

/// Zero-padded decimal header of exactly `width` digits
fn length_header(len: usize, width: usize) -> Result<String, ProtocolError> {
    let max = 10usize.pow(width as u32) - 1;
    if len > max {
        return Err(ProtocolError::PayloadTooLong { len, digits: width });
    }
    Ok(format!("{:0width$}", len, width = width))
}

fn utf8(bytes: &[u8]) -> Result<String, ProtocolError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::InvalidUtf8)
}
