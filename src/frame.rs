//! Length-prefixed framing used on both the control and the data connections.
//!
//! Each frame is a 4-byte big-endian length followed by that many payload
//! bytes:
//!
//! ```text
//! [u32 length][payload bytes]
//! ```
//!
//! Payloads are opaque; text payloads (requests, replies, advertisements,
//! listings) are UTF-8. Nothing here knows about commands.

use bytes::{BufMut, Bytes, BytesMut};
use std::io::{self, ErrorKind, Read, Write};
use tracing::trace;

use crate::error::{ChannelError, ProtocolError};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Default chunk size for reading payloads.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Write one frame.
///
/// Loops until every byte of the prefix and payload has been accepted by
/// the writer, since a single `write` may take only part of the buffer.
pub fn send<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("payload of {} bytes does not fit a frame", payload.len()),
        )
    })?;

    let mut encoded = BytesMut::with_capacity(HEADER_LEN + payload.len());
    encoded.put_u32(len);
    encoded.put_slice(payload);

    let mut sent = 0;
    while sent < encoded.len() {
        match writer.write(&encoded[sent..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "peer stopped accepting frame bytes",
                ))
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    writer.flush()?;

    trace!(bytes = payload.len(), "Frame sent");
    Ok(())
}

/// Write one UTF-8 text frame.
pub fn send_text<W: Write>(writer: &mut W, text: &str) -> io::Result<()> {
    send(writer, text.as_bytes())
}

/// Read one frame, pulling at most `buffer_size` bytes per read.
///
/// Returns exactly the declared number of bytes, however many reads that
/// takes. A `buffer_size` of zero is treated as one.
pub fn receive<R: Read>(reader: &mut R, buffer_size: usize) -> Result<Bytes, ChannelError> {
    let mut header = [0u8; HEADER_LEN];
    let got = read_full(reader, &mut header)?;
    if got < HEADER_LEN {
        return Err(ProtocolError::ShortHeader { received: got }.into());
    }
    let length = u32::from_be_bytes(header) as usize;

    let chunk_size = buffer_size.max(1);
    let mut payload = BytesMut::with_capacity(length.min(chunk_size.saturating_mul(64)));
    let mut chunk = vec![0u8; chunk_size.min(length.max(1))];

    let mut remaining = length;
    while remaining > 0 {
        let want = remaining.min(chunk.len());
        let n = match reader.read(&mut chunk[..want]) {
            Ok(0) => {
                return Err(ProtocolError::Truncated {
                    expected: length,
                    received: length - remaining,
                }
                .into())
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        payload.extend_from_slice(&chunk[..n]);
        remaining -= n;
    }

    trace!(bytes = length, "Frame received");
    Ok(payload.freeze())
}

/// Read one frame and decode it as UTF-8.
pub fn receive_text<R: Read>(reader: &mut R, buffer_size: usize) -> Result<String, ChannelError> {
    let payload = receive(reader, buffer_size)?;
    String::from_utf8(payload.to_vec()).map_err(|_| ProtocolError::InvalidUtf8.into())
}

/// Fill `buf` unless EOF comes first; returns how many bytes were read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
