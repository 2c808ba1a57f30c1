//! Connection target and WebSocket upgrade handshake.
//!
//! The session is opened with a plain HTTP/1.1 upgrade request:
//!
//! ```text
//! GET /cgi-bin/control.html?token=12345&thumb=mode HTTP/1.1\r\n
//! Host: pimowbot.local:8008\r\n
//! Upgrade: websocket\r\n
//! Connection: Upgrade\r\n
//! Sec-WebSocket-Key: <base64 of 16 random bytes>\r\n
//! Sec-WebSocket-Version: 13\r\n
//! \r\n
//! ```
//!
//! The robot answers `HTTP/1.1 101 ...` when the token is accepted.

use core::fmt::Write;

/// Maximum length of a connection URI.
pub const MAX_URI_LEN: usize = 160;

/// Connection URI, e.g. `ws://pimowbot.local:8008/cgi-bin/control.html?token=12345&thumb=mode`.
pub type Uri = heapless::String<MAX_URI_LEN>;

/// Error type for handshake operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeError {
    /// Request or URI does not fit the provided buffer.
    BufferTooSmall,
    /// Response is not a valid HTTP status line.
    Malformed,
    /// Robot answered with a status other than 101 (e.g. wrong token).
    Rejected(u16),
}

/// Where and how to open the persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectTarget<'a> {
    /// Robot host name or dotted IPv4 address.
    pub host: &'a str,
    /// WebSocket server port.
    pub port: u16,
    /// Resource path, starting with `/`.
    pub path: &'a str,
    /// Authentication token.
    pub token: &'a str,
    /// Feature-negotiation query pair, e.g. `thumb=mode`.
    pub feature: Option<&'a str>,
}

impl ConnectTarget<'_> {
    /// Write `path?token=..[&feature]` (the HTTP request target).
    fn write_resource<W: Write>(&self, out: &mut W) -> core::fmt::Result {
        write!(out, "{}?token={}", self.path, self.token)?;
        if let Some(feature) = self.feature {
            write!(out, "&{feature}")?;
        }
        Ok(())
    }

    /// Full `ws://` URI of the session, for logging and display.
    pub fn uri(&self) -> Result<Uri, HandshakeError> {
        let mut uri = Uri::new();
        write!(uri, "ws://{}:{}", self.host, self.port)
            .and_then(|()| self.write_resource(&mut uri))
            .map_err(|_| HandshakeError::BufferTooSmall)?;
        Ok(uri)
    }
}

/// `core::fmt::Write` over a byte slice.
struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let end = self.pos + s.len();
        if end > self.buf.len() {
            return Err(core::fmt::Error);
        }
        self.buf[self.pos..end].copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

/// Serialize the upgrade request into `buf`.
///
/// `key` is the raw 16-byte nonce; it is base64-encoded into the
/// `Sec-WebSocket-Key` header. Returns the number of bytes written.
pub fn write_upgrade_request(
    target: &ConnectTarget<'_>,
    key: &[u8; 16],
    buf: &mut [u8],
) -> Result<usize, HandshakeError> {
    let encoded = encode_key(key);
    // base64 output is always ASCII
    let encoded = core::str::from_utf8(&encoded).map_err(|_| HandshakeError::Malformed)?;

    let mut out = SliceWriter { buf, pos: 0 };
    let written = out
        .write_str("GET ")
        .and_then(|()| target.write_resource(&mut out))
        .and_then(|()| {
            write!(
                out,
                " HTTP/1.1\r\n\
                 Host: {}:{}\r\n\
                 Upgrade: websocket\r\n\
                 Connection: Upgrade\r\n\
                 Sec-WebSocket-Key: {}\r\n\
                 Sec-WebSocket-Version: 13\r\n\
                 \r\n",
                target.host, target.port, encoded
            )
        });
    written.map_err(|_| HandshakeError::BufferTooSmall)?;
    Ok(out.pos)
}

/// Inspect the bytes received so far in answer to the upgrade request.
///
/// Returns `Ok(None)` while the header block is incomplete, and
/// `Ok(Some(len))` with the header length once a `101` status is complete.
/// Bytes after `len` already belong to the first WebSocket frame.
pub fn check_upgrade_response(response: &[u8]) -> Result<Option<usize>, HandshakeError> {
    let Some(end) = find_header_end(response) else {
        return Ok(None);
    };

    let status_line = response
        .split(|&b| b == b'\n')
        .next()
        .ok_or(HandshakeError::Malformed)?;
    let status_line = core::str::from_utf8(status_line).map_err(|_| HandshakeError::Malformed)?;

    let mut parts = status_line.trim_end().split(' ');
    let version = parts.next().ok_or(HandshakeError::Malformed)?;
    if !version.starts_with("HTTP/1.") {
        return Err(HandshakeError::Malformed);
    }
    let status: u16 = parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or(HandshakeError::Malformed)?;

    if status == 101 {
        Ok(Some(end))
    } else {
        Err(HandshakeError::Rejected(status))
    }
}

/// Offset just past the `\r\n\r\n` terminating the header block.
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Base64-encode a 16-byte handshake nonce (always 24 characters).
#[must_use]
pub fn encode_key(key: &[u8; 16]) -> [u8; 24] {
    let mut out = [b'='; 24];
    for (chunk, dst) in key.chunks(3).zip(out.chunks_mut(4)) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        dst[0] = BASE64[(triple >> 18) as usize & 0x3F];
        dst[1] = BASE64[(triple >> 12) as usize & 0x3F];
        if chunk.len() > 1 {
            dst[2] = BASE64[(triple >> 6) as usize & 0x3F];
        }
        if chunk.len() > 2 {
            dst[3] = BASE64[triple as usize & 0x3F];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: ConnectTarget<'static> = ConnectTarget {
        host: "pimowbot.local",
        port: 8008,
        path: "/cgi-bin/control.html",
        token: "12345",
        feature: Some("thumb=mode"),
    };

    #[test]
    fn test_uri_carries_token_and_feature() {
        let uri = TARGET.uri().unwrap();
        assert_eq!(
            uri.as_str(),
            "ws://pimowbot.local:8008/cgi-bin/control.html?token=12345&thumb=mode"
        );
    }

    #[test]
    fn test_uri_without_feature() {
        let target = ConnectTarget {
            feature: None,
            ..TARGET
        };
        assert_eq!(
            target.uri().unwrap().as_str(),
            "ws://pimowbot.local:8008/cgi-bin/control.html?token=12345"
        );
    }

    #[test]
    fn test_encode_key_rfc_sample() {
        // RFC 6455 section 1.3 sample nonce
        let key = *b"the sample nonce";
        assert_eq!(&encode_key(&key), b"dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn test_upgrade_request_layout() {
        let mut buf = [0u8; 256];
        let len = write_upgrade_request(&TARGET, b"the sample nonce", &mut buf).unwrap();
        let text = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(text.starts_with("GET /cgi-bin/control.html?token=12345&thumb=mode HTTP/1.1\r\n"));
        assert!(text.contains("Host: pimowbot.local:8008\r\n"));
        assert!(text.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_upgrade_request_buffer_too_small() {
        let mut buf = [0u8; 32];
        assert_eq!(
            write_upgrade_request(&TARGET, &[0; 16], &mut buf),
            Err(HandshakeError::BufferTooSmall)
        );
    }

    #[test]
    fn test_response_incomplete() {
        assert_eq!(check_upgrade_response(b"HTTP/1.1 101 Switching"), Ok(None));
    }

    #[test]
    fn test_response_accepted_with_trailing_frame() {
        let response = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n\x81\x00";
        let len = check_upgrade_response(response).unwrap().unwrap();
        assert_eq!(&response[len..], b"\x81\x00");
    }

    #[test]
    fn test_response_rejected() {
        assert_eq!(
            check_upgrade_response(b"HTTP/1.1 403 Forbidden\r\n\r\n"),
            Err(HandshakeError::Rejected(403))
        );
    }

    #[test]
    fn test_response_malformed() {
        assert_eq!(
            check_upgrade_response(b"SSH-2.0-OpenSSH\r\n\r\n"),
            Err(HandshakeError::Malformed)
        );
    }
}
