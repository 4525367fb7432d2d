//! # Wire Protocol
//!
//! The id service speaks a tiny binary protocol over a plain TCP stream:
//!
//! ```text
//! auth frame  (client -> server, once) : [0x00] [len: u8] [token bytes]
//! request     (client -> server)       : [n: u8]               1 <= n <= 255
//! response    (server -> client)       : n x [i64 big-endian]
//! ```
//!
//! The auth frame is only sent when a non-empty token is configured and no
//! reply is read for it. A request byte can never be zero, which is how the
//! server tells the two client frames apart.
//!
//! Everything here is pure: the functions build or parse byte buffers and
//! leave the I/O to the caller.

use super::error::{NoeqError, Result};

/// Leading byte of the auth frame.
pub const AUTH_MARKER: u8 = 0x00;

/// Largest batch a single request byte can express.
pub const MAX_IDS_PER_REQUEST: usize = 255;

/// Size of one encoded id on the wire.
pub const ID_WIDTH: usize = 8;

/// Encode the authentication frame for `token`.
///
/// # Errors
/// `InvalidConfiguration` when the token does not fit the one-byte length
/// field.
///
/// # Example
/// ```
/// use noeq_client::common::messages::encode_auth_frame;
///
/// let frame = encode_auth_frame(b"secret").unwrap();
/// assert_eq!(frame, b"\x00\x06secret");
/// ```
pub fn encode_auth_frame(token: &[u8]) -> Result<Vec<u8>> {
    let len = u8::try_from(token.len()).map_err(|_| {
        NoeqError::InvalidConfiguration(format!(
            "auth token is {} bytes, at most {} are allowed",
            token.len(),
            u8::MAX
        ))
    })?;

    let mut frame = Vec::with_capacity(token.len() + 2);
    frame.push(AUTH_MARKER);
    frame.push(len);
    frame.extend_from_slice(token);
    Ok(frame)
}

/// Encode a request for `n` ids. The caller has already clamped `n` to 1..=255.
pub fn encode_request(n: u8) -> [u8; 1] {
    [n]
}

/// Number of response bytes that carry `n` ids.
pub fn response_len(n: usize) -> usize {
    n * ID_WIDTH
}

/// Decode exactly `n` big-endian ids from `bytes`.
///
/// Trailing bytes beyond `8 * n` are ignored.
///
/// # Errors
/// `Protocol` when fewer than `8 * n` bytes are available.
pub fn decode_response(n: usize, bytes: &[u8]) -> Result<Vec<i64>> {
    let needed = response_len(n);
    if bytes.len() < needed {
        return Err(NoeqError::Protocol(format!(
            "short response: expected {} bytes for {} ids, got {}",
            needed,
            n,
            bytes.len()
        )));
    }

    Ok(bytes[..needed]
        .chunks_exact(ID_WIDTH)
        .map(|chunk| {
            let mut raw = [0u8; ID_WIDTH];
            raw.copy_from_slice(chunk);
            i64::from_be_bytes(raw)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_frame_layout() {
        let frame = encode_auth_frame(b"secret").unwrap();
        assert_eq!(frame, vec![0x00, 0x06, b's', b'e', b'c', b'r', b'e', b't']);
    }

    #[test]
    fn test_auth_frame_empty_token() {
        assert_eq!(encode_auth_frame(b"").unwrap(), vec![0x00, 0x00]);
    }

    #[test]
    fn test_auth_frame_length_limit() {
        let max = vec![b'x'; 255];
        let frame = encode_auth_frame(&max).unwrap();
        assert_eq!(frame[1], 255);
        assert_eq!(frame.len(), 257);

        let too_long = vec![b'x'; 256];
        assert!(matches!(
            encode_auth_frame(&too_long),
            Err(NoeqError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_request_byte() {
        assert_eq!(encode_request(1), [1]);
        assert_eq!(encode_request(255), [255]);
    }

    #[test]
    fn test_decode_example_batch() {
        let mut bytes = Vec::new();
        for id in [1i64, 2, 3] {
            bytes.extend_from_slice(&id.to_be_bytes());
        }
        assert_eq!(decode_response(3, &bytes).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_keeps_all_64_bits() {
        let ids = [i64::MIN, -1, 0, i64::MAX, 0x0123_4567_89ab_cdef];
        let bytes: Vec<u8> = ids.iter().flat_map(|id| id.to_be_bytes()).collect();
        assert_eq!(decode_response(ids.len(), &bytes).unwrap(), ids.to_vec());
    }

    #[test]
    fn test_decode_short_response() {
        let bytes = [0u8; 15];
        assert!(matches!(
            decode_response(2, &bytes),
            Err(NoeqError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = 7i64.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0xff; 5]);
        assert_eq!(decode_response(1, &bytes).unwrap(), vec![7]);
    }
}
