//! Wire frame envelope and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    constants::{KIND_SIZE, LENGTH_PREFIX_SIZE},
    error::FramingError,
    kind::PacketKind,
};

/// Length field value; callers keep lengths within `u32`
pub(crate) fn wire_len(len: usize) -> u32 {
    debug_assert!(len <= u32::MAX as usize, "length {} does not fit in u32", len);
    len as u32
}

/// One length-delimited unit on the wire
///
/// # Frame Structure
///
/// ```text
/// ┌─────────────┬─────────────┬──────────────────┐
/// │   Length    │    Kind     │     Payload      │
/// │   4 bytes   │   1 byte    │  Length-1 bytes  │
/// │  (BE u32)   │    (u8)     │     (bytes)      │
/// └─────────────┴─────────────┴──────────────────┘
/// ```
///
/// The length counts the kind byte and the payload, not itself.
///
/// # Examples
///
/// ```
/// use fpauth_core::{Frame, PacketKind};
///
/// let frame = Frame::debug("hello");
/// let encoded = frame.encode();
///
/// let decoded = Frame::decode(encoded).unwrap();
/// assert_eq!(decoded.kind, PacketKind::Debug);
/// assert_eq!(decoded, frame);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Kind tag (clamped on decode)
    pub kind: PacketKind,

    /// Kind-specific payload
    pub payload: Bytes,
}

impl Frame {
    /// Header size in bytes (length prefix plus kind)
    pub const HEADER_SIZE: usize = LENGTH_PREFIX_SIZE + KIND_SIZE;

    /// Largest payload the length prefix can describe
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize - KIND_SIZE;

    /// Create a frame with payload
    pub fn new(kind: PacketKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Create a Debug frame carrying text
    ///
    /// No terminator is appended.
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(PacketKind::Debug, message.into().into_bytes())
    }

    /// Value written into the length prefix
    pub fn declared_len(&self) -> u32 {
        debug_assert!(
            self.payload.len() <= Self::MAX_PAYLOAD_SIZE,
            "payload of {} bytes exceeds the length prefix",
            self.payload.len()
        );
        wire_len(KIND_SIZE + self.payload.len())
    }

    /// Encode frame to bytes
    ///
    /// The caller guarantees `payload.len() <= MAX_PAYLOAD_SIZE`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpauth_core::{Frame, PacketKind};
    ///
    /// let frame = Frame::new(PacketKind::Handshake, vec![1u8]);
    /// let bytes = frame.encode();
    /// assert_eq!(&bytes[..], &[0, 0, 0, 2, 1, 1]);
    /// ```
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u32(self.declared_len());
        buf.put_u8(self.kind.into());
        buf.put_slice(&self.payload);

        buf
    }

    /// Decode frame from bytes
    ///
    /// Bytes past the declared length are left unread.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Buffer is shorter than the length prefix or the declared length
    /// - Declared length is zero
    ///
    /// Unknown kind bytes are not an error; they decode to
    /// [`PacketKind::Undefined`].
    pub fn decode(mut buf: BytesMut) -> Result<Self, FramingError> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Err(FramingError::Truncated {
                expected: LENGTH_PREFIX_SIZE,
                actual: buf.len(),
            });
        }

        let declared = buf.get_u32() as usize;
        if declared == 0 {
            return Err(FramingError::EmptyFrame);
        }

        if buf.len() < declared {
            return Err(FramingError::Truncated {
                expected: declared,
                actual: buf.len(),
            });
        }

        let kind = PacketKind::from(buf.get_u8());
        let payload = buf.split_to(declared - KIND_SIZE).freeze();

        Ok(Self { kind, payload })
    }

    /// Get total encoded size
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame[{}](len={})", self.kind, self.payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn kind_strategy() -> impl Strategy<Value = PacketKind> {
        prop_oneof![
            Just(PacketKind::Debug),
            Just(PacketKind::Handshake),
            Just(PacketKind::Auth),
            Just(PacketKind::Undefined),
        ]
    }

    #[test]
    fn test_wire_len_limit() {
        assert_eq!(wire_len(0), 0);
        assert_eq!(wire_len(u32::MAX as usize), u32::MAX);
    }

    #[test]
    #[cfg(all(debug_assertions, target_pointer_width = "64"))]
    #[should_panic(expected = "does not fit in u32")]
    fn test_wire_len_overflow_panics() {
        wire_len(u32::MAX as usize + 1);
    }

    #[test]
    fn test_frame_layout() {
        let frame = Frame::new(PacketKind::Auth, vec![0xAAu8, 0xBB]);
        let encoded = frame.encode();

        assert_eq!(&encoded[..], &[0, 0, 0, 3, 2, 0xAA, 0xBB]);
        assert_eq!(encoded.len(), frame.size());
    }

    #[test]
    fn test_frame_empty_payload() {
        let frame = Frame::new(PacketKind::Debug, Bytes::new());
        let encoded = frame.encode();

        assert_eq!(encoded.len(), Frame::HEADER_SIZE);

        let decoded = Frame::decode(encoded).unwrap();
        assert_eq!(decoded.payload.len(), 0);
    }

    #[test]
    fn test_frame_truncated_body() {
        // Declares 9 bytes, carries 3
        let buf = BytesMut::from(&[0, 0, 0, 9, 2, 0, 0][..]);
        let result = Frame::decode(buf);

        assert_eq!(
            result,
            Err(FramingError::Truncated { expected: 9, actual: 3 })
        );
    }

    #[test]
    fn test_frame_truncated_prefix() {
        let buf = BytesMut::from(&[0, 0][..]);
        assert!(matches!(
            Frame::decode(buf),
            Err(FramingError::Truncated { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_frame_zero_length() {
        let buf = BytesMut::from(&[0, 0, 0, 0][..]);
        assert_eq!(Frame::decode(buf), Err(FramingError::EmptyFrame));
    }

    #[test]
    fn test_frame_ignores_trailing_bytes() {
        let buf = BytesMut::from(&[0, 0, 0, 2, 0, b'x', 0xFF, 0xFF][..]);
        let decoded = Frame::decode(buf).unwrap();

        assert_eq!(decoded, Frame::debug("x"));
    }

    #[test]
    fn test_frame_unknown_kind() {
        let buf = BytesMut::from(&[0, 0, 0, 1, 200][..]);
        let decoded = Frame::decode(buf).unwrap();

        assert_eq!(decoded.kind, PacketKind::Undefined);
    }

    proptest! {
        #[test]
        fn prop_frame_round_trip(
            kind in kind_strategy(),
            payload in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let frame = Frame::new(kind, payload);
            let decoded = Frame::decode(frame.encode()).unwrap();
            prop_assert_eq!(decoded, frame);
        }

        #[test]
        fn prop_unknown_kind_never_fails(
            kind in 3u8..=255,
            payload in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut buf = BytesMut::new();
            buf.put_u32(1 + payload.len() as u32);
            buf.put_u8(kind);
            buf.put_slice(&payload);

            let decoded = Frame::decode(buf).unwrap();
            prop_assert_eq!(decoded.kind, PacketKind::Undefined);
        }

        #[test]
        fn prop_decode_arbitrary_bytes_never_panics(
            bytes in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let _ = Frame::decode(BytesMut::from(&bytes[..]));
        }
    }
}
