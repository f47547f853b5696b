//! Stream framing for attachments.
//!
//! Plugs the envelope format into `tokio_util::codec::Framed` so any async byte stream
//! can carry attachments.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::packet::{frame_len, parse_frame, Attachment};
use crate::error::ProtocolError;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, Copy)]
pub struct AttachmentCodec {
    max_payload_size: usize,
}

impl AttachmentCodec {
    /// Codec refusing inbound payloads longer than `max_payload_size`
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: max_payload_size.min(MAX_PAYLOAD_SIZE),
        }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for AttachmentCodec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_SIZE)
    }
}

impl Decoder for AttachmentCodec {
    type Item = Attachment;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match frame_len(&src[..], self.max_payload_size)? {
            Some(len) => {
                // split_to keeps the payload a zero-copy view of the read buffer
                let frame = src.split_to(len).freeze();
                Ok(Some(parse_frame(frame)))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Attachment> for AttachmentCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Attachment, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write_to(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::{PayloadKind, FIXED_HEADER_LEN};

    #[test]
    #[allow(clippy::expect_used, clippy::unwrap_used)]
    fn test_decode_two_frames_from_one_buffer() {
        let mut codec = AttachmentCodec::default();
        let mut buf = BytesMut::new();
        let first = Attachment::new(PayloadKind::Modification, 1, "1.0.0", vec![1u8; 8]);
        let second =
            Attachment::new(PayloadKind::HierarchyRequest, 2, "1.0.0", Vec::<u8>::new());
        codec.encode(first.clone(), &mut buf).expect("encode");
        codec.encode(second.clone(), &mut buf).expect("encode");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(first));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(second));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_partial_decode_preserves_buffer() {
        let mut codec = AttachmentCodec::default();
        let mut buf = BytesMut::from(&b"INSP\x01"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_garbage_is_an_error() {
        let mut codec = AttachmentCodec::default();
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidHeader)
        ));
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_configured_limit_refuses_large_frames() {
        let mut codec = AttachmentCodec::new(1024);
        let mut buf = BytesMut::new();
        let large = Attachment::new(PayloadKind::Modification, 3, "1.0.0", vec![0u8; 4096]);
        large.write_to(&mut buf).expect("encode");
        // Refused from the header alone
        buf.truncate(FIXED_HEADER_LEN + 5 + 4);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::OversizedPacket(4096))
        ));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_unknown_kind_is_still_delimited() {
        let mut codec = AttachmentCodec::default();
        let mut buf = BytesMut::new();
        let request = Attachment::new(PayloadKind::Unknown(0x06), 77, "1.0.0", vec![9u8]);
        codec.encode(request.clone(), &mut buf).unwrap();
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(request));
        assert!(buf.is_empty());
    }
}
