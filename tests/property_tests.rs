//! Property-based tests using proptest
//!
//! Codec laws checked over randomly generated values and byte strings.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use inspector_protocol::core::codec::AttachmentCodec;
use inspector_protocol::core::serialization::{
    decode_modification, encode_modification, AllowList, DecodeLimits, SecureDecoder,
};
use inspector_protocol::core::value::{
    decode, encode, AttrType, AttrValue, EdgeInsets, Point, Rect, Rgba, Size, MAX_STRING_LEN,
};
use inspector_protocol::{Attachment, AttributeModification, Oid, PayloadKind};
use bytes::BytesMut;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

fn any_f64() -> impl Strategy<Value = f64> {
    // Every bit pattern, NaNs and infinities included
    any::<u64>().prop_map(f64::from_bits)
}

fn any_f32() -> impl Strategy<Value = f32> {
    any::<u32>().prop_map(f32::from_bits)
}

fn any_value() -> impl Strategy<Value = AttrValue> {
    prop_oneof![
        any::<bool>().prop_map(AttrValue::Bool),
        any::<i64>().prop_map(AttrValue::Int),
        any_f32().prop_map(AttrValue::Float),
        any_f64().prop_map(AttrValue::Double),
        ".{0,64}".prop_map(AttrValue::String),
        (any_f32(), any_f32(), any_f32(), any_f32())
            .prop_map(|(r, g, b, a)| AttrValue::Color(Rgba::new(r, g, b, a))),
        (any_f64(), any_f64(), any_f64(), any_f64())
            .prop_map(|(x, y, w, h)| AttrValue::Rect(Rect::new(x, y, w, h))),
        (any_f64(), any_f64()).prop_map(|(x, y)| AttrValue::Point(Point { x, y })),
        (any_f64(), any_f64()).prop_map(|(width, height)| AttrValue::Size(Size { width, height })),
        (any_f64(), any_f64(), any_f64(), any_f64()).prop_map(|(top, left, bottom, right)| {
            AttrValue::EdgeInsets(EdgeInsets {
                top,
                left,
                bottom,
                right,
            })
        }),
    ]
}

// Property: decode(encode(v, T), T) reproduces v bit for bit.
// Compared via re-encoding since NaN != NaN.
proptest! {
    #[test]
    fn prop_value_roundtrip_is_bit_exact(value in any_value()) {
        let attr_type = value.attr_type();
        let bytes = encode(&value, attr_type).expect("encode");
        let decoded = decode(&bytes, attr_type).expect("decode");
        prop_assert_eq!(decoded.attr_type(), attr_type);
        prop_assert_eq!(encode(&decoded, attr_type).expect("re-encode"), bytes);
    }
}

// Property: fixed layouts have exactly one valid length
proptest! {
    #[test]
    fn prop_wrong_length_is_rejected(value in any_value(), extra in 1usize..8) {
        let attr_type = value.attr_type();
        prop_assume!(attr_type.fixed_len().is_some());
        let mut bytes = encode(&value, attr_type).expect("encode");

        bytes.extend(std::iter::repeat(0u8).take(extra));
        prop_assert!(decode(&bytes, attr_type).is_err());

        bytes.truncate(attr_type.fixed_len().unwrap() - 1);
        prop_assert!(decode(&bytes, attr_type).is_err());
    }
}

// Property: the value decoder is total; arbitrary bytes never panic
proptest! {
    #[test]
    fn prop_value_decode_never_panics(
        bytes in prop::collection::vec(any::<u8>(), 0..64),
        tag in any::<u8>(),
    ) {
        if let Ok(attr_type) = AttrType::from_tag(tag) {
            let _ = decode(&bytes, attr_type);
        }
    }
}

// Property: modifications survive their wire layout
proptest! {
    #[test]
    fn prop_modification_roundtrip(
        oid in 1u64..,
        operation in "[a-zA-Z]{1,32}",
        value in any_value(),
    ) {
        let modification =
            AttributeModification::typed(Oid::from_raw(oid), operation, value, "1.0.0");
        let bytes = encode_modification(&modification).expect("encode");
        let decoded = decode_modification(&bytes, MAX_STRING_LEN).expect("decode");
        prop_assert_eq!(decoded.target_oid(), modification.target_oid());
        prop_assert_eq!(decoded.operation(), modification.operation());
        prop_assert_eq!(decoded.attr_type(), modification.attr_type());
        prop_assert_eq!(encode_modification(&decoded).expect("re-encode"), bytes);
    }
}

// Property: the secure decoder is total for every kind and receiver
proptest! {
    #[test]
    fn prop_secure_decoder_never_panics(
        bytes in prop::collection::vec(any::<u8>(), 0..512),
        kind in any::<u8>(),
    ) {
        let kind = PayloadKind::from_byte(kind).unwrap_or(PayloadKind::Unknown(kind));
        for allow in [AllowList::target(), AllowList::client()] {
            let _ = SecureDecoder::new(allow, DecodeLimits::default()).decode(kind, &bytes);
        }
    }
}

// Property: the stream codec never panics and never over-reads
proptest! {
    #[test]
    fn prop_frame_decoder_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut buf = BytesMut::from(&bytes[..]);
        let mut codec = AttachmentCodec::default();
        let _ = codec.decode(&mut buf);
        prop_assert!(buf.len() <= bytes.len());
    }
}

// Property: attachments survive framing, including ones split at every byte
proptest! {
    #[test]
    fn prop_attachment_split_reads(
        id in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..256),
        split in any::<prop::sample::Index>(),
    ) {
        let attachment = Attachment::new(PayloadKind::Snapshot, id, "1.2.3", payload);
        let bytes = attachment.to_bytes().expect("encode");
        let at = split.index(bytes.len());

        let mut codec = AttachmentCodec::default();
        let mut buf = BytesMut::from(&bytes[..at]);
        if at < bytes.len() {
            prop_assert!(codec.decode(&mut buf).expect("partial frame is fine").is_none());
        }
        buf.extend_from_slice(&bytes[at..]);
        let decoded = codec.decode(&mut buf).expect("decode").expect("complete frame");
        prop_assert_eq!(decoded, attachment);
    }
}
