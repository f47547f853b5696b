use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use inspector_protocol::core::codec::AttachmentCodec;
use inspector_protocol::core::serialization::{
    encode_modification, encode_snapshot, AllowList, DecodeLimits, SecureDecoder,
};
use inspector_protocol::core::value::{decode, encode, AttrType, AttrValue, Rect, Rgba};
use inspector_protocol::snapshot::{Attribute, AttributesGroup, DisplayItem, HierarchySnapshot};
use inspector_protocol::{Attachment, AttributeModification, Oid, PayloadKind};
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn bench_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_codec");
    let values = [
        AttrValue::Bool(true),
        AttrValue::Double(0.5),
        AttrValue::Color(Rgba::new(0.1, 0.2, 0.3, 1.0)),
        AttrValue::Rect(Rect::new(0.0, 0.0, 320.0, 480.0)),
        AttrValue::String("accessibilityIdentifier".into()),
    ];

    for value in &values {
        let attr_type = value.attr_type();
        let bytes = encode(value, attr_type).unwrap();
        group.bench_function(format!("encode_{attr_type:?}"), |b| {
            b.iter(|| encode(value, attr_type).unwrap())
        });
        group.bench_function(format!("decode_{attr_type:?}"), |b| {
            b.iter(|| decode(&bytes, attr_type).unwrap())
        });
    }
    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_modification(c: &mut Criterion) {
    let modification = AttributeModification::typed(
        Oid::from_raw(42),
        "setFrame",
        Rect::new(10.0, 10.0, 100.0, 44.0),
        "1.0.0",
    );
    let payload = encode_modification(&modification).unwrap();
    let decoder = SecureDecoder::new(AllowList::target(), DecodeLimits::default());

    c.bench_function("modification_encode", |b| {
        b.iter(|| encode_modification(&modification).unwrap())
    });
    c.bench_function("modification_secure_decode", |b| {
        b.iter(|| decoder.decode(PayloadKind::Modification, &payload).unwrap())
    });
}

fn tree(width: usize, depth: usize, next: &mut u64) -> DisplayItem {
    *next += 1;
    let oid = Oid::from_raw(*next);
    let children = if depth == 0 {
        Vec::new()
    } else {
        (0..width).map(|_| tree(width, depth - 1, next)).collect()
    };
    DisplayItem {
        oid,
        class_name: "View".into(),
        attributes: vec![AttributesGroup::single(
            "Layout",
            vec![
                Attribute::new("frame", Rect::new(0.0, 0.0, 10.0, 10.0)),
                Attribute::new("hidden", false),
            ],
        )],
        children,
    }
}

#[allow(clippy::unwrap_used)]
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    for depth in [2usize, 4, 6] {
        let mut next = 0;
        let snapshot = HierarchySnapshot {
            server_version: "1.0.0".into(),
            items: vec![tree(4, depth, &mut next)],
        };
        let bytes = encode_snapshot(&snapshot).unwrap();
        let decoder = SecureDecoder::new(AllowList::client(), DecodeLimits::default());

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(format!("encode_depth_{depth}"), |b| {
            b.iter(|| encode_snapshot(&snapshot).unwrap())
        });
        group.bench_function(format!("decode_depth_{depth}"), |b| {
            b.iter(|| decoder.decode(PayloadKind::Snapshot, &bytes).unwrap())
        });
    }
    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("attachment_framing");
    for size in [64usize, 4096, 65536] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                || Attachment::new(PayloadKind::Snapshot, 7, "1.0.0", vec![0u8; size]),
                |attachment| {
                    let mut buf = BytesMut::with_capacity(size + 64);
                    AttachmentCodec::default().encode(attachment, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("decode_{size}b"), |b| {
            let mut encoded = BytesMut::new();
            AttachmentCodec::default()
                .encode(
                    Attachment::new(PayloadKind::Snapshot, 7, "1.0.0", vec![0u8; size]),
                    &mut encoded,
                )
                .unwrap();
            b.iter_batched(
                || encoded.clone(),
                |mut buf| AttachmentCodec::default().decode(&mut buf).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_values,
    bench_modification,
    bench_snapshot,
    bench_framing
);
criterion_main!(benches);
