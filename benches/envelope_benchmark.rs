//! Criterion benchmarks for the envelope codec
//!
//! These benchmarks measure:
//! - Envelope encoding at several payload sizes
//! - Envelope decoding at the same sizes
//! - The transport text round trip (base64 plus notification unwrap)

use base64ct::{Base64, Encoding};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use topic_queue_bus::{decode, encode, MetadataOverrides, Notification};

#[derive(Clone, PartialEq, prost::Message)]
struct Document {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(bytes = "vec", tag = "2")]
    content: Vec<u8>,
}

impl prost::Name for Document {
    const NAME: &'static str = "Document";
    const PACKAGE: &'static str = "bench.v1";
}

const SIZES: [usize; 3] = [64, 1024, 64 * 1024];

fn document(size: usize) -> Document {
    Document {
        id: "doc-1".to_string(),
        content: vec![7u8; size],
    }
}

/// Benchmark envelope encoding
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_encode");

    for size in SIZES {
        let payload = document(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| encode(black_box(payload), MetadataOverrides::new()).unwrap());
        });
    }

    group.finish();
}

/// Benchmark envelope decoding
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_decode");

    for size in SIZES {
        let bytes = encode(&document(size), MetadataOverrides::new()).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| decode::<Document>(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark unwrapping a queue message body down to the payload
fn bench_queue_body(c: &mut Criterion) {
    let bytes = encode(&document(1024), MetadataOverrides::new()).unwrap();
    let notification = Notification::new(
        "m-1".to_string(),
        "arn:aws:sns:eu-west-1:111122223333:bench-v1-Document".to_string(),
        Base64::encode_string(&bytes),
    );
    let body = serde_json::to_string(&notification).unwrap();

    c.bench_function("queue_body_to_payload", |b| {
        b.iter(|| {
            let text = Notification::extract_message(black_box(&body)).unwrap();
            let bytes = Base64::decode_vec(&text).unwrap();
            decode::<Document>(&bytes).unwrap()
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_queue_body);
criterion_main!(benches);
