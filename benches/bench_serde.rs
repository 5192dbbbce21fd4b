use criterion::{Criterion, criterion_group, criterion_main};
use fixwide::{FixedPoint128, FixedPoint256};
use serde::{Deserialize, Serialize};
use std::hint::black_box;

// ============================================================================
// JSON Serialization/Deserialization
// ============================================================================

fn bench_fixed256_serialize_json(c: &mut Criterion) {
    c.bench_function("fixed256_serialize_json", |b| {
        let d = FixedPoint256::from_f64(123.456789);
        b.iter(|| black_box(serde_json::to_string(&black_box(d)).unwrap()));
    });
}

fn bench_fixed256_deserialize_json(c: &mut Criterion) {
    c.bench_function("fixed256_deserialize_json", |b| {
        let json = serde_json::to_string(&FixedPoint256::from_f64(123.456789)).unwrap();
        b.iter(|| black_box(serde_json::from_str::<FixedPoint256>(black_box(&json)).unwrap()));
    });
}

fn bench_fixed256_roundtrip_json(c: &mut Criterion) {
    c.bench_function("fixed256_roundtrip_json", |b| {
        let d = FixedPoint256::from_f64(123.456789);
        b.iter(|| {
            let json = serde_json::to_string(&black_box(d)).unwrap();
            black_box(serde_json::from_str::<FixedPoint256>(&json).unwrap())
        });
    });
}

fn bench_fixed128_roundtrip_json(c: &mut Criterion) {
    c.bench_function("fixed128_roundtrip_json", |b| {
        let d = FixedPoint128::from_f64(123.456789);
        b.iter(|| {
            let json = serde_json::to_string(&black_box(d)).unwrap();
            black_box(serde_json::from_str::<FixedPoint128>(&json).unwrap())
        });
    });
}

// ============================================================================
// Struct Serialization (Realistic Use Case)
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Copy)]
struct Position {
    offset: FixedPoint256,
    velocity: FixedPoint256,
    step: FixedPoint256,
}

fn sample_position() -> Position {
    Position {
        offset: FixedPoint256::from_f64(-1024.25),
        velocity: FixedPoint256::from_f64(3.5),
        step: FixedPoint256::EPSILON,
    }
}

fn bench_struct_serialize_json(c: &mut Criterion) {
    c.bench_function("fixed256_struct_serialize_json", |b| {
        let position = sample_position();
        b.iter(|| black_box(serde_json::to_string(&black_box(position)).unwrap()));
    });
}

fn bench_struct_deserialize_json(c: &mut Criterion) {
    c.bench_function("fixed256_struct_deserialize_json", |b| {
        let json = serde_json::to_string(&sample_position()).unwrap();
        b.iter(|| black_box(serde_json::from_str::<Position>(black_box(&json)).unwrap()));
    });
}

// ============================================================================
// Binary Serialization (Bincode)
// ============================================================================

fn bench_fixed256_serialize_bincode(c: &mut Criterion) {
    c.bench_function("fixed256_serialize_bincode", |b| {
        let d = FixedPoint256::from_f64(123.456789);
        b.iter(|| black_box(bincode::serialize(&black_box(d)).unwrap()));
    });
}

fn bench_fixed256_deserialize_bincode(c: &mut Criterion) {
    c.bench_function("fixed256_deserialize_bincode", |b| {
        let bytes = bincode::serialize(&FixedPoint256::from_f64(123.456789)).unwrap();
        b.iter(|| black_box(bincode::deserialize::<FixedPoint256>(black_box(&bytes)).unwrap()));
    });
}

fn bench_struct_roundtrip_bincode(c: &mut Criterion) {
    c.bench_function("fixed256_struct_roundtrip_bincode", |b| {
        let position = sample_position();
        b.iter(|| {
            let bytes = bincode::serialize(&black_box(position)).unwrap();
            black_box(bincode::deserialize::<Position>(&bytes).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_fixed256_serialize_json,
    bench_fixed256_deserialize_json,
    bench_fixed256_roundtrip_json,
    bench_fixed128_roundtrip_json,
    bench_struct_serialize_json,
    bench_struct_deserialize_json,
    bench_fixed256_serialize_bincode,
    bench_fixed256_deserialize_bincode,
    bench_struct_roundtrip_bincode,
);

criterion_main!(benches);
