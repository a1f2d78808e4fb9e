use bytestruct::fields::{BitsField, BytesField, UIntField};
use bytestruct::{StructBuilder, StructDef};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn header_def() -> Arc<StructDef> {
    StructBuilder::new("Header")
        .field("magic", UIntField::new(4))
        .field("version", UIntField::new(2))
        .field("flags", BitsField::new(3))
        .field("kind", BitsField::new(5))
        .field("length", UIntField::new(4))
        .field("payload", BytesField::new(16))
        .build()
        .unwrap()
}

fn random_buffers(count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    (0..count)
        .map(|_| (0..len).map(|_| rng.gen()).collect())
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let def = header_def();
    let len = def.static_length().unwrap() as usize;
    let buffers = random_buffers(256, len);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes((buffers.len() * len) as u64));
    group.bench_function("header", |b| {
        b.iter(|| {
            for buf in &buffers {
                black_box(def.from_bytes(buf).unwrap());
            }
        })
    });
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let def = header_def();
    let len = def.static_length().unwrap();

    let mut instance = def.instance();
    instance.set("magic", 0x4644_4c57u64).unwrap();
    instance.set("version", 0x0100u64).unwrap();
    instance.set("flags", 5u64).unwrap();
    instance.set("kind", 17u64).unwrap();
    instance.set("length", 16u64).unwrap();
    instance.set("payload", vec![0xabu8; 16]).unwrap();

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(len));
    group.bench_function("header", |b| {
        b.iter(|| black_box(instance.to_bytes().unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
