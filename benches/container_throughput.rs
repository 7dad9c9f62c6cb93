#![allow(missing_docs)]

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use featpipe::{ContainerReader, ContainerWriter, Value, ValueKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use tempfile::NamedTempFile;

const RECORDS: usize = 10_000;
const DIM: usize = 384;

fn descriptors() -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..RECORDS)
        .map(|_| Value::F32s((0..DIM).map(|_| rng.r#gen::<f32>()).collect()))
        .collect()
}

fn write_all(path: &std::path::Path, values: &[Value]) {
    let mut writer = ContainerWriter::create(path, ValueKind::F32s).expect("Failed to create");
    for v in values {
        writer.append(v).expect("Failed to append");
    }
    writer.close().expect("Failed to close");
}

fn bench_append(c: &mut Criterion) {
    let values = descriptors();
    let mut group = c.benchmark_group("Container Append");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.sample_size(20);

    group.bench_function("append_10k_x384", |b| {
        b.iter_batched(
            || NamedTempFile::new().expect("Failed to create temp file"),
            |file| write_all(file.path(), &values),
            BatchSize::PerIteration,
        );
    });
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let values = descriptors();
    let file = NamedTempFile::new().expect("Failed to create temp file");
    write_all(file.path(), &values);
    let reader = ContainerReader::open(file.path()).expect("Failed to open reader");

    let mut rng = StdRng::seed_from_u64(7);
    let indices: Vec<usize> = (0..1_000).map(|_| rng.gen_range(0..RECORDS)).collect();

    let mut group = c.benchmark_group("Container Read");

    group.bench_function("open", |b| {
        b.iter(|| black_box(ContainerReader::open(file.path()).expect("Failed to open")));
    });

    group.throughput(Throughput::Elements(indices.len() as u64));
    group.bench_function("random_get_1k", |b| {
        b.iter(|| {
            for &i in &indices {
                black_box(reader.get(i).expect("Failed to get"));
            }
        });
    });

    group.throughput(Throughput::Elements(RECORDS as u64));
    group.bench_function("sequential_load_all", |b| {
        b.iter(|| black_box(reader.load_all().expect("Failed to load")));
    });
    group.finish();
}

criterion_group!(benches, bench_append, bench_read);
criterion_main!(benches);
