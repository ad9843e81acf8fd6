// OWID and results-codec benchmarks for the SWAN relay.
//
// Covers OWID signing, base64 round trips with verification, SID hashing,
// and decoding results blobs of various sizes.

use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use swan::owid::{Creator, Owid};
use swan::sid::{SidAlgorithm, SidHasher};
use swan::swift::{decode_results, encode_results, Pair, ResultSet};

fn bench_sign_owid(c: &mut Criterion) {
    let creator = Creator::generate("pub.example", "Bench");
    let now = Utc::now();

    c.bench_function("owid/create_and_sign", |b| {
        b.iter(|| {
            let mut owid = creator.create_owid(b"c-0123456789".to_vec(), now).unwrap();
            creator.sign(&mut owid).unwrap();
            owid
        });
    });
}

fn bench_parse_and_verify(c: &mut Criterion) {
    let creator = Creator::generate("pub.example", "Bench");
    let mut owid = creator.create_owid(vec![7u8; 64], Utc::now()).unwrap();
    creator.sign(&mut owid).unwrap();
    let encoded = owid.as_base64().unwrap();
    let public_key = creator.public_key();

    c.bench_function("owid/parse_and_verify", |b| {
        b.iter(|| Owid::from_base64(&encoded).unwrap().verify(&public_key));
    });
}

fn bench_sid_hash(c: &mut Criterion) {
    let keyed = SidHasher::new(SidAlgorithm::Blake3Keyed([3u8; 32]));
    let plain = SidHasher::new(SidAlgorithm::Sha256);

    c.bench_function("sid/blake3_keyed", |b| {
        b.iter(|| keyed.hash("Reader@Example.com"));
    });
    c.bench_function("sid/sha256", |b| {
        b.iter(|| plain.hash("Reader@Example.com"));
    });
}

fn bench_decode_results(c: &mut Criterion) {
    let mut group = c.benchmark_group("results/decode");
    let expires = Utc::now();

    for size in [3, 16, 128] {
        let results: ResultSet = (0..size)
            .map(|i| Pair::new(format!("field-{}", i), vec![i as u8; 40], expires))
            .collect();
        let blob = encode_results(&results).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &blob, |b, blob| {
            b.iter(|| decode_results(blob).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sign_owid,
    bench_parse_and_verify,
    bench_sid_hash,
    bench_decode_results,
);
criterion_main!(benches);
