use criterion::{criterion_group, criterion_main};
use criterion::{BenchmarkId, Criterion};

use std::io::{Cursor, Read, Write};

use getrandom::getrandom;
use zip_volumes::write::FileOptions;
use zip_volumes::{AesMode, CompressionMethod, ZipArchive, ZipWriter};

const METHODS: [CompressionMethod; 2] = [CompressionMethod::Stored, CompressionMethod::Deflated];

fn generate_random_archive(size: usize, options: FileOptions<'_>) -> Vec<u8> {
    let data = Vec::new();
    let mut writer = ZipWriter::new(Cursor::new(data));

    writer.start_file("random.dat", options).unwrap();

    // Generate some random data.
    let mut bytes = vec![0u8; size];
    getrandom(&mut bytes).unwrap();
    writer.write_all(&bytes).unwrap();

    writer.finish().unwrap().into_inner()
}

fn read_all(bytes: &[u8], password: Option<&[u8]>) -> usize {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = match password {
        Some(password) => archive.by_name_decrypt("random.dat", password).unwrap(),
        None => archive.by_name("random.dat").unwrap(),
    };
    let mut buf = [0u8; 1024];

    let mut total_bytes = 0;

    loop {
        let n = file.read(&mut buf).unwrap();
        total_bytes += n;
        if n == 0 {
            return total_bytes;
        }
    }
}

fn read_entry(bench: &mut Criterion) {
    let size = 1024 * 1024;
    let mut group = bench.benchmark_group("read_entry");
    for method in METHODS {
        group.bench_with_input(
            BenchmarkId::from_parameter(method),
            &method,
            |bench, method| {
                let options = FileOptions::default().compression_method(*method);
                let bytes = generate_random_archive(size, options);

                bench.iter(|| read_all(&bytes, None));
            },
        );
    }
    group.finish();
}

fn read_encrypted_entry(bench: &mut Criterion) {
    let size = 1024 * 1024;
    let password: &[u8] = b"benchmark";
    let mut group = bench.benchmark_group("read_encrypted_entry");
    let variants = [
        ("zipcrypto", FileOptions::default().with_zipcrypto(password)),
        (
            "aes256",
            FileOptions::default().with_aes_encryption(AesMode::Aes256, password),
        ),
        (
            "strong256",
            FileOptions::default().with_strong_encryption(AesMode::Aes256, password),
        ),
    ];
    for (name, options) in variants {
        let options = options.compression_method(CompressionMethod::Stored);
        group.bench_with_input(BenchmarkId::from_parameter(name), &options, |bench, options| {
            let bytes = generate_random_archive(size, *options);

            bench.iter(|| read_all(&bytes, Some(password)));
        });
    }
    group.finish();
}

fn write_random_archive(bench: &mut Criterion) {
    let size = 1024 * 1024;
    let mut group = bench.benchmark_group("write_random_archive");
    for method in METHODS {
        group.bench_with_input(BenchmarkId::from_parameter(method), &method, |b, method| {
            b.iter(|| {
                generate_random_archive(size, FileOptions::default().compression_method(*method));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, read_entry, read_encrypted_entry, write_random_archive);
criterion_main!(benches);
