use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use zip_volumes::volume::volume_path;
use zip_volumes::write::FileOptions;
use zip_volumes::{CompressionMethod, SplitWriter, ZipArchive, ZipWriter};

const SPLIT_SIZE: u64 = SplitWriter::MIN_SPLIT_SIZE;

fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}

fn write_split(path: &Path, entries: &[(String, Vec<u8>)], options: FileOptions<'_>) {
    let mut zip = ZipWriter::new_split(path, SPLIT_SIZE).unwrap();
    for (name, data) in entries {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.set_comment("split");
    zip.finish().unwrap();
}

#[test]
fn split_archive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.zip");
    let entries: Vec<(String, Vec<u8>)> = (0..6)
        .map(|i| (format!("data/{}.bin", i), noise(i, 40_000 + i as usize * 997)))
        .collect();
    write_split(
        &path,
        &entries,
        FileOptions::default().compression_method(CompressionMethod::Stored),
    );

    assert!(volume_path(&path, 0).is_file());
    for volume in 0..3 {
        let len = fs::metadata(volume_path(&path, volume)).unwrap().len();
        assert!(len <= SPLIT_SIZE);
    }
    let first = fs::read(volume_path(&path, 0)).unwrap();
    assert_eq!(&first[..4], &[0x50, 0x4b, 0x07, 0x08]);

    let mut archive = ZipArchive::open(&path).unwrap();
    assert!(archive.volumes().len() >= 4);
    assert_eq!(archive.comment(), b"split");
    assert_eq!(archive.model().split_size(), Some(SPLIT_SIZE));

    // local headers never straddle two volumes
    let volumes = archive.volumes().volumes().to_vec();
    for file in archive.model().files() {
        let volume = &volumes[file.disk_number as usize];
        let header_len = 30 + file.file_name_raw.len() as u64;
        assert!(file.header_start + header_len <= volume.length, "{}", file.file_name);
        assert!(file.uses_data_descriptor());
    }

    for (name, data) in &entries {
        let mut contents = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut contents).unwrap();
        assert!(&contents == data, "{}", name);
    }
}

const SIGNATURES: [[u8; 4]; 6] = [
    [0x50, 0x4b, 0x03, 0x04],
    [0x50, 0x4b, 0x07, 0x08],
    [0x50, 0x4b, 0x01, 0x02],
    [0x50, 0x4b, 0x06, 0x06],
    [0x50, 0x4b, 0x06, 0x07],
    [0x50, 0x4b, 0x05, 0x06],
];

fn read_volumes(path: &Path) -> Vec<Vec<u8>> {
    let mut volumes: Vec<Vec<u8>> = (0..)
        .map(|disk| volume_path(path, disk))
        .take_while(|volume| volume.exists())
        .map(|volume| fs::read(volume).unwrap())
        .collect();
    volumes.push(fs::read(path).unwrap());
    volumes
}

#[test]
fn no_signature_is_torn_across_volumes() {
    let dir = tempfile::tempdir().unwrap();
    for (i, extra) in [0u64, 1, 2, 3, 7, 13, 101, 997].iter().enumerate() {
        let split_size = SPLIT_SIZE + extra;
        for count in [1usize, 2, 3, 5, 8, 13, 21, 34] {
            let path = dir.path().join(format!("sweep_{}_{}.zip", i, count));
            // letters only, so payload bytes never look like a signature
            let entries: Vec<(String, Vec<u8>)> = (0..count)
                .map(|n| {
                    let data = noise((i * 100 + n) as u64, 7_001 + n * 13)
                        .into_iter()
                        .map(|b| b'a' + b % 26)
                        .collect();
                    (format!("sweep/{:02}.txt", n), data)
                })
                .collect();

            let mut zip = ZipWriter::new_split(&path, split_size).unwrap();
            let options = FileOptions::default().compression_method(CompressionMethod::Stored);
            for (name, data) in &entries {
                zip.start_file(name.as_str(), options).unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();

            let volumes = read_volumes(&path);
            for (disk, pair) in volumes.windows(2).enumerate() {
                let (head, tail) = (&pair[0], &pair[1]);
                assert!(head.len() as u64 <= split_size);
                for cut in 1..4 {
                    if head.len() < cut || tail.len() < 4 - cut {
                        continue;
                    }
                    let mut joined = head[head.len() - cut..].to_vec();
                    joined.extend_from_slice(&tail[..4 - cut]);
                    assert!(
                        !SIGNATURES.iter().any(|signature| joined == signature),
                        "signature torn after volume {} (split size {}, {} entries)",
                        disk,
                        split_size,
                        count
                    );
                }
            }

            let mut archive = ZipArchive::open(&path).unwrap();
            assert_eq!(archive.len(), count);
            for (name, data) in &entries {
                let mut contents = Vec::new();
                archive.by_name(name).unwrap().read_to_end(&mut contents).unwrap();
                assert!(&contents == data, "{}", name);
            }
        }
    }
}

#[test]
fn split_archive_with_encryption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secret.zip");
    let entries: Vec<(String, Vec<u8>)> = (0..3)
        .map(|i| (format!("{}.bin", i), noise(100 + i, 50_000)))
        .collect();
    write_split(
        &path,
        &entries,
        FileOptions::default().with_aes_encryption(zip_volumes::AesMode::Aes256, b"pw"),
    );

    let mut archive = ZipArchive::open(&path).unwrap();
    for (name, data) in &entries {
        let mut contents = Vec::new();
        archive
            .by_name_decrypt(name, b"pw")
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert!(&contents == data, "{}", name);
    }
}

#[test]
fn small_split_archive_is_a_single_volume() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.zip");
    write_split(
        &path,
        &[("tiny.txt".to_string(), b"tiny".to_vec())],
        FileOptions::default(),
    );

    assert!(!volume_path(&path, 0).exists());
    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"PK00");

    let mut archive = ZipArchive::open(&path).unwrap();
    assert_eq!(archive.volumes().len(), 1);
    let mut contents = String::new();
    archive
        .by_name("tiny.txt")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "tiny");
}

#[test]
fn missing_volume_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.zip");
    let entries = vec![("big.bin".to_string(), noise(7, 200_000))];
    write_split(
        &path,
        &entries,
        FileOptions::default().compression_method(CompressionMethod::Stored),
    );

    let last_numbered = (0..)
        .take_while(|disk| volume_path(&path, *disk).exists())
        .last()
        .unwrap();
    fs::remove_file(volume_path(&path, last_numbered)).unwrap();
    assert!(matches!(
        ZipArchive::open(&path),
        Err(zip_volumes::ZipError::VolumeNotFound(_))
    ));
}

#[test]
fn split_stream_needs_its_volume_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.zip");
    let entries = vec![("big.bin".to_string(), noise(9, 150_000))];
    write_split(
        &path,
        &entries,
        FileOptions::default().compression_method(CompressionMethod::Stored),
    );

    let last = fs::read(&path).unwrap();
    assert!(matches!(
        ZipArchive::new(std::io::Cursor::new(last)),
        Err(zip_volumes::ZipError::UnsupportedArchive(_))
    ));
}

#[test]
fn stale_volume_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();

    let single = dir.path().join("single.zip");
    let mut zip = ZipWriter::new(fs::File::create(&single).unwrap());
    zip.start_file("one.txt", FileOptions::default()).unwrap();
    zip.write_all(b"only volume").unwrap();
    zip.finish().unwrap();
    fs::write(volume_path(&single, 0), noise(1, 5_000)).unwrap();

    let mut archive = ZipArchive::open(&single).unwrap();
    assert_eq!(archive.volumes().len(), 1);
    let mut contents = String::new();
    archive
        .by_name("one.txt")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "only volume");

    let split = dir.path().join("split.zip");
    let entries = vec![("big.bin".to_string(), noise(3, 150_000))];
    write_split(
        &split,
        &entries,
        FileOptions::default().compression_method(CompressionMethod::Stored),
    );
    let numbered = (0..)
        .take_while(|disk| volume_path(&split, *disk).exists())
        .count() as u32;
    fs::write(volume_path(&split, numbered), noise(4, 5_000)).unwrap();

    let mut archive = ZipArchive::open(&split).unwrap();
    assert_eq!(archive.volumes().len() as u32, numbered + 1);
    let mut contents = Vec::new();
    archive
        .by_name("big.bin")
        .unwrap()
        .read_to_end(&mut contents)
        .unwrap();
    assert!(contents == entries[0].1);
}
