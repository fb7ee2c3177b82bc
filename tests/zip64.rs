use std::io::{Cursor, Read, Write};

use zip_volumes::write::FileOptions;
use zip_volumes::{CompressionMethod, ZipArchive, ZipWriter};

#[test]
fn entry_count_promotes_the_trailer() {
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    let count = 0xFFFF;
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..count {
        zip.start_file(format!("{:05}", i), options).unwrap();
    }
    zip.start_file("last", options).unwrap();
    zip.write_all(b"the end").unwrap();
    let bytes = zip.finish().unwrap().into_inner();

    let end = &bytes[bytes.len() - 22..];
    assert_eq!(&end[..4], &[0x50, 0x4b, 0x05, 0x06]);
    assert_eq!(&end[8..12], &[0xff, 0xff, 0xff, 0xff]);
    let locator = &bytes[bytes.len() - 42..bytes.len() - 22];
    assert_eq!(&locator[..4], &[0x50, 0x4b, 0x06, 0x07]);

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), count + 1);
    assert!(archive.model().is_zip64());
    assert_eq!(archive.model().central_directory().number_of_files, count as u64 + 1);
    let mut contents = String::new();
    archive
        .by_name("last")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "the end");
}

#[test]
fn one_entry_below_the_threshold_stays_classic() {
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..0xFFFE {
        zip.start_file(format!("{:05}", i), options).unwrap();
    }
    let bytes = zip.finish().unwrap().into_inner();

    let end = &bytes[bytes.len() - 22..];
    assert_eq!(&end[8..12], &[0xfe, 0xff, 0xfe, 0xff]);
    assert_ne!(
        &bytes[bytes.len() - 42..bytes.len() - 38],
        &[0x50, 0x4b, 0x06, 0x07]
    );
    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert!(!archive.model().is_zip64());
}
