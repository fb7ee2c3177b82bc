//! A ZIP reader/writer crate with Zip64, split archives and encryption
//!
//! Archives are read with [`ZipArchive`] and written with [`ZipWriter`],
//! either to one seekable stream or, with [`ZipWriter::new_split`], as
//! numbered volumes of a fixed size.

#![warn(missing_docs)]

pub use crate::central_directory::CentralDirectory;
pub use crate::codec::Charset;
pub use crate::compression::CompressionMethod;
pub use crate::read::{ZipArchive, ZipFile};
pub use crate::result::{ZipError, ZipResult};
pub use crate::split::{SingleVolume, SplitWriter, VolumeSink};
pub use crate::types::{AesMode, AesVendorVersion, DateTime, EncryptionMethod, System};
pub use crate::write::{FileOptions, ZipWriter};

mod central_directory;
pub mod codec;
pub mod compression;
mod cp437;
mod crc32;
mod crypto;
pub mod extra_fields;
pub mod model;
pub mod read;
pub mod result;
mod spec;
pub mod split;
pub mod types;
pub mod volume;
pub mod write;
