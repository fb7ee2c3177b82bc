use std::io;
use std::io::prelude::*;

use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};

/*
End of central directory record:

      end of central dir signature    4 bytes  (0x06054b50)
      number of this disk             2 bytes
      number of the disk with the
      start of the central directory  2 bytes
      total number of entries in the
      central directory on this disk  2 bytes
      total number of entries in
      the central directory           2 bytes
      size of the central directory   4 bytes
      offset of start of central
      directory with respect to
      the starting disk number        4 bytes
      .ZIP file comment length        2 bytes
      .ZIP file comment       (variable size)
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEnd {
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub number_of_files_on_this_disk: u16,
    pub number_of_files: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub zip_file_comment: Vec<u8>,
}

impl CentralDirectoryEnd {
    pub const SIGNATURE: u32 = super::CENTRAL_DIRECTORY_END_SIGNATURE;
    pub const FIXED_SIZE: u64 = 22;
    const MAX_COMMENT_LENGTH: u64 = u16::MAX as u64;

    pub fn read<R: Read>(input: &mut DataInput<R>) -> ZipResult<Self> {
        if input.read_dword()? != Self::SIGNATURE {
            return Err(ZipError::MalformedRecord(
                "invalid end of central directory signature",
            ));
        }
        let disk_number = input.read_word()?;
        let disk_with_central_directory = input.read_word()?;
        let number_of_files_on_this_disk = input.read_word()?;
        let number_of_files = input.read_word()?;
        let central_directory_size = input.read_dword()?;
        let central_directory_offset = input.read_dword()?;
        let comment_length = input.read_word()? as usize;
        let zip_file_comment = input.read_bytes(comment_length)?;

        Ok(CentralDirectoryEnd {
            disk_number,
            disk_with_central_directory,
            number_of_files_on_this_disk,
            number_of_files,
            central_directory_size,
            central_directory_offset,
            zip_file_comment,
        })
    }

    /// Locates the record by scanning backward from the end of `reader`.
    ///
    /// The comment may itself contain the signature bytes, so a candidate is
    /// only accepted when its comment length reaches exactly to the end of the
    /// stream. Returns the record and its absolute offset.
    pub fn find_and_parse<R: Read + Seek>(reader: &mut R) -> ZipResult<(Self, u64)> {
        let file_length = reader.seek(io::SeekFrom::End(0))?;
        if file_length < Self::FIXED_SIZE {
            return Err(ZipError::MalformedRecord(
                "stream is too short to hold an end of central directory record",
            ));
        }
        let window_start = file_length.saturating_sub(Self::FIXED_SIZE + Self::MAX_COMMENT_LENGTH);
        reader.seek(io::SeekFrom::Start(window_start))?;
        let mut window = Vec::with_capacity((file_length - window_start) as usize);
        reader.take(file_length - window_start).read_to_end(&mut window)?;

        let signature = Self::SIGNATURE.to_le_bytes();
        let fixed = Self::FIXED_SIZE as usize;
        let mut pos = window.len() - fixed;
        loop {
            if window[pos..pos + 4] == signature {
                let comment_length =
                    u16::from_le_bytes([window[pos + 20], window[pos + 21]]) as usize;
                if window.len() - pos - fixed == comment_length {
                    let mut input = DataInput::new(&window[pos..]);
                    let record = Self::read(&mut input)?;
                    let offset = window_start + pos as u64;
                    tracing::debug!(offset, "found end of central directory record");
                    return Ok((record, offset));
                }
            }
            if pos == 0 {
                break;
            }
            pos -= 1;
        }
        Err(ZipError::MalformedRecord(
            "could not find the end of central directory record",
        ))
    }

    pub fn write<W: Write>(&self, out: &mut DataOutput<W>) -> ZipResult<()> {
        let comment_length = u16::try_from(self.zip_file_comment.len())
            .map_err(|_| ZipError::InvalidOptions("archive comment is longer than 65535 bytes"))?;
        out.write_dword(Self::SIGNATURE)?;
        out.write_word(self.disk_number)?;
        out.write_word(self.disk_with_central_directory)?;
        out.write_word(self.number_of_files_on_this_disk)?;
        out.write_word(self.number_of_files)?;
        out.write_dword(self.central_directory_size)?;
        out.write_dword(self.central_directory_offset)?;
        out.write_word(comment_length)?;
        out.write_bytes(&self.zip_file_comment)?;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        Self::FIXED_SIZE + self.zip_file_comment.len() as u64
    }

    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        self.write(&mut out)?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn record(comment: &[u8]) -> CentralDirectoryEnd {
        CentralDirectoryEnd {
            disk_number: 0,
            disk_with_central_directory: 0,
            number_of_files_on_this_disk: 3,
            number_of_files: 3,
            central_directory_size: 150,
            central_directory_offset: 1000,
            zip_file_comment: comment.to_vec(),
        }
    }

    #[test]
    fn found_after_leading_data() {
        let mut bytes = vec![0xAA; 300];
        bytes.extend(record(b"hello").encode().unwrap());
        let (found, offset) = CentralDirectoryEnd::find_and_parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(offset, 300);
        assert_eq!(found, record(b"hello"));
    }

    #[test]
    fn signature_inside_comment_is_skipped() {
        // the comment carries a complete fake record with a zero-length comment
        let fake = CentralDirectoryEnd {
            number_of_files: 77,
            ..record(b"")
        }
        .encode()
        .unwrap();
        let mut comment = fake.clone();
        comment.extend_from_slice(b"tail");
        let mut bytes = vec![0u8; 10];
        bytes.extend(record(&comment).encode().unwrap());

        let (found, offset) = CentralDirectoryEnd::find_and_parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(offset, 10);
        assert_eq!(found.number_of_files, 3);
        assert_eq!(found.zip_file_comment, comment);
    }

    #[test]
    fn missing_record_is_malformed() {
        let bytes = vec![0u8; 100];
        assert!(matches!(
            CentralDirectoryEnd::find_and_parse(&mut Cursor::new(bytes)),
            Err(ZipError::MalformedRecord(_))
        ));
        assert!(matches!(
            CentralDirectoryEnd::find_and_parse(&mut Cursor::new(vec![0u8; 4])),
            Err(ZipError::MalformedRecord(_))
        ));
    }
}
