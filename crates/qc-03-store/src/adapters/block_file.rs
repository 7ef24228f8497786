//! A single rotated block file: append-only, framed with
//! [`qc_02_codec::encode_frame`]. The store rotates to a new file once the
//! active one crosses [`crate::service::StoreConfig::max_file_bytes`].

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::domain::errors::StorageError;

pub fn file_name(file_id: u32) -> String {
    format!("blocks-{file_id:08}.dat")
}

pub struct BlockFile {
    file: File,
    path: PathBuf,
    pub file_id: u32,
    pub len: u64,
}

impl BlockFile {
    /// Open (creating if needed) the block file for `file_id` in `dir`,
    /// positioned for appends at its current length.
    pub fn open(dir: &Path, file_id: u32) -> Result<Self, StorageError> {
        let path = dir.join(file_name(file_id));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        let len = file
            .metadata()
            .map_err(|e| StorageError::Io(e.to_string()))?
            .len();
        Ok(Self {
            file,
            path,
            file_id,
            len,
        })
    }

    /// Append a framed payload, returning its byte offset in the file.
    pub fn append(&mut self, payload: &[u8]) -> Result<u64, StorageError> {
        let framed = qc_02_codec::encode_frame(payload);
        let offset = self.len;
        self.file
            .write_all(&framed)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        self.file
            .sync_data()
            .map_err(|e| StorageError::Io(e.to_string()))?;
        self.len += framed.len() as u64;
        Ok(offset)
    }

    /// Read the payload framed at `offset` with total framed `length`.
    pub fn read_at(&self, offset: u64, length: u32) -> Result<Vec<u8>, StorageError> {
        let mut file = File::open(&self.path).map_err(|e| StorageError::Io(e.to_string()))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StorageError::Io(e.to_string()))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        let (payload, _) = qc_02_codec::decode_frame(&buf)?;
        Ok(payload.to_vec())
    }

    /// Truncate the file to `len` bytes, discarding anything past it. Used
    /// on recovery to drop a torn trailing write.
    pub fn truncate_to(&mut self, len: u64) -> Result<(), StorageError> {
        self.file
            .set_len(len)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        self.len = len;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut bf = BlockFile::open(dir.path(), 0).unwrap();
        let offset = bf.append(b"hello").unwrap();
        let framed_len = qc_02_codec::encode_frame(b"hello").len() as u32;
        assert_eq!(bf.read_at(offset, framed_len).unwrap(), b"hello");
    }

    #[test]
    fn reopen_resumes_at_existing_length() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut bf = BlockFile::open(dir.path(), 0).unwrap();
            bf.append(b"first").unwrap();
        }
        let bf = BlockFile::open(dir.path(), 0).unwrap();
        assert!(bf.len > 0);
    }
}
