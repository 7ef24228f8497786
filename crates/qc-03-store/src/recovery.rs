//! Startup recovery: a process killed mid-write can leave a torn frame at
//! the tail of the active block file. Rather than refusing to start, the
//! recovery scan walks every complete frame and truncates away anything
//! after the last one that decoded cleanly.
//!
//! Returns the records recovered (so the caller can rebuild its rocksdb
//! index if it was lost or is behind the block file) and the file length
//! after truncation.

use std::fs;
use std::path::Path;

use qc_02_codec::decode_frame;

use crate::adapters::block_file::BlockFile;
use crate::domain::errors::StorageError;

pub struct RecoveredRecord {
    pub offset: u64,
    pub payload: Vec<u8>,
}

pub struct RecoveryReport {
    pub records: Vec<RecoveredRecord>,
    pub truncated_bytes: u64,
}

/// Scan `file_id`'s block file for a torn trailing frame and truncate it.
pub fn recover_file(dir: &Path, file_id: u32) -> Result<RecoveryReport, StorageError> {
    let path = dir.join(crate::adapters::block_file::file_name(file_id));
    let bytes = match fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(RecoveryReport {
                records: Vec::new(),
                truncated_bytes: 0,
            })
        }
        Err(e) => return Err(StorageError::Io(e.to_string())),
    };

    let mut records = Vec::new();
    let mut cursor = 0usize;
    loop {
        if cursor >= bytes.len() {
            break;
        }
        match decode_frame(&bytes[cursor..]) {
            Ok((payload, consumed)) => {
                records.push(RecoveredRecord {
                    offset: cursor as u64,
                    payload: payload.to_vec(),
                });
                cursor += consumed;
            }
            Err(_) => break,
        }
    }

    let good_len = cursor as u64;
    let truncated_bytes = bytes.len() as u64 - good_len;
    if truncated_bytes > 0 {
        tracing::warn!(
            file = %path.display(),
            truncated_bytes,
            "truncating torn trailing frame on startup recovery"
        );
        let mut bf = BlockFile::open(dir, file_id)?;
        bf.truncate_to(good_len)?;
    }

    Ok(RecoveryReport {
        records,
        truncated_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn clean_file_recovers_with_no_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let mut bf = BlockFile::open(dir.path(), 0).unwrap();
        bf.append(b"one").unwrap();
        bf.append(b"two").unwrap();
        drop(bf);

        let report = recover_file(dir.path(), 0).unwrap();
        assert_eq!(report.truncated_bytes, 0);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].payload, b"two");
    }

    #[test]
    fn torn_trailing_frame_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let mut bf = BlockFile::open(dir.path(), 0).unwrap();
        bf.append(b"complete").unwrap();
        drop(bf);

        // Simulate a crash mid-write: append a truncated frame header.
        let path = dir.path().join(crate::adapters::block_file::file_name(0));
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&qc_02_codec::encode_frame(b"torn")[..6]).unwrap();
        drop(f);

        let report = recover_file(dir.path(), 0).unwrap();
        assert!(report.truncated_bytes > 0);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].payload, b"complete");

        let bf = BlockFile::open(dir.path(), 0).unwrap();
        assert_eq!(bf.len, report.records[0].offset + qc_02_codec::encode_frame(b"complete").len() as u64);
    }

    #[test]
    fn missing_file_recovers_empty() {
        let dir = tempfile::tempdir().unwrap();
        let report = recover_file(dir.path(), 5).unwrap();
        assert_eq!(report.truncated_bytes, 0);
        assert!(report.records.is_empty());
    }
}
