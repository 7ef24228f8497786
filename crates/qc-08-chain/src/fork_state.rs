//! Crash-recoverable record of an in-flight reorg. Written before a single
//! atomic revert/apply batch starts and cleared only once the whole reorg
//! has committed; a process that dies mid-reorg finds this file on the
//! next boot and knows exactly which two paths it was splicing.

use std::io;
use std::path::{Path, PathBuf};

use qc_02_codec::{CodecResult, Encode, Reader, Writer};
use shared_types::Hash;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkState {
    pub initiator: Hash,
    pub fork_point: Hash,
    pub old_path: Vec<Hash>,
    pub new_path: Vec<Hash>,
}

impl Encode for ForkState {
    fn encode(&self, w: &mut Writer) {
        w.fixed_bytes(&self.initiator);
        w.fixed_bytes(&self.fork_point);
        w.seq(&self.old_path, |w, h| {
            w.fixed_bytes(h);
        });
        w.seq(&self.new_path, |w, h| {
            w.fixed_bytes(h);
        });
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(Self {
            initiator: r.fixed_bytes::<32>()?,
            fork_point: r.fixed_bytes::<32>()?,
            old_path: r.seq(|r| r.fixed_bytes::<32>())?,
            new_path: r.seq(|r| r.fixed_bytes::<32>())?,
        })
    }
}

/// A single-slot sidecar file, written via write-then-rename so a crash
/// mid-write never leaves a half-written record behind.
pub struct ForkStateFile {
    path: PathBuf,
}

impl ForkStateFile {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("fork_state.bin") }
    }

    pub fn load(&self) -> io::Result<Option<ForkState>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(ForkState::decode_from_slice(&bytes).ok()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn persist(&self, state: &ForkState) -> io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, state.encode_to_vec())?;
        std::fs::rename(&tmp, &self.path)
    }

    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
