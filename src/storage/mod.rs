//! Durable state: the id allocator, the record store, and the image tree.
//!
//! Both small files (the counter and the store) go through [`write_atomic`]:
//! write to a temp file in the same directory, fsync, then rename over the
//! old file. A crash mid-write leaves the previous contents intact, which is
//! what keeps the store's write-isolation invariant and the allocator's
//! never-reissue invariant across interruptions.

pub mod allocator;
pub mod images;
pub mod store;

pub use allocator::IdAllocator;
pub use images::{HttpImageFetcher, ImageFetcher};
pub use store::RecordStore;

use std::io::Write;
use std::path::Path;

/// Durable-storage failures. Abandons the current profile's persistence but
/// never the session.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("allocator file is corrupt: {0}")]
    BadCounter(#[from] std::num::ParseIntError),
}

/// Atomic-replace write: temp file in the target's directory, fsync, rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = dir.unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
