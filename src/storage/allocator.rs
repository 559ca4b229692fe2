//! Durable monotonic profile-id allocator.
//!
//! State is one plain-text decimal in `.last_id`; an absent file means -1
//! ("no id issued"). `allocate` persists the advanced counter *before*
//! handing the id out, so a crash between allocation and record persistence
//! only ever creates a gap, never a collision.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::{write_atomic, StoreError};

pub struct IdAllocator {
    path: PathBuf,
    last_id: i64,
}

impl IdAllocator {
    /// Open (or initialize) the allocator backed by `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let last_id = match std::fs::read_to_string(&path) {
            Ok(raw) => raw.trim().parse::<i64>()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => -1,
            Err(e) => return Err(e.into()),
        };
        debug!("id allocator opened at {} (last_id={})", path.display(), last_id);
        Ok(Self { path, last_id })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Highest id ever issued, -1 when none.
    pub fn last_id(&self) -> i64 {
        self.last_id
    }

    /// Issue the next id. The new counter value is durable before this
    /// returns; on error nothing was issued.
    pub fn allocate(&mut self) -> Result<u64, StoreError> {
        let next = self.last_id + 1;
        write_atomic(&self.path, next.to_string().as_bytes())?;
        self.last_id = next;
        Ok(next as u64)
    }
}
