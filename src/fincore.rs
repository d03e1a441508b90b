//! Page cache helpers.
//!
//! The real implementations need mincore(2)/posix_fadvise(2) plumbing
//! that is deliberately out of scope here; the subcommands exist but
//! report themselves unsupported.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("page cache inspection is not supported by this build")]
pub struct Unsupported;

pub fn fincore(_path: &Path) -> Result<(), Unsupported> {
    Err(Unsupported)
}

pub fn uncache(_path: &Path) -> Result<(), Unsupported> {
    Err(Unsupported)
}
