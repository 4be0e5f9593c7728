//! Streaming SHA-256 content digests.

use std::fmt::{self, Display, Formatter};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{FsOpsError, FsOpsResult};

/// Lowercase hex SHA-256 of a file's full contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Borrow the hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters of the digest, used for filename disambiguation.
    #[must_use]
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Consume the digest into its hex string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hash a file by streaming its contents; memory use does not grow with file size.
///
/// # Errors
///
/// Returns an error when the file cannot be opened or read.
pub fn digest_file(path: &Path) -> FsOpsResult<Digest> {
    let file = File::open(path).map_err(|source| FsOpsError::io("hash.open", path, source))?;
    digest_reader(BufReader::with_capacity(64 * 1024, file))
        .map_err(|source| FsOpsError::io("hash.read", path, source))
}

/// Hash everything readable from `reader`.
///
/// # Errors
///
/// Propagates read failures from the reader.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(Digest(format!("{:x}", hasher.finalize())))
}
