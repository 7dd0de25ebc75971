// crates/workflow-harness/src/limits.rs
// ============================================================================
// Module: Bounded Reads
// Description: Size-limited file reads shared by the fixture and the decoder.
// Purpose: Fail closed on oversized files instead of buffering them whole.
// Dependencies: std
// ============================================================================

use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use crate::error::FileAccessError;

/// Errors returned by bounded file reads.
#[derive(Debug)]
pub(crate) enum ReadLimitError {
    /// File I/O failure, including a missing file.
    Io(io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

impl ReadLimitError {
    /// Attaches the read path, producing a [`FileAccessError`].
    pub(crate) fn into_file_access(self, path: PathBuf) -> FileAccessError {
        match self {
            Self::Io(source) => FileAccessError::Io {
                path,
                source,
            },
            Self::TooLarge {
                size,
                limit,
            } => FileAccessError::TooLarge {
                path,
                size,
                limit,
            },
        }
    }
}

/// Reads a file from disk while enforcing a hard size limit.
pub(crate) fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}
