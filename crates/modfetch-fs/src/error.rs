use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to write {path}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read {path}")]
    Read { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
            || matches!(self, Error::Write { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    pub fn is_out_of_space(&self) -> bool {
        const ENOSPC: i32 = 28;
        let raw = match self {
            Error::Write { source, .. } | Error::Read { source, .. } => source.raw_os_error(),
        };
        raw == Some(ENOSPC)
    }
}
