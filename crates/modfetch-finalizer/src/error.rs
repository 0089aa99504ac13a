use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("filesystem error during finalize")]
    Fs(#[from] modfetch_fs::Error),

    #[error("verification error during finalize")]
    Verify(#[from] modfetch_verify::VerificationError),

    #[error("{path}: safetensors file is incomplete — declares {declared} bytes of tensor data but only {actual} are present")]
    SafetensorsIncomplete { path: PathBuf, declared: u64, actual: u64 },

    #[error("{path}: malformed safetensors header: {reason}")]
    SafetensorsMalformed { path: PathBuf, reason: String },

    #[error("io error at {path}")]
    Io { path: PathBuf, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
