#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("state store I/O error")]
    Db(#[from] sled::Error),

    #[error("state record corrupted: {0}")]
    Corrupted(String),

    #[error("no record for this download")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, Error>;
