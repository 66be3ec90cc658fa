use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log root {0} exists and is not a directory")]
    NotADirectory(PathBuf),

    #[error("malformed segment file name: {0}")]
    MalformedName(String),

    #[error("corrupt segment {segment}: {detail}")]
    Corrupt { segment: String, detail: String },

    #[error("record of {len} bytes exceeds frame capacity")]
    RecordTooLarge { len: usize },

    #[error("log is closed")]
    Closed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
