use thiserror::Error;

use crate::name::DotName;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("malformed class file: {0}")]
    MalformedInput(nova_classfile::Error),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("unsupported index version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u8, supported: u8 },
    #[error("corrupt index: {0}")]
    CorruptIndex(String),
    #[error("class {0} is already indexed")]
    DuplicateClass(DotName),
    #[error("invalid {0}")]
    InvalidModel(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<nova_classfile::Error> for IndexError {
    fn from(err: nova_classfile::Error) -> Self {
        match err {
            nova_classfile::Error::InvalidSignature { .. } => {
                IndexError::MalformedSignature(err.to_string())
            }
            other => IndexError::MalformedInput(other),
        }
    }
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::CorruptIndex(err.to_string())
    }
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
