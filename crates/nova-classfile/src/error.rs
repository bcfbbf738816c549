use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    UnexpectedEof,
    TrailingBytes(usize),
    InvalidMagic(u32),
    UnsupportedVersion {
        major: u16,
        minor: u16,
    },
    InvalidConstantPoolIndex(u16),
    InvalidConstantPoolTag(u8),
    ConstantPoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    InvalidModifiedUtf8,
    InvalidDescriptor(String),
    InvalidSignature {
        signature: String,
        offset: usize,
        reason: &'static str,
    },
    MalformedAttribute(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedEof => write!(f, "unexpected end of input"),
            Error::TrailingBytes(n) => write!(f, "{n} unexpected trailing bytes"),
            Error::InvalidMagic(magic) => write!(f, "invalid classfile magic: 0x{magic:08x}"),
            Error::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported classfile version {major}.{minor}")
            }
            Error::InvalidConstantPoolIndex(index) => {
                write!(f, "invalid constant pool index: {index}")
            }
            Error::InvalidConstantPoolTag(tag) => write!(f, "invalid constant pool tag: {tag}"),
            Error::ConstantPoolTypeMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "constant pool type mismatch at index {index}: expected {expected}, found {found}"
            ),
            Error::InvalidModifiedUtf8 => write!(f, "invalid modified UTF-8 constant"),
            Error::InvalidDescriptor(desc) => write!(f, "invalid descriptor: {desc}"),
            Error::InvalidSignature {
                signature,
                offset,
                reason,
            } => write!(f, "invalid signature `{signature}` at offset {offset}: {reason}"),
            Error::MalformedAttribute(name) => write!(f, "malformed {name} attribute"),
        }
    }
}

impl std::error::Error for Error {}
