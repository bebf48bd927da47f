use thiserror::Error;

#[derive(Debug, Error)]
pub enum JunaiError {
    #[error(
        "Truncated input at offset {offset:#X}: needed {needed} bytes, {available} available"
    )]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Unknown file type {value:#X} for entry {name_hash:016X}")]
    UnknownFileType { name_hash: u64, value: u8 },
    #[error("Unknown TLG sub-format: {0:X?}")]
    UnknownSubFormat(Vec<u8>),
    #[error("Not a TLG image: {0:X?}")]
    NotATlgImage(Vec<u8>),
    #[error("Unsupported chunk: {0:X?}")]
    UnsupportedChunk([u8; 4]),
    #[error("Corrupt tag data: {0}")]
    CorruptTagData(String),
    #[error("Corrupt content: {0}")]
    CorruptContent(#[source] std::io::Error),
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("File name cannot be encoded as Shift-JIS: {0:?}")]
    UnencodableName(String),
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
    #[error("Pixel codec failure: {0}")]
    PixelCodec(anyhow::Error),
    #[error(transparent)]
    Parse(#[from] scroll::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JunaiError>;
