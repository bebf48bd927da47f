pub mod tlg;
mod tlg5;

use crate::error::Result;
use tlg::{TlgFormat, TlgImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMagic {
    Tlg(TlgFormat),
    Unrecognized,
}

impl ResourceMagic {
    pub fn parse_magic(buf: &[u8]) -> Self {
        match TlgFormat::detect(buf) {
            Some(format) => Self::Tlg(format),
            None => Self::Unrecognized,
        }
    }

    pub fn parse(&self, buf: &[u8]) -> Result<ResourceType> {
        match self {
            Self::Tlg(_) => {
                let image = TlgImage::from_bytes(buf)?;
                Ok(ResourceType::RgbaImage { image })
            }
            Self::Unrecognized => Ok(ResourceType::Other),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ResourceType {
    RgbaImage { image: TlgImage },
    Other,
}
