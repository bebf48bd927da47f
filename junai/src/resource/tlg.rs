use super::tlg5;
use crate::{
    cursor::ByteCursor,
    error::{JunaiError, Result},
    util,
};
use serde::{Deserialize, Serialize};
use tlg_rs::formats::tlg6::Tlg6;

pub const TLG0_MAGIC: &[u8] = b"TLG0.0\x00sds\x1a";
pub const TLG5_MAGIC: &[u8] = b"TLG5.0\x00raw\x1a";
pub const TLG6_MAGIC: &[u8] = b"TLG6.0\x00raw\x1a";

const TAGS_CHUNK: [u8; 4] = *b"tags";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlgFormat {
    Tlg0,
    Tlg5,
    Tlg6,
}

impl TlgFormat {
    pub fn detect(buf: &[u8]) -> Option<Self> {
        if buf.starts_with(TLG0_MAGIC) {
            Some(Self::Tlg0)
        } else if buf.starts_with(TLG5_MAGIC) {
            Some(Self::Tlg5)
        } else if buf.starts_with(TLG6_MAGIC) {
            Some(Self::Tlg6)
        } else {
            None
        }
    }
}

pub fn is_tlg(buf: &[u8]) -> bool {
    TlgFormat::detect(buf).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerFormat {
    Tlg5,
    Tlg6,
}

impl InnerFormat {
    pub fn detect(buf: &[u8]) -> Option<Self> {
        match TlgFormat::detect(buf)? {
            TlgFormat::Tlg5 => Some(Self::Tlg5),
            TlgFormat::Tlg6 => Some(Self::Tlg6),
            TlgFormat::Tlg0 => None,
        }
    }

    pub fn decode(self, buf: &[u8]) -> Result<TlgImage> {
        match self {
            Self::Tlg5 => tlg5::decode(buf),
            Self::Tlg6 => decode_tlg6(buf),
        }
    }

    pub fn encode(self, image: &TlgImage) -> Result<Vec<u8>> {
        match self {
            Self::Tlg5 => tlg5::encode(image),
            Self::Tlg6 => Err(JunaiError::Unimplemented(String::from(
                "TLG6 encoding is not supported",
            ))),
        }
    }
}

fn decode_tlg6(buf: &[u8]) -> Result<TlgImage> {
    let buf = buf.to_vec();
    let decode = || -> anyhow::Result<TlgImage> {
        let image = Tlg6::from_bytes(&buf)?.to_rgba_image()?;
        Ok(TlgImage::new(image.width(), image.height(), image.into_raw()))
    };
    decode().map_err(JunaiError::PixelCodec)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Tag {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlgImage {
    pub width: u32,
    pub height: u32,
    /// RGBA, 4 bytes per pixel.
    pub pixels: Vec<u8>,
    pub tags: Vec<Tag>,
}

impl TlgImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
            tags: Vec::new(),
        }
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        match TlgFormat::detect(buf) {
            Some(TlgFormat::Tlg0) => Self::from_tlg0(buf),
            Some(TlgFormat::Tlg5) => InnerFormat::Tlg5.decode(buf),
            Some(TlgFormat::Tlg6) => InnerFormat::Tlg6.decode(buf),
            None => Err(JunaiError::NotATlgImage(magic_prefix(buf))),
        }
    }

    fn from_tlg0(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        cursor.seek(TLG0_MAGIC.len());
        let size = cursor.read_u32_le()? as usize;
        let inner = cursor.read_bytes(size)?;
        let format = InnerFormat::detect(inner)
            .ok_or_else(|| JunaiError::UnknownSubFormat(magic_prefix(inner)))?;
        log::debug!("TLG0 sub-format: {:?}, {} bytes", format, size);
        let mut image = format.decode(inner)?;
        image.tags = read_chunks(&mut cursor)?;
        Ok(image)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let inner = InnerFormat::Tlg5.encode(self)?;
        let mut cursor = ByteCursor::new(Vec::with_capacity(inner.len() + 64));
        cursor.write_bytes(TLG0_MAGIC);
        cursor.write_u32_le(util::checked_u32(inner.len(), "TLG sub-stream size")?)?;
        cursor.write_bytes(&inner);
        if !self.tags.is_empty() {
            let data = write_tags(&self.tags);
            cursor.write_bytes(&TAGS_CHUNK);
            cursor.write_u32_le(util::checked_u32(data.len(), "Tags chunk size")?)?;
            cursor.write_bytes(&data);
        }
        Ok(cursor.into_inner())
    }
}

fn magic_prefix(buf: &[u8]) -> Vec<u8> {
    buf.iter().take(TLG0_MAGIC.len()).copied().collect()
}

fn read_chunks(cursor: &mut ByteCursor<&[u8]>) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    while !cursor.is_empty() {
        let mut name = [0; 4];
        name.copy_from_slice(cursor.read_bytes(4)?);
        let size = cursor.read_u32_le()? as usize;
        let data = cursor.read_bytes(size)?;
        match name {
            TAGS_CHUNK => tags.extend(parse_tags(data)?),
            _ => return Err(JunaiError::UnsupportedChunk(name)),
        }
    }
    Ok(tags)
}

fn parse_tags(mut data: &[u8]) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    while !data.is_empty() {
        let (key, rest) = extract_string(data)?;
        let rest = match rest {
            [b'=', rest @ ..] => rest,
            _ => {
                return Err(JunaiError::CorruptTagData(format!(
                    "Expected '=' after key {:?}",
                    String::from_utf8_lossy(key)
                )))
            }
        };
        let (value, rest) = extract_string(rest)?;
        data = match rest {
            [] => rest,
            [b',', rest @ ..] => rest,
            _ => {
                return Err(JunaiError::CorruptTagData(format!(
                    "Expected ',' after value {:?}",
                    String::from_utf8_lossy(value)
                )))
            }
        };
        tags.push(Tag::new(key, value));
    }
    Ok(tags)
}

fn extract_string(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let colon = data.iter().position(|b| *b == b':').ok_or_else(|| {
        JunaiError::CorruptTagData(String::from("Missing ':' after length"))
    })?;
    let size = std::str::from_utf8(&data[..colon])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| {
            JunaiError::CorruptTagData(format!(
                "Invalid length {:?}",
                String::from_utf8_lossy(&data[..colon])
            ))
        })?;
    let rest = &data[colon + 1..];
    if size > rest.len() {
        return Err(JunaiError::CorruptTagData(format!(
            "Length {} exceeds remaining {} bytes",
            size,
            rest.len()
        )));
    }
    Ok(rest.split_at(size))
}

fn put_string(buf: &mut Vec<u8>, s: &[u8]) {
    buf.extend_from_slice(s.len().to_string().as_bytes());
    buf.push(b':');
    buf.extend_from_slice(s);
}

fn write_tags(tags: &[Tag]) -> Vec<u8> {
    tags.iter()
        .map(|tag| {
            let mut pair = Vec::new();
            put_string(&mut pair, &tag.key);
            pair.push(b'=');
            put_string(&mut pair, &tag.value);
            pair
        })
        .collect::<Vec<_>>()
        .join(&b',')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> TlgImage {
        let pixels = (0..width * height)
            .flat_map(|i| {
                let (x, y) = (i % width, i / width);
                vec![(x * 40) as u8, (y * 30) as u8, (x ^ y) as u8, 0xFF - x as u8]
            })
            .collect();
        TlgImage::new(width, height, pixels)
    }

    fn tlg0_with_chunk(name: &[u8], data: &[u8]) -> Vec<u8> {
        let inner = InnerFormat::Tlg5.encode(&gradient(2, 2)).unwrap();
        let mut buf = TLG0_MAGIC.to_vec();
        buf.extend_from_slice(&(inner.len() as u32).to_le_bytes());
        buf.extend_from_slice(&inner);
        buf.extend_from_slice(name);
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn detects_formats() {
        assert_eq!(TlgFormat::detect(b"TLG0.0\x00sds\x1a...."), Some(TlgFormat::Tlg0));
        assert_eq!(TlgFormat::detect(TLG5_MAGIC), Some(TlgFormat::Tlg5));
        assert_eq!(TlgFormat::detect(TLG6_MAGIC), Some(TlgFormat::Tlg6));
        assert_eq!(TlgFormat::detect(b"TLG6.0\x00raw"), None);
        assert_eq!(InnerFormat::detect(TLG0_MAGIC), None);
        assert!(!is_tlg(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn wrapper_round_trip_without_tags() {
        let image = gradient(5, 7);
        let buf = image.to_bytes().unwrap();
        assert!(buf.starts_with(TLG0_MAGIC));
        let size = u32::from_le_bytes([buf[11], buf[12], buf[13], buf[14]]) as usize;
        assert_eq!(buf.len(), TLG0_MAGIC.len() + 4 + size);
        assert_eq!(TlgImage::from_bytes(&buf).unwrap(), image);
    }

    #[test]
    fn wrapper_round_trip_with_tags() {
        let mut image = gradient(3, 9);
        image.tags = vec![Tag::new("orig_name", "foo.png")];
        let buf = image.to_bytes().unwrap();
        assert!(buf.ends_with(b"tags\x15\x00\x00\x009:orig_name=7:foo.png"));
        assert_eq!(TlgImage::from_bytes(&buf).unwrap(), image);
    }

    #[test]
    fn parses_multiple_tags() {
        let data = b"4:mode=3:add,0:=5:a,b=c";
        let buf = tlg0_with_chunk(b"tags", data);
        let image = TlgImage::from_bytes(&buf).unwrap();
        assert_eq!(
            image.tags,
            vec![Tag::new("mode", "add"), Tag::new("", "a,b=c")]
        );
        assert_eq!(write_tags(&image.tags), data.to_vec());
    }

    #[test]
    fn bare_tlg5_has_no_tags() {
        let image = gradient(4, 4);
        let buf = InnerFormat::Tlg5.encode(&image).unwrap();
        assert_eq!(TlgImage::from_bytes(&buf).unwrap(), image);
    }

    #[test]
    fn truncated_sub_stream_is_truncated_input() {
        let mut buf = TLG0_MAGIC.to_vec();
        buf.extend_from_slice(&[0x10, 0x00]);
        match TlgImage::from_bytes(&buf) {
            Err(JunaiError::TruncatedInput { offset: 11, needed: 4, .. }) => (),
            other => panic!("unexpected result: {:?}", other),
        }

        let mut buf = TLG0_MAGIC.to_vec();
        buf.extend_from_slice(&100u32.to_le_bytes());
        buf.extend_from_slice(TLG5_MAGIC);
        match TlgImage::from_bytes(&buf) {
            Err(JunaiError::TruncatedInput { offset: 15, needed: 100, available: 11 }) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_formats_and_chunks() {
        match TlgImage::from_bytes(b"BM\x00\x00") {
            Err(JunaiError::NotATlgImage(magic)) => assert_eq!(magic, b"BM\x00\x00"),
            other => panic!("unexpected result: {:?}", other),
        }

        let mut buf = TLG0_MAGIC.to_vec();
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(b"JUNK");
        match TlgImage::from_bytes(&buf) {
            Err(JunaiError::UnknownSubFormat(magic)) => assert_eq!(magic, b"JUNK"),
            other => panic!("unexpected result: {:?}", other),
        }

        match TlgImage::from_bytes(&tlg0_with_chunk(b"meta", b"")) {
            Err(JunaiError::UnsupportedChunk(name)) => assert_eq!(&name, b"meta"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn corrupt_tags_are_rejected() {
        for data in [
            &b"orig_name"[..],
            b"x:a=1:b",
            b"9:orig=7:foo.png",
            b"1:a-1:b",
            b"1:a=1:b;1:c=1:d",
        ]
        .iter()
        {
            match TlgImage::from_bytes(&tlg0_with_chunk(b"tags", data)) {
                Err(JunaiError::CorruptTagData(_)) => (),
                other => panic!("{:?}: unexpected result: {:?}", data, other),
            }
        }
    }

    #[test]
    fn tlg6_cannot_be_encoded() {
        match InnerFormat::Tlg6.encode(&gradient(1, 1)) {
            Err(JunaiError::Unimplemented(_)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
