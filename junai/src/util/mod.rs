pub mod image;

use crate::error::{JunaiError, Result};
use anyhow::Context;
use encoding_rs::SHIFT_JIS;
use std::{borrow::Cow, convert::TryFrom, fs::File, io::Write, path::Path};

pub fn crc64(buf: &[u8]) -> u64 {
    use crc_any::CRC;

    let mut crc64 = CRC::crc64we();
    crc64.digest(buf);
    crc64.get_crc()
}

pub fn zlib_decompress(buf: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    let mut decoder = ZlibDecoder::new(buf);
    let mut ret = Vec::with_capacity(buf.len());
    decoder
        .read_to_end(&mut ret)
        .map_err(JunaiError::CorruptContent)?;
    Ok(ret)
}

pub fn zlib_compress(buf: &[u8]) -> Result<Vec<u8>> {
    use flate2::{write::ZlibEncoder, Compression};

    let mut encoder =
        ZlibEncoder::new(Vec::with_capacity(buf.len()), Compression::default());
    encoder.write_all(buf)?;
    Ok(encoder.finish()?)
}

pub fn encode_name(name: &str) -> Result<Cow<'_, [u8]>> {
    let (bytes, _, had_errors) = SHIFT_JIS.encode(name);
    if had_errors {
        Err(JunaiError::UnencodableName(name.to_owned()))
    } else {
        Ok(bytes)
    }
}

pub fn name_hash(name: &str) -> Result<u64> {
    Ok(crc64(&encode_name(name)?))
}

pub(crate) fn checked_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        JunaiError::InvalidState(format!(
            "{} does not fit in 32 bits: {:#X}",
            what, value
        ))
    })
}

pub fn save_file(path: &Path, buf: &[u8]) -> anyhow::Result<()> {
    std::fs::create_dir_all(
        path.parent().context("Could not get parent directory")?,
    )?;
    File::create(path)
        .with_context(|| format!("Could not create {:?}", path))?
        .write_all(buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc64_matches_reference_check_value() {
        // CRC-64/WE check value
        assert_eq!(crc64(b"123456789"), 0x62EC59E3F1A4F00A);
    }

    #[test]
    fn zlib_round_trip() {
        let data = b"abcabcabcabcabcabc 0123456789".repeat(20);
        let compressed = zlib_compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(zlib_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn zlib_garbage_is_corrupt_content() {
        match zlib_decompress(&[0x12, 0x34, 0x56, 0x78, 0x9A]) {
            Err(JunaiError::CorruptContent(_)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn names_are_shift_jis() {
        assert_eq!(&*encode_name("A.TXT").unwrap(), b"A.TXT");
        assert_eq!(&*encode_name("あ").unwrap(), &[0x82, 0xA0]);
        assert_eq!(
            name_hash("bg01.tlg").unwrap(),
            crc64(b"bg01.tlg")
        );
        match encode_name("\u{1F600}") {
            Err(JunaiError::UnencodableName(_)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
