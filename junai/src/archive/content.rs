use super::entry::{Extractable, FileType, Location};
use crate::{
    cursor::ByteCursor,
    error::{JunaiError, Result},
    util,
};
use encoding_rs::SHIFT_JIS;
use once_cell::sync::Lazy;

pub const GAME_TITLE: &str = "辻堂さんの純愛ロード";

pub static SCRIPT_HASH: Lazy<u64> =
    Lazy::new(|| util::crc64(&SHIFT_JIS.encode(GAME_TITLE).0));

pub fn read_content<T: AsRef<[u8]>>(
    cursor: &mut ByteCursor<T>,
    entry: &Extractable,
) -> Result<Vec<u8>> {
    let location = entry.location.ok_or_else(|| {
        JunaiError::InvalidState(format!(
            "Entry {:016X} has no content location",
            entry.name_hash
        ))
    })?;
    let mut content = cursor
        .peek(location.offset as usize)
        .read_bytes(location.size_compressed as usize)?
        .to_vec();
    match entry.file_type {
        FileType::Compressed => {
            transform_script_content(&mut content, entry.name_hash);
            util::zlib_decompress(&content)
        }
        FileType::Obfuscated => {
            transform_regular_content(&mut content, entry_name(entry)?)?;
            Ok(content)
        }
        FileType::Plain => Ok(content),
    }
}

pub fn write_content(
    cursor: &mut ByteCursor<Vec<u8>>,
    entry: &mut Extractable,
    content: &[u8],
) -> Result<()> {
    let offset = util::checked_u32(cursor.tell(), "Content offset")?;
    let size_original = util::checked_u32(content.len(), "Content size")?;
    let data = match entry.file_type {
        FileType::Compressed => {
            let mut data = util::zlib_compress(content)?;
            transform_script_content(&mut data, entry.name_hash);
            data
        }
        FileType::Obfuscated => {
            let mut data = content.to_vec();
            transform_regular_content(&mut data, entry_name(entry)?)?;
            data
        }
        FileType::Plain => content.to_vec(),
    };
    cursor.write_bytes(&data);
    entry.location = Some(Location {
        offset,
        size_compressed: util::checked_u32(data.len(), "Content size")?,
        size_original,
    });
    Ok(())
}

fn entry_name(entry: &Extractable) -> Result<&str> {
    entry.file_name.as_deref().ok_or_else(|| {
        JunaiError::InvalidState(format!(
            "Obfuscated entry {:016X} needs a file name",
            entry.name_hash
        ))
    })
}

pub fn transform_script_content(data: &mut [u8], name_hash: u64) {
    let key = ((name_hash ^ *SCRIPT_HASH) as u32).to_le_bytes();
    data.chunks_exact_mut(4).for_each(|chunk| {
        chunk.iter_mut().zip(key.iter()).for_each(|(b, k)| *b ^= k);
    });
}

/// The last name byte and the remainder after the last full block are never
/// used.
pub fn transform_regular_content(data: &mut [u8], file_name: &str) -> Result<()> {
    let name = util::encode_name(file_name)?;
    if name.len() < 2 {
        return Err(JunaiError::InvalidName(file_name.to_owned()));
    }
    let block_len = data.len() / name.len();
    if block_len == 0 {
        return Ok(());
    }
    data.chunks_mut(block_len)
        .zip(name[..name.len() - 1].iter())
        .for_each(|(block, key)| block.iter_mut().for_each(|b| *b ^= key));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 37 + 11) as u8).collect()
    }

    #[test]
    fn script_hash_is_stable() {
        assert_eq!(*SCRIPT_HASH, util::crc64(&util::encode_name(GAME_TITLE).unwrap()));
    }

    #[test]
    fn regular_transform_follows_name_blocks() {
        let original = sample(10);
        let mut data = original.clone();
        transform_regular_content(&mut data, "A.TXT").unwrap();

        let keys = [b'A', b'A', b'.', b'.', b'T', b'T', b'X', b'X'];
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(data[i], original[i] ^ key, "byte {}", i);
        }
        assert_eq!(data[8..], original[8..]);
    }

    #[test]
    fn regular_transform_is_an_involution() {
        for len in [0, 1, 5, 6, 64, 1000, 1001].iter() {
            for name in ["ab", "script\\main.txt", "立ち絵.tlg"].iter() {
                let original = sample(*len);
                let mut data = original.clone();
                transform_regular_content(&mut data, name).unwrap();
                transform_regular_content(&mut data, name).unwrap();
                assert_eq!(data, original);
            }
        }
    }

    #[test]
    fn short_names_are_rejected() {
        for name in ["", "a"].iter() {
            match transform_regular_content(&mut sample(8), name) {
                Err(JunaiError::InvalidName(n)) => assert_eq!(n, *name),
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn script_transform_keeps_tail() {
        let original = sample(7);
        let mut data = original.clone();
        transform_script_content(&mut data, 0x1122334455667788);
        let key = ((0x1122334455667788 ^ *SCRIPT_HASH) as u32).to_le_bytes();
        for i in 0..4 {
            assert_eq!(data[i], original[i] ^ key[i]);
        }
        assert_eq!(data[4..], original[4..]);

        transform_script_content(&mut data, 0x1122334455667788);
        assert_eq!(data, original);
    }

    #[test]
    fn compressed_round_trip() {
        for len in [0, 3, 4, 4097].iter() {
            let content = sample(*len);
            let mut entry =
                Extractable::from_name("scenario.ks", FileType::Compressed).unwrap();
            let mut cursor = ByteCursor::new(vec![0xEE; 16]);
            cursor.seek(16);
            write_content(&mut cursor, &mut entry, &content).unwrap();

            let location = entry.location.unwrap();
            assert_eq!(location.offset, 16);
            assert_eq!(location.size_original as usize, content.len());
            assert_eq!(
                location.size_compressed as usize,
                cursor.len() - 16
            );

            cursor.seek(3);
            assert_eq!(read_content(&mut cursor, &entry).unwrap(), content);
            assert_eq!(cursor.tell(), 3);
        }
    }

    #[test]
    fn plain_and_obfuscated_round_trip() {
        let content = sample(300);
        let mut cursor = ByteCursor::new(Vec::new());
        let mut plain = Extractable::from_name("voice.ogg", FileType::Plain).unwrap();
        let mut obfuscated =
            Extractable::from_name("image\\bg.png", FileType::Obfuscated).unwrap();
        write_content(&mut cursor, &mut plain, &content).unwrap();
        write_content(&mut cursor, &mut obfuscated, &content).unwrap();

        let stored = cursor.get_ref();
        assert_eq!(stored[..300], content[..]);
        assert_ne!(stored[300..], content[..]);
        for entry in [&plain, &obfuscated].iter() {
            let location = entry.location.unwrap();
            assert_eq!(location.size_compressed, 300);
            assert_eq!(location.size_original, 300);
            assert_eq!(read_content(&mut cursor, entry).unwrap(), content);
        }
    }

    #[test]
    fn corrupt_stream_is_reported() {
        let mut entry = Extractable::new(0x42, FileType::Compressed, None);
        entry.location = Some(Location {
            offset: 0,
            size_compressed: 8,
            size_original: 8,
        });
        let mut cursor = ByteCursor::new(vec![0x55; 8]);
        match read_content(&mut cursor, &entry) {
            Err(JunaiError::CorruptContent(_)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn content_past_end_is_truncated_input() {
        let mut entry = Extractable::new(0x42, FileType::Plain, Some("ab".into()));
        entry.location = Some(Location {
            offset: 4,
            size_compressed: 8,
            size_original: 8,
        });
        let mut cursor = ByteCursor::new(vec![0; 10]);
        match read_content(&mut cursor, &entry) {
            Err(JunaiError::TruncatedInput { offset: 4, needed: 8, available: 6 }) => (),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(cursor.tell(), 0);
    }
}
