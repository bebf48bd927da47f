use super::tlg::{TlgImage, TLG5_MAGIC};
use crate::{
    cursor::ByteCursor,
    error::{JunaiError, Result},
    util,
};
use scroll::{Pread, Pwrite, LE};

const HEADER_SIZE: usize = 13;
const DICTIONARY_SIZE: usize = 4096;
const BLOCK_HEIGHT: u32 = 4;
// A three byte back reference yields at most 18 + 255 bytes
const MAX_LZSS_EXPANSION: usize = (18 + 255) / 3 + 1;

#[derive(Debug, Clone, Copy, Pread, Pwrite)]
struct Tlg5Header {
    channel_count: u8,
    width: u32,
    height: u32,
    block_height: u32,
}

#[derive(Debug)]
struct LzssDictionary {
    window: [u8; DICTIONARY_SIZE],
    position: usize,
}

impl LzssDictionary {
    fn new() -> Self {
        Self {
            window: [0; DICTIONARY_SIZE],
            position: 0,
        }
    }

    fn push(&mut self, b: u8) {
        self.window[self.position] = b;
        self.position = (self.position + 1) & (DICTIONARY_SIZE - 1);
    }

    fn decompress(&mut self, input: &[u8], output_size: usize) -> Vec<u8> {
        let mut output = Vec::with_capacity(output_size);
        let mut input = input.iter().copied();
        let mut flags = 0u32;
        'outer: while output.len() < output_size {
            flags >>= 1;
            if flags & 0x100 == 0 {
                match input.next() {
                    Some(b) => flags = b as u32 | 0xFF00,
                    None => break,
                }
            }
            if flags & 1 == 0 {
                match input.next() {
                    Some(b) => {
                        output.push(b);
                        self.push(b);
                    }
                    None => break,
                }
                continue;
            }
            let (x0, x1) = match (input.next(), input.next()) {
                (Some(x0), Some(x1)) => (x0 as usize, x1 as usize),
                _ => break,
            };
            let mut position = x0 | ((x1 & 0xF) << 8);
            let mut length = 3 + (x1 >> 4);
            if length == 18 {
                match input.next() {
                    Some(b) => length += b as usize,
                    None => break,
                }
            }
            for _ in 0..length {
                if output.len() >= output_size {
                    break 'outer;
                }
                let b = self.window[position];
                output.push(b);
                self.push(b);
                position = (position + 1) & (DICTIONARY_SIZE - 1);
            }
        }
        output.resize(output_size, 0);
        output
    }
}

// Every flag byte announces eight literals
fn compress_literals(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() + input.len() / 8 + 1);
    for chunk in input.chunks(8) {
        output.push(0);
        output.extend_from_slice(chunk);
    }
    output
}

fn oversized(header: &Tlg5Header) -> JunaiError {
    JunaiError::PixelCodec(anyhow::anyhow!(
        "TLG5 image of {}x{} with block height {} does not fit the input",
        header.width,
        header.height,
        header.block_height
    ))
}

pub(crate) fn decode(buf: &[u8]) -> Result<TlgImage> {
    let mut cursor = ByteCursor::new(buf);
    cursor.seek(TLG5_MAGIC.len());
    let header = cursor
        .read_bytes(HEADER_SIZE)?
        .pread_with::<Tlg5Header>(0, LE)?;
    log::debug!("Header: {:#?}", header);

    let channel_count = header.channel_count as usize;
    if channel_count != 3 && channel_count != 4 {
        return Err(JunaiError::Unimplemented(format!(
            "TLG5 with {} channels",
            channel_count
        )));
    }
    if header.block_height == 0 {
        return Err(JunaiError::PixelCodec(anyhow::anyhow!(
            "TLG5 block height is zero"
        )));
    }
    let width = header.width as usize;
    let height = header.height as usize;
    let block_height = header.block_height as usize;
    let use_alpha = channel_count == 4;

    let pixel_count = width
        .checked_mul(height)
        .ok_or_else(|| oversized(&header))?;
    let pixels_size = pixel_count
        .checked_mul(4)
        .ok_or_else(|| oversized(&header))?;
    // A block never holds more rows than the image
    let block_size = width
        .checked_mul(block_height.min(height))
        .ok_or_else(|| oversized(&header))?;
    let block_count = height / block_height + (height % block_height != 0) as usize;
    let table_size = block_count
        .checked_mul(4)
        .ok_or_else(|| oversized(&header))?;
    cursor.read_bytes(table_size)?;
    if pixel_count.saturating_mul(channel_count)
        > cursor.remaining().saturating_mul(MAX_LZSS_EXPANSION)
    {
        return Err(oversized(&header));
    }

    let mut pixels = vec![0u8; pixels_size];
    let mut dictionary = LzssDictionary::new();
    let mut channels: Vec<Vec<u8>> = vec![Vec::new(); 4];
    for block_y in (0..height).step_by(block_height) {
        for channel in channels.iter_mut().take(channel_count) {
            let mark = cursor.read_u8()?;
            let size = cursor.read_u32_le()? as usize;
            let data = cursor.read_bytes(size)?;
            *channel = if mark == 0 {
                dictionary.decompress(data, block_size)
            } else {
                let mut raw = data.to_vec();
                raw.resize(block_size, 0);
                raw
            };
        }

        for y in block_y..block_y.saturating_add(block_height).min(height) {
            let row = (y - block_y) * width;
            let mut prev = [0u8; 4];
            for x in 0..width {
                let g = channels[1][row + x];
                let b = channels[0][row + x].wrapping_add(g);
                let r = channels[2][row + x].wrapping_add(g);
                let a = if use_alpha { channels[3][row + x] } else { 0xFF };
                for (p, v) in prev.iter_mut().zip([r, g, b, a].iter()) {
                    *p = p.wrapping_add(*v);
                }
                let index = (y * width + x) * 4;
                for c in 0..4 {
                    let top = if y > 0 { pixels[index - width * 4 + c] } else { 0 };
                    pixels[index + c] = prev[c].wrapping_add(top);
                }
                if !use_alpha {
                    pixels[index + 3] = 0xFF;
                }
            }
        }
    }
    Ok(TlgImage::new(header.width, header.height, pixels))
}

pub(crate) fn encode(image: &TlgImage) -> Result<Vec<u8>> {
    let width = image.width as usize;
    let height = image.height as usize;
    if image.pixels.len() != width * height * 4 {
        return Err(JunaiError::InvalidState(format!(
            "Pixel buffer of {} bytes does not match {}x{} RGBA",
            image.pixels.len(),
            width,
            height
        )));
    }
    let block_height = BLOCK_HEIGHT as usize;
    let block_size = width * block_height;

    let mut blocks = Vec::new();
    for block_y in (0..height).step_by(block_height) {
        let mut channels = vec![vec![0u8; block_size]; 4];
        for y in block_y..(block_y + block_height).min(height) {
            let row = (y - block_y) * width;
            let mut prev = [0u8; 4];
            for x in 0..width {
                let index = (y * width + x) * 4;
                let mut delta = [0u8; 4];
                for c in 0..4 {
                    let top = if y > 0 {
                        image.pixels[index - width * 4 + c]
                    } else {
                        0
                    };
                    delta[c] = image.pixels[index + c].wrapping_sub(top);
                }
                let mut residual = [0u8; 4];
                for c in 0..4 {
                    residual[c] = delta[c].wrapping_sub(prev[c]);
                }
                prev = delta;
                let [r, g, b, a] = residual;
                channels[0][row + x] = b.wrapping_sub(g);
                channels[1][row + x] = g;
                channels[2][row + x] = r.wrapping_sub(g);
                channels[3][row + x] = a;
            }
        }
        let mut block = Vec::new();
        for channel in &channels {
            let data = compress_literals(channel);
            block.push(0);
            block.extend_from_slice(
                &util::checked_u32(data.len(), "TLG5 block size")?.to_le_bytes(),
            );
            block.extend_from_slice(&data);
        }
        blocks.push(block);
    }

    let header = Tlg5Header {
        channel_count: 4,
        width: image.width,
        height: image.height,
        block_height: BLOCK_HEIGHT,
    };
    let mut header_buf = [0; HEADER_SIZE];
    header_buf.pwrite_with(header, 0, LE)?;

    let mut cursor = ByteCursor::new(Vec::new());
    cursor.write_bytes(TLG5_MAGIC);
    cursor.write_bytes(&header_buf);
    for block in &blocks {
        cursor.write_u32_le(util::checked_u32(block.len(), "TLG5 block size")?)?;
    }
    blocks.iter().for_each(|block| cursor.write_bytes(block));
    Ok(cursor.into_inner())
}
