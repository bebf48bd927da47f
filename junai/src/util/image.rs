use anyhow::Context;
use ::image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbaImage};

pub fn raw_to_png(
    width: u32,
    height: u32,
    pixels: Vec<u8>,
) -> anyhow::Result<Vec<u8>> {
    let image = RgbaImage::from_raw(width, height, pixels)
        .context("Invalid image resolution")?;
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf)
}

pub fn png_to_raw(buf: &[u8]) -> anyhow::Result<(u32, u32, Vec<u8>)> {
    let image =
        ::image::load_from_memory_with_format(buf, ImageFormat::Png)?.to_rgba8();
    Ok((image.width(), image.height(), image.into_raw()))
}
