//! Uncompressed 24-bit TGA output for external lightmap pages.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writes an RGB buffer as a bottom-left-origin uncompressed TGA.
/// `flip` mirrors the rows so engines expecting top-left data can load the
/// file without a runtime flip.
pub fn write_tga(
    path: impl AsRef<Path>,
    width: usize,
    height: usize,
    rgb: &[u8],
    flip: bool,
) -> io::Result<()> {
    debug_assert_eq!(rgb.len(), width * height * 3);
    let mut out = BufWriter::new(File::create(path)?);

    let mut header = [0u8; 18];
    header[2] = 2; // uncompressed truecolor
    header[12] = (width & 0xff) as u8;
    header[13] = (width >> 8) as u8;
    header[14] = (height & 0xff) as u8;
    header[15] = (height >> 8) as u8;
    header[16] = 24;
    out.write_all(&header)?;

    // TGA stores rows bottom-up and pixels as BGR.
    let rows: Vec<usize> = if flip {
        (0..height).collect()
    } else {
        (0..height).rev().collect()
    };
    let mut row_buf = Vec::with_capacity(width * 3);
    for y in rows {
        row_buf.clear();
        for x in 0..width {
            let i = (y * width + x) * 3;
            row_buf.push(rgb[i + 2]);
            row_buf.push(rgb[i + 1]);
            row_buf.push(rgb[i]);
        }
        out.write_all(&row_buf)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_pixel_order_roundtrip() {
        let dir = std::env::temp_dir().join("lumel_tga_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.tga");
        // 2x2: red, green / blue, white, row-major top-down.
        let rgb = [
            255u8, 0, 0, 0, 255, 0, //
            0, 0, 255, 255, 255, 255,
        ];
        write_tga(&path, 2, 2, &rgb, false).unwrap();
        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 18 + 2 * 2 * 3);
        assert_eq!(data[2], 2);
        assert_eq!(u16::from_le_bytes([data[12], data[13]]), 2);
        assert_eq!(u16::from_le_bytes([data[14], data[15]]), 2);
        assert_eq!(data[16], 24);
        // First stored row is the bottom row (blue), BGR order.
        assert_eq!(&data[18..21], &[255, 0, 0]);
        assert_eq!(&data[21..24], &[255, 255, 255]);
        std::fs::remove_file(&path).unwrap();
    }
}
