//! Embedded JPEG preview discovery.
//!
//! RAW containers (CR2, NEF, ARW, DNG, ...) carry one or more JPEG previews
//! next to the sensor data, and ordinary JPEGs usually carry an EXIF
//! thumbnail in their APP1 segment. Both are found by walking JPEG marker
//! segments from every Start-Of-Image candidate, which keeps nested
//! thumbnails from truncating the outer stream.

use std::ops::Range;

const SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Returns the byte range of every well-formed JPEG stream in `buffer`.
///
/// Streams nested inside a found stream are reported too, so a JPEG with
/// an EXIF thumbnail yields two ranges.
pub fn find_jpeg_streams(buffer: &[u8]) -> Vec<Range<usize>> {
    let mut streams = Vec::new();
    let mut pos = 0;
    while let Some(offset) = find_soi(&buffer[pos..]) {
        let start = pos + offset;
        if let Some(end) = jpeg_extent(buffer, start) {
            streams.push(start..end);
        }
        pos = start + SOI.len();
    }
    streams
}

/// Largest JPEG stream that does not start at offset zero.
///
/// For a RAW container this is the full-size preview; for a plain JPEG it is
/// the embedded thumbnail, if any.
pub fn largest_embedded_jpeg(buffer: &[u8]) -> Option<&[u8]> {
    find_jpeg_streams(buffer)
        .into_iter()
        .filter(|range| range.start > 0)
        .max_by_key(|range| range.len())
        .map(|range| &buffer[range])
}

/// Largest JPEG stream anywhere in `buffer`, including one at offset zero.
pub fn largest_jpeg(buffer: &[u8]) -> Option<&[u8]> {
    find_jpeg_streams(buffer)
        .into_iter()
        .max_by_key(|range| range.len())
        .map(|range| &buffer[range])
}

fn find_soi(haystack: &[u8]) -> Option<usize> {
    haystack.windows(SOI.len()).position(|window| window == SOI)
}

/// End offset (exclusive) of the JPEG stream starting at `start`, or `None`
/// when the segments do not parse.
fn jpeg_extent(buffer: &[u8], start: usize) -> Option<usize> {
    let mut pos = start + 2;
    loop {
        if *buffer.get(pos)? != 0xFF {
            return None;
        }
        while *buffer.get(pos)? == 0xFF {
            pos += 1;
        }
        let marker = *buffer.get(pos)?;
        pos += 1;

        match marker {
            0xD9 => return Some(pos),
            0x01 | 0xD0..=0xD7 => {}
            0xDA => {
                pos += segment_length(buffer, pos)?;
                pos = skip_entropy_data(buffer, pos)?;
            }
            _ => {
                pos += segment_length(buffer, pos)?;
            }
        }
    }
}

fn segment_length(buffer: &[u8], pos: usize) -> Option<usize> {
    let high = *buffer.get(pos)?;
    let low = *buffer.get(pos + 1)?;
    let length = u16::from_be_bytes([high, low]) as usize;
    (length >= 2).then_some(length)
}

/// Advances over entropy-coded scan data to the next real marker.
fn skip_entropy_data(buffer: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        if *buffer.get(pos)? != 0xFF {
            pos += 1;
            continue;
        }
        match *buffer.get(pos + 1)? {
            0x00 | 0xD0..=0xD7 => pos += 2,
            0xFF => pos += 1,
            _ => return Some(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ImageBuffer, Rgb};

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 255) as u8, (y % 255) as u8, 128])
        });
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode_image(&img)
            .unwrap();
        out
    }

    #[test]
    fn finds_single_stream() {
        let data = jpeg(32, 16);
        let streams = find_jpeg_streams(&data);
        assert_eq!(streams, vec![0..data.len()]);
        assert_eq!(largest_jpeg(&data).map(<[u8]>::len), Some(data.len()));
        assert!(largest_embedded_jpeg(&data).is_none());
    }

    #[test]
    fn picks_largest_preview_in_container() {
        let small = jpeg(16, 16);
        let large = jpeg(256, 128);

        let mut container = b"II*\0 fake raw header".to_vec();
        container.extend_from_slice(&small);
        container.extend_from_slice(&[0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD9]);
        container.extend_from_slice(&large);
        container.extend_from_slice(b"sensor data");

        let preview = largest_embedded_jpeg(&container).unwrap();
        assert_eq!(preview, large.as_slice());

        let decoded = image::load_from_memory(preview).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (256, 128));
    }

    #[test]
    fn truncated_stream_is_ignored() {
        let full = jpeg(64, 64);
        let mut container = vec![0u8; 8];
        container.extend_from_slice(&full[..full.len() / 2]);
        assert!(largest_embedded_jpeg(&container).is_none());
    }
}
