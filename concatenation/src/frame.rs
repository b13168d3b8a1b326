//! Frame size computation and pixel data slicing.
//!
//! Pixel data is handled as raw native bytes in little endian.
//! With 1 bit allocated, pixels are packed eight per byte,
//! least significant bit first,
//! and frame boundaries do not have to fall on byte boundaries.

use crate::{InvalidImageDimensionsSnafu, Result, UnsupportedBitsAllocatedSnafu};
use dicom_core::value::PrimitiveValue;
use dicom_core::{DataElement, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use snafu::ensure;

/// Compute the number of bits of one frame.
pub fn bits_per_frame(
    rows: u16,
    columns: u16,
    bits_allocated: u16,
    samples_per_pixel: u16,
) -> Result<u64> {
    ensure!(
        rows > 0 && columns > 0 && bits_allocated > 0,
        InvalidImageDimensionsSnafu {
            rows,
            columns,
            bits_allocated,
        }
    );
    ensure!(
        matches!(bits_allocated, 1 | 8 | 16),
        UnsupportedBitsAllocatedSnafu {
            value: bits_allocated
        }
    );
    Ok(u64::from(rows)
        * u64::from(columns)
        * u64::from(bits_allocated)
        * u64::from(samples_per_pixel.max(1)))
}

/// Compute the number of bytes needed to store one frame on its own.
///
/// For 1 bit allocated, this is the number of pixel samples
/// divided by 8, rounded up.
pub fn bytes_per_frame(
    rows: u16,
    columns: u16,
    bits_allocated: u16,
    samples_per_pixel: u16,
) -> Result<usize> {
    let bits = bits_per_frame(rows, columns, bits_allocated, samples_per_pixel)?;
    Ok(bits.div_ceil(8) as usize)
}

/// Split byte-aligned pixel data into frames of the given size.
///
/// Returns `None` if the pixel data is too short
/// for the requested number of frames.
pub fn split_frames(
    pixel_data: &[u8],
    number_of_frames: u32,
    bytes_per_frame: usize,
) -> Option<Vec<Vec<u8>>> {
    let needed = bytes_per_frame.checked_mul(number_of_frames as usize)?;
    if pixel_data.len() < needed {
        return None;
    }
    Some(
        pixel_data[..needed]
            .chunks(bytes_per_frame.max(1))
            .map(|chunk| chunk.to_vec())
            .collect(),
    )
}

/// Split bit-packed pixel data into frames.
///
/// Frames follow each other without padding in the input,
/// but each output frame starts at a byte boundary,
/// with unused trailing bits set to zero.
///
/// Returns `None` if the pixel data is too short
/// for the requested number of frames.
pub fn extract_binary_frames(
    pixel_data: &[u8],
    number_of_frames: u32,
    bits_per_frame: u64,
) -> Option<Vec<Vec<u8>>> {
    let needed_bits = bits_per_frame.checked_mul(u64::from(number_of_frames))?;
    if (pixel_data.len() as u64) * 8 < needed_bits {
        return None;
    }
    Some(
        (0..u64::from(number_of_frames))
            .map(|i| copy_bits(pixel_data, i * bits_per_frame, bits_per_frame))
            .collect(),
    )
}

/// Pack frames of bit-packed pixel data into a contiguous buffer,
/// removing the padding at the end of each frame.
pub fn pack_binary_frames(frames: &[Vec<u8>], bits_per_frame: u64) -> Vec<u8> {
    let total_bits = bits_per_frame * frames.len() as u64;
    let mut out = vec![0_u8; total_bits.div_ceil(8) as usize];
    for (i, frame) in frames.iter().enumerate() {
        let base = i as u64 * bits_per_frame;
        for bit in 0..bits_per_frame {
            let byte = frame.get((bit / 8) as usize).copied().unwrap_or(0);
            if (byte >> (bit % 8)) & 1 == 1 {
                let target = base + bit;
                out[(target / 8) as usize] |= 1 << (target % 8);
            }
        }
    }
    out
}

/// Copy `bit_len` bits starting at `bit_offset` into a new buffer.
///
/// The caller must ensure that the source holds all requested bits.
pub(crate) fn copy_bits(src: &[u8], bit_offset: u64, bit_len: u64) -> Vec<u8> {
    let len = bit_len.div_ceil(8) as usize;
    let start = (bit_offset / 8) as usize;
    let shift = (bit_offset % 8) as u32;

    let mut out: Vec<u8> = if shift == 0 {
        src[start..start + len].to_vec()
    } else {
        (0..len)
            .map(|k| {
                let lo = src[start + k] >> shift;
                let hi = src.get(start + k + 1).map_or(0, |b| b << (8 - shift));
                lo | hi
            })
            .collect()
    };

    let tail = (bit_len % 8) as u32;
    if tail != 0 {
        if let Some(last) = out.last_mut() {
            *last &= (1_u8 << tail) - 1;
        }
    }
    out
}

/// Obtain the native pixel data of a data set as bytes in little endian.
///
/// Returns `None` if there is no pixel data
/// or if it is not native (encapsulated).
pub fn pixel_data_bytes(obj: &InMemDicomObject) -> Option<Vec<u8>> {
    let value = obj.get(tags::PIXEL_DATA)?.value();
    match value.primitive()? {
        PrimitiveValue::U16(words) => Some(words.iter().flat_map(|w| w.to_le_bytes()).collect()),
        other => Some(other.to_bytes().into_owned()),
    }
}

/// Put native pixel data bytes (little endian) into a data set,
/// as OW for 16 bits allocated and OB otherwise.
///
/// Odd-length data is padded with a trailing zero byte.
pub fn put_pixel_data(obj: &mut InMemDicomObject, mut bytes: Vec<u8>, bits_allocated: u16) {
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    let elem = if bits_allocated == 16 {
        let words: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::U16(words.into()))
    } else {
        DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::from(bytes))
    };
    obj.put(elem);
}
