//! Pixel payload decoding.
//!
//! ISQ payloads are always raw little-endian samples. AIM payloads may
//! additionally be stored in one of three legacy compression schemes,
//! signalled by the image `type` word: packed bits (0xb1), binary run
//! lengths (0xb2), or (length, value) byte runs (0xc2). The decoders
//! always produce exactly the declared output size; surplus compressed
//! input is ignored.

use crate::error::{Error, Result};
use crate::scanco::codec::{decode_i32, decode_i64};
use crate::scanco::header::{CompressionMode, HeaderData, ScancoVersion, AIM_V030_TAG};
use crate::scanco::read_exact_or_truncated;
use std::io::Read;

/// Read and decode the pixel payload for `header` from `reader`, which
/// must be positioned at the first payload byte.
pub fn read_payload<R: Read>(reader: &mut R, header: &HeaderData) -> Result<Vec<u8>> {
    let mut out = vec![0u8; header.payload_size()];
    match header.pixel_layout.compression {
        CompressionMode::None => {
            read_exact_or_truncated(reader, &mut out, "pixel data")?;
        }
        CompressionMode::PackedBits => {
            let dims = output_dims(header);
            let input_size = packed_bits_input_size(dims);
            let mut input = vec![0u8; input_size];
            read_exact_or_truncated(reader, &mut input, "packed pixel data")?;
            decode_packed_bits(&input, dims, &mut out)?;
        }
        CompressionMode::RunLengthBits | CompressionMode::RunLengthBytes => {
            let input = read_sized_input(reader, header)?;
            match header.pixel_layout.compression {
                CompressionMode::RunLengthBits => decode_run_length_bits(&input, &mut out)?,
                _ => decode_run_length_bytes(&input, &mut out),
            }
        }
    }
    Ok(out)
}

fn output_dims(header: &HeaderData) -> [usize; 3] {
    let mut dims = [0usize; 3];
    for (slot, &d) in dims.iter_mut().zip(&header.pixel_dimensions) {
        *slot = d.max(0) as usize;
    }
    dims
}

/// Compressed run-length payloads are prefixed with their total size
/// (prefix included), 32-bit in AIM v020 and 64-bit in v030.
fn read_sized_input<R: Read>(reader: &mut R, header: &HeaderData) -> Result<Vec<u8>> {
    let int_size = if header.version == AIM_V030_TAG {
        ScancoVersion::AimV030.int_size()
    } else {
        ScancoVersion::AimV020.int_size()
    };
    let mut prefix = [0u8; 8];
    read_exact_or_truncated(reader, &mut prefix[..int_size], "compressed size prefix")?;
    let declared = if int_size == 8 {
        decode_i64(&prefix)?
    } else {
        i64::from(decode_i32(&prefix)?)
    };
    let input_size = usize::try_from(declared)
        .ok()
        .and_then(|s| s.checked_sub(int_size))
        .ok_or_else(|| Error::truncated("compressed pixel data", int_size as u64))?;

    let mut input = vec![0u8; input_size];
    read_exact_or_truncated(reader, &mut input, "compressed pixel data")?;
    Ok(input)
}

/// Input byte count for a packed-bit payload: one bit per voxel in 2x2x2
/// blocks, plus the trailing value byte.
fn packed_bits_input_size([dx, dy, dz]: [usize; 3]) -> usize {
    dx.div_ceil(2) * dy.div_ceil(2) * dz.div_ceil(2) + 1
}

/// Unpack a 0xb1 payload: each input byte holds a 2x2x2 block of voxels,
/// one bit each; a set bit becomes the value byte stored last in the
/// input (0x7f when that byte is zero).
pub fn decode_packed_bits(input: &[u8], dims: [usize; 3], out: &mut [u8]) -> Result<()> {
    let [dx, dy, dz] = dims;
    let expected = packed_bits_input_size(dims);
    if input.len() < expected {
        return Err(Error::truncated(
            "packed pixel data",
            (expected - input.len()) as u64,
        ));
    }
    let value = match input[expected - 1] {
        0 => 0x7f,
        v => v,
    };
    let xinc = dx.div_ceil(2);
    let yinc = dy.div_ceil(2);

    let mut out_pos = 0;
    for k in 0..dz {
        for j in 0..dy {
            let row = (k / 2) * yinc * xinc + (j / 2) * xinc;
            let row_bit = ((j & 1) << 1) | ((k & 1) << 2);
            for i in 0..dx {
                let byte = input[row + i / 2];
                let bit = (i & 1) | row_bit;
                out[out_pos] = ((byte >> bit) & 1) * value;
                out_pos += 1;
            }
        }
    }
    Ok(())
}

/// Decode a 0xb2 payload: the first two bytes are the alternating output
/// values, then each byte is a run length for the current value. A
/// length of 255 stands for a 254-long run that keeps the current value
/// for the next length byte as well, so runs longer than 254 can be
/// continued.
pub fn decode_run_length_bits(input: &[u8], out: &mut [u8]) -> Result<()> {
    if input.len() < 2 {
        return Err(Error::truncated(
            "run-length pixel data",
            (2 - input.len()) as u64,
        ));
    }
    let values = [input[0], input[1]];
    let mut flip = 0usize;
    let mut value = values[flip];
    let mut out_pos = 0;

    for &length_byte in &input[2..] {
        if out_pos == out.len() {
            break;
        }
        let mut length = usize::from(length_byte);
        if length_byte == 255 {
            length = 254;
            flip ^= 1;
        }
        let length = length.min(out.len() - out_pos);
        out[out_pos..out_pos + length].fill(value);
        out_pos += length;
        flip ^= 1;
        value = values[flip];
    }
    Ok(())
}

/// Decode a 0xc2 payload: a stream of (length, value) byte pairs.
pub fn decode_run_length_bytes(input: &[u8], out: &mut [u8]) {
    let mut out_pos = 0;
    for pair in input.chunks_exact(2) {
        if out_pos == out.len() {
            break;
        }
        let length = usize::from(pair[0]).min(out.len() - out_pos);
        out[out_pos..out_pos + length].fill(pair[1]);
        out_pos += length;
    }
}
