//! ISQ/RSQ/RAD header codec.
//!
//! These variants share a fixed 68-byte pre-header followed by a
//! variant-specific body inside the first 512-byte block. The total
//! header length is `(data_offset + 1) * 512` bytes; anything past the
//! first block is the extended header, an optional directory of named
//! 512-byte blocks from which only the calibration block is understood.

use crate::error::{Error, Result};
use crate::scanco::codec::{
    current_date_string, decode_i32, decode_scanco_double, decode_vms_date, encode_i32,
    encode_vms_date, format_date, pad_string, strip_string,
};
use crate::scanco::header::{ComponentType, HeaderData, PixelLayout, ScancoVersion};
use crate::scanco::{read_exact_or_truncated, HEADER_BLOCK_SIZE};
use log::debug;
use std::io::{Read, Write};

const MULTI_HEADER_NAME: &[u8; 16] = b"MultiHeader     ";
const CALIBRATION_NAME: &[u8; 16] = b"Calibration     ";

/// Threshold below which a stored slice thickness is assumed to be a
/// truncated copy of the computed spacing (mm).
const SLICE_REPAIR_TOLERANCE: f64 = 1.1e-3;

/// Read an ISQ/RSQ/RAD header from `reader` into `header`, returning the
/// total header byte count (the payload starts right after).
pub fn read_header<R: Read>(reader: &mut R, header: &mut HeaderData) -> Result<u64> {
    let mut block = vec![0u8; HEADER_BLOCK_SIZE];
    read_exact_or_truncated(reader, &mut block, "ISQ header block")?;

    if ScancoVersion::detect(&block) != Some(ScancoVersion::Isq) {
        return Err(Error::UnrecognizedFormat);
    }

    header.version = strip_string(&block[..16]);
    let data_type = decode_i32(&block[16..])?;
    // Bytes 20..28 hold the image size in bytes and blocks; informational
    // only, repopulated on write.
    header.patient_index = decode_i32(&block[28..])?;
    header.scanner_id = decode_i32(&block[32..])?;

    let date = format_date(&decode_vms_date(&block[36..44])?);
    header.creation_date = date.clone();
    header.modification_date = date;

    let mut pixdim = [0i32; 3];
    let mut physdim = [0i32; 3];
    for i in 0..3 {
        pixdim[i] = decode_i32(&block[44 + 4 * i..])?;
        physdim[i] = decode_i32(&block[56 + 4 * i..])?;
    }

    let is_rad = data_type == 9 || physdim[2] == 0;
    if is_rad {
        debug!("RAD layout detected (data_type {data_type}, physdim {physdim:?})");
        read_rad_body(&block, header)?;
    } else {
        read_isq_body(&block, header)?;
    }
    let data_offset = decode_i32(&block[508..])?;
    let header_size = (data_offset as i64 + 1) as u64 * HEADER_BLOCK_SIZE as u64;

    apply_dimension_sanity(header, pixdim, physdim, is_rad);

    if !is_rad {
        header.end_position =
            header.start_position + header.spacing[2] * f64::from(header.pixel_dimensions[2] - 1);
        repair_slice_spacing(header, pixdim, physdim);
    }

    // ISQ/RSQ/RAD payloads are always scalar 16-bit samples.
    header.pixel_layout = PixelLayout::scalar(ComponentType::Int16);

    header.raw_header = block;
    if header_size > HEADER_BLOCK_SIZE as u64 {
        let extra = (header_size - HEADER_BLOCK_SIZE as u64) as usize;
        let start = header.raw_header.len();
        header.raw_header.resize(start + extra, 0);
        read_exact_or_truncated(reader, &mut header.raw_header[start..], "ISQ extended header")?;
    }

    if header_size >= 4 * HEADER_BLOCK_SIZE as u64 {
        if let Some(cal) = scan_extended_header(&header.raw_header, header_size) {
            header.calibration_data = cal.calibration_data;
            header.rescale_type = cal.rescale_type;
            header.rescale_units = cal.rescale_units;
            header.rescale_slope = cal.rescale_slope;
            header.rescale_intercept = cal.rescale_intercept;
            header.mu_water = cal.mu_water;
        }
    }

    // Fold the conversion to linear attenuation into the rescale slope.
    if header.mu_scaling > 1.0 {
        header.rescale_slope /= header.mu_scaling;
    }

    Ok(header_size)
}

fn read_isq_body(block: &[u8], header: &mut HeaderData) -> Result<()> {
    header.slice_thickness = f64::from(decode_i32(&block[68..])?) * 1e-3;
    header.slice_increment = f64::from(decode_i32(&block[72..])?) * 1e-3;
    header.start_position = f64::from(decode_i32(&block[76..])?) * 1e-3;
    header.data_range[0] = f64::from(decode_i32(&block[80..])?);
    header.data_range[1] = f64::from(decode_i32(&block[84..])?);
    header.mu_scaling = f64::from(decode_i32(&block[88..])?);
    header.number_of_samples = decode_i32(&block[92..])?;
    header.number_of_projections = decode_i32(&block[96..])?;
    header.scan_distance = f64::from(decode_i32(&block[100..])?) * 1e-3;
    header.scanner_type = decode_i32(&block[104..])?;
    header.sample_time = f64::from(decode_i32(&block[108..])?) * 1e-3;
    header.measurement_index = decode_i32(&block[112..])?;
    header.site = decode_i32(&block[116..])?;
    header.reference_line = f64::from(decode_i32(&block[120..])?) * 1e-3;
    header.reconstruction_alg = decode_i32(&block[124..])?;
    header.patient_name = strip_string(&block[128..168]);
    header.energy = f64::from(decode_i32(&block[168..])?) * 1e-3;
    header.intensity = f64::from(decode_i32(&block[172..])?) * 1e-3;
    Ok(())
}

/// RAD files keep the same pre-header but a different body layout; they
/// are projections, so there is no slice geometry.
fn read_rad_body(block: &[u8], header: &mut HeaderData) -> Result<()> {
    header.measurement_index = decode_i32(&block[68..])?;
    header.data_range[0] = f64::from(decode_i32(&block[72..])?);
    header.data_range[1] = f64::from(decode_i32(&block[76..])?);
    header.mu_scaling = f64::from(decode_i32(&block[80..])?);
    header.patient_name = strip_string(&block[84..124]);
    header.z_position = f64::from(decode_i32(&block[124..])?) * 1e-3;
    // 4 unknown bytes at 128.
    header.sample_time = f64::from(decode_i32(&block[132..])?) * 1e-3;
    header.energy = f64::from(decode_i32(&block[136..])?) * 1e-3;
    header.intensity = f64::from(decode_i32(&block[140..])?) * 1e-3;
    header.reference_line = f64::from(decode_i32(&block[144..])?) * 1e-3;
    header.start_position = f64::from(decode_i32(&block[148..])?) * 1e-3;
    header.end_position = f64::from(decode_i32(&block[152..])?) * 1e-3;
    Ok(())
}

fn apply_dimension_sanity(header: &mut HeaderData, pixdim: [i32; 3], physdim: [i32; 3], is_rad: bool) {
    let phys_scale = if is_rad { 1e-6 } else { 1e-3 };
    for i in 0..3 {
        header.scan_dimensions_pixels[i] = pixdim[i];
        let pix = pixdim[i].max(1);
        header.pixel_dimensions[i] = pix;

        header.scan_dimensions_physical[i] = f64::from(physdim[i]) * phys_scale;
        let phys = if physdim[i] == 0 { 1.0 } else { f64::from(physdim[i]) };

        header.spacing[i] = if is_rad && i == 2 {
            // RAD has no third dimension.
            1.0
        } else {
            phys * phys_scale / f64::from(pix)
        };
        header.origin[i] = 0.0;
    }
}

/// Historic acquisitions store the slice thickness and increment as
/// integer micrometres, losing sub-micrometre precision. Replace them
/// with the value computed from the physical extent when the difference
/// is below the quantization step.
fn repair_slice_spacing(header: &mut HeaderData, pixdim: [i32; 3], physdim: [i32; 3]) {
    if physdim[2] == 0 {
        return;
    }
    let computed = f64::from(physdim[2]) * 1e-3 / f64::from(pixdim[2].max(1));
    if (computed - header.slice_thickness).abs() < SLICE_REPAIR_TOLERANCE {
        debug!(
            "repairing quantized slice thickness {} -> {computed}",
            header.slice_thickness
        );
        header.slice_thickness = computed;
    }
    if (computed - header.slice_increment).abs() < SLICE_REPAIR_TOLERANCE {
        header.slice_increment = computed;
    }
}

struct CalibrationFields {
    calibration_data: String,
    rescale_type: i32,
    rescale_units: String,
    rescale_slope: f64,
    rescale_intercept: f64,
    mu_water: f64,
}

/// Walk the extended-header block directory looking for the calibration
/// block. The layout is only partially documented; files that deviate
/// simply yield no calibration fields.
fn scan_extended_header(raw: &[u8], header_size: u64) -> Option<CalibrationFields> {
    let block = HEADER_BLOCK_SIZE;
    let mut dir = block;
    let mut skipped_blocks: u64 = 1;
    if raw.len() >= dir + 24 && &raw[dir + 8..dir + 24] == MULTI_HEADER_NAME {
        dir += block;
        skipped_blocks += 1;
    }

    let mut calibration: Option<(usize, usize)> = None;
    for i in 0..4 {
        let entry = dir + i * 128;
        if raw.len() < entry + 128 {
            break;
        }
        let entry_blocks = decode_i32(&raw[entry + 24..]).ok()?.max(0) as u64;
        if (1 + skipped_blocks + entry_blocks) * block as u64 > header_size {
            break;
        }
        if &raw[entry + 8..entry + 24] == CALIBRATION_NAME {
            calibration = Some((
                ((1 + skipped_blocks) * block as u64) as usize,
                (entry_blocks * block as u64) as usize,
            ));
        }
        skipped_blocks += entry_blocks;
    }

    let (start, size) = calibration?;
    if size < 2 * block || raw.len() < start + 2 * block {
        debug!("calibration block too small ({size} bytes), ignoring");
        return None;
    }
    let cal = &raw[start..];
    Some(CalibrationFields {
        calibration_data: strip_string(&cal[28..92]),
        rescale_type: decode_i32(&cal[632..]).ok()?,
        rescale_units: strip_string(&cal[648..664]),
        rescale_slope: decode_scanco_double(&cal[664..]).ok()?,
        rescale_intercept: decode_scanco_double(&cal[672..]).ok()?,
        mu_water: decode_scanco_double(&cal[688..]).ok()?,
    })
}

/// Write a single-block ISQ header. The version tag is always
/// `CTDATA-HEADER_V1` and `mu_scaling` is written as 1 so a re-read
/// performs no attenuation rescaling; `data_offset` stays 0, meaning no
/// extended header follows.
pub fn write_header<W: Write>(
    writer: &mut W,
    header: &mut HeaderData,
    payload_size: u64,
) -> Result<u64> {
    let mut block = vec![0u8; HEADER_BLOCK_SIZE];

    pad_string(&mut block[0..16], "CTDATA-HEADER_V1");
    encode_i32(3, &mut block[16..]); // ISQ data type
    encode_i32(payload_size as i32, &mut block[20..]);
    encode_i32((payload_size / HEADER_BLOCK_SIZE as u64) as i32, &mut block[24..]);
    encode_i32(header.patient_index, &mut block[28..]);
    encode_i32(header.scanner_id, &mut block[32..]);
    encode_vms_date(&header.creation_date, &mut block[36..44])?;
    for i in 0..3 {
        encode_i32(header.pixel_dimensions[i], &mut block[44 + 4 * i..]);
        let physdim = header.spacing[i] * f64::from(header.pixel_dimensions[i]) * 1e3;
        encode_i32(physdim.round() as i32, &mut block[56 + 4 * i..]);
    }
    encode_i32((header.slice_thickness * 1e3).round() as i32, &mut block[68..]);
    encode_i32((header.slice_increment * 1e3).round() as i32, &mut block[72..]);
    encode_i32((header.start_position * 1e3).round() as i32, &mut block[76..]);
    encode_i32(header.data_range[0] as i32, &mut block[80..]);
    encode_i32(header.data_range[1] as i32, &mut block[84..]);
    encode_i32(1, &mut block[88..]); // mu_scaling neutralized
    encode_i32(header.number_of_samples, &mut block[92..]);
    encode_i32(header.number_of_projections, &mut block[96..]);
    encode_i32((header.scan_distance * 1e3).round() as i32, &mut block[100..]);
    encode_i32(header.scanner_type, &mut block[104..]);
    encode_i32((header.sample_time * 1e3).round() as i32, &mut block[108..]);
    encode_i32(header.measurement_index, &mut block[112..]);
    encode_i32(header.site, &mut block[116..]);
    encode_i32((header.reference_line * 1e3).round() as i32, &mut block[120..]);
    encode_i32(header.reconstruction_alg, &mut block[124..]);
    pad_string(&mut block[128..168], &header.patient_name);
    encode_i32((header.energy * 1e3).round() as i32, &mut block[168..]);
    encode_i32((header.intensity * 1e3).round() as i32, &mut block[172..]);
    // Fill stays zero; data_offset at 508 stays 0.

    writer.write_all(&block)?;

    header.version = "CTDATA-HEADER_V1".to_string();
    header.mu_scaling = 1.0;
    header.modification_date = current_date_string();
    header.raw_header = block;
    Ok(HEADER_BLOCK_SIZE as u64)
}
