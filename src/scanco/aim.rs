//! AIM v020/v030 header codec.
//!
//! An AIM file is a pre-header of five length fields, an image-struct
//! header, a free-form ASCII processing log, the pixel payload, and
//! optional associated data. v020 stores header integers as 32 bits;
//! v030 prefixes the file with a 16-byte version tag and widens the
//! header integers to 64 bits (the image `type` word stays 32-bit).

use crate::error::{Error, Result};
use crate::scanco::codec::{
    current_date_string, decode_i32, decode_i64, decode_scanco_float, encode_i32, encode_i64,
    encode_scanco_float,
};
use crate::scanco::header::{
    HeaderData, PixelLayout, ScancoVersion, AIM_V020_TAG, AIM_V030_TAG,
};
use crate::scanco::read_exact_or_truncated;
use log::debug;
use std::io::{Read, Seek, SeekFrom, Write};

/// Pre-header length for each version (five length fields).
const PRE_HEADER_LEN_V020: usize = 20;
const PRE_HEADER_LEN_V030: usize = 40;
/// Image-struct header length for each version.
const STRUCT_LEN_V020: usize = 140;
const STRUCT_LEN_V030: usize = 208;

/// Read an AIM header from `reader` into `header`, returning the total
/// header byte count (version tag included for v030).
pub fn read_header<R: Read + Seek>(reader: &mut R, header: &mut HeaderData) -> Result<u64> {
    let mut probe = [0u8; 56];
    let probed = read_available(reader, &mut probe)?;

    let version = match ScancoVersion::detect(&probe[..probed]) {
        Some(v @ (ScancoVersion::AimV020 | ScancoVersion::AimV030)) => v,
        _ => return Err(Error::UnrecognizedFormat),
    };
    let int_size = version.int_size();
    let tag_len = if version == ScancoVersion::AimV030 { 16 } else { 0 };
    if probed < tag_len + 3 * int_size {
        return Err(Error::truncated(
            "AIM pre-header",
            (tag_len + 3 * int_size - probed) as u64,
        ));
    }

    let pre_header_len = decode_length(version, &probe[tag_len..])?;
    let struct_len = decode_length(version, &probe[tag_len + int_size..])?;
    let log_len = decode_length(version, &probe[tag_len + 2 * int_size..])?;

    let header_size = tag_len + pre_header_len + struct_len + log_len;
    let mut raw = vec![0u8; header_size];
    reader.seek(SeekFrom::Start(0))?;
    read_exact_or_truncated(reader, &mut raw, "AIM header")?;

    header.version = match version {
        ScancoVersion::AimV030 => AIM_V030_TAG.to_string(),
        _ => AIM_V020_TAG.to_string(),
    };

    let struct_start = tag_len + pre_header_len;
    read_image_struct(version, &raw[struct_start..struct_start + struct_len], header)?;

    let log_start = struct_start + struct_len;
    parse_processing_log(&raw[log_start..log_start + log_len], header);

    // Fold the conversion to linear attenuation into the rescale slope.
    if header.mu_scaling > 1.0 {
        header.rescale_slope /= header.mu_scaling;
    }
    // These two are not in the processing log.
    header.slice_thickness = header.spacing[2];
    header.slice_increment = header.spacing[2];

    header.raw_header = raw;
    Ok(header_size as u64)
}

fn read_available<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

fn decode_length(version: ScancoVersion, data: &[u8]) -> Result<usize> {
    let value = match version {
        ScancoVersion::AimV030 => decode_i64(data)?,
        _ => i64::from(decode_i32(data)?),
    };
    usize::try_from(value).map_err(|_| Error::UnrecognizedFormat)
}

fn read_image_struct(version: ScancoVersion, s: &[u8], header: &mut HeaderData) -> Result<()> {
    let (type_offset, position_offset, dimension_offset, element_offset, needed) =
        match version {
            ScancoVersion::AimV030 => (12, 16, 40, 184, STRUCT_LEN_V030),
            _ => (20, 24, 36, 108, STRUCT_LEN_V020 - 20),
        };
    if s.len() < needed {
        return Err(Error::truncated("AIM image struct", (needed - s.len()) as u64));
    }

    let type_word = decode_i32(&s[type_offset..])?;
    header.pixel_layout = PixelLayout::from_type_word(type_word)?;
    debug!(
        "AIM type word {type_word:#010x} -> {} x{} compression {:#x}",
        header.pixel_layout.component_type,
        header.pixel_layout.components,
        header.pixel_layout.compression.code()
    );

    let mut position = [0i64; 3];
    for i in 0..3 {
        let (dimension, pos) = match version {
            ScancoVersion::AimV030 => (
                decode_i64(&s[dimension_offset + 8 * i..])?,
                decode_i64(&s[position_offset + 8 * i..])?,
            ),
            _ => (
                i64::from(decode_i32(&s[dimension_offset + 4 * i..])?),
                i64::from(decode_i32(&s[position_offset + 4 * i..])?),
            ),
        };
        header.pixel_dimensions[i] = dimension as i32;
        position[i] = pos;
    }

    for i in 0..3 {
        let spacing = match version {
            // v030 element size is an integer micrometre count.
            ScancoVersion::AimV030 => 1e-6 * decode_i64(&s[element_offset + 8 * i..])? as f64,
            _ => f64::from(decode_scanco_float(&s[element_offset + 4 * i..])?),
        };
        header.spacing[i] = if spacing == 0.0 { 1.0 } else { spacing };
        // The origin reflects how the stored volume was cropped out of
        // the original scan.
        header.origin[i] = (position[i] as f64 * header.spacing[i]) as f32;
    }
    Ok(())
}

/// Parse the newline-separated `key  value` processing log. Lines
/// starting with `!` are comments; keys and values are separated by at
/// least two spaces; unknown keys are skipped.
fn parse_processing_log(log: &[u8], header: &mut HeaderData) {
    let text = String::from_utf8_lossy(log);
    for line in text.split('\n') {
        if line.is_empty() || line.starts_with('!') {
            continue;
        }
        let Some(split) = line.find("  ") else {
            continue;
        };
        let key = &line[..split];
        let value = line[split..]
            .trim_start_matches(' ')
            .trim_end_matches(['\r', ' ']);

        match key {
            "Time" => header.modification_date = value.to_string(),
            "Original Creation-Date" => header.creation_date = value.to_string(),
            "Orig-ISQ-Dim-p" => {
                for (slot, token) in header
                    .scan_dimensions_pixels
                    .iter_mut()
                    .zip(value.split_whitespace())
                {
                    *slot = parse_int(token);
                }
            }
            "Orig-ISQ-Dim-um" => {
                for (slot, token) in header
                    .scan_dimensions_physical
                    .iter_mut()
                    .zip(value.split_whitespace())
                {
                    *slot = parse_float(token) * 1e-3;
                }
            }
            "Patient Name" => header.patient_name = value.to_string(),
            "Index Patient" => header.patient_index = parse_int(value),
            "Index Measurement" => header.measurement_index = parse_int(value),
            "Site" => header.site = parse_int(value),
            "Scanner ID" => header.scanner_id = parse_int(value),
            "Scanner type" => header.scanner_type = parse_int(value),
            "Position Slice 1 [um]" => {
                header.start_position = parse_float(value) * 1e-3;
                header.end_position = header.start_position
                    + header.spacing[2] * f64::from(header.pixel_dimensions[2] - 1);
            }
            "No. samples" => header.number_of_samples = parse_int(value),
            "No. projections per 180" => header.number_of_projections = parse_int(value),
            "Scan Distance [um]" => header.scan_distance = parse_float(value) * 1e-3,
            "Integration time [us]" => header.sample_time = parse_float(value) * 1e-3,
            "Reference line [um]" => header.reference_line = parse_float(value) * 1e-3,
            "Reconstruction-Alg." => header.reconstruction_alg = parse_int(value),
            "Energy [V]" => header.energy = parse_float(value) * 1e-3,
            "Intensity [uA]" => header.intensity = parse_float(value) * 1e-3,
            "Mu_Scaling" => header.mu_scaling = parse_float(value),
            "Minimum data value" => header.data_range[0] = parse_float(value),
            "Maximum data value" => header.data_range[1] = parse_float(value),
            "Calib. default unit type" => header.rescale_type = parse_int(value),
            "Calibration Data" => header.calibration_data = value.to_string(),
            "Density: unit" => header.rescale_units = value.to_string(),
            "Density: slope" => header.rescale_slope = parse_float(value),
            "Density: intercept" => header.rescale_intercept = parse_float(value),
            "HU: mu water" => header.mu_water = parse_float(value),
            _ => debug!("ignoring processing log key '{key}'"),
        }
    }
}

fn parse_int(value: &str) -> i32 {
    value.parse().unwrap_or(0)
}

fn parse_float(value: &str) -> f64 {
    value.parse().unwrap_or(0.0)
}

/// Write an AIM header. The variant is chosen by the header's version
/// tag (v030 only when it is exactly `AIMDATA_V030   `, otherwise v020).
/// Returns the total header byte count; the caller appends the payload.
pub fn write_header<W: Write>(
    writer: &mut W,
    header: &mut HeaderData,
    payload_size: u64,
) -> Result<u64> {
    let version = if header.version == AIM_V030_TAG {
        ScancoVersion::AimV030
    } else {
        ScancoVersion::AimV020
    };

    header.modification_date = current_date_string();
    let log = build_processing_log(header);
    let type_word = header.pixel_layout.type_word()?;

    let (pre_header_len, struct_len, tag_len) = match version {
        ScancoVersion::AimV030 => (PRE_HEADER_LEN_V030, STRUCT_LEN_V030, 16),
        _ => (PRE_HEADER_LEN_V020, STRUCT_LEN_V020, 0),
    };

    let mut out = Vec::with_capacity(tag_len + pre_header_len + struct_len + log.len());
    if version == ScancoVersion::AimV030 {
        out.extend_from_slice(AIM_V030_TAG.as_bytes());
        out.push(0);
    }

    // Pre-header: five lengths, each encoded exactly once.
    let lengths = [
        pre_header_len as i64,
        struct_len as i64,
        log.len() as i64,
        payload_size as i64,
        0, // no associated data
    ];
    let mut scratch = [0u8; 8];
    for length in lengths {
        match version {
            ScancoVersion::AimV030 => {
                encode_i64(length, &mut scratch);
                out.extend_from_slice(&scratch[..8]);
            }
            _ => {
                encode_i32(length as i32, &mut scratch);
                out.extend_from_slice(&scratch[..4]);
            }
        }
    }

    out.extend_from_slice(&build_image_struct(version, header, type_word));
    out.extend_from_slice(log.as_bytes());

    writer.write_all(&out)?;
    header.version = match version {
        ScancoVersion::AimV030 => AIM_V030_TAG.to_string(),
        _ => AIM_V020_TAG.to_string(),
    };
    header.raw_header = out;
    Ok(header.raw_header.len() as u64)
}

fn build_image_struct(version: ScancoVersion, header: &HeaderData, type_word: i32) -> Vec<u8> {
    let mut s = vec![0u8; if version == ScancoVersion::AimV030 { STRUCT_LEN_V030 } else { STRUCT_LEN_V020 }];
    match version {
        ScancoVersion::AimV030 => {
            encode_i32(type_word, &mut s[12..]);
            for i in 0..3 {
                let position = (f64::from(header.origin[i]) / header.spacing[i]).round() as i64;
                encode_i64(position, &mut s[16 + 8 * i..]);
                encode_i64(i64::from(header.pixel_dimensions[i]), &mut s[40 + 8 * i..]);
                encode_i64((header.spacing[i] * 1e6).round() as i64, &mut s[184 + 8 * i..]);
            }
        }
        _ => {
            // Struct version marker as stored by the scanner software.
            encode_scanco_float(1.6, &mut s[0..]);
            encode_i32(type_word, &mut s[20..]);
            for i in 0..3 {
                let position = (f64::from(header.origin[i]) / header.spacing[i]).round() as i32;
                encode_i32(position, &mut s[24 + 4 * i..]);
                encode_i32(header.pixel_dimensions[i], &mut s[36 + 4 * i..]);
                encode_scanco_float(header.spacing[i] as f32, &mut s[108 + 4 * i..]);
            }
        }
    }
    s
}

fn build_processing_log(header: &HeaderData) -> String {
    let rule = "!-------------------------------------------------------------------------------";
    let mut log = String::with_capacity(2048);
    let mut line = |text: String| {
        log.push_str(&text);
        log.push('\n');
    };

    line("! ".to_string());
    line("! Processing Log ".to_string());
    line("!".to_string());
    line(rule.to_string());
    line(format!("Created by                    {}", env!("CARGO_PKG_NAME")));
    line(format!("Time                          {}", header.modification_date));
    line(format!("Original Creation-Date        {}", header.creation_date));
    line(format!(
        "Orig-ISQ-Dim-p                                   {}       {}        {}",
        header.scan_dimensions_pixels[0],
        header.scan_dimensions_pixels[1],
        header.scan_dimensions_pixels[2]
    ));
    line(format!(
        "Orig-ISQ-Dim-um                                  {}       {}        {}",
        header.scan_dimensions_physical[0] * 1e3,
        header.scan_dimensions_physical[1] * 1e3,
        header.scan_dimensions_physical[2] * 1e3
    ));
    line(rule.to_string());
    line(format!("Patient Name                  {}", header.patient_name));
    line(format!(
        "Index Patient                                    {}",
        header.patient_index
    ));
    line(format!(
        "Index Measurement                               {}",
        header.measurement_index
    ));
    line(rule.to_string());
    line(format!(
        "Site                                                {}",
        header.site
    ));
    line(format!(
        "Scanner ID                                       {}",
        header.scanner_id
    ));
    line(format!(
        "Scanner type                                        {}",
        header.scanner_type
    ));
    line(format!(
        "Position Slice 1 [um]                          {}",
        header.start_position * 1e3
    ));
    line(format!(
        "No. samples                                      {}",
        header.number_of_samples
    ));
    line(format!(
        "No. projections per 180                           {}",
        header.number_of_projections
    ));
    line(format!(
        "Scan Distance [um]                             {}",
        header.scan_distance * 1e3
    ));
    line(format!(
        "Integration time [us]                          {}",
        header.sample_time * 1e3
    ));
    line(format!(
        "Reference line [um]                                 {}",
        header.reference_line * 1e3
    ));
    line(format!(
        "Reconstruction-Alg.                                 {}",
        header.reconstruction_alg
    ));
    line(format!(
        "Energy [V]                                      {}",
        header.energy * 1e3
    ));
    line(format!(
        "Intensity [uA]                                   {}",
        header.intensity * 1e3
    ));
    line(rule.to_string());
    line(format!(
        "Mu_Scaling                                       {}",
        header.mu_scaling
    ));
    line(format!(
        "Calibration Data              {}           ",
        header.calibration_data
    ));
    line(format!(
        "Calib. default unit type      {}                                      ",
        header.rescale_type
    ));
    line(format!(
        "Density: unit                 {}                                         ",
        header.rescale_units
    ));
    line(format!(
        "Density: slope                         {}",
        header.rescale_slope
    ));
    line(format!(
        "Density: intercept                     {}",
        header.rescale_intercept
    ));
    line(format!(
        "HU: mu water                                  {}",
        header.mu_water
    ));
    line(rule.to_string());
    line(format!(
        "Minimum data value                            {}",
        header.data_range[0]
    ));
    line(format!(
        "Maximum data value                            {}",
        header.data_range[1]
    ));
    log
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanco::header::{ComponentType, CompressionMode};
    use std::io::Cursor;

    /// Assemble a minimal v020 file image: pre-header + struct + log.
    fn synthetic_v020(log: &str, type_word: i32, dims: [i32; 3], spacing: [f32; 3]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut scratch = [0u8; 4];
        for value in [
            20,
            140,
            log.len() as i32,
            0,
            0,
        ] {
            encode_i32(value, &mut scratch);
            out.extend_from_slice(&scratch);
        }
        let mut s = vec![0u8; 140];
        encode_i32(type_word, &mut s[20..]);
        for i in 0..3 {
            encode_i32(i as i32 * 10, &mut s[24 + 4 * i..]); // position
            encode_i32(dims[i], &mut s[36 + 4 * i..]);
            encode_scanco_float(spacing[i], &mut s[108 + 4 * i..]);
        }
        out.extend_from_slice(&s);
        out.extend_from_slice(log.as_bytes());
        out
    }

    const SAMPLE_LOG: &str = "!-------------------------------------------------------------------------------\n\
Time                          24-JUL-2017 11:12:44.000\n\
Original Creation-Date        9-JUN-2016 12:26:53.000\n\
Patient Name                  EXAMPLE2573\n\
Index Patient                                    2573\n\
Scanner ID                                       3401\n\
No. projections per 180                           900\n\
Scan Distance [um]                             139852\n\
Integration time [us]                          43000\n\
Mu_Scaling                                       8192\n\
Calibration Data              68 kVp, BH: 200 mg HA/ccm, Scaling 8192, 0.2 CU           \n\
Density: unit                 mg HA/ccm                                         \n\
Density: slope                         13136027.975680\n\
Density: intercept                     -391.209015\n\
HU: mu water                                  0.2409\n\
Unknown key                   should be ignored\n";

    #[test]
    fn test_read_v020_header() {
        let image = synthetic_v020(SAMPLE_LOG, 0x0002_0002, [100, 100, 60], [0.0607, 0.0607, 0.0607]);
        let mut header = HeaderData::default();
        let size = read_header(&mut Cursor::new(image.clone()), &mut header).unwrap();

        assert_eq!(size as usize, image.len());
        assert_eq!(header.version, AIM_V020_TAG);
        assert_eq!(header.patient_index, 2573);
        assert_eq!(header.scanner_id, 3401);
        assert_eq!(header.patient_name, "EXAMPLE2573");
        assert_eq!(header.number_of_projections, 900);
        assert_eq!(header.modification_date, "24-JUL-2017 11:12:44.000");
        assert_eq!(header.creation_date, "9-JUN-2016 12:26:53.000");
        assert_eq!(
            header.calibration_data,
            "68 kVp, BH: 200 mg HA/ccm, Scaling 8192, 0.2 CU"
        );
        assert_eq!(header.rescale_units, "mg HA/ccm");
        assert_eq!(header.mu_scaling, 8192.0);
        assert!((header.mu_water - 0.2409).abs() < 1e-9);
        assert!((header.scan_distance - 139.852).abs() < 1e-9);
        assert!((header.sample_time - 43.0).abs() < 1e-9);
        assert!((header.rescale_slope - 13136027.975680 / 8192.0).abs() < 1e-3);
        assert!((header.rescale_intercept - -391.209015).abs() < 1e-9);
        assert_eq!(header.pixel_dimensions, [100, 100, 60]);
        assert!((header.slice_thickness - 0.0607).abs() < 1e-6);
        assert_eq!(header.slice_thickness, header.spacing[2]);
        assert_eq!(header.pixel_layout.component_type, ComponentType::Int16);
    }

    #[test]
    fn test_read_v020_compressed_type_words() {
        for (word, compression) in [
            (0x0006_0001, CompressionMode::PackedBits),
            (0x0015_0001, CompressionMode::RunLengthBits),
            (0x0008_0002, CompressionMode::RunLengthBytes),
        ] {
            let image = synthetic_v020("", word, [4, 4, 4], [1.0, 1.0, 1.0]);
            let mut header = HeaderData::default();
            read_header(&mut Cursor::new(image), &mut header).unwrap();
            assert_eq!(header.pixel_layout.compression, compression);
            assert_eq!(header.pixel_layout.component_type, ComponentType::Int8);
        }
    }

    #[test]
    fn test_unknown_type_word_rejected() {
        let image = synthetic_v020("", 0x7777_0001, [4, 4, 4], [1.0, 1.0, 1.0]);
        let mut header = HeaderData::default();
        assert!(matches!(
            read_header(&mut Cursor::new(image), &mut header),
            Err(Error::UnsupportedComponentType(0x7777_0001))
        ));
    }

    #[test]
    fn test_zero_element_size_defaults_to_one() {
        let image = synthetic_v020("", 0x0002_0002, [4, 4, 4], [0.0, 0.5, 0.0]);
        let mut header = HeaderData::default();
        read_header(&mut Cursor::new(image), &mut header).unwrap();
        assert_eq!(header.spacing, [1.0, 0.5, 1.0]);
    }

    #[test]
    fn test_read_v030_header() {
        let mut out = Vec::new();
        out.extend_from_slice(AIM_V030_TAG.as_bytes());
        out.push(0);
        let log = "Index Patient                                    7\n";
        let mut scratch = [0u8; 8];
        for value in [40i64, 208, log.len() as i64, 0, 0] {
            encode_i64(value, &mut scratch);
            out.extend_from_slice(&scratch);
        }
        let mut s = vec![0u8; 208];
        encode_i32(0x0001_0001, &mut s[12..]);
        for i in 0..3 {
            encode_i64(2, &mut s[16 + 8 * i..]); // position
            encode_i64(32, &mut s[40 + 8 * i..]); // dimension
            encode_i64(60700, &mut s[184 + 8 * i..]); // element size, um
        }
        out.extend_from_slice(&s);
        out.extend_from_slice(log.as_bytes());

        let mut header = HeaderData::default();
        let size = read_header(&mut Cursor::new(out.clone()), &mut header).unwrap();

        assert_eq!(size as usize, out.len());
        assert_eq!(header.version, AIM_V030_TAG);
        assert_eq!(header.patient_index, 7);
        assert_eq!(header.pixel_dimensions, [32, 32, 32]);
        assert!((header.spacing[2] - 0.0607).abs() < 1e-9);
        assert!((f64::from(header.origin[0]) - 2.0 * header.spacing[0]).abs() < 1e-6);
        assert_eq!(header.pixel_layout.component_type, ComponentType::Int8);
    }

    #[test]
    fn test_truncated_header_rejected() {
        let image = synthetic_v020(SAMPLE_LOG, 0x0002_0002, [10, 10, 10], [0.1, 0.1, 0.1]);
        let mut header = HeaderData::default();
        assert!(matches!(
            read_header(&mut Cursor::new(&image[..image.len() - 40]), &mut header),
            Err(Error::Truncated(_, 40))
        ));
    }

    #[test]
    fn test_processing_log_roundtrip() {
        let mut original = HeaderData {
            version: AIM_V020_TAG.to_string(),
            patient_name: "EXAMPLE2573".to_string(),
            patient_index: 2573,
            scanner_id: 3401,
            creation_date: "9-JUN-2016 12:26:53.000".to_string(),
            pixel_dimensions: [100, 100, 60],
            spacing: [0.0607, 0.0607, 0.0607],
            scan_dimensions_pixels: [2304, 2304, 504],
            scan_dimensions_physical: [139.852, 139.852, 30.599],
            start_position: 114.845,
            number_of_samples: 2304,
            number_of_projections: 900,
            scan_distance: 139.852,
            sample_time: 43.0,
            scanner_type: 9,
            measurement_index: 12839,
            site: 20,
            reconstruction_alg: 3,
            reference_line: 114.234,
            energy: 68.0,
            intensity: 1.47,
            rescale_type: 2,
            rescale_units: "mg HA/ccm".to_string(),
            calibration_data: "68 kVp, BH: 200 mg HA/ccm, Scaling 8192, 0.2 CU".to_string(),
            rescale_slope: 1603.51904,
            rescale_intercept: -391.209015,
            mu_water: 0.2409,
            data_range: [-2478.0, 11662.0],
            // Keep mu_scaling neutral so the parse-back comparison sees
            // the emitted slope unchanged.
            mu_scaling: 1.0,
            ..Default::default()
        };

        let mut out = Vec::new();
        let total = write_header(&mut out, &mut original, 100 * 100 * 60 * 2).unwrap();
        assert_eq!(total as usize, out.len());

        let mut reread = HeaderData::default();
        let size = read_header(&mut Cursor::new(out), &mut reread).unwrap();
        assert_eq!(size, total);

        assert_eq!(reread.version, AIM_V020_TAG);
        assert_eq!(reread.patient_name, original.patient_name);
        assert_eq!(reread.patient_index, original.patient_index);
        assert_eq!(reread.scanner_id, original.scanner_id);
        assert_eq!(reread.creation_date, original.creation_date);
        assert_eq!(reread.modification_date, original.modification_date);
        assert_eq!(reread.scan_dimensions_pixels, original.scan_dimensions_pixels);
        assert_eq!(reread.number_of_samples, original.number_of_samples);
        assert_eq!(reread.number_of_projections, original.number_of_projections);
        assert_eq!(reread.scanner_type, original.scanner_type);
        assert_eq!(reread.measurement_index, original.measurement_index);
        assert_eq!(reread.site, original.site);
        assert_eq!(reread.reconstruction_alg, original.reconstruction_alg);
        assert_eq!(reread.rescale_type, original.rescale_type);
        assert_eq!(reread.rescale_units, original.rescale_units);
        assert_eq!(reread.calibration_data, original.calibration_data);
        assert_eq!(reread.data_range, original.data_range);
        assert_eq!(reread.pixel_dimensions, original.pixel_dimensions);
        for i in 0..3 {
            assert!((reread.scan_dimensions_physical[i] - original.scan_dimensions_physical[i]).abs() < 1e-9);
            assert!((f64::from(reread.spacing[i] as f32) - original.spacing[i]).abs() < 1e-6);
        }
        assert!((reread.start_position - original.start_position).abs() < 1e-9);
        assert!((reread.scan_distance - original.scan_distance).abs() < 1e-9);
        assert!((reread.sample_time - original.sample_time).abs() < 1e-9);
        assert!((reread.reference_line - original.reference_line).abs() < 1e-9);
        assert!((reread.energy - original.energy).abs() < 1e-9);
        assert!((reread.intensity - original.intensity).abs() < 1e-9);
        assert!((reread.mu_scaling - original.mu_scaling).abs() < 1e-12);
        assert!((reread.rescale_slope - original.rescale_slope).abs() < 1e-9);
        assert!((reread.rescale_intercept - original.rescale_intercept).abs() < 1e-9);
        assert!((reread.mu_water - original.mu_water).abs() < 1e-12);
        assert_eq!(reread.slice_thickness, reread.spacing[2]);
        assert_eq!(
            reread.end_position,
            reread.start_position + reread.spacing[2] * 59.0
        );
    }

    #[test]
    fn test_write_v030_pre_header_lengths() {
        let mut header = HeaderData {
            version: AIM_V030_TAG.to_string(),
            pixel_dimensions: [8, 8, 8],
            spacing: [0.02, 0.02, 0.02],
            ..Default::default()
        };
        let mut out = Vec::new();
        let total = write_header(&mut out, &mut header, 1024).unwrap();

        assert_eq!(&out[..15], AIM_V030_TAG.as_bytes());
        assert_eq!(out[15], 0);
        assert_eq!(decode_i64(&out[16..]).unwrap(), 40);
        assert_eq!(decode_i64(&out[24..]).unwrap(), 208);
        assert_eq!(decode_i64(&out[40..]).unwrap(), 1024);
        assert_eq!(decode_i64(&out[48..]).unwrap(), 0);
        let log_len = decode_i64(&out[32..]).unwrap() as usize;
        assert_eq!(total as usize, 16 + 40 + 208 + log_len);

        // Element size stored as integer micrometres.
        let struct_start = 16 + 40;
        assert_eq!(decode_i64(&out[struct_start + 184..]).unwrap(), 20000);

        // And it reads back.
        let mut reread = HeaderData::default();
        read_header(&mut Cursor::new(out), &mut reread).unwrap();
        assert_eq!(reread.version, AIM_V030_TAG);
        assert_eq!(reread.pixel_dimensions, [8, 8, 8]);
        assert!((reread.spacing[0] - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_write_rejects_compressed_layout() {
        let mut header = HeaderData {
            pixel_layout: PixelLayout::from_type_word(0x0006_0001).unwrap(),
            pixel_dimensions: [4, 4, 4],
            ..Default::default()
        };
        let mut out = Vec::new();
        assert!(matches!(
            write_header(&mut out, &mut header, 64),
            Err(Error::UnsupportedComponentType(_))
        ));
    }
}
