//! File-level SCANCO I/O.
//!
//! The [`ScancoIo`] session dispatches to the ISQ or AIM codec, decodes
//! the payload, and applies Hounsfield rescaling when the scan carries a
//! valid calibration. Uncompressed payloads are read through a memory
//! map; compressed payloads stream through the run-length decoders.

use crate::error::{Error, Result};
use crate::scanco::header::{ComponentType, CompressionMode, HeaderData, ScancoVersion};
use crate::scanco::rescale::{apply, apply_inverse, hounsfield_rescale};
use crate::scanco::{aim, isq, payload};
use log::debug;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Codec selected for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Isq,
    Aim,
}

/// One file session: a header plus the codec that produced (or will
/// produce) it. Create one session per file; sessions are independent.
#[derive(Debug, Default)]
pub struct ScancoIo {
    header: HeaderData,
    codec: Option<Codec>,
    header_size: u64,
}

impl ScancoIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// The header populated by the last successful operation.
    pub fn header(&self) -> &HeaderData {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut HeaderData {
        &mut self.header
    }

    /// Total header byte count of the last file read or written.
    pub fn header_size(&self) -> u64 {
        self.header_size
    }

    fn reset(&mut self) {
        self.header = HeaderData::default();
        self.codec = None;
        self.header_size = 0;
    }

    /// True when the file starts with a recognized SCANCO header.
    pub fn can_read<P: AsRef<Path>>(path: P) -> bool {
        let Ok(mut file) = File::open(path) else {
            return false;
        };
        let mut probe = [0u8; 16];
        let mut filled = 0;
        while filled < probe.len() {
            match file.read(&mut probe[filled..]) {
                Ok(0) | Err(_) => break,
                Ok(n) => filled += n,
            }
        }
        ScancoVersion::detect(&probe[..filled]).is_some()
    }

    /// True when the writer can produce the file's format (`.isq` or
    /// `.aim`, case-insensitive).
    pub fn can_write<P: AsRef<Path>>(path: P) -> bool {
        codec_for_extension(path.as_ref()).is_some()
    }

    /// Read the header of `path` into this session.
    pub fn read_image_information<P: AsRef<Path>>(&mut self, path: P) -> Result<&HeaderData> {
        let result = self.read_information_inner(path.as_ref());
        if result.is_err() {
            self.reset();
        }
        result?;
        Ok(&self.header)
    }

    fn read_information_inner(&mut self, path: &Path) -> Result<()> {
        self.reset();

        let mut reader = BufReader::new(File::open(path)?);
        let mut probe = [0u8; 16];
        let mut filled = 0;
        while filled < probe.len() {
            match reader.read(&mut probe[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        let version =
            ScancoVersion::detect(&probe[..filled]).ok_or(Error::UnrecognizedFormat)?;
        let codec = match version {
            ScancoVersion::Isq => Codec::Isq,
            ScancoVersion::AimV020 | ScancoVersion::AimV030 => Codec::Aim,
        };
        if let Some(expected) = codec_for_extension(path) {
            if expected != codec {
                debug!("file extension disagrees with detected header, trusting the header");
            }
        }
        reader.seek(SeekFrom::Start(0))?;

        let mut header = HeaderData::default();
        self.header_size = match codec {
            Codec::Isq => isq::read_header(&mut reader, &mut header)?,
            Codec::Aim => aim::read_header(&mut reader, &mut header)?,
        };

        // A calibrated scan rescales to Hounsfield units.
        if let Some((slope, intercept)) = hounsfield_rescale(header.mu_scaling, header.mu_water) {
            header.rescale_slope = slope;
            header.rescale_intercept = intercept;
        }

        self.header = header;
        self.codec = Some(codec);
        Ok(())
    }

    /// Read header and payload; returns the decoded (and, for calibrated
    /// scans, Hounsfield-rescaled) pixel buffer.
    pub fn read<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<u8>> {
        let result = self.read_inner(path.as_ref());
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn read_inner(&mut self, path: &Path) -> Result<Vec<u8>> {
        if self.codec.is_none() {
            self.read_information_inner(path)?;
        }

        let mut data = if self.header.pixel_layout.compression == CompressionMode::None {
            let file = File::open(path)?;
            // SAFETY: the map is read-only and dropped before returning;
            // external modification can corrupt the copy but not cause UB.
            let mmap = unsafe { Mmap::map(&file)? };
            let start = self.header_size as usize;
            let size = self.header.payload_size();
            if mmap.len() < start + size {
                return Err(Error::truncated(
                    "pixel data",
                    (start + size - mmap.len()) as u64,
                ));
            }
            mmap[start..start + size].to_vec()
        } else {
            let mut reader = BufReader::new(File::open(path)?);
            reader.seek(SeekFrom::Start(self.header_size))?;
            payload::read_payload(&mut reader, &self.header)?
        };

        if let Some((slope, intercept)) =
            hounsfield_rescale(self.header.mu_scaling, self.header.mu_water)
        {
            apply(
                &mut data,
                self.header.pixel_layout.component_type,
                slope,
                intercept,
            );
        }
        Ok(data)
    }

    /// Serialize the session header to `path` without payload. The
    /// target file is truncated first, so a failed write never leaves a
    /// stale readable file behind.
    pub fn write_image_information<P: AsRef<Path>>(
        &mut self,
        path: P,
        payload_size: u64,
    ) -> Result<()> {
        let result = self.write_information_inner(path.as_ref(), payload_size);
        if result.is_err() {
            self.codec = None;
        }
        result
    }

    fn write_information_inner(&mut self, path: &Path, payload_size: u64) -> Result<()> {
        let codec = writable_codec(path, &self.header)?;
        let mut writer = BufWriter::new(File::create(path)?);
        let expected = match codec {
            Codec::Isq => isq::write_header(&mut writer, &mut self.header, payload_size)?,
            Codec::Aim => aim::write_header(&mut writer, &mut self.header, payload_size)?,
        };
        writer.flush()?;
        let written = writer.stream_position()?;
        if written != expected {
            return Err(Error::SizeMismatch { written, expected });
        }
        self.codec = Some(codec);
        self.header_size = expected;
        Ok(())
    }

    /// Write header and payload. The payload is expected in little-endian
    /// byte order and is written uncompressed; for calibrated scans the
    /// inverse Hounsfield transform is applied first.
    pub fn write<P: AsRef<Path>>(&mut self, path: P, data: &[u8]) -> Result<()> {
        let result = self.write_inner(path.as_ref(), data);
        if result.is_err() {
            self.codec = None;
        }
        result
    }

    fn write_inner(&mut self, path: &Path, data: &[u8]) -> Result<()> {
        let codec = writable_codec(path, &self.header)?;

        let mut payload = data.to_vec();
        if let Some((slope, intercept)) =
            hounsfield_rescale(self.header.mu_scaling, self.header.mu_water)
        {
            apply_inverse(
                &mut payload,
                self.header.pixel_layout.component_type,
                slope,
                intercept,
            );
        }

        let mut writer = BufWriter::new(File::create(path)?);
        let header_size = match codec {
            Codec::Isq => isq::write_header(&mut writer, &mut self.header, payload.len() as u64)?,
            Codec::Aim => aim::write_header(&mut writer, &mut self.header, payload.len() as u64)?,
        };
        writer.write_all(&payload)?;
        writer.flush()?;

        let written = writer.stream_position()?;
        let expected = header_size + payload.len() as u64;
        if written != expected {
            return Err(Error::SizeMismatch { written, expected });
        }
        self.codec = Some(codec);
        self.header_size = header_size;
        Ok(())
    }
}

/// Read header and payload of a SCANCO file in one call.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<(HeaderData, Vec<u8>)> {
    let mut session = ScancoIo::new();
    let data = session.read(path)?;
    Ok((session.header, data))
}

/// Write a SCANCO file in one call; the header is updated the way the
/// codec mutates it (version tag, modification date, neutralized
/// `mu_scaling` for ISQ).
pub fn write_image<P: AsRef<Path>>(path: P, header: &mut HeaderData, data: &[u8]) -> Result<()> {
    let mut session = ScancoIo::new();
    session.header = header.clone();
    session.write(path, data)?;
    *header = session.header;
    Ok(())
}

fn codec_for_extension(path: &Path) -> Option<Codec> {
    let extension = path.extension()?.to_string_lossy().to_lowercase();
    match extension.as_str() {
        "isq" => Some(Codec::Isq),
        "aim" => Some(Codec::Aim),
        _ => None,
    }
}

fn writable_codec(path: &Path, header: &HeaderData) -> Result<Codec> {
    let codec = codec_for_extension(path).ok_or_else(|| {
        Error::WriteExtension(
            path.extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
    })?;
    let layout = header.pixel_layout;
    let writable = layout.components == 1
        && layout.compression == CompressionMode::None
        && matches!(
            layout.component_type,
            ComponentType::Int8
                | ComponentType::UInt8
                | ComponentType::Int16
                | ComponentType::Float32
        );
    if !writable {
        return Err(Error::UnsupportedComponentType(
            layout.type_word().unwrap_or(0),
        ));
    }
    Ok(codec)
}
