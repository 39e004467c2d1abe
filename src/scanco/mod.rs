//! SCANCO file format support.
//!
//! SCANCO Medical HR-pQCT scanners store volumes in the ISQ/RSQ/RAD and
//! AIM formats: a little-endian binary header followed by the pixel
//! payload, which AIM files may run-length or bit-pack compress. This
//! module provides header codecs for every variant, payload decoders,
//! and Hounsfield-unit rescaling for calibrated scans.

pub mod aim;
pub mod codec;
pub mod header;
pub mod io;
pub mod isq;
pub mod metadata;
pub mod payload;
pub mod rescale;

pub use header::{
    ComponentType, CompressionMode, HeaderData, PixelLayout, ScancoVersion, AIM_V020_TAG,
    AIM_V030_TAG, ISQ_MAGIC,
};
pub use io::{read_image, write_image, ScancoIo};
pub use metadata::{apply_dictionary, dictionary_from_header, MetadataDictionary, MetadataValue};

use crate::error::{Error, Result};
use std::io::Read;

/// SCANCO headers are organized in 512-byte blocks.
pub const HEADER_BLOCK_SIZE: usize = 512;

/// Fill `buf` completely or fail with [`Error::Truncated`] naming the
/// missing byte count.
pub(crate) fn read_exact_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    what: &'static str,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(Error::truncated(what, (buf.len() - filled) as u64)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
