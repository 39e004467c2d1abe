//! Reader/writer for the SCANCO medical image formats.
//!
//! Supports the ISQ/RSQ/RAD and AIM (v020/v030) file families produced
//! by SCANCO Medical HR-pQCT scanners, including the legacy VMS float
//! and timestamp encodings, the AIM processing log, the three AIM
//! payload compression schemes, and Hounsfield-unit rescaling for
//! calibrated scans.
//!
//! # Example
//! ```ignore
//! let (header, pixels) = scanco_rs::scanco::read_image("scan.isq")?;
//! println!("{} voxels of {}", header.num_voxels(), header.pixel_layout.component_type);
//! ```

pub mod error;
pub mod scanco;

pub use error::{Error, Result};
pub use scanco::{ComponentType, CompressionMode, HeaderData, ScancoIo, ScancoVersion};
