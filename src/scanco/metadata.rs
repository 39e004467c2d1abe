//! Named metadata entries exchanged with a host imaging framework.
//!
//! Hosts typically keep per-image key/value dictionaries; this module
//! flattens a [`HeaderData`] into stable, typed entries and applies a
//! dictionary back onto a header before writing.

use crate::scanco::header::HeaderData;
use std::collections::BTreeMap;

/// A typed dictionary value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Int(i32),
    Double(f64),
    DoublePair([f64; 2]),
    IntTriple([i32; 3]),
    DoubleTriple([f64; 3]),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }
}

/// The host-facing metadata dictionary.
pub type MetadataDictionary = BTreeMap<&'static str, MetadataValue>;

/// Flatten a header into the named dictionary entries.
pub fn dictionary_from_header(header: &HeaderData) -> MetadataDictionary {
    use MetadataValue::{Double, DoublePair, DoubleTriple, Int, IntTriple, String as S};
    let mut dict = MetadataDictionary::new();

    dict.insert("Version", S(header.version.clone()));
    dict.insert("PatientName", S(header.patient_name.clone()));
    dict.insert("CreationDate", S(header.creation_date.clone()));
    dict.insert("ModificationDate", S(header.modification_date.clone()));
    dict.insert("RescaleUnits", S(header.rescale_units.clone()));
    dict.insert("CalibrationData", S(header.calibration_data.clone()));

    dict.insert("PatientIndex", Int(header.patient_index));
    dict.insert("ScannerID", Int(header.scanner_id));
    dict.insert("NumberOfSamples", Int(header.number_of_samples));
    dict.insert("NumberOfProjections", Int(header.number_of_projections));
    dict.insert("ScannerType", Int(header.scanner_type));
    dict.insert("MeasurementIndex", Int(header.measurement_index));
    dict.insert("Site", Int(header.site));
    dict.insert("ReconstructionAlg", Int(header.reconstruction_alg));
    dict.insert("RescaleType", Int(header.rescale_type));

    dict.insert("SliceThickness", Double(header.slice_thickness));
    dict.insert("SliceIncrement", Double(header.slice_increment));
    dict.insert("StartPosition", Double(header.start_position));
    dict.insert("MuScaling", Double(header.mu_scaling));
    dict.insert("MuWater", Double(header.mu_water));
    dict.insert("ScanDistance", Double(header.scan_distance));
    dict.insert("SampleTime", Double(header.sample_time));
    dict.insert("ReferenceLine", Double(header.reference_line));
    dict.insert("Energy", Double(header.energy));
    dict.insert("Intensity", Double(header.intensity));
    dict.insert("RescaleSlope", Double(header.rescale_slope));
    dict.insert("RescaleIntercept", Double(header.rescale_intercept));

    dict.insert("DataRange", DoublePair(header.data_range));
    dict.insert("PixelDimensions", IntTriple(header.pixel_dimensions));
    dict.insert("PhysicalDimensions", DoubleTriple(header.scan_dimensions_physical));

    dict
}

/// Apply dictionary entries onto a header; unknown keys and mismatched
/// value types are ignored.
pub fn apply_dictionary(header: &mut HeaderData, dict: &MetadataDictionary) {
    for (key, value) in dict {
        match (*key, value) {
            ("Version", MetadataValue::String(s)) => header.version = s.clone(),
            ("PatientName", MetadataValue::String(s)) => header.patient_name = s.clone(),
            ("CreationDate", MetadataValue::String(s)) => header.creation_date = s.clone(),
            ("ModificationDate", MetadataValue::String(s)) => header.modification_date = s.clone(),
            ("RescaleUnits", MetadataValue::String(s)) => header.rescale_units = s.clone(),
            ("CalibrationData", MetadataValue::String(s)) => header.calibration_data = s.clone(),
            ("PatientIndex", MetadataValue::Int(v)) => header.patient_index = *v,
            ("ScannerID", MetadataValue::Int(v)) => header.scanner_id = *v,
            ("NumberOfSamples", MetadataValue::Int(v)) => header.number_of_samples = *v,
            ("NumberOfProjections", MetadataValue::Int(v)) => header.number_of_projections = *v,
            ("ScannerType", MetadataValue::Int(v)) => header.scanner_type = *v,
            ("MeasurementIndex", MetadataValue::Int(v)) => header.measurement_index = *v,
            ("Site", MetadataValue::Int(v)) => header.site = *v,
            ("ReconstructionAlg", MetadataValue::Int(v)) => header.reconstruction_alg = *v,
            ("RescaleType", MetadataValue::Int(v)) => header.rescale_type = *v,
            ("SliceThickness", MetadataValue::Double(v)) => header.slice_thickness = *v,
            ("SliceIncrement", MetadataValue::Double(v)) => header.slice_increment = *v,
            ("StartPosition", MetadataValue::Double(v)) => header.start_position = *v,
            ("MuScaling", MetadataValue::Double(v)) => header.mu_scaling = *v,
            ("MuWater", MetadataValue::Double(v)) => header.mu_water = *v,
            ("ScanDistance", MetadataValue::Double(v)) => header.scan_distance = *v,
            ("SampleTime", MetadataValue::Double(v)) => header.sample_time = *v,
            ("ReferenceLine", MetadataValue::Double(v)) => header.reference_line = *v,
            ("Energy", MetadataValue::Double(v)) => header.energy = *v,
            ("Intensity", MetadataValue::Double(v)) => header.intensity = *v,
            ("RescaleSlope", MetadataValue::Double(v)) => header.rescale_slope = *v,
            ("RescaleIntercept", MetadataValue::Double(v)) => header.rescale_intercept = *v,
            ("DataRange", MetadataValue::DoublePair(v)) => header.data_range = *v,
            ("PixelDimensions", MetadataValue::IntTriple(v)) => header.pixel_dimensions = *v,
            ("PhysicalDimensions", MetadataValue::DoubleTriple(v)) => {
                header.scan_dimensions_physical = *v;
            }
            _ => {}
        }
    }
}
