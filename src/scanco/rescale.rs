//! Hounsfield-unit rescaling of decoded payloads.
//!
//! When a scan carries a valid calibration (`mu_scaling > 1` and
//! `mu_water > 0`), stored values convert to Hounsfield units with
//! `HU = raw * 1000/(mu_water * mu_scaling) - 1000`. The transform runs
//! in place at the payload's native component type; the writer applies
//! the inverse before serializing.

use crate::scanco::header::ComponentType;

/// Hounsfield slope and intercept for a calibrated scan, or `None` when
/// the calibration fields do not allow the conversion.
pub fn hounsfield_rescale(mu_scaling: f64, mu_water: f64) -> Option<(f64, f64)> {
    if mu_scaling > 1.0 && mu_water > 0.0 {
        Some((1000.0 / (mu_water * mu_scaling), -1000.0))
    } else {
        None
    }
}

/// Apply `out = raw * slope + intercept` in place. No-op when the
/// transform is the identity.
pub fn apply(buffer: &mut [u8], component: ComponentType, slope: f64, intercept: f64) {
    if slope == 1.0 && intercept == 0.0 {
        return;
    }
    map_values(buffer, component, |raw| raw * slope + intercept);
}

/// Apply the inverse transform `raw = (out - intercept) / slope` in
/// place, used on the write path. No-op when the transform is the
/// identity.
pub fn apply_inverse(buffer: &mut [u8], component: ComponentType, slope: f64, intercept: f64) {
    if slope == 1.0 && intercept == 0.0 {
        return;
    }
    map_values(buffer, component, |value| (value - intercept) / slope);
}

fn map_values(buffer: &mut [u8], component: ComponentType, f: impl Fn(f64) -> f64) {
    match component {
        ComponentType::Int8 => {
            for b in buffer.iter_mut() {
                *b = (f(f64::from(*b as i8)) as i8) as u8;
            }
        }
        ComponentType::UInt8 => {
            for b in buffer.iter_mut() {
                *b = f(f64::from(*b)) as u8;
            }
        }
        ComponentType::Int16 => {
            for chunk in buffer.chunks_exact_mut(2) {
                let raw = i16::from_le_bytes([chunk[0], chunk[1]]);
                chunk.copy_from_slice(&(f(f64::from(raw)) as i16).to_le_bytes());
            }
        }
        ComponentType::UInt16 => {
            for chunk in buffer.chunks_exact_mut(2) {
                let raw = u16::from_le_bytes([chunk[0], chunk[1]]);
                chunk.copy_from_slice(&(f(f64::from(raw)) as u16).to_le_bytes());
            }
        }
        ComponentType::Int32 => {
            for chunk in buffer.chunks_exact_mut(4) {
                let raw = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                chunk.copy_from_slice(&(f(f64::from(raw)) as i32).to_le_bytes());
            }
        }
        ComponentType::UInt32 => {
            for chunk in buffer.chunks_exact_mut(4) {
                let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                chunk.copy_from_slice(&(f(f64::from(raw)) as u32).to_le_bytes());
            }
        }
        ComponentType::Float32 => {
            for chunk in buffer.chunks_exact_mut(4) {
                let raw = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                chunk.copy_from_slice(&(f(f64::from(raw)) as f32).to_le_bytes());
            }
        }
    }
}
