//! Wheel center geometry
//!
//! Wheel parameters are given once per axle for the left side. The right
//! wheel is the mirror image: Y, camber and toe change sign, Z is shared.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::extract::{as_number, DataWarning, Extraction};
use crate::core::hardpoint::{HardpointSpec, Orientation, Position, Suffix};

/// Reserved section holding wheel parameters
pub const WHEELS_SECTION: &str = "Wheels";

const HALF_TRACK: &str = "Half Track";
const TIRE_DIAMETER: &str = "Tire Diameter";
const LATERAL_OFFSET: &str = "Lateral Offset";
const VERTICAL_OFFSET: &str = "Vertical Offset";
const LONGITUDINAL_OFFSET: &str = "Longitudinal Offset";
const STATIC_CAMBER: &str = "Static Camber";
const STATIC_TOE: &str = "Static Toe";

/// Per-axle wheel parameters, left side canonical
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelGeometryParams {
    pub half_track: f64,
    pub tire_diameter: f64,
    pub lateral_offset: f64,
    pub vertical_offset: f64,
    pub longitudinal_offset: f64,
    /// Degrees, applied about X
    pub static_camber: f64,
    /// Degrees, applied about Z
    pub static_toe: f64,
}

impl WheelGeometryParams {
    /// Read parameters from a `Wheels` section
    ///
    /// Each parameter is `{"left": n}` (a bare number is accepted too). All
    /// seven are required; the error names the first missing one.
    pub fn from_section(section: &Value) -> Result<Self, String> {
        let required = |key: &str| left_value(section, key).ok_or_else(|| key.to_string());

        let params = Self {
            half_track: required(HALF_TRACK)?,
            tire_diameter: required(TIRE_DIAMETER)?,
            lateral_offset: required(LATERAL_OFFSET)?,
            vertical_offset: required(VERTICAL_OFFSET)?,
            longitudinal_offset: required(LONGITUDINAL_OFFSET)?,
            static_camber: required(STATIC_CAMBER)?,
            static_toe: required(STATIC_TOE)?,
        };
        debug!(?params, "wheel parameters read");
        Ok(params)
    }
}

fn left_value(section: &Value, key: &str) -> Option<f64> {
    let entry = section.get(key)?;
    match entry {
        Value::Object(_) => entry.get("left").and_then(as_number),
        other => as_number(other),
    }
}

/// Resolve the two wheel centers of one axle
///
/// `is_rear` is the caller's idea of the axle. When it disagrees with
/// `suffix`, the suffix decides and a warning is recorded, so names like
/// `RL_wheel_FRONT` are never produced.
pub fn resolve_wheels(
    params: &WheelGeometryParams,
    suffix: Suffix,
    is_rear: bool,
    reference_offset: f64,
    out: &mut Extraction,
) -> [HardpointSpec; 2] {
    if is_rear != suffix.is_rear() {
        out.warn(DataWarning::SuffixMismatch { suffix, is_rear });
    }

    let x = reference_offset + params.longitudinal_offset;
    let y = params.half_track + params.lateral_offset;
    let z = params.tire_diameter / 2.0 + params.vertical_offset;
    let left_angles = Orientation::new(params.static_camber, 0.0, params.static_toe);
    let prefix = suffix.axle_prefix();

    let left = HardpointSpec::new(format!("{}L_wheel", prefix), suffix, Position::new(x, y, z))
        .with_orientation(left_angles);
    let right = HardpointSpec::new(format!("{}R_wheel", prefix), suffix, Position::new(x, -y, z))
        .with_orientation(left_angles.mirrored());

    [left, right]
}

/// Resolve wheels from a whole suspension document, appending to `out`
///
/// Documents without a `Wheels` section contribute nothing. A section missing
/// a required parameter skips the axle with a warning.
pub fn extract_wheels_into(
    document: &Value,
    suffix: Suffix,
    is_rear: bool,
    reference_offset: f64,
    out: &mut Extraction,
) {
    let Some(section) = document.get(WHEELS_SECTION) else {
        return;
    };

    match WheelGeometryParams::from_section(section) {
        Ok(params) => {
            let wheels = resolve_wheels(&params, suffix, is_rear, reference_offset, out);
            out.hardpoints.extend(wheels);
        }
        Err(parameter) => out.warn(DataWarning::MissingWheelParameter { suffix, parameter }),
    }
}
