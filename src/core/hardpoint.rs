//! Hardpoint value types
//!
//! A hardpoint is a named suspension reference point in the vehicle frame.
//! Its identity (`base_name + suffix`) is also the name given to the marker
//! component created for it, which is what later lets pose binding find the
//! marker again.

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Axle tag appended to every hardpoint name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suffix {
    Front,
    Rear,
}

impl Suffix {
    /// The literal appended to base names (`_FRONT` / `_REAR`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Suffix::Front => "_FRONT",
            Suffix::Rear => "_REAR",
        }
    }

    /// Single-letter axle prefix used by wheel names (`F` / `R`)
    pub fn axle_prefix(&self) -> char {
        match self {
            Suffix::Front => 'F',
            Suffix::Rear => 'R',
        }
    }

    pub fn is_rear(&self) -> bool {
        matches!(self, Suffix::Rear)
    }
}

impl std::fmt::Display for Suffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Suffix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('_').to_lowercase().as_str() {
            "front" => Ok(Suffix::Front),
            "rear" => Ok(Suffix::Rear),
            _ => Err(format!("Invalid suffix: '{}'. Use 'front' or 'rear'", s)),
        }
    }
}

/// A position in millimeters, vehicle reference frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    /// Distance to another position (mm)
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.to_vector() - other.to_vector()).norm()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Rotation about the X, Y and Z axes, in degrees
///
/// Only wheel centers carry a non-zero orientation: X is camber, Z is toe.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub angle_x: f64,
    pub angle_y: f64,
    pub angle_z: f64,
}

impl Orientation {
    pub const ZERO: Orientation = Orientation {
        angle_x: 0.0,
        angle_y: 0.0,
        angle_z: 0.0,
    };

    pub fn new(angle_x: f64, angle_y: f64, angle_z: f64) -> Self {
        Self {
            angle_x,
            angle_y,
            angle_z,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.angle_x == 0.0 && self.angle_y == 0.0 && self.angle_z == 0.0
    }

    /// Mirror across the vehicle XZ plane (right side of a left-side angle set)
    pub fn mirrored(&self) -> Self {
        Self::new(-self.angle_x, self.angle_y, -self.angle_z)
    }

    /// Rotation matrix, applied X then Y then Z
    pub fn to_rotation(self) -> Rotation3<f64> {
        Rotation3::from_euler_angles(
            self.angle_x.to_radians(),
            self.angle_y.to_radians(),
            self.angle_z.to_radians(),
        )
    }

    pub fn from_rotation(rotation: &Rotation3<f64>) -> Self {
        let (rx, ry, rz) = rotation.euler_angles();
        Self::new(rx.to_degrees(), ry.to_degrees(), rz.to_degrees())
    }
}

/// A named hardpoint, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardpointSpec {
    base_name: String,
    suffix: Suffix,
    position: Position,
    #[serde(default)]
    orientation: Orientation,
}

impl HardpointSpec {
    pub fn new(base_name: impl Into<String>, suffix: Suffix, position: Position) -> Self {
        Self {
            base_name: base_name.into(),
            suffix,
            position,
            orientation: Orientation::ZERO,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn suffix(&self) -> Suffix {
        self.suffix
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// `base_name + suffix`, e.g. `UPRI_LowerFront_FRONT`
    pub fn identity(&self) -> String {
        format!("{}{}", self.base_name, self.suffix.as_str())
    }

    pub fn is_wheel(&self) -> bool {
        is_wheel_name(&self.base_name)
    }
}

impl std::fmt::Display for HardpointSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.identity(), self.position)
    }
}

/// Wheel centers are named `{F,R}{L,R}_wheel`
pub fn is_wheel_name(name: &str) -> bool {
    name.to_lowercase().contains("_wheel")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_joins_base_name_and_suffix() {
        let hp = HardpointSpec::new("UPRI_LowerFront", Suffix::Front, Position::ORIGIN);
        assert_eq!(hp.identity(), "UPRI_LowerFront_FRONT");

        let hp = HardpointSpec::new("CHAS_TiePnt", Suffix::Rear, Position::ORIGIN);
        assert_eq!(hp.identity(), "CHAS_TiePnt_REAR");
    }

    #[test]
    fn test_suffix_from_str() {
        assert_eq!("front".parse::<Suffix>().unwrap(), Suffix::Front);
        assert_eq!("_REAR".parse::<Suffix>().unwrap(), Suffix::Rear);
        assert!("middle".parse::<Suffix>().is_err());
    }

    #[test]
    fn test_wheel_detection() {
        let wheel = HardpointSpec::new("FL_wheel", Suffix::Front, Position::ORIGIN);
        let point = HardpointSpec::new("CHAS_LowFor", Suffix::Front, Position::ORIGIN);
        assert!(wheel.is_wheel());
        assert!(!point.is_wheel());
    }

    #[test]
    fn test_orientation_rotation_roundtrip() {
        let o = Orientation::new(-1.5, 0.0, 0.25);
        let back = Orientation::from_rotation(&o.to_rotation());
        assert!((back.angle_x - o.angle_x).abs() < 1e-9);
        assert!(back.angle_y.abs() < 1e-9);
        assert!((back.angle_z - o.angle_z).abs() < 1e-9);
    }

    #[test]
    fn test_mirrored_orientation_negates_camber_and_toe() {
        let o = Orientation::new(-1.0, 0.0, 0.2).mirrored();
        assert_eq!(o, Orientation::new(1.0, 0.0, -0.2));
    }
}
