//! Suspension JSON extraction
//!
//! Walks a suspension document (`section -> point -> [x, y, z]`) into a flat
//! list of hardpoints. The reserved `Wheels` section is left to the wheel
//! resolver. Traversal follows the document's key order, so the same file
//! always yields the same list.

use serde_json::Value;
use tracing::warn;

use crate::core::hardpoint::{HardpointSpec, Position, Suffix};
use crate::core::wheel::WHEELS_SECTION;

/// A data-quality problem: the offending point is dropped and the run goes on
#[derive(Debug, Clone, PartialEq)]
pub enum DataWarning {
    /// Leaf array with fewer than three numeric values
    MalformedLeaf { path: String, reason: String },
    /// Top-level entry that is not a section object
    SkippedSection { section: String },
    /// Required wheel parameter absent or not numeric; the axle is skipped
    MissingWheelParameter { suffix: Suffix, parameter: String },
    /// Caller's rear flag disagreed with the requested suffix
    SuffixMismatch { suffix: Suffix, is_rear: bool },
    /// Second hardpoint with an identity already seen
    DuplicateIdentity { identity: String },
}

impl std::fmt::Display for DataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataWarning::MalformedLeaf { path, reason } => {
                write!(f, "skipped malformed point '{}': {}", path, reason)
            }
            DataWarning::SkippedSection { section } => {
                write!(f, "skipped '{}': not a section object", section)
            }
            DataWarning::MissingWheelParameter { suffix, parameter } => write!(
                f,
                "skipped {} wheels: missing parameter '{}'",
                suffix, parameter
            ),
            DataWarning::SuffixMismatch { suffix, is_rear } => write!(
                f,
                "rear flag ({}) disagrees with suffix {}; using the suffix",
                is_rear, suffix
            ),
            DataWarning::DuplicateIdentity { identity } => {
                write!(f, "dropped duplicate hardpoint '{}'", identity)
            }
        }
    }
}

/// Hardpoints plus the warnings raised while producing them
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub hardpoints: Vec<HardpointSpec>,
    pub warnings: Vec<DataWarning>,
}

impl Extraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it
    pub fn warn(&mut self, warning: DataWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Append another extraction, keeping order
    pub fn extend(&mut self, other: Extraction) {
        self.hardpoints.extend(other.hardpoints);
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.hardpoints.is_empty()
    }
}

/// Read a JSON value as a number, accepting numeric strings
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Extract every point hardpoint from a suspension document
///
/// `x_offset` shifts X only; callers pass the rear reference distance for the
/// rear document and 0 for the front.
pub fn extract_hardpoints(document: &Value, suffix: Suffix, x_offset: f64) -> Extraction {
    let mut out = Extraction::new();
    extract_into(document, suffix, x_offset, &mut out);
    out
}

/// Same as [`extract_hardpoints`] but appends to an existing extraction
pub fn extract_into(document: &Value, suffix: Suffix, x_offset: f64, out: &mut Extraction) {
    let Some(sections) = document.as_object() else {
        out.warn(DataWarning::SkippedSection {
            section: "<root>".to_string(),
        });
        return;
    };

    for (section_name, section) in sections {
        if section_name == WHEELS_SECTION {
            continue;
        }
        match section {
            Value::Object(_) => walk(section, section_name, suffix, x_offset, out),
            _ => out.warn(DataWarning::SkippedSection {
                section: section_name.clone(),
            }),
        }
    }
}

fn walk(node: &Value, path: &str, suffix: Suffix, x_offset: f64, out: &mut Extraction) {
    let Some(entries) = node.as_object() else {
        return;
    };

    for (name, value) in entries {
        let child_path = format!("{}/{}", path, name);
        match value {
            Value::Object(_) => walk(value, &child_path, suffix, x_offset, out),
            Value::Array(items) => match leaf_position(items) {
                Ok(p) => {
                    let position = Position::new(p.x + x_offset, p.y, p.z);
                    out.hardpoints
                        .push(HardpointSpec::new(name.clone(), suffix, position));
                }
                Err(reason) => out.warn(DataWarning::MalformedLeaf {
                    path: child_path,
                    reason,
                }),
            },
            // Scalars next to points (units, comments) carry no geometry
            _ => {}
        }
    }
}

fn leaf_position(items: &[Value]) -> Result<Position, String> {
    if items.len() < 3 {
        return Err(format!("expected 3 values, found {}", items.len()));
    }
    let mut coords = [0.0; 3];
    for (i, item) in items.iter().take(3).enumerate() {
        coords[i] = as_number(item).ok_or_else(|| format!("value {} is not numeric", i))?;
    }
    Ok(Position::new(coords[0], coords[1], coords[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_point_extraction() {
        let doc = json!({"A-Arm": {"P1": [100, 200, 50]}});
        let result = extract_hardpoints(&doc, Suffix::Front, 0.0);

        assert_eq!(result.hardpoints.len(), 1);
        let hp = &result.hardpoints[0];
        assert_eq!(hp.base_name(), "P1");
        assert_eq!(hp.suffix(), Suffix::Front);
        assert_eq!(hp.position(), Position::new(100.0, 200.0, 50.0));
        assert!(hp.orientation().is_zero());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_x_offset_applies_to_x_only() {
        let doc = json!({"A-Arm": {"P1": [100, 200, 50]}});
        let result = extract_hardpoints(&doc, Suffix::Rear, -2500.0);
        assert_eq!(
            result.hardpoints[0].position(),
            Position::new(-2400.0, 200.0, 50.0)
        );
        assert_eq!(result.hardpoints[0].identity(), "P1_REAR");
    }

    #[test]
    fn test_wheels_section_is_ignored() {
        let doc = json!({
            "Wheels": {"Half Track": {"left": 600}},
            "Push Pull": {"CHAS_Push": [1, 2, 3]}
        });
        let result = extract_hardpoints(&doc, Suffix::Front, 0.0);
        assert_eq!(result.hardpoints.len(), 1);
        assert_eq!(result.hardpoints[0].base_name(), "CHAS_Push");
    }

    #[test]
    fn test_malformed_leaves_are_skipped() {
        let doc = json!({
            "A-Arm": {
                "Short": [1, 2],
                "Text": [1, "abc", 3],
                "Good": [1, 2, 3]
            }
        });
        let result = extract_hardpoints(&doc, Suffix::Front, 0.0);
        assert_eq!(result.hardpoints.len(), 1);
        assert_eq!(result.warnings.len(), 2);
        assert!(matches!(
            &result.warnings[0],
            DataWarning::MalformedLeaf { path, .. } if path == "A-Arm/Short"
        ));
    }

    #[test]
    fn test_numeric_strings_and_extra_values() {
        let doc = json!({"A-Arm": {"P1": ["10.5", 20, 30, 99]}});
        let result = extract_hardpoints(&doc, Suffix::Front, 0.0);
        assert_eq!(result.hardpoints[0].position(), Position::new(10.5, 20.0, 30.0));
    }

    #[test]
    fn test_nested_sections_are_walked() {
        let doc = json!({"Steering": {"Rack": {"CHAS_TiePnt": [1, 2, 3]}}});
        let result = extract_hardpoints(&doc, Suffix::Front, 0.0);
        assert_eq!(result.hardpoints[0].base_name(), "CHAS_TiePnt");
    }

    #[test]
    fn test_non_object_sections_warn() {
        let doc = json!({"Units": "mm", "A-Arm": {"P1": [0, 0, 0]}});
        let result = extract_hardpoints(&doc, Suffix::Front, 0.0);
        assert_eq!(result.hardpoints.len(), 1);
        assert_eq!(
            result.warnings,
            vec![DataWarning::SkippedSection {
                section: "Units".to_string()
            }]
        );
    }

    #[test]
    fn test_extraction_is_deterministic_and_ordered() {
        let text = r#"{
            "Double A-Arm": {"CHAS_LowFor": [1,0,0], "CHAS_LowAft": [2,0,0], "UPRI_LowPnt": [3,0,0]},
            "Push Pull": {"NSMA_PPAttPnt_L": [4,0,0], "CHAS_AttPnt_L": [5,0,0]}
        }"#;
        let doc: Value = serde_json::from_str(text).unwrap();

        let first = extract_hardpoints(&doc, Suffix::Front, 0.0);
        let second = extract_hardpoints(&doc, Suffix::Front, 0.0);
        assert_eq!(first.hardpoints, second.hardpoints);

        let names: Vec<_> = first.hardpoints.iter().map(|h| h.base_name()).collect();
        assert_eq!(
            names,
            vec![
                "CHAS_LowFor",
                "CHAS_LowAft",
                "UPRI_LowPnt",
                "NSMA_PPAttPnt_L",
                "CHAS_AttPnt_L"
            ]
        );
    }
}
