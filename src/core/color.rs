//! Marker color coding by hardpoint name

use serde::Serialize;

/// An RGB triple, 0-255 per channel
pub type Rgb = [u8; 3];

/// One entry of the color table: names containing `token` get `rgb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorRule {
    pub token: &'static str,
    pub label: &'static str,
    pub rgb: Rgb,
}

/// Tie-rod points are named after the body they sit on (`CHAS_TiePnt`,
/// `UPRI_TiePnt`), so these tokens are checked before the generic table.
pub const TIE_ROD_TOKENS: &[&str] = &["TIER_", "TIEROD", "TIE_ROD", "TIEPNT"];

pub const TIE_ROD_COLOR: Rgb = [255, 165, 0];

/// Neutral gray for names nothing else matches
pub const DEFAULT_COLOR: Rgb = [128, 128, 128];

/// Generic table, first match wins
pub const COLOR_TABLE: &[ColorRule] = &[
    ColorRule {
        token: "CHAS_",
        label: "Chassis",
        rgb: [255, 0, 0],
    },
    ColorRule {
        token: "UPRI_",
        label: "Upright",
        rgb: [0, 0, 255],
    },
    ColorRule {
        token: "ROCK_",
        label: "Rocker",
        rgb: [0, 128, 255],
    },
    ColorRule {
        token: "NSMA_",
        label: "Non-sprung mass",
        rgb: [255, 192, 203],
    },
    ColorRule {
        token: "PUSH_",
        label: "Pushrod",
        rgb: [0, 160, 120],
    },
    ColorRule {
        token: "DAMP_",
        label: "Damper",
        rgb: [128, 0, 128],
    },
    ColorRule {
        token: "ARBA_",
        label: "Anti-roll bar",
        rgb: [255, 255, 0],
    },
    ColorRule {
        token: "_WHEEL",
        label: "Wheel",
        rgb: [0, 255, 0],
    },
];

/// Color for a hardpoint base name (case-insensitive)
pub fn color_for(base_name: &str) -> Rgb {
    let upper = base_name.to_uppercase();

    if TIE_ROD_TOKENS.iter().any(|t| upper.contains(t)) {
        return TIE_ROD_COLOR;
    }

    COLOR_TABLE
        .iter()
        .find(|rule| upper.contains(rule.token))
        .map(|rule| rule.rgb)
        .unwrap_or(DEFAULT_COLOR)
}

/// The whole scheme in lookup order, for display
pub fn color_legend() -> Vec<ColorRule> {
    let mut legend = Vec::with_capacity(COLOR_TABLE.len() + 2);
    legend.push(ColorRule {
        token: "TIER_ / TiePnt",
        label: "Tie rod",
        rgb: TIE_ROD_COLOR,
    });
    legend.extend_from_slice(COLOR_TABLE);
    legend.push(ColorRule {
        token: "(other)",
        label: "Other",
        rgb: DEFAULT_COLOR,
    });
    legend
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_prefixes() {
        assert_eq!(color_for("CHAS_LowFor"), [255, 0, 0]);
        assert_eq!(color_for("UPRI_LowPnt"), [0, 0, 255]);
        assert_eq!(color_for("FL_wheel"), [0, 255, 0]);
        assert_eq!(color_for("RR_wheel"), [0, 255, 0]);
    }

    #[test]
    fn test_tie_rod_overrides_generic_prefix() {
        assert_eq!(color_for("CHAS_TiePnt"), TIE_ROD_COLOR);
        assert_eq!(color_for("UPRI_TiePnt"), TIE_ROD_COLOR);
        assert_eq!(color_for("TIER_Outer"), TIE_ROD_COLOR);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(color_for("chas_lowfor"), [255, 0, 0]);
    }

    #[test]
    fn test_unmatched_names_get_default() {
        assert_eq!(color_for("P1"), DEFAULT_COLOR);
        assert_eq!(color_for(""), DEFAULT_COLOR);
    }

    #[test]
    fn test_legend_starts_with_tie_rod_and_ends_with_default() {
        let legend = color_legend();
        assert_eq!(legend.first().unwrap().rgb, TIE_ROD_COLOR);
        assert_eq!(legend.last().unwrap().rgb, DEFAULT_COLOR);
        assert_eq!(legend.len(), COLOR_TABLE.len() + 2);
    }
}
