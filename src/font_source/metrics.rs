//! Font metrics and measurement data
//!
//! The vertical metrics the preview binary needs for its horizontal header,
//! plus the rounding used to turn UFO floats into font units.

use norad::Font;

/// Units per em used when the UFO does not declare one
const DEFAULT_UNITS_PER_EM: f64 = 1000.0;

/// Font metrics for building the preview binary
#[derive(Clone, Debug, PartialEq)]
pub struct FontMetrics {
    pub units_per_em: f64,
    pub ascender: f64,
    pub descender: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            units_per_em: DEFAULT_UNITS_PER_EM,
            ascender: DEFAULT_UNITS_PER_EM * 0.8,
            descender: -(DEFAULT_UNITS_PER_EM * 0.2),
        }
    }
}

impl FontMetrics {
    /// Extract metrics from a UFO
    pub fn from_ufo(ufo: &Font) -> Self {
        let font_info = &ufo.font_info;

        let units_per_em = font_info
            .units_per_em
            .map(|v| v.to_string().parse().unwrap_or(DEFAULT_UNITS_PER_EM))
            .unwrap_or(DEFAULT_UNITS_PER_EM);

        // Load metrics from UFO, using reasonable defaults based on units_per_em if missing
        let ascender = font_info.ascender.unwrap_or(units_per_em * 0.8); // 80% of UPM
        let descender = font_info.descender.unwrap_or(-(units_per_em * 0.2)); // -20% of UPM

        Self {
            units_per_em,
            ascender,
            descender,
        }
    }

    /// Units per em as stored in `head`, clamped to the valid 16..=16384 range
    pub fn units_per_em_u16(&self) -> u16 {
        round_units(self.units_per_em).clamp(16, 16384) as u16
    }

    pub fn ascender_i16(&self) -> i16 {
        clamp_i16(round_units(self.ascender))
    }

    pub fn descender_i16(&self) -> i16 {
        clamp_i16(round_units(self.descender))
    }
}

/// Round a design-space value to font units, half values rounding up
pub fn round_units(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
