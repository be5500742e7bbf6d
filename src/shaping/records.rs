//! Glyph records handed to the presentation layer

use super::adapter::ShapedGlyph;
use crate::compile::BinaryFont;
use crate::font_source::metrics::round_units;
use crate::layout::AlternateMap;
use norad::{Font, Glyph};
use read_fonts::types::GlyphId;
use serde::{Serialize, Serializer};
use tracing::warn;

/// One shaped glyph of the live font
///
/// Advances are deltas: the shaped advance minus the glyph's own advance,
/// so zero means the layout tables left the glyph's spacing alone.
#[derive(Debug, Clone, Serialize)]
pub struct GlyphRecord<'a> {
    #[serde(rename = "name", serialize_with = "glyph_name")]
    pub glyph: &'a Glyph,
    pub x_placement: i32,
    pub y_placement: i32,
    pub x_advance: i32,
    pub y_advance: i32,
    pub alternates: Vec<String>,
}

fn glyph_name<S: Serializer>(glyph: &&Glyph, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(glyph.name().as_str())
}

impl<'a> GlyphRecord<'a> {
    /// A record with no adjustments, for previews without a build
    pub fn unresolved(glyph: &'a Glyph) -> Self {
        Self {
            glyph,
            x_placement: 0,
            y_placement: 0,
            x_advance: 0,
            y_advance: 0,
            alternates: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.glyph.name().as_str()
    }
}

/// Turn engine output into records that borrow from `font`
///
/// Glyph ids are resolved through the binary's glyph order to names in the
/// live font. Ids with no live glyph behind them, `.notdef` included, are
/// left out.
pub fn build_records<'f>(
    shaped: &[ShapedGlyph],
    binary: &BinaryFont,
    font: &'f Font,
    alternates: &AlternateMap,
) -> Vec<GlyphRecord<'f>> {
    let layer = font.default_layer();
    shaped
        .iter()
        .filter_map(|info| {
            let name = binary.glyph_name(GlyphId::new(info.glyph_id));
            let Some(glyph) = name.and_then(|name| layer.get_glyph(name)) else {
                warn!(
                    "Dropping glyph {} ({}) with no counterpart in the live font",
                    info.glyph_id,
                    name.unwrap_or("unnamed")
                );
                return None;
            };
            let mut glyph_alternates = alternates.get(name?).cloned().unwrap_or_default();
            glyph_alternates.sort();
            glyph_alternates.dedup();

            Some(GlyphRecord {
                glyph,
                x_placement: info.x_offset,
                y_placement: info.y_offset,
                x_advance: info.x_advance - round_units(glyph.width),
                y_advance: info.y_advance - round_units(glyph.height),
                alternates: glyph_alternates,
            })
        })
        .collect()
}
