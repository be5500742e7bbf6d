//! Font source data access
//!
//! This module is the read-only view of the live UFO that the preview
//! builds from: glyph order, character map, metrics and the scripts its
//! code points belong to. The editor owns the font; nothing here mutates it.

pub mod metrics;
pub mod scripts;

// Explicit re-exports for public API
pub use metrics::FontMetrics;
pub use scripts::{font_scripts, is_right_to_left, script_tag};

use anyhow::Result;
use norad::{Font, Glyph};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Lib key holding the UFO's declared glyph order
const GLYPH_ORDER_KEY: &str = "public.glyphOrder";

/// Lib key pointing at an already compiled binary for this source
pub const BINARY_SOURCE_KEY: &str = "com.typemytype.robofont.binarySource";

/// Code point to glyph name, at most one glyph per code point
pub type CharacterMap = BTreeMap<char, String>;

/// Load a UFO font file from disk
pub fn load_ufo_from_path(path: impl AsRef<Path>) -> Result<Font> {
    let font = Font::load(path)?;
    Ok(font)
}

/// A borrowed, read-only view of the font being edited
#[derive(Clone, Copy)]
pub struct SourceFont<'a> {
    font: &'a Font,
}

impl<'a> SourceFont<'a> {
    pub fn new(font: &'a Font) -> Self {
        Self { font }
    }

    /// The underlying norad font
    pub fn font(&self) -> &'a Font {
        self.font
    }

    /// Look up a glyph in the default layer
    pub fn glyph(&self, name: &str) -> Option<&'a Glyph> {
        self.font.default_layer().get_glyph(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.glyph(name).is_some()
    }

    /// The feature source stored in the UFO
    pub fn features(&self) -> &'a str {
        &self.font.features
    }

    /// Path of a precompiled binary registered in the font lib, if any
    pub fn binary_source(&self) -> Option<&'a str> {
        self.font
            .lib
            .get(BINARY_SOURCE_KEY)
            .and_then(|value| value.as_string())
    }

    /// Glyph names in declared order
    ///
    /// Names from `public.glyphOrder` that exist in the default layer come
    /// first, followed by every remaining glyph of the layer. The result is
    /// duplicate-free.
    pub fn glyph_order(&self) -> Vec<String> {
        let layer = self.font.default_layer();
        let mut seen = HashSet::new();
        let mut order = Vec::with_capacity(layer.len());

        if let Some(declared) = self
            .font
            .lib
            .get(GLYPH_ORDER_KEY)
            .and_then(|value| value.as_array())
        {
            for name in declared.iter().filter_map(|value| value.as_string()) {
                if layer.get_glyph(name).is_some() && seen.insert(name.to_string()) {
                    order.push(name.to_string());
                }
            }
        }

        for glyph in layer.iter() {
            let name = glyph.name().as_str();
            if seen.insert(name.to_string()) {
                order.push(name.to_string());
            }
        }

        order
    }

    /// Code point to glyph name, where the first glyph in glyph order wins
    pub fn character_map(&self) -> CharacterMap {
        let mut cmap = CharacterMap::new();
        for name in self.glyph_order() {
            let Some(glyph) = self.glyph(&name) else {
                continue;
            };
            for codepoint in glyph.codepoints.iter() {
                cmap.entry(codepoint).or_insert_with(|| name.clone());
            }
        }
        cmap
    }

    /// Every code point assigned to any glyph
    pub fn code_points(&self) -> impl Iterator<Item = char> + 'a {
        self.font
            .default_layer()
            .iter()
            .flat_map(|glyph| glyph.codepoints.iter())
    }

    pub fn metrics(&self) -> FontMetrics {
        FontMetrics::from_ufo(self.font)
    }
}

#[cfg(test)]
pub(crate) mod test_fonts {
    //! Small in-memory UFOs shared by the tests in this crate

    use norad::fontinfo::NonNegativeIntegerOrFloat;
    use norad::{Font, Glyph};

    /// Build a font from `(name, width, code points)` triples at 1000 units per em
    pub fn font_with_glyphs(glyphs: &[(&str, f64, &[char])]) -> Font {
        let mut font = Font::new();
        font.font_info.units_per_em = NonNegativeIntegerOrFloat::new(1000.0);
        font.font_info.ascender = Some(800.0);
        font.font_info.descender = Some(-200.0);
        for (name, width, codepoints) in glyphs {
            let mut glyph = Glyph::new(name);
            glyph.width = *width;
            for &codepoint in codepoints.iter() {
                glyph.codepoints.insert(codepoint);
            }
            font.default_layer_mut().insert_glyph(glyph);
        }
        font
    }
}

#[cfg(test)]
mod tests {
    use super::test_fonts::font_with_glyphs;
    use super::*;

    #[test]
    fn test_glyph_order_respects_lib_order() {
        let mut font = font_with_glyphs(&[("A", 500.0, &['A']), ("B", 600.0, &['B']), ("C", 550.0, &[])]);
        let declared = vec![
            plist::Value::from("C"),
            plist::Value::from("missing"),
            plist::Value::from("A"),
            plist::Value::from("C"),
        ];
        font.lib
            .insert(GLYPH_ORDER_KEY.to_string(), plist::Value::Array(declared));

        let order = SourceFont::new(&font).glyph_order();

        // Declared names first, unknown names dropped, the rest appended once
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_character_map_first_glyph_wins() {
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("A.alt", 500.0, &['A', 'a'])]);
        let cmap = SourceFont::new(&font).character_map();

        assert_eq!(cmap.get(&'A').map(String::as_str), Some("A"));
        assert_eq!(cmap.get(&'a').map(String::as_str), Some("A.alt"));
        assert_eq!(cmap.len(), 2);
    }

    #[test]
    fn test_binary_source_lib_key() {
        let mut font = font_with_glyphs(&[]);
        assert!(SourceFont::new(&font).binary_source().is_none());

        font.lib.insert(
            BINARY_SOURCE_KEY.to_string(),
            plist::Value::from("/tmp/Compiled.otf"),
        );
        assert_eq!(SourceFont::new(&font).binary_source(), Some("/tmp/Compiled.otf"));
    }
}
