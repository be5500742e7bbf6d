//! The compiled binary font and its glyph bookkeeping
//!
//! A [`BinaryFont`] pairs the serialized font bytes with the structured view
//! they were built from (glyph order, character map, metrics). Both halves are
//! produced in one step and never change afterwards, so the shaping engine
//! always sees exactly what the rest of the crate describes.

use crate::error::BuildError;
use crate::font_source::CharacterMap;
use read_fonts::tables::cmap::CmapSubtable;
use read_fonts::types::{GlyphId, GlyphId16};
use read_fonts::{FontRef, TableProvider};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use write_fonts::tables::cmap::Cmap;
use write_fonts::FontBuilder;

/// First private-use code point handed to unencoded glyphs (plane 15)
const FIRST_PRIVATE_CODE_POINT: u32 = 0xF0000;
const LAST_PRIVATE_CODE_POINT: u32 = 0xFFFFD;

/// Ordered, duplicate-free glyph names; a glyph's position is its glyph id
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphOrder {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl GlyphOrder {
    /// Build an order from names, keeping the first occurrence of each
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut order = Self::default();
        for name in names {
            order.push(name.into());
        }
        order
    }

    fn push(&mut self, name: String) {
        if !self.index.contains_key(&name) {
            self.index.insert(name.clone(), self.names.len() as u32);
            self.names.push(name);
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn glyph_id(&self, name: &str) -> Option<GlyphId> {
        self.index.get(name).map(|&gid| GlyphId::new(gid))
    }

    pub fn name(&self, gid: GlyphId) -> Option<&str> {
        self.names.get(gid.to_u32() as usize).map(String::as_str)
    }
}

/// Horizontal metrics of one glyph in font units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlyphMetrics {
    pub advance_width: u16,
    pub advance_height: u16,
}

/// A compiled font ready for shaping
#[derive(Clone, Debug)]
pub struct BinaryFont {
    glyph_order: GlyphOrder,
    character_map: CharacterMap,
    /// Stand-in code points for glyphs the character map does not reach
    private_code_points: BTreeMap<String, char>,
    metrics: Vec<GlyphMetrics>,
    units_per_em: u16,
    data: Arc<[u8]>,
}

impl BinaryFont {
    pub(crate) fn from_parts(
        glyph_order: GlyphOrder,
        character_map: CharacterMap,
        private_code_points: BTreeMap<String, char>,
        metrics: Vec<GlyphMetrics>,
        units_per_em: u16,
        data: Vec<u8>,
    ) -> Self {
        Self {
            glyph_order,
            character_map,
            private_code_points,
            metrics,
            units_per_em,
            data: data.into(),
        }
    }

    /// Load an already compiled font file
    pub fn from_file(path: &Path, overlay: Option<&CharacterMap>) -> Result<Self, BuildError> {
        debug!("Loading compiled font from {}", path.display());
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes, overlay)
    }

    /// Read a compiled font
    ///
    /// Glyph names come from the `post` table, falling back to `gidN`. When
    /// `overlay` is given, the font's own character map is replaced by it (plus
    /// private-use entries for unencoded glyphs) and the bytes are rewritten
    /// so the shaping engine uses the same mapping.
    pub fn from_bytes(bytes: Vec<u8>, overlay: Option<&CharacterMap>) -> Result<Self, BuildError> {
        let font = FontRef::new(&bytes)?;
        let num_glyphs = font.maxp()?.num_glyphs();
        let glyph_order = read_glyph_order(&font, num_glyphs);
        let metrics = read_metrics(&font, num_glyphs);
        let head = font.head()?;
        let units_per_em = head.units_per_em();

        let Some(overlay) = overlay else {
            let character_map = read_character_map(&font, &glyph_order);
            return Ok(Self::from_parts(
                glyph_order,
                character_map,
                BTreeMap::new(),
                metrics,
                units_per_em,
                bytes,
            ));
        };

        let character_map: CharacterMap = overlay
            .iter()
            .filter(|(ch, name)| {
                let known = glyph_order.contains(name);
                if !known {
                    warn!("Character map overlay maps U+{:04X} to unknown glyph {name}", **ch as u32);
                }
                known
            })
            .map(|(ch, name)| (*ch, name.clone()))
            .collect();
        let private_code_points = assign_private_code_points(&glyph_order, &character_map);
        let cmap = build_cmap(&glyph_order, &character_map, &private_code_points)?;

        let data = FontBuilder::new()
            .add_table(&cmap)
            .map_err(|e| BuildError::Assemble(e.to_string()))?
            .copy_missing_tables(font)
            .build();

        Ok(Self::from_parts(
            glyph_order,
            character_map,
            private_code_points,
            metrics,
            units_per_em,
            data,
        ))
    }

    pub fn glyph_order(&self) -> &GlyphOrder {
        &self.glyph_order
    }

    pub fn character_map(&self) -> &CharacterMap {
        &self.character_map
    }

    pub fn glyph_name(&self, gid: GlyphId) -> Option<&str> {
        self.glyph_order.name(gid)
    }

    pub fn glyph_id(&self, name: &str) -> Option<GlyphId> {
        self.glyph_order.glyph_id(name)
    }

    pub fn metrics(&self, gid: GlyphId) -> Option<GlyphMetrics> {
        self.metrics.get(gid.to_u32() as usize).copied()
    }

    /// The code point that makes the shaping engine select `name`
    ///
    /// Encoded glyphs use their first mapped code point, unencoded ones their
    /// private-use stand-in.
    pub fn input_code_point(&self, name: &str) -> Option<char> {
        self.character_map
            .iter()
            .find(|(_, glyph)| glyph.as_str() == name)
            .map(|(ch, _)| *ch)
            .or_else(|| self.private_code_points.get(name).copied())
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// The serialized font, exactly as handed to the shaping engine
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn font_ref(&self) -> Result<FontRef<'_>, read_fonts::ReadError> {
        FontRef::new(&self.data)
    }
}

/// Give every glyph the character map does not reach a private-use code point
pub(crate) fn assign_private_code_points(
    glyph_order: &GlyphOrder,
    character_map: &CharacterMap,
) -> BTreeMap<String, char> {
    let encoded: std::collections::HashSet<&str> =
        character_map.values().map(String::as_str).collect();
    let mut next = FIRST_PRIVATE_CODE_POINT;
    let mut assigned = BTreeMap::new();

    for name in glyph_order.names().iter().skip(1) {
        if encoded.contains(name.as_str()) {
            continue;
        }
        let code_point = loop {
            if next > LAST_PRIVATE_CODE_POINT {
                break None;
            }
            let candidate = char::from_u32(next);
            next += 1;
            match candidate {
                Some(ch) if !character_map.contains_key(&ch) => break Some(ch),
                _ => continue,
            }
        };
        match code_point {
            Some(ch) => {
                assigned.insert(name.clone(), ch);
            }
            None => {
                warn!("Out of private-use code points, {name} cannot be shaped by name");
                break;
            }
        }
    }

    assigned
}

/// A `cmap` covering the character map and the private-use stand-ins
pub(crate) fn build_cmap(
    glyph_order: &GlyphOrder,
    character_map: &CharacterMap,
    private_code_points: &BTreeMap<String, char>,
) -> Result<Cmap, BuildError> {
    let encoded = character_map.iter().map(|(ch, name)| (*ch, name));
    let private = private_code_points.iter().map(|(name, ch)| (*ch, name));

    let mut mappings = Vec::with_capacity(character_map.len() + private_code_points.len());
    for (ch, name) in encoded.chain(private) {
        let gid = glyph_order
            .glyph_id(name)
            .ok_or_else(|| BuildError::MissingGlyph(name.clone()))?;
        mappings.push((ch, gid));
    }

    Cmap::from_mappings(mappings).map_err(|e| BuildError::CharacterMap(e.to_string()))
}

fn read_glyph_order(font: &FontRef<'_>, num_glyphs: u16) -> GlyphOrder {
    let post = font.post().ok();
    let mut order = GlyphOrder::default();

    for gid in 0..num_glyphs {
        let name = post
            .as_ref()
            .and_then(|post| post.glyph_name(GlyphId16::new(gid)))
            .filter(|name| !name.is_empty() && !order.contains(name))
            .map(str::to_string)
            .unwrap_or_else(|| format!("gid{gid}"));
        order.push(name);
    }

    order
}

fn read_metrics(font: &FontRef<'_>, num_glyphs: u16) -> Vec<GlyphMetrics> {
    let units_per_em = font.head().map(|head| head.units_per_em()).unwrap_or(1000);
    let Ok(hmtx) = font.hmtx() else {
        warn!("Compiled font has no hmtx table, advances default to zero");
        return vec![GlyphMetrics::default(); num_glyphs as usize];
    };

    let long_metrics = hmtx.h_metrics();
    let last_advance = long_metrics.last().map(|m| m.advance()).unwrap_or(0);
    (0..num_glyphs as usize)
        .map(|gid| GlyphMetrics {
            advance_width: long_metrics
                .get(gid)
                .map(|m| m.advance())
                .unwrap_or(last_advance),
            advance_height: units_per_em,
        })
        .collect()
}

fn read_character_map(font: &FontRef<'_>, glyph_order: &GlyphOrder) -> CharacterMap {
    let mut character_map = CharacterMap::new();
    let Ok(cmap) = font.cmap() else {
        return character_map;
    };

    for record in cmap.encoding_records() {
        let mappings: Vec<(u32, GlyphId)> = match record.subtable(cmap.offset_data()) {
            Ok(CmapSubtable::Format4(subtable)) => subtable.iter().collect(),
            Ok(CmapSubtable::Format12(subtable)) => subtable.iter().collect(),
            _ => continue,
        };
        for (code_point, gid) in mappings {
            let (Some(ch), Some(name)) = (char::from_u32(code_point), glyph_order.name(gid)) else {
                continue;
            };
            character_map.entry(ch).or_insert_with(|| name.to_string());
        }
    }

    character_map
}

#[cfg(test)]
mod tests {
    use super::*;
    use write_fonts::tables::{head::Head, maxp::Maxp, post::Post};

    /// A font with glyphs .notdef, A, B, A.alt and a cmap for A only
    fn small_binary() -> Vec<u8> {
        let order = GlyphOrder::new([".notdef", "A", "B", "A.alt"]);
        let mut cmap = CharacterMap::new();
        cmap.insert('A', "A".to_string());
        let cmap = build_cmap(&order, &cmap, &BTreeMap::new()).unwrap();

        let mut builder = FontBuilder::new();
        builder
            .add_table(&Maxp {
                num_glyphs: 4,
                ..Default::default()
            })
            .unwrap();
        builder
            .add_table(&Head {
                units_per_em: 1000,
                ..Default::default()
            })
            .unwrap();
        builder
            .add_table(&Post::new_v2(order.names().iter().map(String::as_str)))
            .unwrap();
        builder.add_table(&cmap).unwrap();
        builder.build()
    }

    #[test]
    fn test_glyph_order_keeps_first_occurrence() {
        let order = GlyphOrder::new(["A", "B", "A", "C"]);
        assert_eq!(order.names(), ["A", "B", "C"]);
        assert_eq!(order.glyph_id("C"), Some(GlyphId::new(2)));
        assert_eq!(order.name(GlyphId::new(1)), Some("B"));
        assert_eq!(order.name(GlyphId::new(9)), None);
    }

    #[test]
    fn test_private_code_points_skip_encoded_glyphs() {
        let order = GlyphOrder::new([".notdef", "A", "A.alt", "B.alt"]);
        let mut cmap = CharacterMap::new();
        cmap.insert('A', "A".to_string());
        // A designer-assigned plane 15 code point is never reused
        cmap.insert('\u{F0000}', "A".to_string());

        let assigned = assign_private_code_points(&order, &cmap);

        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned["A.alt"], '\u{F0001}');
        assert_eq!(assigned["B.alt"], '\u{F0002}');
        assert!(!assigned.contains_key(".notdef"));
    }

    #[test]
    fn test_cmap_rejects_unknown_glyph() {
        let order = GlyphOrder::new([".notdef", "A"]);
        let mut cmap = CharacterMap::new();
        cmap.insert('Z', "Z".to_string());

        let result = build_cmap(&order, &cmap, &BTreeMap::new());
        assert!(matches!(result, Err(BuildError::MissingGlyph(name)) if name == "Z"));
    }

    #[test]
    fn test_read_binary_without_overlay() {
        let font = BinaryFont::from_bytes(small_binary(), None).unwrap();

        assert_eq!(font.glyph_order().names(), [".notdef", "A", "B", "A.alt"]);
        assert_eq!(font.character_map().get(&'A').map(String::as_str), Some("A"));
        assert_eq!(font.units_per_em(), 1000);
        assert_eq!(font.input_code_point("A"), Some('A'));
        // Without an overlay, unencoded glyphs cannot be reached
        assert_eq!(font.input_code_point("A.alt"), None);
    }

    #[test]
    fn test_overlay_replaces_character_map() {
        let mut overlay = CharacterMap::new();
        overlay.insert('b', "B".to_string());
        overlay.insert('q', "missing".to_string());

        let font = BinaryFont::from_bytes(small_binary(), Some(&overlay)).unwrap();

        assert_eq!(font.character_map().len(), 1);
        assert_eq!(font.input_code_point("B"), Some('b'));
        assert!(font.input_code_point("A.alt").is_some());

        // The rewritten bytes carry the same mapping
        let cmap = font.font_ref().unwrap().cmap().unwrap();
        assert_eq!(cmap.map_codepoint('b'), Some(GlyphId::new(2)));
        assert_eq!(cmap.map_codepoint('A'), None);
    }

    #[test]
    fn test_unreadable_bytes_fail() {
        let result = BinaryFont::from_bytes(b"not a font".to_vec(), None);
        assert!(matches!(result, Err(BuildError::Binary(_))));
    }
}
