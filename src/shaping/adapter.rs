//! HarfRust shaping adapter
//!
//! Every call is independent: the engine is built from the serialized font,
//! fed the input and the feature flags in effect right now, and dropped.

use crate::compile::BinaryFont;
use crate::error::ShapeError;
use crate::font_source::CharacterMap;
use harfrust::{Feature, FontRef, Language, Script, ShaperData, UnicodeBuffer};
use read_fonts::types::Tag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, warn};

/// Writing direction requested for a shaping call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "ltr")]
    LeftToRight,
    #[serde(rename = "rtl")]
    RightToLeft,
    /// Let the engine pick from the script
    #[default]
    #[serde(rename = "auto")]
    Unspecified,
}

impl Direction {
    fn to_engine(self) -> Option<harfrust::Direction> {
        match self {
            Direction::LeftToRight => Some(harfrust::Direction::LeftToRight),
            Direction::RightToLeft => Some(harfrust::Direction::RightToLeft),
            Direction::Unspecified => None,
        }
    }
}

/// Case conversion applied to the input before shaping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMode {
    #[default]
    Unchanged,
    Upper,
    Lower,
}

impl CaseMode {
    /// Convert one character; a conversion may yield several characters
    pub fn convert(self, ch: char) -> Vec<char> {
        match self {
            CaseMode::Unchanged => vec![ch],
            CaseMode::Upper => ch.to_uppercase().collect(),
            CaseMode::Lower => ch.to_lowercase().collect(),
        }
    }

    /// Convert a glyph through the character map
    ///
    /// The glyph's first code point is converted and mapped back to a glyph.
    /// Glyphs without code points, or whose converted code point has no
    /// glyph, stay as they are.
    pub fn convert_glyph(self, name: &str, character_map: &CharacterMap) -> String {
        if self == CaseMode::Unchanged {
            return name.to_string();
        }
        character_map
            .iter()
            .find(|(_, glyph)| glyph.as_str() == name)
            .and_then(|(ch, _)| match self.convert(*ch).as_slice() {
                [single] => character_map.get(single).cloned(),
                _ => None,
            })
            .unwrap_or_else(|| name.to_string())
    }
}

/// What to shape
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeInput {
    Text(String),
    /// Glyph names, shaped through the code points that reach them
    Glyphs(Vec<String>),
}

impl ShapeInput {
    /// Parse a `/A/B/a.alt` style glyph sequence
    pub fn glyph_sequence(sequence: &str) -> Self {
        ShapeInput::Glyphs(
            sequence
                .split(|c: char| c == '/' || c.is_whitespace())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Input and settings of one shaping call
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRequest {
    pub input: ShapeInput,
    /// OpenType script tag; empty or `DFLT` lets the engine guess
    pub script: String,
    /// OpenType language tag; empty or `dflt` leaves it unset
    pub language: String,
    pub direction: Direction,
    pub case: CaseMode,
}

impl ShapeRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            input: ShapeInput::Text(text.into()),
            script: String::new(),
            language: String::new(),
            direction: Direction::Unspecified,
            case: CaseMode::Unchanged,
        }
    }

    pub fn glyphs(sequence: &str) -> Self {
        Self {
            input: ShapeInput::glyph_sequence(sequence),
            ..Self::text("")
        }
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_case(mut self, case: CaseMode) -> Self {
        self.case = case;
        self
    }
}

/// One positioned glyph in shaped order, in font units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapedGlyph {
    pub glyph_id: u32,
    pub cluster: u32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub x_advance: i32,
    pub y_advance: i32,
}

/// The code points to feed the engine for `request`
pub fn input_code_points(request: &ShapeRequest, font: &BinaryFont) -> Result<Vec<char>, ShapeError> {
    match &request.input {
        ShapeInput::Text(text) => Ok(text.chars().flat_map(|ch| request.case.convert(ch)).collect()),
        ShapeInput::Glyphs(names) => names
            .iter()
            .map(|name| {
                let name = request.case.convert_glyph(name, font.character_map());
                font.input_code_point(&name)
                    .ok_or(ShapeError::UnknownGlyph(name))
            })
            .collect(),
    }
}

/// OpenType script tags that differ from their ISO 15924 code
fn iso15924_code(script: &str) -> &str {
    match script {
        "dev2" | "dev3" => "deva",
        "bng2" | "bng3" => "beng",
        "gjr2" | "gjr3" => "gujr",
        "gur2" | "gur3" => "guru",
        "knd2" | "knd3" => "knda",
        "mlm2" | "mlm3" => "mlym",
        "ory2" | "ory3" => "orya",
        "tml2" | "tml3" => "taml",
        "tel2" | "tel3" => "telu",
        "mym2" => "mymr",
        "nko" => "nkoo",
        "vai" => "vaii",
        "yi" => "yiii",
        "lao" => "laoo",
        "jamo" => "hang",
        "math" => "zmth",
        other => other,
    }
}

fn engine_script(script: &str) -> Option<Script> {
    let script = script.trim_end();
    if script.is_empty() || script == "DFLT" {
        return None;
    }
    let code = iso15924_code(script);
    let tag = Tag::new_checked(code.as_bytes()).ok()?;
    let resolved = Script::from_iso15924_tag(harfrust::Tag::new(&tag.to_be_bytes()));
    if resolved.is_none() {
        warn!("Unknown script tag '{script}', letting the engine guess");
    }
    resolved
}

fn engine_language(language: &str) -> Option<Language> {
    let language = language.trim_end();
    if language.is_empty() || language == "dflt" {
        return None;
    }
    // Private-use subtag so the OpenType language tag is used verbatim
    Language::from_str(&format!("x-hbot{language}")).ok()
}

/// Shape `code_points` with the serialized font in `data`
///
/// `states` is the complete feature-flag map in effect for this call; every
/// entry is passed to the engine as on or off.
pub fn shape(
    data: &[u8],
    code_points: &[char],
    request: &ShapeRequest,
    states: &BTreeMap<Tag, bool>,
) -> Result<Vec<ShapedGlyph>, ShapeError> {
    let font_ref = FontRef::from_index(data, 0).map_err(|e| ShapeError::Font(format!("{e:?}")))?;
    if code_points.is_empty() {
        return Ok(Vec::new());
    }

    let shaper_data = ShaperData::new(&font_ref);
    let shaper = shaper_data.shaper(&font_ref).build();

    let mut buffer = UnicodeBuffer::new();
    for (i, &ch) in code_points.iter().enumerate() {
        buffer.add(ch, i as u32);
    }
    if let Some(direction) = request.direction.to_engine() {
        buffer.set_direction(direction);
    }
    if let Some(script) = engine_script(&request.script) {
        buffer.set_script(script);
    }
    if let Some(language) = engine_language(&request.language) {
        buffer.set_language(language);
    }
    buffer.guess_segment_properties();

    let features: Vec<Feature> = states
        .iter()
        .map(|(tag, &enabled)| {
            Feature::new(harfrust::Tag::new(&tag.to_be_bytes()), enabled as u32, ..)
        })
        .collect();

    let glyph_buffer = shaper.shape(buffer, &features);
    let infos = glyph_buffer.glyph_infos();
    let positions = glyph_buffer.glyph_positions();
    debug!(
        "🔤 Shaped {} code points into {} glyphs with {} feature flags",
        code_points.len(),
        infos.len(),
        features.len()
    );

    Ok(infos
        .iter()
        .zip(positions.iter())
        .map(|(info, pos)| ShapedGlyph {
            glyph_id: info.glyph_id,
            cluster: info.cluster,
            x_offset: pos.x_offset,
            y_offset: pos.y_offset,
            x_advance: pos.x_advance,
            y_advance: pos.y_advance,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::FontTableBuilder;
    use crate::font_source::test_fonts::font_with_glyphs;

    #[test]
    fn test_case_conversion_of_text() {
        assert_eq!(CaseMode::Upper.convert('a'), ['A']);
        assert_eq!(CaseMode::Lower.convert('A'), ['a']);
        assert_eq!(CaseMode::Upper.convert('ß'), ['S', 'S']);
        assert_eq!(CaseMode::Unchanged.convert('q'), ['q']);
    }

    #[test]
    fn test_case_conversion_of_glyphs() {
        let mut cmap = CharacterMap::new();
        cmap.insert('A', "A".to_string());
        cmap.insert('a', "a".to_string());
        cmap.insert('b', "b".to_string());

        assert_eq!(CaseMode::Upper.convert_glyph("a", &cmap), "A");
        assert_eq!(CaseMode::Lower.convert_glyph("A", &cmap), "a");
        // No glyph for 'B', so 'b' stays
        assert_eq!(CaseMode::Upper.convert_glyph("b", &cmap), "b");
        // Unencoded glyphs stay
        assert_eq!(CaseMode::Upper.convert_glyph("a.alt", &cmap), "a.alt");
    }

    #[test]
    fn test_glyph_sequence_parsing() {
        assert_eq!(
            ShapeInput::glyph_sequence("/A/B.alt /space"),
            ShapeInput::Glyphs(vec!["A".into(), "B.alt".into(), "space".into()])
        );
        assert_eq!(ShapeInput::glyph_sequence("//"), ShapeInput::Glyphs(Vec::new()));
    }

    #[test]
    fn test_script_and_language_resolution() {
        assert!(engine_script("").is_none());
        assert!(engine_script("DFLT").is_none());
        assert!(engine_script("latn").is_some());
        assert_eq!(engine_script("dev2"), engine_script("deva"));
        assert!(engine_language("dflt").is_none());
        assert!(engine_language("TRK ").is_some());
    }

    #[test]
    fn test_shape_plain_text() {
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("B", 600.0, &['B'])]);
        let binary = FontTableBuilder::new(&font).build("").unwrap();
        let request = ShapeRequest::text("AB").with_script("latn");

        let code_points = input_code_points(&request, &binary).unwrap();
        let shaped = shape(binary.data(), &code_points, &request, &BTreeMap::new()).unwrap();

        assert_eq!(shaped.len(), 2);
        assert_eq!(shaped[0].glyph_id, 1);
        assert_eq!(shaped[0].x_advance, 500);
        assert_eq!(shaped[1].glyph_id, 2);
        assert_eq!(shaped[1].x_advance, 600);
    }

    #[test]
    fn test_glyph_input_reaches_unencoded_glyphs() {
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("A.alt", 520.0, &[])]);
        let binary = FontTableBuilder::new(&font).build("").unwrap();

        let request = ShapeRequest::glyphs("/A.alt/A");
        let code_points = input_code_points(&request, &binary).unwrap();
        let shaped = shape(binary.data(), &code_points, &request, &BTreeMap::new()).unwrap();

        let names: Vec<_> = shaped
            .iter()
            .map(|g| binary.glyph_name(read_fonts::types::GlyphId::new(g.glyph_id)).unwrap())
            .collect();
        assert_eq!(names, ["A.alt", "A"]);

        let missing = input_code_points(&ShapeRequest::glyphs("/nope"), &binary);
        assert!(matches!(missing, Err(ShapeError::UnknownGlyph(name)) if name == "nope"));
    }

    #[test]
    fn test_feature_flags_apply_per_call() {
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("A.alt", 520.0, &[])]);
        let binary = FontTableBuilder::new(&font)
            .build("feature ss01 { sub A by A.alt; } ss01;")
            .unwrap();
        let request = ShapeRequest::text("A");
        let code_points = input_code_points(&request, &binary).unwrap();
        let ss01 = Tag::new(b"ss01");

        let off = shape(binary.data(), &code_points, &request, &BTreeMap::from([(ss01, false)])).unwrap();
        let on = shape(binary.data(), &code_points, &request, &BTreeMap::from([(ss01, true)])).unwrap();

        assert_eq!(off[0].glyph_id, 1);
        assert_eq!(on[0].glyph_id, 2);
    }

    #[test]
    fn test_unloadable_font_is_an_error() {
        let result = shape(b"garbage", &['A'], &ShapeRequest::text("A"), &BTreeMap::new());
        assert!(matches!(result, Err(ShapeError::Font(_))));
    }
}
