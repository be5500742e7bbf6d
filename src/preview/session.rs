//! Preview session holding the latest good build

use super::feature_font::FeatureFont;
use crate::compile::{BinaryFont, FontTableBuilder};
use crate::error::{BuildError, ShapeError};
use crate::font_source::SourceFont;
use crate::shaping::{GlyphRecord, ShapeInput, ShapeRequest};
use norad::Font;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Keeps the feature font in step with edits to the live font
///
/// A rebuild either replaces the current feature font completely or leaves
/// it untouched.
#[derive(Debug, Default)]
pub struct PreviewSession {
    current: Option<FeatureFont>,
    include_dir: PathBuf,
}

impl PreviewSession {
    pub fn new(include_dir: impl Into<PathBuf>) -> Self {
        Self {
            current: None,
            include_dir: include_dir.into(),
        }
    }

    pub fn current(&self) -> Option<&FeatureFont> {
        self.current.as_ref()
    }

    /// Rebuild from the font's own feature text or lib binary
    pub fn rebuild(&mut self, font: &Font) -> Result<&FeatureFont, BuildError> {
        let built = FeatureFont::from_source(font, &self.include_dir);
        self.install(built)
    }

    /// Rebuild from feature text other than the font's own
    pub fn rebuild_with_features(&mut self, font: &Font, features: &str) -> Result<&FeatureFont, BuildError> {
        let builder = FontTableBuilder::new(font).with_include_dir(&self.include_dir);
        let built = FeatureFont::build_with(&builder, features);
        self.install(built)
    }

    /// Replace the build with a font compiled elsewhere
    pub fn rebuild_from_binary(&mut self, font: &Font, path: &Path) -> Result<&FeatureFont, BuildError> {
        let character_map = SourceFont::new(font).character_map();
        let built = BinaryFont::from_file(path, Some(&character_map)).and_then(FeatureFont::from_binary);
        self.install(built)
    }

    fn install(&mut self, built: Result<FeatureFont, BuildError>) -> Result<&FeatureFont, BuildError> {
        let feature_font = match built {
            Ok(feature_font) => feature_font,
            Err(e) => {
                warn!("Preview build failed, keeping the previous build: {e}");
                return Err(e);
            }
        };
        if let Some(previous) = &self.current {
            feature_font.carry_over_states(previous);
        }
        info!("Preview font rebuilt");
        Ok(self.current.insert(feature_font))
    }

    /// Shape with the current build, or map straight through the live
    /// font's character map when no build succeeded yet
    pub fn process<'f>(&self, font: &'f Font, request: &ShapeRequest) -> Result<Vec<GlyphRecord<'f>>, ShapeError> {
        match &self.current {
            Some(feature_font) => feature_font.process(font, request),
            None => Ok(unresolved_records(font, request)),
        }
    }
}

/// Records with no adjustments for every input the live font can show
fn unresolved_records<'f>(font: &'f Font, request: &ShapeRequest) -> Vec<GlyphRecord<'f>> {
    debug!("No preview build, falling back to unshaped records");
    let layer = font.default_layer();
    let character_map = SourceFont::new(font).character_map();

    let names: Vec<String> = match &request.input {
        ShapeInput::Text(text) => text
            .chars()
            .flat_map(|ch| request.case.convert(ch))
            .filter_map(|ch| character_map.get(&ch).cloned())
            .collect(),
        ShapeInput::Glyphs(glyphs) => glyphs
            .iter()
            .map(|name| request.case.convert_glyph(name, &character_map))
            .collect(),
    };

    names
        .iter()
        .filter_map(|name| layer.get_glyph(name.as_str()))
        .map(GlyphRecord::unresolved)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_source::test_fonts::font_with_glyphs;
    use crate::shaping::CaseMode;

    #[test]
    fn test_failed_rebuild_keeps_previous() {
        let mut font = font_with_glyphs(&[("A", 500.0, &['A']), ("A.alt", 500.0, &[])]);
        font.features = "feature aalt { sub A by A.alt; } aalt;".to_string();
        let mut session = PreviewSession::new(".");
        session.rebuild(&font).unwrap();

        font.features = "feature aalt { sub A by A.alt; } aalt".to_string();
        assert!(session.rebuild(&font).is_err());

        // The earlier build is still the one in use
        let current = session.current().unwrap();
        assert_eq!(current.alternates().get("A"), Some(&vec!["A.alt".to_string()]));
    }

    #[test]
    fn test_rebuild_carries_states() {
        let mut font = font_with_glyphs(&[("A", 500.0, &['A']), ("A.alt", 500.0, &[])]);
        font.features = "feature salt { sub A by A.alt; } salt;".to_string();
        let mut session = PreviewSession::new(".");
        let salt = read_fonts::types::Tag::new(b"salt");

        session
            .rebuild(&font)
            .unwrap()
            .set_feature_state(crate::layout::TableKind::Substitution, salt, true);
        let rebuilt = session.rebuild(&font).unwrap();
        assert!(rebuilt.feature_state(salt));
    }

    #[test]
    fn test_unresolved_fallback() {
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("B", 500.0, &['B'])]);
        let session = PreviewSession::default();

        let records = session
            .process(&font, &ShapeRequest::text("abz").with_case(CaseMode::Upper))
            .unwrap();
        let names: Vec<&str> = records.iter().map(GlyphRecord::name).collect();
        // Z has no glyph and is skipped
        assert_eq!(names, vec!["A", "B"]);
        assert!(records.iter().all(|r| r.x_advance == 0 && r.alternates.is_empty()));
    }

    #[test]
    fn test_unresolved_glyph_input() {
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("a", 450.0, &['a'])]);
        let session = PreviewSession::default();

        let records = session
            .process(&font, &ShapeRequest::glyphs("/a/A").with_case(CaseMode::Upper))
            .unwrap();
        let names: Vec<&str> = records.iter().map(GlyphRecord::name).collect();
        assert_eq!(names, vec!["A", "A"]);
    }
}
