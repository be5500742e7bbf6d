//! The feature font: one build, its catalogs and its alternates

use crate::compile::{BinaryFont, FontTableBuilder};
use crate::error::{BuildError, ShapeError};
use crate::font_source::SourceFont;
use crate::layout::{extract_alternates, AlternateMap, FeatureRegistry, TableKind};
use crate::shaping::{build_records, input_code_points, shape, GlyphRecord, ShapeRequest};
use norad::Font;
use read_fonts::types::Tag;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// A compiled preview of one state of the live font
///
/// The binary, the registry and the alternate map are fixed once built.
/// Only the feature flags change afterwards. A clone shares the binary but
/// keeps its own flags.
#[derive(Clone, Debug)]
pub struct FeatureFont {
    binary: BinaryFont,
    registry: FeatureRegistry,
    alternates: AlternateMap,
}

impl FeatureFont {
    /// Compile `features` against `font`
    pub fn build(font: &Font, features: &str) -> Result<Self, BuildError> {
        Self::build_with(&FontTableBuilder::new(font), features)
    }

    /// Compile with a configured builder
    pub fn build_with(builder: &FontTableBuilder<'_>, features: &str) -> Result<Self, BuildError> {
        let binary = builder.build(features)?;
        Self::from_binary(binary)
    }

    /// Build from the font's own sources
    ///
    /// A binary registered in the font lib is loaded instead of compiling
    /// the feature text; relative paths are taken from `base_dir`.
    pub fn from_source(font: &Font, base_dir: &Path) -> Result<Self, BuildError> {
        let source = SourceFont::new(font);
        match source.binary_source() {
            Some(path) => {
                info!("Using compiled binary '{path}' from the font lib");
                let binary = BinaryFont::from_file(&base_dir.join(path), Some(&source.character_map()))?;
                Self::from_binary(binary)
            }
            None => {
                let builder = FontTableBuilder::new(font).with_include_dir(base_dir);
                Self::build_with(&builder, source.features())
            }
        }
    }

    /// Wrap an already compiled binary
    pub fn from_binary(binary: BinaryFont) -> Result<Self, BuildError> {
        let registry = FeatureRegistry::from_font(&binary.font_ref()?);
        let alternates = extract_alternates(&binary);
        debug!(
            "Feature font ready: {} glyphs, {} glyphs with alternates",
            binary.glyph_order().len(),
            alternates.len()
        );
        Ok(Self {
            binary,
            registry,
            alternates,
        })
    }

    pub fn binary(&self) -> &BinaryFont {
        &self.binary
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    /// Shape `request` and describe the result in terms of `font`'s glyphs
    pub fn process<'f>(
        &self,
        font: &'f Font,
        request: &ShapeRequest,
    ) -> Result<Vec<GlyphRecord<'f>>, ShapeError> {
        let code_points = input_code_points(request, &self.binary)?;
        let states = self.registry.states().snapshot();
        let shaped = shape(self.binary.data(), &code_points, request, &states)?;
        Ok(build_records(&shaped, &self.binary, font, &self.alternates))
    }

    pub fn set_feature_state(&self, kind: TableKind, tag: Tag, enabled: bool) {
        self.registry.set_feature_state(kind, tag, enabled);
    }

    pub fn feature_state(&self, tag: Tag) -> bool {
        self.registry.feature_state(tag)
    }

    pub fn list_features(&self, kind: TableKind) -> &BTreeSet<Tag> {
        self.registry.features(kind)
    }

    pub fn list_scripts(&self) -> BTreeSet<Tag> {
        self.registry.scripts()
    }

    pub fn list_languages(&self) -> BTreeSet<Tag> {
        self.registry.languages()
    }

    /// Alternates extracted when this font was built
    pub fn alternates(&self) -> &AlternateMap {
        &self.alternates
    }

    /// Extract the alternates again from the binary
    pub fn load_alternates(&self) -> AlternateMap {
        extract_alternates(&self.binary)
    }

    /// Take over the flags `previous` had for tags this build also declares
    pub fn carry_over_states(&self, previous: &FeatureFont) {
        self.registry.carry_over(&previous.registry);
    }
}
