//! Font table builder
//!
//! Turns the live UFO plus its feature source into a [`BinaryFont`]: a
//! skeleton of `head`, `hhea`, `maxp`, `hmtx`, `cmap` and `post` around the
//! layout tables `fea-rs` compiles.

use super::binary::{assign_private_code_points, build_cmap, BinaryFont, GlyphMetrics, GlyphOrder};
use super::report::CompileReport;
use crate::error::BuildError;
use crate::features::{preprocess, KernSynthesizer, UfoKernWriter};
use crate::font_source::metrics::round_units;
use crate::font_source::SourceFont;
use fea_rs::compile::{Compiler, NopFeatureProvider, NopVariationInfo};
use fea_rs::parse::{SourceLoadError, SourceResolver};
use fea_rs::GlyphMap;
use fontdrasil::types::GlyphName;
use read_fonts::FontRef;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use write_fonts::tables::head::Head;
use write_fonts::tables::hhea::Hhea;
use write_fonts::tables::hmtx::{Hmtx, LongMetric};
use write_fonts::tables::maxp::Maxp;
use write_fonts::tables::post::Post;
use write_fonts::types::{FWord, UfWord};
use write_fonts::FontBuilder;

/// Name the in-memory feature source is registered under
const MAIN_SOURCE: &str = "<features>";

const NOTDEF: &str = ".notdef";

/// Serves the preprocessed feature text from memory and includes from disk
struct MemoryResolver {
    main: Arc<str>,
    include_dir: PathBuf,
}

impl SourceResolver for MemoryResolver {
    fn get_contents(&self, path: &Path) -> Result<Arc<str>, SourceLoadError> {
        if path == Path::new(MAIN_SOURCE) {
            return Ok(self.main.clone());
        }
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.include_dir.join(path)
        };
        std::fs::read_to_string(&full)
            .map(Into::into)
            .map_err(|e| SourceLoadError::new(path.to_path_buf(), e))
    }
}

/// Builds preview binaries from one live font
pub struct FontTableBuilder<'a> {
    source: SourceFont<'a>,
    include_dir: PathBuf,
    synthesizer: Box<dyn KernSynthesizer + 'a>,
}

impl<'a> FontTableBuilder<'a> {
    pub fn new(font: &'a norad::Font) -> Self {
        Self {
            source: SourceFont::new(font),
            include_dir: PathBuf::from("."),
            synthesizer: Box::new(UfoKernWriter),
        }
    }

    /// Directory relative `include()` paths are resolved against
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dir = dir.into();
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: impl KernSynthesizer + 'a) -> Self {
        self.synthesizer = Box::new(synthesizer);
        self
    }

    pub fn source(&self) -> SourceFont<'a> {
        self.source
    }

    /// Compile `features` against the live font
    pub fn build(&self, features: &str) -> Result<BinaryFont, BuildError> {
        let character_map = self.source.character_map();
        let glyph_order = GlyphOrder::new(
            std::iter::once(NOTDEF.to_string())
                .chain(self.source.glyph_order())
                .chain(character_map.values().cloned()),
        );
        debug!(
            "Building preview font with {} glyphs and {} mapped code points",
            glyph_order.len(),
            character_map.len()
        );

        let text = preprocess(features, &self.source, &self.include_dir, self.synthesizer.as_ref())?;
        let layout = self.compile(&text, &glyph_order)?;

        let num_glyphs = glyph_count(&glyph_order)?;
        let metrics = self.glyph_metrics(&glyph_order);
        let font_metrics = self.source.metrics();
        let units_per_em = font_metrics.units_per_em_u16();
        let ascender = font_metrics.ascender_i16();
        let descender = font_metrics.descender_i16();
        let private_code_points = assign_private_code_points(&glyph_order, &character_map);

        let head = Head {
            units_per_em,
            ..Default::default()
        };
        let hhea = Hhea {
            ascender: FWord::new(ascender),
            descender: FWord::new(descender),
            line_gap: FWord::new(0),
            advance_width_max: UfWord::new(
                metrics.iter().map(|m| m.advance_width).max().unwrap_or(0),
            ),
            min_left_side_bearing: FWord::new(0),
            min_right_side_bearing: FWord::new(0),
            x_max_extent: FWord::new(0),
            caret_slope_rise: 1,
            caret_slope_run: 0,
            caret_offset: 0,
            number_of_h_metrics: num_glyphs,
        };
        let maxp = Maxp {
            num_glyphs,
            ..Default::default()
        };
        let hmtx = Hmtx {
            h_metrics: metrics
                .iter()
                .map(|m| LongMetric {
                    advance: m.advance_width,
                    side_bearing: 0,
                })
                .collect(),
            left_side_bearings: Vec::new(),
        };
        let cmap = build_cmap(&glyph_order, &character_map, &private_code_points)?;
        let post = Post::new_v2(glyph_order.names().iter().map(String::as_str));

        let mut builder = FontBuilder::new();
        builder
            .add_table(&head)
            .and_then(|b| b.add_table(&hhea))
            .and_then(|b| b.add_table(&maxp))
            .and_then(|b| b.add_table(&hmtx))
            .and_then(|b| b.add_table(&cmap))
            .and_then(|b| b.add_table(&post))
            .map_err(assemble)?;
        if let Some(layout) = &layout {
            builder.copy_missing_tables(FontRef::new(layout)?);
        }
        let data = builder.build();

        if let Some(missing) = character_map
            .values()
            .find(|name| !glyph_order.contains(name))
        {
            return Err(BuildError::MissingGlyph(missing.clone()));
        }

        info!("Built preview font ({} bytes)", data.len());
        Ok(BinaryFont::from_parts(
            glyph_order,
            character_map,
            private_code_points,
            metrics,
            units_per_em,
            data,
        ))
    }

    /// Run the feature compiler and serialize its layout tables, or nothing
    /// when there is no feature source
    fn compile(&self, text: &str, glyph_order: &GlyphOrder) -> Result<Option<Vec<u8>>, BuildError> {
        if text.trim().is_empty() {
            debug!("No feature source, building without layout tables");
            return Ok(None);
        }

        let glyph_map: GlyphMap = glyph_order
            .names()
            .iter()
            .map(|name| GlyphName::new(name.as_str()))
            .collect();
        let resolver = MemoryResolver {
            main: text.into(),
            include_dir: self.include_dir.clone(),
        };

        let compilation = Compiler::<NopFeatureProvider, NopVariationInfo>::new(
            OsString::from(MAIN_SOURCE),
            &glyph_map,
        )
        .with_resolver(resolver)
        .compile()
        .map_err(|e| BuildError::Compile(CompileReport::failure(&e.display_verbose().to_string())))?;

        // fea-rs serializes with its own write-fonts; hand its tables over as bytes
        let layout = compilation
            .to_font_builder()
            .map_err(|e| BuildError::Assemble(e.to_string()))?
            .build();
        Ok(Some(layout))
    }

    /// Rounded advances for every glyph in order; glyphs outside the live
    /// font (the synthetic `.notdef`) get zero
    fn glyph_metrics(&self, glyph_order: &GlyphOrder) -> Vec<GlyphMetrics> {
        glyph_order
            .names()
            .iter()
            .map(|name| {
                self.source
                    .glyph(name)
                    .map(|glyph| GlyphMetrics {
                        advance_width: round_units(glyph.width).clamp(0, u16::MAX as i32) as u16,
                        advance_height: round_units(glyph.height).clamp(0, u16::MAX as i32) as u16,
                    })
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// Glyph count as stored in `maxp` and `hhea`
fn glyph_count(glyph_order: &GlyphOrder) -> Result<u16, BuildError> {
    u16::try_from(glyph_order.len()).map_err(|_| {
        BuildError::Assemble(format!("{} glyphs exceed the 65535 glyph limit", glyph_order.len()))
    })
}

fn assemble(error: write_fonts::BuilderError) -> BuildError {
    BuildError::Assemble(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_source::test_fonts::font_with_glyphs;
    use read_fonts::types::GlyphId;
    use read_fonts::TableProvider;

    #[test]
    fn test_build_without_features() {
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("B", 600.0, &['B'])]);
        let binary = FontTableBuilder::new(&font).build("").unwrap();

        assert_eq!(binary.glyph_order().names(), [".notdef", "A", "B"]);
        assert_eq!(binary.metrics(GlyphId::new(2)).unwrap().advance_width, 600);

        let font_ref = binary.font_ref().unwrap();
        assert_eq!(font_ref.head().unwrap().units_per_em(), 1000);
        assert_eq!(font_ref.maxp().unwrap().num_glyphs(), 3);
        // Vertical metrics travel in the serialized hhea
        assert_eq!(font_ref.hhea().unwrap().ascender().to_i16(), 800);
        assert_eq!(font_ref.hhea().unwrap().descender().to_i16(), -200);
        assert_eq!(font_ref.cmap().unwrap().map_codepoint('B'), Some(GlyphId::new(2)));
        assert!(font_ref.gsub().is_err());
        assert!(font_ref.gpos().is_err());
    }

    #[test]
    fn test_glyph_order_covers_character_map() {
        let font = font_with_glyphs(&[
            ("A", 500.0, &['A']),
            ("A.alt", 500.0, &[]),
            ("a", 450.0, &['a']),
        ]);
        let binary = FontTableBuilder::new(&font).build("").unwrap();

        for name in binary.character_map().values() {
            assert!(binary.glyph_order().contains(name));
        }
        // Unencoded glyphs are reachable through the binary's own cmap only
        assert!(binary.input_code_point("A.alt").is_some());
        assert!(!binary.character_map().values().any(|name| name == "A.alt"));
    }

    #[test]
    fn test_existing_notdef_keeps_its_metrics() {
        let font = font_with_glyphs(&[(".notdef", 400.0, &[]), ("A", 500.0, &['A'])]);
        let binary = FontTableBuilder::new(&font).build("").unwrap();

        assert_eq!(binary.glyph_order().names()[0], ".notdef");
        assert_eq!(binary.metrics(GlyphId::new(0)).unwrap().advance_width, 400);
    }

    #[test]
    fn test_substitution_compiles_into_gsub() {
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("A.alt", 520.0, &[])]);
        let binary = FontTableBuilder::new(&font)
            .build("feature salt { sub A by A.alt; } salt;")
            .unwrap();

        let font_ref = binary.font_ref().unwrap();
        assert!(font_ref.gsub().is_ok());
    }

    #[test]
    fn test_unknown_glyph_is_a_compile_error() {
        let font = font_with_glyphs(&[("A", 500.0, &['A'])]);
        let result = FontTableBuilder::new(&font).build("feature salt { sub A by Q; } salt;");

        match result {
            Err(BuildError::Compile(report)) => {
                assert!(report.failed);
                // The diagnostic names the glyph, not just the failure kind
                assert!(
                    report.messages().iter().any(|m| m.contains('Q')),
                    "unexpected messages: {:?}",
                    report.messages()
                );
            }
            other => panic!("expected a compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_include_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("salt.fea"), "feature salt { sub A by A.alt; } salt;\n").unwrap();
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("A.alt", 520.0, &[])]);

        let binary = FontTableBuilder::new(&font)
            .with_include_dir(dir.path())
            .build("include(salt.fea);\n")
            .unwrap();
        assert!(binary.font_ref().unwrap().gsub().is_ok());
    }

    #[test]
    fn test_glyph_count_limit() {
        let fits = GlyphOrder::new((0..u16::MAX as usize).map(|i| format!("g{i}")));
        assert_eq!(glyph_count(&fits).unwrap(), u16::MAX);

        // One past the limit must not wrap around to zero
        let overflow = GlyphOrder::new((0..=u16::MAX as usize).map(|i| format!("g{i}")));
        assert!(matches!(glyph_count(&overflow), Err(BuildError::Assemble(_))));
    }

    #[test]
    fn test_layout_tables_merge_into_skeleton() {
        let font = font_with_glyphs(&[("A", 500.0, &['A']), ("V", 500.0, &['V']), ("A.alt", 520.0, &[])]);
        let binary = FontTableBuilder::new(&font)
            .build("feature salt { sub A by A.alt; } salt;\nfeature kern { pos A V -80; } kern;\n")
            .unwrap();

        let font_ref = binary.font_ref().unwrap();
        assert!(font_ref.gsub().is_ok());
        assert!(font_ref.gpos().is_ok());
        // The skeleton's own tables survive the merge
        assert_eq!(font_ref.maxp().unwrap().num_glyphs(), 4);
        assert_eq!(font_ref.cmap().unwrap().map_codepoint('V'), Some(GlyphId::new(2)));
    }
}
