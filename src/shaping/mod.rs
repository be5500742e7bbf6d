//! Shaping through HarfRust and the records built from its output

pub mod adapter;
pub mod records;

pub use adapter::{input_code_points, shape, CaseMode, Direction, ShapeInput, ShapeRequest, ShapedGlyph};
pub use records::{build_records, GlyphRecord};
