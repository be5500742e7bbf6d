//! Font table building
//!
//! Produces the [`BinaryFont`] the preview shapes with, either by compiling
//! the live font's features or by loading a binary compiled elsewhere.

pub mod binary;
pub mod builder;
pub mod report;

pub use binary::{BinaryFont, GlyphMetrics, GlyphOrder};
pub use builder::FontTableBuilder;
pub use report::CompileReport;
