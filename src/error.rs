//! Error types for building and shaping preview fonts
//!
//! A [`BuildError`] is fatal to one build attempt and a [`ShapeError`] is
//! fatal to one `process` call. Neither touches previously built state.

use crate::compile::CompileReport;
use std::path::PathBuf;
use thiserror::Error;

/// Why a preview font could not be built
#[derive(Debug, Error)]
pub enum BuildError {
    /// The feature source is not well formed
    #[error("feature syntax error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An `include()` statement points at something we cannot read
    #[error("cannot resolve include '{}': {source}", path.display())]
    Include {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The kerning feature could not be generated
    #[error("kerning synthesis failed: {0}")]
    Synthesis(String),

    /// The feature compiler rejected the source
    #[error("error while compiling features\n{}", .0.messages().join("\n"))]
    Compile(CompileReport),

    /// A table could not be serialized into the binary
    #[error("failed to assemble font binary: {0}")]
    Assemble(String),

    /// Two glyphs claim the same code point in the binary character map
    #[error("character map conflict: {0}")]
    CharacterMap(String),

    /// A glyph referenced by the character map is absent from the glyph order
    #[error("glyph '{0}' is referenced but missing from the glyph order")]
    MissingGlyph(String),

    /// An external binary font could not be read
    #[error("unreadable binary font: {0}")]
    Binary(#[from] read_fonts::ReadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a shaping call failed
#[derive(Debug, Error)]
pub enum ShapeError {
    /// The shaping engine could not load the compiled buffer
    #[error("shaping engine could not load the font: {0}")]
    Font(String),

    /// A glyph-sequence input names a glyph the compiled font cannot reach
    #[error("glyph '{0}' cannot be reached through the compiled character map")]
    UnknownGlyph(String),
}
