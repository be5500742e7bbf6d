//! Feature preview
//!
//! Builds a minimal binary font from a UFO and its feature source, then
//! shapes text with it so feature changes can be seen as they are made.

pub mod compile;
pub mod core;
pub mod error;
pub mod features;
pub mod font_source;
pub mod layout;
pub mod logging;
pub mod preview;
pub mod shaping;

pub use error::{BuildError, ShapeError};
