//! Feature source handling
//!
//! Everything that happens to the UFO's feature text before it reaches the
//! compiler: include resolution, a statement tree that can be edited and
//! printed back losslessly, and kerning synthesis.

pub mod includes;
pub mod kerning;
pub mod preprocess;
pub mod tree;

pub use includes::{included_paths, resolve_includes};
pub use kerning::{KernSynthesizer, UfoKernWriter};
pub use preprocess::preprocess;
pub use tree::{FeatureTree, Origin, Statement, StatementKind};
