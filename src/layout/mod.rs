//! Layout table inspection
//!
//! Read-only views over the compiled GSUB and GPOS: which features, scripts
//! and languages they declare, and which alternates `aalt` offers.

pub mod alternates;
pub mod registry;

pub use alternates::{extract_alternates, AlternateMap};
pub use registry::{FeatureRegistry, FeatureStates, TableFeatures, TableKind};
