//! Preview orchestration
//!
//! [`FeatureFont`] ties one build to its registry and alternates;
//! [`PreviewSession`] swaps builds as the live font changes.

pub mod feature_font;
pub mod session;

pub use feature_font::FeatureFont;
pub use session::PreviewSession;
