//! Feature source preparation before compilation

use super::includes::{included_paths, resolve_includes};
use super::kerning::KernSynthesizer;
use super::tree::{FeatureTree, Statement, StatementKind};
use crate::error::BuildError;
use crate::font_source::{font_scripts, SourceFont};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Make the font's feature source compilable on its own
///
/// Includes are made absolute. When the source has no kerning feature of
/// its own (in the text or any file it includes), `synthesizer` adds one. Any `languagesystem` statement it needed
/// for the font's scripts is removed again afterwards. Source that already
/// declares kerning is returned exactly as written, apart from includes.
pub fn preprocess(
    text: &str,
    font: &SourceFont<'_>,
    include_dir: &Path,
    synthesizer: &dyn KernSynthesizer,
) -> Result<String, BuildError> {
    let text = resolve_includes(text, include_dir)?;
    let tree = FeatureTree::parse(&text)?;

    if declares_kerning(&tree, &text, include_dir)? {
        debug!("Feature source declares kerning, skipping kern synthesis");
        return Ok(text);
    }

    let declared: Vec<String> = tree
        .language_systems()
        .into_iter()
        .map(|(script, _)| script)
        .collect();
    let candidates =
        std::iter::once("DFLT".to_string()).chain(font_scripts(font).into_iter());
    let injected: Vec<Statement> = candidates
        .filter(|script| !declared.contains(script))
        .map(|script| {
            Statement::injected(StatementKind::LanguageSystem {
                script,
                language: "dflt".to_string(),
            })
        })
        .collect();
    debug!("Injecting {} language systems for kern synthesis", injected.len());

    let mut tree = tree;
    tree.insert_after_language_systems(injected);
    let tree = synthesizer.synthesize(font, tree)?;

    Ok(tree.without_scaffolding().to_string())
}

/// Whether the source or anything it includes, however deeply, has a
/// kerning feature of its own
fn declares_kerning(tree: &FeatureTree, text: &str, include_dir: &Path) -> Result<bool, BuildError> {
    if tree.declares_kerning() {
        return Ok(true);
    }

    let mut seen = HashSet::new();
    let mut pending = included_paths(text, include_dir)?;
    while let Some(path) = pending.pop() {
        if !seen.insert(path.clone()) {
            continue;
        }
        let included = std::fs::read_to_string(&path).map_err(|source| BuildError::Include {
            path: path.clone(),
            source,
        })?;
        match FeatureTree::parse(&included) {
            Ok(tree) if tree.declares_kerning() => {
                debug!("Kerning declared in {}", path.display());
                return Ok(true);
            }
            Ok(_) => {}
            // The compiler reports this one with proper context
            Err(e) => warn!("Could not scan {} for kerning: {e}", path.display()),
        }
        // Nested includes resolve against the same directory as the compiler's
        pending.extend(included_paths(&included, include_dir)?);
    }
    Ok(false)
}
