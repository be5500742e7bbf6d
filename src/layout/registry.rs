//! Feature registry over the compiled GSUB and GPOS tables
//!
//! Tags are read once when a build completes. The enabled flags live in a
//! single [`FeatureStates`] store that both table views share, so a toggle
//! made through either view is seen by the other.

use parking_lot::RwLock;
use read_fonts::tables::layout::{FeatureList, ScriptList};
use read_fonts::types::Tag;
use read_fonts::{FontRef, ReadError, TableProvider};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which layout table a view describes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Substitution,
    Positioning,
}

impl TableKind {
    pub fn table_tag(self) -> Tag {
        match self {
            TableKind::Substitution => Tag::new(b"GSUB"),
            TableKind::Positioning => Tag::new(b"GPOS"),
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_tag())
    }
}

/// Enabled flags by feature tag; a tag without an entry is disabled
///
/// Cloning hands out another handle on the same store.
#[derive(Clone, Debug, Default)]
pub struct FeatureStates(Arc<RwLock<BTreeMap<Tag, bool>>>);

impl FeatureStates {
    pub fn get(&self, tag: Tag) -> bool {
        self.0.read().get(&tag).copied().unwrap_or(false)
    }

    pub fn set(&self, tag: Tag, enabled: bool) {
        self.0.write().insert(tag, enabled);
    }

    /// Add `tags` as disabled, leaving existing entries alone
    pub fn seed(&self, tags: impl IntoIterator<Item = Tag>) {
        let mut states = self.0.write();
        for tag in tags {
            states.entry(tag).or_insert(false);
        }
    }

    /// A copy of every entry at this moment
    pub fn snapshot(&self) -> BTreeMap<Tag, bool> {
        self.0.read().clone()
    }

    /// A separate store starting out with the current entries
    pub fn detached(&self) -> Self {
        Self(Arc::new(RwLock::new(self.snapshot())))
    }
}

/// What one layout table declares, plus a handle on the shared flags
#[derive(Debug)]
pub struct TableFeatures {
    pub kind: TableKind,
    pub features: BTreeSet<Tag>,
    pub scripts: BTreeSet<Tag>,
    pub languages: BTreeSet<Tag>,
    states: FeatureStates,
}

impl TableFeatures {
    fn empty(kind: TableKind, states: FeatureStates) -> Self {
        Self {
            kind,
            features: BTreeSet::new(),
            scripts: BTreeSet::new(),
            languages: BTreeSet::new(),
            states,
        }
    }

    fn with_states(&self, states: FeatureStates) -> Self {
        Self {
            kind: self.kind,
            features: self.features.clone(),
            scripts: self.scripts.clone(),
            languages: self.languages.clone(),
            states,
        }
    }

    fn read(
        kind: TableKind,
        states: FeatureStates,
        lists: Result<(FeatureList<'_>, ScriptList<'_>), ReadError>,
    ) -> Self {
        let mut table = Self::empty(kind, states);
        let (feature_list, script_list) = match lists {
            Ok(lists) => lists,
            Err(ReadError::TableIsMissing(_)) => {
                debug!("No {kind} table in the compiled font");
                return table;
            }
            Err(e) => {
                warn!("Unreadable {kind} table, treating it as empty: {e}");
                return table;
            }
        };

        table.features = feature_list
            .feature_records()
            .iter()
            .map(|record| record.feature_tag())
            .collect();

        for record in script_list.script_records() {
            table.scripts.insert(record.script_tag());
            match record.script(script_list.offset_data()) {
                Ok(script) => table.languages.extend(
                    script
                        .lang_sys_records()
                        .iter()
                        .map(|lang_sys| lang_sys.lang_sys_tag()),
                ),
                Err(e) => warn!("Unreadable script {} in {kind}: {e}", record.script_tag()),
            }
        }

        table
    }

    pub fn feature_state(&self, tag: Tag) -> bool {
        self.states.get(tag)
    }

    pub fn set_feature_state(&self, tag: Tag, enabled: bool) {
        self.states.set(tag, enabled);
    }
}

/// Feature, script and language catalogs of a compiled font
///
/// Both table views share one flag store. A cloned registry gets a store of
/// its own, so toggling a clone leaves the original alone.
#[derive(Debug)]
pub struct FeatureRegistry {
    substitution: TableFeatures,
    positioning: TableFeatures,
    states: FeatureStates,
}

impl Clone for FeatureRegistry {
    fn clone(&self) -> Self {
        let states = self.states.detached();
        Self {
            substitution: self.substitution.with_states(states.clone()),
            positioning: self.positioning.with_states(states.clone()),
            states,
        }
    }
}

impl FeatureRegistry {
    /// Read the catalogs of `font`
    ///
    /// Missing or unreadable layout tables give empty catalogs, never an
    /// error. Every declared feature starts disabled.
    pub fn from_font(font: &FontRef<'_>) -> Self {
        let states = FeatureStates::default();

        let gsub = font
            .gsub()
            .and_then(|gsub| Ok((gsub.feature_list()?, gsub.script_list()?)));
        let substitution = TableFeatures::read(TableKind::Substitution, states.clone(), gsub);

        let gpos = font
            .gpos()
            .and_then(|gpos| Ok((gpos.feature_list()?, gpos.script_list()?)));
        let positioning = TableFeatures::read(TableKind::Positioning, states.clone(), gpos);

        states.seed(substitution.features.iter().copied());
        states.seed(positioning.features.iter().copied());
        debug!(
            "Feature registry: {} substitution and {} positioning features",
            substitution.features.len(),
            positioning.features.len()
        );

        Self {
            substitution,
            positioning,
            states,
        }
    }

    /// A registry for a font without layout tables
    pub fn empty() -> Self {
        let states = FeatureStates::default();
        Self {
            substitution: TableFeatures::empty(TableKind::Substitution, states.clone()),
            positioning: TableFeatures::empty(TableKind::Positioning, states.clone()),
            states,
        }
    }

    pub fn table(&self, kind: TableKind) -> &TableFeatures {
        match kind {
            TableKind::Substitution => &self.substitution,
            TableKind::Positioning => &self.positioning,
        }
    }

    pub fn features(&self, kind: TableKind) -> &BTreeSet<Tag> {
        &self.table(kind).features
    }

    /// Scripts of both tables, sorted
    pub fn scripts(&self) -> BTreeSet<Tag> {
        self.substitution
            .scripts
            .union(&self.positioning.scripts)
            .copied()
            .collect()
    }

    /// Languages of both tables, sorted
    pub fn languages(&self) -> BTreeSet<Tag> {
        self.substitution
            .languages
            .union(&self.positioning.languages)
            .copied()
            .collect()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.substitution.features.contains(&tag) || self.positioning.features.contains(&tag)
    }

    pub fn feature_state(&self, tag: Tag) -> bool {
        self.states.get(tag)
    }

    pub fn set_feature_state(&self, kind: TableKind, tag: Tag, enabled: bool) {
        self.table(kind).set_feature_state(tag, enabled);
    }

    pub fn states(&self) -> &FeatureStates {
        &self.states
    }

    /// Copy the flags of tags this registry shares with `previous`
    pub fn carry_over(&self, previous: &FeatureRegistry) {
        let previous = previous.states.snapshot();
        for (tag, enabled) in previous {
            if self.contains(tag) {
                self.states.set(tag, enabled);
            }
        }
    }
}
