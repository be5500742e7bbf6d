//! Alternate glyph extraction from the `aalt` feature

use crate::compile::{BinaryFont, GlyphOrder};
use read_fonts::tables::gsub::{
    AlternateSubstFormat1, Gsub, SingleSubst, SubstitutionSubtables,
};
use read_fonts::types::{GlyphId, Tag};
use read_fonts::{ReadError, TableProvider};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Glyph name to its sorted, distinct alternates
pub type AlternateMap = BTreeMap<String, Vec<String>>;

const AALT: Tag = Tag::new(b"aalt");

/// The two subtable encodings that offer alternates
enum AlternateSource<'a> {
    /// One glyph replaced by one glyph
    Single(SingleSubst<'a>),
    /// One glyph offered several candidates
    Alternate(AlternateSubstFormat1<'a>),
}

impl AlternateSource<'_> {
    fn contribute(
        &self,
        order: &GlyphOrder,
        out: &mut BTreeMap<String, BTreeSet<String>>,
    ) -> Result<(), ReadError> {
        let mut add = |from: GlyphId, to: GlyphId| {
            if let (Some(from), Some(to)) = (order.name(from), order.name(to)) {
                out.entry(from.to_string()).or_default().insert(to.to_string());
            }
        };

        match self {
            AlternateSource::Single(SingleSubst::Format1(table)) => {
                let delta = table.delta_glyph_id() as i32;
                for gid in table.coverage()?.iter() {
                    let target = (gid.to_u16() as i32 + delta).rem_euclid(0x10000) as u32;
                    add(gid.into(), GlyphId::new(target));
                }
            }
            AlternateSource::Single(SingleSubst::Format2(table)) => {
                let targets = table.substitute_glyph_ids();
                for (gid, target) in table.coverage()?.iter().zip(targets.iter()) {
                    add(gid.into(), target.get().into());
                }
            }
            AlternateSource::Alternate(table) => {
                let sets = table.alternate_sets();
                for (gid, set) in table.coverage()?.iter().zip(sets.iter()) {
                    for alternate in set?.alternate_glyph_ids() {
                        add(gid.into(), alternate.get().into());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Alternates offered by the font's `aalt` feature
///
/// Contributions from every lookup and subtable of the feature accumulate
/// per glyph. A font without GSUB or without `aalt` yields an empty map;
/// unreadable data is logged and skipped.
pub fn extract_alternates(font: &BinaryFont) -> AlternateMap {
    let gsub = match font.font_ref().and_then(|f| f.gsub()) {
        Ok(gsub) => gsub,
        Err(ReadError::TableIsMissing(_)) => return AlternateMap::new(),
        Err(e) => {
            warn!("Cannot read GSUB for alternates: {e}");
            return AlternateMap::new();
        }
    };

    let mut collected = BTreeMap::new();
    if let Err(e) = collect(&gsub, font.glyph_order(), &mut collected) {
        warn!("Stopped reading aalt alternates early: {e}");
    }
    debug!("Found alternates for {} glyphs", collected.len());

    collected
        .into_iter()
        .map(|(glyph, alternates)| (glyph, alternates.into_iter().collect()))
        .collect()
}

fn collect(
    gsub: &Gsub<'_>,
    order: &GlyphOrder,
    out: &mut BTreeMap<String, BTreeSet<String>>,
) -> Result<(), ReadError> {
    let feature_list = gsub.feature_list()?;
    let lookup_list = gsub.lookup_list()?;

    for record in feature_list.feature_records() {
        if record.feature_tag() != AALT {
            continue;
        }
        let feature = record.feature(feature_list.offset_data())?;
        for index in feature.lookup_list_indices() {
            let lookup = lookup_list.lookups().get(index.get() as usize)?;
            let sources: Vec<AlternateSource<'_>> = match lookup.subtables()? {
                SubstitutionSubtables::Single(subtables) => subtables
                    .iter()
                    .map(|t| t.map(AlternateSource::Single))
                    .collect::<Result<_, _>>()?,
                SubstitutionSubtables::Alternate(subtables) => subtables
                    .iter()
                    .map(|t| t.map(AlternateSource::Alternate))
                    .collect::<Result<_, _>>()?,
                _ => continue,
            };
            for source in &sources {
                source.contribute(order, out)?;
            }
        }
    }

    Ok(())
}
