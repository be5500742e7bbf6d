//! Kerning feature synthesis from UFO kerning data
//!
//! A UFO keeps kerning outside its feature source, in `kerning.plist` and the
//! `public.kern1.*` / `public.kern2.*` groups. When the designer has not
//! written a kerning feature by hand, those pairs are turned into feature
//! statements here and appended to the tree.

use super::tree::{FeatureTree, Statement, StatementKind};
use crate::error::BuildError;
use crate::font_source::metrics::round_units;
use crate::font_source::{is_right_to_left, script_tag, SourceFont};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const FIRST_GROUP_PREFIX: &str = "public.kern1.";
const SECOND_GROUP_PREFIX: &str = "public.kern2.";

const LTR_LOOKUP: &str = "kern_ltr";
const RTL_LOOKUP: &str = "kern_rtl";

/// Produces feature statements from data kept outside the feature source
pub trait KernSynthesizer: Send + Sync {
    /// Return `tree` with generated statements added
    ///
    /// A synthesizer with nothing to add returns the tree untouched.
    fn synthesize(&self, font: &SourceFont<'_>, tree: FeatureTree) -> Result<FeatureTree, BuildError>;
}

/// Writes a `kern` feature from the UFO's kerning and kerning groups
#[derive(Clone, Copy, Debug, Default)]
pub struct UfoKernWriter;

/// One side of a kerning pair after validation
#[derive(Clone, Debug, PartialEq)]
enum Side {
    Glyph(String),
    Class(String),
}

impl Side {
    fn is_class(&self) -> bool {
        matches!(self, Side::Class(_))
    }

    fn as_fea(&self) -> &str {
        match self {
            Side::Glyph(name) | Side::Class(name) => name,
        }
    }
}

struct Pair {
    first: Side,
    second: Side,
    value: i32,
    rtl: bool,
}

impl Pair {
    fn statement(&self) -> String {
        let keyword = if self.first.is_class() != self.second.is_class() {
            "enum pos"
        } else {
            "pos"
        };
        let value = if self.rtl {
            format!("<{0} 0 {0} 0>", self.value)
        } else {
            self.value.to_string()
        };
        format!(
            "{keyword} {} {} {value};",
            self.first.as_fea(),
            self.second.as_fea()
        )
    }

    /// Glyph pairs, then mixed pairs, then class pairs
    fn rank(&self) -> u8 {
        self.first.is_class() as u8 + self.second.is_class() as u8
    }
}

/// Kerning classes keyed by UFO group name
struct Classes {
    names: BTreeMap<String, String>,
    members: BTreeMap<String, Vec<String>>,
}

impl Classes {
    fn collect(font: &SourceFont<'_>) -> Self {
        let mut names = BTreeMap::new();
        let mut members = BTreeMap::new();
        let mut taken = Vec::new();

        for (group, glyphs) in font.font().groups.iter() {
            let group = group.as_str();
            let (prefix, suffix) = if let Some(rest) = group.strip_prefix(FIRST_GROUP_PREFIX) {
                ("kern1", rest)
            } else if let Some(rest) = group.strip_prefix(SECOND_GROUP_PREFIX) {
                ("kern2", rest)
            } else {
                continue;
            };

            let present: Vec<String> = glyphs
                .iter()
                .map(|name| name.as_str())
                .filter(|name| {
                    let known = font.contains(name);
                    if !known {
                        warn!("Kerning group {group} lists unknown glyph {name}");
                    }
                    known
                })
                .map(str::to_string)
                .collect();
            if present.is_empty() {
                warn!("Kerning group {group} has no glyphs in the font, skipping");
                continue;
            }

            let base = format!("@{prefix}.{}", sanitize(suffix));
            let mut class = base.clone();
            let mut n = 1;
            while taken.contains(&class) {
                class = format!("{base}_{n}");
                n += 1;
            }
            taken.push(class.clone());

            names.insert(group.to_string(), class);
            members.insert(group.to_string(), present);
        }

        Self { names, members }
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

impl UfoKernWriter {
    fn side(
        &self,
        font: &SourceFont<'_>,
        classes: &Classes,
        name: &str,
        prefix: &str,
    ) -> Option<(Side, Vec<String>)> {
        if name.starts_with("public.kern") {
            if !name.starts_with(prefix) {
                warn!("Kerning group {name} used on the wrong side of a pair, skipping");
                return None;
            }
            let class = classes.names.get(name);
            let members = classes.members.get(name);
            match (class, members) {
                (Some(class), Some(members)) => Some((Side::Class(class.clone()), members.clone())),
                _ => {
                    warn!("Kerning references unknown group {name}, skipping");
                    None
                }
            }
        } else if font.contains(name) {
            Some((Side::Glyph(name.to_string()), vec![name.to_string()]))
        } else {
            warn!("Kerning references unknown glyph {name}, skipping");
            None
        }
    }

    fn pairs(&self, font: &SourceFont<'_>, classes: &Classes) -> Result<Vec<Pair>, BuildError> {
        let mut pairs = Vec::new();

        for (first, seconds) in font.font().kerning.iter() {
            let Some((first_side, first_glyphs)) =
                self.side(font, classes, first.as_str(), FIRST_GROUP_PREFIX)
            else {
                continue;
            };
            for (second, value) in seconds.iter() {
                if !value.is_finite() {
                    return Err(BuildError::Synthesis(format!(
                        "kerning value for {first} {second} is not a number"
                    )));
                }
                let Some((second_side, second_glyphs)) =
                    self.side(font, classes, second.as_str(), SECOND_GROUP_PREFIX)
                else {
                    continue;
                };
                let rtl = first_glyphs
                    .iter()
                    .chain(second_glyphs.iter())
                    .any(|name| glyph_is_rtl(font, name));
                pairs.push(Pair {
                    first: first_side.clone(),
                    second: second_side,
                    value: round_units(*value),
                    rtl,
                });
            }
        }

        pairs.sort_by_key(Pair::rank);
        Ok(pairs)
    }
}

fn glyph_is_rtl(font: &SourceFont<'_>, name: &str) -> bool {
    font.glyph(name).is_some_and(|glyph| {
        glyph
            .codepoints
            .iter()
            .filter_map(script_tag)
            .any(|script| is_right_to_left(&script))
    })
}

fn lookup_block(label: &str, pairs: &[&Pair]) -> Statement {
    let body = pairs
        .iter()
        .map(|pair| Statement::synthesized(StatementKind::Other(pair.statement())))
        .collect();
    Statement::synthesized(StatementKind::Block {
        keyword: "lookup".to_string(),
        label: label.to_string(),
        body,
    })
}

impl KernSynthesizer for UfoKernWriter {
    fn synthesize(&self, font: &SourceFont<'_>, mut tree: FeatureTree) -> Result<FeatureTree, BuildError> {
        let classes = Classes::collect(font);
        let pairs = self.pairs(font, &classes)?;
        if pairs.is_empty() {
            debug!("No usable kerning pairs, kern feature not generated");
            return Ok(tree);
        }

        let (rtl, ltr): (Vec<&Pair>, Vec<&Pair>) = pairs.iter().partition(|pair| pair.rtl);
        debug!(
            "Generating kern feature from {} LTR and {} RTL pairs",
            ltr.len(),
            rtl.len()
        );

        for (group, class) in &classes.names {
            let members = classes.members.get(group).cloned().unwrap_or_default();
            tree.push(Statement::synthesized(StatementKind::Other(format!(
                "{class} = [{}];",
                members.join(" ")
            ))));
        }
        if !ltr.is_empty() {
            tree.push(lookup_block(LTR_LOOKUP, &ltr));
        }
        if !rtl.is_empty() {
            tree.push(lookup_block(RTL_LOOKUP, &rtl));
        }

        let lookup_for = |script: &str| -> Option<&'static str> {
            match (is_right_to_left(script), ltr.is_empty(), rtl.is_empty()) {
                (true, _, false) => Some(RTL_LOOKUP),
                (false, false, _) => Some(LTR_LOOKUP),
                _ => None,
            }
        };

        let mut body = Vec::new();
        let systems = tree.language_systems();
        if systems.is_empty() {
            body.extend(
                [(!ltr.is_empty(), LTR_LOOKUP), (!rtl.is_empty(), RTL_LOOKUP)]
                    .into_iter()
                    .filter(|(present, _)| *present)
                    .map(|(_, name)| {
                        Statement::synthesized(StatementKind::LookupReference(name.to_string()))
                    }),
            );
        }
        for (script, language) in systems {
            let Some(lookup) = lookup_for(&script) else {
                continue;
            };
            body.push(Statement::synthesized(StatementKind::Script(script.clone())));
            body.push(Statement::synthesized(StatementKind::Language(language)));
            body.push(Statement::synthesized(StatementKind::LookupReference(
                lookup.to_string(),
            )));
        }

        tree.push(Statement::synthesized(StatementKind::Block {
            keyword: "feature".to_string(),
            label: "kern".to_string(),
            body,
        }));
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_source::test_fonts::font_with_glyphs;
    use norad::Name;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn kern(font: &mut norad::Font, first: &str, second: &str, value: f64) {
        font.kerning
            .entry(name(first))
            .or_default()
            .insert(name(second), value);
    }

    #[test]
    fn test_no_kerning_leaves_tree_alone() {
        let font = font_with_glyphs(&[("A", 500.0, &['A'])]);
        let tree = FeatureTree::parse("feature liga { sub f i by f_i; } liga;").unwrap();
        let before = tree.to_string();

        let tree = UfoKernWriter
            .synthesize(&SourceFont::new(&font), tree)
            .unwrap();
        assert_eq!(tree.to_string(), before);
    }

    #[test]
    fn test_glyph_pair_becomes_ltr_lookup() {
        let mut font = font_with_glyphs(&[("A", 500.0, &['A']), ("V", 500.0, &['V'])]);
        kern(&mut font, "A", "V", -50.0);

        let tree = FeatureTree::parse("languagesystem DFLT dflt;\n").unwrap();
        let text = UfoKernWriter
            .synthesize(&SourceFont::new(&font), tree)
            .unwrap()
            .to_string();

        assert!(text.contains("lookup kern_ltr {\n    pos A V -50;\n} kern_ltr;"));
        assert!(text.contains("feature kern {\n    script DFLT;\n    language dflt;\n    lookup kern_ltr;\n} kern;"));
        assert!(!text.contains("kern_rtl"));
    }

    #[test]
    fn test_groups_and_ordering() {
        let mut font = font_with_glyphs(&[
            ("A", 500.0, &['A']),
            ("Aacute", 500.0, &['\u{00C1}']),
            ("T", 500.0, &['T']),
            ("o", 500.0, &['o']),
        ]);
        font.groups.insert(
            name("public.kern1.A"),
            vec![name("A"), name("Aacute"), name("Agrave")],
        );
        font.groups
            .insert(name("public.kern2.o"), vec![name("o")]);
        kern(&mut font, "public.kern1.A", "public.kern2.o", -20.0);
        kern(&mut font, "public.kern1.A", "T", -40.0);
        kern(&mut font, "T", "o", -60.4);

        let tree = FeatureTree::parse("").unwrap();
        let text = UfoKernWriter
            .synthesize(&SourceFont::new(&font), tree)
            .unwrap()
            .to_string();

        // Missing group members are dropped from the class
        assert!(text.contains("@kern1.A = [A Aacute];"));
        assert!(text.contains("@kern2.o = [o];"));

        let glyph_pair = text.find("pos T o -60;").unwrap();
        let mixed_pair = text.find("enum pos @kern1.A T -40;").unwrap();
        let class_pair = text.find("pos @kern1.A @kern2.o -20;").unwrap();
        assert!(glyph_pair < mixed_pair && mixed_pair < class_pair);
    }

    #[test]
    fn test_rtl_pairs_use_value_records() {
        let mut font = font_with_glyphs(&[
            ("A", 500.0, &['A']),
            ("V", 500.0, &['V']),
            ("beh-ar", 600.0, &['\u{0628}']),
            ("alef-ar", 300.0, &['\u{0627}']),
        ]);
        kern(&mut font, "A", "V", -50.0);
        kern(&mut font, "beh-ar", "alef-ar", -30.0);

        let tree = FeatureTree::parse(
            "languagesystem DFLT dflt;\nlanguagesystem arab dflt;\nlanguagesystem latn dflt;\n",
        )
        .unwrap();
        let text = UfoKernWriter
            .synthesize(&SourceFont::new(&font), tree)
            .unwrap()
            .to_string();

        assert!(text.contains("pos beh-ar alef-ar <-30 0 -30 0>;"));
        assert!(text.contains("script arab;\n    language dflt;\n    lookup kern_rtl;"));
        assert!(text.contains("script latn;\n    language dflt;\n    lookup kern_ltr;"));
    }

    #[test]
    fn test_unknown_glyphs_are_skipped() {
        let mut font = font_with_glyphs(&[("A", 500.0, &['A'])]);
        kern(&mut font, "A", "missing", -50.0);
        kern(&mut font, "public.kern1.nothing", "A", -10.0);

        let tree = FeatureTree::parse("").unwrap();
        let tree = UfoKernWriter
            .synthesize(&SourceFont::new(&font), tree)
            .unwrap();
        assert!(tree.statements().is_empty());
    }

    #[test]
    fn test_class_names_are_sanitized() {
        assert_eq!(sanitize("A-grave&co"), "A_grave_co");
        assert_eq!(sanitize("o.sc"), "o.sc");
        assert_eq!(sanitize(""), "_");
    }
}
