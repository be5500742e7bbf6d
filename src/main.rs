//! Live OpenType feature preview for UFO font sources.
//!
//! Compiles a UFO's features with fea-rs, shapes text with HarfRust and
//! prints what each glyph ended up with.

use anyhow::{Context, Result};
use feature_preview::core::{self, CliArgs, ConfigFile};
use feature_preview::font_source::load_ufo_from_path;
use feature_preview::layout::TableKind;
use feature_preview::preview::{FeatureFont, PreviewSession};
use feature_preview::shaping::GlyphRecord;
use read_fonts::types::Tag;
use std::collections::BTreeSet;
use std::path::Path;

/// Run the preview with the given CLI arguments.
fn run(cli_args: CliArgs) -> Result<()> {
    if cli_args.new_config {
        return ConfigFile::initialize_config_directory();
    }
    cli_args.validate().map_err(anyhow::Error::msg)?;
    let _log_guard = feature_preview::logging::init(cli_args.verbose, cli_args.log_file)?;

    let font_path = cli_args.font_source.as_deref().context("No font source given")?;
    let font = load_ufo_from_path(font_path)
        .with_context(|| format!("Failed to load UFO {}", font_path.display()))?;
    let config = ConfigFile::load().unwrap_or_default();
    let base_dir = font_path.parent().unwrap_or(Path::new("."));

    let mut session = PreviewSession::new(base_dir);
    let built = match (&cli_args.binary, &cli_args.features) {
        (Some(binary), _) => session.rebuild_from_binary(&font, binary),
        (None, Some(features)) => {
            let text = std::fs::read_to_string(features)
                .with_context(|| format!("Failed to read {}", features.display()))?;
            session.rebuild_with_features(&font, &text)
        }
        (None, None) => session.rebuild(&font),
    };
    if let Err(e) = built {
        if cli_args.list {
            return Err(e).context("Cannot list features without a successful build");
        }
        eprintln!("{e}");
        eprintln!("Showing glyphs without feature processing.");
    }

    if let Some(feature_font) = session.current() {
        for (tag, enabled) in cli_args.feature_toggles(&config) {
            let kind = if feature_font.list_features(TableKind::Positioning).contains(&tag) {
                TableKind::Positioning
            } else {
                TableKind::Substitution
            };
            feature_font.set_feature_state(kind, tag, enabled);
        }
        if cli_args.list {
            print_catalog(feature_font, cli_args.json)?;
            return Ok(());
        }
    }

    let request = cli_args.shape_request(&config);
    let records = session.process(&font, &request)?;
    if cli_args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_records(&records);
    }
    Ok(())
}

fn tag_list(tags: &BTreeSet<Tag>, feature_font: &FeatureFont, with_state: bool) -> Vec<String> {
    tags.iter()
        .map(|tag| {
            if with_state && feature_font.feature_state(*tag) {
                format!("{tag} (on)")
            } else {
                tag.to_string()
            }
        })
        .collect()
}

fn print_catalog(feature_font: &FeatureFont, json: bool) -> Result<()> {
    let gsub = tag_list(feature_font.list_features(TableKind::Substitution), feature_font, !json);
    let gpos = tag_list(feature_font.list_features(TableKind::Positioning), feature_font, !json);
    let scripts = tag_list(&feature_font.list_scripts(), feature_font, false);
    let languages = tag_list(&feature_font.list_languages(), feature_font, false);

    if json {
        let catalog = serde_json::json!({
            "substitution": gsub,
            "positioning": gpos,
            "scripts": scripts,
            "languages": languages,
        });
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        println!("GSUB:      {}", gsub.join(", "));
        println!("GPOS:      {}", gpos.join(", "));
        println!("Scripts:   {}", scripts.join(", "));
        println!("Languages: {}", languages.join(", "));
    }
    Ok(())
}

fn print_records(records: &[GlyphRecord<'_>]) {
    let width = records
        .iter()
        .map(|r| r.name().chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    println!("{:<width$}  {:>6} {:>6} {:>6} {:>6}  Alternates", "Name", "XP", "YP", "XA", "YA");
    for record in records {
        println!(
            "{:<width$}  {:>6} {:>6} {:>6} {:>6}  {}",
            record.name(),
            record.x_placement,
            record.y_placement,
            record.x_advance,
            record.y_advance,
            record.alternates.join(" "),
        );
    }
}

fn main() {
    let cli_args = core::platform::get_cli_args();
    if let Err(error) = run(cli_args) {
        core::platform::handle_error(error);
    }
}
