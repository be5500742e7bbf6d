//! Command line interface for the feature preview
//!
//! Handles parsing command line arguments and validating them before any
//! font is loaded. Options left out fall back to the settings file, then to
//! built-in defaults.

use crate::core::config_file::ConfigFile;
use crate::shaping::{CaseMode, Direction, ShapeRequest};
use clap::{ArgAction, Parser};
use read_fonts::types::Tag;
use std::path::PathBuf;
use tracing::debug;

/// Feature preview CLI arguments
///
/// Examples:
///   feature-preview --font MyFont.ufo --text "office"
///   feature-preview --font MyFont.ufo --text "office" --enable liga
///   feature-preview --font MyFont.ufo --glyphs "/a/a.alt" --json
///   feature-preview --font MyFont.ufo --text "سلام" --script arab
///   feature-preview --font MyFont.ufo --list
///   feature-preview --font MyFont.ufo --binary build/MyFont.otf --text "Hi"
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    name = "feature-preview",
    version,
    about = "Preview OpenType features of a UFO font source",
    long_about = "Compiles the feature file of a UFO (Unified Font Object) source into a minimal font, shapes text with it and prints the resulting glyphs with their placement and advance adjustments."
)]
pub struct CliArgs {
    /// Path to the UFO font source
    #[clap(
        long = "font",
        short = 'f',
        help = "UFO font source to preview",
        long_help = "Path to a UFO version 3 directory. Its features.fea is compiled unless --features or --binary is given, or the font lib names a compiled binary."
    )]
    pub font_source: Option<PathBuf>,

    /// Feature file used instead of the UFO's own features.fea
    #[clap(long = "features", help = "Feature file to compile instead of the UFO's features.fea")]
    pub features: Option<PathBuf>,

    /// Compiled font to shape with instead of compiling features
    #[clap(
        long = "binary",
        help = "Compiled OTF/TTF to shape with",
        long_help = "Shape with an already compiled font instead of compiling features. Glyph names are taken from its post table and its character map is replaced with the UFO's."
    )]
    pub binary: Option<PathBuf>,

    /// Text to shape
    #[clap(long = "text", short = 't', conflicts_with = "glyphs", help = "Text to shape")]
    pub text: Option<String>,

    /// Glyph names to shape, written as /name/name
    #[clap(long = "glyphs", short = 'g', help = "Glyph sequence to shape, e.g. /a/b/a.alt")]
    pub glyphs: Option<String>,

    #[clap(long = "script", help = "OpenType script tag, e.g. latn or arab")]
    pub script: Option<String>,

    #[clap(long = "language", help = "OpenType language tag, e.g. NLD")]
    pub language: Option<String>,

    #[clap(
        long = "direction",
        value_parser = parse_direction,
        help = "Writing direction: ltr, rtl or auto"
    )]
    pub direction: Option<Direction>,

    #[clap(
        long = "case",
        value_parser = parse_case,
        help = "Case conversion: unchanged, upper or lower"
    )]
    pub case: Option<CaseMode>,

    /// Feature tags to switch on
    #[clap(long = "enable", short = 'e', value_delimiter = ',', help = "Feature tags to enable, comma separated")]
    pub enable: Vec<String>,

    /// Feature tags to switch off, applied after --enable
    #[clap(long = "disable", short = 'd', value_delimiter = ',', help = "Feature tags to disable, comma separated")]
    pub disable: Vec<String>,

    /// Print the feature, script and language catalog instead of shaping
    #[clap(long = "list", short = 'l', help = "List features, scripts and languages")]
    pub list: bool,

    #[clap(long = "json", help = "Print output as JSON")]
    pub json: bool,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long = "verbose", action = ArgAction::Count, help = "Increase log verbosity")]
    pub verbose: u8,

    /// Also write logs to the config directory
    #[clap(
        long = "log-file",
        help = "Write logs to the config directory's logs folder",
        long_help = "Write logs to ~/.config/feature-preview/logs in addition to stderr, one file per day."
    )]
    pub log_file: bool,

    /// Initialize user configuration directory with settings
    ///
    /// This creates the ~/.config/feature-preview directory with a
    /// settings.json file holding the default shaping options.
    #[clap(
        long = "new-config",
        help = "Initialize user config directory with settings",
        long_help = "Initialize the ~/.config/feature-preview directory with a settings.json file holding the default script, language, direction, case and enabled features."
    )]
    pub new_config: bool,
}

fn parse_direction(value: &str) -> Result<Direction, String> {
    match value.to_ascii_lowercase().as_str() {
        "ltr" | "lefttoright" => Ok(Direction::LeftToRight),
        "rtl" | "righttoleft" => Ok(Direction::RightToLeft),
        "auto" | "unspecified" => Ok(Direction::Unspecified),
        other => Err(format!("unknown direction '{other}', expected ltr, rtl or auto")),
    }
}

fn parse_case(value: &str) -> Result<CaseMode, String> {
    match value.to_ascii_lowercase().as_str() {
        "unchanged" | "none" => Ok(CaseMode::Unchanged),
        "upper" => Ok(CaseMode::Upper),
        "lower" => Ok(CaseMode::Lower),
        other => Err(format!("unknown case mode '{other}', expected unchanged, upper or lower")),
    }
}

/// Parse a feature, script or language tag of one to four characters
pub fn parse_tag(value: &str) -> Result<Tag, String> {
    if value.is_empty() || value.len() > 4 || !value.is_ascii() {
        return Err(format!("'{value}' is not a valid OpenType tag"));
    }
    Tag::new_checked(value.as_bytes()).map_err(|e| format!("'{value}' is not a valid OpenType tag: {e}"))
}

impl CliArgs {
    /// Validate the CLI arguments after parsing
    ///
    /// This ensures that all paths exist and all tags are well formed,
    /// providing clear error messages for common mistakes.
    pub fn validate(&self) -> Result<(), String> {
        if self.new_config {
            return Ok(());
        }

        let Some(path) = &self.font_source else {
            return Err("No font source given.\nUse --font to point at a UFO directory.".to_string());
        };
        if !path.is_dir() {
            return Err(format!(
                "Font source is not a directory: {}\nMake sure the path points at a UFO.",
                path.display()
            ));
        }
        if !path.join("metainfo.plist").exists() {
            return Err(format!(
                "Not a valid UFO directory: missing metainfo.plist in {}\nMake sure this is a valid UFO directory.",
                path.display()
            ));
        }

        for (flag, file) in [("--features", &self.features), ("--binary", &self.binary)] {
            if let Some(file) = file {
                if !file.is_file() {
                    return Err(format!("{flag} file does not exist: {}", file.display()));
                }
            }
        }

        for tag in self.enable.iter().chain(&self.disable) {
            parse_tag(tag)?;
        }
        for tag in self.script.iter().chain(&self.language) {
            if !tag.is_empty() {
                parse_tag(tag)?;
            }
        }

        Ok(())
    }

    /// The shaping request described by the arguments
    ///
    /// Priority order:
    /// 1. CLI argument
    /// 2. Config file setting (~/.config/feature-preview/settings.json)
    /// 3. Built-in default
    pub fn shape_request(&self, config: &ConfigFile) -> ShapeRequest {
        let request = match (&self.glyphs, &self.text) {
            (Some(glyphs), _) => ShapeRequest::glyphs(glyphs),
            (None, Some(text)) => ShapeRequest::text(text.as_str()),
            (None, None) => ShapeRequest::text(""),
        };

        let script = self.script.clone().or_else(|| config.default_script.clone());
        let language = self.language.clone().or_else(|| config.default_language.clone());
        let direction = self.direction.or(config.default_direction).unwrap_or_default();
        let case = self.case.or(config.default_case).unwrap_or_default();
        debug!("Shaping with script {script:?}, language {language:?}, direction {direction:?}, case {case:?}");

        request
            .with_script(script.unwrap_or_default())
            .with_language(language.unwrap_or_default())
            .with_direction(direction)
            .with_case(case)
    }

    /// Feature flags to apply, in order: config defaults, --enable, --disable
    pub fn feature_toggles(&self, config: &ConfigFile) -> Vec<(Tag, bool)> {
        let enable = config
            .enabled_features
            .iter()
            .chain(&self.enable)
            .map(|tag| (tag, true));
        let disable = self.disable.iter().map(|tag| (tag, false));

        enable
            .chain(disable)
            .filter_map(|(tag, enabled)| parse_tag(tag).ok().map(|tag| (tag, enabled)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaping::ShapeInput;

    #[test]
    fn test_parse_arguments() {
        let args = CliArgs::parse_from([
            "feature-preview",
            "--font",
            "My.ufo",
            "--glyphs",
            "/a/b",
            "--direction",
            "rtl",
            "--enable",
            "liga,kern",
            "-vv",
        ]);

        assert_eq!(args.direction, Some(Direction::RightToLeft));
        assert_eq!(args.enable, vec!["liga", "kern"]);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_text_and_glyphs_conflict() {
        let result = CliArgs::try_parse_from(["feature-preview", "--text", "ab", "--glyphs", "/a"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = ConfigFile {
            default_script: Some("arab".to_string()),
            default_case: Some(CaseMode::Upper),
            ..Default::default()
        };
        let args = CliArgs {
            text: Some("ab".to_string()),
            script: Some("latn".to_string()),
            ..Default::default()
        };

        let request = args.shape_request(&config);
        assert_eq!(request.input, ShapeInput::Text("ab".to_string()));
        assert_eq!(request.script, "latn");
        // Not given on the command line, so the config value applies
        assert_eq!(request.case, CaseMode::Upper);
        assert_eq!(request.direction, Direction::Unspecified);
    }

    #[test]
    fn test_feature_toggles_order() {
        let config = ConfigFile {
            enabled_features: vec!["liga".to_string(), "kern".to_string()],
            ..Default::default()
        };
        let args = CliArgs {
            enable: vec!["ss01".to_string()],
            disable: vec!["kern".to_string()],
            ..Default::default()
        };

        let toggles = args.feature_toggles(&config);
        assert_eq!(toggles.last(), Some(&(Tag::new(b"kern"), false)));
        assert_eq!(toggles.len(), 4);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let missing = CliArgs {
            font_source: Some(PathBuf::from("/definitely/not/here.ufo")),
            ..Default::default()
        };
        assert!(missing.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("metainfo.plist"), "").unwrap();
        let mut args = CliArgs {
            font_source: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(args.validate().is_ok());

        args.enable = vec!["toolong".to_string()];
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_parse_tag_pads_short_tags() {
        assert_eq!(parse_tag("NLD").unwrap(), Tag::new(b"NLD "));
        assert!(parse_tag("").is_err());
    }
}
