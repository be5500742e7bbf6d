//! Include path resolution
//!
//! Feature source read from a UFO refers to other files relative to the UFO
//! package. The compiler sees the source from memory, so every `include()`
//! is rewritten to an absolute path first.

use crate::error::BuildError;
use std::path::{Path, PathBuf};

/// Rewrite each `include(path)` to an absolute, canonical path under `base_dir`
///
/// Includes inside comments and strings are left alone. Source without any
/// include comes back unchanged.
pub fn resolve_includes(text: &str, base_dir: &Path) -> Result<String, BuildError> {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;

    for (start, open, close) in find_includes(text) {
        let raw = text[open + 1..close].trim();
        let resolved = resolve_path(raw, base_dir)?;
        out.push_str(&text[copied..start]);
        out.push_str(&format!("include({})", resolved.display()));
        copied = close + 1;
    }

    if copied == 0 {
        return Ok(text.to_string());
    }
    out.push_str(&text[copied..]);
    Ok(out)
}

/// Canonical paths of the files `text` includes directly, in source order
pub fn included_paths(text: &str, base_dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    find_includes(text)
        .into_iter()
        .map(|(_, open, close)| resolve_path(text[open + 1..close].trim(), base_dir))
        .collect()
}

fn resolve_path(raw: &str, base_dir: &Path) -> Result<PathBuf, BuildError> {
    let path = Path::new(raw);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    joined
        .canonicalize()
        .map_err(|source| BuildError::Include {
            path: joined.clone(),
            source,
        })
}

/// Byte offsets `(keyword start, '(' , ')')` of every live include statement
fn find_includes(text: &str) -> Vec<(usize, usize, usize)> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += 1;
                }
                i += 1;
            }
            _ if bytes[i..].starts_with(b"include") && is_boundary(bytes, i) => {
                let after = i + "include".len();
                let rest = &text[after..];
                let gap = rest.len() - rest.trim_start().len();
                let open = after + gap;
                if bytes.get(open) == Some(&b'(') {
                    if let Some(close) = text[open..].find(')').map(|c| open + c) {
                        found.push((i, open, close));
                        i = close + 1;
                        continue;
                    }
                }
                i = after;
            }
            _ => i += 1,
        }
    }

    found
}

fn is_boundary(bytes: &[u8], at: usize) -> bool {
    at == 0 || !matches!(bytes[at - 1], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'.' | b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_no_includes_is_unchanged() {
        let text = "feature liga { sub f i by f_i; } liga;\n";
        let resolved = resolve_includes(text, Path::new("/nonexistent")).unwrap();
        assert_eq!(resolved, text);
    }

    #[test]
    fn test_relative_include_becomes_absolute() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kern.fea"), "feature kern { pos A V -50; } kern;").unwrap();

        let text = "languagesystem DFLT dflt;\ninclude (kern.fea);\n";
        let resolved = resolve_includes(text, dir.path()).unwrap();

        let expected = dir.path().join("kern.fea").canonicalize().unwrap();
        assert_eq!(
            resolved,
            format!("languagesystem DFLT dflt;\ninclude({});\n", expected.display())
        );
    }

    #[test]
    fn test_commented_include_is_ignored() {
        let text = "# include(missing.fea)\nfeature ss01 { featureNames { name \"include(x)\"; }; } ss01;";
        let resolved = resolve_includes(text, Path::new("/nonexistent")).unwrap();
        assert_eq!(resolved, text);
    }

    #[test]
    fn test_missing_include_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_includes("include(missing.fea);", dir.path());

        match result {
            Err(BuildError::Include { path, .. }) => {
                assert!(path.ends_with("missing.fea"));
            }
            other => panic!("expected include error, got {other:?}"),
        }
    }

    #[test]
    fn test_included_paths_skip_comments() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.fea"), "").unwrap();
        fs::write(dir.path().join("b.fea"), "").unwrap();

        let text = "include(b.fea);
# include(missing.fea)
include( a.fea );
";
        let paths = included_paths(text, dir.path()).unwrap();

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(paths, vec![root.join("b.fea"), root.join("a.fea")]);
    }
}
