//! Suggested save name for a delivered file.
//!
//! Derived from the product title and the stored object's extension, and
//! recomputed on every delivery attempt.

use regex::Regex;
use std::sync::OnceLock;

/// Extension used when the stored object has none.
pub const DEFAULT_EXTENSION: &str = "zip";

/// Stem used when nothing of the title survives sanitizing.
const FALLBACK_STEM: &str = "download";

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9\s\-_]").unwrap())
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Last path segment of a storage path or URL.
pub fn basename(file_ref: &str) -> &str {
    file_ref.rsplit('/').next().unwrap_or(file_ref)
}

/// Extension of the basename (text after the last `.`), if any.
pub fn extension(file_ref: &str) -> Option<&str> {
    let name = basename(file_ref);
    name.rfind('.')
        .map(|idx| &name[idx + 1..])
        .filter(|ext| !ext.is_empty())
}

/// Title with everything outside `[A-Za-z0-9 whitespace - _]` removed,
/// trimmed, and whitespace runs collapsed to a single `_`.
pub fn sanitize_title(title: &str) -> String {
    let stripped = disallowed_chars().replace_all(title, "");
    whitespace_runs()
        .replace_all(stripped.trim(), "_")
        .into_owned()
}

/// `sanitize_title(title)` + `.` + extension of `file_ref` (default `zip`).
pub fn derive_filename(title: &str, file_ref: &str) -> String {
    let mut stem = sanitize_title(title);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    let ext = extension(file_ref).unwrap_or(DEFAULT_EXTENSION);
    format!("{stem}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_is_stripped_and_spaces_become_underscores() {
        assert_eq!(derive_filename("My Cool App!", "abc123.zip"), "My_Cool_App.zip");
    }

    #[test]
    fn missing_extension_defaults_to_zip() {
        assert_eq!(
            derive_filename("  multi   space  name", "x"),
            "multi_space_name.zip"
        );
    }

    #[test]
    fn extension_comes_from_the_basename_only() {
        assert_eq!(
            derive_filename("Sample Pack", "uploads/v1.2/pack"),
            "Sample_Pack.zip"
        );
        assert_eq!(
            derive_filename("Sample Pack", "https://cdn.example.com/files/1699-pack.tar.gz"),
            "Sample_Pack.gz"
        );
    }

    #[test]
    fn hyphens_and_underscores_survive() {
        assert_eq!(derive_filename("lo-fi_beats vol 2", "a.wav"), "lo-fi_beats_vol_2.wav");
    }

    #[test]
    fn empty_title_falls_back_to_generic_stem() {
        assert_eq!(derive_filename("!!!", "a.pdf"), "download.pdf");
    }

    #[test]
    fn trailing_dot_counts_as_no_extension() {
        assert_eq!(extension("file."), None);
        assert_eq!(derive_filename("Doc", "file."), "Doc.zip");
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_filename("Über Synth (2024)", "obj/1.dmg");
        let b = derive_filename("Über Synth (2024)", "obj/1.dmg");
        assert_eq!(a, b);
        assert_eq!(a, "ber_Synth_2024.dmg");
    }
}
