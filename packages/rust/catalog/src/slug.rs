//! Title → URL slug derivation.
//!
//! Best effort: the pricing site's own slugs are not published, so a handful of
//! titles still need entries in the override table.

use std::sync::LazyLock;

use regex::Regex;

/// Characters removed outright from the hyphenated title.
static STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:\[\].#?/,]").expect("valid regex"));

static HYPHEN_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("valid regex"));

/// Derive the URL slug for a catalog title.
///
/// lowercase → spaces to hyphens → strip `: [ ] . # ? / ,` → drop `amp;` →
/// collapse hyphen runs.
pub fn derive_slug(title: &str) -> String {
    let lowered = title.to_lowercase().replace(' ', "-");
    let stripped = STRIP_RE.replace_all(&lowered, "");
    let mut unescaped = stripped.into_owned();
    // Nested escapes ("&amamp;p;") re-form the entity after one pass.
    while unescaped.contains("amp;") {
        unescaped = unescaped.replace("amp;", "");
    }
    collapse_hyphens(&unescaped)
}

/// Replace every run of two or more hyphens with a single hyphen.
pub fn collapse_hyphens(s: &str) -> String {
    HYPHEN_RUN_RE.replace_all(s, "-").into_owned()
}

/// Compose `<base><console>/<slug>`. `base_url` must end with `/`.
pub fn item_url(base_url: &str, console: &str, slug: &str) -> String {
    format!("{base_url}{console}/{slug}")
}
