//! Output-safe text normalization.
//!
//! `sanitize` strips tag-like markup, then escapes `< > " ' &` to named
//! entities. An `&` that already starts one of those five entities is left
//! alone, which makes the function idempotent.

use regex::Regex;
use std::sync::LazyLock;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z!][^<>]*>").expect("tag regex is valid"));

const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];

/// Strip markup and escape HTML-significant characters.
pub fn sanitize(text: &str) -> String {
    let stripped = TAG.replace_all(text, "");
    let mut out = String::with_capacity(stripped.len());

    for (i, c) in stripped.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '&' => {
                let rest = &stripped[i..];
                if ENTITIES.iter().any(|e| rest.starts_with(e)) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            _ => out.push(c),
        }
    }
    out
}
