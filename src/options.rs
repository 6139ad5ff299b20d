//! Option extraction for the options step.
//!
//! The assistant presents choices as a lettered list (`A) ...`, `B) ...`).
//! Each option runs from its marker to the next marker or the end of the
//! text, so an option may span several lines.

use once_cell::sync::Lazy;
use regex::Regex;

/// Letter marker at the start of a line: `A)`, `B)`, ...
static OPTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[A-Z]\)[ \t]*").expect("Invalid option marker regex"));

/// Extract the ordered option texts from an assistant message.
///
/// Text before the first marker is ignored. Options are trimmed and empty
/// ones dropped. Returns an empty vector when there are no markers.
pub fn extract_options(text: &str) -> Vec<String> {
    let markers: Vec<_> = OPTION_MARKER.find_iter(text).collect();

    markers
        .iter()
        .enumerate()
        .filter_map(|(i, marker)| {
            let end = markers.get(i + 1).map(|next| next.start()).unwrap_or(text.len());
            let option = text[marker.end()..end].trim();
            (!option.is_empty()).then(|| option.to_string())
        })
        .collect()
}
