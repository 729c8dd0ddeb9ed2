//! Text budgeting and the cleaned plain-text digest used by single-pass
//! extraction.

use std::collections::HashSet;
use std::hash::Hash;

use crate::DocumentNode;

/// Elements whose text makes up the plain-text digest.
const TEXT_BEARING: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "td", "th", "heading", "paragraph",
    "listitem", "cell", "columnheader", "rowheader",
];

/// Largest byte index `<= max` that falls on a char boundary of `s`.
pub fn truncate_byte_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// The first `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Truncate to at most `max_chars` characters, appending `…` when cut.
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> String {
    let kept = truncate_chars(text, max_chars);
    if kept.len() == text.len() {
        text.to_string()
    } else {
        format!("{kept}…")
    }
}

/// Drop repeats while keeping the first occurrence of each item in place.
pub fn dedup_preserving_order<T, I>(items: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            kept.push(item);
        }
    }
    kept
}

/// Headings, paragraphs, list items and table cells of the tree, one per
/// line, in document order with duplicates removed.  Excluded subtrees are
/// skipped.
pub fn plain_text(root: &DocumentNode, excluded: &[String]) -> String {
    let fragments = root
        .nodes_filtered(|node| !node.is_excluded(excluded))
        .filter(|node| {
            node.is_element() && TEXT_BEARING.iter().any(|role| node.has_role(role))
        })
        .map(|node| node.descendant_text())
        .filter(|text| !text.is_empty());
    dedup_preserving_order(fragments).join("\n")
}
