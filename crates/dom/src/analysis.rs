//! Where a page's text lives, by tag.

use std::collections::HashMap;

use serde::Serialize;

use crate::DocumentNode;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagShare {
    pub tag: String,
    pub chars: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDistribution {
    /// Sum over all elements; nested text is counted once per ancestor.
    pub total_chars: usize,
    /// Largest share first; ties broken by tag name.
    pub shares: Vec<TagShare>,
}

/// Text length attributed to every element, grouped by tag.  Whitespace is
/// not counted.
pub fn tag_distribution(root: &DocumentNode) -> PageDistribution {
    let mut per_tag: HashMap<String, usize> = HashMap::new();
    for node in root.nodes() {
        if !node.is_element() {
            continue;
        }
        let chars = node
            .descendant_text()
            .chars()
            .filter(|c| !c.is_whitespace())
            .count();
        *per_tag.entry(node.role().to_ascii_lowercase()).or_default() += chars;
    }

    let total_chars: usize = per_tag.values().sum();
    let mut shares: Vec<TagShare> = per_tag
        .into_iter()
        .filter(|(_, chars)| *chars > 0)
        .map(|(tag, chars)| TagShare {
            percent: chars as f64 * 100.0 / total_chars as f64,
            tag,
            chars,
        })
        .collect();
    shares.sort_by(|a, b| b.chars.cmp(&a.chars).then_with(|| a.tag.cmp(&b.tag)));
    PageDistribution { total_chars, shares }
}
