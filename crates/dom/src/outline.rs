//! Compact structural digest of a page, one line per structural element.

use std::fmt;

use serde::Serialize;

use crate::DocumentNode;
use crate::text::truncate_chars;

#[derive(Debug, Clone)]
pub struct OutlineOptions<'a> {
    /// Tags (or roles) that produce an entry.
    pub tags: &'a [String],
    /// Subtrees never looked into.
    pub excluded: &'a [String],
    /// Characters of element text kept per entry.
    pub text_chars: usize,
    /// Entries rendered before the rest is summarised as a count.
    pub max_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: String,
}

impl fmt::Display for OutlineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)?;
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        if !self.classes.is_empty() {
            write!(f, ".{}", self.classes.join("."))?;
        }
        if !self.text.is_empty() {
            write!(f, " → {}", self.text)?;
        }
        Ok(())
    }
}

/// Entries for every allow-listed element in document order, skipping
/// anything inside an excluded subtree.
pub fn outline_entries(root: &DocumentNode, options: &OutlineOptions<'_>) -> Vec<OutlineEntry> {
    root.nodes_filtered(|node| !node.is_excluded(options.excluded))
        .filter(|node| {
            node.is_element()
                && !node.is_excluded(options.excluded)
                && options.tags.iter().any(|tag| node.has_role(tag))
        })
        .map(|node| OutlineEntry {
            tag: node.role().to_string(),
            id: node.attrs().id.clone(),
            classes: node.attrs().classes.clone(),
            text: truncate_chars(&node.descendant_text(), options.text_chars).to_string(),
        })
        .collect()
}

/// Newline-joined outline.  Past `max_entries` a single `… (N more)` line
/// stands in for the remainder.
pub fn build_outline(root: &DocumentNode, options: &OutlineOptions<'_>) -> String {
    let entries = outline_entries(root, options);
    let total = entries.len();
    let mut lines: Vec<String> = entries
        .iter()
        .take(options.max_entries)
        .map(ToString::to_string)
        .collect();
    if total > options.max_entries {
        lines.push(format!("… ({} more)", total - options.max_entries));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_markup;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn outline(html: &str, max_entries: usize) -> String {
        let tags = strings(&["h1", "h2", "h3", "div", "section", "table", "p", "span"]);
        let excluded = strings(&["script", "style", "nav", "header", "footer", "aside"]);
        build_outline(
            &parse_markup(html),
            &OutlineOptions {
                tags: &tags,
                excluded: &excluded,
                text_chars: 12,
                max_entries,
            },
        )
    }

    #[test]
    fn nav_contents_never_reach_the_outline() {
        let out = outline(
            r#"<body><nav><h2>Menu</h2><div id="links">Home</div></nav><h2>Schedule</h2></body>"#,
            100,
        );
        assert_eq!(out, "h2 → Schedule");
    }

    #[test]
    fn descriptor_format_with_id_classes_and_truncation() {
        let out = outline(
            r#"<body><div id="main" class="card wide">A fairly long piece of text</div><section></section></body>"#,
            100,
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "div#main.card.wide → A fairly lon");
        assert_eq!(lines[1], "section");
    }

    #[test]
    fn document_order_is_kept() {
        let out = outline("<body><h1>a</h1><table><tr><td>b</td></tr></table><p>c</p></body>", 100);
        assert_eq!(out, "h1 → a\ntable → b\np → c");
    }

    #[test]
    fn entry_cap_summarises_the_rest() {
        let out = outline("<body><p>1</p><p>2</p><p>3</p><p>4</p></body>", 2);
        assert_eq!(out, "p → 1\np → 2\n… (2 more)");
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let out = outline("<body><h1>ééééééééééééééé</h1></body>", 100);
        assert_eq!(out, "h1 → éééééééééééé");
    }

    #[test]
    fn accessibility_roles_are_outlined() {
        let tags = strings(&["heading"]);
        let excluded = strings(&["navigation"]);
        let doc = DocumentNode::element("WebArea")
            .with_child(
                DocumentNode::element("navigation")
                    .with_child(DocumentNode::element("heading").with_text("Menu")),
            )
            .with_child(DocumentNode::element("heading").with_text("Schedule"));
        let out = build_outline(
            &doc,
            &OutlineOptions {
                tags: &tags,
                excluded: &excluded,
                text_chars: 50,
                max_entries: 10,
            },
        );
        assert_eq!(out, "heading → Schedule");
    }
}
