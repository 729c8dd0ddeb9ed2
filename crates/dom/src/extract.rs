//! Deterministic location of oracle-chosen regions.
//!
//! Strict matching ([`extract_text`]) applies every criterion an
//! [`Identifier`] carries.  Loose matching ([`extract_loose`]) treats plain
//! hints as case-insensitive substrings of ids, classes and text; it matches
//! far more than intended on most pages and is kept for free-text replies
//! only.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::text::dedup_preserving_order;
use crate::{DocumentError, DocumentNode, NodeKind};

/// Locator for one region of a document.  `tag` is mandatory; every other
/// field narrows the match when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "class", skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl Identifier {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            text: None,
            href: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Read one identifier object from an oracle reply.
    ///
    /// `null`, blank and non-string fields count as absent.  `class` may be
    /// a whitespace-separated string or an array of strings.  A missing or
    /// blank `tag` is an error.
    pub fn from_value(value: &Value) -> Result<Self, DocumentError> {
        let object = value
            .as_object()
            .ok_or_else(|| DocumentError::MalformedIdentifier(value.to_string()))?;
        let field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let tag = field("tag").ok_or(DocumentError::MissingTag)?;
        let classes = match object.get("class") {
            Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .flat_map(str::split_whitespace)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        Ok(Self {
            tag,
            id: field("id"),
            classes,
            text: field("text"),
            href: field("href"),
        })
    }

    /// Every valid identifier in `values`, in order.  Invalid entries are
    /// logged and skipped so they never reach matching.
    pub fn from_values(values: &[Value]) -> Vec<Self> {
        values
            .iter()
            .filter_map(|value| match Self::from_value(value) {
                Ok(identifier) => Some(identifier),
                Err(err) => {
                    warn!(error = %err, "dropping identifier");
                    None
                }
            })
            .collect()
    }

    /// Whether `node` satisfies every criterion this identifier carries.
    pub fn matches(&self, node: &DocumentNode) -> bool {
        if !node.is_element() || !node.has_role(&self.tag) {
            return false;
        }
        let attrs = node.attrs();
        if let Some(id) = &self.id {
            if attrs.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() && !self.classes.iter().any(|c| attrs.classes.contains(c)) {
            return false;
        }
        if let Some(href) = &self.href {
            if attrs.href.as_deref() != Some(href.as_str()) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if !node.descendant_text().contains(text.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Separators used when flattening blocks into candidate text.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions<'a> {
    /// Between the deduplicated matches of one identifier.
    pub item_separator: &'a str,
    /// Between the blocks of different identifiers.
    pub block_separator: &'a str,
}

impl Default for ExtractOptions<'static> {
    fn default() -> Self {
        Self {
            item_separator: "\n",
            block_separator: "\n---\n",
        }
    }
}

/// The distinct, non-empty texts matched by one identifier, in first-seen
/// document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedBlock {
    pub identifier: Identifier,
    pub texts: Vec<String>,
}

impl ExtractedBlock {
    pub fn from_matches(identifier: Identifier, matched: impl IntoIterator<Item = String>) -> Self {
        let texts = dedup_preserving_order(matched.into_iter().filter(|t| !t.is_empty()));
        Self { identifier, texts }
    }

    pub fn joined(&self, separator: &str) -> String {
        self.texts.join(separator)
    }
}

/// One block per identifier that matched something, in identifier order.
pub fn extract_blocks(root: &DocumentNode, identifiers: &[Identifier]) -> Vec<ExtractedBlock> {
    identifiers
        .iter()
        .map(|identifier| {
            let matched = root
                .nodes()
                .filter(|node| identifier.matches(node))
                .map(DocumentNode::descendant_text);
            ExtractedBlock::from_matches(identifier.clone(), matched)
        })
        .filter(|block| !block.texts.is_empty())
        .collect()
}

pub fn join_blocks(blocks: &[ExtractedBlock], options: ExtractOptions<'_>) -> String {
    blocks
        .iter()
        .map(|block| block.joined(options.item_separator))
        .collect::<Vec<_>>()
        .join(options.block_separator)
}

/// Candidate text for `identifiers`; empty when nothing matched.
pub fn extract_text(
    root: &DocumentNode,
    identifiers: &[Identifier],
    options: ExtractOptions<'_>,
) -> String {
    join_blocks(&extract_blocks(root, identifiers), options)
}

/// Loose matching of plain-string hints.  An element matches a hint when
/// its tag equals the hint, its id or one of its classes contains it, or
/// its own text (or a direct text child) contains it; all comparisons
/// ignore case.  Every match of every hint is deduplicated into one list
/// joined by `block_separator`.
pub fn extract_loose(root: &DocumentNode, hints: &[String], options: ExtractOptions<'_>) -> String {
    let hints: Vec<String> = hints
        .iter()
        .map(|hint| hint.trim().to_lowercase())
        .filter(|hint| !hint.is_empty())
        .collect();
    let matched = hints.iter().flat_map(|hint| {
        root.nodes()
            .filter(move |node| loosely_matches(node, hint))
            .map(DocumentNode::descendant_text)
    });
    dedup_preserving_order(matched.filter(|t| !t.is_empty())).join(options.block_separator)
}

fn loosely_matches(node: &DocumentNode, hint: &str) -> bool {
    if !node.is_element() {
        return false;
    }
    let contains = |s: &str| s.to_lowercase().contains(hint);
    let attrs = node.attrs();
    node.has_role(hint)
        || attrs.id.as_deref().is_some_and(contains)
        || attrs.classes.iter().any(|c| contains(c.as_str()))
        || contains(node.text())
        || node
            .children()
            .iter()
            .any(|child| child.kind() == NodeKind::Text && contains(child.text()))
}

/// Split a free-text selector reply into hints on commas and newlines.
pub fn split_hints(reply: &str) -> Vec<String> {
    reply
        .split([',', '\n'])
        .map(|hint| hint.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`'))
        .filter(|hint| !hint.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_markup;
    use serde_json::json;

    fn page() -> DocumentNode {
        parse_markup(
            r#"<body>
                <div id="games" class="card schedule">
                    <h2>Schedule</h2>
                    <p class="game">Knicks vs Celtics</p>
                    <p class="game">Knicks vs Nets</p>
                </div>
                <div class="card"><a href="/tickets">Tickets</a></div>
                <p class="game">Knicks vs Celtics</p>
            </body>"#,
        )
    }

    #[test]
    fn tag_is_mandatory() {
        assert!(matches!(
            Identifier::from_value(&json!({"id": "x"})),
            Err(DocumentError::MissingTag)
        ));
        assert!(matches!(
            Identifier::from_value(&json!({"tag": "  "})),
            Err(DocumentError::MissingTag)
        ));
        assert!(Identifier::from_value(&json!("div")).is_err());
    }

    #[test]
    fn nulls_and_class_shapes() {
        let id = Identifier::from_value(
            &json!({"tag":"heading","id":null,"class":null,"text":null,"href":null}),
        )
        .unwrap();
        assert_eq!(id, Identifier::new("heading"));

        let id = Identifier::from_value(&json!({"tag": "div", "class": "card  wide"})).unwrap();
        assert_eq!(id.classes, vec!["card", "wide"]);
        let id = Identifier::from_value(&json!({"tag": "div", "class": ["card", 3]})).unwrap();
        assert_eq!(id.classes, vec!["card"]);
    }

    #[test]
    fn from_values_skips_invalid_entries() {
        let ids = Identifier::from_values(&[json!({"tag": "p"}), json!({}), json!({"tag": "h2"})]);
        let tags: Vec<&str> = ids.iter().map(|i| i.tag.as_str()).collect();
        assert_eq!(tags, vec!["p", "h2"]);
    }

    #[test]
    fn every_present_criterion_must_hold() {
        let doc = page();
        let by_id = Identifier::new("DIV").with_id("games");
        let blocks = extract_blocks(&doc, &[by_id]);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].texts[0].starts_with("Schedule Knicks vs Celtics"));

        let wrong_tag = Identifier::new("section").with_id("games");
        assert!(extract_blocks(&doc, &[wrong_tag]).is_empty());

        let href = Identifier::new("a").with_href("/tickets");
        assert_eq!(extract_text(&doc, &[href], ExtractOptions::default()), "Tickets");
        let partial_href = Identifier::new("a").with_href("/tick");
        assert!(extract_blocks(&doc, &[partial_href]).is_empty());

        let class_and_text = Identifier::new("p").with_class("game").with_text("Nets");
        assert_eq!(
            extract_text(&doc, &[class_and_text], ExtractOptions::default()),
            "Knicks vs Nets"
        );
    }

    #[test]
    fn class_criterion_is_an_intersection() {
        let doc = page();
        let any_of = Identifier::new("div").with_class("missing").with_class("card");
        assert_eq!(extract_blocks(&doc, &[any_of])[0].texts.len(), 2);
    }

    #[test]
    fn duplicates_collapse_in_first_seen_order() {
        let block = ExtractedBlock::from_matches(
            Identifier::new("p"),
            ["A", "B", "A", "C"].map(String::from),
        );
        assert_eq!(block.joined("|"), "A|B|C");

        let doc = page();
        let games = Identifier::new("p").with_class("game");
        assert_eq!(
            extract_text(&doc, &[games], ExtractOptions::default()),
            "Knicks vs Celtics\nKnicks vs Nets"
        );
    }

    #[test]
    fn blocks_follow_identifier_order_and_skip_misses() {
        let doc = page();
        let ids = [
            Identifier::new("a"),
            Identifier::new("table"),
            Identifier::new("h2"),
        ];
        let options = ExtractOptions {
            item_separator: ";",
            block_separator: " | ",
        };
        assert_eq!(extract_text(&doc, &ids, options), "Tickets | Schedule");
    }

    #[test]
    fn matches_accessibility_roles() {
        let doc = DocumentNode::element("heading").with_text("Schedule");
        let text = extract_text(&doc, &[Identifier::new("heading")], ExtractOptions::default());
        assert_eq!(text, "Schedule");
    }

    #[test]
    fn loose_hints_overmatch() {
        let doc = page();
        let text = extract_loose(&doc, &["SCHED".to_string()], ExtractOptions::default());
        // The id/class hit on the container and the heading's own text.
        assert_eq!(
            text,
            "Schedule Knicks vs Celtics Knicks vs Nets\n---\nSchedule"
        );
        assert_eq!(extract_loose(&doc, &[" ".to_string()], ExtractOptions::default()), "");
    }

    #[test]
    fn hint_splitting() {
        assert_eq!(
            split_hints("schedule, \"games\"\n`scores`,,"),
            vec!["schedule", "games", "scores"]
        );
    }
}
