//! Accessibility snapshot (`{role, name, value, children}`) → [`DocumentNode`].
//!
//! The snapshot shape is the one headless browsers emit for
//! `page.accessibility.snapshot()`.  This is the single place where its
//! loosely-typed fields are validated and given defaults:
//!
//! - missing or blank `role` → `"unknown"`;
//! - missing `name` → empty text;
//! - `role`, `name` and `value` may be strings, numbers or booleans and are
//!   stringified; anything else counts as missing;
//! - optional `id`, `class` and `href` (or `url`, when `href` is absent)
//!   carry over as attributes.
//!
//! Only the node shape is strict: every node must be an object and
//! `children`, when present, an array.

use serde_json::{Map, Value};

use crate::{DocumentError, DocumentNode};

/// Convert a parsed snapshot.  `null` (what browsers return for an empty
/// page) and non-object roots are rejected.
pub fn parse_accessibility(snapshot: &Value) -> Result<DocumentNode, DocumentError> {
    if !snapshot.is_object() {
        return Err(DocumentError::Snapshot(format!(
            "expected an object at the root, found {}",
            json_kind(snapshot)
        )));
    }

    let mut stack = vec![Frame::open(snapshot)?];
    loop {
        let top = stack.len() - 1;
        if let Some(child) = stack[top].pending.next() {
            let frame = Frame::open(child)?;
            stack.push(frame);
            continue;
        }
        let Frame { node, children, .. } = stack.remove(top);
        let node = node.with_children(children);
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => return Ok(node),
        }
    }
}

/// Parse snapshot JSON text.
pub fn parse_accessibility_str(raw: &str) -> Result<DocumentNode, DocumentError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| DocumentError::Snapshot(err.to_string()))?;
    parse_accessibility(&value)
}

struct Frame<'a> {
    node: DocumentNode,
    pending: std::slice::Iter<'a, Value>,
    children: Vec<DocumentNode>,
}

impl<'a> Frame<'a> {
    fn open(value: &'a Value) -> Result<Self, DocumentError> {
        let Value::Object(fields) = value else {
            return Err(DocumentError::Snapshot(format!(
                "expected an object node, found {}",
                json_kind(value)
            )));
        };
        let pending = match fields.get("children") {
            None | Some(Value::Null) => std::slice::Iter::default(),
            Some(Value::Array(children)) => children.iter(),
            Some(other) => {
                return Err(DocumentError::Snapshot(format!(
                    "expected `children` to be an array, found {}",
                    json_kind(other)
                )));
            }
        };
        Ok(Self {
            node: shell(fields),
            pending,
            children: Vec::new(),
        })
    }
}

fn shell(fields: &Map<String, Value>) -> DocumentNode {
    let field = |key: &str| fields.get(key).and_then(stringify_value);

    let mut converted = DocumentNode::element(field("role").unwrap_or_default())
        .with_text(field("name").unwrap_or_default());
    if let Some(value) = field("value") {
        converted = converted.with_value(value);
    }
    if let Some(id) = field("id") {
        converted = converted.with_id(id);
    }
    if let Some(class) = field("class") {
        for class in class.split_whitespace() {
            converted = converted.with_class(class);
        }
    }
    let href = field("href")
        .filter(|href| !href.trim().is_empty())
        .or_else(|| field("url"));
    if let Some(href) = href {
        converted = converted.with_href(href);
    }
    converted
}

fn stringify_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_roles_names_values_and_children() {
        let doc = parse_accessibility(&json!({
            "role": "WebArea",
            "name": "ESPN",
            "children": [
                {"role": "heading", "name": "Schedule", "level": 2},
                {"role": "spinbutton", "name": "Year", "value": 2024},
                {"role": "link", "name": "Knicks", "url": "https://x/knicks"}
            ]
        }))
        .unwrap();

        assert_eq!(doc.role(), "WebArea");
        assert_eq!(doc.text(), "ESPN");
        let kids = doc.children();
        assert_eq!(kids[0].role(), "heading");
        assert_eq!(kids[0].text(), "Schedule");
        assert_eq!(kids[1].attrs().value.as_deref(), Some("2024"));
        assert_eq!(kids[2].attrs().href.as_deref(), Some("https://x/knicks"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let doc = parse_accessibility(&json!({"children": [{"name": "orphan", "value": ""}]}))
            .unwrap();
        assert_eq!(doc.role(), "unknown");
        assert_eq!(doc.text(), "");
        assert_eq!(doc.children()[0].role(), "unknown");
        assert_eq!(doc.children()[0].attrs().value, None);
    }

    #[test]
    fn loosely_typed_fields_do_not_reject_the_tree() {
        let doc = parse_accessibility(&json!({
            "role": "WebArea",
            "children": [
                {"role": "cell", "name": 42},
                {"role": "link", "name": "Docs", "href": "/docs", "url": "https://x/docs"},
                {"role": "link", "name": "Home", "url": "https://x/"},
                {"role": "img", "name": {"nested": true}}
            ]
        }))
        .unwrap();

        let kids = doc.children();
        assert_eq!(kids[0].text(), "42");
        assert_eq!(kids[1].attrs().href.as_deref(), Some("/docs"));
        assert_eq!(kids[2].attrs().href.as_deref(), Some("https://x/"));
        assert_eq!(kids[3].text(), "");
    }

    #[test]
    fn deep_snapshots_convert() {
        const DEPTH: usize = 10_000;
        let mut snapshot = json!({"role": "paragraph", "name": "bottom"});
        for _ in 0..DEPTH {
            snapshot = json!({"role": "group", "children": [snapshot]});
        }
        let doc = parse_accessibility(&snapshot).unwrap();
        assert_eq!(doc.node_count(), DEPTH + 1);
        assert_eq!(doc.descendant_text(), "bottom");
        // serde_json's own drop recurses; hand the value off one level at a
        // time.
        let mut rest = snapshot;
        while let Some(Value::Array(mut children)) = rest.get_mut("children").map(Value::take) {
            rest = children.pop().unwrap_or(Value::Null);
        }
    }

    #[test]
    fn rejects_null_and_malformed_children() {
        assert!(matches!(
            parse_accessibility(&Value::Null),
            Err(DocumentError::Snapshot(_))
        ));
        assert!(parse_accessibility(&json!({"role": "x", "children": "nope"})).is_err());
        assert!(parse_accessibility_str("{not json").is_err());
    }
}
