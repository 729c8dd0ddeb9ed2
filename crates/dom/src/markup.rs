//! Markup → [`DocumentNode`] via `scraper`.

use scraper::{ElementRef, Html};

use crate::DocumentNode;

/// Parse an HTML document.  The tree is rooted at `<html>`; comments,
/// doctypes and whitespace-only text runs are dropped.
///
/// `Html` is `!Send`, so the parse never escapes this function: callers get
/// an owned tree they can move across tasks.
pub fn parse_markup(html: &str) -> DocumentNode {
    let document = Html::parse_document(html);
    convert(document.root_element())
}

/// A converted child waiting to be attached to its parent.
enum Child<'a> {
    Element(ElementRef<'a>),
    Text(String),
}

/// An element whose children are still being converted.
struct Frame<'a> {
    node: DocumentNode,
    pending: std::vec::IntoIter<Child<'a>>,
    children: Vec<DocumentNode>,
}

impl<'a> Frame<'a> {
    fn open(element: ElementRef<'a>) -> Self {
        let pending: Vec<Child<'a>> = element
            .children()
            .filter_map(|child| {
                if let Some(child_element) = ElementRef::wrap(child) {
                    return Some(Child::Element(child_element));
                }
                let text: &str = child.value().as_text()?;
                if text.trim().is_empty() {
                    None
                } else {
                    Some(Child::Text(collapse_whitespace(text)))
                }
            })
            .collect();
        Self {
            node: shell(element),
            pending: pending.into_iter(),
            children: Vec::new(),
        }
    }
}

/// Depth-first with an explicit stack: markup nests as deep as the page
/// author likes.
fn convert(root: ElementRef<'_>) -> DocumentNode {
    let mut stack = vec![Frame::open(root)];
    loop {
        let top = stack.len() - 1;
        match stack[top].pending.next() {
            Some(Child::Element(element)) => stack.push(Frame::open(element)),
            Some(Child::Text(text)) => stack[top].children.push(DocumentNode::text_node(text)),
            None => {
                let Frame { node, children, .. } = stack.remove(top);
                let node = node.with_children(children);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return node,
                }
            }
        }
    }
}

/// The element itself, without children.
fn shell(element: ElementRef<'_>) -> DocumentNode {
    let value = element.value();
    let mut converted = DocumentNode::element(value.name().to_ascii_lowercase());
    if let Some(id) = value.id() {
        converted = converted.with_id(id);
    }
    for class in value.classes() {
        converted = converted.with_class(class);
    }
    if let Some(href) = value.attr("href") {
        converted = converted.with_href(href);
    }
    if let Some(field_value) = value.attr("value") {
        converted = converted.with_value(field_value);
    }
    converted
}

/// Collapse runs of whitespace into single spaces and trim.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
