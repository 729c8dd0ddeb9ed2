//! Exhaustive `{id, href, text}` list handed to the synthesizer as ground
//! truth.

use serde::Serialize;

use crate::DocumentNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredElement {
    pub id: Option<String>,
    pub href: Option<String>,
    pub text: String,
}

/// Every element carrying an id, an href or any text, in document order.
pub fn structured_elements(root: &DocumentNode) -> Vec<StructuredElement> {
    root.nodes()
        .filter(|node| node.is_element())
        .filter_map(|node| {
            let attrs = node.attrs();
            let text = node.descendant_text();
            if attrs.id.is_none() && attrs.href.is_none() && text.is_empty() {
                return None;
            }
            Some(StructuredElement {
                id: attrs.id.clone(),
                href: attrs.href.clone(),
                text,
            })
        })
        .collect()
}

/// A JSON array of as many leading elements as fit in a character budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedElements {
    pub json: String,
    pub included: usize,
    pub omitted: usize,
}

/// Serialize `elements` into a JSON array of at most `max_chars`
/// characters, keeping a prefix of the list.  The first element is kept
/// even when it alone exceeds the budget so the list is never empty for a
/// non-empty page.
pub fn serialize_bounded(elements: &[StructuredElement], max_chars: usize) -> BoundedElements {
    let mut json = String::from("[");
    let mut included = 0;
    for element in elements {
        let Ok(encoded) = serde_json::to_string(element) else {
            continue;
        };
        let separator = usize::from(included > 0);
        if included > 0 && json.len() + separator + encoded.len() + 1 > max_chars {
            break;
        }
        if included > 0 {
            json.push(',');
        }
        json.push_str(&encoded);
        included += 1;
    }
    json.push(']');
    BoundedElements {
        json,
        included,
        omitted: elements.len() - included,
    }
}
