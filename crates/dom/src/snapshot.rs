//! Ordered, path-addressed text form of a tree.

use std::fmt;

use serde::Serialize;

use crate::{DocumentNode, NodePath};

/// One node of the tree, flattened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedLine {
    pub depth: usize,
    pub path: NodePath,
    pub role: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl fmt::Display for NormalizedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[depth:{}][{}] role: {}; name: '{}'",
            self.depth, self.path, self.role, self.name
        )?;
        if let Some(value) = &self.value {
            write!(f, "; value: '{value}'")?;
        }
        Ok(())
    }
}

/// One line per node, in exact pre-order.  The order is a function of the
/// tree structure alone and is never re-sorted.
pub fn normalize(root: &DocumentNode) -> Vec<NormalizedLine> {
    root.walk()
        .map(|(path, node)| NormalizedLine {
            depth: path.depth(),
            path,
            role: node.role().to_string(),
            name: node.text().to_string(),
            value: node.attrs().value.clone(),
        })
        .collect()
}

/// Newline-joined [`NormalizedLine`]s.
pub fn render_snapshot(lines: &[NormalizedLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
