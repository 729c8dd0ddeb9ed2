//! The normalized document tree shared by every pipeline stage.

use std::fmt;

use serde::Serialize;

/// Whether a node is an element (or accessibility object) or a bare run of
/// text from markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Element,
    Text,
}

/// The attributes every stage can match on.  Empty strings never make it in
/// here: absent and blank are the same thing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes {
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub href: Option<String>,
    pub value: Option<String>,
}

/// One node of a rendered page, built once from the renderer's output and
/// never mutated afterwards.  Transformations such as pruning return a new
/// tree.
///
/// `role` holds the lowercase tag name for markup and the accessibility role
/// for snapshots.  `text` is the accessible name, or the content of a markup
/// text node.  Paths are not stored: they are the child indices leading to a
/// node and fall out of traversal (see [`DocumentNode::walk`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentNode {
    kind: NodeKind,
    role: String,
    text: String,
    attrs: Attributes,
    children: Vec<DocumentNode>,
}

pub const UNKNOWN_ROLE: &str = "unknown";
pub const TEXT_ROLE: &str = "text";

fn non_blank(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.trim().is_empty() { None } else { Some(value) }
}

impl DocumentNode {
    /// An element with the given role; a blank role resolves to `"unknown"`.
    pub fn element(role: impl Into<String>) -> Self {
        let role = role.into();
        let role = if role.trim().is_empty() {
            UNKNOWN_ROLE.to_string()
        } else {
            role.trim().to_string()
        };
        Self {
            kind: NodeKind::Element,
            role,
            text: String::new(),
            attrs: Attributes::default(),
            children: Vec::new(),
        }
    }

    /// A markup text run.  Surrounding whitespace is trimmed.
    pub fn text_node(text: impl AsRef<str>) -> Self {
        Self {
            kind: NodeKind::Text,
            role: TEXT_ROLE.to_string(),
            text: text.as_ref().trim().to_string(),
            attrs: Attributes::default(),
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl AsRef<str>) -> Self {
        self.text = text.as_ref().trim().to_string();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.attrs.id = non_blank(id);
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        if let Some(class) = non_blank(class) {
            self.attrs.classes.push(class);
        }
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.attrs.href = non_blank(href);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.attrs.value = non_blank(value);
        self
    }

    pub fn with_child(mut self, child: DocumentNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = DocumentNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn children(&self) -> &[DocumentNode] {
        &self.children
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.eq_ignore_ascii_case(role)
    }

    /// Pre-order traversal: the node, then each child subtree left to right.
    pub fn walk(&self) -> Walk<'_> {
        self.walk_filtered(|_| true)
    }

    /// Pre-order traversal that neither yields nor descends into nodes for
    /// which `keep` returns `false`.  The root is always yielded.
    pub fn walk_filtered<'a, F>(&'a self, keep: F) -> Walk<'a>
    where
        F: Fn(&DocumentNode) -> bool + 'a,
    {
        Walk {
            stack: vec![(NodePath::root(), self)],
            keep: Box::new(keep),
        }
    }

    /// Pre-order traversal without paths, for stages that only look at the
    /// nodes themselves.
    pub fn nodes(&self) -> Nodes<'_> {
        self.nodes_filtered(|_| true)
    }

    /// [`DocumentNode::nodes`] with the same pruning rule as
    /// [`DocumentNode::walk_filtered`].
    pub fn nodes_filtered<'a, F>(&'a self, keep: F) -> Nodes<'a>
    where
        F: Fn(&DocumentNode) -> bool + 'a,
    {
        Nodes {
            stack: vec![self],
            keep: Box::new(keep),
        }
    }

    /// Trimmed, non-empty text of this node and every descendant, in
    /// document order, joined by single spaces.
    pub fn descendant_text(&self) -> String {
        let mut fragments = Vec::new();
        self.collect_text(&mut fragments);
        fragments.join(" ")
    }

    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.extend(
            self.nodes()
                .map(|node| node.text.trim())
                .filter(|text| !text.is_empty()),
        );
    }

    /// Copy of the tree without the subtrees whose role is listed in
    /// `excluded` (compared case-insensitively).  The root is always kept.
    pub fn prune(&self, excluded: &[String]) -> DocumentNode {
        struct Frame<'a> {
            source: &'a DocumentNode,
            next: usize,
            children: Vec<DocumentNode>,
        }

        impl<'a> Frame<'a> {
            fn open(source: &'a DocumentNode) -> Self {
                Self {
                    source,
                    next: 0,
                    children: Vec::new(),
                }
            }
        }

        let mut stack = vec![Frame::open(self)];
        loop {
            let top = stack.len() - 1;
            let source = stack[top].source;
            if let Some(child) = source.children.get(stack[top].next) {
                stack[top].next += 1;
                if !child.is_excluded(excluded) {
                    stack.push(Frame::open(child));
                }
                continue;
            }

            let Frame { source, children, .. } = stack.remove(top);
            let copy = DocumentNode {
                kind: source.kind,
                role: source.role.clone(),
                text: source.text.clone(),
                attrs: source.attrs.clone(),
                children,
            };
            match stack.last_mut() {
                Some(parent) => parent.children.push(copy),
                None => return copy,
            }
        }
    }

    pub fn is_excluded(&self, excluded: &[String]) -> bool {
        self.is_element() && excluded.iter().any(|role| self.has_role(role))
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }
}

// Pages nest arbitrarily deep; the derived drop would recurse once per level.
impl Drop for DocumentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Child indices from the root to a node.  The root's path is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

impl Serialize for NodePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Iterator returned by [`DocumentNode::nodes`].
pub struct Nodes<'a> {
    stack: Vec<&'a DocumentNode>,
    keep: Box<dyn Fn(&DocumentNode) -> bool + 'a>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a DocumentNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().filter(|child| (self.keep)(*child)));
        Some(node)
    }
}

/// Iterator returned by [`DocumentNode::walk`].
pub struct Walk<'a> {
    stack: Vec<(NodePath, &'a DocumentNode)>,
    keep: Box<dyn Fn(&DocumentNode) -> bool + 'a>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (NodePath, &'a DocumentNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        for (index, child) in node.children.iter().enumerate().rev() {
            if (self.keep)(child) {
                self.stack.push((path.child(index), child));
            }
        }
        Some((path, node))
    }
}
