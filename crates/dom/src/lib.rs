//! Document model and the deterministic pipeline stages: normalization,
//! outlining, identifier matching and the text digests built from a page.

mod accessibility;
mod analysis;
mod extract;
mod markup;
mod node;
mod outline;
mod snapshot;
mod structured;
mod text;

use thiserror::Error;

pub use accessibility::{parse_accessibility, parse_accessibility_str};
pub use analysis::{PageDistribution, TagShare, tag_distribution};
pub use extract::{
    ExtractOptions, ExtractedBlock, Identifier, extract_blocks, extract_loose, extract_text,
    join_blocks, split_hints,
};
pub use markup::parse_markup;
pub use node::{
    Attributes, DocumentNode, NodeKind, NodePath, Nodes, TEXT_ROLE, UNKNOWN_ROLE, Walk,
};
pub use outline::{OutlineEntry, OutlineOptions, build_outline, outline_entries};
pub use snapshot::{NormalizedLine, normalize, render_snapshot};
pub use structured::{BoundedElements, StructuredElement, serialize_bounded, structured_elements};
pub use text::{
    dedup_preserving_order, plain_text, truncate_byte_boundary, truncate_chars,
    truncate_for_prompt,
};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed accessibility snapshot: {0}")]
    Snapshot(String),
    #[error("identifier has no tag")]
    MissingTag,
    #[error("identifier is not an object: {0}")]
    MalformedIdentifier(String),
}
