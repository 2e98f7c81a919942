//! Curriculum node domain model.
//!
//! # Responsibility
//! - Define the recursive node value stored inside a unit forest.
//! - Define the caller-facing shape used to request a new node.
//!
//! # Invariants
//! - `id` is unique within one unit forest; it carries no meaning across units.
//! - `id` equals the id of the backing content document (lesson/video/quiz).
//! - `children` are owned exclusively by their parent; no sharing, no back-references.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Node identifier. Doubles as the backing content document id.
pub type NodeId = String;

/// Ordered sequence of top-level nodes belonging to one unit.
pub type Forest = Vec<CurriculumNode>;

/// Closed set of curriculum node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Lesson,
    Video,
    Quiz,
}

impl NodeKind {
    /// Stable lowercase label used in storage and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lesson => "lesson",
            Self::Video => "video",
            Self::Quiz => "quiz",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for node kind labels outside `lesson|video|quiz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNodeKind(pub String);

impl Display for UnknownNodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported node type `{}`; expected lesson|video|quiz",
            self.0
        )
    }
}

impl Error for UnknownNodeKind {}

impl FromStr for NodeKind {
    type Err = UnknownNodeKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lesson" => Ok(Self::Lesson),
            "video" => Ok(Self::Video),
            "quiz" => Ok(Self::Quiz),
            _ => Err(UnknownNodeKind(value.to_string())),
        }
    }
}

/// One item in a unit's curriculum tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumNode {
    /// Unit-local id, equal to the backing content id.
    pub id: NodeId,
    /// Serialized as `type` to match the external document shape.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub title: String,
    /// Tooltip/body text shown when the node is selected.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub children: Vec<CurriculumNode>,
}

impl CurriculumNode {
    /// Creates a leaf node.
    pub fn leaf(
        id: impl Into<NodeId>,
        kind: NodeKind,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: description.into(),
            children: Vec::new(),
        }
    }

    /// Builder-style helper that replaces the children list.
    pub fn with_children(mut self, children: Vec<CurriculumNode>) -> Self {
        self.children = children;
        self
    }

    /// Returns whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Caller-provided description of a node to create.
///
/// The id is never supplied by callers; it is assigned from the provisioned
/// content document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub kind: NodeKind,
    pub title: String,
    pub description: String,
}

impl NodeSpec {
    pub fn new(kind: NodeKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Materializes a leaf node bound to the given content id.
    pub fn into_node(self, content_id: impl Into<NodeId>) -> CurriculumNode {
        CurriculumNode::leaf(content_id, self.kind, self.title, self.description)
    }
}
