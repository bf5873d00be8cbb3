use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PatchError, Result};
use crate::policy::Category;
use crate::position::{Position, Range};

/// Opaque reference to a parent node supplied by the position resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// Syntactic shape of a parent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    List,
    Tuple,
    Set,
    Dict,
    Call,
}

impl NodeKind {
    /// A single element of this kind needs a trailing separator, as in `(x,)`.
    pub fn needs_singleton_separator(self) -> bool {
        matches!(self, NodeKind::Tuple)
    }
}

/// One child of a parent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Full span of the child. Dict entries span `key: value`, keyword
    /// arguments span `name=value`.
    pub range: Range,
    /// Span of the value part for dict entries and keyword arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Range>,
}

impl Element {
    pub fn new(range: Range) -> Self {
        Self { range, value: None }
    }

    pub fn with_value(range: Range, value: Range) -> Self {
        Self {
            range,
            value: Some(value),
        }
    }

    /// The span holding the element's value.
    pub fn value_range(&self) -> Range {
        self.value.unwrap_or(self.range)
    }
}

/// A list, tuple, set, dict or call whose children may be edited.
///
/// Nothing is parsed here: the caller describes the delimiters and element
/// ranges and hands the nodes over through a [`PositionResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Opening delimiter token (`[`, `(`, `{`).
    pub open: Range,
    /// Closing delimiter token.
    pub close: Range,
    /// Children in source order. Call arguments list positional arguments
    /// first, then keyword arguments.
    pub elements: Vec<Element>,
}

impl ParentNode {
    pub fn element(&self, index: usize) -> Result<&Element> {
        self.elements.get(index).ok_or(PatchError::UnknownElement {
            node: self.id,
            index,
        })
    }
}

/// Resolves node references to their ranges in the original text.
pub trait PositionResolver {
    fn node(&self, id: NodeId) -> Option<&ParentNode>;

    fn resolve(&self, id: NodeId) -> Result<&ParentNode> {
        self.node(id).ok_or(PatchError::UnknownNode(id))
    }
}

/// In-memory resolver filled by whoever parsed the source.
#[derive(Debug, Clone, Default)]
pub struct SyntaxMap {
    nodes: HashMap<NodeId, ParentNode>,
}

impl SyntaxMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: ParentNode) {
        self.nodes.insert(node.id, node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<ParentNode> for SyntaxMap {
    fn from_iter<I: IntoIterator<Item = ParentNode>>(iter: I) -> Self {
        let mut map = SyntaxMap::new();
        iter.into_iter().for_each(|node| map.insert(node));
        map
    }
}

impl PositionResolver for SyntaxMap {
    fn node(&self, id: NodeId) -> Option<&ParentNode> {
        self.nodes.get(&id)
    }
}

/// Source text to put into the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewCode {
    /// Ready-made code.
    Code(String),
    /// A value rendered through the code translator.
    Value(serde_json::Value),
    /// A value stored out of line, referenced by its store location.
    External(String),
}

impl From<&str> for NewCode {
    fn from(code: &str) -> Self {
        NewCode::Code(code.to_string())
    }
}

impl From<serde_json::Value> for NewCode {
    fn from(value: serde_json::Value) -> Self {
        NewCode::Value(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub key: NewCode,
    pub value: NewCode,
}

/// What an intent does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntentKind {
    /// Replace one span.
    Replace { range: Range, code: NewCode },
    /// Insert at a point.
    Insert { at: Position, code: NewCode },
    /// Remove a span that belongs to no tracked parent.
    Delete { range: Range },
    /// Remove the `index`-th child of `parent`.
    DeleteElement { parent: NodeId, index: usize },
    /// Add an argument to a call. Keyword arguments (`name` set) go after
    /// every existing argument unless `position` says otherwise. Positional
    /// arguments must carry a `position`.
    CallArgumentInsert {
        parent: NodeId,
        #[serde(default)]
        position: Option<usize>,
        #[serde(default)]
        name: Option<String>,
        code: NewCode,
    },
    /// Add items before the `position`-th child of a list, tuple or set.
    SequenceInsert {
        parent: NodeId,
        position: usize,
        items: Vec<NewCode>,
    },
    /// Add entries before the `position`-th entry of a dict.
    MappingInsert {
        parent: NodeId,
        position: usize,
        entries: Vec<MappingEntry>,
    },
}

impl IntentKind {
    /// The parent node the intent has to be consolidated under, if any.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            IntentKind::Replace { .. } | IntentKind::Insert { .. } | IntentKind::Delete { .. } => {
                None
            }
            IntentKind::DeleteElement { parent, .. }
            | IntentKind::CallArgumentInsert { parent, .. }
            | IntentKind::SequenceInsert { parent, .. }
            | IntentKind::MappingInsert { parent, .. } => Some(*parent),
        }
    }
}

/// A categorized request to change one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub category: Category,
    pub file: PathBuf,
    #[serde(flatten)]
    pub kind: IntentKind,
}

impl Intent {
    pub fn new(category: Category, file: impl Into<PathBuf>, kind: IntentKind) -> Self {
        Self {
            category,
            file: file.into(),
            kind,
        }
    }
}
