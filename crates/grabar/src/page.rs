//! Page abstraction consumed by the runtime support library.
//!
//! The resolver, the forced-action interpreter, and the API executor talk to
//! a [`PageDriver`], never to a concrete browser. [`crate::mock::MockPage`]
//! implements the trait in memory; with the `browser` feature a CDP-backed
//! driver is available.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::model::StorageLocation;
use crate::result::GrabarResult;
use crate::selector::SelectorSpec;

/// Stable identifier of a node within one DOM snapshot.
pub type NodeId = u64;

/// One element in a DOM snapshot, including its shadow content.
///
/// Shadow-root children are kept apart from light children because standard
/// query primitives do not pierce shadow boundaries; the forced-action
/// interpreter traverses both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomNode {
    /// Snapshot-scoped node id
    pub id: NodeId,
    /// Lowercase tag name
    pub tag: String,
    /// Attributes in document order
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Own (direct) text content
    #[serde(default)]
    pub text: String,
    /// Light-DOM children
    #[serde(default)]
    pub children: Vec<DomNode>,
    /// Shadow-root children, present when the element hosts a shadow tree
    #[serde(default)]
    pub shadow_children: Vec<DomNode>,
}

impl DomNode {
    /// Create a node with a tag and no content.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            ..Self::default()
        }
    }

    /// Builder: set the snapshot id.
    #[must_use]
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Builder: add an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Builder: set own text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder: append a light-DOM child.
    #[must_use]
    pub fn with_child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: append a shadow-root child.
    #[must_use]
    pub fn with_shadow_child(mut self, child: DomNode) -> Self {
        self.shadow_children.push(child);
        self
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the class attribute contains the given class.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|part| part == class))
    }

    /// Concatenated visible text of this node and all descendants, shadow
    /// content included, whitespace-normalized.
    #[must_use]
    pub fn visible_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        let joined = parts.join(" ");
        joined.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, out: &mut Vec<String>) {
        if !self.text.trim().is_empty() {
            out.push(self.text.trim().to_string());
        }
        // Shadow content renders before slotted light children, so it is
        // read first here as well.
        for child in self.shadow_children.iter().chain(self.children.iter()) {
            child.collect_text(out);
        }
    }

    /// Serialized outer markup of this node, shadow content rendered inline
    /// inside a `template shadowrootmode` wrapper.
    #[must_use]
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.render_html(&mut out);
        out
    }

    fn render_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push('>');
        if !self.shadow_children.is_empty() {
            out.push_str("<template shadowrootmode=\"open\">");
            for child in &self.shadow_children {
                child.render_html(out);
            }
            out.push_str("</template>");
        }
        out.push_str(&escape_text(&self.text));
        for child in &self.children {
            child.render_html(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }

    /// Depth-first search for a node by element id attribute, piercing
    /// shadow roots.
    #[must_use]
    pub fn find_by_element_id(&self, id: &str) -> Option<&DomNode> {
        if self.attr("id") == Some(id) {
            return Some(self);
        }
        self.children
            .iter()
            .chain(self.shadow_children.iter())
            .find_map(|c| c.find_by_element_id(id))
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// One DOM-level mutation synthesized by the forced-action interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomMutation {
    /// Dispatch a named DOM event on the node
    DispatchEvent {
        /// Event type, e.g. `pointerdown`
        event: String,
    },
    /// Assign the node's `value` property directly
    SetValue {
        /// New value
        value: String,
    },
}

impl DomMutation {
    /// Convenience constructor for an event dispatch.
    #[must_use]
    pub fn event(name: &str) -> Self {
        Self::DispatchEvent {
            event: name.to_string(),
        }
    }
}

/// Driver interface over one live page / browsing context.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Wait until at least one element matching the selector is attached.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GrabarError::Timeout`] if nothing attaches in time.
    async fn wait_for_attached(
        &self,
        spec: &SelectorSpec,
        timeout: Duration,
    ) -> GrabarResult<()>;

    /// Number of elements currently matching the selector.
    async fn count_matches(&self, spec: &SelectorSpec) -> GrabarResult<usize>;

    /// Snapshot of the page's DOM tree, shadow roots included.
    async fn document(&self) -> GrabarResult<DomNode>;

    /// Apply a synthesized mutation to a node from the latest snapshot.
    async fn apply(&self, node: NodeId, mutation: &DomMutation) -> GrabarResult<()>;

    /// Read one value from page storage (local, session, or cookie).
    async fn storage_get(
        &self,
        location: StorageLocation,
        key: &str,
    ) -> GrabarResult<Option<String>>;

    /// Capture a full-page screenshot to the given path.
    async fn screenshot(&self, path: &Path) -> GrabarResult<()>;
}
