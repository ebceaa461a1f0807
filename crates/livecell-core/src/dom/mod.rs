//! Page-side glue: the document abstraction, the busy-indicator protocol and
//! the placeholder binder.
//!
//! Rendering is not done here. The page is reached through the narrow
//! [`Document`] trait; [`VirtualDom`] is an in-memory implementation used for
//! headless pages and tests.

mod binder;
mod busy;
mod virtual_dom;

pub use binder::{DomBinder, Placeholder};
pub use busy::BusyIndicator;
pub use virtual_dom::{ElementSpec, VirtualDom};

use serde::{Deserialize, Serialize};

/// Opaque handle to an element in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(u64);

impl ElementId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// The operations the core needs from a page.
///
/// Selectors are simple: `tag`, `.class`, `#id` or `tag.class`.
pub trait Document: Send + Sync {
    /// Element whose `id` attribute equals `id`.
    fn element_by_id(&self, id: &str) -> Option<ElementId>;

    /// First descendant of `root` (depth-first, document order) carrying `class`.
    fn find_descendant(&self, root: ElementId, class: &str) -> Option<ElementId>;

    /// All elements matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Vec<ElementId>;

    fn attribute(&self, element: ElementId, name: &str) -> Option<String>;

    fn text_content(&self, element: ElementId) -> String;

    fn set_visible(&self, element: ElementId, visible: bool);

    fn is_visible(&self, element: ElementId) -> bool;

    /// Create a new `<tag class="class">` as the next sibling of `anchor`.
    fn insert_after(&self, anchor: ElementId, tag: &str, class: &str) -> ElementId;
}
