//! In-memory [`Document`] implementation.

use std::sync::{Mutex, MutexGuard};

use rustc_hash::FxHashMap;

use super::{Document, ElementId};

/// Description of an element to append.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub hidden: bool,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[derive(Debug)]
struct Node {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: FxHashMap<String, String>,
    text: String,
    visible: bool,
    children: Vec<usize>,
    parent: Option<usize>,
}

impl Node {
    fn from_spec(spec: ElementSpec, parent: Option<usize>) -> Self {
        Self {
            tag: spec.tag,
            id: spec.id,
            classes: spec.classes,
            attributes: spec.attributes.into_iter().collect(),
            text: spec.text,
            visible: !spec.hidden,
            children: Vec::new(),
            parent,
        }
    }

    fn matches(&self, selector: &Selector<'_>) -> bool {
        match selector {
            Selector::Id(id) => self.id.as_deref() == Some(*id),
            Selector::Class(class) => self.classes.iter().any(|c| c == class),
            Selector::Tag(tag) => self.tag == *tag,
            Selector::TagClass(tag, class) => {
                self.tag == *tag && self.classes.iter().any(|c| c == class)
            }
        }
    }
}

enum Selector<'a> {
    Id(&'a str),
    Class(&'a str),
    Tag(&'a str),
    TagClass(&'a str, &'a str),
}

impl<'a> Selector<'a> {
    fn parse(selector: &'a str) -> Self {
        let selector = selector.trim();
        if let Some(id) = selector.strip_prefix('#') {
            Selector::Id(id)
        } else if let Some(class) = selector.strip_prefix('.') {
            Selector::Class(class)
        } else if let Some((tag, class)) = selector.split_once('.') {
            Selector::TagClass(tag, class)
        } else {
            Selector::Tag(selector)
        }
    }
}

/// Arena-backed document tree. Element handles are arena indices.
#[derive(Debug)]
pub struct VirtualDom {
    nodes: Mutex<Vec<Node>>,
}

impl Default for VirtualDom {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDom {
    /// Create a document with an empty `<body>`.
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(vec![Node::from_spec(ElementSpec::new("body"), None)]),
        }
    }

    fn nodes(&self) -> MutexGuard<'_, Vec<Node>> {
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The `<body>` element.
    pub fn body(&self) -> ElementId {
        ElementId::new(0)
    }

    /// Append a child element to `parent`.
    ///
    /// An id from another document falls back to `<body>`.
    pub fn append(&self, parent: ElementId, spec: ElementSpec) -> ElementId {
        let mut nodes = self.nodes();
        let mut parent = parent.as_u64() as usize;
        if parent >= nodes.len() {
            tracing::warn!(parent, "unknown parent element, appending to body");
            parent = 0;
        }
        let index = nodes.len();
        nodes.push(Node::from_spec(spec, Some(parent)));
        nodes[parent].children.push(index);
        ElementId::new(index as u64)
    }

    /// Element ids of `element`'s children.
    pub fn children(&self, element: ElementId) -> Vec<ElementId> {
        self.nodes()
            .get(element.as_u64() as usize)
            .map(|n| n.children.iter().map(|&i| ElementId::new(i as u64)).collect())
            .unwrap_or_default()
    }

    /// Depth-first walk below `root`, excluding `root` itself.
    fn descendants(nodes: &[Node], root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = nodes[root].children.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            out.push(index);
            stack.extend(nodes[index].children.iter().rev().copied());
        }
        out
    }
}

impl Document for VirtualDom {
    fn element_by_id(&self, id: &str) -> Option<ElementId> {
        let nodes = self.nodes();
        Self::descendants(&nodes, 0)
            .into_iter()
            .find(|&i| nodes[i].id.as_deref() == Some(id))
            .map(|i| ElementId::new(i as u64))
    }

    fn find_descendant(&self, root: ElementId, class: &str) -> Option<ElementId> {
        let nodes = self.nodes();
        let root = root.as_u64() as usize;
        if root >= nodes.len() {
            return None;
        }
        Self::descendants(&nodes, root)
            .into_iter()
            .find(|&i| nodes[i].matches(&Selector::Class(class)))
            .map(|i| ElementId::new(i as u64))
    }

    fn query_selector_all(&self, selector: &str) -> Vec<ElementId> {
        let selector = Selector::parse(selector);
        let nodes = self.nodes();
        Self::descendants(&nodes, 0)
            .into_iter()
            .filter(|&i| nodes[i].matches(&selector))
            .map(|i| ElementId::new(i as u64))
            .collect()
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        let nodes = self.nodes();
        let node = nodes.get(element.as_u64() as usize)?;
        match name {
            "id" => node.id.clone(),
            "class" => Some(node.classes.join(" ")),
            _ => node.attributes.get(name).cloned(),
        }
    }

    fn text_content(&self, element: ElementId) -> String {
        let nodes = self.nodes();
        let index = element.as_u64() as usize;
        if index >= nodes.len() {
            return String::new();
        }
        let mut text = nodes[index].text.clone();
        for i in Self::descendants(&nodes, index) {
            text.push_str(&nodes[i].text);
        }
        text
    }

    fn set_visible(&self, element: ElementId, visible: bool) {
        if let Some(node) = self.nodes().get_mut(element.as_u64() as usize) {
            node.visible = visible;
        }
    }

    fn is_visible(&self, element: ElementId) -> bool {
        self.nodes()
            .get(element.as_u64() as usize)
            .is_some_and(|n| n.visible)
    }

    fn insert_after(&self, anchor: ElementId, tag: &str, class: &str) -> ElementId {
        let mut nodes = self.nodes();
        let anchor = anchor.as_u64() as usize;
        let parent = match nodes.get(anchor) {
            Some(node) => node.parent.unwrap_or(0),
            None => {
                tracing::warn!(anchor, "unknown anchor element, appending to body");
                0
            }
        };
        let index = nodes.len();
        nodes.push(Node::from_spec(ElementSpec::new(tag).class(class), Some(parent)));

        let siblings = &mut nodes[parent].children;
        let position = siblings
            .iter()
            .position(|&i| i == anchor)
            .map_or(siblings.len(), |p| p + 1);
        siblings.insert(position, index);

        ElementId::new(index as u64)
    }
}
