use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde_json::Value;

use crate::error::{ShellError, ShellResult};

/// Opaque arena key for a document node. Never reused within a `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle for a registered event listener binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element { tag: String },
    Comment { text: String },
}

/// Rendered visibility of a node. `None` hides the subtree without
/// detaching it, so component state survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Default,
    None,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    dom_id: Option<String>,
    classes: BTreeSet<String>,
    attrs: BTreeMap<String, String>,
    text: Option<String>,
    display: Display,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            dom_id: None,
            classes: BTreeSet::new(),
            attrs: BTreeMap::new(),
            text: None,
            display: Display::Default,
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct ListenerBinding {
    node: NodeId,
    event: String,
    /// `Some` for queuing listeners; delivered details accumulate here.
    inbox: Option<Vec<Value>>,
}

/// One listener reached by a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub listener: ListenerId,
    pub node: NodeId,
}

/// Outcome of [`Document::dispatch`]: the event name, its detail payload,
/// and every listener it reached in bubbling order.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub event: String,
    pub detail: Value,
    pub deliveries: Vec<Delivery>,
}

/// Retained element arena. The `body` node created at construction is the
/// tree root and the focus fallback.
pub struct Document {
    nodes: HashMap<NodeId, Node>,
    dom_ids: HashMap<String, NodeId>,
    listeners: HashMap<ListenerId, ListenerBinding>,
    next_node: u64,
    next_listener: u64,
    body: NodeId,
    focus: Option<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: HashMap::new(),
            dom_ids: HashMap::new(),
            listeners: HashMap::new(),
            next_node: 0,
            next_listener: 0,
            body: NodeId(0),
            focus: None,
        };
        doc.body = doc.alloc(NodeKind::Element {
            tag: "body".to_string(),
        });
        doc
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, Node::new(kind));
        id
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element { tag: tag.into() })
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Comment { text: text.into() })
    }

    /// Fluent construction for elements that need an id, classes, or
    /// attributes up front.
    pub fn build_element(&mut self, tag: impl Into<String>) -> ElementBuilder<'_> {
        let node = self.create_element(tag);
        ElementBuilder { doc: self, node }
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(&id).map(|n| &n.kind)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(&id).map(|n| &n.kind) {
            Some(NodeKind::Element { tag }) => Some(tag.as_str()),
            _ => None,
        }
    }

    // ---- tree surgery -----------------------------------------------------

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> ShellResult<()> {
        self.insert_at(parent, child, None)
    }

    /// Inserts `child` into `parent` immediately before `before`. When
    /// `before` is not a child of `parent` the node is appended.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> ShellResult<()> {
        self.insert_at(parent, child, before)
    }

    fn insert_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> ShellResult<()> {
        if !self.nodes.contains_key(&parent) {
            return Err(ShellError::MissingNode(parent));
        }
        if !self.nodes.contains_key(&child) {
            return Err(ShellError::MissingNode(child));
        }
        self.detach(child)?;
        let slot = before.and_then(|b| {
            self.nodes
                .get(&parent)
                .and_then(|p| p.children.iter().position(|c| *c == b))
        });
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(ShellError::MissingNode(parent))?;
        match slot {
            Some(index) => parent_node.children.insert(index, child),
            None => parent_node.children.push(child),
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
        Ok(())
    }

    /// Removes `id` from its parent, leaving it alive in the arena. Focus
    /// held inside the detached subtree falls back to body, mirroring how a
    /// browser drops focus when a node leaves the document.
    pub fn detach(&mut self, id: NodeId) -> ShellResult<()> {
        let parent = self
            .nodes
            .get(&id)
            .ok_or(ShellError::MissingNode(id))?
            .parent;
        let Some(parent) = parent else {
            return Ok(());
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        if let Some(focused) = self.focus {
            if focused == id || self.contains(id, focused) {
                self.focus = None;
            }
        }
        Ok(())
    }

    /// Atomically swaps the child list of `host` for `nodes`, returning the
    /// detached previous children. New children are detached from their old
    /// parents first; ids missing from the arena are dropped.
    pub fn replace_children(
        &mut self,
        host: NodeId,
        nodes: Vec<NodeId>,
    ) -> ShellResult<Vec<NodeId>> {
        if !self.nodes.contains_key(&host) {
            return Err(ShellError::MissingNode(host));
        }
        let previous = self.children(host);
        for child in &previous {
            self.detach(*child)?;
        }
        for node in nodes {
            if !self.nodes.contains_key(&node) {
                continue;
            }
            self.append_child(host, node)?;
        }
        Ok(previous)
    }

    /// Puts `new` in the exact tree position `old` occupies and detaches
    /// `old`. Used for the desktop rail placeholder swap.
    pub fn swap_node(&mut self, old: NodeId, new: NodeId) -> ShellResult<()> {
        let parent = self
            .nodes
            .get(&old)
            .ok_or(ShellError::MissingNode(old))?
            .parent
            .ok_or(ShellError::MissingNode(old))?;
        let next = self.next_sibling(old);
        self.detach(old)?;
        self.insert_at(parent, new, next)
    }

    /// Drops `id` and its descendants from the arena along with their
    /// listener bindings and dom-id index entries.
    pub fn destroy_subtree(&mut self, id: NodeId) -> ShellResult<()> {
        if !self.nodes.contains_key(&id) {
            return Err(ShellError::MissingNode(id));
        }
        self.detach(id)?;
        let doomed = self.collect_subtree(id);
        self.listeners
            .retain(|_, binding| !doomed.contains(&binding.node));
        for node in &doomed {
            if let Some(dom_id) = self.nodes.get(node).and_then(|n| n.dom_id.clone()) {
                if self.dom_ids.get(&dom_id) == Some(node) {
                    self.dom_ids.remove(&dom_id);
                }
            }
            self.nodes.remove(node);
        }
        if let Some(focused) = self.focus {
            if doomed.contains(&focused) {
                self.focus = None;
            }
        }
        Ok(())
    }

    fn collect_subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }

    // ---- queries ----------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = &self.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|c| *c == id)?;
        index.checked_sub(1).map(|i| siblings[i])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = &self.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|c| *c == id)?;
        siblings.get(index + 1).copied()
    }

    /// True when `node` sits somewhere under `ancestor` (strict descent).
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.body || self.contains(self.body, id)
    }

    pub fn element_by_dom_id(&self, dom_id: &str) -> Option<NodeId> {
        self.dom_ids.get(dom_id).copied()
    }

    pub fn dom_id(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).and_then(|n| n.dom_id.as_deref())
    }

    pub fn set_dom_id(&mut self, id: NodeId, dom_id: impl Into<String>) {
        let dom_id = dom_id.into();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.dom_id = Some(dom_id.clone());
            // Last assignment wins in the index, as in a live document.
            self.dom_ids.insert(dom_id, id);
        }
    }

    /// Linear scan over every node carrying `attr`. Best effort by design;
    /// callers treat the result as a heuristic.
    pub fn collect_attr_scan(&self, attr: &str) -> Vec<(NodeId, String)> {
        let mut hits: Vec<(NodeId, String)> = self
            .nodes
            .iter()
            .filter_map(|(id, node)| node.attrs.get(attr).map(|v| (*id, v.clone())))
            .collect();
        hits.sort_by_key(|(id, _)| *id);
        hits
    }

    // ---- attributes, classes, text, display -------------------------------

    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.attrs.insert(name.into(), value.into());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.attrs.remove(name);
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(&id)
            .and_then(|n| n.attrs.get(name))
            .map(String::as_str)
    }

    pub fn add_class(&mut self, id: NodeId, class: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.classes.insert(class.into());
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.classes.remove(class);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.nodes
            .get(&id)
            .map(|n| n.classes.contains(class))
            .unwrap_or(false)
    }

    pub fn classes(&self, id: NodeId) -> Vec<String> {
        self.nodes
            .get(&id)
            .map(|n| n.classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn attrs(&self, id: NodeId) -> Vec<(String, String)> {
        self.nodes
            .get(&id)
            .map(|n| {
                n.attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.text = Some(text.into());
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).and_then(|n| n.text.as_deref())
    }

    pub fn set_display(&mut self, id: NodeId, display: Display) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.display = display;
        }
    }

    pub fn display(&self, id: NodeId) -> Display {
        self.nodes
            .get(&id)
            .map(|n| n.display)
            .unwrap_or(Display::Default)
    }

    // ---- focus ------------------------------------------------------------

    pub fn active_element(&self) -> Option<NodeId> {
        self.focus
    }

    /// Moves focus to `id`. No-op when the node is detached or missing.
    pub fn focus(&mut self, id: NodeId) {
        if self.is_attached(id) {
            self.focus = Some(id);
        }
    }

    pub fn blur(&mut self) {
        self.focus = None;
    }

    pub fn focus_body(&mut self) {
        self.focus = Some(self.body);
    }

    // ---- listeners and dispatch -------------------------------------------

    pub fn add_listener(&mut self, node: NodeId, event: impl Into<String>) -> ListenerId {
        self.insert_listener(node, event.into(), None)
    }

    /// Like [`Self::add_listener`], but every delivered detail payload is
    /// retained until [`Self::drain_deliveries`] collects it. Used by
    /// consumers that poll rather than inspect dispatch records.
    pub fn add_queuing_listener(&mut self, node: NodeId, event: impl Into<String>) -> ListenerId {
        self.insert_listener(node, event.into(), Some(Vec::new()))
    }

    fn insert_listener(
        &mut self,
        node: NodeId,
        event: String,
        inbox: Option<Vec<Value>>,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .insert(id, ListenerBinding { node, event, inbox });
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(&id)
    }

    /// Takes the detail payloads queued for `id` since the last drain.
    /// Empty for marker listeners and unknown ids.
    pub fn drain_deliveries(&mut self, id: ListenerId) -> Vec<Value> {
        self.listeners
            .get_mut(&id)
            .and_then(|b| b.inbox.as_mut())
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Walks from `target` to the root collecting matching listener
    /// bindings in bubbling order, queueing the detail for queuing
    /// listeners along the way. A missing target yields an empty record
    /// rather than an error; the embedder interprets the deliveries.
    pub fn dispatch(&mut self, target: NodeId, event: &str, detail: Value) -> DispatchRecord {
        let mut deliveries = Vec::new();
        if self.nodes.contains_key(&target) {
            let mut current = Some(target);
            while let Some(node) = current {
                let mut hits: Vec<ListenerId> = self
                    .listeners
                    .iter()
                    .filter(|(_, b)| b.node == node && b.event == event)
                    .map(|(id, _)| *id)
                    .collect();
                hits.sort();
                deliveries.extend(hits.into_iter().map(|listener| Delivery { listener, node }));
                current = self.parent(node);
            }
        }
        for delivery in &deliveries {
            if let Some(inbox) = self
                .listeners
                .get_mut(&delivery.listener)
                .and_then(|b| b.inbox.as_mut())
            {
                inbox.push(detail.clone());
            }
        }
        DispatchRecord {
            event: event.to_string(),
            detail,
            deliveries,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent helper returned by [`Document::build_element`].
pub struct ElementBuilder<'a> {
    doc: &'a mut Document,
    node: NodeId,
}

impl<'a> ElementBuilder<'a> {
    pub fn dom_id(self, dom_id: impl Into<String>) -> Self {
        self.doc.set_dom_id(self.node, dom_id);
        self
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.doc.add_class(self.node, class);
        self
    }

    pub fn attr(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.doc.set_attr(self.node, name, value);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.doc.set_text(self.node, text);
        self
    }

    pub fn display(self, display: Display) -> Self {
        self.doc.set_display(self.node, display);
        self
    }

    pub fn child_of(self, parent: NodeId) -> ShellResult<NodeId> {
        self.doc.append_child(parent, self.node)?;
        Ok(self.node)
    }

    pub fn finish(self) -> NodeId {
        self.node
    }
}
