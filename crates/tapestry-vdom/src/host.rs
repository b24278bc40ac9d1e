//! Host mutation primitives and the in-memory reference host.
//!
//! The render core never touches a live tree except through [`HostTree`].
//! A browser adapter, a test double, or the shipped [`MemoryHost`] all plug
//! in here; the reconciler stays host-agnostic.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use smol_str::SmolStr;

use crate::model::ModelValue;
use crate::pool::TextHost;
use crate::vnode::AttrValue;

/// The mutation surface of a live host tree.
///
/// `insert_child` has `insertBefore` semantics: inserting a node that is
/// already attached detaches it first, so the same call expresses both
/// insertion and movement. `index` addresses the child list after any such
/// detach.
pub trait HostTree {
    type NodeId: Copy + Eq + Hash + fmt::Debug;

    fn create_element(&mut self, tag: &str) -> Self::NodeId;
    fn create_text(&mut self, text: &str) -> Self::NodeId;
    fn set_text(&mut self, node: Self::NodeId, text: &str);
    fn set_attribute(&mut self, node: Self::NodeId, name: &str, value: &AttrValue);
    fn remove_attribute(&mut self, node: Self::NodeId, name: &str);
    fn insert_child(&mut self, parent: Self::NodeId, child: Self::NodeId, index: usize);
    fn remove_child(&mut self, parent: Self::NodeId, child: Self::NodeId);

    /// Resolve the externally-supplied mount target for a portal. `None`
    /// skips the portal's subtree for this pass.
    fn portal_target(&mut self, portal_id: &str) -> Option<Self::NodeId>;
}

impl<H: HostTree> TextHost<H::NodeId> for H {
    fn create_text_leaf(&mut self, text: &str) -> H::NodeId {
        self.create_text(text)
    }
    fn set_text_leaf(&mut self, leaf: H::NodeId, text: &str) {
        self.set_text(leaf, text)
    }
}

/// Receives component mount/update/unmount notifications, keyed by sid.
/// The core calls this; the external component manager implements it.
pub trait LifecycleSink {
    fn mounted(&mut self, sid: &str, component: &str, props: &ModelValue);
    fn updated(&mut self, sid: &str, component: &str, props: &ModelValue);
    fn unmounted(&mut self, sid: &str, component: &str);
}

/// No-op sink for hosts without a component system.
impl LifecycleSink for () {
    fn mounted(&mut self, _sid: &str, _component: &str, _props: &ModelValue) {}
    fn updated(&mut self, _sid: &str, _component: &str, _props: &ModelValue) {}
    fn unmounted(&mut self, _sid: &str, _component: &str) {}
}

/// Selection context passed into a reconcile call by the event-capture
/// layer. The core only uses `leaf` to bias text-pool reuse; restoring the
/// platform selection afterwards stays with the caller.
#[derive(Debug, Clone, Copy)]
pub struct SelectionHint<L> {
    pub leaf: L,
    pub offset: usize,
}

#[derive(Debug, Default)]
struct MemNode {
    tag: Option<SmolStr>,
    text: Option<String>,
    attrs: BTreeMap<SmolStr, AttrValue>,
    children: Vec<usize>,
    parent: Option<usize>,
}

/// In-memory host tree with an op log.
///
/// The log records every mutation the reconciler performs, which is what
/// lets tests assert the zero-mutation guarantees (an idempotent second
/// pass must leave the log empty). Also usable as a headless render target.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<MemNode>,
    ops: Vec<String>,
    portal_targets: HashMap<SmolStr, usize>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element to serve as a render root or portal
    /// target. Not logged; roots exist before the first pass.
    pub fn create_root(&mut self, tag: &str) -> usize {
        self.nodes.push(MemNode {
            tag: Some(SmolStr::new(tag)),
            ..Default::default()
        });
        self.nodes.len() - 1
    }

    /// Register an externally-supplied portal mount target.
    pub fn set_portal_target(&mut self, portal_id: impl Into<SmolStr>, node: usize) {
        self.portal_targets.insert(portal_id.into(), node);
    }

    /// Drain the mutation log.
    pub fn take_ops(&mut self) -> Vec<String> {
        std::mem::take(&mut self.ops)
    }

    pub fn tag(&self, node: usize) -> Option<&str> {
        self.nodes[node].tag.as_deref()
    }

    pub fn text(&self, node: usize) -> Option<&str> {
        self.nodes[node].text.as_deref()
    }

    pub fn attr(&self, node: usize, name: &str) -> Option<&AttrValue> {
        self.nodes[node].attrs.get(name)
    }

    pub fn children(&self, node: usize) -> &[usize] {
        &self.nodes[node].children
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        self.nodes[node].parent
    }

    /// Concatenated text content of a subtree, document order.
    pub fn text_content(&self, node: usize) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: usize, out: &mut String) {
        if let Some(text) = &self.nodes[node].text {
            out.push_str(text);
        }
        for &child in &self.nodes[node].children {
            self.collect_text(child, out);
        }
    }

    /// Depth-first search for the first descendant with a given attribute
    /// value. Convenient for locating decorator nodes in tests.
    pub fn find_by_attr(&self, root: usize, name: &str, value: &str) -> Option<usize> {
        if self.attr(root, name) == Some(&AttrValue::Str(SmolStr::new(value))) {
            return Some(root);
        }
        for &child in self.children(root) {
            if let Some(found) = self.find_by_attr(child, name, value) {
                return Some(found);
            }
        }
        None
    }

    fn detach(&mut self, child: usize) {
        if let Some(parent) = self.nodes[child].parent.take() {
            self.nodes[parent].children.retain(|&c| c != child);
        }
    }
}

impl HostTree for MemoryHost {
    type NodeId = usize;

    fn create_element(&mut self, tag: &str) -> usize {
        self.nodes.push(MemNode {
            tag: Some(SmolStr::new(tag)),
            ..Default::default()
        });
        let id = self.nodes.len() - 1;
        self.ops.push(format!("create_element {tag} #{id}"));
        id
    }

    fn create_text(&mut self, text: &str) -> usize {
        self.nodes.push(MemNode {
            text: Some(text.to_owned()),
            ..Default::default()
        });
        let id = self.nodes.len() - 1;
        self.ops.push(format!("create_text {text:?} #{id}"));
        id
    }

    fn set_text(&mut self, node: usize, text: &str) {
        self.nodes[node].text = Some(text.to_owned());
        self.ops.push(format!("set_text #{node} {text:?}"));
    }

    fn set_attribute(&mut self, node: usize, name: &str, value: &AttrValue) {
        self.nodes[node].attrs.insert(SmolStr::new(name), value.clone());
        self.ops.push(format!("set_attribute #{node} {name}"));
    }

    fn remove_attribute(&mut self, node: usize, name: &str) {
        self.nodes[node].attrs.remove(name);
        self.ops.push(format!("remove_attribute #{node} {name}"));
    }

    fn insert_child(&mut self, parent: usize, child: usize, index: usize) {
        self.detach(child);
        let index = index.min(self.nodes[parent].children.len());
        self.nodes[parent].children.insert(index, child);
        self.nodes[child].parent = Some(parent);
        self.ops.push(format!("insert_child #{parent} <- #{child} @{index}"));
    }

    fn remove_child(&mut self, parent: usize, child: usize) {
        self.nodes[parent].children.retain(|&c| c != child);
        if self.nodes[child].parent == Some(parent) {
            self.nodes[child].parent = None;
        }
        self.ops.push(format!("remove_child #{parent} -> #{child}"));
    }

    fn portal_target(&mut self, portal_id: &str) -> Option<usize> {
        self.portal_targets.get(portal_id).copied()
    }
}

/// Lifecycle sink that records every notification, for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<String>,
}

impl LifecycleSink for RecordingSink {
    fn mounted(&mut self, sid: &str, component: &str, _props: &ModelValue) {
        self.events.push(format!("mounted {component} {sid}"));
    }
    fn updated(&mut self, sid: &str, component: &str, _props: &ModelValue) {
        self.events.push(format!("updated {component} {sid}"));
    }
    fn unmounted(&mut self, sid: &str, component: &str) {
        self.events.push(format!("unmounted {component} {sid}"));
    }
}
