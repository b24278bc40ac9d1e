//! Sid-keyed reconciliation of a VNode tree against a live host tree.
//!
//! The reconciler keeps a mounted mirror of what it last synced: per node
//! the host handle, key, applied attributes, and component identity. Each
//! pass matches new children to mounted children by key - never by
//! position - then patches in place, moves what shifted, mounts what is
//! new, and removes what disappeared. A pass over an unchanged tree
//! performs zero host mutations.
//!
//! All text content flows through the [`TextNodePool`], which is what keeps
//! a leaf handle stable for a given sid across passes.

use std::collections::HashMap;

use smol_str::{SmolStr, format_smolstr};

use crate::host::{HostTree, LifecycleSink, SelectionHint};
use crate::pool::{CleanupOptions, CleanupReport, TextNodePool};
use crate::vnode::{ATTR_DECO_SID, AttrValue, ComponentIdentity, VNode, VNodeKind};

/// Identity of a child within its sibling list.
///
/// Sids dominate; decorator output is keyed by its stamped decorator sid
/// (with an occurrence index, since one inline decorator can cover several
/// runs); portals by portal id; everything else by kind plus occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Sid(SmolStr),
    Deco(SmolStr, usize),
    Portal(SmolStr),
    AnonElement(SmolStr, usize),
    AnonText(usize),
    AnonDecorator(usize),
}

/// One node of the mounted mirror.
#[derive(Debug)]
struct Mounted<Id> {
    key: NodeKey,
    /// Host handle. For portals this is the structural placeholder; the
    /// content lives under `portal`.
    host: Id,
    tag: Option<SmolStr>,
    is_text: bool,
    /// Sid used for pool operations when this is a text leaf.
    pool_sid: Option<SmolStr>,
    sid: Option<SmolStr>,
    attrs: std::collections::BTreeMap<SmolStr, AttrValue>,
    component: Option<ComponentIdentity>,
    portal: Option<PortalMount<Id>>,
    children: Vec<Mounted<Id>>,
}

#[derive(Debug)]
struct PortalMount<Id> {
    target: Id,
    children: Vec<Mounted<Id>>,
}

/// Reconciles successive VNode trees into one host subtree.
///
/// Holds the retained state of the sync: the mounted mirror, the text
/// pool, and the portal placeholder cache. Construct one per render root
/// and feed it a fresh tree per pass.
pub struct Reconciler<H: HostTree> {
    root_host: H::NodeId,
    pool: TextNodePool<H::NodeId>,
    roots: Vec<Mounted<H::NodeId>>,
    /// Placeholders survive portal removal so a portal that comes back
    /// gets its old structural node again.
    portal_placeholders: HashMap<SmolStr, H::NodeId>,
}

impl<H: HostTree> Reconciler<H> {
    pub fn new(root_host: H::NodeId) -> Self {
        Self {
            root_host,
            pool: TextNodePool::new(),
            roots: Vec::new(),
            portal_placeholders: HashMap::new(),
        }
    }

    pub fn pool(&self) -> &TextNodePool<H::NodeId> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut TextNodePool<H::NodeId> {
        &mut self.pool
    }

    /// Run a pool cleanup pass. The caller decides when; reconcile passes
    /// never evict on their own.
    pub fn cleanup_pool(&mut self, options: &CleanupOptions<H::NodeId>) -> CleanupReport {
        self.pool.cleanup(options)
    }

    /// Sync the host subtree under the render root to match `vnode`.
    pub fn reconcile<S: LifecycleSink>(
        &mut self,
        vnode: &VNode,
        host: &mut H,
        sink: &mut S,
        selection: Option<SelectionHint<H::NodeId>>,
    ) {
        tracing::debug!(
            target: "tapestry::reconcile",
            root_sid = vnode.sid.as_deref().unwrap_or(""),
            "reconcile pass"
        );
        let mut roots = std::mem::take(&mut self.roots);
        let root_host = self.root_host;
        self.sync_children(
            host,
            sink,
            root_host,
            "",
            &mut roots,
            std::slice::from_ref(vnode),
            selection,
        );
        self.roots = roots;
    }

    /// Sync one mounted child list against the new sibling list.
    #[allow(clippy::too_many_arguments)]
    fn sync_children<S: LifecycleSink>(
        &mut self,
        host: &mut H,
        sink: &mut S,
        parent_host: H::NodeId,
        parent_scope: &str,
        mounted: &mut Vec<Mounted<H::NodeId>>,
        vnodes: &[VNode],
        selection: Option<SelectionHint<H::NodeId>>,
    ) {
        let keys = child_keys(vnodes);

        // Index the old children by key. A duplicate sid among siblings
        // would collide here; the later child falls through to a fresh
        // mount, which is the sane degradation.
        let order: Vec<NodeKey> = mounted.iter().map(|m| m.key.clone()).collect();
        let mut old: HashMap<NodeKey, Mounted<H::NodeId>> =
            mounted.drain(..).map(|m| (m.key.clone(), m)).collect();

        // Remove children whose key has no successor.
        let mut current: Vec<NodeKey> = Vec::with_capacity(order.len());
        for key in order {
            if keys.contains(&key) {
                current.push(key);
            } else if let Some(node) = old.remove(&key) {
                Self::remove_node(host, sink, parent_host, node);
            }
        }

        // Patch, move, and mount in new order. `current` simulates the
        // host child list so moves are only issued when a node is actually
        // out of place.
        let mut new_mounted = Vec::with_capacity(vnodes.len());
        for (index, (vnode, key)) in vnodes.iter().zip(keys.iter()).enumerate() {
            let in_place = current.get(index) == Some(key);
            match old.remove(key) {
                Some(mut node) if Self::compatible(&node, vnode) => {
                    if !in_place {
                        host.insert_child(parent_host, node.host, index);
                        current.retain(|k| k != key);
                        current.insert(index.min(current.len()), key.clone());
                    }
                    self.patch_node(
                        host,
                        sink,
                        parent_host,
                        index,
                        &mut node,
                        vnode,
                        parent_scope,
                        selection,
                    );
                    new_mounted.push(node);
                }
                existing => {
                    // Incompatible successor (tag or kind changed under
                    // the same key) is torn down and rebuilt.
                    if let Some(node) = existing {
                        Self::remove_node(host, sink, parent_host, node);
                        current.retain(|k| k != key);
                    }
                    let node = self.mount_node(
                        host,
                        sink,
                        vnode,
                        key.clone(),
                        parent_scope,
                        selection,
                    );
                    host.insert_child(parent_host, node.host, index);
                    current.insert(index.min(current.len()), key.clone());
                    new_mounted.push(node);
                }
            }
        }

        // Whatever is left in `old` was shadowed by a key collision.
        for (_, node) in old {
            Self::remove_node(host, sink, parent_host, node);
        }

        *mounted = new_mounted;
    }

    /// Can this mounted node be patched into the new vnode, or does it
    /// have to be replaced?
    fn compatible(node: &Mounted<H::NodeId>, vnode: &VNode) -> bool {
        match &vnode.kind {
            VNodeKind::Text => node.is_text,
            VNodeKind::Element { tag } => node.tag.as_ref() == Some(tag),
            VNodeKind::Portal { .. } => node.portal.is_some(),
            VNodeKind::Decorator => !node.is_text && node.portal.is_none(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn patch_node<S: LifecycleSink>(
        &mut self,
        host: &mut H,
        sink: &mut S,
        parent_host: H::NodeId,
        index: usize,
        node: &mut Mounted<H::NodeId>,
        vnode: &VNode,
        parent_scope: &str,
        selection: Option<SelectionHint<H::NodeId>>,
    ) {
        if node.is_text {
            let pool_sid = node
                .pool_sid
                .clone()
                .unwrap_or_else(|| format_smolstr!("{parent_scope}#t{index}"));
            let desired = vnode.text.as_deref().unwrap_or("");
            let (leaf, _) =
                self.pool
                    .add_or_reuse(&pool_sid, desired, selection.map(|s| s.leaf), host);
            if leaf != node.host {
                // Selection bias picked a different candidate; swap it in.
                host.remove_child(parent_host, node.host);
                host.insert_child(parent_host, leaf, index);
                node.host = leaf;
            }
            return;
        }

        // Attribute diff, both directions.
        for (name, value) in &vnode.attrs {
            if node.attrs.get(name) != Some(value) {
                host.set_attribute(node.host, name, value);
            }
        }
        let stale: Vec<SmolStr> = node
            .attrs
            .keys()
            .filter(|name| !vnode.attrs.contains_key(*name))
            .cloned()
            .collect();
        for name in &stale {
            host.remove_attribute(node.host, name);
        }
        node.attrs = vnode.attrs.clone();

        // Component lifecycle transitions.
        match (&node.component, &vnode.component) {
            (Some(old), Some(new)) if old.name != new.name => {
                sink.unmounted(node.sid.as_deref().unwrap_or(""), &old.name);
                sink.mounted(
                    vnode.sid.as_deref().unwrap_or(""),
                    &new.name,
                    &new.props,
                );
            }
            (Some(old), Some(new)) => {
                if old != new {
                    sink.updated(
                        vnode.sid.as_deref().unwrap_or(""),
                        &new.name,
                        &new.props,
                    );
                }
            }
            (Some(old), None) => {
                sink.unmounted(node.sid.as_deref().unwrap_or(""), &old.name);
            }
            (None, Some(new)) => {
                sink.mounted(vnode.sid.as_deref().unwrap_or(""), &new.name, &new.props);
            }
            (None, None) => {}
        }
        node.component = vnode.component.clone();
        node.sid = vnode.sid.clone();

        let scope = scope_for(parent_scope, &node.key);
        if let VNodeKind::Portal { portal_id } = &vnode.kind {
            self.sync_portal(host, sink, node, vnode, portal_id, &scope, selection);
        } else {
            let mut children = std::mem::take(&mut node.children);
            self.sync_children(
                host,
                sink,
                node.host,
                &scope,
                &mut children,
                &vnode.children,
                selection,
            );
            node.children = children;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn sync_portal<S: LifecycleSink>(
        &mut self,
        host: &mut H,
        sink: &mut S,
        node: &mut Mounted<H::NodeId>,
        vnode: &VNode,
        portal_id: &str,
        scope: &str,
        selection: Option<SelectionHint<H::NodeId>>,
    ) {
        let Some(target) = host.portal_target(portal_id) else {
            // Unresolvable this pass: leave whatever is mounted alone.
            tracing::warn!(
                target: "tapestry::reconcile",
                portal_id,
                "portal target unresolved, skipping subtree"
            );
            return;
        };

        let mut portal = node.portal.take().unwrap_or(PortalMount {
            target,
            children: Vec::new(),
        });
        if portal.target != target {
            // Target handle changed between passes; tear down and remount.
            let children = std::mem::take(&mut portal.children);
            for child in children {
                Self::remove_node(host, sink, portal.target, child);
            }
            portal.target = target;
        }
        let mut children = std::mem::take(&mut portal.children);
        self.sync_children(
            host,
            sink,
            target,
            scope,
            &mut children,
            &vnode.children,
            selection,
        );
        portal.children = children;
        node.portal = Some(portal);
    }

    /// Mount a fresh subtree. The caller inserts the returned node's host
    /// handle at its sibling position.
    fn mount_node<S: LifecycleSink>(
        &mut self,
        host: &mut H,
        sink: &mut S,
        vnode: &VNode,
        key: NodeKey,
        parent_scope: &str,
        selection: Option<SelectionHint<H::NodeId>>,
    ) -> Mounted<H::NodeId> {
        match &vnode.kind {
            VNodeKind::Text => {
                let pool_sid = match (&vnode.sid, &key) {
                    (Some(sid), _) => sid.clone(),
                    (None, NodeKey::AnonText(n)) => format_smolstr!("{parent_scope}#t{n}"),
                    (None, _) => format_smolstr!("{parent_scope}#t"),
                };
                let desired = vnode.text.as_deref().unwrap_or("");
                let (leaf, _) =
                    self.pool
                        .add_or_reuse(&pool_sid, desired, selection.map(|s| s.leaf), host);
                Mounted {
                    key,
                    host: leaf,
                    tag: None,
                    is_text: true,
                    pool_sid: Some(pool_sid),
                    sid: vnode.sid.clone(),
                    attrs: Default::default(),
                    component: None,
                    portal: None,
                    children: Vec::new(),
                }
            }
            VNodeKind::Portal { portal_id } => {
                let placeholder = match self.portal_placeholders.get(portal_id.as_str()) {
                    Some(&cached) => cached,
                    None => {
                        let created = host.create_element("span");
                        host.set_attribute(
                            created,
                            "data-portal",
                            &AttrValue::Str(portal_id.clone()),
                        );
                        self.portal_placeholders.insert(portal_id.clone(), created);
                        created
                    }
                };

                let mut node = Mounted {
                    key,
                    host: placeholder,
                    tag: Some(SmolStr::new("span")),
                    is_text: false,
                    pool_sid: None,
                    sid: vnode.sid.clone(),
                    attrs: Default::default(),
                    component: vnode.component.clone(),
                    portal: None,
                    children: Vec::new(),
                };
                let scope = scope_for(parent_scope, &node.key);
                if let Some(target) = host.portal_target(portal_id) {
                    let mut children = Vec::new();
                    self.sync_children(
                        host,
                        sink,
                        target,
                        &scope,
                        &mut children,
                        &vnode.children,
                        selection,
                    );
                    node.portal = Some(PortalMount { target, children });
                } else {
                    tracing::warn!(
                        target: "tapestry::reconcile",
                        portal_id = portal_id.as_str(),
                        "portal target unresolved at mount"
                    );
                    node.portal = Some(PortalMount {
                        target: placeholder,
                        children: Vec::new(),
                    });
                }
                node
            }
            kind => {
                let tag = match kind {
                    VNodeKind::Element { tag } => tag.clone(),
                    // Decorator wrappers materialize as spans carrying the
                    // stamped identity attributes.
                    _ => SmolStr::new("span"),
                };
                let id = host.create_element(&tag);
                for (name, value) in &vnode.attrs {
                    host.set_attribute(id, name, value);
                }
                let mut node = Mounted {
                    key,
                    host: id,
                    tag: Some(tag),
                    is_text: false,
                    pool_sid: None,
                    sid: vnode.sid.clone(),
                    attrs: vnode.attrs.clone(),
                    component: vnode.component.clone(),
                    portal: None,
                    children: Vec::new(),
                };
                let scope = scope_for(parent_scope, &node.key);
                let mut children = Vec::new();
                self.sync_children(
                    host,
                    sink,
                    id,
                    &scope,
                    &mut children,
                    &vnode.children,
                    selection,
                );
                node.children = children;

                if let Some(identity) = &node.component {
                    sink.mounted(
                        node.sid.as_deref().unwrap_or(""),
                        &identity.name,
                        &identity.props,
                    );
                }
                node
            }
        }
    }

    /// Detach a mounted subtree from the host and send unmount
    /// notifications top-down. Text leaves stay pooled; portal
    /// placeholders stay cached.
    fn remove_node<S: LifecycleSink>(
        host: &mut H,
        sink: &mut S,
        parent_host: H::NodeId,
        node: Mounted<H::NodeId>,
    ) {
        host.remove_child(parent_host, node.host);
        if let Some(portal) = &node.portal {
            let target = portal.target;
            // Portal content does not live under the placeholder; detach
            // each child from the target explicitly.
            for child in &portal.children {
                host.remove_child(target, child.host);
            }
        }
        Self::notify_unmounted(sink, &node);
    }

    fn notify_unmounted<S: LifecycleSink>(sink: &mut S, node: &Mounted<H::NodeId>) {
        if let Some(identity) = &node.component {
            sink.unmounted(node.sid.as_deref().unwrap_or(""), &identity.name);
        }
        for child in &node.children {
            Self::notify_unmounted(sink, child);
        }
        if let Some(portal) = &node.portal {
            for child in &portal.children {
                Self::notify_unmounted(sink, child);
            }
        }
    }
}

/// Scope string for pool keys of anonymous text under a node. Sids reset
/// the scope; synthetic segments extend it deterministically.
fn scope_for(parent: &str, key: &NodeKey) -> SmolStr {
    match key {
        NodeKey::Sid(sid) => sid.clone(),
        NodeKey::Deco(sid, n) => format_smolstr!("{parent}@{sid}.{n}"),
        NodeKey::Portal(id) => format_smolstr!("{parent}!{id}"),
        NodeKey::AnonElement(tag, n) => format_smolstr!("{parent}/{tag}{n}"),
        NodeKey::AnonText(n) => format_smolstr!("{parent}/t{n}"),
        NodeKey::AnonDecorator(n) => format_smolstr!("{parent}/d{n}"),
    }
}

/// Keys for a sibling list, with occurrence counters for everything that
/// lacks its own identity.
fn child_keys(vnodes: &[VNode]) -> Vec<NodeKey> {
    let mut deco_seen: HashMap<SmolStr, usize> = HashMap::new();
    let mut tag_seen: HashMap<SmolStr, usize> = HashMap::new();
    let mut text_seen = 0usize;
    let mut deco_anon_seen = 0usize;

    vnodes
        .iter()
        .map(|vnode| {
            if let Some(sid) = &vnode.sid {
                return NodeKey::Sid(sid.clone());
            }
            if let Some(deco_sid) = vnode.attr_str(ATTR_DECO_SID) {
                let seen = deco_seen.entry(SmolStr::new(deco_sid)).or_insert(0);
                let key = NodeKey::Deco(SmolStr::new(deco_sid), *seen);
                *seen += 1;
                return key;
            }
            match &vnode.kind {
                VNodeKind::Portal { portal_id } => NodeKey::Portal(portal_id.clone()),
                VNodeKind::Text => {
                    let key = NodeKey::AnonText(text_seen);
                    text_seen += 1;
                    key
                }
                VNodeKind::Element { tag } => {
                    let seen = tag_seen.entry(tag.clone()).or_insert(0);
                    let key = NodeKey::AnonElement(tag.clone(), *seen);
                    *seen += 1;
                    key
                }
                VNodeKind::Decorator => {
                    let key = NodeKey::AnonDecorator(deco_anon_seen);
                    deco_anon_seen += 1;
                    key
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHost, RecordingSink};
    use crate::model::ModelValue;

    fn paragraph(sid: &str, texts: &[(&str, &str)]) -> VNode {
        let mut p = VNode::element("p").with_sid(sid);
        for (tsid, text) in texts {
            let mut span = VNode::element("span").with_sid(*tsid);
            span.children.push(VNode::text(*text).with_sid(*tsid));
            p.children.push(span);
        }
        p
    }

    fn setup() -> (MemoryHost, usize) {
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        (host, root)
    }

    #[test]
    fn test_mount_then_noop_pass() {
        let (mut host, root) = setup();
        let mut rec = Reconciler::new(root);
        let tree = paragraph("p1", &[("t1", "Hello"), ("t2", "World")]);

        rec.reconcile(&tree, &mut host, &mut (), None);
        let p = host.children(root)[0];
        assert_eq!(host.tag(p), Some("p"));
        assert_eq!(host.text_content(p), "HelloWorld");
        assert!(!host.take_ops().is_empty());

        // Identical tree: zero host mutations.
        rec.reconcile(&tree, &mut host, &mut (), None);
        assert!(host.take_ops().is_empty());
    }

    #[test]
    fn test_text_update_keeps_leaf_identity() {
        let (mut host, root) = setup();
        let mut rec = Reconciler::new(root);

        rec.reconcile(&paragraph("p1", &[("t1", "Hello")]), &mut host, &mut (), None);
        let span = host.children(host.children(root)[0])[0];
        let leaf = host.children(span)[0];
        host.take_ops();

        rec.reconcile(&paragraph("p1", &[("t1", "Hello!")]), &mut host, &mut (), None);
        assert_eq!(host.children(span), &[leaf], "leaf node must be reused");
        assert_eq!(host.text(leaf), Some("Hello!"));
        let ops = host.take_ops();
        assert_eq!(ops, vec![format!("set_text #{leaf} \"Hello!\"")]);
    }

    #[test]
    fn test_reorder_moves_not_recreates() {
        let (mut host, root) = setup();
        let mut rec = Reconciler::new(root);

        rec.reconcile(
            &paragraph("p1", &[("t1", "A"), ("t2", "B"), ("t3", "C")]),
            &mut host,
            &mut (),
            None,
        );
        let p = host.children(root)[0];
        let before: Vec<usize> = host.children(p).to_vec();
        host.take_ops();

        rec.reconcile(
            &paragraph("p1", &[("t3", "C"), ("t1", "A"), ("t2", "B")]),
            &mut host,
            &mut (),
            None,
        );
        let after: Vec<usize> = host.children(p).to_vec();
        assert_eq!(after, vec![before[2], before[0], before[1]]);

        let ops = host.take_ops();
        assert!(ops.iter().all(|op| op.starts_with("insert_child")), "{ops:?}");
        assert_eq!(ops.len(), 1, "single move suffices: {ops:?}");
    }

    #[test]
    fn test_attr_diff_is_minimal() {
        let (mut host, root) = setup();
        let mut rec = Reconciler::new(root);

        let tree = VNode::element("p")
            .with_sid("p1")
            .with_attr("class", "a")
            .with_attr("lang", "en");
        rec.reconcile(&tree, &mut host, &mut (), None);
        let p = host.children(root)[0];
        host.take_ops();

        let tree = VNode::element("p")
            .with_sid("p1")
            .with_attr("class", "b")
            .with_attr("title", "x");
        rec.reconcile(&tree, &mut host, &mut (), None);

        let mut ops = host.take_ops();
        ops.sort();
        assert_eq!(
            ops,
            vec![
                format!("remove_attribute #{p} lang"),
                format!("set_attribute #{p} class"),
                format!("set_attribute #{p} title"),
            ]
        );
    }

    #[test]
    fn test_tag_change_replaces_node() {
        let (mut host, root) = setup();
        let mut rec = Reconciler::new(root);

        rec.reconcile(&VNode::element("p").with_sid("p1"), &mut host, &mut (), None);
        let old = host.children(root)[0];

        rec.reconcile(&VNode::element("h1").with_sid("p1"), &mut host, &mut (), None);
        let new = host.children(root)[0];
        assert_ne!(old, new);
        assert_eq!(host.tag(new), Some("h1"));
        assert_eq!(host.children(root).len(), 1);
    }

    #[test]
    fn test_removed_leaf_stays_pooled_and_comes_back() {
        let (mut host, root) = setup();
        let mut rec = Reconciler::new(root);

        rec.reconcile(
            &paragraph("p1", &[("t1", "Hello"), ("t2", "World")]),
            &mut host,
            &mut (),
            None,
        );
        let p = host.children(root)[0];
        let span2 = host.children(p)[1];
        let leaf2 = host.children(span2)[0];

        rec.reconcile(&paragraph("p1", &[("t1", "Hello")]), &mut host, &mut (), None);
        assert_eq!(host.children(p).len(), 1);
        // Pool still owns the dropped leaf under its sid.
        assert_eq!(rec.pool().candidates("t2"), &[leaf2][..]);

        rec.reconcile(
            &paragraph("p1", &[("t1", "Hello"), ("t2", "World")]),
            &mut host,
            &mut (),
            None,
        );
        let span2_again = host.children(p)[1];
        assert_eq!(host.children(span2_again), &[leaf2][..], "same leaf reclaimed");
    }

    #[test]
    fn test_component_lifecycle_events() {
        let (mut host, root) = setup();
        let mut rec = Reconciler::new(root);
        let mut sink = RecordingSink::default();

        let with_props = |title: &str| {
            let mut vnode = VNode::element("div").with_sid("c1");
            vnode.component = Some(ComponentIdentity {
                name: SmolStr::new("card"),
                props: ModelValue::map([("title", ModelValue::str(title))]),
                model: None,
            });
            vnode
        };

        rec.reconcile(&with_props("a"), &mut host, &mut sink, None);
        // Unchanged props: no event.
        rec.reconcile(&with_props("a"), &mut host, &mut sink, None);
        rec.reconcile(&with_props("b"), &mut host, &mut sink, None);
        rec.reconcile(&VNode::element("p").with_sid("p9"), &mut host, &mut sink, None);

        assert_eq!(
            sink.events,
            vec!["mounted card c1", "updated card c1", "unmounted card c1"]
        );
    }

    #[test]
    fn test_portal_mounts_under_target_with_placeholder() {
        let (mut host, root) = setup();
        let overlay = host.create_root("div");
        host.set_portal_target("overlay", overlay);
        let mut rec = Reconciler::new(root);

        let tree = VNode::element("p").with_sid("p1").with_child(
            VNode::portal("overlay")
                .with_child(VNode::element("div").with_sid("tip").with_child(VNode::text("Tip"))),
        );
        rec.reconcile(&tree, &mut host, &mut (), None);

        let p = host.children(root)[0];
        // Placeholder sits in the structural position.
        let placeholder = host.children(p)[0];
        assert_eq!(
            host.attr(placeholder, "data-portal"),
            Some(&AttrValue::Str(SmolStr::new("overlay")))
        );
        // Content lives under the external target.
        assert_eq!(host.children(overlay).len(), 1);
        assert_eq!(host.text_content(overlay), "Tip");

        // Portal disappears: content removed, placeholder cached.
        rec.reconcile(&VNode::element("p").with_sid("p1"), &mut host, &mut (), None);
        assert!(host.children(overlay).is_empty());
        assert!(host.children(p).is_empty());

        // Portal returns: the same placeholder host node is reused.
        rec.reconcile(&tree, &mut host, &mut (), None);
        assert_eq!(host.children(p)[0], placeholder);
        assert_eq!(host.text_content(overlay), "Tip");
    }

    #[test]
    fn test_unresolved_portal_target_skips_subtree() {
        let (mut host, root) = setup();
        let mut rec = Reconciler::new(root);

        let tree = VNode::element("p").with_sid("p1").with_child(
            VNode::portal("missing").with_child(VNode::element("div").with_sid("tip")),
        );
        rec.reconcile(&tree, &mut host, &mut (), None);

        // Placeholder exists, content nowhere.
        let p = host.children(root)[0];
        assert_eq!(host.children(p).len(), 1);
        assert!(host.children(host.children(p)[0]).is_empty());
    }

    #[test]
    fn test_selection_hint_biases_text_reuse() {
        let (mut host, root) = setup();
        let mut rec = Reconciler::new(root);

        rec.reconcile(&paragraph("p1", &[("t1", "Hello")]), &mut host, &mut (), None);
        let span = host.children(host.children(root)[0])[0];
        let first = host.children(span)[0];

        // A second candidate registered for the same sid.
        let second = host.create_text("Hello");
        rec.pool_mut().register("t1", second);

        // Without a hint the first-registered candidate stays.
        rec.reconcile(&paragraph("p1", &[("t1", "Hello")]), &mut host, &mut (), None);
        assert_eq!(host.children(span), &[first][..]);

        // With a hint at the second candidate, it takes over the slot.
        rec.reconcile(
            &paragraph("p1", &[("t1", "Hello")]),
            &mut host,
            &mut (),
            Some(SelectionHint { leaf: second, offset: 3 }),
        );
        assert_eq!(host.children(span), &[second][..]);
    }
}
