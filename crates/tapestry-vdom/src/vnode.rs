//! The intermediate node tree produced by a build pass.
//!
//! VNodes are host-independent, cheap, and disposable - a fresh tree is
//! built on every pass. Identity lives in the `sid`: a VNode with a sid set
//! represents the same logical entity across renders, and the reconciler and
//! text pool rely on sid equality (never structural or positional equality)
//! for reuse decisions.

use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::model::ModelValue;

/// Attribute names under which decorator identity is stamped onto a
/// decorator VNode. Stamping identity as attributes (not separate fields)
/// lets the reconciler pass it straight through to the host.
pub const ATTR_DECO_SID: &str = "data-deco-sid";
pub const ATTR_DECO_TYPE: &str = "data-deco-stype";
pub const ATTR_DECO_CATEGORY: &str = "data-deco-category";
pub const ATTR_DECO_POSITION: &str = "data-deco-position";
/// Diagnostic marker set on placeholder nodes produced when a decorator
/// template is missing or fails to build.
pub const ATTR_ERROR: &str = "data-tapestry-error";

/// What a VNode renders as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VNodeKind {
    /// A host element with a tag name.
    Element { tag: SmolStr },
    /// A text leaf; payload in [`VNode::text`].
    Text,
    /// A subtree mounted under an external host target instead of its
    /// structural parent. The placeholder kept in the structural position
    /// is reused across renders keyed by `portal_id`.
    Portal { portal_id: SmolStr },
    /// Wrapper produced for a decorated text run.
    Decorator,
}

/// An attribute value: string, boolean, or a nested style map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Str(SmolStr),
    Bool(bool),
    Style(BTreeMap<SmolStr, SmolStr>),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(SmolStr::new(s))
    }
}

impl From<SmolStr> for AttrValue {
    fn from(s: SmolStr) -> Self {
        AttrValue::Str(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// Marker recording which named template produced a node, plus the props
/// passed to it. Drives update diffing and the mount/update/unmount
/// notifications sent to the external component system.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentIdentity {
    pub name: SmolStr,
    pub props: ModelValue,
    /// Raw model, carried verbatim for external components whose rendering
    /// is delegated to their own lifecycle.
    pub model: Option<ModelValue>,
}

/// An intermediate, host-independent tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct VNode {
    pub kind: VNodeKind,
    /// Stable identity. Must be unique among siblings when present.
    pub sid: Option<SmolStr>,
    pub attrs: BTreeMap<SmolStr, AttrValue>,
    pub children: Vec<VNode>,
    /// Literal payload for text nodes.
    pub text: Option<String>,
    pub component: Option<ComponentIdentity>,
}

impl VNode {
    pub fn element(tag: impl Into<SmolStr>) -> Self {
        Self {
            kind: VNodeKind::Element { tag: tag.into() },
            sid: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            text: None,
            component: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: VNodeKind::Text,
            sid: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            text: Some(text.into()),
            component: None,
        }
    }

    pub fn portal(portal_id: impl Into<SmolStr>) -> Self {
        Self {
            kind: VNodeKind::Portal {
                portal_id: portal_id.into(),
            },
            sid: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            text: None,
            component: None,
        }
    }

    pub fn decorator_wrapper() -> Self {
        Self {
            kind: VNodeKind::Decorator,
            sid: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            text: None,
            component: None,
        }
    }

    pub fn with_sid(mut self, sid: impl Into<SmolStr>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<SmolStr>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        self.children.push(child);
        self
    }

    /// True for nodes with a tag - the only nodes decorators may nest into.
    pub fn is_element(&self) -> bool {
        matches!(self.kind, VNodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, VNodeKind::Text)
    }

    /// True when this node was produced by the decorator processor, either
    /// as a wrapper or as a built/placeholder decorator element.
    pub fn is_decorator(&self) -> bool {
        matches!(self.kind, VNodeKind::Decorator) || self.attrs.contains_key(ATTR_DECO_SID)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(AttrValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn set_attr(&mut self, name: impl Into<SmolStr>, value: impl Into<AttrValue>) {
        self.attrs.insert(name.into(), value.into());
    }
}
