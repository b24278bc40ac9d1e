//! tapestry-vdom: declarative render core for structured documents.
//!
//! This crate provides:
//! - `VNodeBuilder` - template-driven construction of host-independent
//!   VNode trees from a data model
//! - `DecoratorProcessor` - overlay of block/layer/inline decorators,
//!   with text-run splitting at decorator boundaries
//! - `TextNodePool` - identity-preserving reuse of live text leaves, so
//!   selections anchored in them survive re-renders
//! - `Reconciler` - sid-keyed sync of a VNode tree into any `HostTree`
//!
//! The core is host-agnostic; `MemoryHost` ships as a headless reference
//! host and test double.

pub mod builder;
pub mod decorator;
pub mod error;
pub mod host;
pub mod model;
pub mod pool;
pub mod reconcile;
pub mod template;
pub mod vnode;

pub use builder::{BuildContext, MAX_BUILD_DEPTH, VNodeBuilder};
pub use decorator::{
    Categorized, Decorator, DecoratorCategory, DecoratorPosition, DecoratorProcessor,
    DecoratorTarget, TextRun, categorize, decorators_for_node, decorators_from_model,
    split_text_by_decorators,
};
pub use error::{ComponentError, RenderError};
pub use host::{HostTree, LifecycleSink, MemoryHost, RecordingSink, SelectionHint};
pub use model::{IDENTITY_FIELDS, ModelValue, split_props};
pub use pool::{CleanupOptions, CleanupReport, PoolOutcome, TextHost, TextNodePool};
pub use reconcile::Reconciler;
pub use smol_str::SmolStr;
pub use template::{
    AttrBinding, AttrSource, BindingSource, ChildTemplate, Component, ComponentFn, EachItem,
    ElementTemplate, Registry, Template,
};
pub use vnode::{AttrValue, ComponentIdentity, VNode, VNodeKind};
