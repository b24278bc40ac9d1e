//! Template-driven VNode construction.
//!
//! A build pass is pure with respect to the model: the builder reads the
//! registry and the model and emits a fresh VNode tree, no host access and
//! no retained state. Decorator application runs as a second pass over the
//! finished tree so base templates never have to know decorators exist.

use crate::decorator::{Decorator, DecoratorProcessor};
use crate::error::{ComponentError, RenderError};
use crate::model::{split_props, ModelValue};
use crate::template::{
    AttrSource, BindingSource, ChildTemplate, Component, EachItem, ElementTemplate, Registry,
    Template,
};
use crate::vnode::{ATTR_ERROR, VNode};

/// Hard ceiling on template nesting. Recursive or pathologically deep
/// templates truncate with a diagnostic node instead of blowing the stack.
pub const MAX_BUILD_DEPTH: usize = 64;

/// Per-pass build state, threaded by value through every construction
/// function. There is no ambient flag to keep in sync; a nested build
/// carries a deeper context and the parent's is untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildContext {
    depth: usize,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn descend(&self) -> Self {
        Self {
            depth: self.depth + 1,
        }
    }
}

/// Builds VNode trees from registered templates.
///
/// Holds nothing but a registry reference; construct one wherever a render
/// pass happens.
pub struct VNodeBuilder<'r> {
    registry: &'r Registry,
}

impl<'r> VNodeBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Build the tree for a named template, then overlay the decorator set.
    ///
    /// The only fatal error is an unknown top-level template name; every
    /// failure below that point degrades to a diagnostic node.
    pub fn build(
        &self,
        template: &str,
        model: &ModelValue,
        decorators: &[Decorator],
    ) -> Result<VNode, RenderError> {
        tracing::debug!(
            target: "tapestry::build",
            template,
            decorators = decorators.len(),
            "building vnode tree"
        );
        let ctx = BuildContext::new();
        let mut vnode = self.build_named(template, model, &ctx)?;
        if !decorators.is_empty() {
            DecoratorProcessor::new(self.registry)
                .process_tree(self, &mut vnode, decorators, &ctx);
        }
        Ok(vnode)
    }

    /// Resolve a template name and build it, recovering from component
    /// failures with an error-tagged shell node.
    pub(crate) fn build_named(
        &self,
        name: &str,
        model: &ModelValue,
        ctx: &BuildContext,
    ) -> Result<VNode, RenderError> {
        let Some(component) = self.registry.component(name) else {
            return Err(RenderError::RendererNotFound(name.into()));
        };
        match self.try_build_component(component, name, model, ctx) {
            Ok(vnode) => Ok(vnode),
            Err(err) => {
                tracing::warn!(
                    target: "tapestry::build",
                    template = name,
                    error = %err,
                    "component failed, rendering error shell"
                );
                Ok(self.error_shell(name, model, &err))
            }
        }
    }

    /// Build a component without the shell fallback, so callers that want
    /// their own recovery (the decorator processor) see the failure.
    pub(crate) fn try_build_component(
        &self,
        component: &Component,
        name: &str,
        model: &ModelValue,
        ctx: &BuildContext,
    ) -> Result<VNode, ComponentError> {
        if ctx.depth >= MAX_BUILD_DEPTH {
            tracing::warn!(
                target: "tapestry::build",
                template = name,
                depth = ctx.depth,
                "build depth limit reached, truncating"
            );
            return Ok(depth_limit_node());
        }

        let props = merged_props(component, model);
        let mut vnode = match &component.template {
            Template::Element(template) => self.build_element(template, model, ctx),
            Template::Function(f) => {
                let rendered = f(&props, model, ctx)?;
                let mut vnode = self.build_element(&rendered, model, ctx);
                vnode.component = Some(crate::vnode::ComponentIdentity {
                    name: name.into(),
                    props,
                    model: None,
                });
                vnode
            }
            // External components own their rendering; we emit the mount
            // point and carry the full model for the lifecycle sink.
            Template::External => {
                let mut vnode = VNode::element(shell_tag(model));
                vnode.component = Some(crate::vnode::ComponentIdentity {
                    name: name.into(),
                    props,
                    model: Some(model.clone()),
                });
                vnode
            }
        };
        stamp_sid(&mut vnode, model);
        Ok(vnode)
    }

    /// Build an element template against a model.
    ///
    /// Infallible: every fallible child form either degrades (missing
    /// bindings render their default) or is skipped with a diagnostic.
    pub(crate) fn build_element(
        &self,
        template: &ElementTemplate,
        model: &ModelValue,
        ctx: &BuildContext,
    ) -> VNode {
        if ctx.depth >= MAX_BUILD_DEPTH {
            tracing::warn!(
                target: "tapestry::build",
                tag = %template.tag,
                depth = ctx.depth,
                "build depth limit reached, truncating"
            );
            return depth_limit_node();
        }

        let mut vnode = VNode::element(template.tag.clone());
        for binding in &template.attrs {
            let value = match &binding.source {
                AttrSource::Literal(v) => v.clone(),
                AttrSource::Derived(f) => f(model),
            };
            vnode.attrs.insert(binding.name.clone(), value);
        }
        for child in &template.children {
            self.build_child(child, model, ctx, &mut vnode.children);
        }
        vnode
    }

    fn build_child(
        &self,
        child: &ChildTemplate,
        model: &ModelValue,
        ctx: &BuildContext,
        out: &mut Vec<VNode>,
    ) {
        match child {
            ChildTemplate::Text(text) => out.push(VNode::text(text.clone())),
            ChildTemplate::Element(template) => {
                out.push(self.build_element(template, model, &ctx.descend()));
            }
            ChildTemplate::Binding { source, default } => {
                let value = match source {
                    BindingSource::Path(path) => model.lookup(path).cloned(),
                    BindingSource::Getter(f) => f(model),
                };
                let text = match value {
                    Some(v) if !v.is_null() => v.to_text(),
                    // Missing or null: the default, or empty so the child
                    // position stays stable.
                    _ => default.clone().unwrap_or_default(),
                };
                out.push(VNode::text(text));
            }
            ChildTemplate::Conditional {
                predicate,
                then_child,
                else_child,
            } => {
                if predicate(model) {
                    self.build_child(then_child, model, ctx, out);
                } else if let Some(else_child) = else_child {
                    self.build_child(else_child, model, ctx, out);
                }
            }
            ChildTemplate::Each { field, render } => {
                let items = match model.get(field) {
                    Some(ModelValue::List(items)) => items.as_slice(),
                    Some(other) if !other.is_null() => {
                        tracing::warn!(
                            target: "tapestry::build",
                            field = %field,
                            "each field is not a list, rendering nothing"
                        );
                        &[]
                    }
                    _ => &[],
                };
                for (index, item) in items.iter().enumerate() {
                    let mut vnode = match render(item, index) {
                        EachItem::Template(template) => {
                            self.build_element(&template, item, &ctx.descend())
                        }
                        EachItem::Scalar(text) => {
                            VNode::element("span").with_child(VNode::text(text))
                        }
                    };
                    stamp_sid(&mut vnode, item);
                    out.push(vnode);
                }
            }
            ChildTemplate::Slot { name } => {
                for entry in self.registry.slot(name) {
                    match self.build_named(entry, model, &ctx.descend()) {
                        Ok(vnode) => out.push(vnode),
                        Err(err) => {
                            tracing::warn!(
                                target: "tapestry::build",
                                slot = %name,
                                entry = %entry,
                                error = %err,
                                "skipping unresolvable slot entry"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Minimal identity-bearing node rendered when a component fails: the
    /// reconciler keeps the slot in the tree and the error is visible to
    /// inspection instead of silently dropping the node.
    fn error_shell(&self, name: &str, model: &ModelValue, err: &ComponentError) -> VNode {
        let mut vnode = VNode::element(shell_tag(model));
        vnode.set_attr(ATTR_ERROR, err.to_string().as_str());
        vnode.component = Some(crate::vnode::ComponentIdentity {
            name: name.into(),
            props: split_props(model),
            model: None,
        });
        stamp_sid(&mut vnode, model);
        vnode
    }
}

/// Shell tag for external and error-shell nodes: the model's `kind` when it
/// names one, `div` otherwise.
fn shell_tag(model: &ModelValue) -> &str {
    model
        .get("kind")
        .and_then(ModelValue::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("div")
}

fn depth_limit_node() -> VNode {
    VNode::element("div").with_attr(ATTR_ERROR, "depth-limit")
}

/// Carry the model's sid onto the node unless the template already set one.
fn stamp_sid(vnode: &mut VNode, model: &ModelValue) {
    if vnode.sid.is_none() {
        if let Some(sid) = model.sid() {
            vnode.sid = Some(sid.into());
        }
    }
}

/// Component defaults underneath the caller's props. The model itself is
/// never part of the merge.
fn merged_props(component: &Component, model: &ModelValue) -> ModelValue {
    let props = split_props(model);
    match &component.default_props {
        Some(ModelValue::Map(defaults)) => {
            let mut fields = defaults.clone();
            if let ModelValue::Map(overrides) = &props {
                for (key, value) in overrides {
                    fields.insert(key.clone(), value.clone());
                }
            }
            ModelValue::Map(fields)
        }
        _ => props,
    }
}
