//! Registered templates and the registry the builder resolves them from.
//!
//! A template is a tagged union over the three renderer shapes the builder
//! understands - declarative element trees, function components, and
//! external adapters - so dispatch at the top of `build` is a single
//! exhaustive match. The registry is an explicit object constructed once per
//! process (or per test) and passed by reference into the builder and
//! decorator processor: one registry, many builders, no hidden global.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::builder::BuildContext;
use crate::error::ComponentError;
use crate::model::ModelValue;
use crate::vnode::AttrValue;

/// Closure deriving an attribute value from the model.
pub type AttrFn = Arc<dyn Fn(&ModelValue) -> AttrValue>;
/// Closure reading a bound value out of the model.
pub type GetterFn = Arc<dyn Fn(&ModelValue) -> Option<ModelValue>>;
/// Predicate over the model for conditional children.
pub type PredicateFn = Arc<dyn Fn(&ModelValue) -> bool>;
/// Per-item render callback for `each` children. Receives the item model
/// and its index.
pub type EachFn = Arc<dyn Fn(&ModelValue, usize) -> EachItem>;
/// A function component: `(props, model, context) -> ElementTemplate`,
/// fallible. Props are the sanitized view, the model is the raw data, and
/// the context is the build pass state - always three distinct arguments,
/// never a merged object.
pub type ComponentFn = Arc<
    dyn Fn(&ModelValue, &ModelValue, &BuildContext) -> Result<ElementTemplate, ComponentError>,
>;

/// What an `each` callback may produce per item.
pub enum EachItem {
    /// A full template, built as a nested element.
    Template(ElementTemplate),
    /// A scalar, auto-wrapped as a one-child text element.
    Scalar(String),
}

/// Source of an attribute's value.
#[derive(Clone)]
pub enum AttrSource {
    Literal(AttrValue),
    /// Derived by a pure function of the model.
    Derived(AttrFn),
}

/// One attribute binding on an element template.
#[derive(Clone)]
pub struct AttrBinding {
    pub name: SmolStr,
    pub source: AttrSource,
}

/// Where a data binding reads from.
#[derive(Clone)]
pub enum BindingSource {
    /// Dot-separated path into the model.
    Path(SmolStr),
    Getter(GetterFn),
}

/// A child position in an element template.
#[derive(Clone)]
pub enum ChildTemplate {
    /// Literal text fragment.
    Text(String),
    /// Nested element template.
    Element(Box<ElementTemplate>),
    /// Read the model, apply the default when the value is missing or null.
    Binding {
        source: BindingSource,
        default: Option<String>,
    },
    /// Evaluate the predicate on the model, pick then/else.
    Conditional {
        predicate: PredicateFn,
        then_child: Box<ChildTemplate>,
        else_child: Option<Box<ChildTemplate>>,
    },
    /// Iterate `model[field]`, invoking the render callback per item.
    Each { field: SmolStr, render: EachFn },
    /// Render the named slot's content list, each entry built through the
    /// top-level `build` entry point.
    Slot { name: SmolStr },
}

/// Static tag plus attribute bindings and children.
#[derive(Clone)]
pub struct ElementTemplate {
    pub tag: SmolStr,
    pub attrs: Vec<AttrBinding>,
    pub children: Vec<ChildTemplate>,
}

impl ElementTemplate {
    pub fn new(tag: impl Into<SmolStr>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<SmolStr>, value: impl Into<AttrValue>) -> Self {
        self.attrs.push(AttrBinding {
            name: name.into(),
            source: AttrSource::Literal(value.into()),
        });
        self
    }

    pub fn attr_derived(mut self, name: impl Into<SmolStr>, f: AttrFn) -> Self {
        self.attrs.push(AttrBinding {
            name: name.into(),
            source: AttrSource::Derived(f),
        });
        self
    }

    pub fn child(mut self, child: ChildTemplate) -> Self {
        self.children.push(child);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(ChildTemplate::Text(text.into()))
    }

    pub fn element(self, nested: ElementTemplate) -> Self {
        self.child(ChildTemplate::Element(Box::new(nested)))
    }

    pub fn binding(self, path: impl Into<SmolStr>, default: Option<&str>) -> Self {
        self.child(ChildTemplate::Binding {
            source: BindingSource::Path(path.into()),
            default: default.map(str::to_owned),
        })
    }
}

/// A registered renderer.
#[derive(Clone)]
pub enum Template {
    /// Declarative element tree.
    Element(ElementTemplate),
    /// Function component invoked with `(props, model)`.
    Function(ComponentFn),
    /// Adapter with mount/unmount but no declarative body; rendering is
    /// delegated to the external component system.
    External,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Element(t) => f.debug_tuple("Element").field(&t.tag).finish(),
            Template::Function(_) => f.write_str("Function(..)"),
            Template::External => f.write_str("External"),
        }
    }
}

/// A named component entry: template plus optional default props merged
/// under the caller-supplied ones.
#[derive(Clone, Debug)]
pub struct Component {
    pub template: Template,
    pub default_props: Option<ModelValue>,
}

/// The template/component registry.
///
/// Constructed explicitly and passed by reference into the builder and
/// decorator processor. All renderer lookups used by the core go through
/// [`Registry::component`]; decorators and named templates are always
/// component-shaped.
#[derive(Default)]
pub struct Registry {
    components: HashMap<SmolStr, Component>,
    slots: HashMap<SmolStr, Vec<SmolStr>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<SmolStr>, template: Template) {
        self.components.insert(
            name.into(),
            Component {
                template,
                default_props: None,
            },
        );
    }

    pub fn register_component(&mut self, name: impl Into<SmolStr>, component: Component) {
        self.components.insert(name.into(), component);
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Define a named slot's content list: template names rendered in order
    /// wherever a `ChildTemplate::Slot` references the slot.
    pub fn register_slot(
        &mut self,
        name: impl Into<SmolStr>,
        content: impl IntoIterator<Item = SmolStr>,
    ) {
        self.slots.insert(name.into(), content.into_iter().collect());
    }

    pub fn slot(&self, name: &str) -> &[SmolStr] {
        self.slots.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}
