//! Runtime data model values and the props/model split.
//!
//! The model is the raw data a template renders from. Before any template
//! dispatch the builder derives a second, sanitized view of it, the props,
//! with the identity fields (`sid`, `stype`, `kind`) stripped. Props go to
//! component-style templates only; every tree-construction function and all
//! decorator matching reads the untouched model. The two views are never
//! merged.

use std::collections::HashMap;

use smol_str::SmolStr;

/// Model fields that identify a node rather than describe it.
///
/// These are stripped when deriving props so a component's own data surface
/// stays clean, while sid-based matching keeps working against the model.
pub const IDENTITY_FIELDS: [&str; 3] = ["sid", "stype", "kind"];

/// A runtime model value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModelValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<ModelValue>),
    Map(HashMap<SmolStr, ModelValue>),
}

impl ModelValue {
    /// Build a map value from key/value pairs.
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ModelValue)>,
        K: Into<SmolStr>,
    {
        ModelValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a string value.
    pub fn str(s: impl Into<String>) -> Self {
        ModelValue::Str(s.into())
    }

    /// Get a field of a map value. Non-maps and missing keys yield `None`.
    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        match self {
            ModelValue::Map(fields) => fields.get(key),
            _ => None,
        }
    }

    /// Look up a dot-separated path (`content.0.text`). List segments parse
    /// as indices. Missing fields resolve to `None`, never an error - the
    /// renderer has to stay usable against partially-loaded models.
    pub fn lookup(&self, path: &str) -> Option<&ModelValue> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                ModelValue::Map(fields) => fields.get(segment)?,
                ModelValue::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// The node's stable identity, when the model carries one.
    pub fn sid(&self) -> Option<&str> {
        match self.get("sid") {
            Some(ModelValue::Str(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ModelValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ModelValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ModelValue]> {
        match self {
            ModelValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            ModelValue::Null => false,
            ModelValue::Bool(b) => *b,
            ModelValue::Number(n) => *n != 0.0,
            ModelValue::Str(s) => !s.is_empty(),
            ModelValue::List(items) => !items.is_empty(),
            ModelValue::Map(fields) => !fields.is_empty(),
        }
    }

    /// Coerce to display text. Null renders as empty, not "null".
    pub fn to_text(&self) -> String {
        match self {
            ModelValue::Null => String::new(),
            ModelValue::Bool(b) => b.to_string(),
            ModelValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            ModelValue::Str(s) => s.clone(),
            ModelValue::List(_) | ModelValue::Map(_) => format!("{:?}", self),
        }
    }
}

/// Derive the sanitized props view of a model: a shallow copy with the
/// identity fields stripped. Non-map models have no props surface and yield
/// an empty map.
pub fn split_props(model: &ModelValue) -> ModelValue {
    match model {
        ModelValue::Map(fields) => ModelValue::Map(
            fields
                .iter()
                .filter(|(k, _)| !IDENTITY_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        _ => ModelValue::Map(HashMap::new()),
    }
}
