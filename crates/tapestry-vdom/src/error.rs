//! Error types for the render core.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors that can surface from a build pass.
///
/// Almost everything that can go wrong during rendering degrades locally
/// (placeholder nodes, shell fallbacks, skipped decorators) rather than
/// failing the pass. The variants here are the exceptions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RenderError {
    /// No renderer or component is registered under this template name.
    /// Fatal for the `build` call that requested it.
    #[error("no renderer registered for template '{0}'")]
    RendererNotFound(SmolStr),
}

/// Error a function component can return to signal a failed render.
///
/// The builder recovers from this by falling back to the component-shell
/// path, so one malformed renderer cannot abort the whole tree.
#[derive(Error, Debug, Clone)]
#[error("component render failed: {0}")]
pub struct ComponentError(pub String);

impl ComponentError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
