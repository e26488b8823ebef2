use thiserror::Error;

use crate::dom::NodeId;

/// Unified result type for the Astra shell crate.
pub type ShellResult<T> = std::result::Result<T, ShellError>;

/// Errors surfaced by shell construction and view callbacks.
///
/// Runtime entry points absorb these at the boundary; only constructors and
/// host-facing helpers propagate them.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("shell anchor `{0}` is missing from the document")]
    AnchorMissing(&'static str),
    #[error("node {0} is no longer part of the document")]
    MissingNode(NodeId),
    #[error("slot host for `{0}` is detached")]
    DetachedHost(String),
    #[error("view `{view}` callback failed: {message}")]
    ViewCallback { view: String, message: String },
    #[error("shell backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ShellError {
    /// Shorthand for failures raised inside view render/activate hooks.
    pub fn view_callback(view: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ViewCallback {
            view: view.into(),
            message: message.into(),
        }
    }
}
