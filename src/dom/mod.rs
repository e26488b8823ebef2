//! Retained element tree backing the shell.
//!
//! Downstream code imports document types from here while the implementation
//! details live in the private `core` and `snapshot` modules. The arena is
//! deliberately small: elements, comment placeholders, classes, attributes,
//! a display flag, focus tracking, and listener bindings. That is everything
//! the responsive shell needs to move real subtrees around without cloning
//! them.

mod core;
mod snapshot;

pub use core::{
    Delivery, DispatchRecord, Display, Document, ElementBuilder, ListenerId, NodeId, NodeKind,
};
pub use snapshot::{SnapshotSettings, SnapshotWriter};

/// Ownership-plumbing handle for the document; locks are taken per
/// operation, never across caller callbacks.
pub type SharedDocument = std::sync::Arc<std::sync::Mutex<Document>>;

/// Wraps a document for use by a shell runtime and its drivers.
pub fn shared_document(doc: Document) -> SharedDocument {
    std::sync::Arc::new(std::sync::Mutex::new(doc))
}
