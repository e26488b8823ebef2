//! Structural snapshot writer for diagnostics, tests, and the CLI driver.

use std::fmt::Write as _;
use std::io::Write;

use crate::error::ShellResult;

use super::core::{Display, Document, NodeId, NodeKind};

/// Snapshot formatting parameters.
#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    pub indent: usize,
    pub include_comments: bool,
    pub include_text: bool,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            indent: 2,
            include_comments: true,
            include_text: true,
        }
    }
}

/// Writes an indented outline of a subtree: tag, `#dom-id`, `.classes`,
/// `[attrs]`, and a `(display:none)` marker for hidden nodes.
pub struct SnapshotWriter {
    settings: SnapshotSettings,
}

impl SnapshotWriter {
    pub fn new(settings: SnapshotSettings) -> Self {
        Self { settings }
    }

    pub fn with_default() -> Self {
        Self::new(SnapshotSettings::default())
    }

    pub fn write(
        &self,
        writer: &mut impl Write,
        doc: &Document,
        root: NodeId,
    ) -> ShellResult<()> {
        let mut out = String::new();
        self.write_node(&mut out, doc, root, 0);
        writer.write_all(out.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn render(&self, doc: &Document, root: NodeId) -> String {
        let mut out = String::new();
        self.write_node(&mut out, doc, root, 0);
        out
    }

    fn write_node(&self, out: &mut String, doc: &Document, id: NodeId, depth: usize) {
        let Some(kind) = doc.kind(id) else {
            return;
        };
        let pad = " ".repeat(depth * self.settings.indent);
        match kind {
            NodeKind::Comment { text } => {
                if self.settings.include_comments {
                    let _ = writeln!(out, "{pad}<!-- {text} -->");
                }
            }
            NodeKind::Element { tag } => {
                let mut line = format!("{pad}{tag}");
                if let Some(dom_id) = doc.dom_id(id) {
                    let _ = write!(line, " #{dom_id}");
                }
                for class in doc.classes(id) {
                    let _ = write!(line, " .{class}");
                }
                for (name, value) in doc.attrs(id) {
                    let _ = write!(line, " [{name}={value:?}]");
                }
                if doc.display(id) == Display::None {
                    line.push_str(" (display:none)");
                }
                if self.settings.include_text {
                    if let Some(text) = doc.text(id) {
                        let _ = write!(line, " {text:?}");
                    }
                }
                let _ = writeln!(out, "{line}");
                for child in doc.children(id) {
                    self.write_node(out, doc, child, depth + 1);
                }
            }
        }
    }
}

impl Document {
    /// Default-settings outline of `root`, used by tests and drivers.
    pub fn snapshot(&self, root: NodeId) -> String {
        SnapshotWriter::with_default().render(self, root)
    }
}
