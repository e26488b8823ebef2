//! Focus release ahead of hiding a column.
//!
//! Portaled floating UI (menus, dialogs) can hold focus in a subtree whose
//! document position is decoupled from its logical owner, so plain
//! containment is not enough: the active element may be linked to the
//! hidden column only through `aria-labelledby` or `aria-controls`.

use crate::dom::{Document, NodeId};

/// Releases document focus when the active element is inside `column` or
/// aria-linked to it. Release means blur plus moving focus to body.
/// Returns whether a release happened.
pub fn release_focus_within(doc: &mut Document, column: NodeId) -> bool {
    let Some(active) = doc.active_element() else {
        return false;
    };
    if active == doc.body() {
        return false;
    }
    if !should_release(doc, column, active) {
        return false;
    }
    doc.blur();
    doc.focus_body();
    true
}

fn should_release(doc: &Document, column: NodeId, active: NodeId) -> bool {
    if active == column || doc.contains(column, active) {
        return true;
    }
    if labelled_from_column(doc, column, active) {
        return true;
    }
    controlled_from_column(doc, column, active)
}

/// The active element names labels via `aria-labelledby`; a label living in
/// the hidden column links the two.
fn labelled_from_column(doc: &Document, column: NodeId, active: NodeId) -> bool {
    let Some(labelled_by) = doc.attr(active, "aria-labelledby") else {
        return false;
    };
    labelled_by
        .split_whitespace()
        .filter_map(|token| doc.element_by_dom_id(token))
        .any(|label| label == column || doc.contains(column, label))
}

/// Reverse lookup: some node in the column declares `aria-controls`
/// containing the active element's dom id. A linear attribute scan with
/// known false negatives for dynamically generated ids; kept as a
/// best-effort heuristic.
fn controlled_from_column(doc: &Document, column: NodeId, active: NodeId) -> bool {
    let Some(active_id) = doc.dom_id(active) else {
        return false;
    };
    doc.collect_attr_scan("aria-controls")
        .into_iter()
        .filter(|(owner, _)| *owner == column || doc.contains(column, *owner))
        .any(|(_, tokens)| tokens.split_whitespace().any(|token| token == active_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_focus_contained_in_column() {
        let mut doc = Document::new();
        let column = doc.create_element("div");
        let input = doc.create_element("input");
        doc.append_child(doc.body(), column).unwrap();
        doc.append_child(column, input).unwrap();
        doc.focus(input);

        assert!(release_focus_within(&mut doc, column));
        assert_eq!(doc.active_element(), Some(doc.body()));
    }

    #[test]
    fn releases_focus_labelled_from_column() {
        let mut doc = Document::new();
        let column = doc.create_element("div");
        doc.append_child(doc.body(), column).unwrap();
        let label = doc.build_element("span").dom_id("menu-label").finish();
        doc.append_child(column, label).unwrap();
        // The menu is portaled outside the column but labelled from it.
        let menu = doc
            .build_element("div")
            .attr("aria-labelledby", "menu-label")
            .finish();
        doc.append_child(doc.body(), menu).unwrap();
        doc.focus(menu);

        assert!(release_focus_within(&mut doc, column));
        assert_eq!(doc.active_element(), Some(doc.body()));
    }

    #[test]
    fn releases_focus_controlled_from_column() {
        let mut doc = Document::new();
        let column = doc.create_element("div");
        doc.append_child(doc.body(), column).unwrap();
        let trigger = doc
            .build_element("button")
            .attr("aria-controls", "popup other")
            .finish();
        doc.append_child(column, trigger).unwrap();
        let popup = doc.build_element("div").dom_id("popup").finish();
        doc.append_child(doc.body(), popup).unwrap();
        doc.focus(popup);

        assert!(release_focus_within(&mut doc, column));
        assert_eq!(doc.active_element(), Some(doc.body()));
    }

    #[test]
    fn leaves_unrelated_focus_alone() {
        let mut doc = Document::new();
        let column = doc.create_element("div");
        let elsewhere = doc.create_element("input");
        doc.append_child(doc.body(), column).unwrap();
        doc.append_child(doc.body(), elsewhere).unwrap();
        doc.focus(elsewhere);

        assert!(!release_focus_within(&mut doc, column));
        assert_eq!(doc.active_element(), Some(elsewhere));
    }

    #[test]
    fn no_release_without_active_element() {
        let mut doc = Document::new();
        let column = doc.create_element("div");
        doc.append_child(doc.body(), column).unwrap();
        assert!(!release_focus_within(&mut doc, column));
    }
}
