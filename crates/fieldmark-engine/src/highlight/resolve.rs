//! Resolution of persisted descriptors back to live elements.
//!
//! A descriptor captured on an earlier render is matched against the current
//! document using the strategies below, in priority order. A miss is not an
//! error: the page may simply have changed.

use crate::dom::{Document, NodeId};
use crate::identify::{PATH_SEPARATOR, is_form_control, structural_path};
use fieldmark_common::protocol::FieldDescriptor;

/// Which strategy located the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Id,
    Name,
    LabelText,
    AriaLabel,
    StructuralPath,
}

/// Find the live element for `descriptor`.
///
/// Strategies (in priority order):
/// 1. `id` equal to the identifier
/// 2. `name` equal to the identifier
/// 3. `<label>` whose text equals the label → its `for` target, else its
///    first nested control
/// 4. `aria-label` equal to the label
/// 5. Generated structural path equal to the identifier
pub fn resolve(doc: &Document, descriptor: &FieldDescriptor) -> Option<(NodeId, Strategy)> {
    let identifier = descriptor.identifier.as_str();
    let label = descriptor.label.as_str();

    if !identifier.is_empty() {
        if let Some(el) = doc.element_by_id(identifier) {
            return Some((el, Strategy::Id));
        }
        if let Some(el) = doc.first_with_attribute("name", identifier) {
            return Some((el, Strategy::Name));
        }
    }

    if !label.is_empty() {
        if let Some(el) = find_by_label_text(doc, label) {
            return Some((el, Strategy::LabelText));
        }
        if let Some(el) = doc.first_with_attribute("aria-label", label) {
            return Some((el, Strategy::AriaLabel));
        }
    }

    if identifier.contains(PATH_SEPARATOR) {
        return find_by_structural_path(doc, identifier).map(|el| (el, Strategy::StructuralPath));
    }

    None
}

/// `<label for="x">Email</label>` or `<label>Email <input></label>`.
fn find_by_label_text(doc: &Document, text: &str) -> Option<NodeId> {
    let label = doc
        .elements_by_tag("label")
        .find(|&l| label_text_matches(doc, l, text))?;

    if let Some(for_id) = doc.non_empty_attribute(label, "for")
        && let Some(el) = doc.element_by_id(for_id)
    {
        return Some(el);
    }
    first_nested_control(doc, label)
}

/// Exact match on the trimmed label text, with or without the nested
/// control's own content.
fn label_text_matches(doc: &Document, label: NodeId, text: &str) -> bool {
    if doc.text_content(label).trim() == text {
        return true;
    }
    first_nested_control(doc, label)
        .is_some_and(|control| doc.text_content_excluding(label, control).trim() == text)
}

fn first_nested_control(doc: &Document, label: NodeId) -> Option<NodeId> {
    doc.descendants(label)
        .into_iter()
        .find(|&d| doc.tag(d).is_some_and(is_form_control))
}

fn find_by_structural_path(doc: &Document, path: &str) -> Option<NodeId> {
    // The last segment's tag bounds the search.
    let last = path.rsplit(PATH_SEPARATOR).next()?;
    let tag = last.split(['#', '.']).next()?;
    doc.elements_by_tag(tag)
        .find(|&el| structural_path(doc, el) == path)
}
