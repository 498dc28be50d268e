//! Stable identity for form fields.
//!
//! `identify` turns a live element into a `FieldDescriptor` that can be
//! persisted and later resolved back to an element after the page reloads.

use crate::dom::{Document, NodeId};
use fieldmark_assets::classes;
use fieldmark_common::protocol::FieldDescriptor;

/// Separator between path segments of a generated identifier.
pub const PATH_SEPARATOR: &str = " > ";

/// Tags whose content is part of the control rather than its label.
const FORM_CONTROL_TAGS: &[&str] = &["input", "select", "textarea"];

/// Compute the descriptor of `element`. Pure; never mutates the document.
pub fn identify(doc: &Document, element: NodeId) -> FieldDescriptor {
    FieldDescriptor {
        label: field_label(doc, element),
        identifier: field_identifier(doc, element),
        field_type: field_type(doc, element),
    }
}

/// Label resolution, first non-empty source wins:
/// 1. `<label for="id">`
/// 2. Enclosing `<label>`, without the field's own content
/// 3. `aria-label`
/// 4. Elements referenced by `aria-labelledby`
pub fn field_label(doc: &Document, element: NodeId) -> String {
    if let Some(label) = label_by_for_attribute(doc, element) {
        return label;
    }
    if let Some(label) = enclosing_label(doc, element) {
        return label;
    }
    if let Some(label) = doc.attribute(element, "aria-label")
        && !label.trim().is_empty()
    {
        return label.to_string();
    }
    labelled_by(doc, element).unwrap_or_default()
}

fn label_by_for_attribute(doc: &Document, element: NodeId) -> Option<String> {
    let id = doc.non_empty_attribute(element, "id")?;
    let label = doc
        .elements_by_tag("label")
        .find(|&l| doc.attribute(l, "for") == Some(id))?;
    non_empty(doc.text_content(label))
}

fn enclosing_label(doc: &Document, element: NodeId) -> Option<String> {
    let start = doc.parent(element)?;
    let label = doc.closest(start, "label")?;
    non_empty(doc.text_content_excluding(label, element))
}

fn labelled_by(doc: &Document, element: NodeId) -> Option<String> {
    let ids = doc.attribute(element, "aria-labelledby")?;
    let parts: Vec<String> = ids
        .split_whitespace()
        .filter_map(|id| doc.element_by_id(id))
        .map(|node| doc.text_content(node).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    non_empty(parts.join(" "))
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `id`, else `name`, else the structural path from the root.
pub fn field_identifier(doc: &Document, element: NodeId) -> String {
    if let Some(id) = doc.non_empty_attribute(element, "id") {
        return id.to_string();
    }
    if let Some(name) = doc.non_empty_attribute(element, "name") {
        return name.to_string();
    }
    structural_path(doc, element)
}

/// `html > body > form.signup > div#row > input.wide`
///
/// Decoration classes are left out so highlighting an element never changes
/// its path.
pub fn structural_path(doc: &Document, element: NodeId) -> String {
    let mut segments = Vec::new();
    let mut current = Some(element);
    while let Some(node) = current {
        if let Some(tag) = doc.tag(node) {
            segments.push(path_segment(doc, node, tag));
        }
        current = doc.parent(node);
    }
    segments.reverse();
    segments.join(PATH_SEPARATOR)
}

fn path_segment(doc: &Document, node: NodeId, tag: &str) -> String {
    if let Some(id) = doc.non_empty_attribute(node, "id") {
        return format!("{}#{}", tag, id);
    }
    let kept: Vec<&str> = doc
        .class_list(node)
        .into_iter()
        .filter(|c| !classes::is_decoration(c))
        .collect();
    if kept.is_empty() {
        tag.to_string()
    } else {
        format!("{}.{}", tag, kept.join("."))
    }
}

/// Tag name plus the subtype the element reports as its `type`.
pub fn field_type(doc: &Document, element: NodeId) -> String {
    let tag = doc.tag(element).unwrap_or_default();
    match type_property(doc, element, tag) {
        Some(subtype) => format!("{}-{}", tag, subtype),
        None => tag.to_string(),
    }
}

fn type_property(doc: &Document, element: NodeId, tag: &str) -> Option<String> {
    let declared = doc
        .non_empty_attribute(element, "type")
        .map(|t| t.to_ascii_lowercase());
    match tag {
        "input" => Some(declared.unwrap_or_else(|| "text".to_string())),
        "button" => Some(declared.unwrap_or_else(|| "submit".to_string())),
        "select" if doc.attribute(element, "multiple").is_some() => {
            Some("select-multiple".to_string())
        }
        "select" => Some("select-one".to_string()),
        "textarea" => Some("textarea".to_string()),
        _ => None,
    }
}

/// Whether `tag` names a native form control.
pub fn is_form_control(tag: &str) -> bool {
    FORM_CONTROL_TAGS.contains(&tag)
}
