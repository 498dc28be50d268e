use crate::dom::{Document, NodeId};
use fieldmark_assets::classes;

/// What an affordance button does when activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffordanceAction {
    Capture,
    Ignore,
}

/// Capture/ignore controls attached in front of one candidate field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordance {
    pub field: NodeId,
    pub controls: NodeId,
    pub capture_button: NodeId,
    pub ignore_button: NodeId,
}

impl Affordance {
    /// Build the controls and insert them immediately before `field`.
    /// Returns `None` when the field has no parent to insert into.
    pub(super) fn attach(doc: &mut Document, field: NodeId) -> Option<Self> {
        let parent = doc.parent(field)?;

        let controls = doc.create_element("div");
        doc.add_class(controls, classes::CONTROLS);
        let capture_button = button(doc, controls, classes::CAPTURE_BUTTON, "Capture");
        let ignore_button = button(doc, controls, classes::IGNORE_BUTTON, "Ignore");

        if !doc.insert_before(parent, controls, field) {
            return None;
        }
        Some(Self {
            field,
            controls,
            capture_button,
            ignore_button,
        })
    }

    pub fn action_for(&self, button: NodeId) -> Option<AffordanceAction> {
        if button == self.capture_button {
            Some(AffordanceAction::Capture)
        } else if button == self.ignore_button {
            Some(AffordanceAction::Ignore)
        } else {
            None
        }
    }

    pub(super) fn detach(&self, doc: &mut Document) {
        doc.remove(self.controls);
    }
}

fn button(doc: &mut Document, parent: NodeId, class: &str, text: &str) -> NodeId {
    let el = doc.append_element(parent, "button", &[("type", "button")]);
    doc.add_class(el, classes::BUTTON);
    doc.add_class(el, class);
    doc.append_text(el, text);
    el
}
