use super::affordance::{Affordance, AffordanceAction};
use super::resolve::resolve;
use crate::config::CaptureConfig;
use crate::dom::{Document, MutationWatch, NodeId};
use crate::identify::identify;
use fieldmark_assets::classes;
use fieldmark_common::protocol::{FieldDescriptor, FieldRequest, Profile};
use tracing::{debug, trace};

/// Input types offered for capture. An input without a type counts as text.
const TEXT_LIKE_INPUT_TYPES: &[&str] = &["text", "number", "email", "tel", "search", "url"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    CaptureActive,
}

/// How many persisted descriptors matched a live element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarkSummary {
    pub captured: usize,
    pub ignored: usize,
}

/// Per-document highlighting state.
///
/// The controller owns no document; every operation borrows the one it acts
/// on. While capture mode is active it holds a mutation watch and rescans
/// when `process_mutations` sees new nodes.
#[derive(Debug)]
pub struct HighlightController {
    state: CaptureState,
    watch: Option<MutationWatch>,
    affordances: Vec<Affordance>,
    min_clearance: f32,
}

impl Default for HighlightController {
    fn default() -> Self {
        Self::new(&CaptureConfig::default())
    }
}

impl HighlightController {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            state: CaptureState::Idle,
            watch: None,
            affordances: Vec::new(),
            min_clearance: config.min_control_clearance_px,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_capture_active(&self) -> bool {
        self.state == CaptureState::CaptureActive
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    pub fn affordances(&self) -> &[Affordance] {
        &self.affordances
    }

    pub fn affordance_for(&self, field: NodeId) -> Option<&Affordance> {
        self.affordances.iter().find(|a| a.field == field)
    }

    // ============================================================
    // Persisted marks
    // ============================================================

    /// Mark every element the profile's descriptors resolve to. Misses are
    /// skipped.
    pub fn apply_persisted_marks(&mut self, doc: &mut Document, profile: &Profile) -> MarkSummary {
        let mut summary = MarkSummary::default();

        for descriptor in &profile.captured {
            if let Some(el) = self.resolve_logged(doc, descriptor) {
                doc.add_class(el, classes::HIGHLIGHT);
                doc.add_class(el, classes::CAPTURED);
                self.drop_affordance(doc, el);
                summary.captured += 1;
            }
        }
        for descriptor in &profile.ignored {
            if let Some(el) = self.resolve_logged(doc, descriptor) {
                doc.add_class(el, classes::IGNORED);
                self.drop_affordance(doc, el);
                summary.ignored += 1;
            }
        }

        debug!(
            "Applied persisted marks: {} captured, {} ignored",
            summary.captured, summary.ignored
        );
        summary
    }

    fn resolve_logged(&self, doc: &Document, descriptor: &FieldDescriptor) -> Option<NodeId> {
        match resolve(doc, descriptor) {
            Some((el, strategy)) => {
                trace!("Resolved {:?} via {:?}", descriptor.identifier, strategy);
                Some(el)
            }
            None => {
                trace!("No live element for {:?}", descriptor.identifier);
                None
            }
        }
    }

    // ============================================================
    // Candidate scanning
    // ============================================================

    /// Highlight every unmarked candidate and attach affordances where there
    /// is room. Returns how many elements were newly highlighted.
    pub fn scan_for_candidates(&mut self, doc: &mut Document) -> usize {
        let candidates: Vec<NodeId> = doc
            .elements()
            .filter(|&el| is_candidate(doc, el))
            .filter(|&el| {
                !doc.has_class(el, classes::HIGHLIGHT) && !doc.has_class(el, classes::IGNORED)
            })
            .collect();

        for &el in &candidates {
            doc.add_class(el, classes::HIGHLIGHT);
            if doc.has_class(el, classes::CAPTURED) {
                continue;
            }
            if doc.rect(el).y <= self.min_clearance {
                trace!("No room for controls above element {}", el);
                continue;
            }
            if let Some(affordance) = Affordance::attach(doc, el) {
                self.affordances.push(affordance);
            }
        }

        if !candidates.is_empty() {
            debug!("Highlighted {} candidate fields", candidates.len());
        }
        candidates.len()
    }

    // ============================================================
    // Capture mode
    // ============================================================

    pub fn enter_capture_mode(&mut self, doc: &mut Document) {
        self.state = CaptureState::CaptureActive;
        self.scan_for_candidates(doc);
        if self.watch.is_none() {
            self.watch = Some(doc.watch());
        }
        debug!("Capture mode active");
    }

    pub fn exit_capture_mode(&mut self, doc: &mut Document) {
        self.cleanup(doc);
        debug!("Capture mode inactive");
    }

    /// Enter capture mode from Idle, leave it otherwise.
    pub fn toggle(&mut self, doc: &mut Document) -> CaptureState {
        match self.state {
            CaptureState::Idle => self.enter_capture_mode(doc),
            CaptureState::CaptureActive => self.exit_capture_mode(doc),
        }
        self.state
    }

    /// Return to Idle, stop watching, and strip all unconfirmed decoration.
    /// Captured and ignored marks stay.
    pub fn cleanup(&mut self, doc: &mut Document) {
        self.state = CaptureState::Idle;
        self.watch = None;

        for affordance in std::mem::take(&mut self.affordances) {
            affordance.detach(doc);
        }
        // Controls left by an earlier controller instance.
        let stray: Vec<NodeId> = doc
            .elements()
            .filter(|&el| doc.has_class(el, classes::CONTROLS))
            .collect();
        for el in stray {
            doc.remove(el);
        }

        let unconfirmed: Vec<NodeId> = doc
            .elements()
            .filter(|&el| {
                doc.has_class(el, classes::HIGHLIGHT) && !doc.has_class(el, classes::CAPTURED)
            })
            .collect();
        for el in unconfirmed {
            doc.remove_class(el, classes::HIGHLIGHT);
        }
    }

    /// Drain queued mutation records and rescan when nodes other than our
    /// own controls were added. Returns how many elements were newly
    /// highlighted.
    pub fn process_mutations(&mut self, doc: &mut Document) -> usize {
        let Some(watch) = self.watch.as_mut() else {
            return 0;
        };
        let records = watch.take_records();
        let foreign = records
            .iter()
            .flat_map(|r| r.added.iter())
            .any(|&node| !doc.has_class(node, classes::CONTROLS));
        if !foreign {
            return 0;
        }
        self.prune_detached(doc);
        let added = self.scan_for_candidates(doc);
        // Our own insertions from this scan are already accounted for.
        if let Some(watch) = self.watch.as_mut() {
            watch.take_records();
        }
        added
    }

    // ============================================================
    // Activation
    // ============================================================

    /// Handle a click on an affordance button: mark the field, remove its
    /// controls, and return the request that persists the decision.
    pub fn activate(&mut self, doc: &mut Document, button: NodeId) -> Option<FieldRequest> {
        let position = self
            .affordances
            .iter()
            .position(|a| a.action_for(button).is_some())?;
        let affordance = self.affordances.remove(position);
        let action = affordance.action_for(button)?;
        let field = affordance.field;

        match action {
            AffordanceAction::Capture => doc.add_class(field, classes::CAPTURED),
            AffordanceAction::Ignore => {
                doc.remove_class(field, classes::HIGHLIGHT);
                doc.remove_class(field, classes::CAPTURED);
                doc.add_class(field, classes::IGNORED);
            }
        }
        affordance.detach(doc);

        let descriptor = identify(doc, field);
        debug!("{:?} field {:?}", action, descriptor.identifier);
        Some(match action {
            AffordanceAction::Capture => FieldRequest::capture(descriptor),
            AffordanceAction::Ignore => FieldRequest::ignore(descriptor),
        })
    }

    fn drop_affordance(&mut self, doc: &mut Document, field: NodeId) {
        if let Some(position) = self.affordances.iter().position(|a| a.field == field) {
            let affordance = self.affordances.remove(position);
            affordance.detach(doc);
        }
    }

    fn prune_detached(&mut self, doc: &Document) {
        self.affordances
            .retain(|a| doc.is_connected(a.field) && doc.is_connected(a.controls));
    }
}

/// Text-like inputs, textareas, selects and editable regions.
pub fn is_candidate(doc: &Document, el: NodeId) -> bool {
    if doc.attribute(el, "contenteditable") == Some("true") {
        return true;
    }
    match doc.tag(el) {
        Some("textarea") | Some("select") => true,
        Some("input") => {
            let input_type = doc
                .non_empty_attribute(el, "type")
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "text".to_string());
            TEXT_LIKE_INPUT_TYPES.contains(&input_type.as_str())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Rect;

    fn field(doc: &mut Document, attrs: &[(&str, &str)], y: f32) -> NodeId {
        let body = doc.body();
        let el = doc.append_element(body, "input", attrs);
        doc.set_rect(el, Rect::new(0.0, y, 200.0, 24.0));
        el
    }

    #[test]
    fn test_candidate_selection() {
        let mut doc = Document::new();
        let text = field(&mut doc, &[], 100.0);
        let email = field(&mut doc, &[("type", "EMAIL")], 100.0);
        let checkbox = field(&mut doc, &[("type", "checkbox")], 100.0);
        let body = doc.body();
        let editable = doc.append_element(body, "div", &[("contenteditable", "true")]);
        let readonly = doc.append_element(body, "div", &[("contenteditable", "false")]);

        assert!(is_candidate(&doc, text));
        assert!(is_candidate(&doc, email));
        assert!(!is_candidate(&doc, checkbox));
        assert!(is_candidate(&doc, editable));
        assert!(!is_candidate(&doc, readonly));
    }

    #[test]
    fn test_clearance_gates_controls() {
        let mut doc = Document::new();
        let low = field(&mut doc, &[("id", "low")], 100.0);
        let high = field(&mut doc, &[("id", "high")], 30.0);

        let mut controller = HighlightController::default();
        assert_eq!(controller.scan_for_candidates(&mut doc), 2);
        assert!(doc.has_class(high, classes::HIGHLIGHT));
        assert!(controller.affordance_for(high).is_none());

        let affordance = controller.affordance_for(low).copied().unwrap();
        assert_eq!(doc.parent(affordance.controls), doc.parent(low));
        let siblings = doc.children(doc.body());
        let controls_at = siblings.iter().position(|&c| c == affordance.controls);
        let field_at = siblings.iter().position(|&c| c == low);
        assert_eq!(controls_at.map(|i| i + 1), field_at);
    }

    #[test]
    fn test_toggle_round_trip() {
        let mut doc = Document::new();
        let el = field(&mut doc, &[("name", "city")], 100.0);
        let mut controller = HighlightController::default();

        assert_eq!(controller.toggle(&mut doc), CaptureState::CaptureActive);
        assert!(controller.is_watching());
        assert!(doc.has_class(el, classes::HIGHLIGHT));

        assert_eq!(controller.toggle(&mut doc), CaptureState::Idle);
        assert!(!controller.is_watching());
        assert!(!doc.has_class(el, classes::HIGHLIGHT));
        assert!(controller.affordances().is_empty());
    }

    #[test]
    fn test_ignore_activation_marks_terminal() {
        let mut doc = Document::new();
        let el = field(&mut doc, &[("id", "promo")], 100.0);
        let mut controller = HighlightController::default();
        controller.enter_capture_mode(&mut doc);

        let button = controller.affordance_for(el).unwrap().ignore_button;
        let request = controller.activate(&mut doc, button).unwrap();
        assert_eq!(request, FieldRequest::ignore(identify(&doc, el)));
        assert!(doc.has_class(el, classes::IGNORED));
        assert!(!doc.has_class(el, classes::HIGHLIGHT));

        // Ignored fields are never offered again.
        assert_eq!(controller.scan_for_candidates(&mut doc), 0);
        assert!(controller.affordance_for(el).is_none());
    }

    #[test]
    fn test_unknown_button_is_none() {
        let mut doc = Document::new();
        field(&mut doc, &[], 100.0);
        let mut controller = HighlightController::default();
        controller.enter_capture_mode(&mut doc);
        let body = doc.body();
        assert!(controller.activate(&mut doc, body).is_none());
    }
}
