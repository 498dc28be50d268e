//! Page-side field highlighting.

mod affordance;
mod controller;
pub mod resolve;

pub use affordance::{Affordance, AffordanceAction};
pub use controller::{CaptureState, HighlightController, MarkSummary, is_candidate};
