/// Stylesheet injected into target-origin tabs ahead of the agent script.
pub const CONTENT_CSS: &str = include_str!("content.css");

/// Path of the agent bundle inside the extension package.
pub const AGENT_SCRIPT: &str = "fieldmark_agent.js";

/// Decoration class names shared by the stylesheet and the highlight controller.
pub mod classes {
    pub const HIGHLIGHT: &str = "fieldmark-highlight";
    pub const CAPTURED: &str = "fieldmark-captured";
    pub const IGNORED: &str = "fieldmark-ignored";
    pub const CONTROLS: &str = "fieldmark-controls";
    pub const BUTTON: &str = "fieldmark-button";
    pub const CAPTURE_BUTTON: &str = "fieldmark-capture-button";
    pub const IGNORE_BUTTON: &str = "fieldmark-ignore-button";

    /// Every class the controller may add to page elements.
    pub const ALL: &[&str] = &[
        HIGHLIGHT,
        CAPTURED,
        IGNORED,
        CONTROLS,
        BUTTON,
        CAPTURE_BUTTON,
        IGNORE_BUTTON,
    ];

    pub fn is_decoration(class: &str) -> bool {
        ALL.contains(&class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_styles_every_decoration() {
        for class in classes::ALL {
            assert!(
                CONTENT_CSS.contains(&format!(".{}", class)),
                "missing rule for {}",
                class
            );
        }
    }

    #[test]
    fn decoration_lookup() {
        assert!(classes::is_decoration("fieldmark-captured"));
        assert!(!classes::is_decoration("form-control"));
    }
}
