use fieldmark_common::protocol::{FieldDescriptor, Profile};

pub fn format_profile(profile: &Profile) -> String {
    let target = if profile.target_origin.is_empty() {
        "(not set)"
    } else {
        profile.target_origin.as_str()
    };
    let mut output = format!("Target origin: {}", target);

    output.push_str("\n\nCaptured fields:");
    output.push_str(&format_fields(&profile.captured, "No fields captured yet"));

    output.push_str("\n\nIgnored fields:");
    output.push_str(&format_fields(&profile.ignored, "No fields ignored"));

    output
}

fn format_fields(fields: &[FieldDescriptor], empty: &str) -> String {
    if fields.is_empty() {
        return format!("\n  {}", empty);
    }
    let mut output = String::new();
    for (index, field) in fields.iter().enumerate() {
        output.push_str(&format!("\n  [{}]", index));
        if !field.label.is_empty() {
            output.push_str(&format!(" {}", field.label));
        }
        let identifier = if field.identifier.is_empty() {
            "(No identifier)"
        } else {
            field.identifier.as_str()
        };
        output.push_str(&format!("\n      {} ({})", identifier, field.field_type));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile() {
        let output = format_profile(&Profile::default());
        assert_eq!(
            output,
            "Target origin: (not set)\n\nCaptured fields:\n  No fields captured yet\n\nIgnored fields:\n  No fields ignored"
        );
    }

    #[test]
    fn test_fields_are_indexed() {
        let profile = Profile {
            target_origin: "https://x.test".into(),
            captured: vec![
                FieldDescriptor::new("Email", "email", "input-email"),
                FieldDescriptor::new("", "", "textarea-textarea"),
            ],
            ignored: vec![],
        };
        let output = format_profile(&profile);
        assert!(output.starts_with("Target origin: https://x.test"));
        assert!(output.contains("\n  [0] Email\n      email (input-email)"));
        assert!(output.contains("\n  [1]\n      (No identifier) (textarea-textarea)"));
        assert!(output.ends_with("No fields ignored"));
    }
}
