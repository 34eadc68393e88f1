//! Validation helpers for DTOs.

use validator::ValidationError;

/// Shortest accepted display name, after trimming.
pub const DISPLAY_NAME_MIN: usize = 3;
/// Longest accepted display name, after trimming.
pub const DISPLAY_NAME_MAX: usize = 20;
/// Longest accepted topic.
pub const TOPIC_MAX: usize = 80;

/// Validates that a display name is 3 to 20 characters once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Ada")      // Ok
/// validate_display_name("  Al  ")   // Err - too short once trimmed
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if !(DISPLAY_NAME_MIN..=DISPLAY_NAME_MAX).contains(&length) {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!(
                "Name must be between {DISPLAY_NAME_MIN} and {DISPLAY_NAME_MAX} characters (got {length})"
            )
            .into(),
        );
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("display_name_format");
        err.message = Some("Name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a topic is non-blank and reasonably short.
pub fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    let length = topic.trim().chars().count();
    if length == 0 || length > TOPIC_MAX {
        let mut err = ValidationError::new("topic_length");
        err.message =
            Some(format!("Topic must be between 1 and {TOPIC_MAX} characters (got {length})").into());
        return Err(err);
    }

    Ok(())
}
